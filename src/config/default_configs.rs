use crate::config::target_types::TargetCategory;
use crate::config::triage_config::{Target, TriageConfig, TriageOptions};

fn target(name: &str, category: TargetCategory, path: &str, description: &str, required: bool) -> Target {
    Target {
        name: name.into(),
        category,
        path: path.into(),
        description: Some(description.into()),
        required,
    }
}

impl TriageConfig {
    /// Default artifact set for pooled VDI user disks and golden images
    pub fn default_vdi() -> Self {
        TriageConfig {
            version: "1.0".into(),
            description: "Default pooled-VDI triage configuration".into(),
            targets: vec![
                target(
                    "Security.evtx",
                    TargetCategory::EventLog,
                    "Windows/System32/winevt/Logs/Security.evtx",
                    "Security event log (logon events)",
                    true,
                ),
                target(
                    "SOFTWARE",
                    TargetCategory::Registry,
                    "Windows/System32/config/SOFTWARE",
                    "Software registry hive (ProfileList)",
                    true,
                ),
                target(
                    "NTUSER.DAT",
                    TargetCategory::Registry,
                    "Users/*/NTUSER.DAT",
                    "Per-user registry hive",
                    false,
                ),
                target(
                    "Prefetch",
                    TargetCategory::Prefetch,
                    "Windows/Prefetch",
                    "Prefetch directory",
                    false,
                ),
                target(
                    "Edge History",
                    TargetCategory::BrowserHistory,
                    "Users/*/AppData/Local/Microsoft/Edge/User Data/Default/History",
                    "Microsoft Edge browsing history",
                    false,
                ),
                target(
                    "Chrome History",
                    TargetCategory::BrowserHistory,
                    "Users/*/AppData/Local/Google/Chrome/User Data/Default/History",
                    "Google Chrome browsing history",
                    false,
                ),
                target(
                    "PSReadLine",
                    TargetCategory::UserProfile,
                    "Users/*/AppData/Roaming/Microsoft/Windows/PowerShell/PSReadLine/ConsoleHost_history.txt",
                    "PowerShell console history",
                    false,
                ),
            ],
            options: TriageOptions::default(),
        }
    }
}

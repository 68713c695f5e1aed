use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad artifact family a triage target belongs to
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetCategory {
    EventLog,
    Registry,
    Prefetch,
    BrowserHistory,
    UserProfile,
    Custom,
}

impl fmt::Display for TargetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetCategory::EventLog => "EventLog",
            TargetCategory::Registry => "Registry",
            TargetCategory::Prefetch => "Prefetch",
            TargetCategory::BrowserHistory => "BrowserHistory",
            TargetCategory::UserProfile => "UserProfile",
            TargetCategory::Custom => "Custom",
        };
        write!(f, "{}", name)
    }
}

impl TargetCategory {
    /// Parse a category name as typed on the command line (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "eventlog" | "evtx" => Some(TargetCategory::EventLog),
            "registry" => Some(TargetCategory::Registry),
            "prefetch" => Some(TargetCategory::Prefetch),
            "browserhistory" | "browser" => Some(TargetCategory::BrowserHistory),
            "userprofile" | "user" => Some(TargetCategory::UserProfile),
            "custom" => Some(TargetCategory::Custom),
            _ => None,
        }
    }
}

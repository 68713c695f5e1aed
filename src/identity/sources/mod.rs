//! Decoded identity record streams for a volume.
//!
//! Sources live in the volume workspace after extraction (or in a side
//! directory of profile-list exports). An absent source is not an error:
//! the volume simply skips that correlation stage.

pub mod csv_rows;
pub mod evtx_logons;

use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

use crate::constants::{WORKSPACE_LOGON_CSV, WORKSPACE_PROFILE_CSV, WORKSPACE_SECURITY_EVTX};
use crate::identity::models::{LogonEvent, ProfileRow};

pub use csv_rows::{read_logon_csv, read_profile_csv};
pub use evtx_logons::read_security_evtx;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot parse event log {path}: {reason}")]
    Evtx { path: PathBuf, reason: String },

    #[error("malformed identity source {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Both record streams for one volume; `None` marks a missing source
#[derive(Debug, Clone, Default)]
pub struct VolumeIdentitySources {
    pub volume_id: String,
    pub profiles: Option<Vec<ProfileRow>>,
    pub logons: Option<Vec<LogonEvent>>,
}

impl VolumeIdentitySources {
    pub fn new(volume_id: &str) -> Self {
        VolumeIdentitySources {
            volume_id: volume_id.to_string(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_none() && self.logons.is_none()
    }
}

/// Locate and load the identity sources of one volume.
///
/// Logon events come from the extracted Security.evtx, falling back to a
/// `logon_events.csv` export. Profile rows come from
/// `<profile_list_dir>/<volume id>.csv`, falling back to `profile_list.csv`
/// in the workspace. An unreadable source is logged and treated as missing.
pub fn discover_sources(
    volume_id: &str,
    workspace_root: &Path,
    profile_list_dir: Option<&Path>,
) -> VolumeIdentitySources {
    let mut sources = VolumeIdentitySources::new(volume_id);

    let evtx_path = workspace_root.join(WORKSPACE_SECURITY_EVTX);
    let logon_csv = workspace_root.join(WORKSPACE_LOGON_CSV);
    sources.logons = if evtx_path.is_file() {
        load(volume_id, &evtx_path, read_security_evtx)
    } else if logon_csv.is_file() {
        load(volume_id, &logon_csv, read_logon_csv)
    } else {
        info!("{}: no logon event source", volume_id);
        None
    };

    let exported = profile_list_dir.map(|dir| dir.join(format!("{}.csv", volume_id)));
    let in_workspace = workspace_root.join(WORKSPACE_PROFILE_CSV);
    sources.profiles = match exported.filter(|path| path.is_file()) {
        Some(path) => load(volume_id, &path, read_profile_csv),
        None if in_workspace.is_file() => load(volume_id, &in_workspace, read_profile_csv),
        None => {
            info!("{}: no profile list source", volume_id);
            None
        }
    };

    sources
}

fn load<T>(
    volume_id: &str,
    path: &Path,
    reader: impl Fn(&Path) -> Result<Vec<T>, SourceError>,
) -> Option<Vec<T>> {
    match reader(path) {
        Ok(rows) => {
            info!("{}: {} rows from {}", volume_id, rows.len(), path.display());
            Some(rows)
        }
        Err(err) => {
            warn!("{}: skipping identity source: {}", volume_id, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_sources_are_none() {
        let temp_dir = TempDir::new().unwrap();
        let sources = discover_sources("V1", temp_dir.path(), None);
        assert_eq!(sources.volume_id, "V1");
        assert!(sources.is_empty());
    }

    #[test]
    fn test_profile_dir_preferred_over_workspace() {
        let workspace = TempDir::new().unwrap();
        let exports = TempDir::new().unwrap();
        fs::write(
            workspace.path().join("profile_list.csv"),
            "sid,profile_path\nS-1-5-21-1-2-3-1001,C:\\Users\\from_workspace\n",
        )
        .unwrap();
        fs::write(
            exports.path().join("V1.csv"),
            "SID,ProfileImagePath\nS-1-5-21-1-2-3-1001,C:\\Users\\from_export\n",
        )
        .unwrap();
        fs::write(
            workspace.path().join("logon_events.csv"),
            "time,username,sid,domain,logon_type\n2024-01-01 09:00:00,alice,S-1-5-21-1-2-3-1001,CORP,2\n",
        )
        .unwrap();

        let sources = discover_sources("V1", workspace.path(), Some(exports.path()));
        assert_eq!(sources.profiles.unwrap()[0].folder(), "from_export");
        assert_eq!(sources.logons.unwrap().len(), 1);

        let fallback = discover_sources("V2", workspace.path(), Some(exports.path()));
        assert_eq!(fallback.profiles.unwrap()[0].folder(), "from_workspace");
    }

    #[test]
    fn test_unreadable_source_skipped() {
        let workspace = TempDir::new().unwrap();
        let logs = workspace.path().join("Windows_System32_winevt_Logs");
        fs::create_dir_all(&logs).unwrap();
        fs::write(logs.join("Security.evtx"), b"garbage").unwrap();

        let sources = discover_sources("V1", workspace.path(), None);
        assert!(sources.logons.is_none());
    }
}

//! Linking profile-list and logon-event records into an identity table

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use thiserror::Error;

use crate::constants::{NO_LOGON_TYPE, UNKNOWN_VALUE};
use crate::identity::filter::{accepts_logon, is_service_folder};
use crate::identity::models::{
    CorrelationStage, EventTime, IdentityRecord, LogonEvent, MergeScope, ProfileRow,
};
use crate::identity::IdentityTable;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("volume {volume} cannot move from {from:?} back to {to:?}")]
    InvalidTransition {
        volume: String,
        from: CorrelationStage,
        to: CorrelationStage,
    },
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.trim().is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

/// In-progress identity table for one batch.
///
/// Owns every record until `finalize` hands back the deduplicated table.
/// Each volume moves forward through the correlation stages; a volume may
/// skip a stage when its source is missing but never go back.
#[derive(Debug, Default)]
pub struct CorrelationSession {
    records: Vec<IdentityRecord>,
    profile_folders: HashMap<(String, String), String>,
    stages: HashMap<String, CorrelationStage>,
    scope: MergeScope,
}

impl CorrelationSession {
    pub fn new(scope: MergeScope) -> Self {
        CorrelationSession {
            scope,
            ..Self::default()
        }
    }

    pub fn stage(&self, volume_id: &str) -> CorrelationStage {
        self.stages
            .get(volume_id)
            .copied()
            .unwrap_or(CorrelationStage::Empty)
    }

    fn advance(&mut self, volume_id: &str, to: CorrelationStage) -> Result<(), CorrelationError> {
        let from = self.stage(volume_id);
        if to < from {
            return Err(CorrelationError::InvalidTransition {
                volume: volume_id.to_string(),
                from,
                to,
            });
        }
        self.stages.insert(volume_id.to_string(), to);
        Ok(())
    }

    /// Profile folder recorded for a SID on a volume, service folders included
    pub fn profile_folder(&self, volume_id: &str, sid: &str) -> Option<&str> {
        self.profile_folders
            .get(&(volume_id.to_string(), sid.to_string()))
            .map(String::as_str)
    }

    pub fn records(&self) -> &[IdentityRecord] {
        &self.records
    }

    /// Insert a record as-is, bypassing filters and lookups
    pub fn push_record(&mut self, record: IdentityRecord) {
        self.records.push(record);
    }

    /// Create one untimed record per profile SID (first row per SID wins).
    /// Service-account folders stay in the folder mapping but get no record.
    pub fn seed_profile_list(
        &mut self,
        volume_id: &str,
        rows: &[ProfileRow],
    ) -> Result<usize, CorrelationError> {
        self.advance(volume_id, CorrelationStage::SeededFromProfileList)?;

        let mut seeded = 0;
        for row in rows {
            if row.sid.is_empty() {
                continue;
            }
            let key = (volume_id.to_string(), row.sid.clone());
            if self.profile_folders.contains_key(&key) {
                debug!("Profile SID {} already seeded for {}", row.sid, volume_id);
                continue;
            }

            let folder = row.folder().to_string();
            self.profile_folders.insert(key, folder.clone());
            if is_service_folder(&folder) {
                continue;
            }

            self.records.push(IdentityRecord {
                volume_id: volume_id.to_string(),
                sid: row.sid.clone(),
                username: UNKNOWN_VALUE.to_string(),
                domain: UNKNOWN_VALUE.to_string(),
                logon_type: NO_LOGON_TYPE.to_string(),
                time: EventTime::NoLogFound,
                folder,
            });
            seeded += 1;
        }

        info!("Seeded {} profile identities for {}", seeded, volume_id);
        Ok(seeded)
    }

    /// Fold qualifying logon events into the table.
    ///
    /// An event overwrites the identity fields of the record already holding
    /// its SID, so the last processed event wins. Events for unseen SIDs
    /// become new records with the best known profile folder.
    pub fn merge_logon_events(
        &mut self,
        volume_id: &str,
        events: &[LogonEvent],
    ) -> Result<usize, CorrelationError> {
        self.advance(volume_id, CorrelationStage::MergedWithEventLog)?;

        let mut merged = 0;
        for event in events.iter().filter(|event| accepts_logon(event)) {
            let scope = self.scope;
            let existing = self.records.iter_mut().find(|record| {
                record.sid == event.sid
                    && (scope == MergeScope::Table || record.volume_id == volume_id)
            });

            match existing {
                Some(record) => {
                    record.username = event.username.clone();
                    record.domain = or_placeholder(&event.domain, UNKNOWN_VALUE);
                    record.logon_type = or_placeholder(&event.logon_type, NO_LOGON_TYPE);
                    record.time = EventTime::Logged(event.time);
                }
                None => {
                    let folder = self
                        .profile_folder(volume_id, &event.sid)
                        .unwrap_or(UNKNOWN_VALUE)
                        .to_string();
                    self.records.push(IdentityRecord {
                        volume_id: volume_id.to_string(),
                        sid: event.sid.clone(),
                        username: event.username.clone(),
                        domain: or_placeholder(&event.domain, UNKNOWN_VALUE),
                        logon_type: or_placeholder(&event.logon_type, NO_LOGON_TYPE),
                        time: EventTime::Logged(event.time),
                        folder,
                    });
                }
            }
            merged += 1;
        }

        info!("Merged {} of {} logon events for {}", merged, events.len(), volume_id);
        Ok(merged)
    }

    /// Sort by time and keep the earliest record per (volume, SID, username)
    pub fn finalize(self) -> IdentityTable {
        IdentityTable::from_records(deduplicate(self.records))
    }
}

/// Stable sort by time, then keep the first record per key.
///
/// Equal times keep insertion order, and untimed records sort after every
/// logged one.
pub fn deduplicate(mut records: Vec<IdentityRecord>) -> Vec<IdentityRecord> {
    records.sort_by(|a, b| a.time.cmp(&b.time));

    let mut seen = HashSet::new();
    records.retain(|record| {
        seen.insert((
            record.volume_id.clone(),
            record.sid.clone(),
            record.username.clone(),
        ))
    });
    records
}

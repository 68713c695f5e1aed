use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::constants::{IDENTITY_TIME_FORMAT, NO_LOG_FOUND};

/// When an identity was seen. Derived ordering puts every logged time
/// before `NoLogFound`, so profile-only records sort last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventTime {
    Logged(NaiveDateTime),
    NoLogFound,
}

impl EventTime {
    pub fn is_logged(&self) -> bool {
        matches!(self, EventTime::Logged(_))
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::Logged(time) => write!(f, "{}", time.format(IDENTITY_TIME_FORMAT)),
            EventTime::NoLogFound => write!(f, "{}", NO_LOG_FOUND),
        }
    }
}

/// One linked identity on one volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub volume_id: String,
    pub sid: String,
    pub username: String,
    pub domain: String,
    pub logon_type: String,
    pub time: EventTime,
    pub folder: String,
}

impl IdentityRecord {
    /// Deduplication key
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.volume_id, &self.sid, &self.username)
    }
}

/// SID to profile folder row from a decoded ProfileList hive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRow {
    pub sid: String,
    pub profile_path: String,
}

impl ProfileRow {
    /// Last component of the profile path (`C:\Users\alice.V2` -> `alice.V2`)
    pub fn folder(&self) -> &str {
        self.profile_path
            .trim_end_matches(['\\', '/'])
            .rsplit(['\\', '/'])
            .next()
            .unwrap_or("")
    }
}

/// Successful logon decoded from a Security event log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogonEvent {
    pub time: NaiveDateTime,
    pub username: String,
    pub sid: String,
    pub domain: String,
    pub logon_type: String,
}

/// How far a volume has progressed through correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum CorrelationStage {
    Empty,
    SeededFromProfileList,
    MergedWithEventLog,
    Finalized,
}

/// Lookup scope for logon events matching an existing record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergeScope {
    /// Match by SID anywhere in the table being built
    #[default]
    Table,
    /// Match by SID only within the event's own volume
    Volume,
}

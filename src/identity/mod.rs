//! Identity correlation: linking SIDs, profile folders and logon events
//! into one deduplicated table per batch.

pub mod correlation;
pub mod export;
pub mod filter;
pub mod models;
pub mod sources;

pub use correlation::{deduplicate, CorrelationError, CorrelationSession};
pub use export::{export_table, ExportError};
pub use models::{CorrelationStage, EventTime, IdentityRecord, LogonEvent, MergeScope, ProfileRow};
pub use sources::{discover_sources, SourceError, VolumeIdentitySources};

/// Final identity records, unique by (volume id, SID, username), each
/// carrying the earliest known time for its key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityTable {
    records: Vec<IdentityRecord>,
}

impl IdentityTable {
    pub fn from_records(records: Vec<IdentityRecord>) -> Self {
        IdentityTable { records }
    }

    /// Merge tables from separate runs and deduplicate again
    pub fn combine<I: IntoIterator<Item = IdentityTable>>(tables: I) -> Self {
        let records = tables.into_iter().flat_map(|table| table.records).collect();
        IdentityTable::from_records(deduplicate(records))
    }

    pub fn records(&self) -> &[IdentityRecord] {
        &self.records
    }

    pub fn for_volume<'a>(&'a self, volume_id: &'a str) -> impl Iterator<Item = &'a IdentityRecord> + 'a {
        self.records.iter().filter(move |record| record.volume_id == volume_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<IdentityRecord> {
        self.records
    }
}

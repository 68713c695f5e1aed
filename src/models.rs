use serde::{Deserialize, Serialize};

use crate::evidence::ContainerKind;

/// Outcome of extracting one concrete path
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub path: String,
    pub success: bool,
    pub message: String,
    /// Profile folder the path was expanded for, or "System"
    pub user: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VolumeStatus {
    Processed,
    OpenFailed,
    BindFailed,
    WorkspaceFailed,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VolumeReport {
    pub source_path: String,
    pub volume_id: String,
    pub container: Option<ContainerKind>,
    pub size: u64,
    pub status: VolumeStatus,
    pub error: Option<String>,
    pub partition_offset: Option<u64>,
    pub workspace: Option<String>,
    pub results: Vec<ExtractionResult>,
    pub identity_records: usize,
}

impl VolumeReport {
    pub fn new(source_path: &str, volume_id: &str) -> Self {
        VolumeReport {
            source_path: source_path.to_string(),
            volume_id: volume_id.to_string(),
            container: None,
            size: 0,
            status: VolumeStatus::Processed,
            error: None,
            partition_offset: None,
            workspace: None,
            results: Vec::new(),
            identity_records: 0,
        }
    }

    pub fn failed(source_path: &str, volume_id: &str, status: VolumeStatus, error: String) -> Self {
        VolumeReport {
            status,
            error: Some(error),
            ..VolumeReport::new(source_path, volume_id)
        }
    }

    pub fn succeeded_targets(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BatchReport {
    pub started: String,
    pub finished: String,
    pub volumes: Vec<VolumeReport>,
    pub identity_csv: Option<String>,
    pub identity_records: usize,
}

impl BatchReport {
    pub fn processed_volumes(&self) -> usize {
        self.volumes
            .iter()
            .filter(|v| v.status == VolumeStatus::Processed)
            .count()
    }
}

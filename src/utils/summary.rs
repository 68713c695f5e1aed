use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::models::BatchReport;

/// Create a JSON summary of a triage batch.
///
/// Records every volume outcome (including volumes that could not be opened
/// or bound) next to the per-target extraction results, so the batch keeps
/// an auditable trail of what was and was not collected.
///
/// # Example Output
///
/// ```json
/// {
///   "collection_id": "550e8400-e29b-41d4-a716-446655440000",
///   "started": "2024-01-15T14:30:52Z",
///   "volume_count": 2,
///   "processed_volumes": 1,
///   "volumes": [...],
///   "identity_table": {"path": "identity_table.csv", "records": 3}
/// }
/// ```
pub fn create_batch_summary(report: &BatchReport) -> Result<String> {
    let volumes: Vec<_> = report
        .volumes
        .iter()
        .map(|volume| {
            let footprint = volume.workspace.as_deref().map(|root| {
                let (files, bytes) = workspace_footprint(Path::new(root));
                json!({"files": files, "bytes": bytes})
            });
            json!({
                "source_path": volume.source_path,
                "volume_id": volume.volume_id,
                "container": volume.container,
                "size": volume.size,
                "status": volume.status,
                "error": volume.error,
                "partition_offset": volume.partition_offset,
                "workspace": volume.workspace,
                "workspace_footprint": footprint,
                "targets_succeeded": volume.succeeded_targets(),
                "targets_total": volume.results.len(),
                "results": volume.results,
                "identity_records": volume.identity_records,
            })
        })
        .collect();

    let summary = json!({
        "collection_id": Uuid::new_v4().to_string(),
        "collector_version": env!("CARGO_PKG_VERSION"),
        "started": report.started,
        "finished": report.finished,
        "volume_count": report.volumes.len(),
        "processed_volumes": report.processed_volumes(),
        "volumes": volumes,
        "identity_table": {
            "path": report.identity_csv,
            "records": report.identity_records,
        },
    });

    serde_json::to_string_pretty(&summary).context("Failed to serialize batch summary to JSON")
}

/// Count regular files and their total size under a workspace
pub fn workspace_footprint(root: &Path) -> (u64, u64) {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .fold((0, 0), |(files, bytes), metadata| (files + 1, bytes + metadata.len()))
}

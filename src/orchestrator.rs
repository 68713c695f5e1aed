//! Public operations and the bounded parallel batch runner.
//!
//! Each worker owns one volume end to end (open, select, extract). Identity
//! correlation waits for every worker to finish, then runs over the
//! populated workspaces in input order.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use log::{error, info, warn};
use rayon::prelude::*;

use crate::config::{Target, TriageConfig, TriageOptions};
use crate::constants::DEFAULT_SUMMARY_NAME;
use crate::evidence::{volume_id_for, workspace_dir_name, EvidenceVolume, VolumeError, VolumeOpener};
use crate::extraction::{workspace_volume_id, CancelToken, Workspace};
use crate::filesystem::{FilesystemBinder, FilesystemView, HostDirView, NtfsBinder};
use crate::identity::{
    discover_sources, export_table, CorrelationSession, IdentityTable, MergeScope,
    VolumeIdentitySources,
};
use crate::models::{BatchReport, ExtractionResult, VolumeReport, VolumeStatus};
use crate::partition::select_filesystem;
use crate::utils::summary::create_batch_summary;

pub use crate::extraction::resolve_and_extract;

/// Open one evidence file with the built-in container readers
pub fn open_volume(path: &Path, options: &TriageOptions) -> Result<EvidenceVolume, VolumeError> {
    VolumeOpener::new().open(path, &options.workspace_root)
}

/// Build one identity table from the decoded sources of several volumes.
///
/// Volumes are correlated in the given order; each is seeded from its
/// profile list before its logon events are merged. A missing source skips
/// that stage for the volume.
pub fn correlate(sources: &[VolumeIdentitySources], scope: MergeScope) -> IdentityTable {
    let mut session = CorrelationSession::new(scope);

    for volume in sources {
        if let Some(profiles) = &volume.profiles {
            if let Err(err) = session.seed_profile_list(&volume.volume_id, profiles) {
                warn!("{}", err);
            }
        }
        if let Some(logons) = &volume.logons {
            if let Err(err) = session.merge_logon_events(&volume.volume_id, logons) {
                warn!("{}", err);
            }
        }
    }

    session.finalize()
}

/// Correlate the workspaces of an earlier batch without extracting again.
///
/// Each workspace is labelled with the volume id the batch recorded in it,
/// so the table matches the one the batch exported.
pub fn correlate_workspaces(
    workspaces: &[PathBuf],
    profile_list_dir: Option<&Path>,
    scope: MergeScope,
) -> IdentityTable {
    let sources: Vec<VolumeIdentitySources> = workspaces
        .iter()
        .map(|workspace| discover_sources(&workspace_volume_id(workspace), workspace, profile_list_dir))
        .collect();

    correlate(&sources, scope)
}

/// Run the whole pipeline over a batch with the built-in readers
pub fn run_batch(inputs: &[PathBuf], config: &TriageConfig) -> Result<BatchReport> {
    BatchRunner::new().run(inputs, config)
}

/// Batch pipeline with pluggable container readers and filesystem binder
pub struct BatchRunner {
    opener: VolumeOpener,
    binder: Box<dyn FilesystemBinder>,
    cancel: CancelToken,
}

impl Default for BatchRunner {
    fn default() -> Self {
        BatchRunner {
            opener: VolumeOpener::new(),
            binder: Box::new(NtfsBinder),
            cancel: CancelToken::new(),
        }
    }
}

impl BatchRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_opener(mut self, opener: VolumeOpener) -> Self {
        self.opener = opener;
        self
    }

    pub fn with_binder(mut self, binder: Box<dyn FilesystemBinder>) -> Self {
        self.binder = binder;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts in-flight extraction between chunks and targets
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn run(&self, inputs: &[PathBuf], config: &TriageConfig) -> Result<BatchReport> {
        let options = &config.options;
        options.validate()?;
        let started = timestamp();

        fs::create_dir_all(&options.workspace_root).context(format!(
            "Failed to create workspace root {}",
            options.workspace_root.display()
        ))?;

        let workers = options.effective_workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("vdi-worker-{}", index))
            .build()
            .context("Failed to build worker pool")?;

        info!(
            "Processing {} volumes with {} workers ({} targets each)",
            inputs.len(),
            workers,
            config.targets.len()
        );

        // par_iter keeps input order in the collected reports
        let mut volumes: Vec<VolumeReport> = pool.install(|| {
            inputs
                .par_iter()
                .map(|input| self.process_volume(input, config))
                .collect()
        });

        let sources: Vec<VolumeIdentitySources> = volumes
            .iter()
            .filter(|volume| volume.status == VolumeStatus::Processed)
            .filter_map(|volume| {
                let workspace = volume.workspace.as_ref()?;
                Some(discover_sources(
                    &volume.volume_id,
                    Path::new(workspace),
                    options.profile_list_dir.as_deref(),
                ))
            })
            .filter(|sources| !sources.is_empty())
            .collect();

        let table = correlate(&sources, options.merge_scope);
        for volume in volumes.iter_mut() {
            volume.identity_records = table.for_volume(&volume.volume_id).count();
        }

        let identity_csv = if sources.is_empty() {
            info!("No identity sources found, skipping identity table export");
            None
        } else {
            let path = options.identity_csv_path();
            match export_table(&table, &path) {
                Ok(()) => Some(path.to_string_lossy().to_string()),
                Err(err) => {
                    error!("{}", err);
                    None
                }
            }
        };

        let report = BatchReport {
            started,
            finished: timestamp(),
            identity_records: table.len(),
            identity_csv,
            volumes,
        };

        write_summary(&report, &options.workspace_root)?;
        Ok(report)
    }

    fn process_volume(&self, input: &Path, config: &TriageConfig) -> VolumeReport {
        let options = &config.options;
        let source_path = input.to_string_lossy().to_string();

        if input.is_dir() {
            return self.process_directory(input, config);
        }

        let mut volume = match self.opener.open(input, &options.workspace_root) {
            Ok(volume) => volume,
            Err(err) => {
                error!("Cannot open {}: {}", input.display(), err);
                return VolumeReport::failed(
                    &source_path,
                    &volume_id_for(input),
                    VolumeStatus::OpenFailed,
                    err.to_string(),
                );
            }
        };

        let mut report = VolumeReport {
            container: Some(volume.kind),
            size: volume.size,
            ..VolumeReport::new(&source_path, &volume.volume_id)
        };

        let mut selected = match select_filesystem(
            volume.source(),
            self.binder.as_ref(),
            &options.selector_settings(),
        ) {
            Ok(selected) => selected,
            Err(err) => {
                error!("{}: {}", volume.volume_id, err);
                report.status = VolumeStatus::BindFailed;
                report.error = Some(err.to_string());
                return report;
            }
        };
        volume.mark_bound(selected.offset);
        report.partition_offset = volume.partition_offset;
        info!("{}: filesystem bound at offset {}", volume.volume_id, selected.offset);

        self.extract_into(&mut report, selected.view.as_mut(), &volume.workspace_root, config);
        report
    }

    /// A directory input is an already exported filesystem tree
    fn process_directory(&self, input: &Path, config: &TriageConfig) -> VolumeReport {
        let source_path = input.to_string_lossy().to_string();
        let volume_id = input
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| workspace_dir_name(input));

        let mut view = match HostDirView::new(input) {
            Ok(view) => view,
            Err(err) => {
                error!("Cannot bind {}: {}", input.display(), err);
                return VolumeReport::failed(&source_path, &volume_id, VolumeStatus::BindFailed, err.to_string());
            }
        };

        let mut report = VolumeReport::new(&source_path, &volume_id);
        report.partition_offset = Some(0);

        let workspace_root = config.options.workspace_root.join(workspace_dir_name(input));
        self.extract_into(&mut report, &mut view, &workspace_root, config);
        report
    }

    fn extract_into(
        &self,
        report: &mut VolumeReport,
        view: &mut dyn FilesystemView,
        workspace_root: &Path,
        config: &TriageConfig,
    ) {
        let workspace = match Workspace::create(workspace_root) {
            Ok(workspace) => workspace,
            Err(err) => {
                error!("Cannot create workspace {}: {}", workspace_root.display(), err);
                report.status = VolumeStatus::WorkspaceFailed;
                report.error = Some(err.to_string());
                return;
            }
        };
        if let Err(err) = workspace.record_volume_id(&report.volume_id) {
            warn!("{}: cannot record volume id in workspace: {}", report.volume_id, err);
        }
        report.workspace = Some(workspace.root().to_string_lossy().to_string());
        report.results = self.extract_targets(view, &workspace, &config.targets, &config.options);

        info!(
            "{}: {}/{} targets extracted",
            report.volume_id,
            report.succeeded_targets(),
            report.results.len()
        );
    }

    fn extract_targets(
        &self,
        view: &mut dyn FilesystemView,
        workspace: &Workspace,
        targets: &[Target],
        options: &TriageOptions,
    ) -> Vec<ExtractionResult> {
        let mut results = Vec::new();
        for target in targets {
            if self.cancel.is_cancelled() {
                warn!("Cancelled before {}", target.name);
                break;
            }

            let target_results =
                resolve_and_extract(view, workspace, &target.path, options.chunk_size, &self.cancel);
            if target.required && !target_results.iter().any(|r| r.success) {
                warn!("Required target {} was not collected", target.name);
            }
            results.extend(target_results);
        }
        results
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn write_summary(report: &BatchReport, workspace_root: &Path) -> Result<()> {
    let summary = create_batch_summary(report)?;
    let path = workspace_root.join(DEFAULT_SUMMARY_NAME);
    fs::write(&path, summary).context(format!("Failed to write summary {}", path.display()))?;
    info!("Wrote batch summary to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EventTime;
    use crate::test_utils::generators::{logon, profile};
    use crate::test_utils::{create_temp_dir, create_windows_tree};

    const ALICE: &str = "S-1-5-21-1-2-3-1001";
    const BOB: &str = "S-1-5-21-1-2-3-1002";

    fn test_config(workspace_root: &Path) -> TriageConfig {
        let mut config = TriageConfig::default_vdi();
        config.options.workspace_root = workspace_root.to_path_buf();
        config.options.workers = 2;
        config
    }

    #[test]
    fn test_correlate_seeds_then_merges_per_volume() {
        let mut v1 = VolumeIdentitySources::new("V1");
        v1.profiles = Some(vec![profile(ALICE, "C:\\Users\\alice.V2")]);
        v1.logons = Some(vec![logon("2024-01-01 09:00:00", "alice", ALICE, "CORP")]);

        let mut v2 = VolumeIdentitySources::new("V2");
        v2.profiles = Some(vec![profile(BOB, "C:\\Users\\bob")]);

        let table = correlate(&[v1, v2], MergeScope::Table);
        assert_eq!(table.len(), 2);

        let alice = &table.records()[0];
        assert_eq!(alice.folder, "alice.V2");
        assert_eq!(alice.username, "alice");
        assert_eq!(alice.volume_id, "V1");

        let bob = &table.records()[1];
        assert_eq!(bob.time, EventTime::NoLogFound);
        assert_eq!(bob.volume_id, "V2");
    }

    #[test]
    fn test_correlate_without_sources() {
        assert!(correlate(&[], MergeScope::Volume).is_empty());
    }

    #[test]
    fn test_open_volume_missing_file() {
        let temp_dir = create_temp_dir().unwrap();
        let options = TriageOptions {
            workspace_root: temp_dir.path().join("ws"),
            ..TriageOptions::default()
        };
        let result = open_volume(&temp_dir.path().join("absent.dd"), &options);
        assert!(matches!(result, Err(VolumeError::NotFound(_))));
    }

    #[test]
    fn test_run_batch_directory_and_missing_image() {
        let temp_dir = create_temp_dir().unwrap();
        let evidence = temp_dir.path().join("VDI-01");
        create_windows_tree(&evidence).unwrap();
        let workspace_root = temp_dir.path().join("out");

        let inputs = vec![evidence.clone(), temp_dir.path().join("missing.vhd")];
        let report = run_batch(&inputs, &test_config(&workspace_root)).unwrap();

        assert_eq!(report.volumes.len(), 2);
        assert_eq!(report.volumes[0].status, VolumeStatus::Processed);
        assert_eq!(report.volumes[1].status, VolumeStatus::OpenFailed);
        assert_eq!(report.volumes[1].volume_id, "missing");
        assert_eq!(report.processed_volumes(), 1);
        assert!(workspace_root.join(DEFAULT_SUMMARY_NAME).is_file());
    }

    #[test]
    fn test_cancelled_runner_extracts_nothing() {
        let temp_dir = create_temp_dir().unwrap();
        let evidence = temp_dir.path().join("VDI-02");
        create_windows_tree(&evidence).unwrap();

        let runner = BatchRunner::new();
        runner.cancel_token().cancel();
        let report = runner
            .run(&[evidence], &test_config(&temp_dir.path().join("out")))
            .unwrap();

        assert_eq!(report.volumes[0].status, VolumeStatus::Processed);
        assert!(report.volumes[0].results.is_empty());
    }
}

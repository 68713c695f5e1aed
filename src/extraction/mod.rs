//! Target resolution and artifact extraction into per-volume workspaces

pub mod engine;
pub mod resolver;
pub mod workspace;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

use crate::constants::SYSTEM_USER_LABEL;
use crate::filesystem::FilesystemView;
use crate::models::ExtractionResult;

pub use engine::{ExtractionEngine, ExtractionOutcome};
pub use resolver::{resolve, ResolveError, ResolvedPath};
pub use workspace::{workspace_volume_id, StagedFile, Workspace};

/// Cooperative cancellation shared between a batch and its workers
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Resolve a template and extract every concrete path it yields.
///
/// Produces one result per concrete path, or a single failed result when
/// the template cannot be expanded.
pub fn resolve_and_extract(
    fs: &mut dyn FilesystemView,
    workspace: &Workspace,
    template: &str,
    chunk_size: usize,
    cancel: &CancelToken,
) -> Vec<ExtractionResult> {
    let resolved = match resolve(fs, template) {
        Ok(resolved) => resolved,
        Err(err) => {
            warn!("Could not resolve {}: {}", template, err);
            return vec![ExtractionResult {
                path: resolver::display_path(template),
                success: false,
                message: err.to_string(),
                user: SYSTEM_USER_LABEL.to_string(),
            }];
        }
    };

    let engine = ExtractionEngine::new(workspace, chunk_size, cancel);
    let results: Vec<ExtractionResult> = resolved
        .into_iter()
        .map(|target| {
            let outcome = engine.extract(fs, &target.path);
            ExtractionResult {
                success: outcome.is_success(),
                message: outcome.message(),
                path: target.path,
                user: target.user,
            }
        })
        .collect();

    let succeeded = results.iter().filter(|r| r.success).count();
    info!("{}: {}/{} paths extracted", template, succeeded, results.len());
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryFs;
    use tempfile::TempDir;

    #[test]
    fn test_one_result_per_profile() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::create(temp_dir.path()).unwrap();
        let mut fs = MemoryFs::new()
            .with_file("/Users/Alice/NTUSER.DAT", b"regf alice")
            .with_dir("/Users/Bob")
            .with_dir("/Users/Public");

        let results = resolve_and_extract(&mut fs, &workspace, "Users/*/NTUSER.DAT", 1024, &CancelToken::new());

        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert_eq!(results[0].user, "Alice");
        assert!(!results[1].success);
        assert_eq!(results[1].path, "/Users/Bob/NTUSER.DAT");
        assert_eq!(results[1].message, "not found");
        assert!(temp_dir.path().join("Users_Alice/NTUSER.DAT").is_file());
    }

    #[test]
    fn test_unresolvable_template_single_failure() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::create(temp_dir.path()).unwrap();
        let mut fs = MemoryFs::new().with_dir("/Windows");

        let results = resolve_and_extract(&mut fs, &workspace, "\\Users\\*\\Desktop", 1024, &CancelToken::new());
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(results[0].path, "/Users/*/Desktop");
        assert_eq!(results[0].message, "cannot open /Users");
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let worker = token.clone();
        assert!(!worker.is_cancelled());
        token.cancel();
        assert!(worker.is_cancelled());
    }
}

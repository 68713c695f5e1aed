//! Copies resolved evidence paths into a workspace

use std::io;

use log::{debug, warn};

use crate::constants::RESERVED_NAME_PREFIX;
use crate::extraction::workspace::Workspace;
use crate::extraction::CancelToken;
use crate::filesystem::{join_path, EntryKind, FilesystemView, FsError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    File { bytes: u64 },
    Directory { files: usize, failed: usize },
    NotFound,
    Failed(String),
    Cancelled,
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExtractionOutcome::File { .. } | ExtractionOutcome::Directory { .. }
        )
    }

    pub fn message(&self) -> String {
        match self {
            ExtractionOutcome::File { bytes } => format!("{} bytes extracted", bytes),
            ExtractionOutcome::Directory { files, failed } => {
                format!("{} files extracted, {} failed", files, failed)
            }
            ExtractionOutcome::NotFound => "not found".to_string(),
            ExtractionOutcome::Failed(reason) => reason.clone(),
            ExtractionOutcome::Cancelled => "cancelled".to_string(),
        }
    }
}

enum CopyError {
    Cancelled,
    Failed(String),
}

fn cancelled_error() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "extraction cancelled")
}

fn skip_child(name: &str) -> bool {
    name == "." || name == ".." || name.starts_with(RESERVED_NAME_PREFIX)
}

pub struct ExtractionEngine<'a> {
    workspace: &'a Workspace,
    chunk_size: usize,
    cancel: &'a CancelToken,
}

impl<'a> ExtractionEngine<'a> {
    pub fn new(workspace: &'a Workspace, chunk_size: usize, cancel: &'a CancelToken) -> Self {
        ExtractionEngine {
            workspace,
            chunk_size: chunk_size.max(1),
            cancel,
        }
    }

    /// Extract one concrete path. Never fails past this boundary: every
    /// error becomes an outcome.
    pub fn extract(&self, fs: &mut dyn FilesystemView, path: &str) -> ExtractionOutcome {
        if self.cancel.is_cancelled() {
            return ExtractionOutcome::Cancelled;
        }

        match fs.stat(path) {
            Ok(EntryKind::File) => match self.copy_file(fs, path) {
                Ok(bytes) => ExtractionOutcome::File { bytes },
                Err(CopyError::Cancelled) => ExtractionOutcome::Cancelled,
                Err(CopyError::Failed(reason)) => {
                    warn!("Failed to extract {}: {}", path, reason);
                    ExtractionOutcome::Failed(reason)
                }
            },
            Ok(EntryKind::Directory) => self.extract_tree(fs, path),
            Err(err) => {
                debug!("{} unavailable: {}", path, err);
                ExtractionOutcome::NotFound
            }
        }
    }

    /// Walk a directory with an explicit stack, saving every regular file
    /// under the flattened form of its own parent path
    fn extract_tree(&self, fs: &mut dyn FilesystemView, root: &str) -> ExtractionOutcome {
        let mut pending = vec![root.to_string()];
        let mut files = 0;
        let mut failed = 0;
        let mut root_listed = false;

        while let Some(directory) = pending.pop() {
            if self.cancel.is_cancelled() {
                return ExtractionOutcome::Cancelled;
            }

            let entries = match fs.list_dir(&directory) {
                Ok(entries) => entries,
                Err(err) if !root_listed => {
                    warn!("Failed to list {}: {}", directory, err);
                    return ExtractionOutcome::Failed(err.to_string());
                }
                Err(err) => {
                    warn!("Failed to list {}: {}", directory, err);
                    failed += 1;
                    continue;
                }
            };
            root_listed = true;

            let mut subdirectories = Vec::new();
            for entry in entries {
                if skip_child(&entry.name) {
                    continue;
                }
                let child = join_path(&directory, &entry.name);

                if entry.is_dir() {
                    subdirectories.push(child);
                    continue;
                }

                if self.cancel.is_cancelled() {
                    return ExtractionOutcome::Cancelled;
                }
                match self.copy_file(fs, &child) {
                    Ok(bytes) => {
                        debug!("Extracted {} ({} bytes)", child, bytes);
                        files += 1;
                    }
                    Err(CopyError::Cancelled) => return ExtractionOutcome::Cancelled,
                    Err(CopyError::Failed(reason)) => {
                        warn!("Failed to extract {}: {}", child, reason);
                        failed += 1;
                    }
                }
            }

            // reversed so the stack visits subdirectories in listing order
            pending.extend(subdirectories.into_iter().rev());
        }

        ExtractionOutcome::Directory { files, failed }
    }

    fn copy_file(&self, fs: &mut dyn FilesystemView, path: &str) -> Result<u64, CopyError> {
        let mut staged = self
            .workspace
            .stage(path)
            .map_err(|err| CopyError::Failed(format!("cannot create destination: {}", err)))?;

        let cancel = self.cancel;
        let copied = fs.read_file(path, self.chunk_size, &mut |chunk| {
            if cancel.is_cancelled() {
                return Err(cancelled_error());
            }
            staged.write_chunk(chunk)
        });

        match copied {
            Ok(bytes) => {
                staged
                    .commit()
                    .map_err(|err| CopyError::Failed(format!("cannot publish destination: {}", err)))?;
                Ok(bytes)
            }
            Err(_) if self.cancel.is_cancelled() => Err(CopyError::Cancelled),
            Err(FsError::NotFound(_)) => Err(CopyError::Failed("not found".to_string())),
            Err(err) => Err(CopyError::Failed(err.to_string())),
        }
    }
}

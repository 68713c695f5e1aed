//! Per-volume staging area on the analysis host

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::constants::{PARTIAL_FILE_SUFFIX, VOLUME_ID_FILE};
use crate::filesystem::path_segments;
use crate::security::{flatten_parent_path, sanitize_component, validate_relative};

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create (or reuse) the workspace root directory
    pub fn create<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Workspace { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_volume_id(&self, volume_id: &str) -> io::Result<()> {
        fs::write(self.root.join(VOLUME_ID_FILE), volume_id)
    }

    /// Where a file at `source_path` inside the evidence lands.
    ///
    /// `/Windows/Prefetch/x.pf` maps to `<root>/Windows_Prefetch/x.pf`; a
    /// file at the filesystem root lands directly in `<root>`.
    pub fn destination_for(&self, source_path: &str) -> PathBuf {
        let segments = path_segments(source_path);
        let (name, parents) = match segments.split_last() {
            Some((name, parents)) => (*name, parents),
            None => ("", &[][..]),
        };

        let folder = flatten_parent_path(&parents.join("/"));
        let mut destination = self.root.clone();
        if !folder.is_empty() {
            destination.push(folder);
        }
        destination.push(sanitize_component(name));
        destination
    }

    /// Open a staged destination for `source_path`, creating parent folders
    pub fn stage(&self, source_path: &str) -> io::Result<StagedFile> {
        let destination = self.destination_for(source_path);
        if let Ok(relative) = destination.strip_prefix(&self.root) {
            validate_relative(relative)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
        }
        StagedFile::create(destination)
    }
}

/// Volume id recorded in a workspace, or the workspace folder name when
/// none was recorded
pub fn workspace_volume_id(root: &Path) -> String {
    let recorded = fs::read_to_string(root.join(VOLUME_ID_FILE))
        .map(|content| content.trim().to_string())
        .unwrap_or_default();
    if !recorded.is_empty() {
        return recorded;
    }

    root.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| root.display().to_string())
}

/// A destination file written under a `.partial` name.
///
/// Only `commit` publishes the file under its final name; dropping an
/// uncommitted stage removes the partial file.
pub struct StagedFile {
    partial_path: PathBuf,
    final_path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl StagedFile {
    fn create(final_path: PathBuf) -> io::Result<Self> {
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut partial_name = final_path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        partial_name.push(PARTIAL_FILE_SUFFIX);
        let partial_path = final_path.with_file_name(partial_name);

        let file = File::create(&partial_path)?;
        Ok(StagedFile {
            partial_path,
            final_path,
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.write_all(chunk),
            None => Err(io::Error::new(io::ErrorKind::Other, "staged file already closed")),
        }
    }

    /// Flush, close and rename to the final destination
    pub fn commit(mut self) -> io::Result<PathBuf> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|err| err.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&self.partial_path, &self.final_path)?;
        Ok(self.final_path.clone())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        // close the handle before removing
        self.writer.take();
        if self.partial_path.exists() {
            debug!("Removing incomplete {}", self.partial_path.display());
            let _ = fs::remove_file(&self.partial_path);
        }
    }
}

//! Filesystem view over a directory tree on the analysis host.
//!
//! Used for logical evidence (a volume already mounted or exported to a
//! folder) and as the bind target for directories passed to the batch runner.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::constants::HOST_READ_BUFFER_SIZE;
use crate::evidence::VolumeSource;
use crate::filesystem::{
    path_segments, ChunkSink, DirEntry, EntryKind, FilesystemBinder, FilesystemView, FsError,
};

pub struct HostDirView {
    root: PathBuf,
}

impl HostDirView {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, FsError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(FsError::Bind {
                offset: 0,
                reason: format!("{} is not a directory", root.display()),
            });
        }
        Ok(HostDirView { root })
    }

    /// Walk the segments, matching each one case-insensitively against the
    /// actual directory contents. `.` and `..` never resolve, so lookups
    /// stay below the root.
    fn locate(&self, path: &str) -> Result<PathBuf, FsError> {
        let mut current = self.root.clone();

        for segment in path_segments(path) {
            if segment == ".." || segment == "." {
                return Err(FsError::NotFound(path.to_string()));
            }

            let exact = current.join(segment);
            if exact.exists() {
                current = exact;
                continue;
            }

            let wanted = segment.to_lowercase();
            let matched = fs::read_dir(&current)
                .map_err(|_| FsError::NotFound(path.to_string()))?
                .filter_map(|entry| entry.ok())
                .find(|entry| entry.file_name().to_string_lossy().to_lowercase() == wanted);

            match matched {
                Some(entry) => current = entry.path(),
                None => return Err(FsError::NotFound(path.to_string())),
            }
        }

        Ok(current)
    }
}

impl FilesystemView for HostDirView {
    fn stat(&mut self, path: &str) -> Result<EntryKind, FsError> {
        let located = self.locate(path)?;
        let metadata = fs::metadata(&located)?;
        if metadata.is_dir() {
            Ok(EntryKind::Directory)
        } else {
            Ok(EntryKind::File)
        }
    }

    fn list_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let located = self.locate(path)?;
        if !located.is_dir() {
            return Err(FsError::NotADirectory(path.to_string()));
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&located)? {
            let entry = entry?;
            let kind = if entry.file_type()?.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                kind,
            });
        }

        // read_dir order is unspecified; sort so a run is repeatable
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_file(
        &mut self,
        path: &str,
        chunk_size: usize,
        sink: &mut ChunkSink<'_>,
    ) -> Result<u64, FsError> {
        let located = self.locate(path)?;
        if located.is_dir() {
            return Err(FsError::Decode(format!("{} is a directory", path)));
        }

        let mut file = File::open(&located)?;
        let chunk_size = if chunk_size == 0 { HOST_READ_BUFFER_SIZE } else { chunk_size };
        let mut buffer = vec![0u8; chunk_size];
        let mut total = 0u64;

        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            sink(&buffer[..read])?;
            total += read as u64;
        }

        Ok(total)
    }
}

/// Binds a host directory regardless of the volume offset
pub struct HostBinder {
    root: PathBuf,
}

impl HostBinder {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        HostBinder {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl FilesystemBinder for HostBinder {
    fn bind(
        &self,
        _source: Arc<dyn VolumeSource>,
        offset: u64,
    ) -> Result<Box<dyn FilesystemView>, FsError> {
        if offset != 0 {
            return Err(FsError::Bind {
                offset,
                reason: "host directories only bind at offset 0".to_string(),
            });
        }
        Ok(Box::new(HostDirView::new(&self.root)?))
    }
}

//! Navigable filesystem trees bound inside an evidence volume

pub mod host;
pub mod ntfs;

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::evidence::VolumeSource;

pub use self::host::{HostBinder, HostDirView};
pub use self::ntfs::{NtfsBinder, NtfsView};

#[derive(Debug, Error)]
pub enum FsError {
    #[error("no filesystem at offset {offset}: {reason}")]
    Bind { offset: u64, reason: String },

    #[error("path not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("filesystem decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn file(name: &str) -> Self {
        DirEntry {
            name: name.to_string(),
            kind: EntryKind::File,
        }
    }

    pub fn directory(name: &str) -> Self {
        DirEntry {
            name: name.to_string(),
            kind: EntryKind::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Receives file content one chunk at a time
pub type ChunkSink<'a> = dyn FnMut(&[u8]) -> io::Result<()> + 'a;

/// A directory/file tree rooted somewhere inside a volume.
///
/// Paths are `/`-separated and matched case-insensitively. Every call takes
/// `&mut self`: implementations share one stateful read cursor, so a view
/// must be driven by a single walker at a time.
pub trait FilesystemView: Send {
    fn stat(&mut self, path: &str) -> Result<EntryKind, FsError>;

    /// List a directory in the order the filesystem stores it
    fn list_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, FsError>;

    /// Stream a regular file to `sink` in chunks of at most `chunk_size` bytes.
    /// Returns the number of bytes delivered.
    fn read_file(
        &mut self,
        path: &str,
        chunk_size: usize,
        sink: &mut ChunkSink<'_>,
    ) -> Result<u64, FsError>;
}

/// Opens a filesystem at a byte offset of a volume
pub trait FilesystemBinder: Send + Sync {
    fn bind(
        &self,
        source: Arc<dyn VolumeSource>,
        offset: u64,
    ) -> Result<Box<dyn FilesystemView>, FsError>;
}

/// Split a view path into its non-empty segments
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Join a parent view path and a child name
pub fn join_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    if parent.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments() {
        assert_eq!(path_segments("/Users/Alice/Desktop"), vec!["Users", "Alice", "Desktop"]);
        assert_eq!(path_segments("Windows\\Prefetch\\"), vec!["Windows", "Prefetch"]);
        assert!(path_segments("/").is_empty());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "Users"), "/Users");
        assert_eq!(join_path("", "Users"), "/Users");
        assert_eq!(join_path("/Users/", "Bob"), "/Users/Bob");
    }
}

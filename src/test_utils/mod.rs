//! Test utilities for vdi-collector
//!
//! In-memory volume sources and filesystem views, plus record builders
//! shared by the unit tests.

#![cfg(test)]

use anyhow::Result;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub use self::mock_fs::MemoryFs;
pub use self::mock_volume::MemorySource;

/// Creates a temporary directory that is automatically cleaned up
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Lays out a small Windows-like tree on the host for `HostDirView` tests
pub fn create_windows_tree(base_path: &Path) -> Result<()> {
    fs::create_dir_all(base_path.join("Windows/Prefetch"))?;
    fs::create_dir_all(base_path.join("Windows/System32/winevt/Logs"))?;
    fs::create_dir_all(base_path.join("Users/Alice/Desktop"))?;
    fs::create_dir_all(base_path.join("Users/Bob/Desktop"))?;
    fs::create_dir_all(base_path.join("Users/Public/Desktop"))?;

    fs::write(base_path.join("Windows/Prefetch/CMD.EXE-4A81B364.pf"), b"prefetch one")?;
    fs::write(base_path.join("Windows/Prefetch/NOTEPAD.EXE-D8414F97.pf"), b"prefetch two")?;
    fs::write(base_path.join("Users/Alice/Desktop/notes.txt"), b"alice notes")?;
    fs::write(base_path.join("Users/Bob/Desktop/report.docx"), b"bob report")?;

    Ok(())
}

/// Identity record builders
pub mod generators {
    use crate::identity::models::{LogonEvent, ProfileRow};
    use chrono::NaiveDateTime;

    pub fn at(time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(time, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    pub fn logon(time: &str, username: &str, sid: &str, domain: &str) -> LogonEvent {
        LogonEvent {
            time: at(time),
            username: username.to_string(),
            sid: sid.to_string(),
            domain: domain.to_string(),
            logon_type: "2".to_string(),
        }
    }

    pub fn profile(sid: &str, profile_path: &str) -> ProfileRow {
        ProfileRow {
            sid: sid.to_string(),
            profile_path: profile_path.to_string(),
        }
    }
}

/// In-memory volume byte source
pub mod mock_volume {
    use crate::evidence::VolumeSource;
    use std::io;

    pub struct MemorySource {
        bytes: Vec<u8>,
    }

    impl MemorySource {
        pub fn new(bytes: Vec<u8>) -> Self {
            Self { bytes }
        }
    }

    impl VolumeSource for MemorySource {
        fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            let len = self.bytes.len() as u64;
            if offset >= len {
                return Ok(0);
            }
            let start = offset as usize;
            let count = buf.len().min(self.bytes.len() - start);
            buf[..count].copy_from_slice(&self.bytes[start..start + count]);
            Ok(count)
        }

        fn size(&self) -> u64 {
            self.bytes.len() as u64
        }
    }
}

/// In-memory filesystem view
pub mod mock_fs {
    use crate::filesystem::{
        path_segments, ChunkSink, DirEntry, EntryKind, FilesystemView, FsError,
    };
    use std::collections::{HashMap, HashSet};
    use std::io;

    /// Case-insensitive tree that lists children in insertion order
    #[derive(Clone, Default)]
    pub struct MemoryFs {
        children: HashMap<String, Vec<DirEntry>>,
        files: HashMap<String, Vec<u8>>,
        broken: HashSet<String>,
    }

    fn key(path: &str) -> String {
        let segments = path_segments(path);
        format!("/{}", segments.join("/")).to_lowercase()
    }

    impl MemoryFs {
        pub fn new() -> Self {
            let mut fs = Self::default();
            fs.children.insert("/".to_string(), Vec::new());
            fs
        }

        /// Add a directory and any missing parents
        pub fn with_dir(mut self, path: &str) -> Self {
            self.add_dir(path);
            self
        }

        /// Add a file and any missing parent directories
        pub fn with_file(mut self, path: &str, content: &[u8]) -> Self {
            let segments = path_segments(path);
            let Some((name, parents)) = segments.split_last() else {
                return self;
            };
            let parent = format!("/{}", parents.join("/"));
            self.add_dir(&parent);
            self.push_child(&parent, DirEntry::file(name));
            self.files.insert(key(path), content.to_vec());
            self
        }

        /// A file that lists normally but fails when read
        pub fn with_broken_file(mut self, path: &str) -> Self {
            self = self.with_file(path, b"");
            self.broken.insert(key(path));
            self
        }

        fn add_dir(&mut self, path: &str) {
            let mut current = String::new();
            for segment in path_segments(path) {
                let parent = if current.is_empty() { "/".to_string() } else { current.clone() };
                current = format!("{}/{}", current, segment);
                if !self.children.contains_key(&key(&current)) {
                    self.push_child(&parent, DirEntry::directory(segment));
                    self.children.insert(key(&current), Vec::new());
                }
            }
        }

        fn push_child(&mut self, parent: &str, entry: DirEntry) {
            self.children.entry(key(parent)).or_default().push(entry);
        }
    }

    impl FilesystemView for MemoryFs {
        fn stat(&mut self, path: &str) -> Result<EntryKind, FsError> {
            let path_key = key(path);
            if self.children.contains_key(&path_key) {
                Ok(EntryKind::Directory)
            } else if self.files.contains_key(&path_key) {
                Ok(EntryKind::File)
            } else {
                Err(FsError::NotFound(path.to_string()))
            }
        }

        fn list_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, FsError> {
            let path_key = key(path);
            match self.children.get(&path_key) {
                Some(entries) => Ok(entries.clone()),
                None if self.files.contains_key(&path_key) => {
                    Err(FsError::NotADirectory(path.to_string()))
                }
                None => Err(FsError::NotFound(path.to_string())),
            }
        }

        fn read_file(
            &mut self,
            path: &str,
            chunk_size: usize,
            sink: &mut ChunkSink<'_>,
        ) -> Result<u64, FsError> {
            let path_key = key(path);
            if self.broken.contains(&path_key) {
                return Err(FsError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "simulated read failure",
                )));
            }
            let content = self
                .files
                .get(&path_key)
                .ok_or_else(|| FsError::NotFound(path.to_string()))?;

            for chunk in content.chunks(chunk_size.max(1)) {
                sink(chunk)?;
            }
            Ok(content.len() as u64)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_memory_fs() {
            let mut fs = MemoryFs::new()
                .with_file("/Users/Alice/NTUSER.DAT", b"regf")
                .with_dir("/Users/Bob");

            assert_eq!(fs.stat("/users/ALICE").unwrap(), EntryKind::Directory);
            assert_eq!(fs.stat("/Users/Alice/ntuser.dat").unwrap(), EntryKind::File);
            assert!(fs.stat("/nonexistent").is_err());

            let users = fs.list_dir("/Users").unwrap();
            assert_eq!(users, vec![DirEntry::directory("Alice"), DirEntry::directory("Bob")]);

            let mut content = Vec::new();
            fs.read_file("/Users/Alice/NTUSER.DAT", 2, &mut |chunk| {
                content.extend_from_slice(chunk);
                Ok(())
            })
            .unwrap();
            assert_eq!(content, b"regf");
        }
    }
}

//! NTFS filesystem view through the `ntfs` crate

use std::io::BufReader;
use std::sync::Arc;

use log::debug;
use ntfs::indexes::NtfsFileNameIndex;
use ntfs::structured_values::NtfsFileNamespace;
use ntfs::{Ntfs, NtfsError, NtfsFile, NtfsIndexEntry, NtfsReadSeek};

use crate::evidence::{OffsetReader, VolumeSource};
use crate::filesystem::{
    path_segments, ChunkSink, DirEntry, EntryKind, FilesystemBinder, FilesystemView, FsError,
};

type Reader = BufReader<OffsetReader>;

fn decode(err: NtfsError) -> FsError {
    FsError::Decode(format!("{err:?}"))
}

pub struct NtfsView {
    ntfs: Ntfs,
    fs: Reader,
}

impl NtfsView {
    pub fn open(source: Arc<dyn VolumeSource>, offset: u64) -> Result<Self, FsError> {
        let mut fs = BufReader::new(OffsetReader::new(source, offset));
        let ntfs = Ntfs::new(&mut fs).map_err(|err| FsError::Bind {
            offset,
            reason: format!("{err:?}"),
        })?;

        // a boot sector alone is not enough, the MFT must resolve the root
        ntfs.root_directory(&mut fs).map_err(|err| FsError::Bind {
            offset,
            reason: format!("{err:?}"),
        })?;

        debug!(
            "Bound NTFS at offset {} (cluster size {})",
            offset,
            ntfs.cluster_size()
        );
        Ok(NtfsView { ntfs, fs })
    }
}

/// Long name of an index entry, skipping 8.3 duplicates and the "." loopback
fn entry_name(entry: &NtfsIndexEntry<'_, NtfsFileNameIndex>) -> Option<String> {
    let file_name = entry.key()?.ok()?;
    if file_name.namespace() == NtfsFileNamespace::Dos {
        return None;
    }
    let name = file_name.name().to_string_lossy();
    if name == "." {
        return None;
    }
    Some(name)
}

fn locate<'n>(ntfs: &'n Ntfs, fs: &mut Reader, path: &str) -> Result<NtfsFile<'n>, FsError> {
    let mut current = ntfs.root_directory(fs).map_err(decode)?;

    for segment in path_segments(path) {
        if !current.is_directory() {
            return Err(FsError::NotFound(path.to_string()));
        }

        let wanted = segment.to_lowercase();
        let reference = {
            let index = current.directory_index(fs).map_err(decode)?;
            let mut iter = index.entries();
            let mut found = None;
            while let Some(entry) = iter.next(fs) {
                let entry = entry.map_err(decode)?;
                if entry_name(&entry).is_some_and(|name| name.to_lowercase() == wanted) {
                    found = Some(entry.file_reference());
                    break;
                }
            }
            found
        };

        current = match reference {
            Some(reference) => reference.to_file(ntfs, fs).map_err(decode)?,
            None => return Err(FsError::NotFound(path.to_string())),
        };
    }

    Ok(current)
}

impl FilesystemView for NtfsView {
    fn stat(&mut self, path: &str) -> Result<EntryKind, FsError> {
        let NtfsView { ntfs, fs } = self;
        let file = locate(ntfs, fs, path)?;
        if file.is_directory() {
            Ok(EntryKind::Directory)
        } else {
            Ok(EntryKind::File)
        }
    }

    fn list_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let NtfsView { ntfs, fs } = self;
        let directory = locate(ntfs, fs, path)?;
        if !directory.is_directory() {
            return Err(FsError::NotADirectory(path.to_string()));
        }

        let mut listed = Vec::new();
        {
            let index = directory.directory_index(fs).map_err(decode)?;
            let mut iter = index.entries();
            while let Some(entry) = iter.next(fs) {
                let entry = entry.map_err(decode)?;
                if let Some(name) = entry_name(&entry) {
                    listed.push((name, entry.file_reference()));
                }
            }
        }

        let mut entries = Vec::with_capacity(listed.len());
        for (name, reference) in listed {
            let file = reference.to_file(ntfs, fs).map_err(decode)?;
            let kind = if file.is_directory() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(DirEntry { name, kind });
        }

        Ok(entries)
    }

    fn read_file(
        &mut self,
        path: &str,
        chunk_size: usize,
        sink: &mut ChunkSink<'_>,
    ) -> Result<u64, FsError> {
        let NtfsView { ntfs, fs } = self;
        let file = locate(ntfs, fs, path)?;
        if file.is_directory() {
            return Err(FsError::Decode(format!("{} is a directory", path)));
        }

        let data_item = match file.data(fs, "") {
            Some(item) => item.map_err(decode)?,
            None => return Err(FsError::Decode(format!("{} has no $DATA stream", path))),
        };
        let data_attribute = data_item.to_attribute().map_err(decode)?;
        let mut value = data_attribute.value(fs).map_err(decode)?;

        let mut buffer = vec![0u8; chunk_size.max(1)];
        let mut total = 0u64;
        loop {
            let read = value.read(fs, &mut buffer).map_err(decode)?;
            if read == 0 {
                break;
            }
            sink(&buffer[..read])?;
            total += read as u64;
        }

        Ok(total)
    }
}

/// Binds NTFS volumes at partition offsets
#[derive(Debug, Default, Clone, Copy)]
pub struct NtfsBinder;

impl FilesystemBinder for NtfsBinder {
    fn bind(
        &self,
        source: Arc<dyn VolumeSource>,
        offset: u64,
    ) -> Result<Box<dyn FilesystemView>, FsError> {
        Ok(Box::new(NtfsView::open(source, offset)?))
    }
}

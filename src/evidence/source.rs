use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::evidence::VolumeError;

lazy_static! {
    static ref SEGMENT_NAME: Regex = Regex::new(r"^(?P<base>.+)\.(?P<num>\d{3})$").unwrap();
}

/// Read-only random access over the bytes of one evidence volume.
///
/// Implementations serialise their own cursor, so a source can be shared
/// between the partition selector and the filesystem it finally binds.
pub trait VolumeSource: Send + Sync {
    /// Read up to `buf.len()` bytes at `offset`. Returns 0 at or past the end.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Logical size of the volume in bytes
    fn size(&self) -> u64;

    /// Fill `buf` completely or fail with `UnexpectedEof`
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let read = self.read_at(offset + filled as u64, &mut buf[filled..])?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("short read at offset {}", offset + filled as u64),
                ));
            }
            filled += read;
        }
        Ok(())
    }
}

pub(crate) fn lock_cursor<T>(cursor: &Mutex<T>) -> io::Result<MutexGuard<'_, T>> {
    cursor
        .lock()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "volume cursor lock poisoned"))
}

/// Flat image backed by one host file
pub struct FileSource {
    file: Mutex<File>,
    size: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self, VolumeError> {
        let file = File::open(path).map_err(|source| VolumeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let size = file
            .metadata()
            .map_err(|source| VolumeError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        Ok(FileSource {
            file: Mutex::new(file),
            size,
        })
    }

    /// Expose only the first `size` bytes of the file (containers with trailers)
    pub fn with_logical_size(mut self, size: u64) -> Self {
        self.size = size.min(self.size);
        self
    }
}

impl VolumeSource for FileSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.size {
            return Ok(0);
        }
        let wanted = buf.len().min((self.size - offset) as usize);
        let mut file = lock_cursor(&self.file)?;
        file.seek(SeekFrom::Start(offset))?;
        file.read(&mut buf[..wanted])
    }

    fn size(&self) -> u64 {
        self.size
    }
}

struct Segment {
    path: PathBuf,
    start: u64,
    size: u64,
}

/// Flat image split into numbered segments (.001, .002, ...)
pub struct SegmentedSource {
    segments: Vec<Segment>,
    current: Mutex<Option<(usize, File)>>,
    size: u64,
}

impl SegmentedSource {
    pub fn open(first_segment: &Path) -> Result<Self, VolumeError> {
        let discovered = discover_segments(first_segment)?;

        let mut segments = Vec::with_capacity(discovered.len());
        let mut start = 0;
        for (path, size) in discovered {
            segments.push(Segment { path, start, size });
            start += size;
        }

        debug!(
            "Discovered {} segments ({} bytes) for {}",
            segments.len(),
            start,
            first_segment.display()
        );

        Ok(SegmentedSource {
            segments,
            current: Mutex::new(None),
            size: start,
        })
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn segment_for(&self, offset: u64) -> Option<usize> {
        let index = self.segments.partition_point(|segment| segment.start <= offset);
        index.checked_sub(1)
    }
}

impl VolumeSource for SegmentedSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.size {
            return Ok(0);
        }

        let mut current = lock_cursor(&self.current)?;
        let mut total = 0;
        let wanted = buf.len().min((self.size - offset) as usize);

        while total < wanted {
            let position = offset + total as u64;
            let Some(index) = self.segment_for(position) else {
                break;
            };
            let segment = &self.segments[index];

            let reopen = !matches!(current.as_ref(), Some((open_index, _)) if *open_index == index);
            if reopen {
                *current = Some((index, File::open(&segment.path)?));
            }
            let Some((_, file)) = current.as_mut() else {
                break;
            };

            let within = position - segment.start;
            let to_read = (wanted - total).min((segment.size - within) as usize);
            file.seek(SeekFrom::Start(within))?;
            let read = file.read(&mut buf[total..total + to_read])?;
            if read == 0 {
                break;
            }
            total += read;
        }

        Ok(total)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// Find every numbered segment that follows `first_segment`, in order.
///
/// The chain stops at the first missing number; a chain that does not start
/// at `.001` is reported as a missing segment.
pub fn discover_segments(first_segment: &Path) -> Result<Vec<(PathBuf, u64)>, VolumeError> {
    let file_name = first_segment
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let parent = first_segment.parent().unwrap_or_else(|| Path::new("."));

    let captures = SEGMENT_NAME
        .captures(&file_name)
        .ok_or_else(|| VolumeError::Malformed {
            path: first_segment.to_path_buf(),
            reason: "segment name does not end in a three digit number".to_string(),
        })?;
    let base = captures["base"].to_string();

    if &captures["num"] != "001" {
        return Err(VolumeError::MissingSegment {
            path: first_segment.to_path_buf(),
            segment: format!("{}.001", base),
        });
    }

    let mut segments = Vec::new();
    for number in 1..=999 {
        let candidate = parent.join(format!("{}.{:03}", base, number));
        let metadata = match candidate.metadata() {
            Ok(metadata) => metadata,
            Err(_) => break,
        };
        segments.push((candidate, metadata.len()));
    }

    if segments.is_empty() {
        return Err(VolumeError::MissingSegment {
            path: first_segment.to_path_buf(),
            segment: format!("{}.001", base),
        });
    }

    Ok(segments)
}

/// `Read + Seek` view of a volume starting at a byte offset.
///
/// Filesystem collaborators consume this to parse a partition in place.
pub struct OffsetReader {
    source: Arc<dyn VolumeSource>,
    base: u64,
    len: u64,
    position: u64,
}

impl OffsetReader {
    pub fn new(source: Arc<dyn VolumeSource>, base: u64) -> Self {
        let len = source.size().saturating_sub(base);
        OffsetReader {
            source,
            base,
            len,
            position: 0,
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Read for OffsetReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.len {
            return Ok(0);
        }
        let wanted = buf.len().min((self.len - self.position) as usize);
        let read = self
            .source
            .read_at(self.base + self.position, &mut buf[..wanted])?;
        self.position += read as u64;
        Ok(read)
    }
}

impl Seek for OffsetReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };

        match target {
            Some(position) => {
                self.position = position;
                Ok(position)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of volume",
            )),
        }
    }
}

//! Microsoft VHD (v1) reader.
//!
//! Fixed disks are flat images followed by a 512-byte footer. Dynamic disks
//! keep a copy of the footer at offset 0, a dynamic header that locates the
//! block allocation table, and data blocks each prefixed by a sector bitmap.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use log::debug;

use crate::constants::{
    VHD_DYNAMIC_COOKIE, VHD_FOOTER_COOKIE, VHD_FOOTER_SIZE, VHD_UNALLOCATED_BLOCK,
};
use crate::evidence::source::{lock_cursor, FileSource, VolumeSource};
use crate::evidence::VolumeError;

const SECTOR: u64 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VhdDiskType {
    Fixed,
    Dynamic,
    Differencing,
}

#[derive(Debug, Clone)]
pub struct VhdFooter {
    pub disk_type: VhdDiskType,
    pub data_offset: u64,
    pub current_size: u64,
}

fn be_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_be_bytes(raw)
}

fn be_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_be_bytes(raw)
}

impl VhdFooter {
    pub fn parse(bytes: &[u8], path: &Path) -> Result<Self, VolumeError> {
        let malformed = |reason: &str| VolumeError::Malformed {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if bytes.len() < VHD_FOOTER_SIZE as usize || &bytes[..8] != VHD_FOOTER_COOKIE {
            return Err(malformed("missing VHD footer cookie"));
        }

        let disk_type = match be_u32(bytes, 60) {
            2 => VhdDiskType::Fixed,
            3 => VhdDiskType::Dynamic,
            4 => VhdDiskType::Differencing,
            other => return Err(malformed(&format!("unknown VHD disk type {}", other))),
        };

        Ok(VhdFooter {
            disk_type,
            data_offset: be_u64(bytes, 16),
            current_size: be_u64(bytes, 48),
        })
    }
}

/// Sparse VHD: reads are translated through the block allocation table
pub struct DynamicVhdSource {
    file: Mutex<File>,
    table: Vec<u32>,
    block_size: u64,
    bitmap_size: u64,
    size: u64,
}

impl DynamicVhdSource {
    fn open(path: &Path, mut file: File, footer: &VhdFooter) -> Result<Self, VolumeError> {
        let io_err = |source: io::Error| VolumeError::Io {
            path: path.to_path_buf(),
            source,
        };
        let malformed = |reason: &str| VolumeError::Malformed {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let mut header = [0u8; 1024];
        file.seek(SeekFrom::Start(footer.data_offset)).map_err(io_err)?;
        file.read_exact(&mut header).map_err(io_err)?;
        if &header[..8] != VHD_DYNAMIC_COOKIE {
            return Err(malformed("missing VHD dynamic header cookie"));
        }

        let table_offset = be_u64(&header, 16);
        let max_entries = be_u32(&header, 28) as usize;
        let block_size = be_u32(&header, 32) as u64;
        if block_size == 0 || block_size % SECTOR != 0 {
            return Err(malformed("invalid VHD block size"));
        }

        let file_len = file.metadata().map_err(io_err)?.len();
        let table_len = max_entries as u64 * 4;
        if table_offset > file_len || table_len > file_len - table_offset {
            return Err(malformed("VHD block allocation table extends past end of file"));
        }

        let mut raw_table = vec![0u8; table_len as usize];
        file.seek(SeekFrom::Start(table_offset)).map_err(io_err)?;
        file.read_exact(&mut raw_table).map_err(io_err)?;
        let table = raw_table
            .chunks_exact(4)
            .map(|entry| be_u32(entry, 0))
            .collect::<Vec<_>>();

        let bitmap_bytes = (block_size / SECTOR).div_ceil(8);
        let bitmap_size = bitmap_bytes.div_ceil(SECTOR) * SECTOR;

        debug!(
            "Dynamic VHD {}: {} blocks of {} bytes, {} allocated",
            path.display(),
            table.len(),
            block_size,
            table.iter().filter(|&&entry| entry != VHD_UNALLOCATED_BLOCK).count()
        );

        Ok(DynamicVhdSource {
            file: Mutex::new(file),
            table,
            block_size,
            bitmap_size,
            size: footer.current_size,
        })
    }
}

impl VolumeSource for DynamicVhdSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.size {
            return Ok(0);
        }

        let wanted = buf.len().min((self.size - offset) as usize);
        let mut file = lock_cursor(&self.file)?;
        let mut total = 0;

        while total < wanted {
            let position = offset + total as u64;
            let block = (position / self.block_size) as usize;
            let within = position % self.block_size;
            let span = (wanted - total).min((self.block_size - within) as usize);
            let target = &mut buf[total..total + span];

            match self.table.get(block) {
                Some(&entry) if entry != VHD_UNALLOCATED_BLOCK => {
                    let physical = entry as u64 * SECTOR + self.bitmap_size + within;
                    file.seek(SeekFrom::Start(physical))?;
                    file.read_exact(target)?;
                }
                _ => target.fill(0),
            }
            total += span;
        }

        Ok(total)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// Open a VHD file as a flat volume source
pub fn open_vhd(path: &Path) -> Result<Box<dyn VolumeSource>, VolumeError> {
    let io_err = |source: io::Error| VolumeError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;
    let file_len = file.metadata().map_err(io_err)?.len();
    if file_len < VHD_FOOTER_SIZE {
        return Err(VolumeError::Malformed {
            path: path.to_path_buf(),
            reason: "file is smaller than a VHD footer".to_string(),
        });
    }

    let mut footer_bytes = [0u8; VHD_FOOTER_SIZE as usize];
    file.seek(SeekFrom::Start(file_len - VHD_FOOTER_SIZE)).map_err(io_err)?;
    file.read_exact(&mut footer_bytes).map_err(io_err)?;
    let footer = VhdFooter::parse(&footer_bytes, path)?;

    match footer.disk_type {
        VhdDiskType::Fixed => {
            let source = FileSource::open(path)?.with_logical_size(file_len - VHD_FOOTER_SIZE);
            Ok(Box::new(source))
        }
        VhdDiskType::Dynamic => Ok(Box::new(DynamicVhdSource::open(path, file, &footer)?)),
        VhdDiskType::Differencing => Err(VolumeError::Malformed {
            path: path.to_path_buf(),
            reason: "differencing VHD needs its parent chain".to_string(),
        }),
    }
}

//! MBR and GPT partition table enumeration

use std::io;

use log::{debug, warn};
use serde::Serialize;

use crate::constants::{
    GPT_MAX_ENTRIES, GPT_MAX_ENTRY_SIZE, GPT_SIGNATURE, MBR_SIGNATURE, MBR_TYPE_GPT_PROTECTIVE,
    MIN_SECTOR_SIZE,
};
use crate::evidence::VolumeSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TableKind {
    Mbr,
    Gpt,
}

/// One partition entry, in sectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionEntry {
    pub index: usize,
    pub table: TableKind,
    pub start_sector: u64,
    pub sector_count: u64,
}

impl PartitionEntry {
    /// `None` when the start sector does not fit a byte offset
    pub fn byte_offset(&self, sector_size: u64) -> Option<u64> {
        self.start_sector.checked_mul(sector_size)
    }
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn le_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

pub fn is_valid_sector_size(sector_size: u64) -> bool {
    sector_size >= MIN_SECTOR_SIZE && sector_size.is_power_of_two()
}

/// List partitions in table order. A volume without a recognisable table
/// yields an empty list. Entries starting beyond the end of the volume are
/// dropped.
pub fn enumerate_partitions(
    source: &dyn VolumeSource,
    sector_size: u64,
) -> io::Result<Vec<PartitionEntry>> {
    if !is_valid_sector_size(sector_size) {
        warn!("Invalid sector size {}, treating volume as unpartitioned", sector_size);
        return Ok(Vec::new());
    }

    let mut mbr = [0u8; 512];
    if source.size() < 512 {
        return Ok(Vec::new());
    }
    source.read_exact_at(0, &mut mbr)?;

    if mbr[510..512] != MBR_SIGNATURE {
        debug!("No MBR signature, treating volume as unpartitioned");
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for slot in 0..4 {
        let base = 446 + slot * 16;
        let part_type = mbr[base + 4];
        if part_type == 0 {
            continue;
        }

        if part_type == MBR_TYPE_GPT_PROTECTIVE {
            match read_gpt(source, sector_size) {
                Ok(Some(gpt)) => return Ok(within_volume(gpt, source.size(), sector_size)),
                Ok(None) => warn!("Protective MBR without a valid GPT header"),
                Err(err) => warn!("Failed to read GPT: {}", err),
            }
            continue;
        }

        entries.push(PartitionEntry {
            index: entries.len(),
            table: TableKind::Mbr,
            start_sector: le_u32(&mbr, base + 8) as u64,
            sector_count: le_u32(&mbr, base + 12) as u64,
        });
    }

    Ok(within_volume(entries, source.size(), sector_size))
}

fn within_volume(entries: Vec<PartitionEntry>, volume_size: u64, sector_size: u64) -> Vec<PartitionEntry> {
    entries
        .into_iter()
        .filter(|entry| match entry.byte_offset(sector_size) {
            Some(offset) if offset < volume_size => true,
            Some(offset) => {
                debug!(
                    "Dropping partition {}: offset {} beyond volume size {}",
                    entry.index, offset, volume_size
                );
                false
            }
            None => {
                debug!("Dropping partition {}: start sector {} overflows", entry.index, entry.start_sector);
                false
            }
        })
        .collect()
}

fn read_gpt(source: &dyn VolumeSource, sector_size: u64) -> io::Result<Option<Vec<PartitionEntry>>> {
    let mut header = vec![0u8; sector_size as usize];
    source.read_exact_at(sector_size, &mut header)?;
    if &header[..8] != GPT_SIGNATURE {
        return Ok(None);
    }

    let entries_lba = le_u64(&header, 72);
    let entry_count = le_u32(&header, 80).min(GPT_MAX_ENTRIES);
    let entry_size = le_u32(&header, 84) as usize;
    if !(128..=GPT_MAX_ENTRY_SIZE).contains(&entry_size) {
        debug!("GPT entry size {} out of range", entry_size);
        return Ok(None);
    }

    let table_offset = match entries_lba.checked_mul(sector_size) {
        Some(offset) if offset < source.size() => offset,
        _ => {
            debug!("GPT entry array at LBA {} lies outside the volume", entries_lba);
            return Ok(None);
        }
    };

    let mut raw = vec![0u8; entry_count as usize * entry_size];
    source.read_exact_at(table_offset, &mut raw)?;

    let mut entries = Vec::new();
    for entry in raw.chunks_exact(entry_size) {
        if entry[..16].iter().all(|&b| b == 0) {
            continue;
        }
        let first_lba = le_u64(entry, 32);
        let last_lba = le_u64(entry, 40);
        if last_lba < first_lba {
            continue;
        }
        let sector_count = match (last_lba - first_lba).checked_add(1) {
            Some(count) => count,
            None => {
                debug!("Skipping GPT entry spanning the whole LBA range");
                continue;
            }
        };
        entries.push(PartitionEntry {
            index: entries.len(),
            table: TableKind::Gpt,
            start_sector: first_lba,
            sector_count,
        });
    }

    Ok(Some(entries))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// MBR sector with the given (type, start, count) primary entries
    pub fn mbr(partitions: &[(u8, u32, u32)]) -> Vec<u8> {
        let mut sector = vec![0u8; 512];
        for (slot, (part_type, start, count)) in partitions.iter().enumerate() {
            let base = 446 + slot * 16;
            sector[base + 4] = *part_type;
            sector[base + 8..base + 12].copy_from_slice(&start.to_le_bytes());
            sector[base + 12..base + 16].copy_from_slice(&count.to_le_bytes());
        }
        sector[510..512].copy_from_slice(&MBR_SIGNATURE);
        sector
    }

    /// Protective MBR, GPT header at LBA 1 and entries at LBA 2
    pub fn gpt(partitions: &[(u64, u64)]) -> Vec<u8> {
        gpt_with_layout(partitions, 2, 128)
    }

    pub fn gpt_with_layout(partitions: &[(u64, u64)], entries_lba: u64, entry_size: u32) -> Vec<u8> {
        let mut image = mbr(&[(MBR_TYPE_GPT_PROTECTIVE, 1, u32::MAX)]);

        let mut header = vec![0u8; 512];
        header[..8].copy_from_slice(GPT_SIGNATURE);
        header[72..80].copy_from_slice(&entries_lba.to_le_bytes());
        header[80..84].copy_from_slice(&4u32.to_le_bytes());
        header[84..88].copy_from_slice(&entry_size.to_le_bytes());
        image.extend_from_slice(&header);

        let mut table = vec![0u8; 512];
        for (slot, (first, last)) in partitions.iter().enumerate() {
            let base = slot * 128;
            table[base..base + 16].copy_from_slice(&[0xA2; 16]);
            table[base + 32..base + 40].copy_from_slice(&first.to_le_bytes());
            table[base + 40..base + 48].copy_from_slice(&last.to_le_bytes());
        }
        image.extend_from_slice(&table);
        image
    }

    /// Zero-pad an image so partition offsets fall inside it
    pub fn sized(mut image: Vec<u8>, len: usize) -> Vec<u8> {
        image.resize(len, 0);
        image
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::test_utils::MemorySource;

    const MIB: usize = 1 << 20;

    #[test]
    fn test_mbr_entries_in_order() {
        let image = sized(mbr(&[(0x07, 2048, 1024), (0, 0, 0), (0x07, 4096, 8192)]), 4 * MIB);
        let source = MemorySource::new(image);
        let entries = enumerate_partitions(&source, 512).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].start_sector, 2048);
        assert_eq!(entries[1].byte_offset(512), Some(4096 * 512));
        assert!(entries.iter().all(|e| e.table == TableKind::Mbr));
    }

    #[test]
    fn test_gpt_behind_protective_mbr() {
        let source = MemorySource::new(sized(gpt(&[(34, 2081), (2082, 10_000)]), 2 * MIB));
        let entries = enumerate_partitions(&source, 512).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].table, TableKind::Gpt);
        assert_eq!(entries[0].sector_count, 2048);
        assert_eq!(entries[1].start_sector, 2082);
    }

    #[test]
    fn test_no_signature_means_no_table() {
        let source = MemorySource::new(vec![0u8; 4096]);
        assert!(enumerate_partitions(&source, 512).unwrap().is_empty());

        let tiny = MemorySource::new(vec![0u8; 100]);
        assert!(enumerate_partitions(&tiny, 512).unwrap().is_empty());
    }

    #[test]
    fn test_byte_offset_overflow_is_none() {
        let entry = PartitionEntry {
            index: 0,
            table: TableKind::Gpt,
            start_sector: 1 << 62,
            sector_count: 3_000_000,
        };
        assert_eq!(entry.byte_offset(512), None);
    }

    #[test]
    fn test_overflowing_start_lba_is_dropped() {
        let source = MemorySource::new(sized(gpt(&[(1 << 62, (1 << 62) + 3_000_000), (34, 2081)]), 2 * MIB));
        let entries = enumerate_partitions(&source, 512).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].start_sector, 34);
    }

    #[test]
    fn test_entry_beyond_volume_end_is_dropped() {
        let source = MemorySource::new(sized(gpt(&[(1_000_000, 4_000_000)]), 2 * MIB));
        assert!(enumerate_partitions(&source, 512).unwrap().is_empty());

        let mbr_source = MemorySource::new(mbr(&[(0x07, 2048, 5000)]));
        assert!(enumerate_partitions(&mbr_source, 512).unwrap().is_empty());
    }

    #[test]
    fn test_full_lba_range_entry_is_skipped() {
        let source = MemorySource::new(sized(gpt(&[(0, u64::MAX), (34, 2081)]), 2 * MIB));
        let entries = enumerate_partitions(&source, 512).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sector_count, 2048);
    }

    #[test]
    fn test_entry_size_out_of_range_means_no_table() {
        for entry_size in [0u32, 64, 1 << 20, u32::MAX] {
            let source = MemorySource::new(sized(gpt_with_layout(&[(34, 2081)], 2, entry_size), 2 * MIB));
            assert!(enumerate_partitions(&source, 512).unwrap().is_empty(), "entry size {}", entry_size);
        }
    }

    #[test]
    fn test_entry_array_outside_volume_means_no_table() {
        for entries_lba in [u64::MAX, 1 << 60, 100_000] {
            let source = MemorySource::new(sized(gpt_with_layout(&[(34, 2081)], entries_lba, 128), 2 * MIB));
            assert!(enumerate_partitions(&source, 512).unwrap().is_empty(), "lba {}", entries_lba);
        }
    }

    #[test]
    fn test_truncated_entry_array_means_no_table() {
        let mut image = gpt(&[(34, 2081)]);
        image.truncate(1024 + 100);
        let source = MemorySource::new(image);
        assert!(enumerate_partitions(&source, 512).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_sector_size_means_no_table() {
        let source = MemorySource::new(sized(gpt(&[(34, 2081)]), 2 * MIB));
        for sector_size in [0u64, 1, 256, 520] {
            assert!(!is_valid_sector_size(sector_size));
            assert!(enumerate_partitions(&source, sector_size).unwrap().is_empty());
        }
        assert!(is_valid_sector_size(512));
        assert!(is_valid_sector_size(4096));
    }
}

use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;

use crate::constants::{DEFAULT_MIN_PARTITION_SECTORS, DEFAULT_OS_MARKERS, DEFAULT_SECTOR_SIZE};
use crate::evidence::VolumeSource;
use crate::filesystem::{DirEntry, FilesystemBinder, FilesystemView};
use crate::partition::table::{enumerate_partitions, PartitionEntry};

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("no usable filesystem, offset 0 fallback failed: {reason}")]
    FilesystemBind { reason: String },
}

/// Decides whether a root directory listing belongs to an OS partition
#[derive(Debug, Clone)]
pub struct OsRootProbe {
    markers: Vec<String>,
}

impl OsRootProbe {
    pub fn new<S: AsRef<str>>(markers: &[S]) -> Self {
        OsRootProbe {
            markers: markers.iter().map(|m| m.as_ref().to_lowercase()).collect(),
        }
    }

    pub fn looks_like_os_root(&self, listing: &[DirEntry]) -> bool {
        listing
            .iter()
            .any(|entry| self.markers.contains(&entry.name.to_lowercase()))
    }
}

impl Default for OsRootProbe {
    fn default() -> Self {
        OsRootProbe::new(DEFAULT_OS_MARKERS)
    }
}

#[derive(Debug, Clone)]
pub struct SelectorSettings {
    pub min_partition_sectors: u64,
    pub sector_size: u64,
    pub probe: OsRootProbe,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        SelectorSettings {
            min_partition_sectors: DEFAULT_MIN_PARTITION_SECTORS,
            sector_size: DEFAULT_SECTOR_SIZE,
            probe: OsRootProbe::default(),
        }
    }
}

pub struct SelectedFilesystem {
    pub offset: u64,
    /// `None` when the volume was bound through the offset 0 fallback
    pub partition: Option<PartitionEntry>,
    pub view: Box<dyn FilesystemView>,
}

/// Find the OS-bearing filesystem of a volume.
///
/// Candidates are tried in table order and the first whose root lists one
/// of the marker folders wins. Partitions below the size threshold are
/// never opened. Without a table or a positive probe the volume is bound
/// at offset 0.
pub fn select_filesystem(
    source: Arc<dyn VolumeSource>,
    binder: &dyn FilesystemBinder,
    settings: &SelectorSettings,
) -> Result<SelectedFilesystem, SelectError> {
    let partitions = match enumerate_partitions(source.as_ref(), settings.sector_size) {
        Ok(partitions) => partitions,
        Err(err) => {
            warn!("Could not read partition table: {}", err);
            Vec::new()
        }
    };

    for partition in partitions {
        if partition.sector_count < settings.min_partition_sectors {
            debug!(
                "Skipping partition {} ({} sectors, below threshold)",
                partition.index, partition.sector_count
            );
            continue;
        }

        let offset = match partition.byte_offset(settings.sector_size) {
            Some(offset) => offset,
            None => {
                debug!("Partition {} start sector overflows, skipping", partition.index);
                continue;
            }
        };
        let mut view = match binder.bind(Arc::clone(&source), offset) {
            Ok(view) => view,
            Err(err) => {
                debug!("Partition {} at offset {} did not bind: {}", partition.index, offset, err);
                continue;
            }
        };

        match view.list_dir("/") {
            Ok(listing) if settings.probe.looks_like_os_root(&listing) => {
                info!("Selected partition {} at offset {}", partition.index, offset);
                return Ok(SelectedFilesystem {
                    offset,
                    partition: Some(partition),
                    view,
                });
            }
            Ok(_) => debug!("Partition {} root has no OS markers", partition.index),
            Err(err) => debug!("Partition {} root unreadable: {}", partition.index, err),
        }
    }

    match binder.bind(source, 0) {
        Ok(view) => {
            info!("No OS partition found, bound filesystem at offset 0");
            Ok(SelectedFilesystem {
                offset: 0,
                partition: None,
                view,
            })
        }
        Err(err) => Err(SelectError::FilesystemBind {
            reason: err.to_string(),
        }),
    }
}

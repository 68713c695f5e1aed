use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

use crate::evidence::container::ContainerKind;
use crate::evidence::source::{FileSource, SegmentedSource, VolumeSource};
use crate::evidence::vhd::open_vhd;
use crate::evidence::VolumeError;

/// External byte-range collaborator for container formats without a built-in reader
pub trait ContainerOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn VolumeSource>, VolumeError>;
}

/// Opens evidence files into volumes, dispatching on the container kind
#[derive(Default)]
pub struct VolumeOpener {
    external: HashMap<ContainerKind, Box<dyn ContainerOpener>>,
}

impl VolumeOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reader for a container kind (EWF, VHDX, VMDK, ...)
    pub fn register(&mut self, kind: ContainerKind, opener: Box<dyn ContainerOpener>) {
        self.external.insert(kind, opener);
    }

    pub fn open(&self, path: &Path, workspace_base: &Path) -> Result<EvidenceVolume, VolumeError> {
        if !path.is_file() {
            return Err(VolumeError::NotFound(path.to_path_buf()));
        }

        let kind = ContainerKind::from_path(path);
        debug!("Opening {} as {}", path.display(), kind);

        let source: Box<dyn VolumeSource> = match (self.external.get(&kind), kind) {
            (Some(opener), _) => opener.open(path)?,
            (None, ContainerKind::Raw) => Box::new(FileSource::open(path)?),
            (None, ContainerKind::SegmentedRaw) => Box::new(SegmentedSource::open(path)?),
            (None, ContainerKind::Vhd) => open_vhd(path)?,
            (None, kind) => {
                return Err(VolumeError::UnsupportedContainer {
                    kind,
                    path: path.to_path_buf(),
                })
            }
        };

        let volume = EvidenceVolume::new(path, kind, Arc::from(source), workspace_base);
        info!(
            "Opened {} ({}, {} bytes)",
            volume.source_path.display(),
            volume.kind,
            volume.size
        );
        Ok(volume)
    }
}

/// Workspace folder name for an evidence file: its basename with '.' replaced by '_'
pub fn workspace_dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().replace('.', "_"))
        .unwrap_or_else(|| "volume".to_string())
}

/// Identifier of the volume an evidence file holds: its file stem
pub fn volume_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| workspace_dir_name(path))
}

/// One opened evidence image.
///
/// The byte source is released when the volume is dropped.
pub struct EvidenceVolume {
    pub source_path: PathBuf,
    pub kind: ContainerKind,
    pub size: u64,
    pub partition_offset: Option<u64>,
    pub volume_id: String,
    pub workspace_root: PathBuf,
    source: Arc<dyn VolumeSource>,
}

impl EvidenceVolume {
    pub fn new(
        path: &Path,
        kind: ContainerKind,
        source: Arc<dyn VolumeSource>,
        workspace_base: &Path,
    ) -> Self {
        let source_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let volume_id = volume_id_for(path);

        EvidenceVolume {
            workspace_root: workspace_base.join(workspace_dir_name(path)),
            size: source.size(),
            partition_offset: None,
            source_path,
            kind,
            volume_id,
            source,
        }
    }

    pub fn source(&self) -> Arc<dyn VolumeSource> {
        Arc::clone(&self.source)
    }

    /// Record the filesystem offset chosen by partition selection.
    ///
    /// A volume is bound once; later calls keep the first offset.
    pub fn mark_bound(&mut self, offset: u64) {
        if self.partition_offset.is_none() {
            self.partition_offset = Some(offset);
        }
    }

    pub fn is_bound(&self) -> bool {
        self.partition_offset.is_some()
    }
}

impl fmt::Debug for EvidenceVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvidenceVolume")
            .field("source_path", &self.source_path)
            .field("kind", &self.kind)
            .field("size", &self.size)
            .field("partition_offset", &self.partition_offset)
            .field("volume_id", &self.volume_id)
            .field("workspace_root", &self.workspace_root)
            .finish()
    }
}

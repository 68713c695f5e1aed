//! Evidence volumes: container detection and read-only byte sources

pub mod container;
pub mod source;
pub mod vhd;
pub mod volume;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use container::ContainerKind;
pub use source::{FileSource, OffsetReader, SegmentedSource, VolumeSource};
pub use volume::{volume_id_for, workspace_dir_name, ContainerOpener, EvidenceVolume, VolumeOpener};

/// Failure to open an evidence volume. Fatal to that volume only.
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("evidence file not found: {0}")]
    NotFound(PathBuf),

    #[error("missing segment {segment} for {path}")]
    MissingSegment { path: PathBuf, segment: String },

    #[error("no reader registered for {kind} container {path}")]
    UnsupportedContainer { kind: ContainerKind, path: PathBuf },

    #[error("malformed container {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

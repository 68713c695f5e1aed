use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Evidence container formats recognised from the file extension
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Single flat image (.dd, .raw, .img, .bin and unknown extensions)
    Raw,
    /// Numbered flat segments (.001, .002, ...)
    SegmentedRaw,
    /// Expert Witness / EnCase segmented container (.e01, .ex01)
    Ewf,
    /// Microsoft Virtual Hard Disk (.vhd)
    Vhd,
    /// Microsoft Virtual Hard Disk v2 (.vhdx)
    Vhdx,
    /// VMware virtual disk (.vmdk)
    Vmdk,
}

impl ContainerKind {
    /// Pick the container kind from the evidence path extension
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "e01" | "ex01" => ContainerKind::Ewf,
            "vhd" => ContainerKind::Vhd,
            "vhdx" => ContainerKind::Vhdx,
            "vmdk" => ContainerKind::Vmdk,
            ext if ext.len() == 3 && ext.chars().all(|c| c.is_ascii_digit()) => {
                ContainerKind::SegmentedRaw
            }
            _ => ContainerKind::Raw,
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Raw => write!(f, "raw"),
            ContainerKind::SegmentedRaw => write!(f, "segmented-raw"),
            ContainerKind::Ewf => write!(f, "ewf"),
            ContainerKind::Vhd => write!(f, "vhd"),
            ContainerKind::Vhdx => write!(f, "vhdx"),
            ContainerKind::Vmdk => write!(f, "vmdk"),
        }
    }
}

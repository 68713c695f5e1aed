//! Partition enumeration and OS partition selection

pub mod selector;
pub mod table;

pub use selector::{select_filesystem, OsRootProbe, SelectError, SelectedFilesystem, SelectorSettings};
pub use table::{enumerate_partitions, is_valid_sector_size, PartitionEntry, TableKind};

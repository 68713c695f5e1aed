use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the vdi-collector tool.
///
/// Evidence inputs are positional: disk images (raw, split raw, VHD, ...)
/// or directories holding an exported filesystem tree. Options override
/// the matching fields of the YAML configuration.
#[derive(Parser, Debug)]
#[clap(name = "vdi-collector", about = "Pooled VDI evidence triage and identity correlation")]
pub struct Args {
    /// Evidence images or exported filesystem directories
    pub inputs: Vec<PathBuf>,

    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Workspace root (default: ./workspace)
    #[clap(short = 'o', long)]
    pub workspace: Option<PathBuf>,

    /// Number of volumes processed in parallel
    #[clap(short = 'w', long)]
    pub workers: Option<usize>,

    /// Only collect these target categories (comma-separated)
    #[clap(short = 't', long)]
    pub categories: Option<String>,

    /// Directory of <volume id>.csv profile-list exports
    #[clap(long)]
    pub profile_list_dir: Option<PathBuf>,

    /// Identity table file name inside the workspace root
    #[clap(long)]
    pub identity_csv: Option<String>,

    /// Match logon events against profile SIDs of the same volume only
    #[clap(long)]
    pub per_volume_merge: bool,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Also write the log to <workspace>/vdi_collector.log
    #[clap(long)]
    pub log_file: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands for the collector.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a default configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "config.yaml")]
        path: PathBuf,
    },

    /// Correlate identity sources from existing workspaces without extracting
    Correlate {
        /// Workspace directories, one per volume
        workspaces: Vec<PathBuf>,

        /// Output CSV path
        #[clap(short, long, default_value = "identity_table.csv")]
        output: PathBuf,
    },
}

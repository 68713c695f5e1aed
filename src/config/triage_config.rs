use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::target_types::TargetCategory;
use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_IDENTITY_CSV, DEFAULT_MIN_PARTITION_SECTORS, DEFAULT_OS_MARKERS,
    DEFAULT_SECTOR_SIZE, DEFAULT_WORKSPACE_ROOT, MAX_DEFAULT_WORKERS,
};
use crate::identity::MergeScope;
use crate::partition::{is_valid_sector_size, OsRootProbe, SelectorSettings};

// Include default config at compile time
#[cfg(feature = "embed_config")]
use include_dir::{include_dir, Dir};

#[cfg(feature = "embed_config")]
static CONFIG_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/config");

/// One path template to pull out of every volume
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Target {
    pub name: String,
    pub category: TargetCategory,
    /// Volume-relative path; `Users/*` expands to every user profile
    pub path: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TriageOptions {
    pub workspace_root: PathBuf,
    pub chunk_size: usize,
    pub min_partition_sectors: u64,
    pub sector_size: u64,
    pub os_markers: Vec<String>,
    pub workers: usize,
    pub merge_scope: MergeScope,
    /// Directory of `<volume id>.csv` profile-list exports
    pub profile_list_dir: Option<PathBuf>,
    /// Identity table file name, relative to the workspace root
    pub identity_csv: String,
}

impl Default for TriageOptions {
    fn default() -> Self {
        TriageOptions {
            workspace_root: PathBuf::from(DEFAULT_WORKSPACE_ROOT),
            chunk_size: DEFAULT_CHUNK_SIZE,
            min_partition_sectors: DEFAULT_MIN_PARTITION_SECTORS,
            sector_size: DEFAULT_SECTOR_SIZE,
            os_markers: DEFAULT_OS_MARKERS.iter().map(|m| m.to_string()).collect(),
            workers: default_workers(),
            merge_scope: MergeScope::default(),
            profile_list_dir: None,
            identity_csv: DEFAULT_IDENTITY_CSV.to_string(),
        }
    }
}

fn default_workers() -> usize {
    num_cpus::get().clamp(1, MAX_DEFAULT_WORKERS)
}

impl TriageOptions {
    pub fn selector_settings(&self) -> SelectorSettings {
        SelectorSettings {
            min_partition_sectors: self.min_partition_sectors,
            sector_size: self.sector_size,
            probe: OsRootProbe::new(&self.os_markers[..]),
        }
    }

    /// Worker count actually used for the pool
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            default_workers()
        } else {
            self.workers
        }
    }

    pub fn identity_csv_path(&self) -> PathBuf {
        self.workspace_root.join(&self.identity_csv)
    }

    /// Reject option values the partition reader and copy loop cannot use
    pub fn validate(&self) -> Result<()> {
        if !is_valid_sector_size(self.sector_size) {
            bail!(
                "Invalid sector_size {}: must be a power of two and at least 512",
                self.sector_size
            );
        }
        if self.chunk_size == 0 {
            bail!("Invalid chunk_size 0");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TriageConfig {
    pub version: String,
    pub description: String,
    pub targets: Vec<Target>,
    #[serde(default)]
    pub options: TriageOptions,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self::default_vdi()
    }
}

impl TriageConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: TriageConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML config")?;
        config
            .options
            .validate()
            .context(format!("Invalid options in {}", path.display()))?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Get the embedded default configuration
    #[cfg(feature = "embed_config")]
    pub fn get_embedded_config() -> Result<Self> {
        match CONFIG_DIR.get_file("default_config.yaml") {
            Some(file) => {
                let content = file
                    .contents_utf8()
                    .ok_or_else(|| anyhow::anyhow!("Failed to read embedded config as UTF-8"))?;

                let config: TriageConfig = serde_yaml::from_str(content)
                    .context("Failed to parse embedded YAML config")?;
                config.options.validate()?;

                info!("Using embedded configuration");
                Ok(config)
            }
            None => {
                info!("No embedded config found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Create a default configuration YAML file
    pub fn create_default_config_file(path: &Path) -> Result<()> {
        TriageConfig::default().save_to_yaml_file(path)
    }

    /// Keep only targets of the given categories; an empty filter keeps all
    pub fn retain_categories(&mut self, categories: &[TargetCategory]) {
        if categories.is_empty() {
            return;
        }
        self.targets.retain(|target| categories.contains(&target.category));
    }
}

/// Load a configuration file or create a default one.
///
/// With a path that exists the file is parsed; with a path that does not
/// exist the defaults are written there and returned. Without a path the
/// embedded configuration (when built with `embed_config`) or the built-in
/// defaults are used.
pub fn load_or_create_config(config_path: Option<&Path>) -> Result<TriageConfig> {
    match config_path {
        Some(path) => {
            if path.exists() {
                TriageConfig::from_yaml_file(path)
            } else {
                info!("Creating default config at {}", path.display());
                let default_config = TriageConfig::default();
                default_config.save_to_yaml_file(path)?;
                Ok(default_config)
            }
        }
        None => {
            #[cfg(feature = "embed_config")]
            {
                TriageConfig::get_embedded_config()
            }

            #[cfg(not(feature = "embed_config"))]
            {
                info!("No config path provided, using default pooled-VDI configuration");
                Ok(TriageConfig::default())
            }
        }
    }
}

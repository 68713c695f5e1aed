//! # vdi-collector
//!
//! Evidence triage for pooled virtual desktop (VDI) deployments, where many
//! people share the same machine image over time.
//!
//! ## Overview
//!
//! vdi-collector opens forensic disk images, finds the Windows system
//! partition, copies a configured set of artifact paths (with `Users/*`
//! expanded per profile) into one workspace per image, and then links
//! SIDs, profile folders and logon events into a single identity table
//! that attributes those artifacts to people.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::PathBuf;
//! use vdi_collector::config::TriageConfig;
//! use vdi_collector::orchestrator::run_batch;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = TriageConfig::default();
//! let inputs = vec![PathBuf::from("VDI-01.vhd"), PathBuf::from("VDI-02.001")];
//!
//! let report = run_batch(&inputs, &config)?;
//! println!("{} identity records", report.identity_records);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`config`]: YAML triage configuration and default targets
//! - [`evidence`]: Evidence containers and volume byte sources
//! - [`partition`]: Partition tables and OS partition selection
//! - [`filesystem`]: Navigable filesystem views over a volume
//! - [`extraction`]: Target resolution and extraction into workspaces
//! - [`identity`]: Identity correlation and the identity table export
//! - [`orchestrator`]: Public operations and the parallel batch runner
//! - [`models`]: Extraction results and batch reports
//! - [`utils`]: Batch summary output
//! - [`constants`]: Application-wide constants
//!
//! ## Feature Flags
//!
//! - `embed_config`: Embed the default configuration in the binary

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models and structures used throughout the application
pub mod models;

/// Configuration management and target definitions
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Evidence containers: raw, split raw and VHD readers
pub mod evidence;

/// Filesystem views bound to a volume offset
pub mod filesystem;

/// Partition enumeration and OS partition selection
pub mod partition;

/// Path resolution and artifact extraction
pub mod extraction;

/// SID, profile and logon correlation
pub mod identity;

/// Batch orchestration
pub mod orchestrator;

/// Path validation for workspace output
pub mod security;

/// Utility functions for reporting
pub mod utils;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;

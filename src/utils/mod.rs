//! Utility functions for batch reporting.
//!
//! ## Components
//!
//! - **Summary**: JSON batch summary written next to the workspaces
//!
//! ```no_run
//! use vdi_collector::models::BatchReport;
//! use vdi_collector::utils::summary::create_batch_summary;
//!
//! # fn example(report: &BatchReport) -> anyhow::Result<()> {
//! let json = create_batch_summary(report)?;
//! std::fs::write("workspace/collection_summary.json", json)?;
//! # Ok(())
//! # }
//! ```

/// Batch summary generation and reporting
pub mod summary;

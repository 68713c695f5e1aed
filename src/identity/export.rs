use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::constants::UTF8_BOM;
use crate::identity::IdentityTable;

pub const EXPORT_HEADER: [&str; 7] = ["time", "username", "sid", "folder", "domain", "logon_type", "vhd"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot write identity table to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot encode identity table row: {0}")]
    Csv(#[from] csv::Error),
}

/// Write the table as a spreadsheet-friendly CSV (UTF-8 with BOM),
/// creating parent directories as needed
pub fn export_table(table: &IdentityTable, path: &Path) -> Result<(), ExportError> {
    let io_err = |source: io::Error| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut file = BufWriter::new(File::create(path).map_err(io_err)?);
    file.write_all(UTF8_BOM).map_err(io_err)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(EXPORT_HEADER)?;
    for record in table.records() {
        let time = record.time.to_string();
        writer.write_record([
            time.as_str(),
            record.username.as_str(),
            record.sid.as_str(),
            record.folder.as_str(),
            record.domain.as_str(),
            record.logon_type.as_str(),
            record.volume_id.as_str(),
        ])?;
    }
    writer.flush().map_err(io_err)?;

    info!("Wrote {} identity records to {}", table.len(), path.display());
    Ok(())
}

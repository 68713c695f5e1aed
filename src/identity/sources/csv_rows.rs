//! Identity rows exported by external decoders as CSV

use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use log::warn;
use serde::Deserialize;

use crate::constants::IDENTITY_TIME_FORMAT;
use crate::identity::models::{LogonEvent, ProfileRow};
use crate::identity::sources::SourceError;

#[derive(Debug, Deserialize)]
struct ProfileCsvRow {
    #[serde(alias = "SID", alias = "Sid")]
    sid: String,
    #[serde(alias = "ProfileImagePath", alias = "profile_image_path")]
    profile_path: String,
}

#[derive(Debug, Deserialize)]
struct LogonCsvRow {
    #[serde(alias = "TimeCreated", alias = "timestamp")]
    time: String,
    #[serde(alias = "TargetUserName", alias = "user")]
    username: String,
    #[serde(alias = "TargetUserSid")]
    sid: String,
    #[serde(default, alias = "TargetDomainName")]
    domain: String,
    #[serde(default, alias = "LogonType")]
    logon_type: String,
}

/// Accepts the table format itself, ISO-8601 with a `T`, and RFC 3339
pub fn parse_event_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, IDENTITY_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.naive_utc()))
}

fn read_rows<T, R>(path: &Path, convert: impl Fn(T) -> Option<R>) -> Result<Vec<R>, SourceError>
where
    T: for<'de> Deserialize<'de>,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|err| SourceError::Csv {
            path: path.to_path_buf(),
            source: err,
        })?;

    let mut rows = Vec::new();
    let mut rejected = 0;
    for (line, row) in reader.deserialize::<T>().enumerate() {
        match row.ok().and_then(&convert) {
            Some(row) => rows.push(row),
            None => {
                warn!("Skipping unreadable row {} in {}", line + 2, path.display());
                rejected += 1;
            }
        }
    }

    if rows.is_empty() && rejected > 0 {
        return Err(SourceError::Malformed {
            path: path.to_path_buf(),
            reason: format!("none of {} rows could be read", rejected),
        });
    }
    Ok(rows)
}

/// Rows with `sid,profile_path` (or `SID,ProfileImagePath`) columns
pub fn read_profile_csv(path: &Path) -> Result<Vec<ProfileRow>, SourceError> {
    read_rows(path, |row: ProfileCsvRow| {
        Some(ProfileRow {
            sid: row.sid,
            profile_path: row.profile_path,
        })
    })
}

/// Rows with `time,username,sid,domain,logon_type` columns
pub fn read_logon_csv(path: &Path) -> Result<Vec<LogonEvent>, SourceError> {
    read_rows(path, |row: LogonCsvRow| {
        Some(LogonEvent {
            time: parse_event_time(&row.time)?,
            username: row.username,
            sid: row.sid,
            domain: row.domain,
            logon_type: row.logon_type,
        })
    })
}

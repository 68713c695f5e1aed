//! Successful logon events decoded from an extracted Security.evtx

use std::path::Path;

use chrono::NaiveDateTime;
use evtx::EvtxParser;
use log::{debug, warn};
use serde_json::Value;

use crate::constants::LOGON_SUCCESS_EVENT_ID;
use crate::identity::models::LogonEvent;
use crate::identity::sources::SourceError;

/// EventID is either a bare number or `{"#attributes": ..., "#text": n}`
fn event_id(system: &Value) -> Option<u64> {
    let id = &system["EventID"];
    let id = if id.is_object() { &id["#text"] } else { id };
    match id {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn data_string(event_data: &Value, name: &str) -> Option<String> {
    match &event_data[name] {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Map one JSON-rendered record to a logon event. Records other than a
/// successful logon, or lacking a target name or SID, yield `None`.
pub fn logon_from_record(data: &Value, time: NaiveDateTime) -> Option<LogonEvent> {
    let event = &data["Event"];
    if event_id(&event["System"])? != LOGON_SUCCESS_EVENT_ID {
        return None;
    }

    let event_data = &event["EventData"];
    let username = data_string(event_data, "TargetUserName").filter(|u| !u.is_empty())?;
    let sid = data_string(event_data, "TargetUserSid").filter(|s| !s.is_empty())?;

    Some(LogonEvent {
        time,
        username,
        sid,
        domain: data_string(event_data, "TargetDomainName").unwrap_or_default(),
        logon_type: data_string(event_data, "LogonType").unwrap_or_default(),
    })
}

pub fn read_security_evtx(path: &Path) -> Result<Vec<LogonEvent>, SourceError> {
    let mut parser = EvtxParser::from_path(path).map_err(|err| SourceError::Evtx {
        path: path.to_path_buf(),
        reason: format!("{err:?}"),
    })?;

    let mut events = Vec::new();
    let mut skipped = 0;
    for record in parser.records_json_value() {
        match record {
            Ok(record) => {
                if let Some(event) = logon_from_record(&record.data, record.timestamp.naive_utc()) {
                    events.push(event);
                }
            }
            Err(err) => {
                warn!("Issue parsing record from {}, error: {err:?}", path.display());
                skipped += 1;
            }
        }
    }

    debug!(
        "{}: {} logon events, {} unreadable records",
        path.display(),
        events.len(),
        skipped
    );
    Ok(events)
}

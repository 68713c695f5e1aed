use crate::constants::{
    ACCEPTED_SID_PREFIXES, MACHINE_ACCOUNT_SUFFIX, SERVICE_PROFILE_FOLDERS, SYSTEM_AUTHORITY_DOMAIN,
};
use crate::identity::models::LogonEvent;

/// True if the SID belongs to a domain/local account or a cloud account
pub fn is_human_sid(sid: &str) -> bool {
    ACCEPTED_SID_PREFIXES
        .iter()
        .any(|prefix| sid.starts_with(prefix))
}

/// Logon events that can describe a human user.
///
/// Drops the system authority domain, machine/service accounts (name ends
/// in `$`), rows missing a name or SID and SIDs outside the accepted forms.
pub fn accepts_logon(event: &LogonEvent) -> bool {
    if event.domain.eq_ignore_ascii_case(SYSTEM_AUTHORITY_DOMAIN) {
        return false;
    }
    if event.username.is_empty() || event.username.ends_with(MACHINE_ACCOUNT_SUFFIX) {
        return false;
    }
    !event.sid.is_empty() && is_human_sid(&event.sid)
}

/// Profile folders owned by built-in service accounts
pub fn is_service_folder(folder: &str) -> bool {
    SERVICE_PROFILE_FOLDERS
        .iter()
        .any(|service| service.eq_ignore_ascii_case(folder))
}

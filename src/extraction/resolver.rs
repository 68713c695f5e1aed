//! Target template expansion against a live directory listing

use log::debug;
use thiserror::Error;

use crate::constants::{PROFILE_ALIASES, SYSTEM_USER_LABEL};
use crate::filesystem::FilesystemView;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("cannot open /{0}")]
    UsersDirUnavailable(String),

    #[error("no user profiles found")]
    NoUserProfiles,

    #[error("unsupported wildcard position in {0}")]
    UnsupportedWildcard(String),
}

/// One concrete path plus the profile it was expanded for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: String,
    pub user: String,
}

/// Backslashes to forward slashes, leading slashes removed
pub fn normalize_template(template: &str) -> String {
    template.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Concrete form of a template, as reported when it cannot be expanded
pub fn display_path(template: &str) -> String {
    format!("/{}", normalize_template(template))
}

/// Expand a target template into concrete paths.
///
/// A template is either literal (owned by "System") or carries a single
/// `*` directly below a root-level `Users` folder, which is replaced by
/// every profile directory under `/Users` in listing order.
pub fn resolve(
    fs: &mut dyn FilesystemView,
    template: &str,
) -> Result<Vec<ResolvedPath>, ResolveError> {
    let normalized = normalize_template(template);
    let segments: Vec<&str> = normalized.split('/').collect();

    let wildcards = segments.iter().filter(|s| s.contains('*')).count();
    if wildcards == 0 {
        return Ok(vec![ResolvedPath {
            path: format!("/{}", normalized),
            user: SYSTEM_USER_LABEL.to_string(),
        }]);
    }

    let users_wildcard = segments.len() >= 2
        && segments[0].eq_ignore_ascii_case("users")
        && segments[1] == "*";
    if wildcards > 1 || !users_wildcard {
        return Err(ResolveError::UnsupportedWildcard(template.to_string()));
    }

    let users_dir = format!("/{}", segments[0]);
    let listing = fs
        .list_dir(&users_dir)
        .map_err(|_| ResolveError::UsersDirUnavailable(segments[0].to_string()))?;

    let rest = &segments[2..];
    let resolved: Vec<ResolvedPath> = listing
        .into_iter()
        .filter(|entry| entry.is_dir() && !PROFILE_ALIASES.contains(&entry.name.as_str()))
        .map(|entry| {
            let mut path = format!("/{}/{}", segments[0], entry.name);
            for segment in rest {
                path.push('/');
                path.push_str(segment);
            }
            ResolvedPath {
                path,
                user: entry.name,
            }
        })
        .collect();

    if resolved.is_empty() {
        return Err(ResolveError::NoUserProfiles);
    }

    debug!("{} expanded to {} profile paths", template, resolved.len());
    Ok(resolved)
}

//! Path sanitization for workspace destinations.
//!
//! Names and paths read out of evidence are untrusted: they may contain
//! characters the analysis host rejects, or sequences that would climb out
//! of the workspace. Everything written under a workspace goes through
//! these functions first.

use std::path::{Component, Path};

use anyhow::{bail, Result};

fn push_safe_char(sanitized: &mut String, ch: char) {
    match ch {
        // Replace path separators
        '/' | '\\' => sanitized.push('_'),
        // Remove null bytes
        '\0' => {}
        // Replace other problematic characters
        '<' | '>' | ':' | '"' | '|' | '?' | '*' => sanitized.push('_'),
        // Control characters
        c if c.is_control() => sanitized.push('_'),
        c => sanitized.push(c),
    }
}

/// Sanitizes a single file or directory name taken from evidence.
///
/// The result is one path component that cannot be empty, `.` or `..`.
pub fn sanitize_component(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    for ch in name.chars() {
        push_safe_char(&mut sanitized, ch);
    }

    // Don't allow only dots
    if sanitized.chars().all(|c| c == '.') {
        sanitized = format!("_{}", sanitized);
    }

    if sanitized.trim().is_empty() {
        sanitized = "unnamed".to_string();
    }

    sanitized
}

/// Flattens a parent path into one workspace folder name.
///
/// Separators become underscores and leading separators are dropped, so
/// `/Windows/Prefetch` becomes `Windows_Prefetch`. The root maps to an
/// empty string (the workspace root itself).
pub fn flatten_parent_path(parent: &str) -> String {
    let trimmed = parent.trim_matches(|c| c == '/' || c == '\\');
    if trimmed.is_empty() {
        return String::new();
    }

    let mut flattened = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        push_safe_char(&mut flattened, ch);
    }

    if flattened.chars().all(|c| c == '.') {
        flattened = format!("_{}", flattened);
    }
    flattened
}

/// Checks that a relative destination stays inside its base directory
pub fn validate_relative(path: &Path) -> Result<()> {
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => bail!("Path traversal attempt detected: path contains '..'"),
            other => bail!("Invalid path component: {:?}", other),
        }
    }
    Ok(())
}

//! Absolute `/`-separated object paths.
//!
//! `/` names the root group. Relative paths are resolved from the root, and
//! repeated or trailing separators are ignored, so `data//x/` and `/data/x`
//! name the same object.

use crate::error::StoreError;

/// Split a path into its components, validating each one.
pub fn components(path: &str) -> Result<Vec<&str>, StoreError> {
    path.split('/')
        .filter(|c| !c.is_empty())
        .map(|c| {
            if c == "." || c == ".." {
                Err(StoreError::InvalidPath(path.to_string()))
            } else {
                Ok(c)
            }
        })
        .collect()
}

/// Canonical absolute form of `path`.
pub fn normalize(path: &str) -> Result<String, StoreError> {
    Ok(format!("/{}", components(path)?.join("/")))
}

/// Append a child name to a group path.
pub fn join(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    format!("{parent}/{}", name.trim_start_matches('/'))
}

/// Last component of `path`, or `""` for the root.
pub fn basename(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Path of the enclosing group, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) => Some("/"),
        Some(i) => Some(&trimmed[..i]),
        None => Some("/"),
    }
}

/// Whether `name` can be used as a single child name.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && name != "." && name != ".."
}

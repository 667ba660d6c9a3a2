//! The timestamp-keyed comment log kept in the `comments` group.

use std::collections::BTreeMap;

use chrono::Utc;
use pureemd_store::{AttrValue, Container};
use tracing::debug;

use crate::attr::single_text;
use crate::error::{Error, Result};

pub const COMMENTS_GROUP: &str = "/comments";

/// `strftime` format of default comment keys.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S (UTC)";

/// The current UTC time as a comment key.
pub fn utc_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Append `message` under `timestamp` (now, if `None` or empty) and return
/// the key.
///
/// A second message under the same key is joined to the first with a
/// newline. The comments group must already exist.
pub fn append<C: Container + ?Sized>(
    container: &mut C,
    message: &str,
    timestamp: Option<&str>,
) -> Result<String> {
    if !container.is_writable() {
        return Err(Error::ReadOnly);
    }
    let key = timestamp
        .filter(|t| !t.is_empty())
        .map_or_else(utc_timestamp, str::to_owned);
    let text = match container.attr(COMMENTS_GROUP, &key)? {
        Some(existing) => {
            let previous = single_text(&existing).ok_or_else(|| {
                Error::TypeMismatch(format!("comment '{key}' does not hold text"))
            })?;
            format!("{previous}\n{message}")
        }
        None => message.to_owned(),
    };
    container.set_attr(COMMENTS_GROUP, &key, AttrValue::Bytes(text.into_bytes()))?;
    debug!(key = %key, "appended comment");
    Ok(key)
}

/// All comments, by key. Entries that are not text are skipped; a missing
/// comments group yields an empty map.
pub fn comments<C: Container + ?Sized>(container: &C) -> Result<BTreeMap<String, String>> {
    if container.kind(COMMENTS_GROUP)?.is_none() {
        return Ok(BTreeMap::new());
    }
    Ok(container
        .attrs(COMMENTS_GROUP)?
        .into_iter()
        .filter_map(|(key, value)| single_text(&value).map(|text| (key, text)))
        .collect())
}

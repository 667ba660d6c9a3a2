//! Version resolution for freshly opened stores.

use std::fmt;

use pureemd_store::{AttrValue, Container};
use tracing::{debug, warn};

use crate::attr::single_int;
use crate::layout::Layout;

pub const VERSION_MAJOR_ATTR: &str = "version_major";
pub const VERSION_MINOR_ATTR: &str = "version_minor";

/// Root children that carry the version when the root itself does not
/// (files written by py4DSTEM).
pub const ALTERNATE_ROOTS: &[&str] = &["4DSTEM_simulation", "4DSTEM_experiment"];

/// An EMD format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const V0_2: Version = Version::new(0, 2);
    pub const V0_5: Version = Version::new(0, 5);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Effective version: the detected one, or 0.2.
    pub version: Version,
    /// Version found in the store, if any.
    pub detected: Option<Version>,
    pub layout: Layout,
}

/// Determine the version of an opened store and the layout policy to use.
///
/// Looks at the root first, then at the first alternate root present. When
/// neither carries a version and the store is writable, 0.2 is written to
/// the root. This never fails: unreadable or malformed version attributes
/// count as absent, and a failed persist is only logged.
pub fn resolve<C: Container + ?Sized>(container: &mut C) -> Resolution {
    let detected = detect(container);

    if detected.is_none() && container.is_writable() {
        if let Err(e) = write_version(container, Version::V0_2) {
            warn!(error = %e, "could not persist default EMD version");
        } else {
            debug!("no EMD version found, wrote 0.2");
        }
    }

    let version = detected.unwrap_or(Version::V0_2);
    let layout = Layout::for_version(version);
    if version != layout.version() {
        warn!(
            found = %version,
            using = %layout.version(),
            "EMD version not supported exactly, reading with the closest layout"
        );
    }
    debug!(%version, ?layout, "resolved EMD version");
    Resolution {
        version,
        detected,
        layout,
    }
}

fn detect<C: Container + ?Sized>(container: &C) -> Option<Version> {
    if let Some(version) = read_version(container, "/") {
        return Some(version);
    }
    let children = container.children("/").unwrap_or_default();
    let alt = children
        .iter()
        .find(|c| ALTERNATE_ROOTS.contains(&c.as_str()))?;
    debug!(root = %alt, "looking for version under alternate root");
    read_version(container, &format!("/{alt}"))
}

fn read_version<C: Container + ?Sized>(container: &C, path: &str) -> Option<Version> {
    let component = |name: &str| {
        let value = container.attr(path, name).ok().flatten()?;
        u32::try_from(single_int(&value)?).ok()
    };
    Some(Version::new(
        component(VERSION_MAJOR_ATTR)?,
        component(VERSION_MINOR_ATTR)?,
    ))
}

fn write_version<C: Container + ?Sized>(
    container: &mut C,
    version: Version,
) -> Result<(), pureemd_store::StoreError> {
    container.set_attr(
        "/",
        VERSION_MAJOR_ATTR,
        AttrValue::I64(i64::from(version.major)),
    )?;
    container.set_attr(
        "/",
        VERSION_MINOR_ATTR,
        AttrValue::I64(i64::from(version.minor)),
    )
}

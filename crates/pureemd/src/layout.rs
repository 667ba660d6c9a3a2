//! Dataset naming rules of the two on-disk EMD generations.
//!
//! Version 0.2 always stores an EMD group's array as `data`. Version 0.5 (as
//! written by py4DSTEM) names it after the kind of collection the group
//! lives in, e.g. a group under `datacubes/` holds a `datacube` dataset.
//! Everything else about reading and writing a group is shared.

use std::fmt;

use pureemd_store::path;

use crate::error::{Error, Result};
use crate::version::Version;

/// Parent group name → dataset name, for version 0.5.
const V05_DATASET_NAMES: &[(&str, &str)] = &[
    ("datacubes", "datacube"),
    ("diffractionslices", "diffractionslice"),
    // Sic: py4DSTEM writes the doubled plural.
    ("pointlistarrayss", "pointlistarray"),
    ("pointlists", "pointlist"),
    ("realslices", "realslice"),
];

/// The layout policy selected for an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// EMD 0.2: the dataset is always `data`.
    V02,
    /// EMD 0.5: the dataset name depends on the parent group's name.
    V05,
}

impl Layout {
    /// Policy for a detected (or defaulted) version. Only exactly 0.5 selects
    /// [`Layout::V05`].
    pub fn for_version(version: Version) -> Self {
        if version == Version::V0_5 {
            Layout::V05
        } else {
            Layout::V02
        }
    }

    /// The version this policy implements.
    pub fn version(self) -> Version {
        match self {
            Layout::V02 => Version::V0_2,
            Layout::V05 => Version::V0_5,
        }
    }

    /// Name of the dataset inside the EMD group at `group_path`.
    ///
    /// The group does not have to exist yet, so writers can resolve the name
    /// before touching the store.
    pub fn dataset_name(self, group_path: &str) -> Result<&'static str> {
        match self {
            Layout::V02 => Ok("data"),
            Layout::V05 => {
                let parent = path::parent(group_path).map(path::basename).unwrap_or("");
                V05_DATASET_NAMES
                    .iter()
                    .find(|(collection, _)| *collection == parent)
                    .map(|(_, dataset)| *dataset)
                    .ok_or_else(|| {
                        Error::UnsupportedLayout(format!(
                            "no EMD 0.5 dataset name for '{group_path}' (parent group '{parent}')"
                        ))
                    })
            }
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EMD {} layout", self.version())
    }
}

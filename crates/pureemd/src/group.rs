//! References to EMD groups inside a container.

use pureemd_store::{path, Container, NodeKind};

use crate::attr::single_int;
use crate::error::Result;

/// Attribute that marks a group as an EMD group when it equals 1.
pub const EMD_GROUP_TYPE_ATTR: &str = "emd_group_type";

/// A reference to an EMD group by absolute path.
///
/// This is a plain value; it does not keep the file open and may go stale if
/// the group is removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmdGroup {
    path: String,
}

impl EmdGroup {
    /// Reference the group at `path`, normalizing it to absolute form.
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self {
            path: path::normalize(path)?,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path component.
    pub fn name(&self) -> &str {
        path::basename(&self.path)
    }

    /// Name of the enclosing group, `""` when that is the root.
    pub fn parent_name(&self) -> &str {
        path::parent(&self.path).map(path::basename).unwrap_or("")
    }

    /// Path of the child `name` inside this group.
    pub(crate) fn child(&self, name: &str) -> String {
        path::join(&self.path, name)
    }
}

impl std::fmt::Display for EmdGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Whether the object at `path` is a group carrying `emd_group_type == 1`.
///
/// The marker may be a signed or unsigned integer scalar or a length-1
/// integer array. Missing objects and datasets are not EMD groups.
pub fn is_emd_group<C: Container + ?Sized>(container: &C, path: &str) -> Result<bool> {
    if container.kind(path)? != Some(NodeKind::Group) {
        return Ok(false);
    }
    Ok(container
        .attr(path, EMD_GROUP_TYPE_ATTR)?
        .as_ref()
        .and_then(single_int)
        == Some(1))
}

//! Recursive search for EMD groups.

use pureemd_store::{path, Container, NodeKind};
use tracing::debug;

use crate::error::Result;
use crate::group::{is_emd_group, EmdGroup};

/// Find every EMD group at or below `root`.
///
/// Depth-first and pre-order: a group is reported before anything beneath
/// it, and siblings are visited in the container's child order, so the
/// result is stable for an unmodified store. Groups are searched below EMD
/// groups too.
pub fn discover<C: Container + ?Sized>(container: &C, root: &str) -> Result<Vec<EmdGroup>> {
    let root = path::normalize(root)?;
    let mut found = Vec::new();
    visit(container, &root, &mut found)?;
    debug!(root = %root, count = found.len(), "discovered EMD groups");
    Ok(found)
}

fn visit<C: Container + ?Sized>(
    container: &C,
    group: &str,
    found: &mut Vec<EmdGroup>,
) -> Result<()> {
    if is_emd_group(container, group)? {
        found.push(EmdGroup::new(group)?);
    }
    for name in container.children(group)? {
        let child = path::join(group, &name);
        if container.kind(&child)? == Some(NodeKind::Group) {
            visit(container, &child, found)?;
        }
    }
    Ok(())
}

//! Reading and writing EMD groups.
//!
//! An EMD group holds one dataset, named by the [`Layout`], plus one
//! `dim{i}` dataset per axis carrying `name` and `units` attributes. The same
//! code serves both layouts; only the dataset name differs.

use pureemd_store::{path, AttrValue, Container, NodeKind, RawArray, StoreError};
use tracing::{debug, info, warn};

use crate::array::EmdArray;
use crate::attr::single_text;
use crate::dims::DimVector;
use crate::error::{Error, Result};
use crate::group::{is_emd_group, EmdGroup, EMD_GROUP_TYPE_ATTR};
use crate::layout::Layout;
use crate::lazy::LazyArray;

const NAME_ATTR: &str = "name";
const UNITS_ATTR: &str = "units";

/// A dataset together with its per-axis dims.
#[derive(Debug, Clone, PartialEq)]
pub struct EmdData<A = EmdArray> {
    pub data: A,
    pub dims: Vec<DimVector>,
}

/// Name of the dim dataset for 0-based `axis`.
pub fn dim_name(axis: usize) -> String {
    format!("dim{}", axis + 1)
}

/// Check that `dims` describes an array of `shape`: one rank-1 dim per axis,
/// each as long as that axis.
pub fn check_dims(shape: &[usize], dims: &[DimVector]) -> Result<()> {
    if dims.len() != shape.len() {
        return Err(Error::ShapeMismatch(format!(
            "{} dims given for {}-dimensional data",
            dims.len(),
            shape.len()
        )));
    }
    for (axis, (dim, &extent)) in dims.iter().zip(shape).enumerate() {
        match dim.extent() {
            Some(n) if n == extent => {}
            Some(n) => {
                return Err(Error::ShapeMismatch(format!(
                    "{} has {n} values but axis {axis} has extent {extent}",
                    dim_name(axis)
                )))
            }
            None => {
                return Err(Error::ShapeMismatch(format!(
                    "{} has rank {}, expected 1",
                    dim_name(axis),
                    dim.values.ndim()
                )))
            }
        }
    }
    Ok(())
}

/// Read the dataset and dims of an EMD group.
pub fn read_group<C: Container + ?Sized>(
    container: &C,
    layout: Layout,
    group: &EmdGroup,
) -> Result<EmdData> {
    let (dataset, shape) = locate(container, layout, group)?;
    let raw = container.read_dataset(&dataset)?;
    let data = EmdArray::from_raw(&raw)?;
    let dims = read_dims(container, group, &shape)?;
    Ok(EmdData { data, dims })
}

/// Like [`read_group`], but leaves the dataset values in the container.
///
/// Dims are always materialized and checked against the dataset's shape.
pub fn read_group_lazy<'c, C: Container + ?Sized>(
    container: &'c C,
    layout: Layout,
    group: &EmdGroup,
) -> Result<EmdData<LazyArray<'c, C>>> {
    let (dataset, _) = locate(container, layout, group)?;
    let info = container.dataset_info(&dataset)?;
    let dims = read_dims(container, group, &info.shape)?;
    Ok(EmdData {
        data: LazyArray::new(container, dataset, info),
        dims,
    })
}

/// Path and shape of the group's main dataset.
fn locate<C: Container + ?Sized>(
    container: &C,
    layout: Layout,
    group: &EmdGroup,
) -> Result<(String, Vec<usize>)> {
    if !is_emd_group(container, group.path())? {
        return Err(Error::TypeMismatch(format!(
            "'{group}' is not an EMD group"
        )));
    }
    let name = layout.dataset_name(group.path())?;
    let dataset = group.child(name);
    if container.kind(&dataset)? != Some(NodeKind::Dataset) {
        return Err(Error::content(
            group.path(),
            format!("no dataset '{name}'"),
        ));
    }
    let shape = container.dataset_info(&dataset)?.shape;
    debug!(group = %group, dataset = name, ?shape, "reading EMD group");
    Ok((dataset, shape))
}

fn read_dims<C: Container + ?Sized>(
    container: &C,
    group: &EmdGroup,
    shape: &[usize],
) -> Result<Vec<DimVector>> {
    shape
        .iter()
        .enumerate()
        .map(|(axis, &extent)| {
            let label = dim_name(axis);
            let dim_path = group.child(&label);
            if container.kind(&dim_path)? != Some(NodeKind::Dataset) {
                return Err(Error::content(group.path(), format!("missing {label}")));
            }
            let raw = container.read_dataset(&dim_path)?;
            if raw.shape() != [extent] {
                return Err(Error::content(
                    group.path(),
                    format!(
                        "{label} has shape {:?}, axis {axis} has extent {extent}",
                        raw.shape()
                    ),
                ));
            }
            let text = |attr: &str| -> Result<String> {
                container
                    .attr(&dim_path, attr)?
                    .as_ref()
                    .and_then(single_text)
                    .ok_or_else(|| {
                        Error::content(group.path(), format!("{label} has no text '{attr}'"))
                    })
            };
            Ok(DimVector {
                values: EmdArray::from_raw(&raw)?,
                name: text(NAME_ATTR)?,
                units: text(UNITS_ATTR)?,
            })
        })
        .collect()
}

/// Write `data` and its dims as a new EMD group `label` under `parent`.
///
/// Everything is validated before the store is touched. An existing object
/// named `label` is an error unless `overwrite` is set, in which case it is
/// removed first. If creating the group's contents fails partway, the
/// partial group is removed again on a best-effort basis and
/// [`Error::WriteFailure`] is returned.
pub fn write_group<C: Container + ?Sized>(
    container: &mut C,
    layout: Layout,
    label: &str,
    data: &EmdArray,
    dims: &[DimVector],
    parent: &str,
    overwrite: bool,
) -> Result<EmdGroup> {
    if !container.is_writable() {
        return Err(Error::ReadOnly);
    }
    if !path::is_valid_name(label) {
        return Err(Error::TypeMismatch(format!(
            "invalid group label '{label}'"
        )));
    }
    check_dims(data.shape(), dims)?;
    let parent = path::normalize(parent)?;
    if container.kind(&parent)? != Some(NodeKind::Group) {
        return Err(Error::TypeMismatch(format!("'{parent}' is not a group")));
    }
    let group = EmdGroup::new(&path::join(&parent, label))?;
    let dataset = layout.dataset_name(group.path())?;
    let raw = data.to_raw()?;
    let dim_raws = dims
        .iter()
        .map(|d| d.values.to_raw())
        .collect::<Result<Vec<_>>>()?;

    if container.kind(group.path())?.is_some() {
        if !overwrite {
            return Err(Error::AlreadyExists {
                label: label.to_string(),
                parent,
            });
        }
        warn!(group = %group, "overwriting existing group");
        container.remove(group.path()).map_err(|source| Error::WriteFailure {
            path: group.path().to_string(),
            source,
        })?;
    }

    let result = populate(container, &group, dataset, raw, dims, dim_raws);
    if let Err(source) = result {
        if container.kind(group.path()).ok().flatten().is_some() {
            if let Err(e) = container.remove(group.path()) {
                warn!(group = %group, error = %e, "could not remove partially written group");
            }
        }
        return Err(Error::WriteFailure {
            path: group.path().to_string(),
            source,
        });
    }
    info!(group = %group, dataset, shape = ?data.shape(), "wrote EMD group");
    Ok(group)
}

fn populate<C: Container + ?Sized>(
    container: &mut C,
    group: &EmdGroup,
    dataset: &str,
    raw: RawArray,
    dims: &[DimVector],
    dim_raws: Vec<RawArray>,
) -> std::result::Result<(), StoreError> {
    container.create_group(group.path())?;
    container.set_attr(group.path(), EMD_GROUP_TYPE_ATTR, AttrValue::I64(1))?;
    container.create_dataset(&group.child(dataset), raw)?;
    for (axis, (dim, values)) in dims.iter().zip(dim_raws).enumerate() {
        put_dim(container, &group.child(&dim_name(axis)), dim, values)?;
    }
    Ok(())
}

fn put_dim<C: Container + ?Sized>(
    container: &mut C,
    dim_path: &str,
    dim: &DimVector,
    values: RawArray,
) -> std::result::Result<(), StoreError> {
    container.create_dataset(dim_path, values)?;
    container.set_attr(dim_path, NAME_ATTR, AttrValue::Bytes(dim.name.as_bytes().to_vec()))?;
    container.set_attr(dim_path, UNITS_ATTR, AttrValue::Bytes(dim.units.as_bytes().to_vec()))
}

/// Write one dim vector as dataset `label` under the group `parent`.
pub fn write_dim<C: Container + ?Sized>(
    container: &mut C,
    label: &str,
    dim: &DimVector,
    parent: &str,
) -> Result<()> {
    if !container.is_writable() {
        return Err(Error::ReadOnly);
    }
    if dim.extent().is_none() {
        return Err(Error::ShapeMismatch(format!(
            "dim '{label}' has rank {}, expected 1",
            dim.values.ndim()
        )));
    }
    if !path::is_valid_name(label) {
        return Err(Error::TypeMismatch(format!("invalid dim label '{label}'")));
    }
    let values = dim.values.to_raw()?;
    put_dim(container, &path::join(parent, label), dim, values)?;
    Ok(())
}

//! The capability interface schema layers are written against.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::types::{AttrValue, DatasetInfo, NodeKind, RawArray};

/// A hierarchical store of groups, typed datasets, and attributes.
///
/// Paths are absolute and `/`-separated; `/` is the root group. Children
/// are enumerated in name order, which is stable across runs on an
/// unmodified store.
pub trait Container {
    /// Whether mutating operations are permitted.
    fn is_writable(&self) -> bool;

    /// Kind of the object at `path`, or `None` if nothing is there.
    fn kind(&self, path: &str) -> Result<Option<NodeKind>, StoreError>;

    /// Names of the direct children of the group at `path`.
    fn children(&self, path: &str) -> Result<Vec<String>, StoreError>;

    /// All attributes of the object at `path`.
    fn attrs(&self, path: &str) -> Result<BTreeMap<String, AttrValue>, StoreError>;

    /// One attribute of the object at `path`, if set.
    fn attr(&self, path: &str, name: &str) -> Result<Option<AttrValue>, StoreError> {
        Ok(self.attrs(path)?.remove(name))
    }

    fn has_attr(&self, path: &str, name: &str) -> Result<bool, StoreError> {
        Ok(self.attr(path, name)?.is_some())
    }

    fn set_attr(&mut self, path: &str, name: &str, value: AttrValue) -> Result<(), StoreError>;

    /// Create an empty group. The parent must exist and the name must be free.
    fn create_group(&mut self, path: &str) -> Result<(), StoreError>;

    /// Create a dataset holding `data`. The parent must exist and the name must be free.
    fn create_dataset(&mut self, path: &str, data: RawArray) -> Result<(), StoreError>;

    /// Element type and shape of the dataset at `path`.
    fn dataset_info(&self, path: &str) -> Result<DatasetInfo, StoreError>;

    /// Little-endian element bytes of the dataset at `path`, borrowed where
    /// the backend allows it.
    fn dataset_bytes(&self, path: &str) -> Result<Cow<'_, [u8]>, StoreError>;

    /// Materialize the dataset at `path`.
    fn read_dataset(&self, path: &str) -> Result<RawArray, StoreError> {
        let info = self.dataset_info(path)?;
        let bytes = self.dataset_bytes(path)?.into_owned();
        RawArray::new(info.dtype, info.shape, bytes)
    }

    /// Delete the object at `path` and everything below it.
    fn remove(&mut self, path: &str) -> Result<(), StoreError>;

    /// Persist staged changes.
    fn flush(&mut self) -> Result<(), StoreError>;

    /// Flush and release the backing storage. Closing twice is a no-op.
    fn close(&mut self) -> Result<(), StoreError>;
}

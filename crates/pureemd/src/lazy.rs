//! Deferred dataset reads.

use std::borrow::Cow;
use std::fmt;

use pureemd_store::{Container, DType, DatasetInfo, RawArray};

use crate::array::EmdArray;
use crate::error::Result;

/// A dataset whose shape and type are known but whose values have not been
/// copied out of the container.
///
/// With a memory-mapped file, [`bytes`](LazyArray::bytes) hands out the
/// mapped payload directly. The view borrows the container, so the file
/// cannot be closed while it is alive.
pub struct LazyArray<'c, C: Container + ?Sized> {
    container: &'c C,
    path: String,
    info: DatasetInfo,
}

impl<'c, C: Container + ?Sized> LazyArray<'c, C> {
    pub(crate) fn new(container: &'c C, path: String, info: DatasetInfo) -> Self {
        Self {
            container,
            path,
            info,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.info.shape
    }

    pub fn ndim(&self) -> usize {
        self.info.shape.len()
    }

    pub fn dtype(&self) -> DType {
        self.info.dtype
    }

    /// Path of the dataset inside the container.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Little-endian element bytes, borrowed where the backend allows it.
    pub fn bytes(&self) -> Result<Cow<'c, [u8]>> {
        Ok(self.container.dataset_bytes(&self.path)?)
    }

    /// Materialize the values.
    pub fn load(&self) -> Result<EmdArray> {
        let raw = RawArray::new(
            self.info.dtype,
            self.info.shape.clone(),
            self.bytes()?.into_owned(),
        )?;
        EmdArray::from_raw(&raw)
    }
}

impl<C: Container + ?Sized> fmt::Debug for LazyArray<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyArray")
            .field("path", &self.path)
            .field("dtype", &self.info.dtype)
            .field("shape", &self.info.shape)
            .finish()
    }
}

//! Reader and writer for Berkeley EMD (Electron Microscopy Dataset) files.
//!
//! An EMD file is a hierarchical container in which any group marked with
//! `emd_group_type = 1` holds one N-dimensional dataset plus a coordinate
//! vector (`dim1`, `dim2`, ...) with a name and units for each axis. Root
//! groups `microscope`, `sample`, `user` and `comments` hold free-form
//! metadata.
//!
//! Two on-disk generations are understood. Version 0.2 stores every dataset as
//! `data`; version 0.5 (py4DSTEM) names it after its parent collection. The
//! version is read when a file is opened and selects a [`Layout`].
//!
//! # Example
//!
//! ```no_run
//! use ndarray::Array2;
//! use pureemd::{default_dims, EmdArray, EmdFile};
//!
//! # fn main() -> pureemd::Result<()> {
//! let mut file = EmdFile::open_rw("scan.emd")?;
//! let data: EmdArray = Array2::<f32>::zeros((64, 64)).into();
//! let dims = default_dims(&data, Some(&[0.1, 0.1]))?;
//! file.write("haadf", &data, &dims, None, false)?;
//! file.put_comment("first light", None)?;
//!
//! let read = file.read_index(0)?;
//! assert_eq!(read.data.shape(), &[64, 64]);
//! file.close()?;
//! # Ok(())
//! # }
//! ```

pub mod array;
mod attr;
pub mod codec;
pub mod comments;
pub mod dims;
pub mod discovery;
pub mod error;
pub mod file;
pub mod group;
pub mod layout;
pub mod lazy;
pub mod version;

pub use array::{ArrayElement, EmdArray};
pub use codec::{check_dims, read_group, read_group_lazy, write_dim, write_group, EmdData};
pub use dims::{default_dims, dims_for_shape, DimVector};
pub use discovery::discover;
pub use error::{Error, Result};
pub use file::{EmdFile, MetadataGroup, DATA_GROUP};
pub use group::{is_emd_group, EmdGroup};
pub use layout::Layout;
pub use lazy::LazyArray;
pub use version::{Resolution, Version};

pub use pureemd_store::{
    AttrValue, Container, ContainerFile, DType, Mode, NodeKind, OpenOptions, StoreError,
};

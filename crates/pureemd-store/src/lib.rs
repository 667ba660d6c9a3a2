//! Hierarchical container store: groups, typed N-dimensional datasets, and
//! attributes, persisted as HDF5 files.
//!
//! Files written here open in h5py and the HDF5 C library. Files those
//! write can be read back as long as they stay within the supported subset:
//! integer and float datasets with contiguous, compact or unfiltered chunked
//! storage, old- and new-style groups, and numeric or string attributes.
//! Anything else is skipped on read-only opens and refused on writable ones.
//!
//! This is the storage substrate for `pureemd`. Schema layers talk to it only
//! through the [`Container`] trait, so any other backend implementing that
//! trait can stand in for [`ContainerFile`].
//!
//! # Example
//!
//! ```no_run
//! use pureemd_store::{AttrValue, Container, ContainerFile, Mode, RawArray};
//!
//! let mut file = ContainerFile::open("scan.emd", Mode::ReadWrite).unwrap();
//! file.create_group("/data").unwrap();
//! file.set_attr("/data", "origin", AttrValue::from("detector A")).unwrap();
//! let raw = RawArray::from_elements(vec![2, 2], &[1.0f64, 2.0, 3.0, 4.0]).unwrap();
//! file.create_dataset("/data/frame", raw).unwrap();
//! file.close().unwrap();
//! ```

mod attribute;
mod btree_v1;
mod bytes;
pub mod checksum;
pub mod container;
mod data_layout;
mod dataspace;
mod datatype;
pub mod error;
pub mod file;
mod global_heap;
mod group;
mod message_type;
mod object_header;
pub mod path;
mod read;
pub mod signature;
mod source;
mod superblock;
mod tree;
pub mod types;
mod write;

pub use container::Container;
pub use error::StoreError;
pub use file::{ContainerFile, Mode, OpenOptions};
pub use types::{AttrValue, DType, DatasetInfo, Element, NodeKind, RawArray};

//! File-backed container handle.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::container::Container;
use crate::error::StoreError;
use crate::read::{self, Decoded};
use crate::source::Source;
use crate::tree::{DatasetNode, GroupNode, Node, Payload, Tree};
use crate::types::{AttrValue, DatasetInfo, NodeKind, RawArray};
use crate::write;

/// Decode a file image. Content the adapter cannot represent is logged for
/// read-only opens and refused for writable ones, since a flush would drop it.
fn decode_for(data: &[u8], mode: Mode) -> Result<Tree, StoreError> {
    let Decoded { tree, unsupported } = read::decode(data)?;
    if unsupported.is_empty() {
        return Ok(tree);
    }
    if mode == Mode::ReadWrite {
        return Err(StoreError::Unsupported(unsupported.join("; ")));
    }
    for what in &unsupported {
        warn!(%what, "skipped unsupported HDF5 content");
    }
    Ok(tree)
}

/// Access mode of an open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ReadOnly,
    ReadWrite,
}

/// Options for opening a [`ContainerFile`].
///
/// ```no_run
/// use pureemd_store::OpenOptions;
///
/// let file = OpenOptions::new().writable(true).open("scan.emd").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct OpenOptions {
    writable: bool,
    create: bool,
    mmap: bool,
}

impl OpenOptions {
    /// Read-only, memory-mapped where available; `create` takes effect once
    /// `writable` is set.
    pub fn new() -> Self {
        Self {
            writable: false,
            create: true,
            mmap: true,
        }
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    /// Create an empty container when a writable open finds no file.
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Memory-map read-only files instead of reading them into memory.
    /// Ignored without the `mmap` feature.
    pub fn mmap(mut self, mmap: bool) -> Self {
        self.mmap = mmap;
        self
    }

    pub fn mode(&self) -> Mode {
        if self.writable {
            Mode::ReadWrite
        } else {
            Mode::ReadOnly
        }
    }

    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<ContainerFile, StoreError> {
        let path = path.as_ref();
        let mode = self.mode();
        match Source::load(path, self.mmap && !self.writable) {
            Ok(source) => {
                let tree = decode_for(source.as_bytes(), mode)?;
                debug!(path = %path.display(), ?mode, ?source, "opened container");
                Ok(ContainerFile {
                    path: Some(path.to_path_buf()),
                    mode,
                    source,
                    tree,
                    dirty: false,
                    closed: false,
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound && self.writable && self.create => {
                let mut file = ContainerFile {
                    path: Some(path.to_path_buf()),
                    mode,
                    source: Source::Empty,
                    tree: Tree::default(),
                    dirty: true,
                    closed: false,
                };
                file.flush()?;
                info!(path = %path.display(), "created container");
                Ok(file)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// An open container file.
///
/// Changes are staged in memory and written by [`flush`](Self::flush) or
/// [`close`](Container::close) through a temporary file that is atomically
/// renamed over the target, so the file on disk is always either the old or
/// the new complete container. Files are standard HDF5 and interoperate with
/// h5py and the HDF5 C library for the supported subset.
pub struct ContainerFile {
    path: Option<PathBuf>,
    mode: Mode,
    source: Source,
    tree: Tree,
    dirty: bool,
    closed: bool,
}

impl ContainerFile {
    /// Open an existing file read-only, or read-write (creating it if missing).
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode) -> Result<Self, StoreError> {
        OpenOptions::new()
            .writable(mode == Mode::ReadWrite)
            .open(path)
    }

    /// A new, empty, writable container that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            mode: Mode::ReadWrite,
            source: Source::Empty,
            tree: Tree::default(),
            dirty: false,
            closed: false,
        }
    }

    /// Open an HDF5 file image held in memory.
    pub fn from_bytes(data: Vec<u8>, mode: Mode) -> Result<Self, StoreError> {
        let tree = decode_for(&data, mode)?;
        Ok(Self {
            path: None,
            mode,
            source: Source::Memory(data),
            tree,
            dirty: false,
            closed: false,
        })
    }

    /// Serialize the current state, including unflushed changes, as an
    /// HDF5 file image. The output depends only on the content.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        self.ensure_open()?;
        write::encode(&self.tree, self.source.as_bytes())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether dataset payloads are served from a memory map.
    pub fn is_mapped(&self) -> bool {
        self.source.is_mapped()
    }

    /// Whether there are changes not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        if self.mode == Mode::ReadOnly {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }

    fn write_atomically(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        if let Ok(meta) = fs::metadata(path) {
            tmp.as_file().set_permissions(meta.permissions())?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

impl Container for ContainerFile {
    fn is_writable(&self) -> bool {
        self.mode == Mode::ReadWrite && !self.closed
    }

    fn kind(&self, path: &str) -> Result<Option<NodeKind>, StoreError> {
        self.ensure_open()?;
        self.tree.kind(path)
    }

    fn children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        self.ensure_open()?;
        Ok(self.tree.group(path)?.children.keys().cloned().collect())
    }

    fn attrs(&self, path: &str) -> Result<BTreeMap<String, AttrValue>, StoreError> {
        self.ensure_open()?;
        Ok(self.tree.attrs(path)?.clone())
    }

    fn attr(&self, path: &str, name: &str) -> Result<Option<AttrValue>, StoreError> {
        self.ensure_open()?;
        Ok(self.tree.attrs(path)?.get(name).cloned())
    }

    fn set_attr(&mut self, path: &str, name: &str, value: AttrValue) -> Result<(), StoreError> {
        self.ensure_writable()?;
        if name.is_empty() {
            return Err(StoreError::InvalidPath(format!("{path}@")));
        }
        self.tree.attrs_mut(path)?.insert(name.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    fn create_group(&mut self, path: &str) -> Result<(), StoreError> {
        self.ensure_writable()?;
        self.tree.insert(path, Node::Group(GroupNode::default()))?;
        self.dirty = true;
        Ok(())
    }

    fn create_dataset(&mut self, path: &str, data: RawArray) -> Result<(), StoreError> {
        self.ensure_writable()?;
        let node = DatasetNode {
            dtype: data.dtype(),
            shape: data.shape().to_vec(),
            attrs: BTreeMap::new(),
            payload: Payload::Owned(data.into_bytes()),
        };
        self.tree.insert(path, Node::Dataset(node))?;
        self.dirty = true;
        Ok(())
    }

    fn dataset_info(&self, path: &str) -> Result<DatasetInfo, StoreError> {
        self.ensure_open()?;
        let ds = self.tree.dataset(path)?;
        Ok(DatasetInfo {
            dtype: ds.dtype,
            shape: ds.shape.clone(),
        })
    }

    fn dataset_bytes(&self, path: &str) -> Result<Cow<'_, [u8]>, StoreError> {
        self.ensure_open()?;
        let ds = self.tree.dataset(path)?;
        ds.payload.resolve(self.source.as_bytes())
    }

    fn remove(&mut self, path: &str) -> Result<(), StoreError> {
        self.ensure_writable()?;
        self.tree.remove(path)?;
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        if self.mode == Mode::ReadOnly || !self.dirty {
            return Ok(());
        }
        if let Some(path) = self.path.as_deref() {
            let bytes = self.to_bytes()?;
            self.write_atomically(path, &bytes)?;
            info!(path = %path.display(), bytes = bytes.len(), "flushed container");
        }
        self.dirty = false;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Ok(());
        }
        let result = self.flush();
        self.closed = true;
        self.source = Source::Empty;
        self.tree = Tree::default();
        if let Some(path) = &self.path {
            debug!(path = %path.display(), "closed container");
        }
        result
    }
}

impl Drop for ContainerFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = ?self.path, "closing container on drop failed: {e}");
        }
    }
}

impl std::fmt::Debug for ContainerFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerFile")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("source", &self.source)
            .field("dirty", &self.dirty)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> ContainerFile {
        let mut c = ContainerFile::in_memory();
        c.create_group("/data").unwrap();
        c.create_group("/data/scan").unwrap();
        c.set_attr("/data/scan", "emd_group_type", AttrValue::I64(1))
            .unwrap();
        c.create_dataset(
            "/data/scan/data",
            RawArray::from_elements(vec![2, 2], &[1i32, 2, 3, 4]).unwrap(),
        )
        .unwrap();
        c
    }

    #[test]
    fn in_memory_roundtrip_through_bytes() {
        let c = populated();
        let bytes = c.to_bytes().unwrap();
        let reopened = ContainerFile::from_bytes(bytes, Mode::ReadOnly).unwrap();
        assert_eq!(reopened.children("/").unwrap(), vec!["data"]);
        assert_eq!(
            reopened.attr("/data/scan", "emd_group_type").unwrap(),
            Some(AttrValue::I64(1))
        );
        let raw = reopened.read_dataset("/data/scan/data").unwrap();
        assert_eq!(raw.shape(), &[2, 2]);
        assert_eq!(raw.to_elements::<i32>().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn read_only_rejects_mutation() {
        let bytes = populated().to_bytes().unwrap();
        let mut c = ContainerFile::from_bytes(bytes, Mode::ReadOnly).unwrap();
        assert!(!c.is_writable());
        assert!(matches!(c.create_group("/x"), Err(StoreError::ReadOnly)));
        assert!(matches!(
            c.set_attr("/", "k", AttrValue::I64(0)),
            Err(StoreError::ReadOnly)
        ));
        assert!(matches!(c.remove("/data"), Err(StoreError::ReadOnly)));
    }

    #[test]
    fn close_is_idempotent_and_final() {
        let mut c = populated();
        c.close().unwrap();
        c.close().unwrap();
        assert!(c.is_closed());
        assert!(matches!(c.kind("/"), Err(StoreError::Closed)));
        assert!(matches!(c.children("/"), Err(StoreError::Closed)));
    }

    #[test]
    fn kinds_and_children() {
        let c = populated();
        assert_eq!(c.kind("/data/scan").unwrap(), Some(NodeKind::Group));
        assert_eq!(c.kind("/data/scan/data").unwrap(), Some(NodeKind::Dataset));
        assert_eq!(c.kind("/data/nothing").unwrap(), None);
        assert!(matches!(
            c.children("/data/scan/data"),
            Err(StoreError::NotAGroup(_))
        ));
        assert!(matches!(
            c.dataset_info("/data/scan"),
            Err(StoreError::NotADataset(_))
        ));
    }

    #[test]
    fn remove_marks_dirty() {
        let mut c = populated();
        c.flush().unwrap();
        assert!(!c.is_dirty());
        c.remove("/data/scan").unwrap();
        assert!(c.is_dirty());
        assert_eq!(c.children("/data").unwrap(), Vec::<String>::new());
    }
}

//! Opened EMD files.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use pureemd_store::{AttrValue, Container, ContainerFile, NodeKind, OpenOptions};
use tracing::{debug, warn};

use crate::array::EmdArray;
use crate::codec::{self, EmdData};
use crate::comments;
use crate::dims::DimVector;
use crate::discovery::discover;
use crate::error::{Error, Result};
use crate::group::EmdGroup;
use crate::layout::Layout;
use crate::lazy::LazyArray;
use crate::version::{self, Resolution, Version};

/// Default parent of newly written EMD groups.
pub const DATA_GROUP: &str = "/data";

/// Groups every writable file is given when they are missing.
const STANDARD_GROUPS: &[&str] = &["/data", "/microscope", "/sample", "/user", "/comments"];

/// The free-form metadata groups at the root of an EMD file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataGroup {
    Microscope,
    Sample,
    User,
    Comments,
}

impl MetadataGroup {
    pub fn path(self) -> &'static str {
        match self {
            MetadataGroup::Microscope => "/microscope",
            MetadataGroup::Sample => "/sample",
            MetadataGroup::User => "/user",
            MetadataGroup::Comments => comments::COMMENTS_GROUP,
        }
    }
}

/// An open EMD file.
///
/// Opening resolves the version (writing 0.2 to a fresh writable file),
/// creates the standard root groups if the file is writable, and discovers
/// all EMD groups. The discovered list is a snapshot: [`write`] refreshes
/// it, other changes need [`refresh`].
///
/// The container is closed by [`close`], or on drop.
///
/// [`write`]: EmdFile::write
/// [`refresh`]: EmdFile::refresh
/// [`close`]: EmdFile::close
pub struct EmdFile<C: Container = ContainerFile> {
    container: C,
    resolution: Resolution,
    groups: Vec<EmdGroup>,
    closed: bool,
}

impl EmdFile<ContainerFile> {
    /// Open an existing file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_options(path, OpenOptions::new())
    }

    /// Open a file for reading and writing, creating it if missing.
    pub fn open_rw<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_options(path, OpenOptions::new().writable(true))
    }

    pub fn with_options<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let container = options.open(path).map_err(|source| Error::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_container(container)
    }
}

impl<C: Container> EmdFile<C> {
    /// Attach to an already opened container.
    pub fn from_container(mut container: C) -> Result<Self> {
        let resolution = version::resolve(&mut container);
        if container.is_writable() {
            bootstrap(&mut container)?;
        }
        let groups = discover(&container, "/")?;
        Ok(Self {
            container,
            resolution,
            groups,
            closed: false,
        })
    }

    /// The effective version: as found in the file, or 0.2.
    pub fn version(&self) -> Version {
        self.resolution.version
    }

    /// The version stored in the file, if there was one when it was opened.
    pub fn detected_version(&self) -> Option<Version> {
        self.resolution.detected
    }

    pub fn layout(&self) -> Layout {
        self.resolution.layout
    }

    pub fn is_writable(&self) -> bool {
        self.container.is_writable()
    }

    /// EMD groups found by the last discovery pass, in traversal order.
    pub fn groups(&self) -> &[EmdGroup] {
        &self.groups
    }

    pub fn group(&self, index: usize) -> Result<&EmdGroup> {
        self.groups.get(index).ok_or(Error::NoSuchGroup {
            index,
            count: self.groups.len(),
        })
    }

    /// Rediscover EMD groups from the root.
    pub fn refresh(&mut self) -> Result<&[EmdGroup]> {
        self.groups = discover(&self.container, "/")?;
        Ok(&self.groups)
    }

    pub fn read(&self, group: &EmdGroup) -> Result<EmdData> {
        codec::read_group(&self.container, self.layout(), group)
    }

    pub fn read_index(&self, index: usize) -> Result<EmdData> {
        self.read(self.group(index)?)
    }

    /// Read a group's dims, leaving its dataset values in the file.
    pub fn read_lazy(&self, group: &EmdGroup) -> Result<EmdData<LazyArray<'_, C>>> {
        codec::read_group_lazy(&self.container, self.layout(), group)
    }

    pub fn read_lazy_index(&self, index: usize) -> Result<EmdData<LazyArray<'_, C>>> {
        self.read_lazy(self.group(index)?)
    }

    /// Write a new EMD group `label` under `parent` (default `/data`) and
    /// rediscover groups.
    ///
    /// Once the group is written this returns `Ok`. If rediscovery then
    /// fails, [`groups`](EmdFile::groups) stays stale until the next
    /// successful [`refresh`](EmdFile::refresh).
    pub fn write(
        &mut self,
        label: &str,
        data: &EmdArray,
        dims: &[DimVector],
        parent: Option<&str>,
        overwrite: bool,
    ) -> Result<EmdGroup> {
        let group = codec::write_group(
            &mut self.container,
            self.resolution.layout,
            label,
            data,
            dims,
            parent.unwrap_or(DATA_GROUP),
            overwrite,
        )?;
        if let Err(e) = self.refresh() {
            warn!(group = %group, error = %e, "group list not refreshed after write");
        }
        Ok(group)
    }

    /// Append a comment; see [`comments::append`]. Returns the key used.
    pub fn put_comment(&mut self, message: &str, timestamp: Option<&str>) -> Result<String> {
        comments::append(&mut self.container, message, timestamp)
    }

    pub fn comments(&self) -> Result<BTreeMap<String, String>> {
        comments::comments(&self.container)
    }

    /// Attributes of a metadata group; empty if the group is absent.
    pub fn metadata(&self, group: MetadataGroup) -> Result<BTreeMap<String, AttrValue>> {
        if self.container.kind(group.path())? != Some(NodeKind::Group) {
            return Ok(BTreeMap::new());
        }
        Ok(self.container.attrs(group.path())?)
    }

    pub fn set_metadata(
        &mut self,
        group: MetadataGroup,
        key: &str,
        value: impl Into<AttrValue>,
    ) -> Result<()> {
        if !self.container.is_writable() {
            return Err(Error::ReadOnly);
        }
        self.container.set_attr(group.path(), key, value.into())?;
        Ok(())
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    /// Direct access to the container. Changes made here are not reflected
    /// in [`groups`](EmdFile::groups) until the next refresh.
    pub fn container_mut(&mut self) -> &mut C {
        &mut self.container
    }

    /// Persist staged changes without closing.
    pub fn flush(&mut self) -> Result<()> {
        Ok(self.container.flush()?)
    }

    /// Flush and close the container.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        Ok(self.container.close()?)
    }
}

fn bootstrap<C: Container + ?Sized>(container: &mut C) -> Result<()> {
    for path in STANDARD_GROUPS {
        match container.kind(path)? {
            None => {
                container.create_group(path)?;
                debug!(group = path, "created standard group");
            }
            Some(NodeKind::Dataset) => {
                warn!(group = path, "standard group name is taken by a dataset");
            }
            Some(NodeKind::Group) => {}
        }
    }
    Ok(())
}

impl<C: Container> Drop for EmdFile<C> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.container.close() {
                warn!(error = %e, "failed to close EMD file on drop");
            }
        }
    }
}

impl<C: Container> fmt::Debug for EmdFile<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmdFile")
            .field("version", &self.resolution.version)
            .field("layout", &self.resolution.layout)
            .field("writable", &self.container.is_writable())
            .field("groups", &self.groups)
            .finish()
    }
}

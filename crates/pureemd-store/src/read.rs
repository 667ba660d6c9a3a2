//! Decode an HDF5 file into the in-memory [`Tree`].
//!
//! Metadata is decoded eagerly; dataset payloads are not. Little-endian
//! contiguous data is referenced in place, everything else (big-endian,
//! chunked, unallocated) is assembled on first read by [`StoredData`].
//!
//! Objects or attributes the adapter cannot represent are skipped and
//! listed in [`Decoded::unsupported`], so callers can refuse to rewrite a
//! file that would lose them.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::attribute::AttributeMessage;
use crate::btree_v1;
use crate::bytes::{self, read_addr, read_u8, to_index};
use crate::data_layout::{filter_count, ChunkIndex, DataLayout};
use crate::dataspace::Dataspace;
use crate::datatype::Datatype;
use crate::error::StoreError;
use crate::group::{self, LinkTarget};
use crate::message_type::MessageType;
use crate::object_header::{ObjectHeader, FLAG_FAIL_WRITE_IF_UNKNOWN, FLAG_SHARED};
use crate::signature::find_signature;
use crate::superblock::Superblock;
use crate::tree::{DatasetNode, GroupNode, Node, Payload, Tree};
use crate::types::{byte_len, AttrValue, DType};

/// Result of decoding a file.
#[derive(Debug)]
pub(crate) struct Decoded {
    pub tree: Tree,
    /// `path: reason` for everything that was skipped.
    pub unsupported: Vec<String>,
}

pub(crate) fn decode(data: &[u8]) -> Result<Decoded, StoreError> {
    let sig = find_signature(data)?;
    let sb = Superblock::parse(data, sig)?;
    debug!(
        version = sb.version,
        offset_size = sb.offset_size,
        base = sb.base_address,
        eof = sb.eof_address,
        "read superblock"
    );
    let root_address = sb.root_object_header;
    let mut reader = Reader {
        data,
        sb,
        unsupported: Vec::new(),
        ancestry: vec![root_address],
    };
    let root = match reader.object("/", root_address)? {
        Some(Node::Group(g)) => g,
        Some(Node::Dataset(_)) => return Err(StoreError::NotAGroup("/".to_string())),
        None => return Err(StoreError::Unsupported(reader.unsupported.join("; "))),
    };
    Ok(Decoded {
        tree: Tree { root },
        unsupported: reader.unsupported,
    })
}

fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

struct Reader<'a> {
    data: &'a [u8],
    sb: Superblock,
    unsupported: Vec<String>,
    /// Header addresses from the root down to the object being decoded.
    ancestry: Vec<u64>,
}

impl<'a> Reader<'a> {
    fn skip(&mut self, path: &str, why: String) {
        trace!(path, %why, "skipping");
        self.unsupported.push(format!("{path}: {why}"));
    }

    /// Decode the object at `address`. `None` if it was skipped.
    fn object(&mut self, path: &str, address: u64) -> Result<Option<Node>, StoreError> {
        let header = match ObjectHeader::parse(self.data, address, &self.sb) {
            Ok(h) => h,
            Err(StoreError::Unsupported(why)) => {
                self.skip(path, why);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        for m in &header.messages {
            if let MessageType::Unknown(id) = m.msg_type {
                if m.flags & FLAG_FAIL_WRITE_IF_UNKNOWN != 0 {
                    self.skip(path, format!("header message {id:#06x}"));
                }
            }
        }
        let attrs = self.attributes(path, &header)?;
        let node = if header.find(MessageType::DataLayout).is_some() {
            self.dataset(&header, attrs).map(Node::Dataset)
        } else {
            self.group(path, &header, attrs).map(Node::Group)
        };
        match node {
            Ok(node) => Ok(Some(node)),
            Err(StoreError::Unsupported(why)) => {
                self.skip(path, why);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn attributes(
        &mut self,
        path: &str,
        header: &ObjectHeader<'_>,
    ) -> Result<BTreeMap<String, AttrValue>, StoreError> {
        if let Some(info) = header.find(MessageType::AttributeInfo) {
            let flags = read_u8(info.data, 1)?;
            let heap_at = if flags & 0x01 != 0 { 4 } else { 2 };
            if read_addr(info.data, heap_at, self.sb.offset_size)?.is_some() {
                self.skip(path, "dense attribute storage".to_string());
            }
        }
        let mut attrs = BTreeMap::new();
        for m in header.all(MessageType::Attribute) {
            let value = AttributeMessage::parse(m.data, &self.sb)
                .and_then(|a| Ok((a.value(self.data, &self.sb)?, a.name)));
            match value {
                Ok((value, name)) => {
                    attrs.insert(name, value);
                }
                Err(StoreError::Unsupported(why)) => self.skip(path, format!("attribute: {why}")),
                Err(e) => return Err(e),
            }
        }
        Ok(attrs)
    }

    fn group(
        &mut self,
        path: &str,
        header: &ObjectHeader<'_>,
        attrs: BTreeMap<String, AttrValue>,
    ) -> Result<GroupNode, StoreError> {
        let mut members = Vec::new();
        if let Some(st) = header.find(MessageType::SymbolTable) {
            members = group::symbol_table_members(self.data, st.data, &self.sb)?;
        } else {
            if let Some(info) = header.find(MessageType::LinkInfo) {
                if group::link_info_is_dense(info.data, &self.sb)? {
                    self.skip(path, "dense link storage".to_string());
                }
            }
            for m in header.all(MessageType::Link) {
                match group::parse_link(m.data, &self.sb)? {
                    (name, LinkTarget::Hard(addr)) => members.push((name, addr)),
                    (name, LinkTarget::Soft(target)) => {
                        self.skip(&join(path, &name), format!("soft link to {target}"))
                    }
                    (name, LinkTarget::Other(kind)) => {
                        self.skip(&join(path, &name), format!("link of type {kind}"))
                    }
                }
            }
        }

        let mut children = BTreeMap::new();
        for (name, address) in members {
            let child = join(path, &name);
            if self.ancestry.contains(&address) {
                self.skip(&child, "link back to an enclosing group".to_string());
                continue;
            }
            self.ancestry.push(address);
            let node = self.object(&child, address);
            self.ancestry.pop();
            if let Some(node) = node? {
                children.insert(name, node);
            }
        }
        Ok(GroupNode { attrs, children })
    }

    fn dataset(
        &mut self,
        header: &ObjectHeader<'_>,
        attrs: BTreeMap<String, AttrValue>,
    ) -> Result<DatasetNode, StoreError> {
        let datatype = Datatype::parse(required(header, MessageType::Datatype)?)?;
        let dtype = datatype
            .to_dtype()
            .ok_or_else(|| StoreError::Unsupported(format!("dataset of {datatype:?}")))?;
        let dataspace =
            Dataspace::parse(required(header, MessageType::Dataspace)?, self.sb.length_size)?;
        if dataspace == Dataspace::Null {
            return Err(StoreError::Unsupported("dataset with a null dataspace".to_string()));
        }
        let shape = dataspace.shape()?;
        let len = byte_len(dtype, &shape).ok_or(StoreError::PayloadSize {
            expected: usize::MAX,
            actual: 0,
        })?;
        if let Some(pipeline) = header.find(MessageType::FilterPipeline) {
            if filter_count(pipeline.data)? > 0 {
                return Err(StoreError::Unsupported("filtered (compressed) dataset".to_string()));
            }
        }

        let big_endian = datatype.is_big_endian();
        let layout = DataLayout::parse(
            required(header, MessageType::DataLayout)?,
            self.sb.offset_size,
            self.sb.length_size,
        )?;
        let stored = |layout| {
            Payload::Stored(Box::new(StoredData {
                sb: self.sb.clone(),
                dtype,
                shape: shape.clone(),
                big_endian,
                layout,
            }))
        };
        let payload = match layout {
            DataLayout::Compact(raw) => {
                let mut bytes = bytes::slice(raw, 0, len)?.to_vec();
                if big_endian {
                    swap_bytes(&mut bytes, dtype);
                }
                Payload::Owned(bytes)
            }
            DataLayout::Contiguous { address: None, .. } => stored(StoredLayout::Unallocated),
            DataLayout::Contiguous {
                address: Some(address),
                ..
            } => {
                let offset = to_index(self.sb.base_address, address)?;
                bytes::ensure_len(self.data, offset, len)?;
                if big_endian {
                    stored(StoredLayout::Contiguous { offset })
                } else {
                    Payload::Source { offset, len }
                }
            }
            DataLayout::Chunked { chunk_dims, index } => {
                let chunk_dims = chunk_dims
                    .into_iter()
                    .map(bytes::to_usize)
                    .collect::<Result<Vec<_>, _>>()?;
                if chunk_dims.len() != shape.len() || chunk_dims.contains(&0) {
                    return Err(StoreError::Unsupported(format!(
                        "chunk shape {chunk_dims:?} for dataset shape {shape:?}"
                    )));
                }
                byte_len(dtype, &chunk_dims).ok_or(StoreError::PayloadSize {
                    expected: usize::MAX,
                    actual: 0,
                })?;
                stored(StoredLayout::Chunked { chunk_dims, index })
            }
            DataLayout::Unsupported(why) => return Err(StoreError::Unsupported(why)),
        };
        Ok(DatasetNode {
            dtype,
            shape,
            attrs,
            payload,
        })
    }
}

/// Body of a message a dataset cannot do without.
fn required<'h>(header: &ObjectHeader<'h>, t: MessageType) -> Result<&'h [u8], StoreError> {
    let m = header
        .find(t)
        .ok_or_else(|| StoreError::Unsupported(format!("dataset without {t:?} message")))?;
    if m.flags & FLAG_SHARED != 0 {
        return Err(StoreError::Unsupported(format!("shared {t:?} message")));
    }
    Ok(m.data)
}

#[derive(Debug, Clone)]
enum StoredLayout {
    /// Never written; reads as zeros.
    Unallocated,
    /// Big-endian contiguous data at this index.
    Contiguous { offset: usize },
    Chunked {
        chunk_dims: Vec<usize>,
        index: ChunkIndex,
    },
}

/// A dataset payload that needs assembly before it can be served.
#[derive(Debug, Clone)]
pub(crate) struct StoredData {
    sb: Superblock,
    dtype: DType,
    shape: Vec<usize>,
    big_endian: bool,
    layout: StoredLayout,
}

impl StoredData {
    /// Assemble the row-major little-endian payload from `source`.
    pub(crate) fn load(&self, source: &[u8]) -> Result<Vec<u8>, StoreError> {
        let len = byte_len(self.dtype, &self.shape).ok_or(StoreError::PayloadSize {
            expected: usize::MAX,
            actual: 0,
        })?;
        let mut out = match &self.layout {
            StoredLayout::Unallocated => vec![0; len],
            StoredLayout::Contiguous { offset } => bytes::slice(source, *offset, len)?.to_vec(),
            StoredLayout::Chunked { chunk_dims, index } => {
                let mut out = vec![0; len];
                self.fill_chunks(source, chunk_dims, index, &mut out)?;
                out
            }
        };
        if self.big_endian {
            swap_bytes(&mut out, self.dtype);
        }
        Ok(out)
    }

    fn fill_chunks(
        &self,
        source: &[u8],
        chunk_dims: &[usize],
        index: &ChunkIndex,
        out: &mut [u8],
    ) -> Result<(), StoreError> {
        let elem = self.dtype.size();
        let chunk_len = byte_len(self.dtype, chunk_dims).ok_or(StoreError::PayloadSize {
            expected: usize::MAX,
            actual: 0,
        })?;
        let rank = self.shape.len();
        let base = self.sb.base_address;
        match index {
            ChunkIndex::BTreeV1(None)
            | ChunkIndex::SingleChunk(None)
            | ChunkIndex::Implicit(None) => {}
            ChunkIndex::BTreeV1(Some(root)) => {
                for entry in btree_v1::chunk_entries(source, *root, &self.sb, rank)? {
                    let origin = entry
                        .offsets
                        .into_iter()
                        .map(bytes::to_usize)
                        .collect::<Result<Vec<_>, _>>()?;
                    let chunk = chunk_at(source, base, entry.address, chunk_len)?;
                    copy_chunk(out, &self.shape, chunk, chunk_dims, &origin, elem);
                }
            }
            ChunkIndex::SingleChunk(Some(address)) => {
                let chunk = chunk_at(source, base, *address, chunk_len)?;
                copy_chunk(out, &self.shape, chunk, chunk_dims, &vec![0; rank], elem);
            }
            ChunkIndex::Implicit(Some(address)) => {
                let grid: Vec<usize> = self
                    .shape
                    .iter()
                    .zip(chunk_dims)
                    .map(|(&s, &c)| s.div_ceil(c))
                    .collect();
                let count = grid.iter().product::<usize>();
                for k in 0..count {
                    let mut rest = k;
                    let mut origin = vec![0; rank];
                    for d in (0..rank).rev() {
                        origin[d] = (rest % grid[d]) * chunk_dims[d];
                        rest /= grid[d];
                    }
                    let step = (k as u64)
                        .checked_mul(chunk_len as u64)
                        .and_then(|o| o.checked_add(*address))
                        .ok_or(StoreError::InvalidAddress(*address))?;
                    let chunk = chunk_at(source, base, step, chunk_len)?;
                    copy_chunk(out, &self.shape, chunk, chunk_dims, &origin, elem);
                }
            }
        }
        Ok(())
    }
}

fn chunk_at(source: &[u8], base: u64, address: u64, len: usize) -> Result<&[u8], StoreError> {
    bytes::slice(source, to_index(base, address)?, len)
}

/// Copy the in-bounds part of one chunk into the row-major output.
fn copy_chunk(
    out: &mut [u8],
    shape: &[usize],
    chunk: &[u8],
    chunk_dims: &[usize],
    origin: &[usize],
    elem: usize,
) {
    let Some(last) = shape.len().checked_sub(1) else {
        return;
    };
    if origin.len() != shape.len() || origin.iter().zip(shape).any(|(o, s)| o >= s) {
        return;
    }
    let row = chunk_dims[last].min(shape[last] - origin[last]) * elem;
    let mut idx = vec![0usize; last];
    loop {
        if idx
            .iter()
            .enumerate()
            .all(|(d, &i)| origin[d] + i < shape[d])
        {
            let mut src = 0;
            let mut dst = 0;
            for d in 0..last {
                src = src * chunk_dims[d] + idx[d];
                dst = dst * shape[d] + origin[d] + idx[d];
            }
            let src = src * chunk_dims[last] * elem;
            let dst = (dst * shape[last] + origin[last]) * elem;
            out[dst..dst + row].copy_from_slice(&chunk[src..src + row]);
        }
        let mut d = last;
        loop {
            if d == 0 {
                return;
            }
            d -= 1;
            idx[d] += 1;
            if idx[d] < chunk_dims[d] {
                break;
            }
            idx[d] = 0;
        }
    }
}

fn swap_bytes(bytes: &mut [u8], dtype: DType) {
    for element in bytes.chunks_exact_mut(dtype.size()) {
        element.reverse();
    }
}

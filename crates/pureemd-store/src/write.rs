//! Encode the in-memory [`Tree`] as an HDF5 file image.
//!
//! Layout: a v2 superblock, one v2 object header per object (root group
//! first, then depth-first in name order), then the contiguous dataset
//! payloads, 8-byte aligned. Groups use compact link storage. Every address
//! field is 8 bytes wide, so header sizes do not depend on the addresses
//! they contain: a first pass sizes the headers, a second pass writes them.

use std::borrow::Cow;
use std::collections::BTreeMap;

use tracing::debug;

use crate::attribute::AttributeMessage;
use crate::bytes::pad8;
use crate::data_layout::DataLayout;
use crate::dataspace::Dataspace;
use crate::datatype::Datatype;
use crate::error::StoreError;
use crate::group;
use crate::message_type::MessageType;
use crate::object_header::{ObjectHeaderWriter, FLAG_CONSTANT};
use crate::superblock::{Superblock, SUPERBLOCK_V2_SIZE};
use crate::tree::{DatasetNode, GroupNode, Node, Tree};
use crate::types::{byte_len, AttrValue};

/// Fill value v3: allocate late, never write fill, no value defined.
const FILL_VALUE: [u8; 2] = [3, 0x0a];

enum Object<'t> {
    Group {
        attrs: &'t BTreeMap<String, AttrValue>,
        children: Vec<(&'t str, usize)>,
    },
    Dataset {
        node: &'t DatasetNode,
        data: Cow<'t, [u8]>,
    },
}

fn flatten<'t>(
    group: &'t GroupNode,
    source: &'t [u8],
    out: &mut Vec<Object<'t>>,
) -> Result<usize, StoreError> {
    let index = out.len();
    out.push(Object::Group {
        attrs: &group.attrs,
        children: Vec::new(),
    });
    let mut children = Vec::with_capacity(group.children.len());
    for (name, node) in &group.children {
        let child = match node {
            Node::Group(g) => flatten(g, source, out)?,
            Node::Dataset(d) => {
                let data = d.payload.resolve(source)?;
                let expected = byte_len(d.dtype, &d.shape).ok_or(StoreError::PayloadSize {
                    expected: usize::MAX,
                    actual: data.len(),
                })?;
                if data.len() != expected {
                    return Err(StoreError::PayloadSize {
                        expected,
                        actual: data.len(),
                    });
                }
                out.push(Object::Dataset { node: d, data });
                out.len() - 1
            }
        };
        children.push((name.as_str(), child));
    }
    if let Object::Group { children: slot, .. } = &mut out[index] {
        *slot = children;
    }
    Ok(index)
}

fn add_attributes(
    w: &mut ObjectHeaderWriter,
    attrs: &BTreeMap<String, AttrValue>,
) -> Result<(), StoreError> {
    for (name, value) in attrs {
        w.add_message(MessageType::Attribute, AttributeMessage::encode(name, value)?);
    }
    Ok(())
}

fn object_header(
    object: &Object<'_>,
    headers: &[u64],
    data_address: Option<u64>,
) -> Result<Vec<u8>, StoreError> {
    let mut w = ObjectHeaderWriter::new();
    match object {
        Object::Group { attrs, children } => {
            w.add_message(MessageType::LinkInfo, group::serialize_link_info());
            w.add_message(MessageType::GroupInfo, group::serialize_group_info());
            for (name, index) in children {
                w.add_message(
                    MessageType::Link,
                    group::serialize_hard_link(name, headers[*index]),
                );
            }
            add_attributes(&mut w, attrs)?;
        }
        Object::Dataset { node, data } => {
            let datatype = Datatype::from_dtype(node.dtype).serialize()?;
            w.add_message_with_flags(MessageType::Datatype, datatype, FLAG_CONSTANT);
            w.add_message(
                MessageType::Dataspace,
                Dataspace::for_shape(&node.shape).serialize(),
            );
            w.add_message_with_flags(MessageType::FillValue, FILL_VALUE.to_vec(), FLAG_CONSTANT);
            w.add_message(
                MessageType::DataLayout,
                DataLayout::serialize_contiguous(data_address, data.len() as u64),
            );
            add_attributes(&mut w, &node.attrs)?;
        }
    }
    w.serialize()
}

/// Serialize `tree`, resolving unchanged payloads from `source`.
pub(crate) fn encode(tree: &Tree, source: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut objects = Vec::new();
    flatten(&tree.root, source, &mut objects)?;

    // Pass 1: sizes.
    let placeholder = vec![0u64; objects.len()];
    let mut headers = Vec::with_capacity(objects.len());
    let mut pos = SUPERBLOCK_V2_SIZE as u64;
    for object in &objects {
        headers.push(pos);
        pos += object_header(object, &placeholder, Some(0))?.len() as u64;
    }
    let mut data_addresses = Vec::with_capacity(objects.len());
    for object in &objects {
        match object {
            Object::Dataset { data, .. } if !data.is_empty() => {
                pos = pad8(pos as usize) as u64;
                data_addresses.push(Some(pos));
                pos += data.len() as u64;
            }
            _ => data_addresses.push(None),
        }
    }
    let eof = pos;

    // Pass 2: bytes.
    let mut buf = Superblock::v2(eof, headers[0]).serialize_v2();
    buf.reserve(eof as usize - buf.len());
    for (object, data_address) in objects.iter().zip(&data_addresses) {
        buf.extend_from_slice(&object_header(object, &headers, *data_address)?);
    }
    for (object, data_address) in objects.iter().zip(&data_addresses) {
        if let (Object::Dataset { data, .. }, Some(address)) = (object, data_address) {
            buf.resize(*address as usize, 0);
            buf.extend_from_slice(data);
        }
    }
    debug_assert_eq!(buf.len() as u64, eof);
    debug!(objects = objects.len(), bytes = buf.len(), "encoded HDF5 image");
    Ok(buf)
}

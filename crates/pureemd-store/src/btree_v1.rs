//! HDF5 version 1 B-trees: type 0 (group symbol nodes) and type 1 (raw
//! data chunks).

use crate::bytes::{self, read_u16, read_u32, read_u8, read_uint, to_index};
use crate::error::StoreError;
use crate::superblock::Superblock;

const TREE_SIGNATURE: &[u8; 4] = b"TREE";

/// One chunk referenced from a type 1 tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkEntry {
    /// Element offsets of the chunk's first element, one per dataset dimension.
    pub offsets: Vec<u64>,
    pub size: u32,
    pub filter_mask: u32,
    pub address: u64,
}

struct Node {
    node_type: u8,
    level: u8,
    /// (key position, child address) per entry.
    entries: Vec<(usize, u64)>,
}

fn parse_node(
    data: &[u8],
    address: u64,
    sb: &Superblock,
    key_size: usize,
) -> Result<Node, StoreError> {
    let offset = to_index(sb.base_address, address)?;
    let header = bytes::slice(data, offset, 8)?;
    if &header[..4] != TREE_SIGNATURE {
        return Err(StoreError::InvalidSignature("TREE"));
    }
    let node_type = read_u8(data, offset + 4)?;
    let level = read_u8(data, offset + 5)?;
    let used = usize::from(read_u16(data, offset + 6)?);
    let os = usize::from(sb.offset_size);
    // Skip the sibling pointers.
    let mut pos = offset + 8 + 2 * os;
    let mut entries = Vec::with_capacity(used);
    for _ in 0..used {
        let key = pos;
        pos += key_size;
        let child = read_uint(data, pos, sb.offset_size)?;
        pos += os;
        entries.push((key, child));
    }
    Ok(Node {
        node_type,
        level,
        entries,
    })
}

/// Walk a tree depth-first. Levels must strictly decrease downwards, which
/// bounds the walk even on corrupt input.
fn walk_leaves(
    data: &[u8],
    root: u64,
    sb: &Superblock,
    node_type: u8,
    key_size: usize,
    mut visit: impl FnMut(usize, u64) -> Result<(), StoreError>,
) -> Result<(), StoreError> {
    let mut stack = vec![(root, None::<u8>)];
    while let Some((address, parent_level)) = stack.pop() {
        let node = parse_node(data, address, sb, key_size)?;
        if node.node_type != node_type {
            return Err(StoreError::UnknownTag {
                what: "B-tree node type",
                tag: node.node_type,
            });
        }
        if parent_level.is_some_and(|p| node.level >= p) {
            return Err(StoreError::Unsupported(format!(
                "B-tree node at {address:#x} does not descend"
            )));
        }
        if node.level == 0 {
            for (key, child) in node.entries {
                visit(key, child)?;
            }
        } else {
            // Reverse so children are visited left to right.
            for (_, child) in node.entries.into_iter().rev() {
                stack.push((child, Some(node.level)));
            }
        }
    }
    Ok(())
}

/// Addresses of the symbol table nodes (`SNOD`) below a group B-tree.
pub(crate) fn group_symbol_nodes(
    data: &[u8],
    root: u64,
    sb: &Superblock,
) -> Result<Vec<u64>, StoreError> {
    let mut out = Vec::new();
    walk_leaves(data, root, sb, 0, usize::from(sb.length_size), |_, child| {
        out.push(child);
        Ok(())
    })?;
    Ok(out)
}

/// Every chunk of a dataset with `rank` dimensions.
pub(crate) fn chunk_entries(
    data: &[u8],
    root: u64,
    sb: &Superblock,
    rank: usize,
) -> Result<Vec<ChunkEntry>, StoreError> {
    // size(4) + filter mask(4) + one offset per dimension plus the element dimension
    let key_size = 8 + 8 * (rank + 1);
    let mut out = Vec::new();
    walk_leaves(data, root, sb, 1, key_size, |key, address| {
        let size = read_u32(data, key)?;
        let filter_mask = read_u32(data, key + 4)?;
        let offsets = (0..rank)
            .map(|i| read_uint(data, key + 8 + 8 * i, 8))
            .collect::<Result<Vec<_>, _>>()?;
        out.push(ChunkEntry {
            offsets,
            size,
            filter_mask,
            address,
        });
        Ok(())
    })?;
    Ok(out)
}

//! Group membership: old-style symbol tables (B-tree + local heap + `SNOD`
//! nodes) and new-style compact Link messages.

use crate::btree_v1;
use crate::bytes::{self, read_addr, read_u16, read_u8, read_uint, to_index, write_uint, UNDEFINED};
use crate::error::StoreError;
use crate::superblock::Superblock;

const HEAP_SIGNATURE: &[u8; 4] = b"HEAP";
const SNOD_SIGNATURE: &[u8; 4] = b"SNOD";

// Link message flags.
const LINK_NAME_SIZE_MASK: u8 = 0x03;
const LINK_HAS_CREATION_ORDER: u8 = 0x04;
const LINK_HAS_TYPE: u8 = 0x08;
const LINK_HAS_CHARSET: u8 = 0x10;

/// Where a link points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LinkTarget {
    Hard(u64),
    Soft(String),
    /// External or user-defined link, with its type byte.
    Other(u8),
}

/// Data segment of a local heap, which holds symbol table link names.
fn local_heap_data<'a>(
    data: &'a [u8],
    address: u64,
    sb: &Superblock,
) -> Result<&'a [u8], StoreError> {
    let offset = to_index(sb.base_address, address)?;
    if bytes::slice(data, offset, 4)? != HEAP_SIGNATURE {
        return Err(StoreError::InvalidSignature("HEAP"));
    }
    let version = read_u8(data, offset + 4)?;
    if version != 0 {
        return Err(StoreError::UnsupportedVersion {
            what: "local heap",
            version,
        });
    }
    let ls = usize::from(sb.length_size);
    let size = bytes::to_usize(read_uint(data, offset + 8, sb.length_size)?)?;
    // Skip the free list head.
    let data_address = read_uint(data, offset + 8 + 2 * ls, sb.offset_size)?;
    bytes::slice(data, to_index(sb.base_address, data_address)?, size)
}

/// (name, object header address) of every member of a symbol-table group.
pub(crate) fn symbol_table_members(
    data: &[u8],
    symbol_table_message: &[u8],
    sb: &Superblock,
) -> Result<Vec<(String, u64)>, StoreError> {
    let btree = read_uint(symbol_table_message, 0, sb.offset_size)?;
    let heap = read_uint(symbol_table_message, usize::from(sb.offset_size), sb.offset_size)?;
    let names = local_heap_data(data, heap, sb)?;
    let os = usize::from(sb.offset_size);
    let entry_size = 2 * os + 24;

    let mut members = Vec::new();
    for snod in btree_v1::group_symbol_nodes(data, btree, sb)? {
        let offset = to_index(sb.base_address, snod)?;
        if bytes::slice(data, offset, 4)? != SNOD_SIGNATURE {
            return Err(StoreError::InvalidSignature("SNOD"));
        }
        let count = usize::from(read_u16(data, offset + 6)?);
        for i in 0..count {
            let entry = offset + 8 + i * entry_size;
            let name_offset = bytes::to_usize(read_uint(data, entry, sb.offset_size)?)?;
            let header = read_uint(data, entry + os, sb.offset_size)?;
            let name = bytes::c_str(names.get(name_offset..).unwrap_or_default())?;
            members.push((name, header));
        }
    }
    Ok(members)
}

/// Parse a Link message body.
pub(crate) fn parse_link(body: &[u8], sb: &Superblock) -> Result<(String, LinkTarget), StoreError> {
    let version = read_u8(body, 0)?;
    if version != 1 {
        return Err(StoreError::UnsupportedVersion {
            what: "link message",
            version,
        });
    }
    let flags = read_u8(body, 1)?;
    let mut pos = 2;
    let link_type = if flags & LINK_HAS_TYPE != 0 {
        pos += 1;
        read_u8(body, pos - 1)?
    } else {
        0
    };
    if flags & LINK_HAS_CREATION_ORDER != 0 {
        pos += 8;
    }
    if flags & LINK_HAS_CHARSET != 0 {
        pos += 1;
    }
    let width = 1u8 << (flags & LINK_NAME_SIZE_MASK);
    let name_len = bytes::to_usize(read_uint(body, pos, width)?)?;
    pos += usize::from(width);
    let name = std::str::from_utf8(bytes::slice(body, pos, name_len)?)
        .map_err(|_| StoreError::InvalidUtf8)?
        .to_string();
    pos += name_len;

    let target = match link_type {
        0 => LinkTarget::Hard(read_uint(body, pos, sb.offset_size)?),
        1 => {
            let len = usize::from(read_u16(body, pos)?);
            let path = bytes::slice(body, pos + 2, len)?;
            LinkTarget::Soft(String::from_utf8_lossy(path).into_owned())
        }
        other => LinkTarget::Other(other),
    };
    Ok((name, target))
}

/// Hard-link message with 8-byte addresses.
pub(crate) fn serialize_hard_link(name: &str, address: u64) -> Vec<u8> {
    let name_bytes = name.as_bytes();
    let (size_bits, width) = match name_bytes.len() {
        0..=0xFF => (0u8, 1u8),
        0x100..=0xFFFF => (1, 2),
        _ => (2, 4),
    };
    let utf8 = !name.is_ascii();
    let mut flags = size_bits;
    if utf8 {
        flags |= LINK_HAS_CHARSET;
    }
    let mut buf = vec![1, flags];
    if utf8 {
        buf.push(1);
    }
    write_uint(&mut buf, name_bytes.len() as u64, width);
    buf.extend_from_slice(name_bytes);
    write_uint(&mut buf, address, 8);
    buf
}

/// Whether a Link Info message points at dense (fractal heap) link storage.
pub(crate) fn link_info_is_dense(body: &[u8], sb: &Superblock) -> Result<bool, StoreError> {
    let flags = read_u8(body, 1)?;
    let pos = if flags & 0x01 != 0 { 10 } else { 2 };
    Ok(read_addr(body, pos, sb.offset_size)?.is_some())
}

/// Link Info with compact storage and no creation-order tracking.
pub(crate) fn serialize_link_info() -> Vec<u8> {
    let mut buf = vec![0, 0];
    write_uint(&mut buf, UNDEFINED, 8); // fractal heap
    write_uint(&mut buf, UNDEFINED, 8); // name index B-tree
    buf
}

/// Group Info with default storage thresholds.
pub(crate) fn serialize_group_info() -> Vec<u8> {
    vec![0, 0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sb() -> Superblock {
        Superblock::v2(0, 0)
    }

    #[test]
    fn hard_link_roundtrip() {
        let body = serialize_hard_link("data", 0x1234);
        assert_eq!(body[1], 0);
        let (name, target) = parse_link(&body, &sb()).unwrap();
        assert_eq!(name, "data");
        assert_eq!(target, LinkTarget::Hard(0x1234));
    }

    #[test]
    fn utf8_link_name_sets_charset() {
        let body = serialize_hard_link("Ångström", 64);
        assert_eq!(body[1] & LINK_HAS_CHARSET, LINK_HAS_CHARSET);
        assert_eq!(parse_link(&body, &sb()).unwrap().0, "Ångström");
    }

    #[test]
    fn soft_link_with_creation_order() {
        let mut body = vec![1, LINK_HAS_TYPE | LINK_HAS_CREATION_ORDER, 1];
        body.extend_from_slice(&3u64.to_le_bytes());
        body.push(4);
        body.extend_from_slice(b"link");
        body.extend_from_slice(&5u16.to_le_bytes());
        body.extend_from_slice(b"/data");
        let (name, target) = parse_link(&body, &sb()).unwrap();
        assert_eq!(name, "link");
        assert_eq!(target, LinkTarget::Soft("/data".into()));
    }

    #[test]
    fn external_link_is_other() {
        let mut body = vec![1, LINK_HAS_TYPE, 64, 1, b'x'];
        body.extend_from_slice(&[0; 8]);
        assert_eq!(parse_link(&body, &sb()).unwrap().1, LinkTarget::Other(64));
    }

    #[test]
    fn link_info_storage() {
        let compact = serialize_link_info();
        assert!(!link_info_is_dense(&compact, &sb()).unwrap());
        let mut dense = vec![0, 1];
        dense.extend_from_slice(&9u64.to_le_bytes());
        dense.extend_from_slice(&800u64.to_le_bytes());
        dense.extend_from_slice(&[0xFF; 8]);
        assert!(link_info_is_dense(&dense, &sb()).unwrap());
    }

    #[test]
    fn symbol_table_group() {
        // Layout: local heap header at 0, heap data at 32, B-tree at 64, SNOD at 128.
        let mut data = HEAP_SIGNATURE.to_vec();
        data.extend_from_slice(&[0, 0, 0, 0]);
        write_uint(&mut data, 16, 8); // data size
        write_uint(&mut data, UNDEFINED, 8); // free list
        write_uint(&mut data, 32, 8); // data address
        data.resize(32, 0);
        data.extend_from_slice(b"\0\0\0\0\0\0\0\0alpha\0\0\0");
        data.resize(64, 0);
        data.extend_from_slice(b"TREE");
        data.extend_from_slice(&[0, 0, 1, 0]);
        write_uint(&mut data, UNDEFINED, 8);
        write_uint(&mut data, UNDEFINED, 8);
        write_uint(&mut data, 0, 8); // key
        write_uint(&mut data, 128, 8); // child
        write_uint(&mut data, 8, 8); // key
        data.resize(128, 0);
        data.extend_from_slice(b"SNOD");
        data.extend_from_slice(&[1, 0, 1, 0]);
        write_uint(&mut data, 8, 8); // name offset
        write_uint(&mut data, 4096, 8); // object header
        data.extend_from_slice(&[0; 24]);

        let mut msg = Vec::new();
        write_uint(&mut msg, 64, 8);
        write_uint(&mut msg, 0, 8);
        let members = symbol_table_members(&data, &msg, &sb()).unwrap();
        assert_eq!(members, vec![("alpha".to_string(), 4096)]);
    }

    #[test]
    fn bad_heap_signature() {
        let data = vec![0u8; 64];
        let mut msg = Vec::new();
        write_uint(&mut msg, 0, 8);
        write_uint(&mut msg, 0, 8);
        assert!(matches!(
            symbol_table_members(&data, &msg, &sb()),
            Err(StoreError::InvalidSignature("HEAP"))
        ));
    }
}

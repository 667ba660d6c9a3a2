//! Global heap collections, which hold variable-length string data.

use crate::bytes::{self, read_u16, read_u32, read_u8, read_uint, to_index};
use crate::error::StoreError;
use crate::superblock::Superblock;

const GCOL_SIGNATURE: &[u8; 4] = b"GCOL";

/// Size of one variable-length element reference: length, collection
/// address, object index.
pub(crate) fn vlen_element_size(sb: &Superblock) -> usize {
    8 + usize::from(sb.offset_size)
}

/// Resolve one variable-length element to its bytes.
pub(crate) fn read_vlen<'a>(
    data: &'a [u8],
    element: &[u8],
    sb: &Superblock,
) -> Result<&'a [u8], StoreError> {
    let len = bytes::to_usize(u64::from(read_u32(element, 0)?))?;
    let collection = read_uint(element, 4, sb.offset_size)?;
    let index = read_u32(element, 4 + usize::from(sb.offset_size))?;
    if len == 0 || collection == 0 {
        return Ok(&[]);
    }
    let object = heap_object(data, collection, index, sb)?;
    object.get(..len).ok_or(StoreError::UnexpectedEof {
        expected: len,
        available: object.len(),
    })
}

fn heap_object<'a>(
    data: &'a [u8],
    collection: u64,
    index: u32,
    sb: &Superblock,
) -> Result<&'a [u8], StoreError> {
    let start = to_index(sb.base_address, collection)?;
    if bytes::slice(data, start, 4)? != GCOL_SIGNATURE {
        return Err(StoreError::InvalidSignature("GCOL"));
    }
    let version = read_u8(data, start + 4)?;
    if version != 1 {
        return Err(StoreError::UnsupportedVersion {
            what: "global heap",
            version,
        });
    }
    let ls = usize::from(sb.length_size);
    let size = bytes::to_usize(read_uint(data, start + 8, sb.length_size)?)?;
    let end = start
        .checked_add(size)
        .filter(|&e| e <= data.len())
        .ok_or(StoreError::UnexpectedEof {
            expected: start.saturating_add(size),
            available: data.len(),
        })?;

    let mut pos = start + 8 + ls;
    // Each object: index(2) refcount(2) reserved(4) size(ls), data padded to 8.
    while pos + 8 + ls <= end {
        let object_index = read_u16(data, pos)?;
        if object_index == 0 {
            break; // free space
        }
        let object_size = bytes::to_usize(read_uint(data, pos + 8, sb.length_size)?)?;
        let body = pos + 8 + ls;
        if u32::from(object_index) == index {
            return bytes::slice(data, body, object_size);
        }
        pos = body
            .checked_add(bytes::pad8(object_size))
            .ok_or(StoreError::InvalidAddress(object_size as u64))?;
    }
    Err(StoreError::NotFound(format!(
        "global heap object {index} in collection {collection:#x}"
    )))
}

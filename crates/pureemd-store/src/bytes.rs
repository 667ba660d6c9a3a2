//! Bounds-checked little-endian field access shared by the HDF5 parsers.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::StoreError;

/// All-ones address meaning "not allocated".
pub(crate) const UNDEFINED: u64 = u64::MAX;

pub(crate) fn ensure_len(data: &[u8], pos: usize, needed: usize) -> Result<(), StoreError> {
    match pos.checked_add(needed) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(StoreError::UnexpectedEof {
            expected: pos.saturating_add(needed),
            available: data.len(),
        }),
    }
}

/// `data[pos..pos + len]`, or `UnexpectedEof`.
pub(crate) fn slice(data: &[u8], pos: usize, len: usize) -> Result<&[u8], StoreError> {
    ensure_len(data, pos, len)?;
    Ok(&data[pos..pos + len])
}

pub(crate) fn read_u8(data: &[u8], pos: usize) -> Result<u8, StoreError> {
    ensure_len(data, pos, 1)?;
    Ok(data[pos])
}

pub(crate) fn read_u16(data: &[u8], pos: usize) -> Result<u16, StoreError> {
    Ok(LittleEndian::read_u16(slice(data, pos, 2)?))
}

pub(crate) fn read_u32(data: &[u8], pos: usize) -> Result<u32, StoreError> {
    Ok(LittleEndian::read_u32(slice(data, pos, 4)?))
}

/// Unsigned field of `size` bytes (offsets, lengths, variable-width counts).
pub(crate) fn read_uint(data: &[u8], pos: usize, size: u8) -> Result<u64, StoreError> {
    let s = slice(data, pos, usize::from(size))?;
    Ok(match size {
        1 => u64::from(s[0]),
        2 => u64::from(LittleEndian::read_u16(s)),
        4 => u64::from(LittleEndian::read_u32(s)),
        8 => LittleEndian::read_u64(s),
        _ => return Err(StoreError::InvalidFieldSize(size)),
    })
}

/// Like [`read_uint`] but an all-ones field reads as `None`.
pub(crate) fn read_addr(data: &[u8], pos: usize, size: u8) -> Result<Option<u64>, StoreError> {
    let s = slice(data, pos, usize::from(size))?;
    if s.iter().all(|&b| b == 0xFF) {
        return Ok(None);
    }
    read_uint(data, pos, size).map(Some)
}

pub(crate) fn write_uint(buf: &mut Vec<u8>, value: u64, size: u8) {
    let le = value.to_le_bytes();
    buf.extend_from_slice(&le[..usize::from(size).min(8)]);
}

/// File address (relative to `base`) as an index into the file bytes.
pub(crate) fn to_index(base: u64, addr: u64) -> Result<usize, StoreError> {
    base.checked_add(addr)
        .and_then(|a| usize::try_from(a).ok())
        .ok_or(StoreError::InvalidAddress(addr))
}

pub(crate) fn to_usize(value: u64) -> Result<usize, StoreError> {
    usize::try_from(value).map_err(|_| StoreError::InvalidAddress(value))
}

/// Round up to the next multiple of 8.
pub(crate) fn pad8(x: usize) -> usize {
    (x + 7) & !7
}

/// Text up to the first NUL.
pub(crate) fn c_str(bytes: &[u8]) -> Result<String, StoreError> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end])
        .map(str::to_owned)
        .map_err(|_| StoreError::InvalidUtf8)
}

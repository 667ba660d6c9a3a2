//! HDF5 superblock parsing (v0 through v3) and the v2 form we write.

use crate::bytes::{self, read_u8, read_uint, write_uint, UNDEFINED};
use crate::checksum::jenkins_lookup3;
use crate::error::StoreError;
use crate::signature::HDF5_SIGNATURE;

/// Size of the v2 superblock written with 8-byte offsets and lengths.
pub(crate) const SUPERBLOCK_V2_SIZE: usize = 48;

/// The superblock fields the reader and writer need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Superblock {
    pub version: u8,
    /// Width in bytes of file addresses.
    pub offset_size: u8,
    /// Width in bytes of object sizes.
    pub length_size: u8,
    /// Absolute position every other address is relative to.
    pub base_address: u64,
    pub eof_address: u64,
    /// Address of the root group's object header.
    pub root_object_header: u64,
}

fn validate_sizes(offset_size: u8, length_size: u8) -> Result<(), StoreError> {
    for size in [offset_size, length_size] {
        if !matches!(size, 2 | 4 | 8) {
            return Err(StoreError::InvalidFieldSize(size));
        }
    }
    Ok(())
}

impl Superblock {
    /// Parse the superblock whose signature starts at `sig_offset`.
    pub(crate) fn parse(data: &[u8], sig_offset: usize) -> Result<Superblock, StoreError> {
        let version = read_u8(data, sig_offset + 8)?;
        let mut sb = match version {
            0 | 1 => Self::parse_v0v1(data, sig_offset, version)?,
            2 | 3 => Self::parse_v2v3(data, sig_offset, version)?,
            v => {
                return Err(StoreError::UnsupportedVersion {
                    what: "superblock",
                    version: v,
                })
            }
        };
        // A user block shifts everything; the library rebases on the
        // superblock's actual position.
        sb.base_address = sig_offset as u64;
        Ok(sb)
    }

    fn parse_v0v1(data: &[u8], s: usize, version: u8) -> Result<Superblock, StoreError> {
        let offset_size = read_u8(data, s + 13)?;
        let length_size = read_u8(data, s + 14)?;
        validate_sizes(offset_size, length_size)?;
        let os = usize::from(offset_size);
        // v1 adds the indexed-storage K and two reserved bytes.
        let addrs = if version == 0 { s + 24 } else { s + 28 };
        let eof_address = read_uint(data, addrs + 2 * os, offset_size)?;
        // Root symbol table entry: link name offset, then the header address.
        let root_entry = addrs + 4 * os;
        let root_object_header = read_uint(data, root_entry + os, offset_size)?;
        Ok(Superblock {
            version,
            offset_size,
            length_size,
            base_address: 0,
            eof_address,
            root_object_header,
        })
    }

    fn parse_v2v3(data: &[u8], s: usize, version: u8) -> Result<Superblock, StoreError> {
        let offset_size = read_u8(data, s + 9)?;
        let length_size = read_u8(data, s + 10)?;
        validate_sizes(offset_size, length_size)?;
        let os = usize::from(offset_size);
        let body_end = s + 12 + 4 * os;
        bytes::ensure_len(data, body_end, 4)?;
        let stored = bytes::read_u32(data, body_end)?;
        let computed = jenkins_lookup3(&data[s..body_end]);
        if stored != computed {
            return Err(StoreError::ChecksumMismatch {
                expected: stored,
                computed,
            });
        }
        let eof_address = read_uint(data, s + 12 + 2 * os, offset_size)?;
        let root_object_header = read_uint(data, s + 12 + 3 * os, offset_size)?;
        Ok(Superblock {
            version,
            offset_size,
            length_size,
            base_address: 0,
            eof_address,
            root_object_header,
        })
    }

    /// A v2 superblock with 8-byte fields and no extension.
    pub(crate) fn v2(eof_address: u64, root_object_header: u64) -> Superblock {
        Superblock {
            version: 2,
            offset_size: 8,
            length_size: 8,
            base_address: 0,
            eof_address,
            root_object_header,
        }
    }

    /// Serialize as a v2 superblock at offset 0.
    pub(crate) fn serialize_v2(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SUPERBLOCK_V2_SIZE);
        buf.extend_from_slice(&HDF5_SIGNATURE);
        buf.push(2);
        buf.push(self.offset_size);
        buf.push(self.length_size);
        buf.push(0); // consistency flags
        write_uint(&mut buf, self.base_address, self.offset_size);
        write_uint(&mut buf, UNDEFINED, self.offset_size); // superblock extension
        write_uint(&mut buf, self.eof_address, self.offset_size);
        write_uint(&mut buf, self.root_object_header, self.offset_size);
        let checksum = jenkins_lookup3(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }
}

//! HDF5 Data Layout message (type 0x0008) and the filter pipeline count.

use crate::bytes::{self, read_addr, read_u16, read_u32, read_u8, read_uint, write_uint, UNDEFINED};
use crate::error::StoreError;

/// How a chunked dataset indexes its chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChunkIndex {
    /// Version 1 B-tree (layout version 3).
    BTreeV1(Option<u64>),
    /// The whole dataset is one chunk.
    SingleChunk(Option<u64>),
    /// Chunks stored back to back in row-major chunk order.
    Implicit(Option<u64>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DataLayout<'a> {
    Compact(&'a [u8]),
    Contiguous {
        address: Option<u64>,
        size: u64,
    },
    Chunked {
        /// Chunk extents, without the trailing element-size dimension.
        chunk_dims: Vec<u64>,
        index: ChunkIndex,
    },
    /// A layout the adapter does not read, with a description.
    Unsupported(String),
}

impl<'a> DataLayout<'a> {
    pub(crate) fn parse(
        data: &'a [u8],
        offset_size: u8,
        length_size: u8,
    ) -> Result<DataLayout<'a>, StoreError> {
        let version = read_u8(data, 0)?;
        if !matches!(version, 3 | 4) {
            return Ok(DataLayout::Unsupported(format!("data layout version {version}")));
        }
        let class = read_u8(data, 1)?;
        let os = usize::from(offset_size);
        match class {
            0 => {
                let size = usize::from(read_u16(data, 2)?);
                Ok(DataLayout::Compact(bytes::slice(data, 4, size)?))
            }
            1 => Ok(DataLayout::Contiguous {
                address: read_addr(data, 2, offset_size)?,
                size: read_uint(data, 2 + os, length_size)?,
            }),
            2 if version == 3 => {
                let rank = usize::from(read_u8(data, 2)?);
                let address = read_addr(data, 3, offset_size)?;
                let dims_at = 3 + os;
                let mut dims = (0..rank)
                    .map(|i| read_u32(data, dims_at + 4 * i).map(u64::from))
                    .collect::<Result<Vec<_>, _>>()?;
                dims.pop();
                Ok(DataLayout::Chunked {
                    chunk_dims: dims,
                    index: ChunkIndex::BTreeV1(address),
                })
            }
            2 => Self::parse_v4_chunked(data, offset_size, length_size),
            3 => Ok(DataLayout::Unsupported("virtual dataset".to_string())),
            tag => Err(StoreError::UnknownTag {
                what: "layout class",
                tag,
            }),
        }
    }

    fn parse_v4_chunked(
        data: &'a [u8],
        offset_size: u8,
        length_size: u8,
    ) -> Result<DataLayout<'a>, StoreError> {
        let flags = read_u8(data, 2)?;
        let rank = usize::from(read_u8(data, 3)?);
        let width = read_u8(data, 4)?;
        let mut pos = 5;
        let mut dims = Vec::with_capacity(rank);
        for _ in 0..rank {
            dims.push(read_uint(data, pos, width)?);
            pos += usize::from(width);
        }
        dims.pop();
        let index_type = read_u8(data, pos)?;
        pos += 1;
        let index = match index_type {
            1 => {
                if flags & 0x02 != 0 {
                    // filtered chunk size and filter mask
                    pos += usize::from(length_size) + 4;
                }
                ChunkIndex::SingleChunk(read_addr(data, pos, offset_size)?)
            }
            2 => ChunkIndex::Implicit(read_addr(data, pos, offset_size)?),
            3 => return Ok(DataLayout::Unsupported("fixed array chunk index".to_string())),
            4 => {
                return Ok(DataLayout::Unsupported(
                    "extensible array chunk index".to_string(),
                ))
            }
            5 => return Ok(DataLayout::Unsupported("v2 B-tree chunk index".to_string())),
            tag => {
                return Err(StoreError::UnknownTag {
                    what: "chunk index type",
                    tag,
                })
            }
        };
        Ok(DataLayout::Chunked {
            chunk_dims: dims,
            index,
        })
    }

    /// Version 3 contiguous layout with 8-byte fields; `None` for an
    /// unallocated (empty) dataset.
    pub(crate) fn serialize_contiguous(address: Option<u64>, size: u64) -> Vec<u8> {
        let mut buf = vec![3, 1];
        write_uint(&mut buf, address.unwrap_or(UNDEFINED), 8);
        write_uint(&mut buf, size, 8);
        buf
    }
}

/// Number of filters in a filter pipeline message body.
pub(crate) fn filter_count(data: &[u8]) -> Result<u8, StoreError> {
    let version = read_u8(data, 0)?;
    if !matches!(version, 1 | 2) {
        return Err(StoreError::UnsupportedVersion {
            what: "filter pipeline",
            version,
        });
    }
    read_u8(data, 1)
}

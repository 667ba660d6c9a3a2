//! HDF5 Dataspace message (type 0x0001).

use crate::bytes::{read_u8, read_uint};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Dataspace {
    Scalar,
    Simple(Vec<u64>),
    /// No elements at all.
    Null,
}

impl Dataspace {
    pub(crate) fn parse(data: &[u8], length_size: u8) -> Result<Dataspace, StoreError> {
        let version = read_u8(data, 0)?;
        let rank = read_u8(data, 1)?;
        let (dims_at, kind) = match version {
            // Version 1 has no type byte; rank 0 is scalar.
            1 => (8, if rank == 0 { 0 } else { 1 }),
            2 => (4, read_u8(data, 3)?),
            v => {
                return Err(StoreError::UnsupportedVersion {
                    what: "dataspace",
                    version: v,
                })
            }
        };
        let ls = usize::from(length_size);
        match kind {
            0 => Ok(Dataspace::Scalar),
            2 => Ok(Dataspace::Null),
            1 => {
                let dims = (0..usize::from(rank))
                    .map(|i| read_uint(data, dims_at + i * ls, length_size))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Dataspace::Simple(dims))
            }
            tag => Err(StoreError::UnknownTag {
                what: "dataspace type",
                tag,
            }),
        }
    }

    /// Dimensions as a shape; empty for scalars.
    pub(crate) fn shape(&self) -> Result<Vec<usize>, StoreError> {
        match self {
            Dataspace::Scalar => Ok(Vec::new()),
            Dataspace::Null => Ok(vec![0]),
            Dataspace::Simple(dims) => dims
                .iter()
                .map(|&d| usize::try_from(d).map_err(|_| StoreError::PayloadSize {
                    expected: usize::MAX,
                    actual: 0,
                }))
                .collect(),
        }
    }

    pub(crate) fn for_shape(shape: &[usize]) -> Dataspace {
        if shape.is_empty() {
            Dataspace::Scalar
        } else {
            Dataspace::Simple(shape.iter().map(|&d| d as u64).collect())
        }
    }

    /// Version 2 encoding with 8-byte lengths and no maximum dimensions.
    pub(crate) fn serialize(&self) -> Vec<u8> {
        match self {
            Dataspace::Scalar => vec![2, 0, 0, 0],
            Dataspace::Null => vec![2, 0, 0, 2],
            Dataspace::Simple(dims) => {
                let mut buf = vec![2, dims.len() as u8, 0, 1];
                for d in dims {
                    buf.extend_from_slice(&d.to_le_bytes());
                }
                buf
            }
        }
    }
}

//! HDF5 Datatype message (type 0x0003): the classes the adapter maps onto
//! [`DType`] and [`AttrValue`](crate::types::AttrValue), plus serialization
//! of the ones it writes.

use crate::bytes::{read_u32, read_u8};
use crate::error::StoreError;
use crate::types::DType;

/// Byte order of numeric data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DatatypeByteOrder {
    LittleEndian,
    BigEndian,
}

/// String padding type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StringPadding {
    NullTerminate,
    NullPad,
    SpacePad,
}

/// Character set encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CharacterSet {
    Ascii,
    Utf8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Datatype {
    /// Class 0.
    FixedPoint {
        size: u32,
        byte_order: DatatypeByteOrder,
        signed: bool,
    },
    /// Class 1, IEEE layouts only.
    FloatingPoint {
        size: u32,
        byte_order: DatatypeByteOrder,
    },
    /// Class 3.
    String {
        size: u32,
        padding: StringPadding,
        charset: CharacterSet,
    },
    /// Class 9 with the string flag set.
    VarLenString { charset: CharacterSet },
    /// Class 8; values are read through the base type.
    Enumeration { base_type: Box<Datatype> },
    /// Any class the adapter does not interpret (compound, reference,
    /// opaque, array, vlen sequence, VAX floats).
    Other { class: u8, size: u32 },
}

fn byte_order(bit: u8) -> DatatypeByteOrder {
    if bit & 0x01 == 0 {
        DatatypeByteOrder::LittleEndian
    } else {
        DatatypeByteOrder::BigEndian
    }
}

fn charset(nibble: u8) -> CharacterSet {
    if nibble == 1 {
        CharacterSet::Utf8
    } else {
        CharacterSet::Ascii
    }
}

impl Datatype {
    /// Parse a datatype message body.
    pub(crate) fn parse(data: &[u8]) -> Result<Datatype, StoreError> {
        let class_version = read_u8(data, 0)?;
        let class = class_version & 0x0F;
        let version = class_version >> 4;
        if !(1..=4).contains(&version) {
            return Err(StoreError::UnsupportedVersion {
                what: "datatype",
                version,
            });
        }
        let bf0 = read_u8(data, 1)?;
        let bf1 = read_u8(data, 2)?;
        let size = read_u32(data, 4)?;

        Ok(match class {
            0 => Datatype::FixedPoint {
                size,
                byte_order: byte_order(bf0),
                signed: bf0 & 0x08 != 0,
            },
            // Bit 6 with bit 0 is VAX order.
            1 if bf0 & 0x40 != 0 => Datatype::Other { class, size },
            1 => Datatype::FloatingPoint {
                size,
                byte_order: byte_order(bf0),
            },
            3 => Datatype::String {
                size,
                padding: match bf0 & 0x0F {
                    0 => StringPadding::NullTerminate,
                    1 => StringPadding::NullPad,
                    _ => StringPadding::SpacePad,
                },
                charset: charset(bf0 >> 4),
            },
            8 => {
                let base = data.get(8..).unwrap_or_default();
                Datatype::Enumeration {
                    base_type: Box::new(Datatype::parse(base)?),
                }
            }
            9 if bf0 & 0x0F == 1 => Datatype::VarLenString {
                charset: charset(bf1 & 0x0F),
            },
            _ => Datatype::Other { class, size },
        })
    }

    /// Element size in bytes as stored.
    pub(crate) fn size(&self) -> u32 {
        match self {
            Datatype::FixedPoint { size, .. }
            | Datatype::FloatingPoint { size, .. }
            | Datatype::String { size, .. }
            | Datatype::Other { size, .. } => *size,
            Datatype::Enumeration { base_type } => base_type.size(),
            // length(4) + global heap id
            Datatype::VarLenString { .. } => 16,
        }
    }

    /// The numeric element type, if this is one.
    pub(crate) fn to_dtype(&self) -> Option<DType> {
        Some(match self {
            Datatype::FixedPoint { size, signed, .. } => match (size, signed) {
                (1, true) => DType::I8,
                (2, true) => DType::I16,
                (4, true) => DType::I32,
                (8, true) => DType::I64,
                (1, false) => DType::U8,
                (2, false) => DType::U16,
                (4, false) => DType::U32,
                (8, false) => DType::U64,
                _ => return None,
            },
            Datatype::FloatingPoint { size: 4, .. } => DType::F32,
            Datatype::FloatingPoint { size: 8, .. } => DType::F64,
            _ => return None,
        })
    }

    pub(crate) fn is_big_endian(&self) -> bool {
        matches!(
            self,
            Datatype::FixedPoint {
                byte_order: DatatypeByteOrder::BigEndian,
                ..
            } | Datatype::FloatingPoint {
                byte_order: DatatypeByteOrder::BigEndian,
                ..
            }
        )
    }

    /// Little-endian datatype for a dataset element type.
    pub(crate) fn from_dtype(dtype: DType) -> Datatype {
        let size = dtype.size() as u32;
        match dtype {
            DType::F32 | DType::F64 => Datatype::FloatingPoint {
                size,
                byte_order: DatatypeByteOrder::LittleEndian,
            },
            DType::I8 | DType::I16 | DType::I32 | DType::I64 => Datatype::FixedPoint {
                size,
                byte_order: DatatypeByteOrder::LittleEndian,
                signed: true,
            },
            DType::U8 | DType::U16 | DType::U32 | DType::U64 => Datatype::FixedPoint {
                size,
                byte_order: DatatypeByteOrder::LittleEndian,
                signed: false,
            },
        }
    }

    /// Serialize as a version 1 datatype message.
    pub(crate) fn serialize(&self) -> Result<Vec<u8>, StoreError> {
        let mut buf = Vec::with_capacity(24);
        match self {
            Datatype::FixedPoint {
                size,
                byte_order,
                signed,
            } => {
                let mut bf0 = 0u8;
                if *byte_order == DatatypeByteOrder::BigEndian {
                    bf0 |= 0x01;
                }
                if *signed {
                    bf0 |= 0x08;
                }
                buf.extend_from_slice(&[0x10, bf0, 0, 0]);
                buf.extend_from_slice(&size.to_le_bytes());
                buf.extend_from_slice(&0u16.to_le_bytes()); // bit offset
                buf.extend_from_slice(&((*size * 8) as u16).to_le_bytes());
            }
            Datatype::FloatingPoint { size, byte_order } => {
                let (exp_loc, exp_size, mant_size, bias): (u8, u8, u8, u32) = match size {
                    4 => (23, 8, 23, 127),
                    8 => (52, 11, 52, 1023),
                    other => {
                        return Err(StoreError::Unsupported(format!(
                            "{other}-byte floating point"
                        )))
                    }
                };
                // Mantissa normalization "implied", sign bit in the top bit.
                let mut bf0 = 0x20u8;
                if *byte_order == DatatypeByteOrder::BigEndian {
                    bf0 |= 0x01;
                }
                buf.extend_from_slice(&[0x11, bf0, (*size * 8 - 1) as u8, 0]);
                buf.extend_from_slice(&size.to_le_bytes());
                buf.extend_from_slice(&0u16.to_le_bytes());
                buf.extend_from_slice(&((*size * 8) as u16).to_le_bytes());
                buf.extend_from_slice(&[exp_loc, exp_size, 0, mant_size]);
                buf.extend_from_slice(&bias.to_le_bytes());
            }
            Datatype::String {
                size,
                padding,
                charset,
            } => {
                let pad = match padding {
                    StringPadding::NullTerminate => 0,
                    StringPadding::NullPad => 1,
                    StringPadding::SpacePad => 2,
                };
                let cset = match charset {
                    CharacterSet::Ascii => 0,
                    CharacterSet::Utf8 => 1,
                };
                buf.extend_from_slice(&[0x13, pad | (cset << 4), 0, 0]);
                buf.extend_from_slice(&size.to_le_bytes());
            }
            other => {
                return Err(StoreError::Unsupported(format!(
                    "writing datatype {other:?}"
                )))
            }
        }
        Ok(buf)
    }
}

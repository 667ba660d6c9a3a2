//! HDF5 Attribute message (type 0x000C) and its mapping to [`AttrValue`].

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::bytes::{self, read_u16, read_u8};
use crate::dataspace::Dataspace;
use crate::datatype::{CharacterSet, Datatype, DatatypeByteOrder, StringPadding};
use crate::error::StoreError;
use crate::global_heap;
use crate::superblock::Superblock;
use crate::types::{element_count, AttrValue, DType};

/// A parsed attribute message, borrowing its value bytes.
#[derive(Debug, Clone)]
pub(crate) struct AttributeMessage<'a> {
    pub name: String,
    pub datatype: Datatype,
    pub dataspace: Dataspace,
    pub raw_data: &'a [u8],
}

impl<'a> AttributeMessage<'a> {
    pub(crate) fn parse(body: &'a [u8], sb: &Superblock) -> Result<Self, StoreError> {
        let version = read_u8(body, 0)?;
        let flags = read_u8(body, 1)?;
        let name_size = usize::from(read_u16(body, 2)?);
        let datatype_size = usize::from(read_u16(body, 4)?);
        let dataspace_size = usize::from(read_u16(body, 6)?);
        if flags & 0x03 != 0 {
            return Err(StoreError::Unsupported(
                "attribute with a shared datatype or dataspace".to_string(),
            ));
        }
        // Version 1 pads each field to 8 bytes; version 3 adds the name encoding.
        let (mut pos, pad): (usize, fn(usize) -> usize) = match version {
            1 => (8, bytes::pad8),
            2 => (8, |n| n),
            3 => (9, |n| n),
            v => {
                return Err(StoreError::UnsupportedVersion {
                    what: "attribute message",
                    version: v,
                })
            }
        };
        let name = bytes::c_str(bytes::slice(body, pos, name_size)?)?;
        pos += pad(name_size);
        let datatype = Datatype::parse(bytes::slice(body, pos, datatype_size)?)?;
        pos += pad(datatype_size);
        let dataspace = Dataspace::parse(bytes::slice(body, pos, dataspace_size)?, sb.length_size)?;
        pos += pad(dataspace_size);
        Ok(AttributeMessage {
            name,
            datatype,
            dataspace,
            raw_data: body.get(pos..).unwrap_or_default(),
        })
    }

    /// Interpret the value. Types with no [`AttrValue`] form give
    /// [`StoreError::Unsupported`].
    pub(crate) fn value(&self, file: &[u8], sb: &Superblock) -> Result<AttrValue, StoreError> {
        let scalar = match &self.dataspace {
            Dataspace::Scalar => true,
            Dataspace::Simple(_) => false,
            Dataspace::Null => {
                return Err(StoreError::Unsupported("attribute with no value".to_string()))
            }
        };
        let shape = self.dataspace.shape()?;
        let count = element_count(&shape).ok_or(StoreError::PayloadSize {
            expected: usize::MAX,
            actual: self.raw_data.len(),
        })?;
        let elem = match &self.datatype {
            Datatype::VarLenString { .. } => global_heap::vlen_element_size(sb),
            dt => bytes::to_usize(u64::from(dt.size()))?,
        };
        let needed = count.checked_mul(elem).ok_or(StoreError::PayloadSize {
            expected: usize::MAX,
            actual: self.raw_data.len(),
        })?;
        let raw = bytes::slice(self.raw_data, 0, needed)?;
        let elements = raw.chunks_exact(elem.max(1)).take(count);
        decode(&self.datatype, elements, scalar, file, sb)
    }

    /// Encode `value` as a version 3 attribute message.
    pub(crate) fn encode(name: &str, value: &AttrValue) -> Result<Vec<u8>, StoreError> {
        let (datatype, dataspace, data) = encode_value(value)?;
        let dt = datatype.serialize()?;
        let ds = dataspace.serialize();
        let name_size = u16::try_from(name.len() + 1).map_err(|_| {
            StoreError::Unsupported(format!("attribute name of {} bytes", name.len()))
        })?;
        let mut buf = vec![3, 0];
        buf.extend_from_slice(&name_size.to_le_bytes());
        buf.extend_from_slice(&(dt.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(ds.len() as u16).to_le_bytes());
        buf.push(u8::from(!name.is_ascii()));
        buf.extend_from_slice(name.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&dt);
        buf.extend_from_slice(&ds);
        buf.extend_from_slice(&data);
        Ok(buf)
    }
}

fn unsupported(datatype: &Datatype) -> StoreError {
    StoreError::Unsupported(format!("attribute datatype {datatype:?}"))
}

fn read_integer(raw: &[u8], byte_order: DatatypeByteOrder, signed: bool) -> Result<i128, StoreError> {
    let n = raw.len();
    if !(1..=8).contains(&n) {
        return Err(StoreError::Unsupported(format!("{n}-byte integer")));
    }
    let bits = match byte_order {
        DatatypeByteOrder::LittleEndian => LittleEndian::read_uint(raw, n),
        DatatypeByteOrder::BigEndian => BigEndian::read_uint(raw, n),
    };
    let shift = 64 - 8 * n as u32;
    Ok(if signed {
        i128::from(((bits << shift) as i64) >> shift)
    } else {
        i128::from(bits)
    })
}

fn read_float(raw: &[u8], byte_order: DatatypeByteOrder) -> Result<f64, StoreError> {
    let big = byte_order == DatatypeByteOrder::BigEndian;
    match raw.len() {
        4 if big => Ok(f64::from(BigEndian::read_f32(raw))),
        4 => Ok(f64::from(LittleEndian::read_f32(raw))),
        8 if big => Ok(BigEndian::read_f64(raw)),
        8 => Ok(LittleEndian::read_f64(raw)),
        n => Err(StoreError::Unsupported(format!("{n}-byte float"))),
    }
}

fn strip_padding(raw: &[u8], padding: StringPadding) -> &[u8] {
    match padding {
        StringPadding::NullTerminate => {
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            &raw[..end]
        }
        StringPadding::NullPad => {
            let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            &raw[..end]
        }
        StringPadding::SpacePad => {
            let end = raw.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
            &raw[..end]
        }
    }
}

/// Text attributes: `String` when valid UTF-8 is expected and found,
/// otherwise raw `Bytes`.
fn text_value(items: Vec<&[u8]>, want_utf8: bool, scalar: bool) -> AttrValue {
    let as_strings = if want_utf8 {
        items
            .iter()
            .map(|b| std::str::from_utf8(b).ok().map(str::to_owned))
            .collect::<Option<Vec<_>>>()
    } else {
        None
    };
    match (as_strings, scalar) {
        (Some(mut s), true) => AttrValue::String(s.pop().unwrap_or_default()),
        (Some(s), false) => AttrValue::StringArray(s),
        (None, true) => AttrValue::Bytes(items.first().map(|b| b.to_vec()).unwrap_or_default()),
        (None, false) => AttrValue::BytesArray(items.into_iter().map(<[u8]>::to_vec).collect()),
    }
}

fn decode<'e>(
    datatype: &Datatype,
    elements: impl Iterator<Item = &'e [u8]>,
    scalar: bool,
    file: &[u8],
    sb: &Superblock,
) -> Result<AttrValue, StoreError> {
    match datatype {
        Datatype::Enumeration { base_type } => decode(base_type, elements, scalar, file, sb),
        Datatype::FixedPoint {
            byte_order,
            signed,
            size,
        } => {
            let values = elements
                .map(|e| read_integer(e, *byte_order, *signed))
                .collect::<Result<Vec<_>, _>>()?;
            match values.as_slice() {
                [v] if scalar && !*signed && *size == 8 => Ok(AttrValue::U64(*v as u64)),
                [v] if scalar => Ok(AttrValue::I64(*v as i64)),
                _ => values
                    .into_iter()
                    .map(|v| i64::try_from(v).ok())
                    .collect::<Option<Vec<_>>>()
                    .map(AttrValue::I64Array)
                    .ok_or_else(|| {
                        StoreError::Unsupported("unsigned array beyond i64 range".to_string())
                    }),
            }
        }
        Datatype::FloatingPoint { byte_order, .. } => {
            let values = elements
                .map(|e| read_float(e, *byte_order))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match values.as_slice() {
                [v] if scalar => AttrValue::F64(*v),
                _ => AttrValue::F64Array(values),
            })
        }
        Datatype::String {
            padding, charset, ..
        } => {
            let items = elements.map(|e| strip_padding(e, *padding)).collect();
            Ok(text_value(items, *charset == CharacterSet::Utf8, scalar))
        }
        Datatype::VarLenString { .. } => {
            let items = elements
                .map(|e| global_heap::read_vlen(file, e, sb))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(text_value(items, true, scalar))
        }
        other => Err(unsupported(other)),
    }
}

fn fixed_string(items: &[&[u8]], charset: CharacterSet) -> (Datatype, Vec<u8>) {
    let width = items.iter().map(|s| s.len()).max().unwrap_or(0).max(1);
    let mut data = Vec::with_capacity(width * items.len());
    for item in items {
        data.extend_from_slice(item);
        data.resize(data.len() + width - item.len(), 0);
    }
    let datatype = Datatype::String {
        size: width as u32,
        padding: StringPadding::NullPad,
        charset,
    };
    (datatype, data)
}

fn encode_value(value: &AttrValue) -> Result<(Datatype, Dataspace, Vec<u8>), StoreError> {
    let one = Dataspace::Scalar;
    let many = |n: usize| Dataspace::Simple(vec![n as u64]);
    Ok(match value {
        AttrValue::F64(v) => (Datatype::from_dtype(DType::F64), one, v.to_le_bytes().to_vec()),
        AttrValue::F64Array(vs) => (
            Datatype::from_dtype(DType::F64),
            many(vs.len()),
            vs.iter().flat_map(|v| v.to_le_bytes()).collect(),
        ),
        AttrValue::I64(v) => (Datatype::from_dtype(DType::I64), one, v.to_le_bytes().to_vec()),
        AttrValue::I64Array(vs) => (
            Datatype::from_dtype(DType::I64),
            many(vs.len()),
            vs.iter().flat_map(|v| v.to_le_bytes()).collect(),
        ),
        AttrValue::U64(v) => (Datatype::from_dtype(DType::U64), one, v.to_le_bytes().to_vec()),
        AttrValue::String(s) => {
            let (dt, data) = fixed_string(&[s.as_bytes()], CharacterSet::Utf8);
            (dt, one, data)
        }
        AttrValue::StringArray(ss) => {
            let items: Vec<&[u8]> = ss.iter().map(|s| s.as_bytes()).collect();
            let (dt, data) = fixed_string(&items, CharacterSet::Utf8);
            (dt, many(ss.len()), data)
        }
        AttrValue::Bytes(b) => {
            let (dt, data) = fixed_string(&[b.as_slice()], CharacterSet::Ascii);
            (dt, one, data)
        }
        AttrValue::BytesArray(bs) => {
            let items: Vec<&[u8]> = bs.iter().map(Vec::as_slice).collect();
            let (dt, data) = fixed_string(&items, CharacterSet::Ascii);
            (dt, many(bs.len()), data)
        }
    })
}

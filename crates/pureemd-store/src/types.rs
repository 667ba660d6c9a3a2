//! Element types, attribute values, and raw array buffers.

use std::fmt;

use crate::error::StoreError;

/// Numeric element type of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::F32 | DType::I32 | DType::U32 => 4,
            DType::F64 | DType::I64 | DType::U64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U8 => "u8",
            DType::U16 => "u16",
            DType::U32 => "u32",
            DType::U64 => "u64",
        };
        f.write_str(name)
    }
}

/// A fixed-size numeric element that can live in a dataset.
///
/// Elements are always persisted little-endian.
pub trait Element: bytemuck::Pod + PartialEq + fmt::Debug {
    /// The dtype tag stored alongside the payload.
    const DTYPE: DType;

    /// Decode one element from exactly `DTYPE.size()` little-endian bytes.
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// Append the little-endian encoding of `self`.
    fn write_le(&self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
    ($($t:ty => $d:ident),* $(,)?) => {
        $(
            impl Element for $t {
                const DTYPE: DType = DType::$d;

                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(bytes);
                    <$t>::from_le_bytes(buf)
                }

                fn write_le(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_element! {
    f32 => F32,
    f64 => F64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
}

/// Decode little-endian element bytes into a typed vector.
///
/// On little-endian targets with suitably aligned input this is a single
/// memcpy through `bytemuck`; otherwise elements are decoded one by one.
pub fn decode_elements<T: Element>(bytes: &[u8]) -> Vec<T> {
    if cfg!(target_endian = "little") {
        if let Ok(slice) = bytemuck::try_cast_slice::<u8, T>(bytes) {
            return slice.to_vec();
        }
    }
    bytes
        .chunks_exact(T::DTYPE.size())
        .map(T::from_le_slice)
        .collect()
}

/// Encode typed elements as little-endian bytes.
pub fn encode_elements<T: Element>(values: &[T]) -> Vec<u8> {
    if cfg!(target_endian = "little") {
        return bytemuck::cast_slice::<T, u8>(values).to_vec();
    }
    let mut out = Vec::with_capacity(values.len() * T::DTYPE.size());
    for v in values {
        v.write_le(&mut out);
    }
    out
}

/// A dense, row-major N-dimensional array in its persisted form.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArray {
    dtype: DType,
    shape: Vec<usize>,
    bytes: Vec<u8>,
}

impl RawArray {
    /// Wrap raw little-endian bytes, checking the byte length against the shape.
    pub fn new(dtype: DType, shape: Vec<usize>, bytes: Vec<u8>) -> Result<Self, StoreError> {
        let expected = byte_len(dtype, &shape).ok_or(StoreError::PayloadSize {
            expected: usize::MAX,
            actual: bytes.len(),
        })?;
        if bytes.len() != expected {
            return Err(StoreError::PayloadSize {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            dtype,
            shape,
            bytes,
        })
    }

    /// Build from typed row-major values.
    pub fn from_elements<T: Element>(shape: Vec<usize>, values: &[T]) -> Result<Self, StoreError> {
        Self::new(T::DTYPE, shape, encode_elements(values))
    }

    /// Decode the payload as `T`. Fails if `T` is not the stored dtype.
    pub fn to_elements<T: Element>(&self) -> Result<Vec<T>, StoreError> {
        if T::DTYPE != self.dtype {
            return Err(StoreError::DTypeMismatch {
                expected: T::DTYPE,
                actual: self.dtype,
            });
        }
        Ok(decode_elements(&self.bytes))
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.bytes.len() / self.dtype.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Product of the extents; 1 for a rank-0 shape. `None` on overflow.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    if shape.contains(&0) {
        return Some(0);
    }
    shape.iter().try_fold(1usize, |n, &d| n.checked_mul(d))
}

/// Payload size in bytes of a dataset. `None` on overflow.
pub fn byte_len(dtype: DType, shape: &[usize]) -> Option<usize> {
    element_count(shape)?.checked_mul(dtype.size())
}

/// Kind of object found at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Dataset,
}

/// Element type and shape of a dataset, without its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInfo {
    pub dtype: DType,
    pub shape: Vec<usize>,
}

/// An attribute value attached to a group or dataset.
///
/// `String` is UTF-8 text; `Bytes` is a raw byte string, the form legacy
/// writers use for short labels.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    F64(f64),
    F64Array(Vec<f64>),
    I64(i64),
    I64Array(Vec<i64>),
    U64(u64),
    String(String),
    StringArray(Vec<String>),
    Bytes(Vec<u8>),
    BytesArray(Vec<Vec<u8>>),
}

impl AttrValue {
    /// Integer value of a scalar integer attribute.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::I64(v) => Some(*v),
            AttrValue::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Text of a scalar string or byte-string attribute.
    ///
    /// Byte strings must be UTF-8; trailing NUL padding is dropped.
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttrValue::String(s) => Some(s.clone()),
            AttrValue::Bytes(b) => bytes_to_text(b),
            _ => None,
        }
    }
}

pub(crate) fn bytes_to_text(bytes: &[u8]) -> Option<String> {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    std::str::from_utf8(&bytes[..end]).ok().map(str::to_owned)
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::F64(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::I64(v)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::U64(v)
    }
}

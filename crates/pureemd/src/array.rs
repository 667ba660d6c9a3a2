//! Typed N-dimensional arrays as stored in EMD groups.

use ndarray::{Array, ArrayD, Dimension, IxDyn};
use pureemd_store::{DType, Element, RawArray};

use crate::error::{Error, Result};

/// An N-dimensional array of any supported element type.
#[derive(Debug, Clone, PartialEq)]
pub enum EmdArray {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I8(ArrayD<i8>),
    I16(ArrayD<i16>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
    U32(ArrayD<u32>),
    U64(ArrayD<u64>),
}

macro_rules! each_variant {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            EmdArray::F32($a) => $body,
            EmdArray::F64($a) => $body,
            EmdArray::I8($a) => $body,
            EmdArray::I16($a) => $body,
            EmdArray::I32($a) => $body,
            EmdArray::I64($a) => $body,
            EmdArray::U8($a) => $body,
            EmdArray::U16($a) => $body,
            EmdArray::U32($a) => $body,
            EmdArray::U64($a) => $body,
        }
    };
}

/// Element types an [`EmdArray`] can hold.
pub trait ArrayElement: Element {
    fn wrap(array: ArrayD<Self>) -> EmdArray;
    fn peek(array: &EmdArray) -> Option<&ArrayD<Self>>;
}

macro_rules! impl_array_element {
    ($($t:ty => $v:ident),* $(,)?) => {
        $(
            impl ArrayElement for $t {
                fn wrap(array: ArrayD<Self>) -> EmdArray {
                    EmdArray::$v(array)
                }

                fn peek(array: &EmdArray) -> Option<&ArrayD<Self>> {
                    match array {
                        EmdArray::$v(a) => Some(a),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_array_element! {
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

impl<T: ArrayElement, D: Dimension> From<Array<T, D>> for EmdArray {
    fn from(array: Array<T, D>) -> Self {
        T::wrap(array.into_dyn())
    }
}

impl EmdArray {
    pub fn shape(&self) -> &[usize] {
        each_variant!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        each_variant!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            EmdArray::F32(_) => DType::F32,
            EmdArray::F64(_) => DType::F64,
            EmdArray::I8(_) => DType::I8,
            EmdArray::I16(_) => DType::I16,
            EmdArray::I32(_) => DType::I32,
            EmdArray::I64(_) => DType::I64,
            EmdArray::U8(_) => DType::U8,
            EmdArray::U16(_) => DType::U16,
            EmdArray::U32(_) => DType::U32,
            EmdArray::U64(_) => DType::U64,
        }
    }

    /// Borrow the typed array if it holds `T`.
    pub fn as_array<T: ArrayElement>(&self) -> Option<&ArrayD<T>> {
        T::peek(self)
    }

    /// Element-wise conversion to `f64`.
    pub fn to_f64(&self) -> ArrayD<f64> {
        each_variant!(self, a => a.mapv(|v| v as f64))
    }

    /// Row-major persisted form.
    pub fn to_raw(&self) -> Result<RawArray> {
        each_variant!(self, a => raw_from(a))
    }

    /// Rebuild a typed array from its persisted form.
    pub fn from_raw(raw: &RawArray) -> Result<Self> {
        Ok(match raw.dtype() {
            DType::F32 => typed::<f32>(raw)?.into(),
            DType::F64 => typed::<f64>(raw)?.into(),
            DType::I8 => typed::<i8>(raw)?.into(),
            DType::I16 => typed::<i16>(raw)?.into(),
            DType::I32 => typed::<i32>(raw)?.into(),
            DType::I64 => typed::<i64>(raw)?.into(),
            DType::U8 => typed::<u8>(raw)?.into(),
            DType::U16 => typed::<u16>(raw)?.into(),
            DType::U32 => typed::<u32>(raw)?.into(),
            DType::U64 => typed::<u64>(raw)?.into(),
        })
    }
}

fn raw_from<T: ArrayElement>(array: &ArrayD<T>) -> Result<RawArray> {
    let shape = array.shape().to_vec();
    let bytes = match array.as_slice() {
        Some(contiguous) => pureemd_store::types::encode_elements(contiguous),
        None => {
            let values: Vec<T> = array.iter().copied().collect();
            pureemd_store::types::encode_elements(&values)
        }
    };
    Ok(RawArray::new(T::DTYPE, shape, bytes)?)
}

fn typed<T: ArrayElement>(raw: &RawArray) -> Result<ArrayD<T>> {
    let values = raw.to_elements::<T>()?;
    ArrayD::from_shape_vec(IxDyn(raw.shape()), values)
        .map_err(|e| {
            Error::ShapeMismatch(format!(
                "payload does not fit shape {:?}: {e}",
                raw.shape()
            ))
        })
}

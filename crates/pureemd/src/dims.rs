//! Dimension vectors: per-axis coordinates with a name and units.

use ndarray::Array1;

use crate::array::EmdArray;
use crate::error::{Error, Result};

/// Coordinates along one axis of an EMD dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DimVector {
    /// Rank-1 coordinate values.
    pub values: EmdArray,
    pub name: String,
    pub units: String,
}

impl DimVector {
    pub fn new(values: impl Into<EmdArray>, name: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            values: values.into(),
            name: name.into(),
            units: units.into(),
        }
    }

    /// Number of coordinates, or `None` if `values` is not rank 1.
    pub fn extent(&self) -> Option<usize> {
        match self.values.shape() {
            [n] => Some(*n),
            _ => None,
        }
    }
}

/// Default dims for `data`: `values[k] = k * pixel_sizes[i]`, named
/// `dim{i+1}` with units `unit{i+1}`.
///
/// `pixel_sizes` defaults to 1.0 for every axis; when given it needs one
/// entry per axis.
pub fn default_dims(data: &EmdArray, pixel_sizes: Option<&[f64]>) -> Result<Vec<DimVector>> {
    dims_for_shape(data.shape(), pixel_sizes)
}

/// [`default_dims`] for an array of the given shape.
pub fn dims_for_shape(shape: &[usize], pixel_sizes: Option<&[f64]>) -> Result<Vec<DimVector>> {
    if let Some(sizes) = pixel_sizes {
        if sizes.len() != shape.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} pixel sizes given for {} axes",
                sizes.len(),
                shape.len()
            )));
        }
    }
    Ok(shape
        .iter()
        .enumerate()
        .map(|(i, &n)| {
            let px = pixel_sizes.map_or(1.0, |s| s[i]);
            let values = Array1::from_iter((0..n).map(|k| k as f64 * px));
            DimVector::new(values, format!("dim{}", i + 1), format!("unit{}", i + 1))
        })
        .collect())
}

//! Context (feature vector) abstraction.
//!
//! The policy only ever needs one thing from a context: its values written into a
//! dense `d`-length buffer. Dense slices and [`SparseContext`] both provide that.

use crate::error::{PolicyError, Result};

/// A feature vector that can be materialized densely.
pub trait Context {
    /// Logical dimension of the vector.
    fn dim(&self) -> usize;

    /// Write the dense representation into `out` (`out.len() == self.dim()`).
    fn fill_dense(&self, out: &mut [f64]);

    fn to_dense(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.dim()];
        self.fill_dense(&mut out);
        out
    }
}

impl Context for [f64] {
    fn dim(&self) -> usize {
        self.len()
    }

    fn fill_dense(&self, out: &mut [f64]) {
        out.copy_from_slice(self);
    }
}

impl Context for Vec<f64> {
    fn dim(&self) -> usize {
        self.len()
    }

    fn fill_dense(&self, out: &mut [f64]) {
        out.copy_from_slice(self);
    }
}

impl<const N: usize> Context for [f64; N] {
    fn dim(&self) -> usize {
        N
    }

    fn fill_dense(&self, out: &mut [f64]) {
        out.copy_from_slice(self);
    }
}

impl<C: Context + ?Sized> Context for &C {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn fill_dense(&self, out: &mut [f64]) {
        (**self).fill_dense(out);
    }
}

/// Sparse feature vector: `(index, value)` pairs over a fixed dimension.
///
/// Duplicate indices are summed when densified.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SparseContext {
    dim: usize,
    entries: Vec<(usize, f64)>,
}

impl SparseContext {
    pub fn new(dim: usize, entries: Vec<(usize, f64)>) -> Result<Self> {
        if let Some(&(index, _)) = entries.iter().find(|(i, _)| *i >= dim) {
            return Err(PolicyError::SparseIndexOutOfRange { index, dim });
        }
        Ok(Self { dim, entries })
    }

    /// Build from parallel index/value slices (CSR row style).
    pub fn from_parts(dim: usize, indices: &[usize], values: &[f64]) -> Result<Self> {
        if indices.len() != values.len() {
            return Err(PolicyError::DimensionMismatch {
                expected: indices.len(),
                actual: values.len(),
            });
        }
        Self::new(
            dim,
            indices.iter().copied().zip(values.iter().copied()).collect(),
        )
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }
}

impl Context for SparseContext {
    fn dim(&self) -> usize {
        self.dim
    }

    fn fill_dense(&self, out: &mut [f64]) {
        out.fill(0.0);
        for &(i, v) in &self.entries {
            if let Some(slot) = out.get_mut(i) {
                *slot += v;
            }
        }
    }
}

/// Densify `x` into `out`, checking dimension and finiteness.
pub(crate) fn densify<C: Context + ?Sized>(x: &C, out: &mut [f64]) -> Result<()> {
    if x.dim() != out.len() {
        return Err(PolicyError::DimensionMismatch {
            expected: out.len(),
            actual: x.dim(),
        });
    }
    x.fill_dense(out);
    if let Some(index) = out.iter().position(|v| !v.is_finite()) {
        return Err(PolicyError::NonFiniteContext { index });
    }
    Ok(())
}

//! Lazily refreshed Cholesky factors of `A⁻¹`, one slot per arm.
//!
//! A slot is either fresh (readable) or stale (needs a refactorization before
//! the next posterior sample). The stale variant keeps its buffer so a refresh
//! does not allocate, but its contents can't be read through [`Factor::fresh`].

use crate::linalg::cholesky_into;

#[derive(Debug, Clone, PartialEq)]
pub enum Factor {
    Fresh(Vec<f64>),
    Stale(Vec<f64>),
}

impl Factor {
    pub fn stale(len: usize) -> Self {
        Self::Stale(vec![0.0; len])
    }

    /// The factor, if it matches the current `A⁻¹`.
    pub fn fresh(&self) -> Option<&[f64]> {
        match self {
            Self::Fresh(l) => Some(l),
            Self::Stale(_) => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }

    /// Raw buffer regardless of freshness (snapshots only).
    pub(crate) fn raw(&self) -> &[f64] {
        match self {
            Self::Fresh(l) | Self::Stale(l) => l,
        }
    }

    pub fn invalidate(&mut self) {
        if let Self::Fresh(l) = self {
            *self = Self::Stale(std::mem::take(l));
        }
    }

    /// Refactor from `a_inv` if stale and return the fresh factor. On failure the
    /// slot stays stale (zeroed) and the offending pivot is returned.
    pub fn refresh(&mut self, a_inv: &[f64], dim: usize) -> Result<&[f64], f64> {
        if let Self::Stale(buf) = self {
            if let Err(pivot) = cholesky_into(a_inv, dim, buf) {
                buf.fill(0.0);
                return Err(pivot);
            }
            *self = Self::Fresh(std::mem::take(buf));
        }
        Ok(self.raw())
    }
}

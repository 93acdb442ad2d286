//! Per-arm storage arenas.
//!
//! Each field of the per-arm state lives in one contiguous buffer of `arms`
//! equally sized blocks (a d-vector or a row-major d x d matrix), indexed by arm.

use crate::error::{ConfigError, PolicyError, Result};

/// `arms` contiguous blocks of `block` f64 values.
#[derive(Debug, Clone, PartialEq)]
pub struct Arena {
    data: Vec<f64>,
    block: usize,
}

impl Arena {
    pub fn zeros(arms: usize, block: usize) -> Self {
        Self {
            data: vec![0.0; arms * block],
            block,
        }
    }

    /// Wrap an existing flat buffer, checking it holds exactly `arms` blocks.
    pub fn from_vec(
        field: &'static str,
        data: Vec<f64>,
        arms: usize,
        block: usize,
    ) -> Result<Self, ConfigError> {
        let expected = arms.checked_mul(block).unwrap_or(usize::MAX);
        if data.len() != expected {
            return Err(ConfigError::StateShape {
                field,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, block })
    }

    pub fn arms(&self) -> usize {
        if self.block == 0 {
            0
        } else {
            self.data.len() / self.block
        }
    }

    pub fn get(&self, arm: usize) -> Result<&[f64]> {
        self.check(arm)?;
        Ok(&self.data[arm * self.block..(arm + 1) * self.block])
    }

    pub fn get_mut(&mut self, arm: usize) -> Result<&mut [f64]> {
        self.check(arm)?;
        Ok(&mut self.data[arm * self.block..(arm + 1) * self.block])
    }

    /// Iterate blocks in arm order.
    pub fn blocks(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.block)
    }

    pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut [f64]> {
        self.data.chunks_exact_mut(self.block)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    fn check(&self, arm: usize) -> Result<()> {
        let arms = self.arms();
        if arm >= arms {
            return Err(PolicyError::ArmOutOfRange { arm, arms });
        }
        Ok(())
    }
}

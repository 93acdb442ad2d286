//! Policy configuration and exploration strategy.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Exploration strategy. Fixed for the lifetime of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DrawType {
    /// Deterministic argmax of `w·x + alpha * sqrt(xᵀ A⁻¹ x)`.
    #[default]
    Ucb,
    /// Linear Thompson sampling from `N(w, A⁻¹)` per arm.
    Thompson,
}

impl DrawType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ucb => "ucb",
            Self::Thompson => "thompson",
        }
    }
}

impl fmt::Display for DrawType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrawType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ucb" => Ok(Self::Ucb),
            "thompson" => Ok(Self::Thompson),
            _ => Err(ConfigError::UnknownDrawType(s.to_string())),
        }
    }
}

/// Numeric discriminants as used by experiment configs: `0` = UCB, `1` = Thompson.
impl TryFrom<i32> for DrawType {
    type Error = ConfigError;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Ucb),
            1 => Ok(Self::Thompson),
            other => Err(ConfigError::UnknownDrawType(other.to_string())),
        }
    }
}

/// Configuration for [`StatisticalPolicy`](crate::StatisticalPolicy).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PolicyConfig {
    /// Number of arms `k` (must be >= 1).
    pub arms: usize,
    /// Feature dimension `d` (must be >= 1).
    pub dim: usize,
    /// Ridge regularization (must be finite and > 0).
    pub l2: f64,
    /// UCB exploration strength (must be finite and >= 0). Unused by Thompson.
    pub alpha: f64,
    /// Exploration strategy.
    pub draw_type: DrawType,
    /// Seed for the policy RNG (Thompson noise and Monte Carlo propensities).
    pub seed: u64,
    /// Posterior draws per Thompson probability query.
    pub probability_samples: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            arms: 2,
            dim: 8,
            l2: 1.0,
            alpha: 1.0,
            draw_type: DrawType::Ucb,
            seed: 0,
            probability_samples: 1024,
        }
    }
}

impl PolicyConfig {
    /// Convenience constructor with the default hyperparameters.
    pub fn new(arms: usize, dim: usize) -> Self {
        Self {
            arms,
            dim,
            ..Self::default()
        }
    }

    pub fn with_draw_type(mut self, draw_type: DrawType) -> Self {
        self.draw_type = draw_type;
        self
    }

    /// Length of one arena of `arms` d x d matrices, `None` on overflow.
    fn matrix_len(&self) -> Option<usize> {
        self.dim
            .checked_mul(self.dim)
            .and_then(|m| m.checked_mul(self.arms))
            .filter(|&n| n <= isize::MAX as usize / std::mem::size_of::<f64>())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arms == 0 {
            return Err(ConfigError::NoArms);
        }
        if self.dim == 0 {
            return Err(ConfigError::ZeroDimension);
        }
        if self.matrix_len().is_none() {
            return Err(ConfigError::TooLarge {
                arms: self.arms,
                dim: self.dim,
            });
        }
        if !(self.l2.is_finite() && self.l2 > 0.0) {
            return Err(ConfigError::InvalidL2(self.l2));
        }
        if !(self.alpha.is_finite() && self.alpha >= 0.0) {
            return Err(ConfigError::InvalidAlpha(self.alpha));
        }
        if self.probability_samples == 0 {
            return Err(ConfigError::NoProbabilitySamples);
        }
        Ok(())
    }
}

//! Error types.
//!
//! Three tiers, all surfaced synchronously to the caller of the failing call:
//! configuration errors (fatal at construction), invalid arguments (fatal per
//! call), and numerical degeneracy (the state is left as it was before the call).

use thiserror::Error;

/// Configuration problems detected when building or restoring a policy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("number of arms must be >= 1")]
    NoArms,

    #[error("feature dimension must be >= 1")]
    ZeroDimension,

    #[error("l2 must be finite and > 0, got {0}")]
    InvalidL2(f64),

    #[error("alpha must be finite and >= 0, got {0}")]
    InvalidAlpha(f64),

    #[error("probability_samples must be >= 1")]
    NoProbabilitySamples,

    #[error("state for {arms} arms of dimension {dim} does not fit in memory")]
    TooLarge { arms: usize, dim: usize },

    #[error("unknown draw type {0:?}")]
    UnknownDrawType(String),

    #[error("state buffer `{field}` has length {actual}, expected {expected}")]
    StateShape {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Errors returned by [`StatisticalPolicy`](crate::StatisticalPolicy) operations.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("arm index {arm} out of range (k = {arms})")]
    ArmOutOfRange { arm: usize, arms: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("context value at index {index} is not finite")]
    NonFiniteContext { index: usize },

    #[error("reward {0} is not finite")]
    NonFiniteReward(f64),

    #[error("sparse index {index} out of range for dimension {dim}")]
    SparseIndexOutOfRange { index: usize, dim: usize },

    #[error("A_inv for arm {arm} is not positive definite (pivot {pivot})")]
    NotPositiveDefinite { arm: usize, pivot: f64 },

    #[error("degenerate Sherman-Morrison update for arm {arm} (denominator {denominator})")]
    DegenerateUpdate { arm: usize, denominator: f64 },

    #[error("state for arm {arm} would not be finite")]
    NonFiniteState { arm: usize },

    #[error("snapshot encoding: {0}")]
    Snapshot(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PolicyError {
    /// True for the numerical-degeneracy tier.
    ///
    /// Callers typically react by restarting with a larger `l2`.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            Self::NotPositiveDefinite { .. }
                | Self::DegenerateUpdate { .. }
                | Self::NonFiniteState { .. }
        )
    }
}

pub type Result<T, E = PolicyError> = std::result::Result<T, E>;

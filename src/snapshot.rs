//! Whole-state snapshots for save/restore across process lifetimes.
//!
//! Buffers are arm-major and flat: `w`/`b` hold `k` consecutive d-vectors,
//! `a`/`a_inv`/`cho` hold `k` consecutive row-major d x d matrices.

use crate::config::PolicyConfig;

/// Per-arm sufficient statistics, supplied all together or not at all.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmState {
    /// Ridge weights, `k * d`.
    pub w: Vec<f64>,
    /// Reward-weighted feature sums, `k * d`.
    pub b: Vec<f64>,
    /// Second-moment matrices, `k * d * d`.
    pub a: Vec<f64>,
    /// Inverses of `a`, `k * d * d`.
    pub a_inv: Vec<f64>,
    /// Cholesky factors of `a_inv`, `k * d * d`. Meaningful only where `recompute` is false.
    pub cho: Vec<f64>,
    /// Per-arm stale-factor flags, `k`.
    pub recompute: Vec<bool>,
}

/// Serializable policy snapshot: configuration plus every per-arm buffer.
///
/// The RNG stream position is not captured; restoring reseeds from `config.seed`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolicySnapshot {
    pub config: PolicyConfig,
    pub state: ArmState,
}

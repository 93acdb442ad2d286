//! `statpolicy`: a contextual bandit policy for online decisions and off-policy evaluation.
//!
//! Designed for classification-style experiments: each round presents a
//! `d`-dimensional context, the policy picks one of `k` actions, and a scalar
//! reward comes back for the chosen action only. Each arm keeps an online ridge
//! regression of reward on context; exploration is either an upper confidence
//! bound or linear Thompson sampling over that regression's posterior.
//!
//! **Operations** (all on [`StatisticalPolicy`]):
//! - [`update`](StatisticalPolicy::update): rank-1 update of one arm's statistics
//!   (Sherman-Morrison, O(d²)).
//! - [`draw`](StatisticalPolicy::draw): choose an action for a context.
//! - [`probability`](StatisticalPolicy::probability) /
//!   [`probabilities`](StatisticalPolicy::probabilities): the probability that
//!   `draw` picks a given action. Used for inverse-propensity weighting when
//!   replaying logged decisions.
//! - [`decide`](StatisticalPolicy::decide): `draw` plus its propensity, as a [`Decision`].
//!
//! **Strategies** ([`DrawType`]):
//! - `Ucb`: `argmax_a w_aᵀx + alpha * sqrt(xᵀ A_a⁻¹ x)`. Deterministic; its
//!   probabilities are one-hot.
//! - `Thompson`: sample `w̃_a ~ N(w_a, A_a⁻¹)` per arm, take `argmax_a w̃_aᵀx`.
//!   Probabilities are Monte Carlo estimates drawn through the same sampler.
//!
//! **Goals:**
//! - **Deterministic by default**: seeded RNG, lowest-index tie-breaks.
//! - **Allocation-free hot path**: per-field arenas and preallocated scratch.
//! - **Explicit failures**: bad arms, wrong dimensions, non-finite inputs and
//!   non-positive-definite matrices are errors, never clamps or panics.
//!
//! **Non-goals:**
//! - Not an experiment driver (no data loading, no CLI, no storage backend).
//! - No batching of several contexts per call, no feature engineering.
//!
//! # Example
//!
//! ```rust
//! use statpolicy::{PolicyConfig, StatisticalPolicy};
//!
//! let mut p = StatisticalPolicy::new(PolicyConfig::new(2, 1)).unwrap();
//! p.update(&[1.0], 0, 1.0).unwrap();
//! assert_eq!(p.weights(0).unwrap(), &[0.5]);
//!
//! // arm 0: 0.5 + sqrt(0.5) ≈ 1.207, arm 1: 0 + sqrt(1) = 1
//! assert_eq!(p.draw(&[1.0]).unwrap(), 0);
//! assert_eq!(p.probability(&[1.0], 0).unwrap(), 1.0);
//! ```

#![forbid(unsafe_code)]

mod arena;
mod config;
mod context;
mod decision;
mod error;
mod factor;
pub mod linalg;
mod policy;
mod snapshot;

pub use config::{DrawType, PolicyConfig};
pub use context::{Context, SparseContext};
pub use decision::{importance_weight, Decision};
pub use error::{ConfigError, PolicyError, Result};
pub use policy::{StatisticalPolicy, UcbScore, TIEBREAK_EPS};
pub use snapshot::{ArmState, PolicySnapshot};

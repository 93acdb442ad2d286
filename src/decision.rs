//! Logged decision record for off-policy evaluation.
//!
//! A `Decision` is what an experiment driver writes to its log at decision time:
//! the chosen action together with the propensity the policy assigned to it, so
//! the log can later be reweighted (IPS) without re-running the policy.

use crate::config::DrawType;

/// One policy decision plus its propensity.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decision {
    /// Strategy that produced the decision.
    pub draw_type: DrawType,
    /// Chosen action index.
    pub action: usize,
    /// Probability that the policy selects `action` for this context.
    ///
    /// Exactly 1 for UCB. For Thompson, a Monte Carlo estimate that counts the
    /// realised draw as one sample, so it lies in `[1 / (n + 1), 1]` for
    /// `n = probability_samples`.
    pub propensity: f64,
}

impl Decision {
    /// Inverse-propensity weight `1 / propensity`, or `None` when the propensity is zero.
    pub fn ips_weight(&self) -> Option<f64> {
        (self.propensity > 0.0).then(|| 1.0 / self.propensity)
    }
}

/// Importance weight for replaying a logged `(action, logging_propensity)` under a
/// target policy that selects `action` with probability `target_propensity`.
///
/// Returns `None` when the logging propensity is zero or not finite (the logged
/// event carries no usable weight).
pub fn importance_weight(target_propensity: f64, logging_propensity: f64) -> Option<f64> {
    if !(logging_propensity.is_finite() && logging_propensity > 0.0) {
        return None;
    }
    Some(target_propensity / logging_propensity)
}

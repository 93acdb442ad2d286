//! `StatisticalPolicy`: per-arm online ridge regression with UCB or linear
//! Thompson sampling exploration.
//!
//! Model, per arm `a`:
//!
//! ```text
//!   A_a = l2 * I + Σ x xᵀ        (second-moment matrix)
//!   b_a = Σ r x                   (reward-weighted feature sum)
//!   w_a = A_a⁻¹ b_a               (ridge solution)
//!   UCB_a(x)  = w_aᵀ x + alpha * sqrt(xᵀ A_a⁻¹ x)
//!   TS_a(x)   = (w_a + L_a u)ᵀ x,  L_a L_aᵀ = A_a⁻¹,  u ~ N(0, I)
//! ```
//!
//! `A⁻¹` is maintained with Sherman-Morrison rank-1 updates (O(d²) per update).
//! The Cholesky factors `L_a` are refreshed lazily: an update marks the arm's
//! factor stale and the next Thompson draw/probability refactors it once.
//!
//! Ties between arms always go to the lowest index.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::{debug, trace, warn};

use crate::arena::Arena;
use crate::config::{DrawType, PolicyConfig};
use crate::context::{densify, Context};
use crate::decision::Decision;
use crate::error::{PolicyError, Result};
use crate::factor::Factor;
use crate::linalg::{
    add_outer, argmax_lowest, dot, fill_scaled_identity, invert_spd_into, mat_vec_into,
    quad_form, sherman_morrison,
};
use crate::snapshot::{ArmState, PolicySnapshot};

/// Epsilon used for floating-point tie-breaking in argmax selection.
///
/// A later arm must beat the current best by more than this to win.
pub const TIEBREAK_EPS: f64 = 1e-12;

/// Per-arm UCB score tuple: `(ucb, mean, bonus)`.
pub type UcbScore = (f64, f64, f64);

/// Preallocated per-call buffers.
#[derive(Debug, Clone)]
struct Scratch {
    // dense context (d)
    x: Vec<f64>,
    // A⁻¹ x (d)
    ax: Vec<f64>,
    // standard-normal noise (d)
    u: Vec<f64>,
    // per-arm scores (k)
    scores: Vec<f64>,
    // per-arm win counts for Monte Carlo propensities (k)
    wins: Vec<u64>,
    // staged b and w for an update (d)
    b: Vec<f64>,
    w: Vec<f64>,
    // d x d work matrix
    work: Vec<f64>,
}

impl Scratch {
    fn new(arms: usize, dim: usize) -> Self {
        Self {
            x: vec![0.0; dim],
            ax: vec![0.0; dim],
            u: vec![0.0; dim],
            scores: vec![0.0; arms],
            wins: vec![0; arms],
            b: vec![0.0; dim],
            w: vec![0.0; dim],
            work: vec![0.0; dim * dim],
        }
    }
}

/// Contextual bandit policy over `k` arms and `d`-dimensional contexts.
///
/// Usage:
/// - call [`draw`](Self::draw) (or [`decide`](Self::decide) to also get a propensity)
/// - call [`update`](Self::update) with the same context once the reward is observed
/// - when replaying logs, call [`probability`](Self::probability) for the logged action
///
/// `Clone` is a deep copy, including the RNG stream position.
#[derive(Debug, Clone)]
pub struct StatisticalPolicy {
    cfg: PolicyConfig,
    rng: StdRng,
    w: Arena,
    b: Arena,
    a: Arena,
    a_inv: Arena,
    cho: Vec<Factor>,
    scratch: Scratch,
}

impl StatisticalPolicy {
    /// Fresh policy: `A = l2 I`, `A⁻¹ = I / l2`, `b = w = 0`, every factor stale.
    pub fn new(cfg: PolicyConfig) -> Result<Self> {
        cfg.validate()?;
        let (k, d) = (cfg.arms, cfg.dim);

        let mut a = Arena::zeros(k, d * d);
        let mut a_inv = Arena::zeros(k, d * d);
        for m in a.blocks_mut() {
            fill_scaled_identity(m, d, cfg.l2);
        }
        for m in a_inv.blocks_mut() {
            fill_scaled_identity(m, d, 1.0 / cfg.l2);
        }

        debug!(
            arms = k,
            dim = d,
            l2 = cfg.l2,
            alpha = cfg.alpha,
            draw_type = %cfg.draw_type,
            "statistical policy created"
        );

        Ok(Self {
            rng: StdRng::seed_from_u64(cfg.seed),
            w: Arena::zeros(k, d),
            b: Arena::zeros(k, d),
            a,
            a_inv,
            cho: (0..k).map(|_| Factor::stale(d * d)).collect(),
            scratch: Scratch::new(k, d),
            cfg,
        })
    }

    /// Policy over pre-existing state. Every buffer must have the shape implied
    /// by `cfg` (see [`ArmState`]); otherwise this is a configuration error.
    ///
    /// The buffers are taken as given: consistency between `a`, `a_inv`, `w`
    /// and `b` is the caller's responsibility.
    pub fn with_state(cfg: PolicyConfig, state: ArmState) -> Result<Self> {
        cfg.validate()?;
        let (k, d) = (cfg.arms, cfg.dim);
        let ArmState {
            w,
            b,
            a,
            a_inv,
            cho,
            recompute,
        } = state;

        let w = Arena::from_vec("w", w, k, d)?;
        let b = Arena::from_vec("b", b, k, d)?;
        let a = Arena::from_vec("a", a, k, d * d)?;
        let a_inv = Arena::from_vec("a_inv", a_inv, k, d * d)?;
        let cho = Arena::from_vec("cho", cho, k, d * d)?;
        if recompute.len() != k {
            return Err(crate::error::ConfigError::StateShape {
                field: "recompute",
                expected: k,
                actual: recompute.len(),
            }
            .into());
        }
        let cho = cho
            .blocks()
            .zip(&recompute)
            .map(|(l, &stale)| {
                if stale {
                    Factor::Stale(l.to_vec())
                } else {
                    Factor::Fresh(l.to_vec())
                }
            })
            .collect();

        let policy = Self {
            rng: StdRng::seed_from_u64(cfg.seed),
            w,
            b,
            a,
            a_inv,
            cho,
            scratch: Scratch::new(k, d),
            cfg,
        };
        if let Some(arm) = policy.non_finite_arm() {
            return Err(PolicyError::NonFiniteState { arm });
        }

        debug!(
            arms = k,
            dim = d,
            draw_type = %cfg.draw_type,
            "statistical policy restored"
        );
        Ok(policy)
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.cfg
    }

    /// Number of arms `k`.
    pub fn arms(&self) -> usize {
        self.cfg.arms
    }

    /// Feature dimension `d`.
    pub fn dim(&self) -> usize {
        self.cfg.dim
    }

    pub fn draw_type(&self) -> DrawType {
        self.cfg.draw_type
    }

    /// Ridge weights `w[arm]`.
    pub fn weights(&self, arm: usize) -> Result<&[f64]> {
        self.w.get(arm)
    }

    /// Reward-weighted feature sum `b[arm]`.
    pub fn reward_sums(&self, arm: usize) -> Result<&[f64]> {
        self.b.get(arm)
    }

    /// Second-moment matrix `A[arm]` (row-major d x d).
    pub fn second_moment(&self, arm: usize) -> Result<&[f64]> {
        self.a.get(arm)
    }

    /// Incrementally maintained `A[arm]⁻¹` (row-major d x d).
    pub fn inverse(&self, arm: usize) -> Result<&[f64]> {
        self.a_inv.get(arm)
    }

    /// Lower Cholesky factor of `A[arm]⁻¹`, or `None` if it is stale.
    pub fn cholesky(&self, arm: usize) -> Result<Option<&[f64]>> {
        Ok(self.factor(arm)?.fresh())
    }

    /// True if the arm's factor must be recomputed before the next Thompson sample.
    pub fn needs_refactor(&self, arm: usize) -> Result<bool> {
        Ok(self.factor(arm)?.is_stale())
    }

    /// Restart the RNG stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.cfg.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Fold one `(context, arm, reward)` observation into the arm's model.
    ///
    /// All argument and numerical checks run before any state changes: on
    /// error the policy is exactly as it was.
    pub fn update<C: Context + ?Sized>(&mut self, x: &C, arm: usize, reward: f64) -> Result<()> {
        self.check_arm(arm)?;
        if !reward.is_finite() {
            return Err(PolicyError::NonFiniteReward(reward));
        }
        let d = self.cfg.dim;
        let Self {
            w,
            b,
            a,
            a_inv,
            cho,
            scratch,
            ..
        } = self;
        densify(x, &mut scratch.x)?;
        let Scratch {
            x,
            ax,
            b: next_b,
            w: next_w,
            work: next_a_inv,
            ..
        } = scratch;

        let a = a.get_mut(arm)?;
        let a_inv = a_inv.get_mut(arm)?;
        mat_vec_into(a_inv, d, x, ax);
        let denom = 1.0 + dot(x, ax);
        if !(denom.is_finite() && denom > 0.0) {
            warn!(arm, denom, "degenerate Sherman-Morrison denominator");
            return Err(PolicyError::DegenerateUpdate {
                arm,
                denominator: denom,
            });
        }

        // Stage every new value; commit only if all of it is finite.
        let a_finite = (0..d).all(|i| (0..d).all(|j| (a[i * d + j] + x[i] * x[j]).is_finite()));
        for ((nb, bi), xi) in next_b.iter_mut().zip(b.get(arm)?).zip(x.iter()) {
            *nb = bi + reward * xi;
        }
        next_a_inv.copy_from_slice(a_inv);
        sherman_morrison(next_a_inv, d, ax, denom);
        mat_vec_into(next_a_inv, d, next_b, next_w);
        let finite = a_finite
            && next_b.iter().all(|v| v.is_finite())
            && next_w.iter().all(|v| v.is_finite())
            && next_a_inv.iter().all(|v| v.is_finite());
        if !finite {
            warn!(arm, reward, "update would leave non-finite state");
            return Err(PolicyError::NonFiniteState { arm });
        }

        add_outer(a, d, x);
        b.get_mut(arm)?.copy_from_slice(next_b);
        a_inv.copy_from_slice(next_a_inv);
        w.get_mut(arm)?.copy_from_slice(next_w);
        cho[arm].invalidate();

        trace!(arm, reward, "update");
        Ok(())
    }

    /// Select an action for context `x`.
    ///
    /// UCB is deterministic given the state. Thompson refreshes stale factors
    /// and then samples one weight vector per arm from `N(w, A⁻¹)`.
    pub fn draw<C: Context + ?Sized>(&mut self, x: &C) -> Result<usize> {
        densify(x, &mut self.scratch.x)?;
        let chosen = match self.cfg.draw_type {
            DrawType::Ucb => {
                self.fill_ucb_scores();
                argmax_lowest(&self.scratch.scores, TIEBREAK_EPS)
            }
            DrawType::Thompson => {
                self.fill_thompson_scores()?;
                argmax_lowest(&self.scratch.scores, TIEBREAK_EPS)
            }
        }
        .unwrap_or(0);
        trace!(chosen, draw_type = %self.cfg.draw_type, "draw");
        Ok(chosen)
    }

    /// Probability that [`draw`](Self::draw) selects `arm` for context `x`.
    ///
    /// UCB returns exactly `1.0` or `0.0`. Thompson returns a Monte Carlo
    /// estimate over `probability_samples` posterior draws, sampled exactly
    /// like `draw` (same noise model and tie-break), so it consumes the
    /// policy RNG.
    pub fn probability<C: Context + ?Sized>(&mut self, x: &C, arm: usize) -> Result<f64> {
        self.check_arm(arm)?;
        let p = self.distribution(x)?[arm];
        trace!(arm, p, "probability");
        Ok(p)
    }

    /// Selection probabilities for every arm; sums to 1.
    pub fn probabilities<C: Context + ?Sized>(&mut self, x: &C) -> Result<Vec<f64>> {
        Ok(self.distribution(x)?.to_vec())
    }

    /// Draw an action and report the propensity it was drawn with.
    ///
    /// For Thompson the realised draw counts as one of the Monte Carlo
    /// samples, so the propensity of `n` samples is `(wins + 1) / (n + 1)` and
    /// is never zero for the chosen action.
    pub fn decide<C: Context + ?Sized>(&mut self, x: &C) -> Result<Decision> {
        let action = self.draw(x)?;
        let propensity = match self.cfg.draw_type {
            DrawType::Ucb => 1.0,
            DrawType::Thompson => {
                self.distribution(x)?;
                let n = self.cfg.probability_samples as f64;
                let wins = self.scratch.wins[action] as f64;
                (wins + 1.0) / (n + 1.0)
            }
        };
        trace!(action, propensity, "decide");
        Ok(Decision {
            draw_type: self.cfg.draw_type,
            action,
            propensity,
        })
    }

    /// Per-arm `(ucb, mean, bonus)` for context `x`, regardless of draw type.
    pub fn scores<C: Context + ?Sized>(&self, x: &C) -> Result<Vec<UcbScore>> {
        let x = self.dense(x)?;
        let d = self.cfg.dim;
        Ok(self
            .w
            .blocks()
            .zip(self.a_inv.blocks())
            .map(|(w, a_inv)| {
                let mean = dot(w, &x);
                let bonus = self.cfg.alpha * quad_form(a_inv, d, &x).max(0.0).sqrt();
                (mean + bonus, mean, bonus)
            })
            .collect())
    }

    /// Greedy action: argmax of `w·x`, no exploration.
    pub fn greedy<C: Context + ?Sized>(&self, x: &C) -> Result<usize> {
        let x = self.dense(x)?;
        let means: Vec<f64> = self.w.blocks().map(|w| dot(w, &x)).collect();
        Ok(argmax_lowest(&means, TIEBREAK_EPS).unwrap_or(0))
    }

    /// Recompute `A[arm]⁻¹` directly from `A[arm]`, discarding drift accumulated
    /// by the incremental updates. `w[arm]` is recomputed and the factor
    /// invalidated. Fails (leaving state untouched) if `A[arm]` is not SPD.
    pub fn refresh_inverse(&mut self, arm: usize) -> Result<()> {
        self.check_arm(arm)?;
        let d = self.cfg.dim;
        let Self {
            w,
            b,
            a,
            a_inv,
            cho,
            scratch,
            ..
        } = self;
        let a_inv = a_inv.get_mut(arm)?;
        invert_spd_into(a.get(arm)?, d, &mut scratch.work, a_inv).map_err(|pivot| {
            warn!(arm, pivot, "second-moment matrix is not positive definite");
            PolicyError::NotPositiveDefinite { arm, pivot }
        })?;
        mat_vec_into(a_inv, d, b.get(arm)?, w.get_mut(arm)?);
        cho[arm].invalidate();
        debug!(arm, "inverse recomputed from A");
        Ok(())
    }

    /// Capture every per-arm buffer plus the configuration.
    pub fn snapshot(&self) -> PolicySnapshot {
        let mut cho = Vec::with_capacity(self.a_inv.as_slice().len());
        for f in &self.cho {
            cho.extend_from_slice(f.raw());
        }
        PolicySnapshot {
            config: self.cfg,
            state: ArmState {
                w: self.w.as_slice().to_vec(),
                b: self.b.as_slice().to_vec(),
                a: self.a.as_slice().to_vec(),
                a_inv: self.a_inv.as_slice().to_vec(),
                cho,
                recompute: self.cho.iter().map(Factor::is_stale).collect(),
            },
        }
    }

    /// Rebuild a policy from a snapshot. The RNG restarts from `config.seed`.
    pub fn restore(snapshot: PolicySnapshot) -> Result<Self> {
        Self::with_state(snapshot.config, snapshot.state)
    }

    /// Encode the snapshot as an opaque byte blob.
    ///
    /// Fails with [`PolicyError::NonFiniteState`] rather than encode a value
    /// that [`from_bytes`](Self::from_bytes) could not read back.
    #[cfg(feature = "serde")]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if let Some(arm) = self.non_finite_arm() {
            return Err(PolicyError::NonFiniteState { arm });
        }
        serde_json::to_vec(&self.snapshot()).map_err(|e| PolicyError::Snapshot(Box::new(e)))
    }

    /// Decode a blob produced by [`to_bytes`](Self::to_bytes).
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: PolicySnapshot =
            serde_json::from_slice(bytes).map_err(|e| PolicyError::Snapshot(Box::new(e)))?;
        Self::restore(snapshot)
    }

    fn check_arm(&self, arm: usize) -> Result<()> {
        if arm >= self.cfg.arms {
            return Err(PolicyError::ArmOutOfRange {
                arm,
                arms: self.cfg.arms,
            });
        }
        Ok(())
    }

    /// First arm holding a non-finite value in any buffer.
    fn non_finite_arm(&self) -> Option<usize> {
        (0..self.cfg.arms).find(|&arm| {
            let finite = |arena: &Arena| {
                arena
                    .get(arm)
                    .iter()
                    .flat_map(|v| v.iter())
                    .all(|x| x.is_finite())
            };
            !(finite(&self.w)
                && finite(&self.b)
                && finite(&self.a)
                && finite(&self.a_inv)
                && self.cho[arm].raw().iter().all(|x| x.is_finite()))
        })
    }

    fn factor(&self, arm: usize) -> Result<&Factor> {
        self.cho.get(arm).ok_or(PolicyError::ArmOutOfRange {
            arm,
            arms: self.cfg.arms,
        })
    }

    fn dense<C: Context + ?Sized>(&self, x: &C) -> Result<Vec<f64>> {
        let mut out = vec![0.0; self.cfg.dim];
        densify(x, &mut out)?;
        Ok(out)
    }

    /// Selection distribution for the context; `scratch.scores` holds it on return.
    fn distribution<C: Context + ?Sized>(&mut self, x: &C) -> Result<&[f64]> {
        densify(x, &mut self.scratch.x)?;
        match self.cfg.draw_type {
            DrawType::Ucb => {
                self.fill_ucb_scores();
                let best = argmax_lowest(&self.scratch.scores, TIEBREAK_EPS).unwrap_or(0);
                for (i, s) in self.scratch.scores.iter_mut().enumerate() {
                    *s = if i == best { 1.0 } else { 0.0 };
                }
            }
            DrawType::Thompson => {
                let n = self.cfg.probability_samples;
                self.scratch.wins.fill(0);
                for _ in 0..n {
                    self.fill_thompson_scores()?;
                    let best = argmax_lowest(&self.scratch.scores, TIEBREAK_EPS).unwrap_or(0);
                    self.scratch.wins[best] += 1;
                }
                let Scratch { scores, wins, .. } = &mut self.scratch;
                for (s, &c) in scores.iter_mut().zip(wins.iter()) {
                    *s = c as f64 / n as f64;
                }
            }
        }
        Ok(self.scratch.scores.as_slice())
    }

    /// UCB scores for `scratch.x` into `scratch.scores`.
    fn fill_ucb_scores(&mut self) {
        let d = self.cfg.dim;
        let alpha = self.cfg.alpha;
        let Scratch { x, scores, .. } = &mut self.scratch;
        for ((s, w), a_inv) in scores
            .iter_mut()
            .zip(self.w.blocks())
            .zip(self.a_inv.blocks())
        {
            let bound = quad_form(a_inv, d, x).max(0.0).sqrt();
            *s = dot(w, x) + alpha * bound;
        }
    }

    /// One posterior sample per arm scored against `scratch.x`, into `scratch.scores`.
    ///
    /// Refreshes stale factors on the way.
    fn fill_thompson_scores(&mut self) -> Result<()> {
        let d = self.cfg.dim;
        let Self {
            rng,
            w,
            a_inv,
            cho,
            scratch,
            ..
        } = self;
        let Scratch { x, u, scores, .. } = scratch;
        for (arm, ((s, factor), (w, a_inv))) in scores
            .iter_mut()
            .zip(cho.iter_mut())
            .zip(w.blocks().zip(a_inv.blocks()))
            .enumerate()
        {
            let l = factor.refresh(a_inv, d).map_err(|pivot| {
                warn!(arm, pivot, "A_inv is not positive definite; cannot factor");
                PolicyError::NotPositiveDefinite { arm, pivot }
            })?;
            for v in u.iter_mut() {
                *v = rng.sample(StandardNormal);
            }
            // (w + L u)ᵀ x, with L lower-triangular
            let mut noise = 0.0;
            for i in 0..d {
                noise += x[i] * dot(&l[i * d..i * d + i + 1], &u[..i + 1]);
            }
            *s = dot(w, x) + noise;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SparseContext;

    fn ucb(arms: usize, dim: usize) -> StatisticalPolicy {
        StatisticalPolicy::new(PolicyConfig::new(arms, dim)).unwrap()
    }

    fn thompson(arms: usize, dim: usize, seed: u64) -> StatisticalPolicy {
        StatisticalPolicy::new(PolicyConfig {
            seed,
            probability_samples: 4000,
            ..PolicyConfig::new(arms, dim).with_draw_type(DrawType::Thompson)
        })
        .unwrap()
    }

    #[test]
    fn initial_state_is_scaled_identity() {
        let p = StatisticalPolicy::new(PolicyConfig {
            l2: 2.0,
            ..PolicyConfig::new(3, 2)
        })
        .unwrap();
        for arm in 0..3 {
            assert_eq!(p.second_moment(arm).unwrap(), &[2.0, 0.0, 0.0, 2.0]);
            assert_eq!(p.inverse(arm).unwrap(), &[0.5, 0.0, 0.0, 0.5]);
            assert_eq!(p.weights(arm).unwrap(), &[0.0, 0.0]);
            assert_eq!(p.reward_sums(arm).unwrap(), &[0.0, 0.0]);
            assert!(p.needs_refactor(arm).unwrap());
        }
    }

    #[test]
    fn end_to_end_single_feature_example() {
        let mut p = ucb(2, 1);
        p.update(&[1.0], 0, 1.0).unwrap();

        assert_eq!(p.second_moment(0).unwrap(), &[2.0]);
        assert_eq!(p.inverse(0).unwrap(), &[0.5]);
        assert_eq!(p.reward_sums(0).unwrap(), &[1.0]);
        assert_eq!(p.weights(0).unwrap(), &[0.5]);
        assert_eq!(p.second_moment(1).unwrap(), &[1.0]);
        assert_eq!(p.weights(1).unwrap(), &[0.0]);

        let scores = p.scores(&[1.0]).unwrap();
        assert!((scores[0].0 - (0.5 + 0.5f64.sqrt())).abs() < 1e-12);
        assert!((scores[1].0 - 1.0).abs() < 1e-12);
        assert_eq!(p.draw(&[1.0]).unwrap(), 0);
    }

    #[test]
    fn update_rejects_bad_arguments_without_mutation() {
        let mut p = ucb(2, 2);
        p.update(&[1.0, 0.5], 1, 0.3).unwrap();
        let before = p.snapshot();

        assert!(matches!(
            p.update(&[1.0, 0.0], 2, 1.0),
            Err(PolicyError::ArmOutOfRange { arm: 2, arms: 2 })
        ));
        assert!(matches!(
            p.update(&[1.0], 0, 1.0),
            Err(PolicyError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            p.update(&[f64::INFINITY, 0.0], 0, 1.0),
            Err(PolicyError::NonFiniteContext { index: 0 })
        ));
        assert!(matches!(
            p.update(&[1.0, 0.0], 0, f64::NAN),
            Err(PolicyError::NonFiniteReward(_))
        ));
        assert_eq!(p.snapshot(), before);
    }

    #[test]
    fn update_rejects_overflow_without_mutation() {
        let mut p = ucb(2, 2);
        p.update(&[1.0, 0.5], 0, 0.3).unwrap();
        let before = p.snapshot();

        // finite inputs whose products overflow
        let err = p.update(&[10.0, 0.0], 0, 1e308).unwrap_err();
        assert!(matches!(err, PolicyError::NonFiniteState { arm: 0 }));
        assert!(err.is_numerical());
        let err = p.update(&[1e200, 0.0], 1, 1.0).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::NonFiniteState { arm: 1 } | PolicyError::DegenerateUpdate { arm: 1, .. }
        ));
        assert_eq!(p.snapshot(), before);

        #[cfg(feature = "serde")]
        {
            let q = StatisticalPolicy::from_bytes(&p.to_bytes().unwrap()).unwrap();
            assert_eq!(q.snapshot(), before);
        }
    }

    #[test]
    fn non_finite_state_is_rejected_at_restore() {
        let state = ArmState {
            w: vec![f64::INFINITY, 0.0],
            b: vec![0.0, 0.0],
            a: vec![1.0, 1.0],
            a_inv: vec![1.0, 1.0],
            cho: vec![0.0, 0.0],
            recompute: vec![true, true],
        };
        let err = StatisticalPolicy::with_state(PolicyConfig::new(2, 1), state).unwrap_err();
        assert!(matches!(err, PolicyError::NonFiniteState { arm: 0 }));
    }

    #[test]
    fn degenerate_inverse_is_a_numerical_error() {
        let cfg = PolicyConfig::new(1, 1);
        let state = ArmState {
            w: vec![0.0],
            b: vec![0.0],
            a: vec![1.0],
            a_inv: vec![-2.0],
            cho: vec![0.0],
            recompute: vec![true],
        };
        let mut p = StatisticalPolicy::with_state(cfg, state).unwrap();
        let err = p.update(&[1.0], 0, 1.0).unwrap_err();
        assert!(err.is_numerical());
        assert!(matches!(err, PolicyError::DegenerateUpdate { arm: 0, .. }));

        let mut ts = StatisticalPolicy::with_state(
            cfg.with_draw_type(DrawType::Thompson),
            p.snapshot().state,
        )
        .unwrap();
        let err = ts.draw(&[1.0]).unwrap_err();
        assert!(matches!(err, PolicyError::NotPositiveDefinite { arm: 0, .. }));
        assert!(ts.needs_refactor(0).unwrap());
    }

    #[test]
    fn sparse_and_dense_contexts_agree() {
        let mut dense = ucb(2, 4);
        let mut sparse = ucb(2, 4);
        let xs = SparseContext::new(4, vec![(0, 1.0), (3, -0.5)]).unwrap();
        let xd = [1.0, 0.0, 0.0, -0.5];

        dense.update(&xd, 1, 0.8).unwrap();
        sparse.update(&xs, 1, 0.8).unwrap();
        assert_eq!(dense.snapshot(), sparse.snapshot());
        assert_eq!(dense.draw(&xd).unwrap(), sparse.draw(&xs).unwrap());
    }

    #[test]
    fn ties_go_to_lowest_arm() {
        let mut p = ucb(4, 3);
        let x = [0.2, 0.2, 0.2];
        assert_eq!(p.draw(&x).unwrap(), 0);
        assert_eq!(p.probabilities(&x).unwrap(), vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(p.greedy(&x).unwrap(), 0);
    }

    #[test]
    fn ucb_decide_reports_unit_propensity() {
        let mut p = ucb(3, 2);
        p.update(&[1.0, 0.0], 2, 1.0).unwrap();
        let d = p.decide(&[1.0, 0.0]).unwrap();
        assert_eq!(d.action, 2);
        assert_eq!(d.propensity, 1.0);
        assert_eq!(d.draw_type, DrawType::Ucb);
    }

    #[test]
    fn thompson_decide_propensity_counts_the_realised_draw() {
        let n = 4;
        let mut p = StatisticalPolicy::new(PolicyConfig {
            seed: 8,
            probability_samples: n,
            ..PolicyConfig::new(3, 2).with_draw_type(DrawType::Thompson)
        })
        .unwrap();
        for _ in 0..20 {
            p.update(&[1.0, 0.0], 1, 1.0).unwrap();
        }
        for _ in 0..200 {
            let d = p.decide(&[1.0, 0.0]).unwrap();
            assert!(d.propensity >= 1.0 / (n as f64 + 1.0));
            assert!(d.propensity <= 1.0);
            let hits = d.propensity * (n as f64 + 1.0) - 1.0;
            assert!((hits - hits.round()).abs() < 1e-9, "hits={hits}");
            assert!(d.ips_weight().is_some());
        }
    }

    #[test]
    fn greedy_ignores_exploration_bonus() {
        let mut p = StatisticalPolicy::new(PolicyConfig {
            alpha: 10.0,
            ..PolicyConfig::new(2, 1)
        })
        .unwrap();
        for _ in 0..20 {
            p.update(&[1.0], 0, 0.6).unwrap();
        }
        // arm 1 untried: huge bonus under UCB, zero mean under greedy
        assert_eq!(p.draw(&[1.0]).unwrap(), 1);
        assert_eq!(p.greedy(&[1.0]).unwrap(), 0);
    }

    #[test]
    fn thompson_draw_refreshes_every_factor() {
        let mut p = thompson(3, 2, 7);
        p.update(&[0.5, 1.0], 1, 1.0).unwrap();
        p.draw(&[0.5, 1.0]).unwrap();
        for arm in 0..3 {
            assert!(!p.needs_refactor(arm).unwrap());
            let l = p.cholesky(arm).unwrap().unwrap();
            // L Lᵀ == A⁻¹
            let a_inv = p.inverse(arm).unwrap();
            for i in 0..2 {
                for j in 0..2 {
                    let v: f64 = (0..2).map(|k| l[i * 2 + k] * l[j * 2 + k]).sum();
                    assert!((v - a_inv[i * 2 + j]).abs() < 1e-12);
                }
            }
        }
        p.update(&[0.5, 1.0], 2, 0.0).unwrap();
        assert!(p.needs_refactor(2).unwrap());
        assert!(p.cholesky(2).unwrap().is_none());
        assert!(!p.needs_refactor(0).unwrap());
    }

    #[test]
    fn thompson_probabilities_form_a_distribution() {
        let mut p = thompson(3, 2, 11);
        for _ in 0..30 {
            p.update(&[1.0, 0.2], 0, 1.0).unwrap();
            p.update(&[1.0, 0.2], 1, 0.0).unwrap();
        }
        let probs = p.probabilities(&[1.0, 0.2]).unwrap();
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(probs.iter().all(|v| (0.0..=1.0).contains(v)));
        // arm 0 dominates arm 1; arm 2 is still at its wide prior
        assert!(probs[0] > probs[1]);
    }

    #[test]
    fn probability_rejects_out_of_range_arm() {
        let mut p = thompson(2, 2, 0);
        assert!(matches!(
            p.probability(&[0.0, 1.0], 5),
            Err(PolicyError::ArmOutOfRange { arm: 5, arms: 2 })
        ));
    }

    #[test]
    fn refresh_inverse_matches_incremental_inverse() {
        let mut p = ucb(1, 3);
        let xs = [[1.0, 0.0, 2.0], [0.5, -1.0, 0.0], [0.0, 0.3, 0.3], [2.0, 1.0, -1.0]];
        for (i, x) in xs.iter().enumerate() {
            p.update(x, 0, i as f64 * 0.25).unwrap();
        }
        let incremental = p.inverse(0).unwrap().to_vec();
        let w_before = p.weights(0).unwrap().to_vec();
        p.refresh_inverse(0).unwrap();
        for (a, b) in incremental.iter().zip(p.inverse(0).unwrap()) {
            assert!((a - b).abs() < 1e-10);
        }
        for (a, b) in w_before.iter().zip(p.weights(0).unwrap()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn with_state_rejects_mismatched_shapes() {
        let cfg = PolicyConfig::new(2, 2);
        let good = ucb(2, 2).snapshot().state;

        let mut bad = good.clone();
        bad.a_inv.pop();
        let err = StatisticalPolicy::with_state(cfg, bad).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::Config(crate::error::ConfigError::StateShape { field: "a_inv", .. })
        ));

        let mut bad = good;
        bad.recompute.push(false);
        assert!(StatisticalPolicy::with_state(cfg, bad).is_err());
    }
}

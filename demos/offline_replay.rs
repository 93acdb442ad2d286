//! Log decisions from a Thompson policy, then evaluate a UCB policy offline on
//! that log with inverse-propensity scoring (IPS).
//!
//! Run with: `RUST_LOG=statpolicy=debug cargo run --example offline_replay`

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statpolicy::{importance_weight, DrawType, PolicyConfig, StatisticalPolicy};
use tracing::info;
use tracing_subscriber::EnvFilter;

struct Logged {
    ctx: [f64; 3],
    action: usize,
    propensity: f64,
    reward: f64,
}

/// Simulated classification task: the correct label depends on the sign of the
/// second feature and on the third feature being large.
fn label(ctx: &[f64; 3]) -> usize {
    match (ctx[1] > 0.0, ctx[2] > 0.5) {
        (false, _) => 0,
        (true, false) => 1,
        (true, true) => 2,
    }
}

fn context(env: &mut StdRng) -> [f64; 3] {
    [1.0, env.random_range(-1.0..1.0), env.random::<f64>()]
}

fn main() -> Result<(), statpolicy::PolicyError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut env = StdRng::seed_from_u64(123);

    // Logging policy: explores via Thompson sampling and records propensities.
    let mut logging = StatisticalPolicy::new(PolicyConfig {
        seed: 1,
        probability_samples: 512,
        ..PolicyConfig::new(3, 3).with_draw_type(DrawType::Thompson)
    })?;
    let mut log = Vec::new();
    for _ in 0..2_000 {
        let ctx = context(&mut env);
        let d = logging.decide(&ctx)?;
        let reward = if d.action == label(&ctx) { 1.0 } else { 0.0 };
        logging.update(&ctx, d.action, reward)?;
        log.push(Logged {
            ctx,
            action: d.action,
            propensity: d.propensity,
            reward,
        });
    }
    let online: f64 = log.iter().map(|l| l.reward).sum::<f64>() / log.len() as f64;

    // Target policy: UCB, trained on the first half of the log, evaluated on the second.
    let (train, test) = log.split_at(log.len() / 2);
    let mut target = StatisticalPolicy::new(PolicyConfig {
        alpha: 0.1,
        ..PolicyConfig::new(3, 3)
    })?;
    for l in train {
        target.update(&l.ctx, l.action, l.reward)?;
    }

    let mut value = 0.0;
    let mut skipped = 0usize;
    for l in test {
        let p_target = target.probability(&l.ctx, l.action)?;
        match importance_weight(p_target, l.propensity) {
            Some(w) => value += w * l.reward,
            None => skipped += 1,
        }
    }
    let ips = value / test.len() as f64;

    // Ground truth for the target, by simulation.
    let mut truth = 0.0;
    let n = 5_000;
    for _ in 0..n {
        let ctx = context(&mut env);
        if target.draw(&ctx)? == label(&ctx) {
            truth += 1.0;
        }
    }

    info!("logging policy online reward: {online:.3}");
    info!(skipped, "target IPS estimate: {ips:.3}");
    info!("target simulated reward: {:.3}", truth / n as f64);
    Ok(())
}

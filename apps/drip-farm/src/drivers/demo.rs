//! Simulated claims.
//!
//! No network at all: a weighted coin flip decides the outcome and a random
//! drip of 1-20 units is paid on success. Seed it for reproducible runs.

use super::{ClaimContext, ClaimDriver, ClaimOutcome};
use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use tracing::info;

pub const DEFAULT_SUCCESS_PROBABILITY: f64 = 0.9;
pub const MIN_DRIP: u32 = 1;
pub const MAX_DRIP: u32 = 20;

/// Random source shared by the simulated paths of every driver.
#[derive(Debug)]
pub struct SimulatedClaim {
    rng: Mutex<StdRng>,
    success_probability: f64,
}

impl SimulatedClaim {
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            success_probability: DEFAULT_SUCCESS_PROBABILITY,
        }
    }

    /// Clamped to `[0, 1]`; NaN falls back to the default.
    pub fn with_success_probability(mut self, p: f64) -> Self {
        self.success_probability = if p.is_nan() {
            DEFAULT_SUCCESS_PROBABILITY
        } else {
            p.clamp(0.0, 1.0)
        };
        self
    }

    pub fn success_probability(&self) -> f64 {
        self.success_probability
    }

    /// One simulated attempt, tagged with the given messages.
    pub fn roll(&self, ok_message: &str, fail_message: &str) -> ClaimOutcome {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if rng.gen_bool(self.success_probability) {
            let amount = rng.gen_range(MIN_DRIP..=MAX_DRIP);
            ClaimOutcome::success(f64::from(amount), ok_message)
        } else {
            ClaimOutcome::failure(fail_message)
        }
    }
}

#[derive(Debug)]
pub struct DemoDriver {
    sim: SimulatedClaim,
}

impl DemoDriver {
    pub fn new() -> Self {
        Self {
            sim: SimulatedClaim::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            sim: SimulatedClaim::seeded(seed),
        }
    }

    pub fn with_success_probability(mut self, p: f64) -> Self {
        self.sim = self.sim.with_success_probability(p);
        self
    }
}

impl Default for DemoDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClaimDriver<ClaimContext> for DemoDriver {
    fn name(&self) -> &str {
        "demo"
    }

    async fn claim(&self, ctx: &ClaimContext) -> Result<ClaimOutcome> {
        info!(
            "[DEMO] Claiming from faucet: {} ({}) -> wallet: {}",
            ctx.faucet.name,
            ctx.coin(),
            ctx.wallet
        );
        Ok(self.sim.roll("demo-ok", "demo-fail"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcomes(sim: &SimulatedClaim, n: usize) -> Vec<ClaimOutcome> {
        (0..n).map(|_| sim.roll("ok", "fail")).collect()
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let a = outcomes(&SimulatedClaim::seeded(42), 50);
        let b = outcomes(&SimulatedClaim::seeded(42), 50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_amounts_in_range() {
        let sim = SimulatedClaim::seeded(7);
        for outcome in outcomes(&sim, 500) {
            if outcome.success {
                assert!(outcome.amount >= 1.0 && outcome.amount <= 20.0);
                assert_eq!(outcome.amount.fract(), 0.0);
                assert_eq!(outcome.message, "ok");
            } else {
                assert_eq!(outcome.amount, 0.0);
                assert_eq!(outcome.message, "fail");
            }
        }
    }

    #[test]
    fn test_probability_extremes() {
        let always = SimulatedClaim::seeded(1).with_success_probability(1.0);
        assert!(outcomes(&always, 100).iter().all(|o| o.success));

        let never = SimulatedClaim::seeded(1).with_success_probability(0.0);
        assert!(outcomes(&never, 100).iter().all(|o| !o.success));
    }

    #[test]
    fn test_probability_is_clamped() {
        assert_eq!(
            SimulatedClaim::seeded(1)
                .with_success_probability(3.5)
                .success_probability(),
            1.0
        );
        assert_eq!(
            SimulatedClaim::seeded(1)
                .with_success_probability(f64::NAN)
                .success_probability(),
            DEFAULT_SUCCESS_PROBABILITY
        );
    }

    #[test]
    fn test_default_rate_is_roughly_ninety_percent() {
        let sim = SimulatedClaim::seeded(2024);
        let wins = outcomes(&sim, 2000).iter().filter(|o| o.success).count();
        assert!((1700..=1900).contains(&wins), "wins = {}", wins);
    }
}

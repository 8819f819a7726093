//! Martingale stake controller
//!
//! The stake resets to base on a win and climbs one multiplier step per
//! loss. Each step is derived fresh from the base (`base * mult^streak`)
//! and rounded half-up to cents, so the published ladder carries no
//! accumulated rounding error. What happens when the ladder would pierce
//! the stake ceiling is a policy choice, not hard-coded.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// What to do when the next martingale step would exceed the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeilingPolicy {
    /// Stop the session: the recovery ladder is exhausted.
    #[default]
    StopSession,
    /// Pin the stake at the ceiling and keep trading.
    ClampAndContinue,
}

/// Round a currency amount half-up to cents.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Result of applying a loss to the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StakeAdjust {
    /// One step up the ladder, within bounds.
    Raised(f64),
    /// The step pierced the ceiling; stake pinned at the maximum.
    Clamped(f64),
    /// The step pierced the ceiling; the session must stop.
    CeilingExceeded,
}

pub struct StakeController {
    base: f64,
    max: f64,
    multiplier: f64,
    policy: CeilingPolicy,
    stake: f64,
    losing_streak: u32,
}

impl StakeController {
    pub fn new(base: f64, max: f64, multiplier: f64, policy: CeilingPolicy) -> Self {
        Self {
            base,
            max,
            multiplier,
            policy,
            stake: base,
            losing_streak: 0,
        }
    }

    /// Current stake to submit with the next order.
    pub fn stake(&self) -> f64 {
        self.stake
    }

    pub fn losing_streak(&self) -> u32 {
        self.losing_streak
    }

    /// A win resets the ladder.
    pub fn on_win(&mut self) -> f64 {
        self.losing_streak = 0;
        self.stake = self.base;
        self.stake
    }

    /// A loss climbs one step, respecting the ceiling policy.
    pub fn on_loss(&mut self) -> StakeAdjust {
        self.losing_streak += 1;
        let next = round2(self.base * self.multiplier.powi(self.losing_streak as i32));
        if next > self.max {
            return match self.policy {
                CeilingPolicy::StopSession => StakeAdjust::CeilingExceeded,
                CeilingPolicy::ClampAndContinue => {
                    warn!(
                        "martingale step {:.2} above ceiling {:.2}, clamping",
                        next, self.max
                    );
                    self.stake = self.max;
                    StakeAdjust::Clamped(self.stake)
                }
            };
        }
        self.stake = next;
        StakeAdjust::Raised(next)
    }
}

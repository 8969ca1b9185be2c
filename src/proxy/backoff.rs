//! Full-jitter backoff schedules
//!
//! The k-th draw is uniform in `[0, bound(k)]` where `bound` grows linearly or
//! exponentially from `step` and saturates at `max`. The saturation index is
//! computed once with real-valued arithmetic so large `max / step` ratios never
//! overflow.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RotaError};

/// Growth curve of the backoff bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    #[default]
    Linear,
    Exponential,
}

impl BackoffStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(Self::Linear),
            "exponential" | "exp" => Some(Self::Exponential),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Exponential => "exponential",
        }
    }
}

/// Endless jittered delay sequence
///
/// Each call to `next` draws one delay and advances the attempt counter.
#[derive(Debug, Clone)]
pub struct Backoff {
    strategy: BackoffStrategy,
    step: f64,
    max: f64,
    /// Last attempt index whose bound is still below `max`
    saturation: f64,
    attempt: u64,
    rng: StdRng,
}

impl Backoff {
    pub fn new(strategy: BackoffStrategy, step: Duration, max: Duration) -> Result<Self> {
        Self::with_rng(strategy, step, max, StdRng::from_entropy())
    }

    pub fn linear(step: Duration, max: Duration) -> Result<Self> {
        Self::new(BackoffStrategy::Linear, step, max)
    }

    pub fn exponential(step: Duration, max: Duration) -> Result<Self> {
        Self::new(BackoffStrategy::Exponential, step, max)
    }

    pub fn with_rng(
        strategy: BackoffStrategy,
        step: Duration,
        max: Duration,
        rng: StdRng,
    ) -> Result<Self> {
        let step = step.as_secs_f64();
        let max = max.as_secs_f64();
        if step <= 0.0 || max <= 0.0 {
            return Err(RotaError::InvalidConfig(
                "backoff step and max must be positive".into(),
            ));
        }

        let saturation = match strategy {
            BackoffStrategy::Linear => max / step,
            BackoffStrategy::Exponential => (max / step).log2(),
        };

        Ok(Self {
            strategy,
            step,
            max,
            saturation,
            attempt: 0,
            rng,
        })
    }

    pub fn strategy(&self) -> BackoffStrategy {
        self.strategy
    }

    /// Number of delays drawn so far
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Deterministic upper bound for attempt `k`, before jitter
    pub fn bound(&self, k: u64) -> Duration {
        secs_to_duration(self.bound_secs(k))
    }

    fn bound_secs(&self, k: u64) -> f64 {
        let k_f = k as f64;
        if k_f > self.saturation {
            return self.max;
        }
        let raw = match self.strategy {
            BackoffStrategy::Linear => self.step * k_f,
            // k <= log2(max / step) here, so the power stays small
            BackoffStrategy::Exponential => self.step * 2f64.powf(k_f),
        };
        raw.min(self.max)
    }

    /// Draw the next delay
    pub fn next_delay(&mut self) -> Duration {
        let bound = self.bound_secs(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        secs_to_duration(self.rng.gen_range(0.0..=bound))
    }
}

/// Float seconds to `Duration`, saturating at `Duration::MAX`
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

//! Randomized TTL extension against synchronized mass expiry.
//!
//! Entries written together (a warm-up job, a deploy) would otherwise all
//! expire at the same instant and send the same burst of loads to the
//! backing store. Each TTL is stretched by a uniform random amount in
//! `[0, base * jitter_fraction]`.

use rand::Rng;
use std::time::Duration;

/// TTL jitter policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TtlJitterPolicy {
    jitter_fraction: f64,
}

impl TtlJitterPolicy {
    /// Create a policy. The fraction is clamped to `[0.0, 1.0]`; NaN disables jitter.
    pub fn new(jitter_fraction: f64) -> Self {
        let jitter_fraction = if jitter_fraction.is_nan() {
            0.0
        } else {
            jitter_fraction.clamp(0.0, 1.0)
        };
        Self { jitter_fraction }
    }

    pub const fn jitter_fraction(&self) -> f64 {
        self.jitter_fraction
    }

    /// Largest extension this policy can add to `base`.
    pub fn max_jitter(&self, base: Duration) -> Duration {
        base.mul_f64(self.jitter_fraction)
    }

    /// `base` plus a uniform random extension, using the thread-local RNG.
    pub fn compute_ttl(&self, base: Duration) -> Duration {
        self.compute_ttl_with(base, &mut rand::thread_rng())
    }

    /// `base` plus a uniform random extension drawn from `rng`.
    pub fn compute_ttl_with<R: Rng + ?Sized>(&self, base: Duration, rng: &mut R) -> Duration {
        let max_jitter_ms = u64::try_from(self.max_jitter(base).as_millis()).unwrap_or(u64::MAX);
        if max_jitter_ms == 0 {
            return base;
        }
        base.saturating_add(Duration::from_millis(rng.gen_range(0..=max_jitter_ms)))
    }
}

impl Default for TtlJitterPolicy {
    fn default() -> Self {
        Self::new(0.2)
    }
}

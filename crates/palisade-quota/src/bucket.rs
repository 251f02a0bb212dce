//! Token buckets with lazy monotonic refill.
//!
//! A bucket holds `capacity` tokens and regains `capacity` tokens per
//! `window`, continuously, computed on access from the elapsed monotonic
//! time. Refill is clamped to capacity. The caller supplies `now` on every
//! call; a `now` earlier than the last observed instant means the monotonic
//! clock contract was broken and the bucket refuses to answer.

use std::time::{Duration, Instant};

/// The bucket observed time move backwards. Counters whose clock cannot be
/// trusted deny fail-closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockRegression;

#[derive(Debug)]
pub(crate) struct TokenBucket {
    capacity: f64,
    tokens: f64,
    window: Duration,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket for `limit` tokens per `window`.
    pub(crate) fn new(limit: u64, window: Duration, now: Instant) -> Self {
        Self {
            capacity: limit as f64,
            tokens: limit as f64,
            window,
            last_refill: now,
        }
    }

    /// Take `cost` tokens if available. Refills lazily first.
    pub(crate) fn try_consume(
        &mut self,
        cost: u64,
        now: Instant,
    ) -> Result<bool, ClockRegression> {
        self.refill(now)?;
        let cost = cost as f64;
        if self.tokens >= cost {
            self.tokens -= cost;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn refill(&mut self, now: Instant) -> Result<(), ClockRegression> {
        let elapsed = now
            .checked_duration_since(self.last_refill)
            .ok_or(ClockRegression)?;
        let regained = self.capacity * elapsed.as_secs_f64() / self.window.as_secs_f64();
        self.tokens = (self.tokens + regained).min(self.capacity);
        self.last_refill = now;
        Ok(())
    }
}

//! Outbound throttling policies attached to sender queues
//!
//! A concurrency limiter counts items currently in flight against a
//! movable ceiling; a rate limiter spends a bytes-per-second budget.
//! Both gate `available_items`, never `push`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

/// Named token policy counting in-flight sends
///
/// Typically one limiter per region or tenant, shared by every sender
/// queue flushing there. The ceiling adapts to observed outcomes: failures
/// halve it, successes climb back toward the configured maximum.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    description: String,
    max_limit: u32,
    current_limit: AtomicU32,
    in_sending: AtomicU32,
}

impl ConcurrencyLimiter {
    pub fn new(description: impl Into<String>, max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            description: description.into(),
            max_limit,
            current_limit: AtomicU32::new(max_limit),
            in_sending: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether another item may enter `Sending`
    #[inline]
    pub fn is_valid_to_pop(&self) -> bool {
        self.in_sending.load(Ordering::Acquire) < self.current_limit.load(Ordering::Acquire)
    }

    /// Claim a token; caller must have checked `is_valid_to_pop` under the
    /// queue lock
    #[inline]
    pub fn post_pop(&self) {
        self.in_sending.fetch_add(1, Ordering::AcqRel);
    }

    /// Release the token on completion, success or failure
    pub fn on_send_done(&self) {
        let prev = self.in_sending.fetch_sub(1, Ordering::AcqRel);
        if prev == 0 {
            // should never happen
            tracing::error!(limiter = %self.description, "concurrency token released twice");
            self.in_sending.store(0, Ordering::Release);
        }
    }

    /// Successful send: climb one token toward the configured maximum
    pub fn on_success(&self) {
        let current = self.current_limit.load(Ordering::Acquire);
        if current < self.max_limit {
            self.current_limit
                .store((current + 1).min(self.max_limit), Ordering::Release);
        }
    }

    /// Failed send: halve the ceiling, never below one
    pub fn on_fail(&self) {
        let current = self.current_limit.load(Ordering::Acquire);
        let halved = (current / 2).max(1);
        if halved != current {
            self.current_limit.store(halved, Ordering::Release);
            tracing::debug!(
                limiter = %self.description,
                limit = halved,
                "concurrency limit lowered after send failure"
            );
        }
    }

    #[inline]
    pub fn current_limit(&self) -> u32 {
        self.current_limit.load(Ordering::Acquire)
    }

    #[inline]
    pub fn in_sending(&self) -> u32 {
        self.in_sending.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub fn set_current_limit(&self, limit: u32) {
        self.current_limit.store(limit, Ordering::Release);
    }

    #[cfg(test)]
    pub fn set_in_sending(&self, count: u32) {
        self.in_sending.store(count, Ordering::Release);
    }
}

/// Bytes-per-second send budget with wall-clock refill
///
/// Lives inside its queue's lock, so plain fields suffice.
#[derive(Debug)]
pub struct RateLimiter {
    pub max_send_bytes_per_sec: u32,
    spent_in_window: u64,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(max_send_bytes_per_sec: u32) -> Self {
        Self {
            max_send_bytes_per_sec,
            spent_in_window: 0,
            window_start: Instant::now(),
        }
    }

    /// Whether `size` bytes fit in the current one-second window
    pub fn is_valid_to_pop(&mut self, size: usize) -> bool {
        self.refill();
        self.spent_in_window + size as u64 <= self.max_send_bytes_per_sec as u64
    }

    /// Deduct `size` bytes from the window
    pub fn post_pop(&mut self, size: usize) {
        self.spent_in_window += size as u64;
    }

    fn refill(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.window_start).as_secs() >= 1 {
            self.window_start = now;
            self.spent_in_window = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_tokens_gate_pop() {
        let limiter = ConcurrencyLimiter::new("region", 2);
        assert!(limiter.is_valid_to_pop());
        limiter.post_pop();
        limiter.post_pop();
        assert!(!limiter.is_valid_to_pop());
        limiter.on_send_done();
        assert!(limiter.is_valid_to_pop());
    }

    #[test]
    fn failure_halves_and_success_climbs() {
        let limiter = ConcurrencyLimiter::new("region", 8);
        limiter.on_fail();
        assert_eq!(limiter.current_limit(), 4);
        limiter.on_fail();
        limiter.on_fail();
        limiter.on_fail();
        assert_eq!(limiter.current_limit(), 1);
        limiter.on_success();
        assert_eq!(limiter.current_limit(), 2);
        for _ in 0..10 {
            limiter.on_success();
        }
        assert_eq!(limiter.current_limit(), 8);
    }

    #[test]
    fn rate_budget_spends_within_one_window() {
        let mut limiter = RateLimiter::new(100);
        assert!(limiter.is_valid_to_pop(60));
        limiter.post_pop(60);
        assert!(limiter.is_valid_to_pop(40));
        limiter.post_pop(40);
        assert!(!limiter.is_valid_to_pop(1));
    }
}

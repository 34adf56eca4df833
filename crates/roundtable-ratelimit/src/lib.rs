//! Per-key rate limiting for bursty operations.
//!
//! Used at the HTTP entry points (register, login, create room, join
//! room, keyed by client IP) and for WebSocket chat (keyed by the IP
//! captured at upgrade time). Single-instance only; a multi-instance
//! deployment would swap [`SlidingWindow`] for a shared backend behind
//! the same [`Limiter`] trait.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Seconds until the key has room again; `0` means "omit the
    /// Retry-After header".
    pub retry_after_secs: u64,
}

impl Decision {
    pub const ALLOW: Decision = Decision {
        allowed: true,
        retry_after_secs: 0,
    };
}

/// Decides whether a request from `key` should be admitted.
pub trait Limiter: Send + Sync {
    fn allow(&self, key: &str) -> Decision;
}

/// Admits everything. Used when rate limiting is disabled.
pub struct Noop;

impl Limiter for Noop {
    fn allow(&self, _key: &str) -> Decision {
        Decision::ALLOW
    }
}

type Clock = Box<dyn Fn() -> Instant + Send + Sync>;

/// In-memory sliding-window limiter: up to `limit` events per `window`
/// per key.
pub struct SlidingWindow {
    entries: Mutex<HashMap<String, Vec<Instant>>>,
    limit: usize,
    window: Duration,
    clock: Clock,
}

impl SlidingWindow {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            limit,
            window,
            clock: Box::new(Instant::now),
        }
    }

    /// Replaces the clock source. Test hook.
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> Instant + Send + Sync + 'static,
    ) -> Self {
        self.clock = Box::new(clock);
        self
    }
}

impl Limiter for SlidingWindow {
    fn allow(&self, key: &str) -> Decision {
        let now = (self.clock)();
        let mut entries = self.entries.lock().expect("limiter mutex poisoned");
        let times = entries.entry(key.to_string()).or_default();

        // Drop events that have slid out of the window.
        times.retain(|t| now.duration_since(*t) < self.window);

        if times.len() >= self.limit {
            let oldest = times[0];
            let retry_after = self
                .window
                .checked_sub(now.duration_since(oldest))
                .unwrap_or_default();
            let retry_after_secs = retry_after.as_secs().max(1);
            return Decision {
                allowed: false,
                retry_after_secs,
            };
        }

        times.push(now);
        Decision::ALLOW
    }
}

// =========================================================================
// Tests
// =========================================================================

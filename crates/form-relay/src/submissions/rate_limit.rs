use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::RateLimitConfig;

/// Table size at which expired windows become eligible for eviction.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Time until the current window closes.
    pub reset_after: Duration,
}

/// Per-client admission control. The check and the count are one atomic step.
#[async_trait]
pub trait RateLimiter: Send + Sync + 'static {
    async fn check(&self, identity: &str) -> RateLimitDecision;
}

struct Window {
    started: Instant,
    count: u32,
}

#[derive(Default)]
struct WindowTable {
    entries: HashMap<String, Window>,
    /// Sweeps run at most once per window length.
    next_sweep: Option<Instant>,
}

impl WindowTable {
    /// Drops expired windows once the table is large.
    fn sweep(&mut self, now: Instant, span: Duration) {
        if self.entries.len() < PRUNE_THRESHOLD {
            return;
        }
        if self.next_sweep.is_some_and(|next| now < next) {
            return;
        }

        let before = self.entries.len();
        self.entries
            .retain(|_, window| now.saturating_duration_since(window.started) < span);
        self.next_sweep = Some(now + span);
        debug!(
            evicted = before - self.entries.len(),
            live = self.entries.len(),
            "pruned expired rate limit windows"
        );
    }
}

/// Fixed-window counter keyed by client identity, held in process memory.
pub struct FixedWindowRateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<WindowTable>,
}

impl FixedWindowRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: config.window,
            windows: Mutex::new(WindowTable::default()),
        }
    }

    pub async fn check_at(&self, identity: &str, now: Instant) -> RateLimitDecision {
        let mut table = self.windows.lock().await;
        table.sweep(now, self.window);

        let window = table
            .entries
            .entry(identity.to_string())
            .or_insert(Window {
                started: now,
                count: 0,
            });

        if now.saturating_duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }

        let reset_after = self
            .window
            .saturating_sub(now.saturating_duration_since(window.started));

        if window.count >= self.max_requests {
            debug!(identity, count = window.count, "rate limit window exhausted");
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_after,
            };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: self.max_requests - window.count,
            reset_after,
        }
    }

    #[cfg(test)]
    pub(crate) async fn tracked_identities(&self) -> usize {
        self.windows.lock().await.entries.len()
    }
}

#[async_trait]
impl RateLimiter for FixedWindowRateLimiter {
    async fn check(&self, identity: &str) -> RateLimitDecision {
        self.check_at(identity, Instant::now()).await
    }
}

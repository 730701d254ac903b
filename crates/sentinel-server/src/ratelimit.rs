//! Per-key sliding-window rate limiter.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_window: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 60,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// Over budget; retry after the given wait.
    Limited { retry_after: Duration },
}

impl RateDecision {
    /// Retry-After header value: wait rounded up to a whole positive second.
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            RateDecision::Allowed => 0,
            RateDecision::Limited { retry_after } => {
                let secs = retry_after.as_secs_f64().ceil() as u64;
                secs.max(1)
            }
        }
    }
}

/// In-memory sliding window over request timestamps, independent per key.
///
/// One lock guards the whole map; the critical section is a few deque
/// operations, so concurrent contenders on the same key see exactly the
/// configured allowance and distinct keys do not starve each other.
pub struct SlidingWindowLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt for `key` and decide whether it is within budget.
    pub fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.entry(key.to_string()).or_default();

        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= self.config.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < self.config.requests_per_window {
            window.push_back(now);
            return RateDecision::Allowed;
        }

        // The oldest in-window attempt is the next slot to free up.
        let retry_after = window
            .front()
            .map(|oldest| self.config.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(self.config.window);
        RateDecision::Limited { retry_after }
    }

    /// Drop keys whose entire window has passed.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.retain(|_, window| {
            window
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < self.config.window)
        });
    }

    /// Number of tracked keys (post-sweep housekeeping metric).
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Background sweep retiring stale windows.
pub fn spawn_sweeper(
    limiter: Arc<SlidingWindowLimiter>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        loop {
            tick.tick().await;
            limiter.sweep();
        }
    })
}

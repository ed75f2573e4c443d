//! Sliding-window rate limiter with a bounded burst allowance.
//!
//! Each provider client owns one [`RateLimiter`]. State is per instance and
//! per process; nothing is shared between clients.
//!
//! # Admission
//!
//! ```text
//! fewer than max_requests in the trailing window ──► admit now      (Immediate)
//! window full, burst_count < burst_capacity      ──► wait, admit   (Burst)
//! window full, burst allowance used up           ──► wait, admit   (Overflow)
//! ```
//!
//! The burst allowance refills every [`BURST_PERIOD`]. Past the allowance the
//! limiter still admits after waiting: it never refuses a caller.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Interval after which the burst counter resets.
pub const BURST_PERIOD: Duration = Duration::from_secs(60);

/// Added to computed waits so the oldest timestamp has left the window on wake.
const SETTLE_MARGIN: Duration = Duration::from_millis(10);

/// How a call to [`RateLimiter::acquire`] was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The window had room; no suspension.
    Immediate,
    /// Waited for the window to slide, charged to the burst allowance.
    Burst,
    /// Waited for the window to slide after the burst allowance ran out.
    Overflow,
}

/// Point-in-time view of limiter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterState {
    /// Admissions still inside the trailing window.
    pub recent_requests: usize,
    /// Burst admissions used in the current burst period.
    pub burst_count: u32,
}

#[derive(Debug)]
struct WindowState {
    recent: VecDeque<Instant>,
    burst_count: u32,
    burst_window_start: Instant,
}

impl WindowState {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.recent.front() {
            if now.duration_since(oldest) >= window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Throttles outbound calls to one upstream.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(WindowState {
                recent: VecDeque::new(),
                burst_count: 0,
                burst_window_start: Instant::now(),
            }),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Suspend until one request may be issued, then record it.
    ///
    /// Never fails. The internal lock is held across the wait, so concurrent
    /// callers are admitted one at a time in arrival order.
    pub async fn acquire(&self) -> Admission {
        let window = self.config.time_window;
        if window.is_zero() {
            return Admission::Immediate;
        }

        let mut state = self.state.lock().await;
        let now = Instant::now();

        if now.duration_since(state.burst_window_start) > BURST_PERIOD {
            state.burst_count = 0;
            state.burst_window_start = now;
        }

        state.prune(now, window);

        if state.recent.len() < self.config.max_requests {
            state.recent.push_back(now);
            return Admission::Immediate;
        }

        let elapsed = state
            .recent
            .front()
            .map_or(Duration::ZERO, |oldest| now.duration_since(*oldest));
        let wait = (window.saturating_sub(elapsed) + SETTLE_MARGIN).min(window);

        let admission = if state.burst_count < self.config.burst_capacity {
            state.burst_count += 1;
            Admission::Burst
        } else {
            Admission::Overflow
        };

        tracing::debug!(
            wait_ms = wait.as_millis() as u64,
            ?admission,
            burst_count = state.burst_count,
            "rate limit window full, waiting"
        );
        if admission == Admission::Overflow {
            tracing::warn!(
                burst_capacity = self.config.burst_capacity,
                "burst allowance exhausted, admitting after wait"
            );
        }

        tokio::time::sleep(wait).await;

        let admitted_at = Instant::now();
        state.prune(admitted_at, window);
        state.recent.push_back(admitted_at);
        admission
    }

    /// Snapshot of the current window and burst counters.
    pub async fn snapshot(&self) -> RateLimiterState {
        let mut state = self.state.lock().await;
        if !self.config.time_window.is_zero() {
            state.prune(Instant::now(), self.config.time_window);
        }
        RateLimiterState {
            recent_requests: state.recent.len(),
            burst_count: state.burst_count,
        }
    }
}

//! Sliding-window rate limiting for the chat handler (§4.7).
//!
//! Structurally grounded on `summit-services::qos`'s per-session throttle
//! (a small struct plus an `allow()`-style check, tested by name for each
//! boundary condition) — the algorithm itself is the spec's sliding
//! time-window, not the teacher's token bucket, since a bucket does not
//! reproduce the "13th message within 5s is dropped, resets continuously"
//! semantics §4.7 and §8 require.

use std::time::{Duration, Instant};

/// Width of the sliding window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_millis(5_000);
/// Maximum sends allowed inside the window before the sender is throttled.
pub const RATE_LIMIT_MAX: usize = 12;

/// A per-session sliding window of recent chat-send timestamps.
#[derive(Default)]
pub struct RateWindow {
    timestamps: Vec<Instant>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `now`, drops entries older than [`RATE_LIMIT_WINDOW`], and
    /// reports whether this send is still within the allowed rate. Mutates
    /// the window either way — the limiter's drop decision does not undo the
    /// append, matching the "liveness refreshed regardless of outcome" rule
    /// this crate's sibling call (`Session::touch`) also follows.
    pub fn record(&mut self, now: Instant) -> bool {
        self.timestamps.push(now);
        self.timestamps
            .retain(|&t| now.saturating_duration_since(t) <= RATE_LIMIT_WINDOW);
        self.timestamps.len() <= RATE_LIMIT_MAX
    }
}

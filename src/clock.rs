/// Session clock module
///
/// Millisecond timestamps for gating and debouncing. Anchored to the UNIX
/// epoch when the session starts, advanced by a monotonic `Instant` so values
/// never decrease even if the wall clock is adjusted mid-session.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Milliseconds since the UNIX epoch (production) or an arbitrary origin
/// (tests drive gates and triggers with hand-picked values).
pub type TimestampMs = u64;

/// Monotonic, epoch-anchored session clock.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    anchor_ms: u64,
    origin: Instant,
}

impl SessionClock {
    /// Create a clock anchored to the current wall-clock time.
    pub fn new() -> Self {
        let anchor_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            anchor_ms,
            origin: Instant::now(),
        }
    }

    /// Current session time in milliseconds.
    pub fn now_ms(&self) -> TimestampMs {
        self.anchor_ms + self.origin.elapsed().as_millis() as u64
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

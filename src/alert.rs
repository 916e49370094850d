/// Alert trigger module
///
/// Debounced haptic alarm: fires when both detectors agree and the cooldown
/// window since the previous alert has passed. Pure timestamp comparison;
/// the only persistent state is the last-alert time inside `DetectionState`.

use crate::clock::TimestampMs;
use crate::services::{HapticPulse, HapticSink};
use crate::state::DetectionState;
use tracing::{debug, info};

/// Default minimum spacing between two alerts.
pub const DEFAULT_ALERT_COOLDOWN_MS: u64 = 2_000;

/// Number of silence/buzz pairs in the alarm waveform.
const ALARM_PULSE_PAIRS: usize = 6;

/// Silent lead-in of each pair.
const ALARM_PAUSE_MS: u64 = 116;

/// Buzz segment of each pair.
const ALARM_BUZZ_MS: u64 = 216;

/// Buzz amplitude (0-255 scale).
const ALARM_AMPLITUDE: u8 = 200;

/// The fixed alarm waveform: six 116 ms gaps alternating with six 216 ms
/// buzzes at amplitude 200, delivered as one parallel pattern.
pub fn alarm_waveform() -> Vec<HapticPulse> {
    let mut pattern = Vec::with_capacity(ALARM_PULSE_PAIRS * 2);

    for _ in 0..ALARM_PULSE_PAIRS {
        pattern.push(HapticPulse {
            duration_ms: ALARM_PAUSE_MS,
            amplitude: 0,
        });
        pattern.push(HapticPulse {
            duration_ms: ALARM_BUZZ_MS,
            amplitude: ALARM_AMPLITUDE,
        });
    }

    pattern
}

/// Debounced alarm evaluation.
pub struct AlertTrigger {
    cooldown_ms: u64,
}

impl AlertTrigger {
    pub fn new(cooldown_ms: u64) -> Self {
        Self { cooldown_ms }
    }

    /// Evaluate the fused state at `now` and fire the alarm if it qualifies.
    ///
    /// Fires iff a present person is snoring and more than the cooldown has
    /// passed since the last alert. Records the alert time on firing.
    pub fn evaluate(
        &self,
        state: &mut DetectionState,
        now: TimestampMs,
        haptics: &dyn HapticSink,
    ) -> bool {
        if !state.person_present() || !state.snoring_detected() {
            return false;
        }

        let since_last = now.saturating_sub(state.last_alert_ms());
        if since_last <= self.cooldown_ms {
            debug!(
                "alert suppressed: {} ms since last alert (cooldown {} ms)",
                since_last, self.cooldown_ms
            );
            return false;
        }

        info!("snoring sleeper confirmed, firing haptic alarm at {} ms", now);
        haptics.vibrate(&alarm_waveform());
        state.record_alert(now);
        true
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms
    }
}

impl Default for AlertTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_COOLDOWN_MS)
    }
}

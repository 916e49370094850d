/// Shared detection state module
///
/// The single record both detector feeds write into and the alert trigger
/// reads. Owned exclusively by the fusion engine and mutated only through
/// accessors, so every update is sequenced by the engine's event loop.

use crate::clock::TimestampMs;

/// Latest fused detection flags plus the last alert time.
#[derive(Debug)]
pub struct DetectionState {
    person_present: bool,
    snoring_detected: bool,
    last_alert_ms: TimestampMs,
}

impl DetectionState {
    /// Fresh session state: nothing detected, last alert at epoch zero so
    /// the first qualifying detection alerts immediately.
    pub fn new() -> Self {
        Self {
            person_present: false,
            snoring_detected: false,
            last_alert_ms: 0,
        }
    }

    /// True iff the most recent vision result contained a person box.
    pub fn person_present(&self) -> bool {
        self.person_present
    }

    /// True iff the most recent applied audio score exceeded the threshold.
    pub fn snoring_detected(&self) -> bool {
        self.snoring_detected
    }

    /// Time of the last haptic alert fired.
    pub fn last_alert_ms(&self) -> TimestampMs {
        self.last_alert_ms
    }

    /// Record the latest person-presence observation.
    ///
    /// Returns true when the stored value changed.
    pub fn set_person_present(&mut self, detected: bool) -> bool {
        let changed = self.person_present != detected;
        self.person_present = detected;
        changed
    }

    /// Record the latest snoring decision.
    ///
    /// Returns true when the stored value changed.
    pub fn set_snoring_detected(&mut self, detected: bool) -> bool {
        let changed = self.snoring_detected != detected;
        self.snoring_detected = detected;
        changed
    }

    /// Force the snoring flag off. Called whenever the audio loop stops so a
    /// stale "detected" never survives a pause.
    pub fn clear_snoring(&mut self) -> bool {
        self.set_snoring_detected(false)
    }

    /// Record an alert time. Clamped so the stored value never decreases
    /// within a session.
    pub fn record_alert(&mut self, at: TimestampMs) {
        self.last_alert_ms = self.last_alert_ms.max(at);
    }

    /// Copy of the two flags for UI rendering.
    pub fn snapshot(&self) -> DetectionSnapshot {
        DetectionSnapshot {
            person_present: self.person_present,
            snoring_detected: self.snoring_detected,
        }
    }
}

impl Default for DetectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable view of the detection flags handed to the UI sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionSnapshot {
    pub person_present: bool,
    pub snoring_detected: bool,
}

impl DetectionSnapshot {
    /// Both modalities agree: a present person is snoring.
    pub fn is_active(&self) -> bool {
        self.person_present && self.snoring_detected
    }
}

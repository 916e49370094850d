/// Person detection gate module
///
/// Rate-limits camera frames into the vision detector and extracts the
/// person-presence flag from detection results. The gate is a timestamp
/// comparison, never a sleep, so the caller's loop is free to keep draining
/// frames between submissions.

use crate::clock::TimestampMs;
use tracing::trace;

/// Default interval between vision inference submissions.
pub const DEFAULT_DETECT_INTERVAL_MS: u64 = 1_000;

/// Axis-aligned box in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// One label hypothesis for a detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub label: String,
    pub score: f32,
}

impl Category {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// One detected object: a box plus its category hypotheses ordered by
/// descending score. The first entry is the dominant label.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub categories: Vec<Category>,
}

impl Detection {
    /// Dominant category label, if the detector produced any.
    pub fn top_label(&self) -> Option<&str> {
        self.categories.first().map(|c| c.label.as_str())
    }
}

/// True iff some detection's dominant category carries the person label.
pub fn contains_person(detections: &[Detection], person_label: &str) -> bool {
    detections
        .iter()
        .any(|d| d.top_label() == Some(person_label))
}

/// Submission gate for the vision detector.
///
/// Lets at most one frame through per interval; intervening frames are
/// discarded. The first frame of a session always goes through.
#[derive(Debug)]
pub struct FrameGate {
    interval_ms: u64,
    last_submit: Option<TimestampMs>,
}

impl FrameGate {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_submit: None,
        }
    }

    /// Decide whether the frame arriving at `now` should be submitted for
    /// inference. Records the submission time when it answers true.
    pub fn should_submit(&mut self, now: TimestampMs) -> bool {
        match self.last_submit {
            Some(last) if now.saturating_sub(last) < self.interval_ms => {
                trace!("frame at {} ms gated ({} ms since last submit)", now, now.saturating_sub(last));
                false
            }
            _ => {
                self.last_submit = Some(now);
                true
            }
        }
    }

    /// Forget submission history (session detach).
    pub fn reset(&mut self) {
        self.last_submit = None;
    }
}

impl Default for FrameGate {
    fn default() -> Self {
        Self::new(DEFAULT_DETECT_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(labels: &[(&str, f32)]) -> Detection {
        Detection {
            bounding_box: BoundingBox {
                left: 0.0,
                top: 0.0,
                right: 10.0,
                bottom: 10.0,
            },
            categories: labels
                .iter()
                .map(|(label, score)| Category::new(*label, *score))
                .collect(),
        }
    }

    #[test]
    fn test_gate_passes_first_frame() {
        let mut gate = FrameGate::new(1_000);
        assert!(gate.should_submit(0));
    }

    #[test]
    fn test_gate_drops_frames_within_interval() {
        // Arrivals at 0, 400, 900, 1100 ms submit exactly twice: 0 and 1100.
        let mut gate = FrameGate::new(1_000);

        let submissions: Vec<bool> = [0, 400, 900, 1_100]
            .iter()
            .map(|&t| gate.should_submit(t))
            .collect();

        assert_eq!(submissions, vec![true, false, false, true]);
    }

    #[test]
    fn test_gate_measures_from_last_submission() {
        let mut gate = FrameGate::new(1_000);

        assert!(gate.should_submit(0));
        assert!(!gate.should_submit(999));
        assert!(gate.should_submit(1_000));
        // The 999 ms drop did not move the window.
        assert!(!gate.should_submit(1_999));
        assert!(gate.should_submit(2_000));
    }

    #[test]
    fn test_gate_reset_reopens() {
        let mut gate = FrameGate::new(1_000);

        assert!(gate.should_submit(500));
        assert!(!gate.should_submit(600));

        gate.reset();
        assert!(gate.should_submit(700));
    }

    #[test]
    fn test_contains_person_on_dominant_label() {
        let results = vec![
            detection(&[("chair", 0.9), ("person", 0.4)]),
            detection(&[("person", 0.8), ("mannequin", 0.3)]),
        ];

        assert!(contains_person(&results, "person"));
    }

    #[test]
    fn test_contains_person_ignores_secondary_labels() {
        // A person hypothesis that is not the dominant category does not count.
        let results = vec![detection(&[("chair", 0.9), ("person", 0.7)])];

        assert!(!contains_person(&results, "person"));
    }

    #[test]
    fn test_contains_person_empty_cases() {
        assert!(!contains_person(&[], "person"));

        let no_categories = vec![Detection {
            bounding_box: BoundingBox {
                left: 0.0,
                top: 0.0,
                right: 1.0,
                bottom: 1.0,
            },
            categories: Vec::new(),
        }];
        assert!(!contains_person(&no_categories, "person"));
    }
}

/// Audio detection gate module
///
/// The snoring classifier only runs while a person is in frame. This gate is
/// the Idle/Running state machine that starts and stops the classification
/// loop as the person flag changes, and turns raw likelihood scores into the
/// boolean snoring decision.

use crate::services::InferenceControl;
use tracing::{debug, trace};

/// Default decision threshold on the [0, 1] snoring likelihood score.
pub const DEFAULT_SNORE_THRESHOLD: f32 = 0.5;

/// Gate state for the audio classification loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioGateState {
    /// Loop stopped; incoming scores are stale and dropped.
    Idle,

    /// Loop running; scores are thresholded into the snoring flag.
    Running,
}

/// Conditional enable for the audio classification loop.
pub struct AudioGate {
    threshold: f32,
    state: AudioGateState,
}

impl AudioGate {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            state: AudioGateState::Idle,
        }
    }

    pub fn state(&self) -> AudioGateState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == AudioGateState::Running
    }

    /// Ensure the classification loop is running. No-op when it already is.
    ///
    /// Returns true when this call performed the Idle -> Running transition.
    pub fn engage(&mut self, control: &dyn InferenceControl) -> bool {
        if self.state == AudioGateState::Running {
            trace!("audio gate already running");
            return false;
        }

        control.start();
        self.state = AudioGateState::Running;
        debug!("audio gate: Idle -> Running");
        true
    }

    /// Ensure the classification loop is stopped. No-op when already idle.
    ///
    /// Returns true when this call performed the Running -> Idle transition;
    /// the caller must clear the snoring flag on that transition so no stale
    /// "detected" survives.
    pub fn disengage(&mut self, control: &dyn InferenceControl) -> bool {
        if self.state == AudioGateState::Idle {
            trace!("audio gate already idle");
            return false;
        }

        control.stop();
        self.state = AudioGateState::Idle;
        debug!("audio gate: Running -> Idle");
        true
    }

    /// Threshold a classification score into the snoring decision.
    ///
    /// Returns `None` while idle: a score delivered after the loop stopped is
    /// stale and must not touch shared state.
    pub fn process_score(&self, score: f32) -> Option<bool> {
        match self.state {
            AudioGateState::Idle => None,
            AudioGateState::Running => Some(score > self.threshold),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

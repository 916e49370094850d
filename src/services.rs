/// Collaborator interfaces
///
/// The fusion core touches nothing platform-specific directly: camera frames,
/// microphone chunks, model inference, the vibration motor, and the UI are
/// all reached through these traits. Production wires in real backends;
/// the demo binary and tests wire in the synthetic ones from `sim`.

use crate::state::DetectionSnapshot;
use crate::vision::Detection;
use async_trait::async_trait;
use thiserror::Error;

/// Audio sample format (16-bit PCM, mono).
pub type AudioSample = i16;

#[derive(Error, Debug)]
pub enum InferenceError {
    /// Model failed to load at session start. Fatal to that modality for the
    /// whole session; the other modality keeps operating.
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    /// A single inference attempt failed. Reported once and dropped; the next
    /// attempt proceeds independently.
    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// One camera frame in RGBA8888, plus the rotation the analyzer reported.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rotation_degrees: i32,
    pub rgba: Vec<u8>,
}

impl Frame {
    /// Byte length a well-formed RGBA buffer must have.
    pub fn expected_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Vision inference service: one frame in, labeled boxes out.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, InferenceError>;
}

/// Audio inference service: one chunk in, snoring likelihood in [0, 1] out.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn classify(&self, samples: &[AudioSample]) -> Result<f32, InferenceError>;
}

/// Stream of camera frames. `None` ends the session input.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Option<Frame>;
}

/// Stream of microphone chunks. `None` ends the session input.
#[async_trait]
pub trait AudioSource: Send {
    async fn next_chunk(&mut self) -> Option<Vec<AudioSample>>;
}

/// Start/stop surface of an inference loop.
///
/// Both operations are idempotent no-ops when the loop is already in the
/// requested state. The audio gate drives its loop through this, and
/// pause/resume drives both loops.
#[cfg_attr(test, mockall::automock)]
pub trait InferenceControl: Send + Sync {
    fn start(&self);
    fn stop(&self);
    fn is_running(&self) -> bool;
}

/// One step of a vibration waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HapticPulse {
    pub duration_ms: u64,
    pub amplitude: u8,
}

/// Haptic output service.
#[cfg_attr(test, mockall::automock)]
pub trait HapticSink: Send + Sync {
    fn vibrate(&self, pattern: &[HapticPulse]);
}

/// UI rendering service. Receives the fused flags for text/color updates,
/// raw boxes for overlay drawing, and one-shot transient-error notices.
#[cfg_attr(test, mockall::automock)]
pub trait UiSink: Send + Sync {
    fn render(&self, snapshot: DetectionSnapshot);
    fn render_overlay(&self, detections: &[Detection]);
    fn notify(&self, message: &str);
}

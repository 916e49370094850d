/// Simulation module
///
/// Deterministic stand-ins for the real capture and inference hardware:
/// synthetic detector backends, scripted sources, and recording sinks. The
/// demo binary and the integration tests run entire sessions on these
/// without a camera, microphone, or model file anywhere near the process.

use crate::services::{
    AudioBackend, AudioSample, AudioSource, Frame, FrameSource, HapticPulse, HapticSink,
    InferenceError, UiSink, VisionBackend,
};
use crate::state::DetectionSnapshot;
use crate::vision::{BoundingBox, Category, Detection};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

const SAMPLE_RATE_HZ: u32 = 16_000;
const SNORE_TONE_HZ: f32 = 90.0;

/// Brightness-keyed person detector.
///
/// Treats mean luminance as presence: a lit subject in frame reads bright,
/// an empty dark room reads near black. Good enough to drive every state
/// transition the fusion engine has.
pub struct SyntheticPersonDetector {
    luminance_threshold: f32,
}

impl SyntheticPersonDetector {
    pub fn new(luminance_threshold: f32) -> Self {
        Self {
            luminance_threshold,
        }
    }
}

impl Default for SyntheticPersonDetector {
    fn default() -> Self {
        Self::new(0.25)
    }
}

#[async_trait]
impl VisionBackend for SyntheticPersonDetector {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, InferenceError> {
        if frame.rgba.len() != frame.expected_bytes() {
            return Err(InferenceError::InvalidInput(format!(
                "frame buffer is {} bytes, expected {}",
                frame.rgba.len(),
                frame.expected_bytes()
            )));
        }
        if frame.width == 0 || frame.height == 0 {
            return Err(InferenceError::InvalidInput(
                "frame has zero dimensions".to_string(),
            ));
        }

        let mut sum = 0.0f64;
        for pixel in frame.rgba.chunks_exact(4) {
            let r = pixel[0] as f64;
            let g = pixel[1] as f64;
            let b = pixel[2] as f64;
            sum += 0.299 * r + 0.587 * g + 0.114 * b;
        }
        let pixels = (frame.width * frame.height) as f64;
        let luminance = (sum / pixels / 255.0) as f32;

        if luminance < self.luminance_threshold {
            return Ok(Vec::new());
        }

        let w = frame.width as f32;
        let h = frame.height as f32;
        Ok(vec![Detection {
            bounding_box: BoundingBox {
                left: w * 0.25,
                top: h * 0.1,
                right: w * 0.75,
                bottom: h * 0.9,
            },
            categories: vec![Category::new("person", luminance.clamp(0.0, 1.0))],
        }])
    }
}

/// Energy-keyed snore classifier: normalized RMS mapped onto [0, 1].
pub struct EnergySnoreClassifier {
    full_score_rms: f32,
}

impl EnergySnoreClassifier {
    pub fn new(full_score_rms: f32) -> Self {
        Self { full_score_rms }
    }
}

impl Default for EnergySnoreClassifier {
    fn default() -> Self {
        // A half-scale tone lands at full score.
        Self::new(0.35)
    }
}

#[async_trait]
impl AudioBackend for EnergySnoreClassifier {
    async fn classify(&self, samples: &[AudioSample]) -> Result<f32, InferenceError> {
        if samples.is_empty() {
            return Err(InferenceError::InvalidInput(
                "empty audio chunk".to_string(),
            ));
        }

        let sum_squares: f64 = samples
            .iter()
            .map(|&s| {
                let normalized = s as f64 / i16::MAX as f64;
                normalized * normalized
            })
            .sum();
        let rms = (sum_squares / samples.len() as f64).sqrt() as f32;

        Ok((rms / self.full_score_rms).clamp(0.0, 1.0))
    }
}

/// Backend that fails every inference. For exercising the fail-open path.
pub struct FailingVisionBackend {
    message: String,
}

impl FailingVisionBackend {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl VisionBackend for FailingVisionBackend {
    async fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, InferenceError> {
        Err(InferenceError::Inference(self.message.clone()))
    }
}

pub struct FailingAudioBackend {
    message: String,
}

impl FailingAudioBackend {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl AudioBackend for FailingAudioBackend {
    async fn classify(&self, _samples: &[AudioSample]) -> Result<f32, InferenceError> {
        Err(InferenceError::Inference(self.message.clone()))
    }
}

/// Frame source that replays a fixed sequence, optionally paced to mimic a
/// real camera's frame rate.
pub struct ScriptedFrameSource {
    frames: VecDeque<Frame>,
    pacing: Option<Duration>,
}

impl ScriptedFrameSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
            pacing: None,
        }
    }

    pub fn with_pacing(frames: Vec<Frame>, pacing: Duration) -> Self {
        Self {
            frames: frames.into(),
            pacing: Some(pacing),
        }
    }
}

#[async_trait]
impl FrameSource for ScriptedFrameSource {
    async fn next_frame(&mut self) -> Option<Frame> {
        if let Some(pacing) = self.pacing {
            tokio::time::sleep(pacing).await;
        }
        self.frames.pop_front()
    }
}

/// Audio source that replays fixed chunks, optionally paced like a capture
/// buffer filling in real time.
pub struct ScriptedAudioSource {
    chunks: VecDeque<Vec<AudioSample>>,
    pacing: Option<Duration>,
}

impl ScriptedAudioSource {
    pub fn new(chunks: Vec<Vec<AudioSample>>) -> Self {
        Self {
            chunks: chunks.into(),
            pacing: None,
        }
    }

    pub fn with_pacing(chunks: Vec<Vec<AudioSample>>, pacing: Duration) -> Self {
        Self {
            chunks: chunks.into(),
            pacing: Some(pacing),
        }
    }
}

#[async_trait]
impl AudioSource for ScriptedAudioSource {
    async fn next_chunk(&mut self) -> Option<Vec<AudioSample>> {
        if let Some(pacing) = self.pacing {
            tokio::time::sleep(pacing).await;
        }
        self.chunks.pop_front()
    }
}

/// Uniformly lit frame bright enough to read as a person in view.
pub fn bright_frame(width: u32, height: u32) -> Frame {
    solid_frame(width, height, 230)
}

/// Near-black frame: empty room.
pub fn dark_frame(width: u32, height: u32) -> Frame {
    solid_frame(width, height, 18)
}

fn solid_frame(width: u32, height: u32, gray: u8) -> Frame {
    let pixels = (width * height) as usize;
    let mut rgba = Vec::with_capacity(pixels * 4);
    for _ in 0..pixels {
        rgba.extend_from_slice(&[gray, gray, gray, 255]);
    }
    Frame {
        width,
        height,
        rotation_degrees: 0,
        rgba,
    }
}

/// Low rumbling tone loud enough to score as snoring.
pub fn snore_chunk(duration_ms: u64) -> Vec<AudioSample> {
    tone_chunk(SNORE_TONE_HZ, 12_000.0, duration_ms)
}

/// Faint room tone that scores well under any sane threshold.
pub fn quiet_chunk(duration_ms: u64) -> Vec<AudioSample> {
    tone_chunk(440.0, 300.0, duration_ms)
}

fn tone_chunk(frequency: f32, amplitude: f32, duration_ms: u64) -> Vec<AudioSample> {
    let num_samples = (SAMPLE_RATE_HZ as u64 * duration_ms / 1000) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE_HZ as f32;
            ((2.0 * std::f32::consts::PI * frequency * t).sin() * amplitude) as i16
        })
        .collect()
}

/// Haptic sink that narrates patterns to the log instead of buzzing.
pub struct LogHapticMotor;

impl HapticSink for LogHapticMotor {
    fn vibrate(&self, pattern: &[HapticPulse]) {
        let total_ms: u64 = pattern.iter().map(|p| p.duration_ms).sum();
        info!(
            "vibrating: {} pulses over {} ms",
            pattern.len(),
            total_ms
        );
    }
}

/// UI sink that narrates to the log.
pub struct LogUi;

impl UiSink for LogUi {
    fn render(&self, snapshot: DetectionSnapshot) {
        debug!(
            "display: person={} snoring={}",
            snapshot.person_present, snapshot.snoring_detected
        );
    }

    fn render_overlay(&self, detections: &[Detection]) {
        debug!("overlay: {} detections", detections.len());
    }

    fn notify(&self, message: &str) {
        warn!("notice: {}", message);
    }
}

/// Haptic sink that records every pattern it is asked to play.
#[derive(Default)]
pub struct RecordingHaptics {
    patterns: Mutex<Vec<Vec<HapticPulse>>>,
}

impl RecordingHaptics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.lock().unwrap().len()
    }

    pub fn patterns(&self) -> Vec<Vec<HapticPulse>> {
        self.patterns.lock().unwrap().clone()
    }
}

impl HapticSink for RecordingHaptics {
    fn vibrate(&self, pattern: &[HapticPulse]) {
        self.patterns.lock().unwrap().push(pattern.to_vec());
    }
}

/// UI sink that records snapshots and notices.
#[derive(Default)]
pub struct RecordingUi {
    snapshots: Mutex<Vec<DetectionSnapshot>>,
    notices: Mutex<Vec<String>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<DetectionSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn last_snapshot(&self) -> Option<DetectionSnapshot> {
        self.snapshots.lock().unwrap().last().copied()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl UiSink for RecordingUi {
    fn render(&self, snapshot: DetectionSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot);
    }

    fn render_overlay(&self, _detections: &[Detection]) {}

    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DEFAULT_SNORE_THRESHOLD;
    use approx::assert_relative_eq;

    #[tokio::test]
    async fn test_bright_frame_reads_as_person() {
        let detector = SyntheticPersonDetector::default();
        let detections = detector.detect(&bright_frame(32, 32)).await.unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].top_label(), Some("person"));
        assert_relative_eq!(
            detections[0].categories[0].score,
            230.0 / 255.0,
            epsilon = 0.01
        );
    }

    #[tokio::test]
    async fn test_dark_frame_reads_as_empty() {
        let detector = SyntheticPersonDetector::default();
        let detections = detector.detect(&dark_frame(32, 32)).await.unwrap();
        assert!(detections.is_empty());
    }

    #[tokio::test]
    async fn test_truncated_frame_is_rejected() {
        let detector = SyntheticPersonDetector::default();
        let mut frame = bright_frame(8, 8);
        frame.rgba.truncate(10);

        let err = detector.detect(&frame).await.unwrap_err();
        assert!(matches!(err, InferenceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_snore_chunk_crosses_default_threshold() {
        let classifier = EnergySnoreClassifier::default();

        let loud = classifier.classify(&snore_chunk(100)).await.unwrap();
        let quiet = classifier.classify(&quiet_chunk(100)).await.unwrap();

        assert!(loud > DEFAULT_SNORE_THRESHOLD, "loud score {}", loud);
        assert!(quiet < DEFAULT_SNORE_THRESHOLD, "quiet score {}", quiet);
    }

    #[tokio::test]
    async fn test_empty_chunk_is_rejected() {
        let classifier = EnergySnoreClassifier::default();
        let err = classifier.classify(&[]).await.unwrap_err();
        assert!(matches!(err, InferenceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_scripted_source_replays_in_order() {
        let mut source =
            ScriptedFrameSource::new(vec![bright_frame(4, 4), dark_frame(4, 4)]);

        let first = source.next_frame().await.unwrap();
        assert_eq!(first.rgba[0], 230);
        let second = source.next_frame().await.unwrap();
        assert_eq!(second.rgba[0], 18);
        assert!(source.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_recording_sinks_capture() {
        let haptics = RecordingHaptics::new();
        haptics.vibrate(&[HapticPulse {
            duration_ms: 100,
            amplitude: 200,
        }]);
        assert_eq!(haptics.pattern_count(), 1);
        assert_eq!(haptics.patterns()[0][0].amplitude, 200);

        let ui = RecordingUi::new();
        ui.notify("detector failed");
        assert_eq!(ui.notices(), vec!["detector failed".to_string()]);
    }
}

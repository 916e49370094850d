/// Snore monitoring library
///
/// Fuses two sensing modalities into one alert: a camera-side person
/// detector and a microphone-side snore classifier, joined by an event
/// queue and a single-owner fusion engine. When a person is in frame and
/// snoring at the same time, the engine fires a debounced vibration alarm.
///
/// The heavy edges of the system, capture hardware, inference models, the
/// display, and the vibration motor, sit behind traits so the whole engine
/// runs identically against real devices or the bundled simulation.

pub mod alert;
pub mod audio;
pub mod clock;
pub mod config;
pub mod engine;
pub mod pipeline;
pub mod services;
pub mod session;
pub mod sim;
pub mod state;
pub mod vision;

pub use alert::{alarm_waveform, AlertTrigger, DEFAULT_ALERT_COOLDOWN_MS};
pub use audio::{AudioGate, AudioGateState, DEFAULT_SNORE_THRESHOLD};
pub use clock::{SessionClock, TimestampMs};
pub use config::{ConfigError, MonitorConfig};
pub use engine::{DetectionEvent, EngineStats, FusionEngine};
pub use pipeline::{spawn_audio_pipeline, spawn_vision_pipeline, RunFlag, RunSignal, RunState};
pub use services::{
    AudioBackend, AudioSample, AudioSource, Frame, FrameSource, HapticPulse, HapticSink,
    InferenceControl, InferenceError, UiSink, VisionBackend,
};
pub use session::{start_session, AudioParts, SessionError, SessionHandle, VisionParts};
pub use state::{DetectionSnapshot, DetectionState};
pub use vision::{
    contains_person, BoundingBox, Category, Detection, FrameGate, DEFAULT_DETECT_INTERVAL_MS,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

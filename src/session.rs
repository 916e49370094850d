/// Session module
///
/// Assembles one monitoring session: the fusion engine task, the camera
/// pipeline, and optionally the microphone pipeline, all joined by a single
/// bounded event queue. The handle is the outside world's only way in:
/// lifecycle changes go through it as events, never as direct state access.

use crate::clock::SessionClock;
use crate::config::MonitorConfig;
use crate::engine::{DetectionEvent, EngineStats, FusionEngine};
use crate::pipeline::{spawn_audio_pipeline, spawn_vision_pipeline, RunFlag};
use crate::services::{
    AudioBackend, AudioSource, FrameSource, HapticSink, InferenceControl, UiSink, VisionBackend,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Event queue closed before the session finished")]
    QueueClosed,

    #[error("Session task panicked: {0}")]
    TaskPanicked(String),
}

/// Camera half of a session.
pub struct VisionParts {
    pub source: Box<dyn FrameSource>,
    pub backend: Arc<dyn VisionBackend>,
}

/// Microphone half of a session. Optional: without it the session degrades
/// to person detection only and can never alert.
pub struct AudioParts {
    pub source: Box<dyn AudioSource>,
    pub backend: Arc<dyn AudioBackend>,
}

/// Spawn the engine and pipelines for one session.
///
/// The camera starts immediately; the microphone starts parked and is
/// engaged by the engine the first time a person enters the frame.
pub fn start_session(
    config: &MonitorConfig,
    vision: VisionParts,
    audio: Option<AudioParts>,
    haptics: Arc<dyn HapticSink>,
    ui: Arc<dyn UiSink>,
) -> SessionHandle {
    let clock = SessionClock::new();
    let (events, event_rx) = mpsc::channel(config.event_queue_size);

    let vision_flag = Arc::new(RunFlag::new(true));
    let audio_flag = Arc::new(RunFlag::new(false));

    let engine = FusionEngine::new(
        config,
        Arc::clone(&vision_flag) as Arc<dyn InferenceControl>,
        Arc::clone(&audio_flag) as Arc<dyn InferenceControl>,
        haptics,
        ui,
    );
    let engine_task = tokio::spawn(engine.run(event_rx));

    let vision_task = spawn_vision_pipeline(
        vision.source,
        vision.backend,
        Arc::clone(&vision_flag),
        clock,
        config.detect_interval_ms,
        events.clone(),
    );

    let audio_task = audio.map(|parts| {
        spawn_audio_pipeline(
            parts.source,
            parts.backend,
            Arc::clone(&audio_flag),
            clock,
            events.clone(),
        )
    });

    if audio_task.is_some() {
        info!("session started with camera and microphone");
    } else {
        warn!("session started without audio, degrading to person detection only");
    }

    SessionHandle {
        events,
        vision_flag,
        audio_flag,
        engine_task,
        vision_task,
        audio_task,
    }
}

/// Owner's handle to a running session.
pub struct SessionHandle {
    events: mpsc::Sender<DetectionEvent>,
    vision_flag: Arc<RunFlag>,
    audio_flag: Arc<RunFlag>,
    engine_task: JoinHandle<EngineStats>,
    vision_task: JoinHandle<()>,
    audio_task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Queue a pause. The engine stops both loops and clears the snoring
    /// flag when it gets there; results already in flight are dropped.
    pub async fn pause(&self) -> Result<(), SessionError> {
        self.events
            .send(DetectionEvent::SessionPaused)
            .await
            .map_err(|_| SessionError::QueueClosed)
    }

    /// Queue a resume. The camera restarts; the microphone restarts only if
    /// a person was still in frame when the session paused.
    pub async fn resume(&self) -> Result<(), SessionError> {
        self.events
            .send(DetectionEvent::SessionResumed)
            .await
            .map_err(|_| SessionError::QueueClosed)
    }

    pub fn vision_running(&self) -> bool {
        self.vision_flag.is_running()
    }

    pub fn audio_running(&self) -> bool {
        self.audio_flag.is_running()
    }

    /// Tear the session down and collect its counters. Closing the flags
    /// wakes any parked loop so every task can exit; the engine drains
    /// whatever was already queued before reporting.
    pub async fn shutdown(self) -> Result<EngineStats, SessionError> {
        self.vision_flag.close();
        self.audio_flag.close();
        drop(self.events);

        self.vision_task
            .await
            .map_err(|err| SessionError::TaskPanicked(err.to_string()))?;
        if let Some(task) = self.audio_task {
            task.await
                .map_err(|err| SessionError::TaskPanicked(err.to_string()))?;
        }

        let stats = self
            .engine_task
            .await
            .map_err(|err| SessionError::TaskPanicked(err.to_string()))?;
        info!(
            "session finished: {} alerts, {} vision results, {} audio scores",
            stats.alerts_fired, stats.vision_results, stats.audio_scores_applied
        );
        Ok(stats)
    }
}

/// Detection pipeline module
///
/// Producer loops for the two sensing modalities, plus the watch-backed run
/// flag that starts and stops them. Each pipeline pulls from its source,
/// runs one inference, and forwards one event to the fusion engine's queue.
/// The engine flips the flags from the consumer side; a parked loop observes
/// the change and resumes without polling.

use crate::clock::SessionClock;
use crate::engine::DetectionEvent;
use crate::services::{AudioBackend, AudioSource, FrameSource, InferenceControl, VisionBackend};
use crate::vision::FrameGate;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// Lifecycle of one inference loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Parked. The loop holds its source untouched until restarted.
    Stopped,
    /// Pulling and classifying.
    Running,
    /// Terminal, set at session shutdown. Start requests are ignored.
    Closed,
}

/// Shared start/stop switch for one pipeline.
///
/// The engine drives it through `InferenceControl`; the loop side waits on a
/// `RunSignal`. Closing is one-way and wakes every parked waiter so the task
/// can exit.
#[derive(Debug)]
pub struct RunFlag {
    tx: watch::Sender<RunState>,
}

impl RunFlag {
    pub fn new(running: bool) -> Self {
        let initial = if running {
            RunState::Running
        } else {
            RunState::Stopped
        };
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn subscribe(&self) -> RunSignal {
        RunSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn close(&self) {
        self.tx.send_replace(RunState::Closed);
    }

    pub fn state(&self) -> RunState {
        *self.tx.borrow()
    }
}

impl InferenceControl for RunFlag {
    fn start(&self) {
        self.tx.send_if_modified(|state| match state {
            RunState::Stopped => {
                *state = RunState::Running;
                true
            }
            _ => false,
        });
    }

    fn stop(&self) {
        self.tx.send_if_modified(|state| match state {
            RunState::Running => {
                *state = RunState::Stopped;
                true
            }
            _ => false,
        });
    }

    fn is_running(&self) -> bool {
        matches!(*self.tx.borrow(), RunState::Running)
    }
}

/// Loop-side view of a `RunFlag`.
pub struct RunSignal {
    rx: watch::Receiver<RunState>,
}

impl RunSignal {
    /// Park until the flag leaves `Stopped`. Returns true when the loop
    /// should run an iteration, false when it should exit for good.
    pub async fn wait_until_running(&mut self) -> bool {
        match self.rx.wait_for(|state| *state != RunState::Stopped).await {
            Ok(state) => *state == RunState::Running,
            Err(_) => false,
        }
    }
}

/// Camera loop: pull frames, throttle through the frame gate, detect, and
/// forward labeled boxes. Ends when the source dries up, the flag closes, or
/// the engine hangs up.
pub fn spawn_vision_pipeline(
    mut source: Box<dyn FrameSource>,
    backend: Arc<dyn VisionBackend>,
    flag: Arc<RunFlag>,
    clock: SessionClock,
    interval_ms: u64,
    events: mpsc::Sender<DetectionEvent>,
) -> JoinHandle<()> {
    let mut signal = flag.subscribe();
    let mut gate = FrameGate::new(interval_ms);

    tokio::spawn(async move {
        let mut captured: u64 = 0;
        let mut submitted: u64 = 0;

        loop {
            if !signal.wait_until_running().await {
                break;
            }

            let Some(frame) = source.next_frame().await else {
                break;
            };
            captured += 1;

            // Gate on arrival time; stamp the event when the result lands.
            if !gate.should_submit(clock.now_ms()) {
                continue;
            }
            submitted += 1;

            let event = match backend.detect(&frame).await {
                Ok(detections) => DetectionEvent::VisionResults {
                    detections,
                    timestamp_ms: clock.now_ms(),
                },
                Err(err) => DetectionEvent::VisionError {
                    message: err.to_string(),
                },
            };

            if events.send(event).await.is_err() {
                break;
            }

            if submitted % 50 == 0 {
                debug!(
                    "vision pipeline: {} frames captured, {} submitted",
                    captured, submitted
                );
            }
        }

        debug!(
            "vision pipeline stopped ({} frames captured, {} submitted)",
            captured, submitted
        );
    })
}

/// Microphone loop: pull chunks and classify each one. No gate here, the
/// flag itself is the throttle: it only runs while a person is in frame.
pub fn spawn_audio_pipeline(
    mut source: Box<dyn AudioSource>,
    backend: Arc<dyn AudioBackend>,
    flag: Arc<RunFlag>,
    clock: SessionClock,
    events: mpsc::Sender<DetectionEvent>,
) -> JoinHandle<()> {
    let mut signal = flag.subscribe();

    tokio::spawn(async move {
        let mut chunks: u64 = 0;

        loop {
            if !signal.wait_until_running().await {
                break;
            }

            let Some(chunk) = source.next_chunk().await else {
                break;
            };
            chunks += 1;

            let event = match backend.classify(&chunk).await {
                Ok(score) => DetectionEvent::AudioScore {
                    score,
                    timestamp_ms: clock.now_ms(),
                },
                Err(err) => DetectionEvent::AudioError {
                    message: err.to_string(),
                },
            };

            if events.send(event).await.is_err() {
                break;
            }

            if chunks % 100 == 0 {
                debug!("audio pipeline: {} chunks classified", chunks);
            }
        }

        debug!("audio pipeline stopped ({} chunks classified)", chunks);
    })
}

/// Fusion engine module
///
/// Single consumer of everything both detection pipelines produce. The engine
/// owns `DetectionState` exclusively and processes events strictly in order,
/// so no lock guards the flags and no callback can reenter: the person flag
/// drives the audio gate, every state update re-evaluates the alert trigger,
/// and pause/resume stop and restart the inference loops.

use crate::alert::AlertTrigger;
use crate::audio::AudioGate;
use crate::clock::TimestampMs;
use crate::config::MonitorConfig;
use crate::services::{HapticSink, InferenceControl, UiSink};
use crate::state::DetectionState;
use crate::vision::{contains_person, Detection};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// One message on the detection queue.
#[derive(Debug, Clone)]
pub enum DetectionEvent {
    /// Labeled boxes from one vision inference, stamped at delivery.
    VisionResults {
        detections: Vec<Detection>,
        timestamp_ms: TimestampMs,
    },

    /// One vision inference attempt failed.
    VisionError { message: String },

    /// Snoring likelihood from one audio inference, stamped at delivery.
    AudioScore {
        score: f32,
        timestamp_ms: TimestampMs,
    },

    /// One audio inference attempt failed.
    AudioError { message: String },

    /// Stop both inference loops; detector events are dropped until resume.
    SessionPaused,

    /// Restart the camera; restart audio only if a person is still present.
    SessionResumed,
}

/// Counters accumulated over one session.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub vision_results: u64,
    pub audio_scores_applied: u64,
    pub audio_scores_dropped: u64,
    pub alerts_fired: u64,
    pub transient_errors: u64,
}

/// The cross-modal fusion orchestrator.
pub struct FusionEngine {
    state: DetectionState,
    audio_gate: AudioGate,
    alert: AlertTrigger,
    person_label: String,
    paused: bool,
    stats: EngineStats,
    vision_control: Arc<dyn InferenceControl>,
    audio_control: Arc<dyn InferenceControl>,
    haptics: Arc<dyn HapticSink>,
    ui: Arc<dyn UiSink>,
}

impl FusionEngine {
    pub fn new(
        config: &MonitorConfig,
        vision_control: Arc<dyn InferenceControl>,
        audio_control: Arc<dyn InferenceControl>,
        haptics: Arc<dyn HapticSink>,
        ui: Arc<dyn UiSink>,
    ) -> Self {
        Self {
            state: DetectionState::new(),
            audio_gate: AudioGate::new(config.snore_threshold),
            alert: AlertTrigger::new(config.alert_cooldown_ms),
            person_label: config.person_label.clone(),
            paused: false,
            stats: EngineStats::default(),
            vision_control,
            audio_control,
            haptics,
            ui,
        }
    }

    /// Process one event. Called sequentially by `run`; exposed so tests can
    /// drive the engine with hand-stamped events.
    pub fn handle_event(&mut self, event: DetectionEvent) {
        match event {
            DetectionEvent::VisionResults {
                detections,
                timestamp_ms,
            } => self.on_vision_results(detections, timestamp_ms),

            DetectionEvent::AudioScore {
                score,
                timestamp_ms,
            } => self.on_audio_score(score, timestamp_ms),

            DetectionEvent::VisionError { message } => {
                self.report_error("person detection", &message)
            }

            DetectionEvent::AudioError { message } => {
                self.report_error("snore classification", &message)
            }

            DetectionEvent::SessionPaused => self.on_paused(),

            DetectionEvent::SessionResumed => self.on_resumed(),
        }
    }

    /// Consume events until every producer hangs up, then report the session.
    pub async fn run(mut self, mut events: mpsc::Receiver<DetectionEvent>) -> EngineStats {
        info!("fusion engine started");

        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }

        info!("event channel closed, fusion engine stopping");
        debug!("session stats: {:?}", self.stats);
        self.stats
    }

    fn on_vision_results(&mut self, detections: Vec<Detection>, at: TimestampMs) {
        if self.paused {
            trace!("vision result dropped while paused");
            return;
        }

        self.stats.vision_results += 1;
        self.ui.render_overlay(&detections);

        let person = contains_person(&detections, &self.person_label);
        if self.state.set_person_present(person) {
            info!("person presence changed: {}", person);
        }

        self.sync_audio_gate();
        self.ui.render(self.state.snapshot());
        self.try_alert(at);
    }

    fn on_audio_score(&mut self, score: f32, at: TimestampMs) {
        if self.paused {
            self.stats.audio_scores_dropped += 1;
            trace!("audio score dropped while paused");
            return;
        }

        match self.audio_gate.process_score(score) {
            None => {
                // In-flight result delivered after the loop stopped.
                self.stats.audio_scores_dropped += 1;
                trace!("stale audio score {:.2} dropped", score);
            }
            Some(snoring) => {
                self.stats.audio_scores_applied += 1;
                if self.state.set_snoring_detected(snoring) {
                    info!("snoring changed: {} (score {:.2})", snoring, score);
                }
                self.ui.render(self.state.snapshot());
                self.try_alert(at);
            }
        }
    }

    fn on_paused(&mut self) {
        if self.paused {
            return;
        }

        self.paused = true;
        self.vision_control.stop();
        self.audio_gate.disengage(self.audio_control.as_ref());
        // Unconditional: no stale snoring flag survives a pause. The person
        // flag keeps its last observed value; the camera overwrites it on
        // resume.
        self.state.clear_snoring();
        self.ui.render(self.state.snapshot());
        info!("session paused, inference loops stopped");
    }

    fn on_resumed(&mut self) {
        if !self.paused {
            return;
        }

        self.paused = false;
        self.vision_control.start();
        self.sync_audio_gate();
        self.ui.render(self.state.snapshot());
        info!("session resumed");
    }

    /// Keep the audio loop's run state in step with the person flag. The
    /// clear on disengage is what property "no stale snoring after the person
    /// leaves frame" hangs on.
    fn sync_audio_gate(&mut self) {
        if self.state.person_present() {
            if self.audio_gate.engage(self.audio_control.as_ref()) {
                info!("person present, snore classification engaged");
            }
        } else if self.audio_gate.disengage(self.audio_control.as_ref()) {
            self.state.clear_snoring();
            info!("person left frame, snore classification disengaged");
        }
    }

    fn try_alert(&mut self, now: TimestampMs) {
        if self.alert.evaluate(&mut self.state, now, self.haptics.as_ref()) {
            self.stats.alerts_fired += 1;
        }
    }

    /// Transient failure: tell the user once, leave detection state alone
    /// (fail open), keep attempting future inferences.
    fn report_error(&mut self, modality: &str, message: &str) {
        self.stats.transient_errors += 1;
        warn!("{} error: {}", modality, message);
        self.ui.notify(message);
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn audio_gate(&self) -> &AudioGate {
        &self.audio_gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        MockHapticSink, MockInferenceControl, MockUiSink,
    };
    use crate::vision::{BoundingBox, Category};

    fn person_box() -> Detection {
        Detection {
            bounding_box: BoundingBox {
                left: 10.0,
                top: 10.0,
                right: 90.0,
                bottom: 120.0,
            },
            categories: vec![Category::new("person", 0.92)],
        }
    }

    fn chair_box() -> Detection {
        Detection {
            bounding_box: BoundingBox {
                left: 0.0,
                top: 0.0,
                right: 40.0,
                bottom: 40.0,
            },
            categories: vec![Category::new("chair", 0.88)],
        }
    }

    fn vision_event(detections: Vec<Detection>, at: TimestampMs) -> DetectionEvent {
        DetectionEvent::VisionResults {
            detections,
            timestamp_ms: at,
        }
    }

    fn audio_event(score: f32, at: TimestampMs) -> DetectionEvent {
        DetectionEvent::AudioScore {
            score,
            timestamp_ms: at,
        }
    }

    fn quiet_ui() -> Arc<MockUiSink> {
        let mut ui = MockUiSink::new();
        ui.expect_render().return_const(());
        ui.expect_render_overlay().return_const(());
        ui.expect_notify().return_const(());
        Arc::new(ui)
    }

    fn idle_control() -> Arc<MockInferenceControl> {
        let mut control = MockInferenceControl::new();
        control.expect_start().return_const(());
        control.expect_stop().return_const(());
        control.expect_is_running().return_const(false);
        Arc::new(control)
    }

    fn quiet_haptics() -> Arc<MockHapticSink> {
        let mut haptics = MockHapticSink::new();
        haptics.expect_vibrate().return_const(());
        Arc::new(haptics)
    }

    fn engine_with_audio_control(audio_control: Arc<MockInferenceControl>) -> FusionEngine {
        FusionEngine::new(
            &MonitorConfig::default(),
            idle_control(),
            audio_control,
            quiet_haptics(),
            quiet_ui(),
        )
    }

    fn default_engine() -> FusionEngine {
        engine_with_audio_control(idle_control())
    }

    #[test]
    fn test_person_flag_follows_dominant_label() {
        let mut engine = default_engine();

        engine.handle_event(vision_event(vec![person_box(), chair_box()], 1_000));
        assert!(engine.state().person_present());

        engine.handle_event(vision_event(vec![chair_box()], 2_000));
        assert!(!engine.state().person_present());

        engine.handle_event(vision_event(Vec::new(), 3_000));
        assert!(!engine.state().person_present());
    }

    #[test]
    fn test_audio_gate_follows_person_flag() {
        let mut audio_control = MockInferenceControl::new();
        audio_control.expect_start().times(1).return_const(());
        audio_control.expect_stop().times(1).return_const(());

        let mut engine = engine_with_audio_control(Arc::new(audio_control));

        engine.handle_event(vision_event(vec![person_box()], 1_000));
        assert!(engine.audio_gate().is_running());

        // Repeated person results must not restart the loop.
        engine.handle_event(vision_event(vec![person_box()], 2_000));
        assert!(engine.audio_gate().is_running());

        engine.handle_event(vision_event(vec![chair_box()], 3_000));
        assert!(!engine.audio_gate().is_running());
    }

    #[test]
    fn test_person_leaving_clears_snoring_immediately() {
        let mut engine = default_engine();

        engine.handle_event(vision_event(vec![person_box()], 1_000));
        engine.handle_event(audio_event(0.9, 1_100));
        assert!(engine.state().snoring_detected());

        engine.handle_event(vision_event(vec![chair_box()], 2_000));
        assert!(!engine.state().snoring_detected());

        // The in-flight score from before the stop must not resurrect it.
        engine.handle_event(audio_event(0.95, 2_050));
        assert!(!engine.state().snoring_detected());
        assert_eq!(engine.stats().audio_scores_dropped, 1);
    }

    #[test]
    fn test_scores_without_person_are_dropped() {
        let mut engine = default_engine();

        engine.handle_event(audio_event(0.99, 500));
        assert!(!engine.state().snoring_detected());
        assert_eq!(engine.stats().audio_scores_applied, 0);
        assert_eq!(engine.stats().audio_scores_dropped, 1);
    }

    #[test]
    fn test_alert_fires_once_per_cooldown() {
        let mut haptics = MockHapticSink::new();
        haptics.expect_vibrate().times(2).return_const(());

        let mut engine = FusionEngine::new(
            &MonitorConfig::default(),
            idle_control(),
            idle_control(),
            Arc::new(haptics),
            quiet_ui(),
        );

        engine.handle_event(vision_event(vec![person_box()], 2_500));
        engine.handle_event(audio_event(0.9, 2_500));
        assert_eq!(engine.stats().alerts_fired, 1);
        assert_eq!(engine.state().last_alert_ms(), 2_500);

        // Inside the cooldown window: state updates, no second alarm.
        engine.handle_event(audio_event(0.95, 2_600));
        engine.handle_event(vision_event(vec![person_box()], 3_500));
        assert_eq!(engine.stats().alerts_fired, 1);

        engine.handle_event(audio_event(0.9, 4_600));
        assert_eq!(engine.stats().alerts_fired, 2);
        assert_eq!(engine.state().last_alert_ms(), 4_600);
    }

    #[test]
    fn test_pause_clears_snoring_and_drops_in_flight() {
        let mut audio_control = MockInferenceControl::new();
        audio_control.expect_start().times(2).return_const(());
        audio_control.expect_stop().times(1).return_const(());

        let mut vision_control = MockInferenceControl::new();
        vision_control.expect_stop().times(1).return_const(());
        vision_control.expect_start().times(1).return_const(());

        let mut engine = FusionEngine::new(
            &MonitorConfig::default(),
            Arc::new(vision_control),
            Arc::new(audio_control),
            quiet_haptics(),
            quiet_ui(),
        );

        engine.handle_event(vision_event(vec![person_box()], 1_000));
        engine.handle_event(audio_event(0.9, 1_200));
        assert!(engine.state().snoring_detected());

        engine.handle_event(DetectionEvent::SessionPaused);
        assert!(engine.is_paused());
        assert!(!engine.state().snoring_detected());
        assert!(!engine.audio_gate().is_running());
        // Person keeps its last observed value across the pause.
        assert!(engine.state().person_present());

        // In-flight results delivered after the pause change nothing.
        engine.handle_event(audio_event(0.99, 1_300));
        engine.handle_event(vision_event(vec![chair_box()], 1_350));
        assert!(!engine.state().snoring_detected());
        assert!(engine.state().person_present());
        assert_eq!(engine.stats().vision_results, 1);

        // Resume restarts the camera and re-engages audio for the still
        // present person.
        engine.handle_event(DetectionEvent::SessionResumed);
        assert!(!engine.is_paused());
        assert!(engine.audio_gate().is_running());
    }

    #[test]
    fn test_resume_leaves_audio_idle_without_person() {
        let mut audio_control = MockInferenceControl::new();
        audio_control.expect_start().times(0).return_const(());
        audio_control.expect_stop().return_const(());

        let mut engine = engine_with_audio_control(Arc::new(audio_control));

        engine.handle_event(vision_event(vec![chair_box()], 1_000));
        engine.handle_event(DetectionEvent::SessionPaused);
        engine.handle_event(DetectionEvent::SessionResumed);

        assert!(!engine.audio_gate().is_running());
    }

    #[test]
    fn test_transient_errors_fail_open() {
        let mut ui = MockUiSink::new();
        ui.expect_render().return_const(());
        ui.expect_render_overlay().return_const(());
        ui.expect_notify()
            .times(2)
            .withf(|message| message.contains("failed"))
            .return_const(());

        let mut engine = FusionEngine::new(
            &MonitorConfig::default(),
            idle_control(),
            idle_control(),
            quiet_haptics(),
            Arc::new(ui),
        );

        engine.handle_event(vision_event(vec![person_box()], 1_000));
        engine.handle_event(audio_event(0.9, 1_100));

        engine.handle_event(DetectionEvent::VisionError {
            message: "detector failed: tensor shape".to_string(),
        });
        engine.handle_event(DetectionEvent::AudioError {
            message: "classifier failed: buffer".to_string(),
        });

        // Both flags survive the errors untouched.
        assert!(engine.state().person_present());
        assert!(engine.state().snoring_detected());
        assert_eq!(engine.stats().transient_errors, 2);
    }

    #[test]
    fn test_alternating_feeds_space_alarms_beyond_cooldown() {
        let mut haptics = MockHapticSink::new();
        haptics.expect_vibrate().return_const(());

        let mut engine = FusionEngine::new(
            &MonitorConfig::default(),
            idle_control(),
            idle_control(),
            Arc::new(haptics),
            quiet_ui(),
        );

        // Vision and audio results alternate every 90 ms for half a minute.
        // However often the pair agrees, alarms stay a full cooldown apart.
        let mut fire_times: Vec<TimestampMs> = Vec::new();
        let mut fired_before = 0;
        for step in 0..300u64 {
            let t = 2_100 + step * 90;
            if step % 2 == 0 {
                engine.handle_event(vision_event(vec![person_box()], t));
            } else {
                engine.handle_event(audio_event(0.9, t));
            }
            if engine.stats().alerts_fired > fired_before {
                fired_before = engine.stats().alerts_fired;
                fire_times.push(t);
            }
        }

        assert!(
            fire_times.len() > 5,
            "sweep fired only {} times",
            fire_times.len()
        );
        for pair in fire_times.windows(2) {
            assert!(pair[1] - pair[0] > 2_000);
        }
    }

    #[tokio::test]
    async fn test_run_consumes_until_channel_close() {
        let (tx, rx) = mpsc::channel(16);
        let engine = default_engine();

        let task = tokio::spawn(engine.run(rx));

        tx.send(vision_event(vec![person_box()], 5_000))
            .await
            .unwrap();
        tx.send(audio_event(0.8, 5_100)).await.unwrap();
        drop(tx);

        let stats = task.await.unwrap();
        assert_eq!(stats.vision_results, 1);
        assert_eq!(stats.audio_scores_applied, 1);
        assert_eq!(stats.alerts_fired, 1);
    }
}

/// Snore monitor service binary
///
/// Runs a complete monitoring session against the simulated camera,
/// microphone, and vibration motor: a person walks into frame, starts
/// snoring, the alarm fires, the screen blanks and unblanks partway
/// through, and the person leaves. Useful for watching the whole fusion
/// path in the log without any hardware.
use anyhow::{Context, Result};
use snore_monitor::sim::{
    bright_frame, dark_frame, snore_chunk, EnergySnoreClassifier, LogHapticMotor, LogUi,
    ScriptedAudioSource, ScriptedFrameSource, SyntheticPersonDetector,
};
use snore_monitor::{start_session, AudioParts, MonitorConfig, VisionParts};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("snore_monitor=info".parse()?)
                .add_directive("snore_service=info".parse()?),
        )
        .init();

    info!("Starting snore monitor service v{}", snore_monitor::VERSION);

    let config = load_config()?;
    info!(
        "config: detect every {} ms, snore threshold {:.2}, alert cooldown {} ms",
        config.detect_interval_ms, config.snore_threshold, config.alert_cooldown_ms
    );

    match run_demo(config).await {
        Ok(()) => {
            info!("snore monitor service exiting");
            Ok(())
        }
        Err(err) => {
            error!("Service error: {}", err);
            std::process::exit(1);
        }
    }
}

/// Defaults, optionally a JSON file via SNORE_MONITOR_CONFIG, then
/// individual environment overrides on top.
fn load_config() -> Result<MonitorConfig> {
    let mut config = match env::var("SNORE_MONITOR_CONFIG") {
        Ok(path) => {
            info!("loading config from {}", path);
            MonitorConfig::from_file(&path)?
        }
        Err(_) => MonitorConfig::default(),
    };

    if let Ok(value) = env::var("SNORE_THRESHOLD") {
        config.snore_threshold = value
            .parse()
            .context("SNORE_THRESHOLD must be a number in [0, 1]")?;
    }
    if let Ok(value) = env::var("DETECT_INTERVAL_MS") {
        config.detect_interval_ms = value
            .parse()
            .context("DETECT_INTERVAL_MS must be a duration in milliseconds")?;
    }
    if let Ok(value) = env::var("ALERT_COOLDOWN_MS") {
        config.alert_cooldown_ms = value
            .parse()
            .context("ALERT_COOLDOWN_MS must be a duration in milliseconds")?;
    }

    config.validate()?;
    Ok(config)
}

async fn run_demo(config: MonitorConfig) -> Result<()> {
    // Five dark frames, a long bright stretch, five dark again: empty room,
    // person asleep in view, person gone.
    let mut frames = Vec::new();
    for _ in 0..5 {
        frames.push(dark_frame(64, 48));
    }
    for _ in 0..25 {
        frames.push(bright_frame(64, 48));
    }
    for _ in 0..5 {
        frames.push(dark_frame(64, 48));
    }

    let chunks = (0..30).map(|_| snore_chunk(100)).collect();

    let session = start_session(
        &config,
        VisionParts {
            source: Box::new(ScriptedFrameSource::with_pacing(
                frames,
                Duration::from_millis(120),
            )),
            backend: Arc::new(SyntheticPersonDetector::default()),
        },
        Some(AudioParts {
            source: Box::new(ScriptedAudioSource::with_pacing(
                chunks,
                Duration::from_millis(120),
            )),
            backend: Arc::new(EnergySnoreClassifier::default()),
        }),
        Arc::new(LogHapticMotor),
        Arc::new(LogUi),
    );

    sleep(Duration::from_millis(2_500)).await;
    info!("screen off");
    session.pause().await?;

    sleep(Duration::from_millis(600)).await;
    info!("screen on");
    session.resume().await?;

    sleep(Duration::from_millis(2_000)).await;

    let stats = session.shutdown().await?;
    info!(
        "demo finished: {} alerts, {} vision results, {} audio scores applied ({} dropped), {} transient errors",
        stats.alerts_fired,
        stats.vision_results,
        stats.audio_scores_applied,
        stats.audio_scores_dropped,
        stats.transient_errors
    );

    Ok(())
}

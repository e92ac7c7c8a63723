//! Video analysis worker binary.
//!
//! Usage: `vguard-worker [VIDEO...]`. Each argument is submitted to the
//! pipeline; cameras listed in `VGUARD_LIVE_CAMERAS` get a live feed that
//! logs its detections. Runs until CTRL+C.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vguard_detect::ThreatDetector;
use vguard_inference::{builtin_catalog, DefaultBackendFactory, ModelRegistry};
use vguard_media::{ConfiguredFrameSources, FfmpegToolkit};
use vguard_models::{FeedSettings, LiveFrame, ProcessingOptions, VideoId};
use vguard_worker::{
    metrics, CallbackSink, FrameSink, LiveFeedStreamer, MemoryJobStore, VideoPipeline, WorkerConfig,
};

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["vguard=info", "ort=warn", "onnxruntime=warn"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn video_id_for(path: &std::path::Path) -> VideoId {
    let stem: String = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        VideoId::new()
    } else {
        VideoId::from_string(stem)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting vguard-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Ok(addr) = std::env::var("VGUARD_METRICS_ADDR") {
        let addr: std::net::SocketAddr = addr.parse().context("invalid VGUARD_METRICS_ADDR")?;
        metrics::install_exporter(addr).context("failed to install Prometheus exporter")?;
        info!(%addr, "Prometheus metrics enabled");
    }

    let toolkit = FfmpegToolkit::new();
    if let Err(e) = FfmpegToolkit::check_available() {
        warn!("Media tools unavailable, video jobs will fail: {}", e);
    }

    // Models
    let registry = Arc::new(
        ModelRegistry::new(
            builtin_catalog(&config.registry.model_dir),
            Arc::new(DefaultBackendFactory::new(config.registry.backend_mode)),
        )
        .with_idle_threshold(config.registry.idle_threshold),
    );
    let loaded = registry.initialize().await;
    info!(models = ?loaded, backend_mode = %config.registry.backend_mode.as_str(), "Model registry initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let maintenance = Arc::clone(&registry)
        .spawn_maintenance(config.registry.maintenance_interval, shutdown_rx);

    // Pipeline and live feeds
    let detector = ThreatDetector::new(Arc::clone(&registry), config.detector.clone());
    let pipeline = VideoPipeline::new(
        config.pipeline.clone(),
        Arc::new(toolkit),
        detector.clone(),
        Arc::new(MemoryJobStore::new()),
    );
    let streamer = LiveFeedStreamer::new(
        detector,
        Arc::new(ConfiguredFrameSources::new(config.live.sample_video.clone())),
        config.live.clone(),
    );

    for arg in std::env::args().skip(1) {
        let path = PathBuf::from(&arg);
        let video_id = video_id_for(&path);
        match pipeline
            .submit(video_id.clone(), path, ProcessingOptions::default())
            .await
        {
            Ok(job) => info!(
                video_id = %video_id,
                job_id = %job.id,
                status = job.status.as_str(),
                estimated_secs = ?job.estimated_processing_secs,
                "Video submitted"
            ),
            Err(e) => error!(video_id = %video_id, "Failed to submit {}: {}", arg, e),
        }
    }

    let cameras = std::env::var("VGUARD_LIVE_CAMERAS").unwrap_or_default();
    for camera_id in cameras.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let sink: Arc<dyn FrameSink> = Arc::new(CallbackSink::new(|frame: LiveFrame| {
            if !frame.detections.is_empty() {
                info!(
                    camera_id = %frame.camera_id,
                    sequence = frame.sequence,
                    detections = frame.detections.len(),
                    "Live detections"
                );
            }
        }));
        let settings = FeedSettings {
            target_fps: config.live.default_fps,
            ..FeedSettings::default()
        };
        if let Err(e) = streamer.start(camera_id, settings, sink).await {
            error!(camera_id, "Failed to start live feed: {}", e);
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Received shutdown signal");

    streamer.shutdown().await;
    for job in pipeline.list() {
        if !job.is_terminal() {
            warn!(video_id = %job.video_id, progress = job.progress, "Job still running at shutdown");
        }
    }

    let _ = shutdown_tx.send(true);
    maintenance.await.ok();

    info!("Worker shutdown complete");
    Ok(())
}

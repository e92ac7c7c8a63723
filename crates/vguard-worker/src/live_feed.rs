//! Live camera feed streamer.
//!
//! One producer task per camera pulls JPEG frames from a [`FrameSource`],
//! runs them through the detector and pushes [`LiveFrame`]s to a
//! [`FrameSink`]. `stop` cancels the task and waits for it to release its
//! source before returning.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vguard_detect::ThreatDetector;
use vguard_media::{FrameSource, FrameSourceFactory};
use vguard_models::{FeedSettings, LiveFrame};

use crate::config::LiveFeedConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::FailureTracker;

/// Consecutive analysis failures logged per feed before suppression.
const MAX_LOGGED_FAILURES: u32 = 3;

/// Receiver of analyzed live frames. Implementations must not block the
/// producer for long.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send(&self, frame: LiveFrame);
}

/// [`FrameSink`] over a plain closure.
pub struct CallbackSink<F> {
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: Fn(LiveFrame) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> FrameSink for CallbackSink<F>
where
    F: Fn(LiveFrame) + Send + Sync,
{
    async fn send(&self, frame: LiveFrame) {
        (self.callback)(frame);
    }
}

/// [`FrameSink`] forwarding into a bounded channel. Frames are dropped when
/// the subscriber falls behind.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<LiveFrame>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<LiveFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&self, frame: LiveFrame) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(frame)) => {
                warn!(
                    camera_id = %frame.camera_id,
                    sequence = frame.sequence,
                    "Subscriber is full, dropping live frame"
                );
                metrics::record_live_frame_dropped(&frame.camera_id);
            }
            Err(mpsc::error::TrySendError::Closed(frame)) => {
                debug!(camera_id = %frame.camera_id, "Subscriber gone, dropping live frame");
                metrics::record_live_frame_dropped(&frame.camera_id);
            }
        }
    }
}

/// A running camera feed.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    pub camera_id: String,
    pub started_at: DateTime<Utc>,
    pub target_fps: u32,
}

struct FeedSession {
    info: FeedInfo,
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl FeedSession {
    /// Cancel the producer and wait for it to close its source.
    async fn stop(self) {
        let _ = self.cancel_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(camera_id = %self.info.camera_id, error = %e, "Live feed task ended abnormally");
        }
    }
}

/// Runs at most one feed per camera id.
pub struct LiveFeedStreamer {
    detector: ThreatDetector,
    sources: Arc<dyn FrameSourceFactory>,
    config: LiveFeedConfig,
    sessions: Mutex<HashMap<String, FeedSession>>,
}

impl LiveFeedStreamer {
    pub fn new(
        detector: ThreatDetector,
        sources: Arc<dyn FrameSourceFactory>,
        config: LiveFeedConfig,
    ) -> Self {
        Self {
            detector,
            sources,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LiveFeedConfig {
        &self.config
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, FeedSession>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start producing frames for `camera_id` into `sink`.
    ///
    /// Fails with [`WorkerError::DuplicateFeed`] while a feed for the camera
    /// is running. A feed whose source has already ended does not count.
    pub async fn start(
        &self,
        camera_id: impl Into<String>,
        settings: FeedSettings,
        sink: Arc<dyn FrameSink>,
    ) -> WorkerResult<()> {
        let camera_id = camera_id.into();
        if camera_id.trim().is_empty() {
            return Err(WorkerError::validation("camera id must not be empty"));
        }

        self.detector.ensure_ready().await?;

        let target_fps = if settings.target_fps == 0 {
            self.config.default_fps
        } else {
            settings.target_fps
        };

        let mut sessions = self.sessions();
        if let Some(existing) = sessions.get(&camera_id) {
            if !existing.handle.is_finished() {
                return Err(WorkerError::DuplicateFeed(camera_id));
            }
            debug!(camera_id = %camera_id, "Replacing ended live feed");
            sessions.remove(&camera_id);
        }

        let source = self.sources.open(target_fps)?;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let producer = FeedProducer {
            camera_id: camera_id.clone(),
            detector: self.detector.clone(),
            settings: FeedSettings {
                target_fps,
                ..settings
            },
            sink,
        };
        let handle = tokio::spawn(producer.run(source, cancel_rx));

        let info = FeedInfo {
            camera_id: camera_id.clone(),
            started_at: Utc::now(),
            target_fps,
        };
        sessions.insert(
            camera_id.clone(),
            FeedSession {
                info,
                cancel_tx,
                handle,
            },
        );
        metrics::set_live_feeds_active(sessions.len());

        info!(camera_id = %camera_id, target_fps, "Live feed started");
        Ok(())
    }

    /// Stop the feed for `camera_id`. Unknown cameras are a no-op.
    pub async fn stop(&self, camera_id: &str) {
        let session = {
            let mut sessions = self.sessions();
            let session = sessions.remove(camera_id);
            metrics::set_live_feeds_active(sessions.len());
            session
        };

        if let Some(session) = session {
            session.stop().await;
            info!(camera_id = %camera_id, "Live feed stopped");
        }
    }

    /// Feeds whose producer is still running.
    pub fn active_feeds(&self) -> Vec<FeedInfo> {
        let mut feeds: Vec<FeedInfo> = self
            .sessions()
            .values()
            .filter(|s| !s.handle.is_finished())
            .map(|s| s.info.clone())
            .collect();
        feeds.sort_by(|a, b| a.camera_id.cmp(&b.camera_id));
        feeds
    }

    pub fn is_active(&self, camera_id: &str) -> bool {
        self.sessions()
            .get(camera_id)
            .map(|s| !s.handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop every feed.
    pub async fn shutdown(&self) {
        let drained: Vec<FeedSession> = {
            let mut sessions = self.sessions();
            sessions.drain().map(|(_, s)| s).collect()
        };
        metrics::set_live_feeds_active(0);

        let count = drained.len();
        futures::future::join_all(drained.into_iter().map(FeedSession::stop)).await;
        if count > 0 {
            info!(feeds = count, "Live feeds shut down");
        }
    }
}

struct FeedProducer {
    camera_id: String,
    detector: ThreatDetector,
    settings: FeedSettings,
    sink: Arc<dyn FrameSink>,
}

impl FeedProducer {
    async fn run(self, mut source: Box<dyn FrameSource>, mut cancel_rx: watch::Receiver<bool>) {
        let mut sequence = 0u64;
        let mut failures = FailureTracker::new(self.camera_id.clone(), MAX_LOGGED_FAILURES);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel_rx.changed() => break,
                next = source.next_frame() => next,
            };

            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!(camera_id = %self.camera_id, "Live feed source ended");
                    break;
                }
                Err(e) => {
                    warn!(camera_id = %self.camera_id, error = %e, "Live feed source failed");
                    break;
                }
            };

            let detections = match self
                .detector
                .analyze_frame(&frame, &self.settings.categories, None)
                .await
            {
                Ok(analysis) => {
                    failures.record_success();
                    analysis.detections
                }
                Err(e) => {
                    if failures.record_failure() {
                        warn!(
                            camera_id = %self.camera_id,
                            sequence,
                            error = %e,
                            "Live frame analysis failed"
                        );
                    }
                    Vec::new()
                }
            };

            metrics::record_live_frame(&self.camera_id);
            self.sink
                .send(LiveFrame {
                    camera_id: self.camera_id.clone(),
                    sequence,
                    frame,
                    detections,
                    captured_at: Utc::now(),
                })
                .await;
            sequence += 1;
        }

        source.close().await;
        debug!(camera_id = %self.camera_id, frames = sequence, "Live feed producer exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use vguard_detect::testing::{registry_with, solid_jpeg, ScriptedFactory};
    use vguard_detect::DetectorConfig;
    use vguard_media::MediaResult;

    /// Emits `limit` frames (unbounded when `None`), one per tick.
    struct CountingSource {
        remaining: Option<usize>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FrameSource for CountingSource {
        async fn next_frame(&mut self) -> MediaResult<Option<Vec<u8>>> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            match &mut self.remaining {
                Some(0) => Ok(None),
                Some(n) => {
                    *n -= 1;
                    Ok(Some(solid_jpeg(64, 48, [50, 50, 50])))
                }
                None => Ok(Some(solid_jpeg(64, 48, [50, 50, 50]))),
            }
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct CountingSources {
        limit: Option<usize>,
        closed: Arc<AtomicBool>,
        opened: AtomicUsize,
    }

    impl CountingSources {
        fn new(limit: Option<usize>) -> Self {
            Self {
                limit,
                closed: Arc::new(AtomicBool::new(false)),
                opened: AtomicUsize::new(0),
            }
        }
    }

    impl FrameSourceFactory for CountingSources {
        fn open(&self, _fps: u32) -> MediaResult<Box<dyn FrameSource>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingSource {
                remaining: self.limit,
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    fn streamer(sources: Arc<CountingSources>) -> LiveFeedStreamer {
        let detector = ThreatDetector::new(registry_with(ScriptedFactory::new()), DetectorConfig::default());
        LiveFeedStreamer::new(detector, sources, LiveFeedConfig::default())
    }

    #[tokio::test]
    async fn test_duplicate_start_rejected() {
        let sources = Arc::new(CountingSources::new(None));
        let streamer = streamer(sources.clone());
        let (sink, _rx) = ChannelSink::new(4);
        let sink: Arc<dyn FrameSink> = Arc::new(sink);

        streamer.start("cam-1", FeedSettings::default(), sink.clone()).await.unwrap();
        let err = streamer
            .start("cam-1", FeedSettings::default(), sink)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::DuplicateFeed(ref id) if id == "cam-1"));
        assert_eq!(sources.opened.load(Ordering::SeqCst), 1);

        streamer.stop("cam-1").await;
        assert!(sources.closed.load(Ordering::SeqCst));
        assert!(streamer.active_feeds().is_empty());
    }

    #[tokio::test]
    async fn test_stop_unknown_is_noop() {
        let streamer = streamer(Arc::new(CountingSources::new(None)));
        streamer.stop("nobody").await;
        streamer.stop("nobody").await;
    }

    #[tokio::test]
    async fn test_frames_delivered_in_sequence() {
        let streamer = streamer(Arc::new(CountingSources::new(Some(3))));
        let (sink, mut rx) = ChannelSink::new(8);

        streamer
            .start("lobby", FeedSettings::default(), Arc::new(sink))
            .await
            .unwrap();

        for expected in 0..3u64 {
            let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(frame.camera_id, "lobby");
            assert_eq!(frame.sequence, expected);
            assert!(!frame.frame.is_empty());
        }
        streamer.shutdown().await;
    }

    #[tokio::test]
    async fn test_ended_feed_does_not_block_restart() {
        let sources = Arc::new(CountingSources::new(Some(0)));
        let streamer = streamer(sources.clone());
        let received = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&received);
        let sink: Arc<dyn FrameSink> = Arc::new(CallbackSink::new(move |_frame: LiveFrame| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        streamer.start("yard", FeedSettings::default(), sink.clone()).await.unwrap();
        for _ in 0..100 {
            if !streamer.is_active("yard") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!streamer.is_active("yard"));

        streamer.start("yard", FeedSettings::default(), sink).await.unwrap();
        assert_eq!(sources.opened.load(Ordering::SeqCst), 2);
        assert_eq!(received.load(Ordering::SeqCst), 0);
        streamer.stop("yard").await;
    }

    #[tokio::test]
    async fn test_full_channel_drops_frames() {
        let (sink, mut rx) = ChannelSink::new(1);
        let frame = |sequence| LiveFrame {
            camera_id: "cam".to_string(),
            sequence,
            frame: vec![1, 2, 3],
            detections: Vec::new(),
            captured_at: Utc::now(),
        };

        sink.send(frame(0)).await;
        sink.send(frame(1)).await;

        assert_eq!(rx.recv().await.unwrap().sequence, 0);
        assert!(rx.try_recv().is_err());
    }
}

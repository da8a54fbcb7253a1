//! [`TelemetryIngest`] – turns the raw telemetry stream into published
//! snapshots.
//!
//! [`TelemetryIngest::start`] opens a subscription on the configured topic
//! and spawns a background task that decodes every frame and publishes it to
//! the [`SnapshotStore`] owned by the ingest.  The first successful decode
//! promotes the [`MonitoringSession`] to `Active`.
//!
//! A malformed frame is logged and counted but never ends the stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use stride_middleware::{FrameStream, SPORT_STATE_TOPIC, TelemetryBus};
use stride_types::{MonitoringState, StrideError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::decode::decode_frame;
use crate::session::MonitoringSession;
use crate::store::{SnapshotReader, SnapshotStore};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Topic carrying sport-mode state frames.
    pub topic: String,
    /// Upper bound on how long [`TelemetryIngest::start`] waits for the bus.
    pub connect_timeout: Duration,
    /// A snapshot older than this is reported as [`Liveness::Stale`].
    pub stale_after: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            topic: SPORT_STATE_TOPIC.to_string(),
            connect_timeout: Duration::from_secs(3),
            stale_after: Duration::from_secs(1),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Counters and liveness
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct IngestStats {
    frames_received: AtomicU64,
    frames_decoded: AtomicU64,
    decode_errors: AtomicU64,
}

/// Point-in-time copy of the ingest counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestCounters {
    pub frames_received: u64,
    pub frames_decoded: u64,
    pub decode_errors: u64,
}

/// Freshness of the state feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// No frame has ever been decoded.
    NoData,
    /// The latest snapshot is younger than `stale_after`.
    Live,
    /// Frames have stopped arriving.
    Stale,
}

// ────────────────────────────────────────────────────────────────────────────
// TelemetryIngest
// ────────────────────────────────────────────────────────────────────────────

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the telemetry subscription and the snapshot store it publishes into.
pub struct TelemetryIngest {
    bus: Arc<dyn TelemetryBus>,
    config: IngestConfig,
    store: Arc<SnapshotStore>,
    session: Arc<MonitoringSession>,
    stats: Arc<IngestStats>,
    worker: Option<Worker>,
}

impl TelemetryIngest {
    pub fn new(bus: Arc<dyn TelemetryBus>, config: IngestConfig) -> Self {
        Self {
            bus,
            config,
            store: Arc::new(SnapshotStore::new()),
            session: Arc::new(MonitoringSession::new()),
            stats: Arc::new(IngestStats::default()),
            worker: None,
        }
    }

    /// Subscribe to the telemetry topic and start decoding in the
    /// background.  Returns as soon as the subscription is open; it does not
    /// wait for the first frame.
    ///
    /// # Errors
    ///
    /// - [`StrideError::AlreadyStarted`] – the background task is still
    ///   running.  A feed that ended on its own can be started again.
    /// - [`StrideError::TransportUnavailable`] – the bus refused the
    ///   subscription or did not answer within `connect_timeout`.
    pub async fn start(&mut self) -> Result<(), StrideError> {
        if self.is_running() {
            return Err(StrideError::AlreadyStarted);
        }
        self.worker = None;

        let topic = self.config.topic.clone();
        let connect_timeout = self.config.connect_timeout;
        let stream =
            match tokio::time::timeout(connect_timeout, self.bus.subscribe(&topic)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(StrideError::TransportUnavailable(msg))) => {
                    return Err(StrideError::TransportUnavailable(msg));
                }
                Ok(Err(other)) => return Err(StrideError::TransportUnavailable(other.to_string())),
                Err(_) => {
                    return Err(StrideError::TransportUnavailable(format!(
                        "no subscription on {topic} within {connect_timeout:?}"
                    )));
                }
            };

        self.session.begin_subscribing();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(pump(
            stream,
            Arc::clone(&self.store),
            Arc::clone(&self.session),
            Arc::clone(&self.stats),
            cancel.clone(),
        ));
        self.worker = Some(Worker { cancel, handle });
        info!(topic = %topic, "telemetry ingest started");
        Ok(())
    }

    /// Unsubscribe, stop the background task and move the session to
    /// `Stopped`.  Safe to call any number of times.
    pub async fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.cancel();
            if let Err(e) = worker.handle.await {
                warn!(error = %e, "telemetry ingest task ended abnormally");
            }
            if let Err(e) = self.bus.unsubscribe(&self.config.topic).await {
                warn!(error = %e, topic = %self.config.topic, "unsubscribe failed");
            }
            info!(topic = %self.config.topic, "telemetry ingest stopped");
        }
        self.session.stop();
    }

    /// `false` once stopped or once the telemetry stream has ended.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.handle.is_finished())
    }

    /// Read-only handle to the snapshot store.
    pub fn reader(&self) -> SnapshotReader {
        self.store.reader()
    }

    /// Shared handle to the monitoring session.
    pub fn session(&self) -> Arc<MonitoringSession> {
        Arc::clone(&self.session)
    }

    pub fn state(&self) -> MonitoringState {
        self.session.state()
    }

    pub fn counters(&self) -> IngestCounters {
        IngestCounters {
            frames_received: self.stats.frames_received.load(Ordering::Relaxed),
            frames_decoded: self.stats.frames_decoded.load(Ordering::Relaxed),
            decode_errors: self.stats.decode_errors.load(Ordering::Relaxed),
        }
    }

    /// Freshness of the feed as seen at `now`.
    pub fn liveness(&self, now: Instant) -> Liveness {
        match self.store.age(now) {
            None => Liveness::NoData,
            Some(age) if age <= self.config.stale_after => Liveness::Live,
            Some(_) => Liveness::Stale,
        }
    }
}

impl Drop for TelemetryIngest {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.cancel.cancel();
        }
        self.session.stop();
    }
}

/// Background decode loop.  Runs until cancelled or the stream ends; a
/// stream that ends on its own stops the session.
async fn pump(
    mut stream: FrameStream,
    store: Arc<SnapshotStore>,
    session: Arc<MonitoringSession>,
    stats: Arc<IngestStats>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = stream.next() => match next {
                Some(frame) => frame,
                None => {
                    warn!("telemetry stream ended; monitoring stopped");
                    session.stop();
                    break;
                }
            },
        };

        stats.frames_received.fetch_add(1, Ordering::Relaxed);
        match decode_frame(&frame) {
            Ok(snapshot) => {
                store.publish(snapshot);
                stats.frames_decoded.fetch_add(1, Ordering::Relaxed);
                if session.mark_active() {
                    info!(topic = %frame.topic, "first state frame decoded; monitoring active");
                }
            }
            Err(e) => {
                let total = stats.decode_errors.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(error = %e, decode_errors = total, "dropping malformed state frame");
            }
        }
    }
    debug!("telemetry pump exited");
}

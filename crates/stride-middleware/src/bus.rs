//! Topic-based telemetry bus.
//!
//! The behavior core never talks to the robot's DDS transport directly.  It
//! consumes raw state frames through the [`TelemetryBus`] trait, which any
//! transport adapter can implement.
//!
//! [`LocalTelemetryBus`] is the in-process implementation: one
//! [`tokio::sync::broadcast`] channel per topic, so every subscriber sees
//! every frame and a slow subscriber only loses its own oldest frames.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use stride_types::{RawFrame, StrideError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default per-topic channel capacity (frames buffered before the oldest are
/// dropped for slow subscribers).
pub const DEFAULT_CAPACITY: usize = 256;

/// Topic on which the robot publishes its sport-mode state.
pub const SPORT_STATE_TOPIC: &str = "rt/sportmodestate";

/// Stream of raw frames returned by [`TelemetryBus::subscribe`].
///
/// Dropping the stream releases the subscription.
pub type FrameStream = BoxStream<'static, RawFrame>;

/// A source of timestamped raw state frames.
///
/// Frames arrive at an external cadence that is not fully reliable: gaps,
/// bursts and malformed payloads are all expected.
#[async_trait]
pub trait TelemetryBus: Send + Sync {
    /// Open a subscription on `topic`.
    ///
    /// # Errors
    ///
    /// [`StrideError::TransportUnavailable`] when the transport cannot be
    /// reached.
    async fn subscribe(&self, topic: &str) -> Result<FrameStream, StrideError>;

    /// Release any transport-side resources held for `topic`.
    async fn unsubscribe(&self, topic: &str) -> Result<(), StrideError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LocalTelemetryBus
// ────────────────────────────────────────────────────────────────────────────

/// In-process telemetry bus.  Clone it cheaply – all clones share the same
/// topic channels.
#[derive(Clone, Debug)]
pub struct LocalTelemetryBus {
    inner: Arc<BusInner>,
}

#[derive(Debug)]
struct BusInner {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<RawFrame>>>,
    online: AtomicBool,
}

impl LocalTelemetryBus {
    /// Create a bus whose topic channels each buffer `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                capacity,
                topics: Mutex::new(HashMap::new()),
                online: AtomicBool::new(true),
            }),
        }
    }

    /// Publish `payload` on `topic`, stamping it with the current instant.
    ///
    /// Returns the number of subscribers handed the frame; `Ok(0)` when
    /// nobody is listening.
    pub fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<usize, StrideError> {
        self.publish_frame(RawFrame {
            topic: topic.to_string(),
            received_at: Instant::now(),
            payload,
        })
    }

    /// Publish an already-built frame on its own topic.
    pub fn publish_frame(&self, frame: RawFrame) -> Result<usize, StrideError> {
        if !self.is_online() {
            return Err(StrideError::TransportUnavailable(
                "local telemetry bus is offline".to_string(),
            ));
        }
        let sender = self.sender(&frame.topic);
        // A send error only means there are no receivers right now.
        Ok(sender.send(frame).unwrap_or(0))
    }

    /// Take the bus offline or bring it back.
    ///
    /// Going offline closes every topic channel, ending all open streams, and
    /// makes subsequent subscribes fail.
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::SeqCst);
        if !online {
            self.topics().clear();
            warn!("local telemetry bus taken offline; open streams closed");
        }
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics()
            .get(topic)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }

    fn topics(&self) -> std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<RawFrame>>> {
        self.inner
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<RawFrame> {
        self.topics()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
            .clone()
    }
}

impl Default for LocalTelemetryBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl TelemetryBus for LocalTelemetryBus {
    async fn subscribe(&self, topic: &str) -> Result<FrameStream, StrideError> {
        if !self.is_online() {
            return Err(StrideError::TransportUnavailable(
                "local telemetry bus is offline".to_string(),
            ));
        }
        let receiver = self.sender(topic).subscribe();
        debug!(topic, "telemetry subscription opened");
        Ok(frame_stream(topic.to_string(), receiver))
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), StrideError> {
        // Receivers are released when their stream is dropped.
        debug!(topic, "telemetry subscription released");
        Ok(())
    }
}

/// Adapt a broadcast receiver into a [`FrameStream`].  Lag is logged and
/// skipped; the stream ends when the channel closes.
fn frame_stream(topic: String, receiver: broadcast::Receiver<RawFrame>) -> FrameStream {
    stream::unfold((topic, receiver), |(topic, mut receiver)| async move {
        loop {
            match receiver.recv().await {
                Ok(frame) => return Some((frame, (topic, receiver))),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = %topic, lagged_by = n, "telemetry subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

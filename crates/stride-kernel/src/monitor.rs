//! [`StabilityMonitor`] – bounded polling of the live snapshot for stability.
//!
//! Waits never spin: the store is sampled once per `poll_interval`, which is
//! clamped to [`MIN_POLL_INTERVAL`]..=[`MAX_POLL_INTERVAL`], and every wait
//! returns by its deadline.  The cancellable variant also wakes immediately
//! when its [`CancellationToken`] fires.

use std::time::Duration;

use stride_perception::SnapshotReader;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::stability::{StabilityThresholds, StabilityVerdict, evaluate};

pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Clamp a requested poll interval into the supported range.
pub fn clamp_poll_interval(requested: Duration) -> Duration {
    requested.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}

/// How a cancellable stability wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Stable,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct StabilityMonitor {
    reader: SnapshotReader,
    thresholds: StabilityThresholds,
    poll_interval: Duration,
}

impl StabilityMonitor {
    pub fn new(reader: SnapshotReader, thresholds: StabilityThresholds, poll_interval: Duration) -> Self {
        Self {
            reader,
            thresholds,
            poll_interval: clamp_poll_interval(poll_interval),
        }
    }

    pub fn thresholds(&self) -> &StabilityThresholds {
        &self.thresholds
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Verdict for the current snapshot, or `None` when there is no data.
    pub fn evaluate_current(&self) -> Option<StabilityVerdict> {
        self.reader
            .current()
            .map(|snapshot| evaluate(&snapshot, &self.thresholds))
    }

    /// Poll until a stable verdict is observed or `timeout` elapses.
    ///
    /// Returns `false` on timeout; a missing snapshot counts as not stable.
    pub async fn wait_for_stable(&self, timeout: Duration) -> bool {
        let never = CancellationToken::new();
        self.wait_until_stable(timeout, &never).await == WaitOutcome::Stable
    }

    /// Like [`wait_for_stable`][Self::wait_for_stable] but also ends early
    /// with [`WaitOutcome::Cancelled`] when `cancel` fires.
    pub async fn wait_until_stable(&self, timeout: Duration, cancel: &CancellationToken) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            if cancel.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            if self.evaluate_current().is_some_and(|v| v.stable) {
                return WaitOutcome::Stable;
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(?timeout, "stability wait timed out");
                return WaitOutcome::TimedOut;
            }
            let nap = self.poll_interval.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return WaitOutcome::Cancelled,
                _ = tokio::time::sleep(nap) => {}
            }
        }
    }
}

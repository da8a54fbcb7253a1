//! [`MonitoringSession`] – lifecycle of the state-monitoring subscription.
//!
//! ```text
//! Uninitialized ──start──▶ Subscribing ──first decoded frame──▶ Active
//!       │                       │                                 │
//!       └─────────stop──────────┴──────────────stop───────────────┴──▶ Stopped
//! ```
//!
//! The state lives in a single atomic so readers (the behavior sequencer)
//! never observe a half-applied transition.  Only the telemetry ingest
//! drives transitions.

use std::sync::atomic::{AtomicU8, Ordering};

use stride_types::MonitoringState;

#[derive(Debug)]
pub struct MonitoringSession {
    state: AtomicU8,
}

impl MonitoringSession {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(MonitoringState::Uninitialized as u8),
        }
    }

    pub fn state(&self) -> MonitoringState {
        MonitoringState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `true` only once a frame has been decoded and the session has not
    /// been stopped since.
    pub fn is_active(&self) -> bool {
        self.state() == MonitoringState::Active
    }

    /// Enter `Subscribing`.  Called after the bus subscription is open.
    pub(crate) fn begin_subscribing(&self) {
        self.state
            .store(MonitoringState::Subscribing as u8, Ordering::Release);
    }

    /// Promote `Subscribing → Active`.
    ///
    /// Returns `true` only for the call that performed the transition, so
    /// the caller can log the first frame exactly once.
    pub(crate) fn mark_active(&self) -> bool {
        self.state
            .compare_exchange(
                MonitoringState::Subscribing as u8,
                MonitoringState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn stop(&self) {
        self.state.store(MonitoringState::Stopped as u8, Ordering::Release);
    }
}

impl Default for MonitoringSession {
    fn default() -> Self {
        Self::new()
    }
}

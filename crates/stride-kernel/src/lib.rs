//! `stride-kernel` – safety judgement
//!
//! Decides whether the robot is in a safe, stable state.  It does not move
//! anything; it only judges snapshots.
//!
//! # Modules
//!
//! - [`stability`] – the pure [`evaluate`][stability::evaluate] function and
//!   its [`StabilityThresholds`][stability::StabilityThresholds].
//! - [`monitor`] – [`StabilityMonitor`][monitor::StabilityMonitor]: bounded,
//!   cancellable polling of the live snapshot until it is stable.
//! - [`report`] – [`StateReport`][report::StateReport]: the structured state
//!   summary shown to operators.

pub mod monitor;
pub mod report;
pub mod stability;

pub use monitor::{
    DEFAULT_POLL_INTERVAL, MAX_POLL_INTERVAL, MIN_POLL_INTERVAL, StabilityMonitor, WaitOutcome,
    clamp_poll_interval,
};
pub use report::{BalanceStatus, MotionStatus, StateReport};
pub use stability::{StabilityThresholds, StabilityVerdict, evaluate};

//! `stride-middleware` – telemetry transport plumbing
//!
//! Moves raw state frames from the robot to the behavior core without caring
//! about their meaning.
//!
//! # Modules
//!
//! - [`bus`] – the [`TelemetryBus`] trait consumed by the telemetry ingest,
//!   and [`LocalTelemetryBus`], an in-process topic bus built on Tokio
//!   broadcast channels.

pub mod bus;

pub use bus::{FrameStream, LocalTelemetryBus, SPORT_STATE_TOPIC, TelemetryBus};

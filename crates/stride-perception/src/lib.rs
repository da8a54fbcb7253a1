//! `stride-perception` – state monitoring
//!
//! Turns the asynchronous, possibly unreliable telemetry feed into a
//! consistent, queryable view of robot state.
//!
//! # Modules
//!
//! - [`ingest`] – [`TelemetryIngest`][ingest::TelemetryIngest]: subscribes to
//!   a [`TelemetryBus`][stride_middleware::TelemetryBus], decodes frames in a
//!   background task and tracks feed liveness.
//! - [`store`] – [`SnapshotStore`][store::SnapshotStore]: lock-free,
//!   last-write-wins holder of the latest snapshot, read through
//!   [`SnapshotReader`][store::SnapshotReader].
//! - [`session`] – [`MonitoringSession`][session::MonitoringSession]: the
//!   `Uninitialized → Subscribing → Active → Stopped` state machine.
//! - [`decode`] – JSON wire format of sport-mode state frames.

pub mod decode;
pub mod ingest;
pub mod session;
pub mod store;

pub use decode::{ImuFrame, SportModeFrame, decode_frame};
pub use ingest::{IngestConfig, IngestCounters, Liveness, TelemetryIngest};
pub use session::MonitoringSession;
pub use store::{SnapshotReader, SnapshotStore};

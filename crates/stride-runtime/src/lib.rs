//! `stride-runtime` – behavior execution
//!
//! Turns catalogued behaviors into supervised sequences of motion
//! primitives.
//!
//! # Modules
//!
//! - [`behavior`] – [`BehaviorDefinition`][behavior::BehaviorDefinition] and
//!   the tagged [`Step`][behavior::Step] variants it is built from.
//! - [`catalog`] – [`BehaviorCatalog`][catalog::BehaviorCatalog]: validated
//!   registry keyed by id, searchable by name.
//! - [`standard`] – the built-in sport-mode catalog (ids 0–23).
//! - [`sequencer`] – [`BehaviorSequencer`][sequencer::BehaviorSequencer]:
//!   runs one behavior at a time against an
//!   [`ActuationService`][stride_hal::ActuationService], gated by the
//!   monitoring session and the stability evaluator, cancellable through a
//!   [`CancellationToken`][tokio_util::sync::CancellationToken].
//! - [`trigger`] – [`TriggerDispatcher`][trigger::TriggerDispatcher]:
//!   cooldown-gated routing of operator triggers (hand signs, keys) into
//!   the sequencer; triggers arriving while a behavior runs are dropped.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP export.
//!
//! # Safety stop
//!
//! Whenever an invocation aborts, for any reason, the sequencer calls
//! [`ActuationService::stop`][stride_hal::ActuationService::stop] exactly once
//! before returning.

pub mod behavior;
pub mod catalog;
pub mod sequencer;
pub mod standard;
pub mod telemetry;
pub mod trigger;

pub use behavior::{BehaviorDefinition, MAX_SETTLE_TIMEOUT, OnTimeout, PositionMark, Step};
pub use catalog::{BehaviorCatalog, CatalogEntry};
pub use sequencer::{BehaviorExecutionResult, BehaviorSequencer, Outcome, STOP_TIMEOUT, SequencerConfig};
pub use standard::{standard_behaviors, standard_catalog};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
pub use trigger::{DEFAULT_TRIGGER_COOLDOWN, Dispatch, TriggerDispatcher, standard_triggers};

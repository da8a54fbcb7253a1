//! `stride-hal` – actuation boundary
//!
//! Everything that commands the robot sits behind the
//! [`ActuationService`][actuation::ActuationService] trait.
//!
//! # Modules
//!
//! - [`actuation`] – the trait, [`Ticket`][actuation::Ticket] and
//!   [`Acceptance`][actuation::Acceptance].
//! - [`sim`] – [`SimQuadruped`][sim::SimQuadruped], a kinematic stand-in
//!   that also publishes telemetry frames.
//! - [`spy`] – [`RecordingActuation`][spy::RecordingActuation], a recording
//!   test double.

pub mod actuation;
pub mod sim;
pub mod spy;

pub use actuation::{Acceptance, ActuationService, Ticket};
pub use sim::SimQuadruped;
pub use spy::{Completion, IssuedCommand, RecordingActuation};

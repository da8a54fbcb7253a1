//! The `ActuationService` trait: the only way Stride moves the robot.
//!
//! Implementations accept high-level [`Primitive`] commands and report their
//! completion through a pollable [`Ticket`].  The sequencer never talks to a
//! driver directly, so the real robot, the [`SimQuadruped`][crate::sim::SimQuadruped]
//! and the test [`RecordingActuation`][crate::spy::RecordingActuation] are
//! interchangeable.

use async_trait::async_trait;
use stride_types::{Primitive, PrimitiveParams, StrideError};

/// Handle for one accepted primitive, used to poll its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(pub u64);

/// Immediate answer to [`ActuationService::issue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceptance {
    Accepted(Ticket),
    /// The service refused the command; the string is its stated reason.
    Rejected(String),
}

impl Acceptance {
    pub fn ticket(&self) -> Option<Ticket> {
        match self {
            Acceptance::Accepted(ticket) => Some(*ticket),
            Acceptance::Rejected(_) => None,
        }
    }
}

/// A service that executes motion primitives on a robot.
#[async_trait]
pub trait ActuationService: Send + Sync {
    /// Submit `primitive` for execution.
    ///
    /// # Errors
    ///
    /// Returns [`StrideError::Actuation`] when the service cannot be reached.
    /// A reachable service that declines the command answers
    /// [`Acceptance::Rejected`] instead.
    async fn issue(&self, primitive: Primitive, params: PrimitiveParams) -> Result<Acceptance, StrideError>;

    /// Whether the primitive behind `ticket` has finished.
    async fn is_complete(&self, ticket: Ticket) -> Result<bool, StrideError>;

    /// Bring the robot to a neutral, stationary state.  Callable at any time.
    async fn stop(&self) -> Result<(), StrideError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_only_for_accepted() {
        assert_eq!(Acceptance::Accepted(Ticket(4)).ticket(), Some(Ticket(4)));
        assert_eq!(Acceptance::Rejected("busy".into()).ticket(), None);
    }
}

//! In-memory [`ActuationService`] that records every call.
//!
//! [`RecordingActuation`] never moves anything.  It is configured up front
//! with which primitives to reject, how long accepted primitives take to
//! complete, and whether `stop()` should fail or calls should hang, then
//! inspected after the run:
//!
//! ```rust
//! use stride_hal::spy::{Completion, RecordingActuation};
//! use stride_types::Primitive;
//!
//! let spy = RecordingActuation::new()
//!     .rejecting(Primitive::BackFlip)
//!     .with_completion_for(Primitive::Move, Completion::Never);
//! assert_eq!(spy.stop_count(), 0);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use stride_types::{Primitive, PrimitiveParams, StrideError};
use tokio::time::Instant;

use crate::actuation::{Acceptance, ActuationService, Ticket};

/// When an accepted primitive reports completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Immediate,
    Never,
    After(Duration),
}

/// One recorded `issue` call.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedCommand {
    pub primitive: Primitive,
    pub params: PrimitiveParams,
    /// `None` when the spy rejected the command.
    pub ticket: Option<Ticket>,
}

type IssueHook = Arc<dyn Fn(Primitive, PrimitiveParams) + Send + Sync>;

#[derive(Default)]
struct SpyState {
    issued: Vec<IssuedCommand>,
    /// Accepted tickets that have not reported completion yet.
    pending: HashMap<Ticket, (Instant, Completion)>,
    next_ticket: u64,
    stops: usize,
}

pub struct RecordingActuation {
    state: Mutex<SpyState>,
    default_completion: Completion,
    completion_for: HashMap<Primitive, Completion>,
    rejected: HashSet<Primitive>,
    unreachable: bool,
    failing_stop: bool,
    stall_issue: bool,
    stall_queries: bool,
    stall_stop: bool,
    on_issue: Option<IssueHook>,
}

impl Default for RecordingActuation {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingActuation {
    /// Accepts everything and completes immediately.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SpyState::default()),
            default_completion: Completion::Immediate,
            completion_for: HashMap::new(),
            rejected: HashSet::new(),
            unreachable: false,
            failing_stop: false,
            stall_issue: false,
            stall_queries: false,
            stall_stop: false,
            on_issue: None,
        }
    }

    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.default_completion = completion;
        self
    }

    pub fn with_completion_for(mut self, primitive: Primitive, completion: Completion) -> Self {
        self.completion_for.insert(primitive, completion);
        self
    }

    pub fn rejecting(mut self, primitive: Primitive) -> Self {
        self.rejected.insert(primitive);
        self
    }

    /// Every `issue` fails with a transport error.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// `stop()` is still counted but returns an error.
    pub fn failing_stop(mut self) -> Self {
        self.failing_stop = true;
        self
    }

    /// Every `issue` is recorded and then never answers.
    pub fn stalling_issue(mut self) -> Self {
        self.stall_issue = true;
        self
    }

    /// Every `is_complete` query never answers.
    pub fn stalling_queries(mut self) -> Self {
        self.stall_queries = true;
        self
    }

    /// `stop()` is counted and then never answers.
    pub fn stalling_stop(mut self) -> Self {
        self.stall_stop = true;
        self
    }

    /// Run `hook` for every accepted primitive, e.g. to publish the state
    /// change a real robot would report.
    pub fn on_issue(mut self, hook: impl Fn(Primitive, PrimitiveParams) + Send + Sync + 'static) -> Self {
        self.on_issue = Some(Arc::new(hook));
        self
    }

    pub fn issued(&self) -> Vec<IssuedCommand> {
        self.lock().issued.clone()
    }

    /// Primitives passed to `issue`, accepted or not, in call order.
    pub fn primitives(&self) -> Vec<Primitive> {
        self.lock().issued.iter().map(|c| c.primitive).collect()
    }

    pub fn stop_count(&self) -> usize {
        self.lock().stops
    }

    /// Accepted tickets still waiting to report completion.
    pub fn in_flight(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SpyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ActuationService for RecordingActuation {
    async fn issue(&self, primitive: Primitive, params: PrimitiveParams) -> Result<Acceptance, StrideError> {
        if self.stall_issue {
            self.lock().issued.push(IssuedCommand {
                primitive,
                params,
                ticket: None,
            });
            return std::future::pending().await;
        }
        if self.unreachable {
            self.lock().issued.push(IssuedCommand {
                primitive,
                params,
                ticket: None,
            });
            return Err(StrideError::Actuation("actuation service unreachable".into()));
        }

        let acceptance = {
            let mut state = self.lock();
            if self.rejected.contains(&primitive) {
                state.issued.push(IssuedCommand {
                    primitive,
                    params,
                    ticket: None,
                });
                return Ok(Acceptance::Rejected(format!("{primitive} not permitted")));
            }
            state.next_ticket += 1;
            let ticket = Ticket(state.next_ticket);
            let completion = self
                .completion_for
                .get(&primitive)
                .copied()
                .unwrap_or(self.default_completion);
            state.pending.insert(ticket, (Instant::now(), completion));
            state.issued.push(IssuedCommand {
                primitive,
                params,
                ticket: Some(ticket),
            });
            Acceptance::Accepted(ticket)
        };

        if let Some(hook) = &self.on_issue {
            hook(primitive, params);
        }
        Ok(acceptance)
    }

    async fn is_complete(&self, ticket: Ticket) -> Result<bool, StrideError> {
        if self.stall_queries {
            return std::future::pending().await;
        }
        let mut state = self.lock();
        let Some(&(issued_at, completion)) = state.pending.get(&ticket) else {
            // Tickets are handed out in order; an issued one that is no
            // longer pending has completed.
            return if ticket.0 > 0 && ticket.0 <= state.next_ticket {
                Ok(true)
            } else {
                Err(StrideError::Actuation(format!("unknown ticket {}", ticket.0)))
            };
        };
        let done = match completion {
            Completion::Immediate => true,
            Completion::Never => false,
            Completion::After(delay) => issued_at.elapsed() >= delay,
        };
        if done {
            state.pending.remove(&ticket);
        }
        Ok(done)
    }

    async fn stop(&self) -> Result<(), StrideError> {
        {
            let mut state = self.lock();
            state.stops += 1;
            state.pending.clear();
        }
        if self.stall_stop {
            return std::future::pending().await;
        }
        if self.failing_stop {
            return Err(StrideError::Actuation("stop command failed".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn records_accepted_and_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let spy = RecordingActuation::new().rejecting(Primitive::BackFlip);

        let accepted = spy.issue(Primitive::StandUp, PrimitiveParams::None).await?;
        let rejected = spy.issue(Primitive::BackFlip, PrimitiveParams::None).await?;

        assert!(matches!(accepted, Acceptance::Accepted(_)));
        assert!(matches!(rejected, Acceptance::Rejected(_)));
        assert_eq!(spy.primitives(), vec![Primitive::StandUp, Primitive::BackFlip]);
        assert_eq!(spy.issued()[1].ticket, None);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_completion_follows_clock() -> Result<(), Box<dyn std::error::Error>> {
        let spy = RecordingActuation::new().with_completion(Completion::After(Duration::from_millis(500)));
        let ticket = spy
            .issue(Primitive::Hello, PrimitiveParams::None)
            .await?
            .ticket()
            .ok_or("expected ticket")?;

        assert!(!spy.is_complete(ticket).await?);
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(spy.is_complete(ticket).await?);
        Ok(())
    }

    #[tokio::test]
    async fn per_primitive_completion_overrides_default() -> Result<(), Box<dyn std::error::Error>> {
        let spy = RecordingActuation::new().with_completion_for(Primitive::Move, Completion::Never);
        let walk = spy
            .issue(Primitive::Move, PrimitiveParams::Velocity { vx: 0.3, vy: 0.0, vyaw: 0.0 })
            .await?
            .ticket()
            .ok_or("expected ticket")?;
        let stand = spy
            .issue(Primitive::StandUp, PrimitiveParams::None)
            .await?
            .ticket()
            .ok_or("expected ticket")?;

        assert!(!spy.is_complete(walk).await?);
        assert!(spy.is_complete(stand).await?);
        Ok(())
    }

    #[tokio::test]
    async fn completed_and_stopped_tickets_are_released() -> Result<(), Box<dyn std::error::Error>> {
        let spy = RecordingActuation::new().with_completion_for(Primitive::Move, Completion::Never);
        let stand = spy
            .issue(Primitive::StandUp, PrimitiveParams::None)
            .await?
            .ticket()
            .ok_or("expected ticket")?;
        let walk = spy
            .issue(Primitive::Move, PrimitiveParams::Velocity { vx: 0.3, vy: 0.0, vyaw: 0.0 })
            .await?
            .ticket()
            .ok_or("expected ticket")?;
        assert_eq!(spy.in_flight(), 2);

        assert!(spy.is_complete(stand).await?);
        assert_eq!(spy.in_flight(), 1);
        assert!(spy.is_complete(stand).await?);

        spy.stop().await?;
        assert_eq!(spy.in_flight(), 0);
        assert!(spy.is_complete(walk).await?);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn stalling_issue_never_answers_but_is_recorded() {
        let spy = RecordingActuation::new().stalling_issue();
        let answer = tokio::time::timeout(
            Duration::from_secs(60),
            spy.issue(Primitive::StandUp, PrimitiveParams::None),
        )
        .await;
        assert!(answer.is_err());
        assert_eq!(spy.primitives(), vec![Primitive::StandUp]);
    }

    #[tokio::test]
    async fn unknown_ticket_is_an_error() {
        let spy = RecordingActuation::new();
        assert!(spy.is_complete(Ticket(99)).await.is_err());
    }

    #[tokio::test]
    async fn failing_stop_still_counts() {
        let spy = RecordingActuation::new().failing_stop();
        assert!(spy.stop().await.is_err());
        assert_eq!(spy.stop_count(), 1);
    }

    #[tokio::test]
    async fn unreachable_service_errors() {
        let spy = RecordingActuation::new().unreachable();
        let err = spy.issue(Primitive::StandUp, PrimitiveParams::None).await;
        assert!(matches!(err, Err(StrideError::Actuation(_))));
        assert_eq!(spy.primitives(), vec![Primitive::StandUp]);
    }

    #[tokio::test]
    async fn issue_hook_runs_for_accepted_only() -> Result<(), Box<dyn std::error::Error>> {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let spy = RecordingActuation::new()
            .rejecting(Primitive::LeftFlip)
            .on_issue(move |_, _| {
                seen.fetch_add(1, Ordering::SeqCst);
            });

        spy.issue(Primitive::StandDown, PrimitiveParams::None).await?;
        spy.issue(Primitive::LeftFlip, PrimitiveParams::None).await?;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }
}

//! Behavior definitions: named, ordered step lists.
//!
//! A behavior is data, not code.  Each [`Step`] is one of:
//!
//! | Step               | Meaning                                                        |
//! |--------------------|----------------------------------------------------------------|
//! | `Primitive`        | Issue a motion primitive, then wait for it to settle.          |
//! | `WaitForStable`    | Poll the stability evaluator until stable or timed out.        |
//! | `Conditional`      | Pick a branch from a predicate over a fresh snapshot.          |
//! | `Report`           | Render a message from the current snapshot.                    |
//! | `RecordPosition`   | Mark the start/end position for displacement measurement.      |
//!
//! Every wait is bounded: primitive settle timeouts must lie in
//! `(0, MAX_SETTLE_TIMEOUT]`, and so must stability-wait timeouts.
//! [`BehaviorDefinition::validate`] enforces this at registration.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use stride_runtime::behavior::{BehaviorDefinition, Step};
//! use stride_types::Primitive;
//!
//! let def = BehaviorDefinition::new(
//!     100,
//!     "stand_and_settle",
//!     vec![
//!         Step::primitive(Primitive::StandUp, Duration::from_secs(2)),
//!         Step::wait_for_stable(Duration::from_secs(3)),
//!     ],
//! )
//! .requiring_state_monitoring();
//! assert!(def.validate().is_ok());
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use stride_types::{Primitive, PrimitiveParams, StateSnapshot, StrideError};

/// Upper bound for any single step wait.
pub const MAX_SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do when a bounded wait runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnTimeout {
    /// End the invocation as aborted.
    Abort,
    /// Log and move on to the next step.
    #[default]
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionMark {
    Start,
    End,
}

pub type Predicate = Arc<dyn Fn(&StateSnapshot) -> bool + Send + Sync>;
pub type Reporter = Arc<dyn Fn(Option<&StateSnapshot>) -> String + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Step
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum Step {
    Primitive {
        primitive: Primitive,
        params: PrimitiveParams,
        settle_timeout: Duration,
        on_settle_timeout: OnTimeout,
    },
    WaitForStable {
        timeout: Duration,
        on_timeout: OnTimeout,
    },
    Conditional {
        label: String,
        predicate: Predicate,
        then_steps: Vec<Step>,
        else_steps: Vec<Step>,
    },
    Report {
        label: String,
        reporter: Reporter,
    },
    RecordPosition(PositionMark),
}

impl Step {
    /// A parameterless primitive that proceeds once `settle_timeout` elapses
    /// even if the robot has not reported completion.
    pub fn primitive(primitive: Primitive, settle_timeout: Duration) -> Self {
        Step::Primitive {
            primitive,
            params: PrimitiveParams::None,
            settle_timeout,
            on_settle_timeout: OnTimeout::Continue,
        }
    }

    /// Walk at the given body velocity for `duration`.
    ///
    /// Velocity commands never report completion, so the settle timeout is
    /// the walk duration.
    pub fn walk(vx: f64, vy: f64, vyaw: f64, duration: Duration) -> Self {
        Step::Primitive {
            primitive: Primitive::Move,
            params: PrimitiveParams::Velocity { vx, vy, vyaw },
            settle_timeout: duration,
            on_settle_timeout: OnTimeout::Continue,
        }
    }

    /// Enable or disable a switch primitive.
    pub fn toggle(primitive: Primitive, enabled: bool, settle_timeout: Duration) -> Self {
        Step::Primitive {
            primitive,
            params: PrimitiveParams::Toggle(enabled),
            settle_timeout,
            on_settle_timeout: OnTimeout::Continue,
        }
    }

    /// Wait for a stable verdict.  The timeout is advisory unless
    /// [`abort_on_timeout`][Self::abort_on_timeout] turns it into
    /// `InstabilityDetected`.
    pub fn wait_for_stable(timeout: Duration) -> Self {
        Step::WaitForStable {
            timeout,
            on_timeout: OnTimeout::Continue,
        }
    }

    pub fn when(
        label: impl Into<String>,
        predicate: impl Fn(&StateSnapshot) -> bool + Send + Sync + 'static,
        then_steps: Vec<Step>,
        else_steps: Vec<Step>,
    ) -> Self {
        Step::Conditional {
            label: label.into(),
            predicate: Arc::new(predicate),
            then_steps,
            else_steps,
        }
    }

    pub fn report(
        label: impl Into<String>,
        reporter: impl Fn(Option<&StateSnapshot>) -> String + Send + Sync + 'static,
    ) -> Self {
        Step::Report {
            label: label.into(),
            reporter: Arc::new(reporter),
        }
    }

    pub fn record_start() -> Self {
        Step::RecordPosition(PositionMark::Start)
    }

    pub fn record_end() -> Self {
        Step::RecordPosition(PositionMark::End)
    }

    /// Make a timed-out primitive or stability wait end the invocation.
    pub fn abort_on_timeout(self) -> Self {
        self.with_timeout_policy(OnTimeout::Abort)
    }

    /// Make a timed-out primitive or stability wait advisory.
    pub fn continue_on_timeout(self) -> Self {
        self.with_timeout_policy(OnTimeout::Continue)
    }

    fn with_timeout_policy(mut self, policy: OnTimeout) -> Self {
        match &mut self {
            Step::Primitive { on_settle_timeout, .. } => *on_settle_timeout = policy,
            Step::WaitForStable { on_timeout, .. } => *on_timeout = policy,
            _ => {}
        }
        self
    }

    /// Short description used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Primitive { .. } => "primitive",
            Step::WaitForStable { .. } => "wait_for_stable",
            Step::Conditional { .. } => "conditional",
            Step::Report { .. } => "report",
            Step::RecordPosition(_) => "record_position",
        }
    }

    fn validate(&self, path: &str) -> Result<(), String> {
        match self {
            Step::Primitive {
                primitive,
                params,
                settle_timeout,
                ..
            } => {
                check_timeout(path, "settle timeout", *settle_timeout)?;
                if params.kind() != primitive.param_kind() {
                    return Err(format!(
                        "{path}: {primitive} expects {:?} parameters, got {:?}",
                        primitive.param_kind(),
                        params.kind()
                    ));
                }
                Ok(())
            }
            Step::WaitForStable { timeout, .. } => check_timeout(path, "stability timeout", *timeout),
            Step::Conditional {
                then_steps, else_steps, ..
            } => {
                for (i, step) in then_steps.iter().enumerate() {
                    step.validate(&format!("{path}.then[{i}]"))?;
                }
                for (i, step) in else_steps.iter().enumerate() {
                    step.validate(&format!("{path}.else[{i}]"))?;
                }
                Ok(())
            }
            Step::Report { .. } | Step::RecordPosition(_) => Ok(()),
        }
    }
}

fn check_timeout(path: &str, what: &str, timeout: Duration) -> Result<(), String> {
    if timeout.is_zero() || timeout > MAX_SETTLE_TIMEOUT {
        return Err(format!(
            "{path}: {what} {timeout:?} outside (0, {MAX_SETTLE_TIMEOUT:?}]"
        ));
    }
    Ok(())
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Primitive {
                primitive,
                params,
                settle_timeout,
                on_settle_timeout,
            } => f
                .debug_struct("Primitive")
                .field("primitive", primitive)
                .field("params", params)
                .field("settle_timeout", settle_timeout)
                .field("on_settle_timeout", on_settle_timeout)
                .finish(),
            Step::WaitForStable { timeout, on_timeout } => f
                .debug_struct("WaitForStable")
                .field("timeout", timeout)
                .field("on_timeout", on_timeout)
                .finish(),
            Step::Conditional {
                label,
                then_steps,
                else_steps,
                ..
            } => f
                .debug_struct("Conditional")
                .field("label", label)
                .field("then_steps", then_steps)
                .field("else_steps", else_steps)
                .finish_non_exhaustive(),
            Step::Report { label, .. } => f.debug_struct("Report").field("label", label).finish_non_exhaustive(),
            Step::RecordPosition(mark) => f.debug_tuple("RecordPosition").field(mark).finish(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BehaviorDefinition
// ─────────────────────────────────────────────────────────────────────────────

/// A named, catalogued behavior.
#[derive(Debug, Clone)]
pub struct BehaviorDefinition {
    pub id: u32,
    pub name: String,
    pub steps: Vec<Step>,
    /// Refuse to run unless the monitoring session is `Active`.
    pub requires_state_monitoring: bool,
    pub enabled: bool,
}

impl BehaviorDefinition {
    /// An enabled behavior that does not need live state.
    pub fn new(id: u32, name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id,
            name: name.into(),
            steps,
            requires_state_monitoring: false,
            enabled: true,
        }
    }

    pub fn requiring_state_monitoring(mut self) -> Self {
        self.requires_state_monitoring = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Check the structural invariants.
    ///
    /// # Errors
    ///
    /// [`StrideError::InvalidDefinition`] when the name or step list is
    /// empty, a wait is unbounded or out of range, or a primitive is paired
    /// with the wrong kind of parameters.
    pub fn validate(&self) -> Result<(), StrideError> {
        let invalid = |details: String| StrideError::InvalidDefinition { id: self.id, details };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(invalid("behavior has no steps".to_string()));
        }
        for (i, step) in self.steps.iter().enumerate() {
            step.validate(&format!("step[{i}]")).map_err(invalid)?;
        }
        Ok(())
    }
}

//! [`BehaviorSequencer`] – runs catalogued behaviors step by step.
//!
//! Each invocation moves `Pending → Running → {Completed | Aborted | Rejected}`:
//!
//! 1. **Admission** – unknown ids, disabled behaviors, and behaviors that
//!    need live state while the monitoring session is not `Active` are
//!    `Rejected` before anything is issued.
//! 2. **Execution** – steps run in order.  Conditional branches are pushed
//!    onto an explicit stack of step iterators.  The cancellation token is
//!    checked at every step boundary and raced against every wait.
//! 3. **Abort** – the first failure ends the run.  The actuation service's
//!    `stop()` is called exactly once; if that fails it is logged and the
//!    original abort reason is kept.
//!
//! Only one invocation may run at a time; a concurrent [`run`][BehaviorSequencer::run]
//! fails fast with [`StrideError::Busy`].

use std::slice;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use stride_hal::{Acceptance, ActuationService, Ticket};
use stride_kernel::{DEFAULT_POLL_INTERVAL, StabilityMonitor, StabilityThresholds, WaitOutcome};
use stride_perception::{MonitoringSession, SnapshotReader};
use stride_types::{
    AbortReason, MonitoringState, Primitive, PrimitiveParams, RejectReason, StrideError, Vec3,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::behavior::{BehaviorDefinition, OnTimeout, PositionMark, Step};
use crate::catalog::BehaviorCatalog;

/// Longest the sequencer waits for `stop()` after an abort.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration and results
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct SequencerConfig {
    /// Poll period for settle and stability waits; clamped to 50–200 ms.
    pub poll_interval: Duration,
    pub thresholds: StabilityThresholds,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            thresholds: StabilityThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outcome {
    Completed,
    Aborted(AbortReason),
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Serialize)]
pub struct BehaviorExecutionResult {
    pub behavior_id: u32,
    pub outcome: Outcome,
    /// Horizontal distance between the recorded start and end positions.
    pub measured_displacement: Option<f64>,
    pub elapsed: Duration,
    /// Messages produced by `Report` steps, in order.
    pub reports: Vec<String>,
}

impl BehaviorExecutionResult {
    pub fn is_completed(&self) -> bool {
        self.outcome == Outcome::Completed
    }
}

/// Per-invocation scratch state.
#[derive(Default)]
struct RunContext {
    reports: Vec<String>,
    start: Option<Vec3>,
    end: Option<Vec3>,
}

impl RunContext {
    fn displacement(&self) -> Option<f64> {
        Some(self.start?.horizontal_distance(&self.end?))
    }
}

/// Clears the running flag when the invocation ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BehaviorSequencer
// ─────────────────────────────────────────────────────────────────────────────

pub struct BehaviorSequencer {
    catalog: Arc<BehaviorCatalog>,
    actuation: Arc<dyn ActuationService>,
    reader: SnapshotReader,
    session: Arc<MonitoringSession>,
    monitor: StabilityMonitor,
    running: AtomicBool,
}

impl BehaviorSequencer {
    pub fn new(
        catalog: Arc<BehaviorCatalog>,
        actuation: Arc<dyn ActuationService>,
        reader: SnapshotReader,
        session: Arc<MonitoringSession>,
        config: SequencerConfig,
    ) -> Self {
        let monitor = StabilityMonitor::new(reader.clone(), config.thresholds, config.poll_interval);
        Self {
            catalog,
            actuation,
            reader,
            session,
            monitor,
            running: AtomicBool::new(false),
        }
    }

    pub fn catalog(&self) -> &Arc<BehaviorCatalog> {
        &self.catalog
    }

    pub fn monitor(&self) -> &StabilityMonitor {
        &self.monitor
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run behavior `id` to completion, abort, or rejection.
    ///
    /// Rejections and aborts are reported in the returned
    /// [`BehaviorExecutionResult`], not as errors.
    ///
    /// # Errors
    ///
    /// [`StrideError::Busy`] if another invocation is already running.
    #[instrument(skip(self, cancel))]
    pub async fn run(&self, id: u32, cancel: &CancellationToken) -> Result<BehaviorExecutionResult, StrideError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            warn!("sequencer busy; invocation refused");
            return Err(StrideError::Busy);
        };
        let started = Instant::now();
        let mut ctx = RunContext::default();

        let outcome = match self.admit(id) {
            Err(reason) => {
                info!(%reason, "behavior rejected");
                Outcome::Rejected(reason)
            }
            Ok(definition) => {
                info!(name = %definition.name, steps = definition.steps.len(), "behavior started");
                match self.execute(&definition.steps, cancel, &mut ctx).await {
                    Ok(()) => {
                        info!(name = %definition.name, "behavior completed");
                        Outcome::Completed
                    }
                    Err(reason) => {
                        warn!(name = %definition.name, %reason, "behavior aborted");
                        self.safe_stop().await;
                        Outcome::Aborted(reason)
                    }
                }
            }
        };

        let measured_displacement = ctx.displacement();
        if let Some(distance) = measured_displacement {
            info!(distance_m = distance, "measured displacement");
        }
        Ok(BehaviorExecutionResult {
            behavior_id: id,
            outcome,
            measured_displacement,
            elapsed: started.elapsed(),
            reports: ctx.reports,
        })
    }

    fn admit(&self, id: u32) -> Result<Arc<BehaviorDefinition>, RejectReason> {
        let definition = self.catalog.lookup(id).ok_or(RejectReason::UnknownBehavior(id))?;
        if !definition.enabled {
            return Err(RejectReason::Disabled);
        }
        if definition.requires_state_monitoring {
            let state = self.session.state();
            if state != MonitoringState::Active {
                return Err(RejectReason::MonitoringInactive(state));
            }
        }
        Ok(definition)
    }

    async fn execute(
        &self,
        steps: &[Step],
        cancel: &CancellationToken,
        ctx: &mut RunContext,
    ) -> Result<(), AbortReason> {
        let mut stack: Vec<slice::Iter<'_, Step>> = vec![steps.iter()];

        while let Some(frame) = stack.last_mut() {
            let Some(step) = frame.next() else {
                stack.pop();
                continue;
            };
            if cancel.is_cancelled() {
                return Err(AbortReason::Cancelled);
            }
            debug!(step = step.kind(), depth = stack.len(), "step");

            match step {
                Step::Primitive {
                    primitive,
                    params,
                    settle_timeout,
                    on_settle_timeout,
                } => {
                    self.run_primitive(*primitive, *params, *settle_timeout, *on_settle_timeout, cancel)
                        .await?;
                }
                Step::WaitForStable { timeout, on_timeout } => {
                    self.wait_for_stable(*timeout, *on_timeout, cancel).await?;
                }
                Step::Conditional {
                    label,
                    predicate,
                    then_steps,
                    else_steps,
                } => {
                    let snapshot = self.reader.current();
                    let taken = snapshot.as_deref().is_some_and(|s| predicate(s));
                    debug!(%label, taken, has_snapshot = snapshot.is_some(), "conditional evaluated");
                    stack.push(if taken { then_steps.iter() } else { else_steps.iter() });
                }
                Step::Report { label, reporter } => {
                    let message = reporter(self.reader.current().as_deref());
                    info!(%label, %message, "report");
                    ctx.reports.push(message);
                }
                Step::RecordPosition(mark) => {
                    let position = self.reader.current().map(|s| s.position);
                    if position.is_none() {
                        debug!(?mark, "no snapshot; position not recorded");
                    }
                    match mark {
                        PositionMark::Start => ctx.start = position,
                        PositionMark::End => ctx.end = position,
                    }
                }
            }
        }
        Ok(())
    }

    async fn run_primitive(
        &self,
        primitive: Primitive,
        params: PrimitiveParams,
        settle_timeout: Duration,
        policy: OnTimeout,
        cancel: &CancellationToken,
    ) -> Result<(), AbortReason> {
        let deadline = Instant::now() + settle_timeout;
        // An unanswered issue can never be settled, whatever the policy.
        let answer = tokio::select! {
            _ = cancel.cancelled() => return Err(AbortReason::Cancelled),
            answer = tokio::time::timeout_at(deadline, self.actuation.issue(primitive, params)) => answer,
        };
        let ticket = match answer {
            Ok(Ok(Acceptance::Accepted(ticket))) => ticket,
            Ok(Ok(Acceptance::Rejected(reason))) => {
                return Err(AbortReason::PrimitiveRejected { primitive, reason });
            }
            Ok(Err(e)) => {
                return Err(AbortReason::PrimitiveRejected {
                    primitive,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(%primitive, ?settle_timeout, "actuation service did not answer issue");
                return Err(AbortReason::Timeout {
                    primitive,
                    after: settle_timeout,
                });
            }
        };
        debug!(%primitive, ticket = ticket.0, "primitive accepted");
        self.settle(primitive, ticket, deadline, settle_timeout, policy, cancel).await
    }

    /// Poll completion of `ticket` until done, past `deadline`, or cancelled.
    async fn settle(
        &self,
        primitive: Primitive,
        ticket: Ticket,
        deadline: Instant,
        settle_timeout: Duration,
        policy: OnTimeout,
        cancel: &CancellationToken,
    ) -> Result<(), AbortReason> {
        let poll = self.monitor.poll_interval();
        loop {
            if cancel.is_cancelled() {
                return Err(AbortReason::Cancelled);
            }
            let query = tokio::select! {
                _ = cancel.cancelled() => return Err(AbortReason::Cancelled),
                query = tokio::time::timeout_at(deadline, self.actuation.is_complete(ticket)) => query,
            };
            match query {
                Ok(Ok(true)) => return Ok(()),
                Ok(Ok(false)) => {}
                Ok(Err(e)) => warn!(%primitive, error = %e, "completion query failed"),
                Err(_) => debug!(%primitive, "completion query outlived the settle window"),
            }
            let now = Instant::now();
            if now >= deadline {
                return match policy {
                    OnTimeout::Abort => Err(AbortReason::Timeout {
                        primitive,
                        after: settle_timeout,
                    }),
                    OnTimeout::Continue => {
                        debug!(%primitive, ?settle_timeout, "settle window elapsed; continuing");
                        Ok(())
                    }
                };
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(AbortReason::Cancelled),
                _ = tokio::time::sleep(poll.min(deadline - now)) => {}
            }
        }
    }

    async fn wait_for_stable(
        &self,
        timeout: Duration,
        policy: OnTimeout,
        cancel: &CancellationToken,
    ) -> Result<(), AbortReason> {
        match self.monitor.wait_until_stable(timeout, cancel).await {
            WaitOutcome::Stable => Ok(()),
            WaitOutcome::Cancelled => Err(AbortReason::Cancelled),
            WaitOutcome::TimedOut => {
                let reasons: Vec<_> = self
                    .monitor
                    .evaluate_current()
                    .map(|v| v.reasons.into_iter().collect())
                    .unwrap_or_default();
                match policy {
                    OnTimeout::Abort => Err(AbortReason::InstabilityDetected { reasons }),
                    OnTimeout::Continue => {
                        warn!(?timeout, ?reasons, "robot not stable in time; continuing");
                        Ok(())
                    }
                }
            }
        }
    }

    /// Best-effort halt after an abort, bounded by [`STOP_TIMEOUT`].
    async fn safe_stop(&self) {
        match tokio::time::timeout(STOP_TIMEOUT, self.actuation.stop()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "stop after abort failed"),
            Err(_) => warn!(timeout = ?STOP_TIMEOUT, "stop after abort did not answer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant as StdInstant;
    use stride_hal::{Completion, RecordingActuation};
    use stride_perception::SnapshotStore;
    use stride_types::{Orientation, StateSnapshot};

    fn snapshot(x: f64, body_height: f64) -> StateSnapshot {
        StateSnapshot {
            position: Vec3::new(x, 0.0, body_height),
            velocity: Vec3::default(),
            orientation: Orientation::default(),
            angular_velocity: Vec3::default(),
            acceleration: Vec3::default(),
            foot_forces: [70.0; 4],
            body_height,
            mode: 1,
            progress: 0.0,
            error_code: None,
            timestamp: StdInstant::now(),
        }
    }

    struct Fixture {
        store: Arc<SnapshotStore>,
        spy: Arc<RecordingActuation>,
        sequencer: BehaviorSequencer,
    }

    fn fixture(spy: RecordingActuation, behaviors: Vec<BehaviorDefinition>) -> Fixture {
        let store = Arc::new(SnapshotStore::new());
        let spy = Arc::new(spy);
        let catalog = Arc::new(BehaviorCatalog::new());
        for def in behaviors {
            catalog.register(def).unwrap();
        }
        let sequencer = BehaviorSequencer::new(
            catalog,
            spy.clone(),
            store.reader(),
            Arc::new(MonitoringSession::new()),
            SequencerConfig::default(),
        );
        Fixture { store, spy, sequencer }
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_and_disabled_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(
            RecordingActuation::new(),
            vec![BehaviorDefinition::new(1, "off", vec![Step::primitive(Primitive::StandUp, secs(1))]).disabled()],
        );
        let cancel = CancellationToken::new();

        let result = f.sequencer.run(42, &cancel).await?;
        assert_eq!(result.outcome, Outcome::Rejected(RejectReason::UnknownBehavior(42)));

        let result = f.sequencer.run(1, &cancel).await?;
        assert_eq!(result.outcome, Outcome::Rejected(RejectReason::Disabled));
        assert!(f.spy.primitives().is_empty());
        assert_eq!(f.spy.stop_count(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn steps_run_in_order() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(
            RecordingActuation::new(),
            vec![BehaviorDefinition::new(
                1,
                "seq",
                vec![
                    Step::primitive(Primitive::StandUp, secs(2)),
                    Step::walk(0.3, 0.0, 0.0, secs(1)),
                    Step::primitive(Primitive::StopMove, secs(1)),
                ],
            )],
        );
        let result = f.sequencer.run(1, &CancellationToken::new()).await?;
        assert!(result.is_completed());
        assert_eq!(
            f.spy.primitives(),
            vec![Primitive::StandUp, Primitive::Move, Primitive::StopMove]
        );
        assert_eq!(f.spy.stop_count(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_primitive_aborts_and_skips_rest() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(
            RecordingActuation::new().rejecting(Primitive::BackFlip),
            vec![BehaviorDefinition::new(
                1,
                "flip",
                vec![
                    Step::primitive(Primitive::BackFlip, secs(2)),
                    Step::primitive(Primitive::StandUp, secs(2)),
                ],
            )],
        );
        let result = f.sequencer.run(1, &CancellationToken::new()).await?;
        assert!(matches!(
            result.outcome,
            Outcome::Aborted(AbortReason::PrimitiveRejected {
                primitive: Primitive::BackFlip,
                ..
            })
        ));
        assert_eq!(f.spy.primitives(), vec![Primitive::BackFlip]);
        assert_eq!(f.spy.stop_count(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_counts_as_rejection() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(
            RecordingActuation::new().unreachable(),
            vec![BehaviorDefinition::new(1, "x", vec![Step::primitive(Primitive::StandUp, secs(1))])],
        );
        let result = f.sequencer.run(1, &CancellationToken::new()).await?;
        assert!(matches!(
            result.outcome,
            Outcome::Aborted(AbortReason::PrimitiveRejected { .. })
        ));
        assert_eq!(f.spy.stop_count(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn settle_timeout_abort_policy() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(
            RecordingActuation::new().with_completion(Completion::Never),
            vec![BehaviorDefinition::new(
                1,
                "strict",
                vec![Step::primitive(Primitive::Hello, secs(2)).abort_on_timeout()],
            )],
        );
        let started = Instant::now();
        let result = f.sequencer.run(1, &CancellationToken::new()).await?;
        assert_eq!(
            result.outcome,
            Outcome::Aborted(AbortReason::Timeout {
                primitive: Primitive::Hello,
                after: secs(2)
            })
        );
        assert!(started.elapsed() >= secs(2));
        assert_eq!(f.spy.stop_count(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn settle_timeout_continue_policy_proceeds() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(
            RecordingActuation::new().with_completion(Completion::Never),
            vec![BehaviorDefinition::new(
                1,
                "lenient",
                vec![
                    Step::walk(0.2, 0.0, 0.0, secs(1)),
                    Step::primitive(Primitive::StopMove, secs(1)),
                ],
            )],
        );
        let result = f.sequencer.run(1, &CancellationToken::new()).await?;
        assert!(result.is_completed());
        assert_eq!(f.spy.primitives().len(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_stable_abort_reports_reasons() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(
            RecordingActuation::new(),
            vec![BehaviorDefinition::new(1, "wait", vec![Step::wait_for_stable(secs(1)).abort_on_timeout()])],
        );
        f.store.publish(snapshot(0.0, 0.10));
        let result = f.sequencer.run(1, &CancellationToken::new()).await?;
        assert_eq!(
            result.outcome,
            Outcome::Aborted(AbortReason::InstabilityDetected {
                reasons: vec![stride_types::InstabilityReason::LowBodyHeight]
            })
        );
        assert_eq!(f.spy.stop_count(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn conditional_selects_branch_from_fresh_snapshot() -> Result<(), Box<dyn std::error::Error>> {
        let branchy = || {
            BehaviorDefinition::new(
                1,
                "branch",
                vec![Step::when(
                    "low",
                    |s| s.body_height < 0.25,
                    vec![Step::primitive(Primitive::StandUp, secs(1))],
                    vec![Step::primitive(Primitive::Hello, secs(1))],
                )],
            )
        };

        // No snapshot: else branch.
        let f = fixture(RecordingActuation::new(), vec![branchy()]);
        f.sequencer.run(1, &CancellationToken::new()).await?;
        assert_eq!(f.spy.primitives(), vec![Primitive::Hello]);

        let f = fixture(RecordingActuation::new(), vec![branchy()]);
        f.store.publish(snapshot(0.0, 0.10));
        f.sequencer.run(1, &CancellationToken::new()).await?;
        assert_eq!(f.spy.primitives(), vec![Primitive::StandUp]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn nested_branches_resume_outer_steps() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(
            RecordingActuation::new(),
            vec![BehaviorDefinition::new(
                1,
                "nested",
                vec![
                    Step::when(
                        "outer",
                        |_| true,
                        vec![
                            Step::when(
                                "inner",
                                |_| false,
                                vec![],
                                vec![Step::primitive(Primitive::Stretch, secs(1))],
                            ),
                            Step::primitive(Primitive::Hello, secs(1)),
                        ],
                        vec![],
                    ),
                    Step::primitive(Primitive::StopMove, secs(1)),
                ],
            )],
        );
        f.store.publish(snapshot(0.0, 0.30));
        let result = f.sequencer.run(1, &CancellationToken::new()).await?;
        assert!(result.is_completed());
        assert_eq!(
            f.spy.primitives(),
            vec![Primitive::Stretch, Primitive::Hello, Primitive::StopMove]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn reports_and_displacement_are_collected() -> Result<(), Box<dyn std::error::Error>> {
        let store_for_hook: Arc<std::sync::OnceLock<Arc<SnapshotStore>>> = Arc::default();
        let hook_store = Arc::clone(&store_for_hook);
        let spy = RecordingActuation::new().on_issue(move |primitive, _| {
            if primitive == Primitive::StopMove {
                if let Some(store) = hook_store.get() {
                    store.publish(snapshot(3.0, 0.30));
                }
            }
        });
        let f = fixture(
            spy,
            vec![BehaviorDefinition::new(
                1,
                "measure",
                vec![
                    Step::record_start(),
                    Step::walk(0.3, 0.0, 0.0, secs(1)),
                    Step::primitive(Primitive::StopMove, secs(1)),
                    Step::record_end(),
                    Step::report("height", |s| format!("{:.2}", s.map_or(0.0, |s| s.body_height))),
                ],
            )],
        );
        let _ = store_for_hook.set(Arc::clone(&f.store));
        f.store.publish(snapshot(0.0, 0.30));

        let result = f.sequencer.run(1, &CancellationToken::new()).await?;
        assert!(result.is_completed());
        let distance = result.measured_displacement.ok_or("missing displacement")?;
        assert!((distance - 3.0).abs() < 1e-9);
        assert_eq!(result.reports, vec!["0.30".to_string()]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn no_snapshot_means_no_displacement() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(
            RecordingActuation::new(),
            vec![BehaviorDefinition::new(
                1,
                "blind",
                vec![Step::record_start(), Step::primitive(Primitive::Hello, secs(1)), Step::record_end()],
            )],
        );
        let result = f.sequencer.run(1, &CancellationToken::new()).await?;
        assert!(result.is_completed());
        assert_eq!(result.measured_displacement, None);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_aborts_without_issuing() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(
            RecordingActuation::new(),
            vec![BehaviorDefinition::new(1, "x", vec![Step::primitive(Primitive::StandUp, secs(1))])],
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = f.sequencer.run(1, &cancel).await?;
        assert_eq!(result.outcome, Outcome::Aborted(AbortReason::Cancelled));
        assert!(f.spy.primitives().is_empty());
        assert_eq!(f.spy.stop_count(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failing_stop_keeps_primary_reason() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(
            RecordingActuation::new().rejecting(Primitive::LeftFlip).failing_stop(),
            vec![BehaviorDefinition::new(1, "x", vec![Step::primitive(Primitive::LeftFlip, secs(1))])],
        );
        let result = f.sequencer.run(1, &CancellationToken::new()).await?;
        assert!(matches!(
            result.outcome,
            Outcome::Aborted(AbortReason::PrimitiveRejected { .. })
        ));
        assert_eq!(f.spy.stop_count(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn running_flag_clears_after_run() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture(
            RecordingActuation::new(),
            vec![BehaviorDefinition::new(1, "x", vec![Step::primitive(Primitive::StandUp, secs(1))])],
        );
        assert!(!f.sequencer.is_running());
        f.sequencer.run(1, &CancellationToken::new()).await?;
        assert!(!f.sequencer.is_running());
        f.sequencer.run(1, &CancellationToken::new()).await?;
        assert_eq!(f.spy.primitives().len(), 2);
        Ok(())
    }
}

//! Closed-loop runs against the simulated quadruped: the sim publishes state
//! frames on the bus, the ingest turns them into snapshots, and the
//! sequencer drives the sim through the actuation trait.

mod support;

use std::sync::Arc;
use std::time::Duration;

use stride_hal::SimQuadruped;
use stride_kernel::StabilityThresholds;
use stride_middleware::{LocalTelemetryBus, SPORT_STATE_TOPIC};
use stride_perception::TelemetryIngest;
use stride_runtime::{BehaviorSequencer, Outcome, standard_catalog};
use stride_types::{AbortReason, MonitoringState, RejectReason};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use support::{TestResult, sequencer_for, started_ingest, wait_until};

struct Rig {
    sim: Arc<SimQuadruped>,
    ingest: TelemetryIngest,
    sequencer: BehaviorSequencer,
    feed_cancel: CancellationToken,
    feed: JoinHandle<()>,
}

impl Rig {
    async fn new(sim: SimQuadruped) -> Self {
        let bus = LocalTelemetryBus::default();
        let sim = Arc::new(sim);
        let ingest = started_ingest(&bus).await;
        let feed_cancel = CancellationToken::new();
        let feed = sim.spawn_telemetry(bus, SPORT_STATE_TOPIC, Duration::from_millis(20), feed_cancel.clone());
        assert!(wait_until(|| ingest.state() == MonitoringState::Active).await);

        let catalog = Arc::new(standard_catalog(StabilityThresholds::default()).expect("standard catalog"));
        let sequencer = sequencer_for(catalog, sim.clone(), &ingest);
        Self {
            sim,
            ingest,
            sequencer,
            feed_cancel,
            feed,
        }
    }

    async fn shutdown(mut self) -> TestResult {
        self.feed_cancel.cancel();
        self.feed.await?;
        self.ingest.stop().await;
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn stand_up_then_state_aware_behavior() -> TestResult {
    let rig = Rig::new(SimQuadruped::new()).await;

    let result = rig.sequencer.run(1, &CancellationToken::new()).await?;
    assert!(result.is_completed());
    assert!(wait_until(|| rig.ingest.reader().current().is_some_and(|s| s.body_height > 0.25)).await);

    let result = rig.sequencer.run(22, &CancellationToken::new()).await?;
    assert!(result.is_completed(), "{:?}", result.outcome);
    assert!(result.reports.iter().any(|r| r.starts_with("initial body height: 0.300")));
    assert!(result.reports.iter().any(|r| r.starts_with("state-aware final")));

    // Normal-height branch walks forward at 0.3 m/s for two seconds.
    let x = rig.ingest.reader().current().ok_or("no snapshot")?.position.x;
    assert!(x > 0.4, "walked only {x} m");

    rig.shutdown().await
}

#[tokio::test(start_paused = true)]
async fn circle_walk_measures_displacement() -> TestResult {
    let rig = Rig::new(SimQuadruped::new()).await;

    let result = rig.sequencer.run(21, &CancellationToken::new()).await?;
    assert!(result.is_completed(), "{:?}", result.outcome);
    let distance = result.measured_displacement.ok_or("no displacement")?;
    // Chord of an arc with radius 0.2/0.3 m swept over eight seconds.
    assert!(distance > 0.8 && distance < 1.6, "distance {distance}");

    rig.shutdown().await
}

#[tokio::test(start_paused = true)]
async fn disabled_catalog_entries_never_reach_the_robot() -> TestResult {
    let rig = Rig::new(SimQuadruped::standing()).await;

    let result = rig.sequencer.run(12, &CancellationToken::new()).await?;
    assert_eq!(result.outcome, Outcome::Rejected(RejectReason::Disabled));

    rig.shutdown().await
}

#[tokio::test(start_paused = true)]
async fn operator_cancel_halts_the_robot() -> TestResult {
    let rig = Rig::new(SimQuadruped::standing()).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        trigger.cancel();
    });

    let result = rig.sequencer.run(21, &cancel).await?;
    assert_eq!(result.outcome, Outcome::Aborted(AbortReason::Cancelled));
    assert_eq!(rig.sim.frame().velocity, [0.0, 0.0, 0.0]);

    rig.shutdown().await
}

#[tokio::test(start_paused = true)]
async fn monitor_self_test_reports_full_state() -> TestResult {
    let rig = Rig::new(SimQuadruped::standing()).await;

    let result = rig.sequencer.run(23, &CancellationToken::new()).await?;
    assert!(result.is_completed());
    let report = result.reports.first().ok_or("no report")?;
    assert!(report.contains("Body height: 0.300 m"));
    assert!(report.contains("Stability: stable"));

    rig.shutdown().await
}

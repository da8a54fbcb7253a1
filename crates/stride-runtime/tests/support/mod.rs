#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use stride_hal::ActuationService;
use stride_middleware::{LocalTelemetryBus, SPORT_STATE_TOPIC, TelemetryBus};
use stride_perception::{ImuFrame, IngestConfig, SportModeFrame, TelemetryIngest};
use stride_runtime::{BehaviorCatalog, BehaviorDefinition, BehaviorSequencer, SequencerConfig};
use stride_types::MonitoringState;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Encoded sport-mode frame for a robot at the origin.
pub fn state_frame(body_height: f64, foot_force: [f64; 4]) -> Vec<u8> {
    SportModeFrame {
        position: [0.0, 0.0, body_height],
        imu_state: ImuFrame {
            accelerometer: [0.0, 0.0, 9.81],
            ..ImuFrame::default()
        },
        foot_force,
        body_height,
        mode: 1,
        ..SportModeFrame::default()
    }
    .encode()
    .expect("frame encodes")
}

pub fn standing_frame() -> Vec<u8> {
    state_frame(0.30, [70.0; 4])
}

/// Poll `cond` every 10 ms for up to five seconds.
pub async fn wait_until(cond: impl Fn() -> bool) -> bool {
    for _ in 0..500 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// Started ingest on the standard topic of `bus`.
pub async fn started_ingest(bus: &LocalTelemetryBus) -> TelemetryIngest {
    let dyn_bus: Arc<dyn TelemetryBus> = Arc::new(bus.clone());
    let mut ingest = TelemetryIngest::new(dyn_bus, IngestConfig::default());
    ingest.start().await.expect("ingest starts");
    ingest
}

/// Started ingest whose session has reached `Active` on `frame`.
pub async fn active_ingest(bus: &LocalTelemetryBus, frame: Vec<u8>) -> TelemetryIngest {
    let ingest = started_ingest(bus).await;
    bus.publish(SPORT_STATE_TOPIC, frame).expect("bus online");
    assert!(wait_until(|| ingest.state() == MonitoringState::Active).await);
    ingest
}

pub fn catalog_of(behaviors: Vec<BehaviorDefinition>) -> Arc<BehaviorCatalog> {
    let catalog = BehaviorCatalog::new();
    for def in behaviors {
        catalog.register(def).expect("valid behavior");
    }
    Arc::new(catalog)
}

pub fn sequencer_for(
    catalog: Arc<BehaviorCatalog>,
    actuation: Arc<dyn ActuationService>,
    ingest: &TelemetryIngest,
) -> BehaviorSequencer {
    BehaviorSequencer::new(
        catalog,
        actuation,
        ingest.reader(),
        ingest.session(),
        SequencerConfig::default(),
    )
}

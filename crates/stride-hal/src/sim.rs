//! Headless quadruped simulation for demos and CI without a physical robot.
//!
//! [`SimQuadruped`] implements [`ActuationService`] with a coarse kinematic
//! model and can stream its state as sport-mode JSON frames onto a
//! [`LocalTelemetryBus`], closing the loop
//! `sequencer → actuation → robot → telemetry → ingest` entirely in-process.
//!
//! | Primitive                          | Effect                                   | Completes after |
//! |------------------------------------|------------------------------------------|-----------------|
//! | `StandUp`, `BalanceStand`          | body 0.30 m, ~70 N per foot              | transition      |
//! | `RecoveryStand`                    | as above, clears tilt and faults         | transition      |
//! | `StandDown`                        | body 0.08 m                              | transition      |
//! | `Damp`                             | motors released, no load                 | immediately     |
//! | `Move`                             | sets commanded body velocity             | never (continuous) |
//! | `StopMove`                         | zero velocity                            | immediately     |
//! | `Hello`, `Stretch`                 | gesture in place                         | gesture         |
//!
//! Acrobatic and switch primitives are rejected.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//! use stride_hal::sim::SimQuadruped;
//! use stride_middleware::{LocalTelemetryBus, SPORT_STATE_TOPIC};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() {
//! let bus = LocalTelemetryBus::new(64);
//! let robot = Arc::new(SimQuadruped::new());
//! let cancel = CancellationToken::new();
//! let _feed = robot.spawn_telemetry(bus, SPORT_STATE_TOPIC, Duration::from_millis(20), cancel);
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use stride_middleware::LocalTelemetryBus;
use stride_perception::{ImuFrame, SportModeFrame};
use stride_types::{LEG_COUNT, Primitive, PrimitiveParams, StrideError, Vec3};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actuation::{Acceptance, ActuationService, Ticket};

const STANDING_HEIGHT: f64 = 0.30;
const LYING_HEIGHT: f64 = 0.08;
const STANDING_FOOT_FORCE: f64 = 70.0;
const GRAVITY: f64 = 9.81;

const MODE_IDLE: i32 = 0;
const MODE_STANDING: i32 = 1;
const MODE_WALKING: i32 = 2;

// ────────────────────────────────────────────────────────────────────────────
// Kinematic state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SimState {
    position: Vec3,
    yaw: f64,
    roll: f64,
    pitch: f64,
    /// Commanded body-frame velocity: forward, lateral, yaw rate.
    command: (f64, f64, f64),
    body_height: f64,
    foot_forces: [f64; LEG_COUNT],
    mode: i32,
    error_code: i32,
    /// Completion deadline per in-flight ticket; `None` runs until halted.
    tickets: HashMap<Ticket, Option<Instant>>,
    next_ticket: u64,
    last_tick: Instant,
}

impl SimState {
    fn standing(&self) -> bool {
        self.body_height >= STANDING_HEIGHT - 0.01
    }

    fn stand(&mut self) {
        self.body_height = STANDING_HEIGHT;
        self.foot_forces = [STANDING_FOOT_FORCE; LEG_COUNT];
        self.mode = MODE_STANDING;
    }

    fn halt(&mut self) {
        self.command = (0.0, 0.0, 0.0);
        if self.mode == MODE_WALKING {
            self.mode = MODE_STANDING;
        }
        self.tickets.retain(|_, deadline| deadline.is_some());
    }

    fn world_velocity(&self) -> Vec3 {
        let (vx, vy, _) = self.command;
        let (sin, cos) = self.yaw.sin_cos();
        Vec3::new(vx * cos - vy * sin, vx * sin + vy * cos, 0.0)
    }
}

/// A simulated sport-mode quadruped.
#[derive(Debug)]
pub struct SimQuadruped {
    state: Mutex<SimState>,
    transition: Duration,
    gesture: Duration,
}

impl Default for SimQuadruped {
    fn default() -> Self {
        Self::new()
    }
}

impl SimQuadruped {
    /// A robot lying down at the origin, motors damped.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                position: Vec3::new(0.0, 0.0, LYING_HEIGHT),
                yaw: 0.0,
                roll: 0.0,
                pitch: 0.0,
                command: (0.0, 0.0, 0.0),
                body_height: LYING_HEIGHT,
                foot_forces: [STANDING_FOOT_FORCE; LEG_COUNT],
                mode: MODE_IDLE,
                error_code: 0,
                tickets: HashMap::new(),
                next_ticket: 0,
                last_tick: Instant::now(),
            }),
            transition: Duration::from_millis(300),
            gesture: Duration::from_millis(1500),
        }
    }

    /// Start already standing.
    pub fn standing() -> Self {
        let sim = Self::new();
        sim.lock().stand();
        sim
    }

    /// Override how long stand/sit transitions and gestures take.
    pub fn with_durations(mut self, transition: Duration, gesture: Duration) -> Self {
        self.transition = transition;
        self.gesture = gesture;
        self
    }

    /// Inject (or clear with `0`) a controller fault reported in telemetry.
    pub fn set_error_code(&self, code: i32) {
        self.lock().error_code = code;
    }

    /// Override the per-foot contact forces, e.g. to model a slipping leg.
    pub fn set_foot_forces(&self, forces: [f64; LEG_COUNT]) {
        self.lock().foot_forces = forces;
    }

    pub fn set_tilt(&self, roll: f64, pitch: f64) {
        let mut state = self.lock();
        state.roll = roll;
        state.pitch = pitch;
    }

    /// Integrate the commanded velocity up to `now`.
    pub fn tick(&self, now: Instant) {
        let mut state = self.lock();
        let dt = now.saturating_duration_since(state.last_tick).as_secs_f64();
        state.last_tick = now;
        if dt == 0.0 {
            return;
        }
        let v = state.world_velocity();
        state.position.x += v.x * dt;
        state.position.y += v.y * dt;
        state.yaw += state.command.2 * dt;
        state.position.z = state.body_height;
    }

    /// Current state as a sport-mode wire frame.
    pub fn frame(&self) -> SportModeFrame {
        let state = self.lock();
        let v = state.world_velocity();
        SportModeFrame {
            position: [state.position.x, state.position.y, state.body_height],
            velocity: [v.x, v.y, v.z],
            imu_state: ImuFrame {
                rpy: [state.roll, state.pitch, state.yaw],
                gyroscope: [0.0, 0.0, state.command.2],
                accelerometer: [0.0, 0.0, GRAVITY],
            },
            foot_force: state.foot_forces,
            body_height: state.body_height,
            mode: state.mode,
            progress: 0.0,
            gait_type: i32::from(state.mode == MODE_WALKING),
            error_code: state.error_code,
        }
    }

    /// Publish a state frame on `topic` every `period` until `cancel` fires.
    pub fn spawn_telemetry(
        self: &Arc<Self>,
        bus: LocalTelemetryBus,
        topic: &str,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let robot = Arc::clone(self);
        let topic = topic.to_string();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(topic = %topic, ?period, "sim telemetry started");
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                robot.tick(Instant::now());
                let payload = match robot.frame().encode() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "sim frame encode failed");
                        continue;
                    }
                };
                if let Err(e) = bus.publish(&topic, payload) {
                    debug!(error = %e, "sim telemetry publish dropped");
                }
            }
            info!(topic = %topic, "sim telemetry stopped");
        })
    }

    /// Tickets that have neither completed nor been halted.
    pub fn in_flight(&self) -> usize {
        self.lock().tickets.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ActuationService for SimQuadruped {
    async fn issue(&self, primitive: Primitive, params: PrimitiveParams) -> Result<Acceptance, StrideError> {
        let now = Instant::now();
        self.tick(now);
        let mut state = self.lock();

        let completes_at = match (primitive, params) {
            (Primitive::StandUp | Primitive::BalanceStand, _) => {
                state.stand();
                Some(now + self.transition)
            }
            (Primitive::RecoveryStand, _) => {
                state.stand();
                state.roll = 0.0;
                state.pitch = 0.0;
                state.error_code = 0;
                Some(now + self.transition)
            }
            (Primitive::StandDown, _) => {
                state.halt();
                state.body_height = LYING_HEIGHT;
                state.mode = MODE_IDLE;
                Some(now + self.transition)
            }
            (Primitive::Damp, _) => {
                state.halt();
                state.body_height = LYING_HEIGHT;
                state.foot_forces = [0.0; LEG_COUNT];
                state.mode = MODE_IDLE;
                Some(now)
            }
            (Primitive::Move, PrimitiveParams::Velocity { vx, vy, vyaw }) => {
                if !state.standing() {
                    return Ok(Acceptance::Rejected("robot is not standing".into()));
                }
                state.halt();
                state.command = (vx, vy, vyaw);
                state.mode = MODE_WALKING;
                None
            }
            (Primitive::Move, _) => {
                return Ok(Acceptance::Rejected("move requires a velocity command".into()));
            }
            (Primitive::StopMove, _) => {
                state.halt();
                Some(now)
            }
            (Primitive::Hello | Primitive::Stretch, _) => {
                if !state.standing() {
                    return Ok(Acceptance::Rejected("robot is not standing".into()));
                }
                state.halt();
                Some(now + self.gesture)
            }
            (other, _) => {
                return Ok(Acceptance::Rejected(format!("{other} is not supported in simulation")));
            }
        };

        state.tickets.retain(|_, deadline| deadline.is_none_or(|d| d > now));
        state.next_ticket += 1;
        let ticket = Ticket(state.next_ticket);
        state.tickets.insert(ticket, completes_at);
        debug!(%primitive, ticket = ticket.0, "sim accepted primitive");
        Ok(Acceptance::Accepted(ticket))
    }

    async fn is_complete(&self, ticket: Ticket) -> Result<bool, StrideError> {
        let mut state = self.lock();
        match state.tickets.get(&ticket).copied() {
            Some(Some(deadline)) if Instant::now() >= deadline => {
                state.tickets.remove(&ticket);
                Ok(true)
            }
            Some(_) => Ok(false),
            // Released tickets finished or were halted.
            None if ticket.0 > 0 && ticket.0 <= state.next_ticket => Ok(true),
            None => Err(StrideError::Actuation(format!("unknown ticket {}", ticket.0))),
        }
    }

    async fn stop(&self) -> Result<(), StrideError> {
        self.tick(Instant::now());
        let mut state = self.lock();
        state.halt();
        state.tickets.clear();
        drop(state);
        info!("sim robot stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use stride_middleware::{SPORT_STATE_TOPIC, TelemetryBus};

    fn velocity(vx: f64, vy: f64, vyaw: f64) -> PrimitiveParams {
        PrimitiveParams::Velocity { vx, vy, vyaw }
    }

    #[tokio::test(start_paused = true)]
    async fn stand_up_raises_body() -> Result<(), Box<dyn std::error::Error>> {
        let sim = SimQuadruped::new();
        assert!(sim.frame().body_height < 0.25);

        let ticket = sim
            .issue(Primitive::StandUp, PrimitiveParams::None)
            .await?
            .ticket()
            .ok_or("expected ticket")?;
        assert!((sim.frame().body_height - STANDING_HEIGHT).abs() < 1e-9);
        assert!(!sim.is_complete(ticket).await?);

        tokio::time::advance(Duration::from_millis(300)).await;
        assert!(sim.is_complete(ticket).await?);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn move_rejected_while_lying() -> Result<(), Box<dyn std::error::Error>> {
        let sim = SimQuadruped::new();
        let answer = sim.issue(Primitive::Move, velocity(0.3, 0.0, 0.0)).await?;
        assert!(matches!(answer, Acceptance::Rejected(_)));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn move_integrates_position_until_stopped() -> Result<(), Box<dyn std::error::Error>> {
        let sim = SimQuadruped::standing();
        let ticket = sim
            .issue(Primitive::Move, velocity(0.5, 0.0, 0.0))
            .await?
            .ticket()
            .ok_or("expected ticket")?;

        tokio::time::advance(Duration::from_secs(2)).await;
        sim.tick(Instant::now());
        assert!(!sim.is_complete(ticket).await?);
        let frame = sim.frame();
        assert!((frame.position[0] - 1.0).abs() < 1e-6);
        assert_eq!(frame.mode, MODE_WALKING);

        sim.stop().await?;
        tokio::time::advance(Duration::from_secs(2)).await;
        sim.tick(Instant::now());
        let frame = sim.frame();
        assert!((frame.position[0] - 1.0).abs() < 1e-6);
        assert_eq!(frame.velocity, [0.0, 0.0, 0.0]);
        assert_eq!(frame.mode, MODE_STANDING);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn turning_rotates_heading() -> Result<(), Box<dyn std::error::Error>> {
        let sim = SimQuadruped::standing();
        sim.issue(Primitive::Move, velocity(0.0, 0.0, std::f64::consts::FRAC_PI_2))
            .await?;
        tokio::time::advance(Duration::from_secs(1)).await;
        sim.tick(Instant::now());
        let yaw = sim.frame().imu_state.rpy[2];
        assert!((yaw - std::f64::consts::FRAC_PI_2).abs() < 1e-6);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn finished_and_halted_tickets_are_released() -> Result<(), Box<dyn std::error::Error>> {
        let sim = SimQuadruped::standing();
        let hello = sim
            .issue(Primitive::Hello, PrimitiveParams::None)
            .await?
            .ticket()
            .ok_or("expected ticket")?;
        let first_walk = sim
            .issue(Primitive::Move, velocity(0.3, 0.0, 0.0))
            .await?
            .ticket()
            .ok_or("expected ticket")?;
        // A new velocity command supersedes the previous one.
        sim.issue(Primitive::Move, velocity(0.0, 0.3, 0.0)).await?;
        assert_eq!(sim.in_flight(), 2);
        assert!(sim.is_complete(first_walk).await?);

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(sim.is_complete(hello).await?);
        assert_eq!(sim.in_flight(), 1);

        sim.stop().await?;
        assert_eq!(sim.in_flight(), 0);
        assert!(sim.is_complete(Ticket(99)).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn acrobatics_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let sim = SimQuadruped::standing();
        for primitive in [Primitive::BackFlip, Primitive::LeftFlip, Primitive::FreeJump] {
            let answer = sim.issue(primitive, PrimitiveParams::None).await?;
            assert!(matches!(answer, Acceptance::Rejected(_)), "{primitive} accepted");
        }
        Ok(())
    }

    #[tokio::test]
    async fn recovery_clears_faults() -> Result<(), Box<dyn std::error::Error>> {
        let sim = SimQuadruped::standing();
        sim.set_error_code(3);
        sim.set_tilt(0.8, 0.0);
        sim.issue(Primitive::RecoveryStand, PrimitiveParams::None).await?;
        let frame = sim.frame();
        assert_eq!(frame.error_code, 0);
        assert_eq!(frame.imu_state.rpy[0], 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn telemetry_frames_reach_the_bus() -> Result<(), Box<dyn std::error::Error>> {
        let bus = LocalTelemetryBus::new(16);
        let mut stream = bus.subscribe(SPORT_STATE_TOPIC).await?;
        let sim = Arc::new(SimQuadruped::standing());
        let cancel = CancellationToken::new();
        let handle = sim.spawn_telemetry(bus.clone(), SPORT_STATE_TOPIC, Duration::from_millis(10), cancel.clone());

        let frame = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await?
            .ok_or("stream ended")?;
        let snapshot = stride_perception::decode_frame(&frame)?;
        assert!((snapshot.body_height - STANDING_HEIGHT).abs() < 1e-9);

        cancel.cancel();
        handle.await?;
        Ok(())
    }
}

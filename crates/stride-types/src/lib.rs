use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of legs (and therefore foot-force sensors) on the robot.
pub const LEG_COUNT: usize = 4;

/// Leg labels in foot-force order: front-left, front-right, rear-left, rear-right.
pub const FOOT_NAMES: [&str; LEG_COUNT] = ["FL", "FR", "RL", "RR"];

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// A three-component vector in the world frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance between the horizontal (x, y) projections of two
    /// points.  The vertical component is ignored.
    pub fn horizontal_distance(&self, other: &Vec3) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Body orientation as roll / pitch / yaw in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Orientation {
    pub const fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// State snapshot
// ────────────────────────────────────────────────────────────────────────────

/// One immutable capture of the robot's sensor/state fields.
///
/// Snapshots are created by the telemetry ingest for every decoded frame and
/// are never mutated after publication; newer frames replace the shared
/// reference instead.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    /// World-frame position (metres).
    pub position: Vec3,
    /// World-frame velocity (m/s).
    pub velocity: Vec3,
    pub orientation: Orientation,
    /// Gyroscope reading (rad/s).
    pub angular_velocity: Vec3,
    /// Accelerometer reading (m/s²).
    pub acceleration: Vec3,
    /// Per-leg contact force in newtons, ordered as [`FOOT_NAMES`].
    pub foot_forces: [f64; LEG_COUNT],
    /// Body height above ground (metres).
    pub body_height: f64,
    pub mode: i32,
    pub progress: f64,
    /// Controller error code; `None` when the controller reports no error.
    pub error_code: Option<i32>,
    /// Monotonic instant at which the underlying frame was received.
    pub timestamp: Instant,
}

impl StateSnapshot {
    /// Age of this snapshot relative to the caller-supplied `now`.
    ///
    /// Saturates to zero when `now` precedes the snapshot timestamp.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.timestamp)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Telemetry
// ────────────────────────────────────────────────────────────────────────────

/// An undecoded state frame as delivered by the telemetry bus.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Topic the frame was published on, e.g. `"rt/sportmodestate"`.
    pub topic: String,
    pub received_at: Instant,
    pub payload: Vec<u8>,
}

/// Lifecycle of the state-monitoring subscription.
///
/// `Active` is only entered once at least one frame has been decoded, which
/// separates "subscribed but silent" from "healthy".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MonitoringState {
    Uninitialized = 0,
    Subscribing = 1,
    Active = 2,
    Stopped = 3,
}

impl MonitoringState {
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => MonitoringState::Subscribing,
            2 => MonitoringState::Active,
            3 => MonitoringState::Stopped,
            _ => MonitoringState::Uninitialized,
        }
    }
}

impl fmt::Display for MonitoringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonitoringState::Uninitialized => "uninitialized",
            MonitoringState::Subscribing => "subscribing",
            MonitoringState::Active => "active",
            MonitoringState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Primitives
// ────────────────────────────────────────────────────────────────────────────

/// Built-in composite motion commands exposed by the actuation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    /// Release all joints (motor damping).
    Damp,
    StandUp,
    StandDown,
    /// Velocity walk; requires [`PrimitiveParams::Velocity`].
    Move,
    StopMove,
    BalanceStand,
    RecoveryStand,
    Hello,
    Stretch,
    LeftFlip,
    BackFlip,
    FreeWalk,
    /// Switch primitives below require [`PrimitiveParams::Toggle`].
    HandStand,
    FreeBound,
    FreeAvoid,
    WalkUpright,
    CrossStep,
    FreeJump,
}

/// The kind of parameters a [`Primitive`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    None,
    Velocity,
    Toggle,
}

impl Primitive {
    /// Stable snake_case name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Damp => "damp",
            Primitive::StandUp => "stand_up",
            Primitive::StandDown => "stand_down",
            Primitive::Move => "move",
            Primitive::StopMove => "stop_move",
            Primitive::BalanceStand => "balance_stand",
            Primitive::RecoveryStand => "recovery_stand",
            Primitive::Hello => "hello",
            Primitive::Stretch => "stretch",
            Primitive::LeftFlip => "left_flip",
            Primitive::BackFlip => "back_flip",
            Primitive::FreeWalk => "free_walk",
            Primitive::HandStand => "hand_stand",
            Primitive::FreeBound => "free_bound",
            Primitive::FreeAvoid => "free_avoid",
            Primitive::WalkUpright => "walk_upright",
            Primitive::CrossStep => "cross_step",
            Primitive::FreeJump => "free_jump",
        }
    }

    pub fn param_kind(&self) -> ParamKind {
        match self {
            Primitive::Move => ParamKind::Velocity,
            Primitive::HandStand
            | Primitive::FreeBound
            | Primitive::FreeAvoid
            | Primitive::WalkUpright
            | Primitive::CrossStep
            | Primitive::FreeJump => ParamKind::Toggle,
            _ => ParamKind::None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters accompanying a [`Primitive`] command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum PrimitiveParams {
    None,
    /// Body-frame velocity command: forward (m/s), lateral (m/s), yaw rate (rad/s).
    Velocity { vx: f64, vy: f64, vyaw: f64 },
    /// Enable (`true`) or disable (`false`) a switch primitive.
    Toggle(bool),
}

impl PrimitiveParams {
    pub fn kind(&self) -> ParamKind {
        match self {
            PrimitiveParams::None => ParamKind::None,
            PrimitiveParams::Velocity { .. } => ParamKind::Velocity,
            PrimitiveParams::Toggle(_) => ParamKind::Toggle,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stability and outcomes
// ────────────────────────────────────────────────────────────────────────────

/// Individual signals that make a snapshot unstable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InstabilityReason {
    /// The controller reported an error code; overrides every other signal.
    ErrorCode,
    /// Body height below the crouch/fall threshold.
    LowBodyHeight,
    /// Some, but not all, feet lost ground contact.
    AsymmetricContactLoss,
    /// Roll or pitch beyond the tilt threshold.
    ExcessiveTilt,
}

/// Why a behavior invocation was refused before any primitive was issued.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    #[error("unknown behavior id {0}")]
    UnknownBehavior(u32),

    #[error("behavior is disabled")]
    Disabled,

    #[error("state monitoring required but session is {0}")]
    MonitoringInactive(MonitoringState),
}

/// The first failure that ended a running behavior invocation.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AbortReason {
    #[error("primitive {primitive} rejected: {reason}")]
    PrimitiveRejected { primitive: Primitive, reason: String },

    #[error("cancelled by operator")]
    Cancelled,

    #[error("robot did not stabilise: {reasons:?}")]
    InstabilityDetected { reasons: Vec<InstabilityReason> },

    #[error("primitive {primitive} did not complete within {after:?}")]
    Timeout { primitive: Primitive, after: Duration },
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type shared by every Stride crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StrideError {
    #[error("Telemetry transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Telemetry ingest already started")]
    AlreadyStarted,

    #[error("Frame decode error: {0}")]
    Decode(String),

    #[error("Behavior sequencer busy")]
    Busy,

    #[error("Duplicate behavior id {0}")]
    DuplicateId(u32),

    #[error("Invalid behavior definition {id}: {details}")]
    InvalidDefinition { id: u32, details: String },

    #[error("Actuation Error: {0}")]
    Actuation(String),
}

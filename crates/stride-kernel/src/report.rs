//! Structured state report for operator-facing displays.
//!
//! A [`StateReport`] carries every snapshot field plus the stability verdict
//! and two qualitative judgements: motion (stationary when every velocity
//! component is below [`STATIONARY_SPEED`]) and balance (even when the
//! spread between the most and least loaded foot is below
//! [`BALANCE_SPREAD_N`]).

use std::fmt;

use serde::Serialize;
use stride_types::{FOOT_NAMES, LEG_COUNT, Orientation, StateSnapshot, Vec3};

use crate::stability::{StabilityThresholds, StabilityVerdict, evaluate};

/// Speed (per axis) below which the robot counts as stationary.
pub const STATIONARY_SPEED: f64 = 0.05;

/// Foot-force spread (newtons) below which weight is evenly distributed.
pub const BALANCE_SPREAD_N: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MotionStatus {
    Stationary,
    Moving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BalanceStatus {
    Balanced,
    Uneven,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateReport {
    pub position: Vec3,
    pub velocity: Vec3,
    pub body_height: f64,
    pub orientation: Orientation,
    pub angular_velocity: Vec3,
    pub acceleration: Vec3,
    pub foot_forces: [f64; LEG_COUNT],
    pub mode: i32,
    pub progress: f64,
    pub error_code: Option<i32>,
    pub verdict: StabilityVerdict,
    pub motion: MotionStatus,
    pub balance: BalanceStatus,
}

impl StateReport {
    pub fn from_snapshot(snapshot: &StateSnapshot, thresholds: &StabilityThresholds) -> Self {
        let v = snapshot.velocity;
        let motion = if [v.x, v.y, v.z].iter().all(|c| c.abs() < STATIONARY_SPEED) {
            MotionStatus::Stationary
        } else {
            MotionStatus::Moving
        };

        let max = snapshot.foot_forces.iter().copied().fold(f64::MIN, f64::max);
        let min = snapshot.foot_forces.iter().copied().fold(f64::MAX, f64::min);
        let balance = if max - min < BALANCE_SPREAD_N {
            BalanceStatus::Balanced
        } else {
            BalanceStatus::Uneven
        };

        Self {
            position: snapshot.position,
            velocity: snapshot.velocity,
            body_height: snapshot.body_height,
            orientation: snapshot.orientation,
            angular_velocity: snapshot.angular_velocity,
            acceleration: snapshot.acceleration,
            foot_forces: snapshot.foot_forces,
            mode: snapshot.mode,
            progress: snapshot.progress,
            error_code: snapshot.error_code,
            verdict: evaluate(snapshot, thresholds),
            motion,
            balance,
        }
    }

    pub fn total_foot_force(&self) -> f64 {
        self.foot_forces.iter().sum()
    }

    pub fn average_foot_force(&self) -> f64 {
        self.total_foot_force() / LEG_COUNT as f64
    }

    /// Human-readable controller mode.
    pub fn mode_name(&self) -> String {
        match self.mode {
            0 => "Idle".to_string(),
            1 => "Standing".to_string(),
            2 => "Walking".to_string(),
            3 => "Running".to_string(),
            other => format!("Mode {other}"),
        }
    }

    /// Compact single-line summary used in behavior reports.
    pub fn summary(&self) -> String {
        format!(
            "pos=({:.2}, {:.2}, {:.2}) vel=({:.2}, {:.2}, {:.2}) height={:.3}m rpy=({:.2}, {:.2}, {:.2}) feet={:?} {}",
            self.position.x,
            self.position.y,
            self.position.z,
            self.velocity.x,
            self.velocity.y,
            self.velocity.z,
            self.body_height,
            self.orientation.roll,
            self.orientation.pitch,
            self.orientation.yaw,
            self.foot_forces,
            if self.verdict.stable { "stable" } else { "UNSTABLE" },
        )
    }
}

impl fmt::Display for StateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const RAD_TO_DEG: f64 = 180.0 / std::f64::consts::PI;
        let o = self.orientation;

        writeln!(f, "Position (x,y,z): ({:.3}, {:.3}, {:.3}) m", self.position.x, self.position.y, self.position.z)?;
        writeln!(f, "Body height: {:.3} m", self.body_height)?;
        writeln!(f, "Velocity (vx,vy,vz): ({:.3}, {:.3}, {:.3}) m/s", self.velocity.x, self.velocity.y, self.velocity.z)?;
        writeln!(f, "Motion: {:?}", self.motion)?;
        writeln!(f, "Orientation (r,p,y): ({:.2}, {:.2}, {:.2}) rad", o.roll, o.pitch, o.yaw)?;
        writeln!(
            f,
            "Orientation (r,p,y): ({:.1}, {:.1}, {:.1}) deg",
            o.roll * RAD_TO_DEG,
            o.pitch * RAD_TO_DEG,
            o.yaw * RAD_TO_DEG
        )?;
        writeln!(
            f,
            "Gyroscope: ({:.3}, {:.3}, {:.3}) rad/s",
            self.angular_velocity.x, self.angular_velocity.y, self.angular_velocity.z
        )?;
        writeln!(
            f,
            "Accelerometer: ({:.2}, {:.2}, {:.2}) m/s²",
            self.acceleration.x, self.acceleration.y, self.acceleration.z
        )?;
        for (name, force) in FOOT_NAMES.iter().zip(self.foot_forces) {
            writeln!(f, "  {name}: {force:6.1} N")?;
        }
        writeln!(
            f,
            "Total force: {:.1} N (average {:.1} N per foot)",
            self.total_foot_force(),
            self.average_foot_force()
        )?;
        writeln!(f, "Balance: {:?}", self.balance)?;
        writeln!(f, "Mode: {}, progress {:.2}", self.mode_name(), self.progress)?;
        match self.error_code {
            Some(code) => writeln!(f, "Error code: {code}")?,
            None => writeln!(f, "No errors detected")?,
        }
        if self.verdict.stable {
            write!(f, "Stability: stable")
        } else {
            write!(f, "Stability: UNSTABLE {:?}", self.verdict.reasons)
        }
    }
}

//! Wire format for sport-mode state frames.
//!
//! Frames carry a JSON body mirroring the robot's sport-mode state message:
//!
//! ```json
//! {
//!   "position": [0.0, 0.0, 0.3],
//!   "velocity": [0.0, 0.0, 0.0],
//!   "imu_state": { "rpy": [0, 0, 0], "gyroscope": [0, 0, 0], "accelerometer": [0, 0, 9.8] },
//!   "foot_force": [70, 70, 70, 70],
//!   "body_height": 0.3,
//!   "mode": 1, "progress": 0.0, "gait_type": 0, "error_code": 0
//! }
//! ```
//!
//! `error_code == 0` means "no error".  Unknown fields are ignored.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use stride_types::{Orientation, RawFrame, StateSnapshot, StrideError, Vec3};

/// Inertial measurement block of a [`SportModeFrame`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuFrame {
    pub rpy: [f64; 3],
    pub gyroscope: [f64; 3],
    pub accelerometer: [f64; 3],
}

/// JSON body of one sport-mode state frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SportModeFrame {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub imu_state: ImuFrame,
    pub foot_force: [f64; 4],
    pub body_height: f64,
    #[serde(default)]
    pub mode: i32,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub gait_type: i32,
    #[serde(default)]
    pub error_code: i32,
}

impl SportModeFrame {
    pub fn encode(&self) -> Result<Vec<u8>, StrideError> {
        serde_json::to_vec(self).map_err(|e| StrideError::Decode(format!("encode failed: {e}")))
    }

    /// Convert into an immutable snapshot stamped with `timestamp`.
    pub fn into_snapshot(self, timestamp: Instant) -> StateSnapshot {
        let [roll, pitch, yaw] = self.imu_state.rpy;
        StateSnapshot {
            position: Vec3::from(self.position),
            velocity: Vec3::from(self.velocity),
            orientation: Orientation::new(roll, pitch, yaw),
            angular_velocity: Vec3::from(self.imu_state.gyroscope),
            acceleration: Vec3::from(self.imu_state.accelerometer),
            foot_forces: self.foot_force,
            body_height: self.body_height,
            mode: self.mode,
            progress: self.progress,
            error_code: (self.error_code != 0).then_some(self.error_code),
            timestamp,
        }
    }
}

/// Decode a raw frame into a [`StateSnapshot`] stamped with the frame's
/// receive instant.
///
/// # Errors
///
/// [`StrideError::Decode`] when the payload is not a valid state message.
pub fn decode_frame(frame: &RawFrame) -> Result<StateSnapshot, StrideError> {
    let body: SportModeFrame = serde_json::from_slice(&frame.payload)
        .map_err(|e| StrideError::Decode(format!("{}: {e}", frame.topic)))?;
    Ok(body.into_snapshot(frame.received_at))
}

//! Stability evaluator – the physical safety verdict for one snapshot.
//!
//! [`evaluate`] is pure: the same snapshot and thresholds always produce the
//! same [`StabilityVerdict`].  Checks, in order of precedence:
//!
//! 1. **Error code** – any controller error makes the snapshot unstable and
//!    is the *only* reason reported; the other readings are not trusted.
//! 2. **Low body height** – `body_height < low_height_m` (crouched/fallen).
//! 3. **Asymmetric contact loss** – some, but not all, feet below
//!    `min_contact_force_n` (a lifted or slipping leg).  All four feet
//!    unloaded is not asymmetric; a lying robot is caught by the height check.
//! 4. **Excessive tilt** – `|roll|` or `|pitch|` above `max_tilt_rad`.
//!
//! Checks 2–4 accumulate; a snapshot is stable when no reason is reported.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use stride_types::{InstabilityReason, StateSnapshot};

/// Limits used by [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityThresholds {
    /// Minimum body height before the robot counts as crouched (metres).
    pub low_height_m: f64,
    /// Minimum per-foot force that counts as ground contact (newtons).
    pub min_contact_force_n: f64,
    /// Maximum absolute roll or pitch (radians).
    pub max_tilt_rad: f64,
}

impl Default for StabilityThresholds {
    fn default() -> Self {
        Self {
            low_height_m: 0.25,
            min_contact_force_n: 20.0,
            max_tilt_rad: 0.5,
        }
    }
}

/// Result of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StabilityVerdict {
    pub stable: bool,
    pub reasons: BTreeSet<InstabilityReason>,
}

impl StabilityVerdict {
    fn from_reasons(reasons: BTreeSet<InstabilityReason>) -> Self {
        Self {
            stable: reasons.is_empty(),
            reasons,
        }
    }
}

/// Judge whether `snapshot` describes a stable robot.
pub fn evaluate(snapshot: &StateSnapshot, thresholds: &StabilityThresholds) -> StabilityVerdict {
    if snapshot.error_code.is_some() {
        return StabilityVerdict::from_reasons(BTreeSet::from([InstabilityReason::ErrorCode]));
    }

    let mut reasons = BTreeSet::new();

    if snapshot.body_height < thresholds.low_height_m {
        reasons.insert(InstabilityReason::LowBodyHeight);
    }

    let unloaded = snapshot
        .foot_forces
        .iter()
        .filter(|&&f| f < thresholds.min_contact_force_n)
        .count();
    if unloaded > 0 && unloaded < snapshot.foot_forces.len() {
        reasons.insert(InstabilityReason::AsymmetricContactLoss);
    }

    if snapshot.orientation.roll.abs() > thresholds.max_tilt_rad
        || snapshot.orientation.pitch.abs() > thresholds.max_tilt_rad
    {
        reasons.insert(InstabilityReason::ExcessiveTilt);
    }

    StabilityVerdict::from_reasons(reasons)
}

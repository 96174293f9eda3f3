//! Bounded Cartesian motion error
//!
//! Turns a target pose and the current end-effector pose into a 6D error
//! vector suitable as a per-cycle control input.
//!
//! # Algorithm
//!
//! 1. Relative transform: `R_err = R_target * R_current⁻¹`,
//!    `p_err = p_target - p_current` (both in the base frame)
//! 2. Decompose `R_err` into a unit axis and an angle in `[0, π]`, and `p_err`
//!    into a unit direction and a distance
//! 3. Clamp angle and distance to the configured limits; the remainder is
//!    corrected in later cycles
//! 4. Scale axis and direction by the clamped magnitudes and stack them
//!    translation first
//!
//! Zero rotation or zero translation map to a zero sub-vector, never NaN.
//!
//! # Example
//!
//! ```rust
//! use cartesian_core::motion_error::{compute_motion_error, ErrorLimits};
//! use nalgebra::{Isometry3, Vector3};
//!
//! let current = Isometry3::identity();
//! let target = Isometry3::translation(3.0, 0.0, 0.0);
//!
//! let error = compute_motion_error(&target, &current, &ErrorLimits::default());
//! // Distance 3.0 is clamped to 1.0
//! assert!((error[0] - 1.0).abs() < 1e-12);
//! assert_eq!(error.fixed_rows::<3>(3).into_owned(), Vector3::zeros());
//! ```

use crate::pose::{Error6D, Pose};
use nalgebra::{Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Per-cycle error ceilings
///
/// A negative or NaN ceiling is treated as zero: the corresponding part of
/// the error is suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorLimits {
    /// Maximum rotational error per cycle (radians)
    pub max_angle: f64,
    /// Maximum translational error per cycle (meters)
    pub max_distance: f64,
}

impl ErrorLimits {
    pub fn new(max_angle: f64, max_distance: f64) -> Self {
        Self {
            max_angle,
            max_distance,
        }
    }
}

impl ErrorLimits {
    /// Usable rotational ceiling (never negative or NaN)
    pub fn angle_ceiling(&self) -> f64 {
        self.max_angle.max(0.0)
    }

    /// Usable translational ceiling (never negative or NaN)
    pub fn distance_ceiling(&self) -> f64 {
        self.max_distance.max(0.0)
    }
}

impl Default for ErrorLimits {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// Split a rotation into a unit axis and an angle in `[0, π]`
///
/// The identity rotation has no defined axis and yields `(zeros, 0.0)`.
pub fn axis_angle(rotation: &UnitQuaternion<f64>) -> (Vector3<f64>, f64) {
    match rotation.axis_angle() {
        Some((axis, angle)) if angle.is_finite() => (axis.into_inner(), angle),
        _ => (Vector3::zeros(), 0.0),
    }
}

/// Split a vector into a unit direction and its original magnitude
///
/// A zero-length or non-finite vector yields `(zeros, 0.0)`. Components are
/// scaled by the largest one before normalizing, so huge finite vectors keep
/// their direction; the magnitude saturates at infinity.
pub fn direction_distance(vector: &Vector3<f64>) -> (Vector3<f64>, f64) {
    let scale = vector.amax();
    if !scale.is_finite() || scale == 0.0 {
        return (Vector3::zeros(), 0.0);
    }
    match Unit::try_new_and_get(vector / scale, 0.0) {
        Some((direction, norm)) => (direction.into_inner(), norm * scale),
        None => (Vector3::zeros(), 0.0),
    }
}

/// Compute the bounded 6D motion error from `current` toward `target`
pub fn compute_motion_error(target: &Pose, current: &Pose, limits: &ErrorLimits) -> Error6D {
    let rotation_error = target.rotation * current.rotation.inverse();
    let translation_error = target.translation.vector - current.translation.vector;

    let (axis, angle) = axis_angle(&rotation_error);
    let (direction, distance) = direction_distance(&translation_error);

    // Remaining error is handled in the next control cycle
    let angle = angle.min(limits.angle_ceiling());
    let distance = distance.min(limits.distance_ceiling());

    let rot = axis * angle;
    let trans = direction * distance;

    Error6D::new(trans.x, trans.y, trans.z, rot.x, rot.y, rot.z)
}

/// Apply a 6D error as a displacement of `current`
///
/// Inverse of [`compute_motion_error`] while no clamping is active:
/// the translation is added and the rotation `exp(rx, ry, rz)` is
/// pre-multiplied, both in the base frame.
pub fn apply_motion_error(current: &Pose, error: &Error6D) -> Pose {
    let translation = Vector3::new(error[0], error[1], error[2]);
    let scaled_axis = Vector3::new(error[3], error[4], error[5]);

    Pose::from_parts(
        Translation3::from(current.translation.vector + translation),
        UnitQuaternion::from_scaled_axis(scaled_axis) * current.rotation,
    )
}

/// Translational and rotational magnitude of an error vector
pub fn error_magnitudes(error: &Error6D) -> (f64, f64) {
    (
        error.fixed_rows::<3>(0).norm(),
        error.fixed_rows::<3>(3).norm(),
    )
}

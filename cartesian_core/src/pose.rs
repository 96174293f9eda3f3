//! SE(3) helpers on top of nalgebra
//!
//! Poses are `Isometry3<f64>`: a unit quaternion plus a translation, so the
//! rotation part is a proper rotation by construction. Quaternions arriving
//! from outside pass through [`orientation_from_xyzw`], which normalizes them
//! and rejects values that cannot be normalized.

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector6};

/// End-effector pose expressed in the robot base frame
pub type Pose = Isometry3<f64>;

/// Cartesian error: translation (x, y, z) followed by rotation (rx, ry, rz)
pub type Error6D = Vector6<f64>;

/// Smallest quaternion norm accepted for normalization
pub const MIN_QUATERNION_NORM: f64 = 1e-9;

/// Build a unit quaternion from `(x, y, z, w)` components
///
/// Returns `None` for zero-length or non-finite input. Components are scaled
/// by the largest one first, so huge finite quaternions still normalize.
pub fn orientation_from_xyzw(x: f64, y: f64, z: f64, w: f64) -> Option<UnitQuaternion<f64>> {
    if ![x, y, z, w].iter().all(|v| v.is_finite()) {
        return None;
    }
    let q = Quaternion::new(w, x, y, z);
    let scale = q.coords.amax();
    if scale == 0.0 {
        return None;
    }

    let scaled = q / scale;
    let scaled_norm = scaled.norm();
    if scaled_norm * scale < MIN_QUATERNION_NORM {
        return None;
    }
    Some(UnitQuaternion::new_unchecked(scaled / scaled_norm))
}

/// Fixed-axis roll, pitch, yaw rotation (`Rz(yaw) * Ry(pitch) * Rx(roll)`)
pub fn rotation_from_rpy(roll: f64, pitch: f64, yaw: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(roll, pitch, yaw)
}

/// Assemble a pose from a position and an already-normalized orientation
pub fn pose_from_parts(position: [f64; 3], orientation: UnitQuaternion<f64>) -> Pose {
    Isometry3::from_parts(
        Translation3::new(position[0], position[1], position[2]),
        orientation,
    )
}

/// Position of a pose as `[x, y, z]`
pub fn position_of(pose: &Pose) -> [f64; 3] {
    let t = &pose.translation.vector;
    [t.x, t.y, t.z]
}

/// Orientation of a pose as `[x, y, z, w]`
pub fn orientation_xyzw(pose: &Pose) -> [f64; 4] {
    let q = &pose.rotation;
    [q.i, q.j, q.k, q.w]
}

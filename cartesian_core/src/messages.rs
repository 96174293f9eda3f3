//! Boundary message types
//!
//! Inbound: [`PoseStamped`] (absolute target) and [`TwistCommand`]
//! (one-shot displacement). Outbound: [`CurrentPose`], emitted once per
//! error computation. Transport is left to the host.

use crate::pose::{orientation_xyzw, position_of, Pose};
use serde::{Deserialize, Serialize};

/// Get current timestamp in nanoseconds
pub fn timestamp_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Absolute target pose tagged with its reference frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    /// Reference frame the pose is expressed in
    pub frame_id: String,
    /// Position `[x, y, z]`
    pub position: [f64; 3],
    /// Orientation quaternion `[x, y, z, w]`, not necessarily normalized
    pub orientation: [f64; 4],
    /// Timestamp in nanoseconds since epoch
    pub stamp_nanos: u64,
}

impl PoseStamped {
    /// Create a new pose message with current timestamp
    pub fn new(frame_id: impl Into<String>, position: [f64; 3], orientation: [f64; 4]) -> Self {
        Self {
            frame_id: frame_id.into(),
            position,
            orientation,
            stamp_nanos: timestamp_now(),
        }
    }

    /// Create a pose message from an isometry
    pub fn from_pose(frame_id: impl Into<String>, pose: &Pose) -> Self {
        Self::new(frame_id, position_of(pose), orientation_xyzw(pose))
    }
}

/// Incremental velocity command
///
/// Consumed as a one-shot displacement: `linear` is added to the position,
/// `angular` is read as roll, pitch and yaw increments.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TwistCommand {
    /// Linear increment `[x, y, z]`
    pub linear: [f64; 3],
    /// Angular increment `[roll, pitch, yaw]`
    pub angular: [f64; 3],
}

impl TwistCommand {
    pub fn new(linear: [f64; 3], angular: [f64; 3]) -> Self {
        Self { linear, angular }
    }

    /// Create a zero twist (no motion)
    pub fn zero() -> Self {
        Self::default()
    }

    /// Check if values are valid
    pub fn is_valid(&self) -> bool {
        self.linear.iter().chain(self.angular.iter()).all(|v| v.is_finite())
    }
}

/// Current end-effector pose as published to observers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentPose {
    /// Timestamp in nanoseconds since epoch
    pub stamp_nanos: u64,
    /// Position `[x, y, z]`
    pub position: [f64; 3],
    /// Orientation quaternion `[x, y, z, w]`
    pub orientation: [f64; 4],
}

impl CurrentPose {
    /// Snapshot a pose with current timestamp
    pub fn from_pose(pose: &Pose) -> Self {
        Self {
            stamp_nanos: timestamp_now(),
            position: position_of(pose),
            orientation: orientation_xyzw(pose),
        }
    }
}

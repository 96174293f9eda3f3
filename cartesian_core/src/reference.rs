//! Target reference shared between event handlers and the control loop
//!
//! The control loop reads the target once per sub-step and stores the pose it
//! publishes; event handlers on other threads replace or advance the target.
//! Each pose sits behind its own short `parking_lot::Mutex`, so readers always
//! see a whole pose and writers follow last-writer-wins.
//!
//! # Example
//!
//! ```rust
//! use cartesian_core::{Pose, PoseStamped, ReferenceHandle, ReferenceUpdate, TwistCommand};
//!
//! let reference = ReferenceHandle::new("base_link", Pose::identity());
//!
//! // Wrong frame: ignored
//! let foreign = PoseStamped::new("camera", [1.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]);
//! assert_eq!(reference.on_target_pose(&foreign), ReferenceUpdate::FrameMismatch);
//! assert_eq!(reference.target(), Pose::identity());
//!
//! // Twist: displaces the last published pose
//! let _ = reference.on_twist(&TwistCommand::new([0.1, 0.0, 0.0], [0.0; 3]));
//! assert!((reference.target().translation.x - 0.1).abs() < 1e-12);
//! ```

use crate::messages::{PoseStamped, TwistCommand};
use crate::pose::{orientation_from_xyzw, pose_from_parts, rotation_from_rpy, Pose};
use nalgebra::Translation3;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Default spacing between repeated warnings
pub const DEFAULT_WARN_THROTTLE: Duration = Duration::from_secs(3);

/// Outcome of a reference event
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceUpdate {
    /// The target was replaced
    Applied,
    /// The pose was expressed in another frame; target unchanged
    FrameMismatch,
    /// Non-finite position or unnormalizable orientation; target unchanged
    InvalidPose,
    /// Non-finite twist components; target unchanged
    InvalidTwist,
}

impl ReferenceUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, ReferenceUpdate::Applied)
    }
}

/// Rate limiter for repeated diagnostics
#[derive(Debug)]
pub struct WarnThrottle {
    window: Duration,
    last: Mutex<Option<Instant>>,
    suppressed: AtomicU64,
}

impl WarnThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: Mutex::new(None),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Returns `Some(suppressed_count)` when a warning may be emitted now
    ///
    /// The count is the number of warnings swallowed since the last one that
    /// was let through.
    pub fn check(&self) -> Option<u64> {
        let now = Instant::now();
        let mut last = self.last.lock();
        match *last {
            Some(previous) if now.duration_since(previous) < self.window => {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
                None
            }
            _ => {
                *last = Some(now);
                Some(self.suppressed.swap(0, Ordering::Relaxed))
            }
        }
    }
}

struct SharedReference {
    base_link: String,
    target: Mutex<Pose>,
    last_published: Mutex<Pose>,
    frame_warning: WarnThrottle,
    invalid_warning: WarnThrottle,
}

/// Cloneable handle to the controller's target reference
///
/// Safe to move to transport threads. It never touches the forward-dynamics
/// model, which stays owned by the control loop.
#[derive(Clone)]
pub struct ReferenceHandle {
    inner: Arc<SharedReference>,
}

impl std::fmt::Debug for ReferenceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceHandle")
            .field("base_link", &self.inner.base_link)
            .field("target", &self.target())
            .finish()
    }
}

impl ReferenceHandle {
    /// Create a reference whose target and last published pose start at `initial`
    pub fn new(base_link: impl Into<String>, initial: Pose) -> Self {
        Self::with_throttle(base_link, initial, DEFAULT_WARN_THROTTLE)
    }

    /// Create a reference with a custom warning throttle window
    pub fn with_throttle(base_link: impl Into<String>, initial: Pose, throttle: Duration) -> Self {
        Self {
            inner: Arc::new(SharedReference {
                base_link: base_link.into(),
                target: Mutex::new(initial),
                last_published: Mutex::new(initial),
                frame_warning: WarnThrottle::new(throttle),
                invalid_warning: WarnThrottle::new(throttle),
            }),
        }
    }

    /// Frame target poses must be expressed in
    pub fn base_link(&self) -> &str {
        &self.inner.base_link
    }

    /// Snapshot of the current target
    pub fn target(&self) -> Pose {
        *self.inner.target.lock()
    }

    /// Snapshot of the pose most recently published by the control loop
    pub fn last_published(&self) -> Pose {
        *self.inner.last_published.lock()
    }

    /// Replace the target with a pose already known to be in the base frame
    pub fn set_target(&self, pose: Pose) {
        *self.inner.target.lock() = pose;
    }

    pub(crate) fn record_published(&self, pose: Pose) {
        *self.inner.last_published.lock() = pose;
    }

    /// Start where we are: target and published pose both become `pose`
    pub(crate) fn resync(&self, pose: Pose) {
        self.record_published(pose);
        self.set_target(pose);
    }

    /// Handle an absolute target pose
    ///
    /// Poses in any frame other than the base frame are discarded with a
    /// throttled warning.
    pub fn on_target_pose(&self, msg: &PoseStamped) -> ReferenceUpdate {
        if msg.frame_id != self.inner.base_link {
            if let Some(suppressed) = self.inner.frame_warning.check() {
                warn!(
                    expected = %self.inner.base_link,
                    got = %msg.frame_id,
                    suppressed,
                    "Got target pose in wrong reference frame"
                );
            }
            return ReferenceUpdate::FrameMismatch;
        }

        let [x, y, z, w] = msg.orientation;
        let orientation = match orientation_from_xyzw(x, y, z, w) {
            Some(q) if msg.position.iter().all(|v| v.is_finite()) => q,
            _ => {
                self.warn_invalid("target pose");
                return ReferenceUpdate::InvalidPose;
            }
        };

        self.set_target(pose_from_parts(msg.position, orientation));
        trace!(position = ?msg.position, "Target pose replaced");
        ReferenceUpdate::Applied
    }

    /// Handle a twist as a one-shot displacement of the last published pose
    ///
    /// The linear part is added to the position; the angular part, read as
    /// roll, pitch and yaw, is pre-multiplied onto the orientation. Twists
    /// carry no frame id and are taken to be in the base frame.
    pub fn on_twist(&self, twist: &TwistCommand) -> ReferenceUpdate {
        if !twist.is_valid() {
            self.warn_invalid("twist");
            return ReferenceUpdate::InvalidTwist;
        }

        let current = self.last_published();
        let [roll, pitch, yaw] = twist.angular;
        let [dx, dy, dz] = twist.linear;

        let mut rotation = rotation_from_rpy(roll, pitch, yaw) * current.rotation;
        rotation.renormalize();
        let translation = Translation3::new(
            current.translation.x + dx,
            current.translation.y + dy,
            current.translation.z + dz,
        );

        self.set_target(Pose::from_parts(translation, rotation));
        trace!(linear = ?twist.linear, angular = ?twist.angular, "Target advanced by twist");
        ReferenceUpdate::Applied
    }

    fn warn_invalid(&self, what: &str) {
        if let Some(suppressed) = self.inner.invalid_warning.check() {
            warn!(suppressed, "Discarding {} with non-finite or degenerate values", what);
        }
    }
}

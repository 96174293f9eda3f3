//! Current-pose sinks
//!
//! The controller publishes the end-effector pose every time it computes an
//! error. Publishing happens on the control thread, so sinks must not block
//! or allocate.

use crate::messages::CurrentPose;
use crossbeam::channel::Sender;

/// Receives the current end-effector pose once per error computation
pub trait PosePublisher: Send {
    fn publish(&mut self, pose: &CurrentPose);
}

/// Discards every pose
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl PosePublisher for NullPublisher {
    fn publish(&mut self, _pose: &CurrentPose) {}
}

/// Forwards poses to a channel; a full or disconnected channel drops the pose
///
/// Use a bounded channel: unbounded senders may allocate on the control thread.
impl PosePublisher for Sender<CurrentPose> {
    fn publish(&mut self, pose: &CurrentPose) {
        // Slow observers miss poses; the control loop never waits on them
        let _ = self.try_send(*pose);
    }
}

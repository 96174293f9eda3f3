//! Forward-dynamics collaborator interface
//!
//! The controller never owns a kinematic model itself. It drives whatever
//! implements [`ForwardDynamics`]: a simulated manipulator that turns
//! Cartesian errors into joint motion, plus the write-back of that motion to
//! the hardware interface.

use crate::pose::{Error6D, Pose};
use std::time::Duration;

/// Failures reported by a forward-dynamics implementation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    #[error("Target configuration unreachable: {0}")]
    Unreachable(String),
    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
    #[error("Hardware interface error: {0}")]
    Hardware(String),
}

/// Capability set the control loop needs from the manipulator model
///
/// All methods are called from the control thread only.
pub trait ForwardDynamics: Send {
    /// Current end-effector pose of the simulated robot, in the base frame
    fn end_effector_pose(&self) -> Pose;

    /// Simulate one sub-step of `period` driven by the Cartesian `error`
    fn compute_joint_control_cmds(
        &mut self,
        error: &Error6D,
        period: Duration,
    ) -> Result<(), SolverError>;

    /// Write the latest simulated joint commands to the hardware interface
    fn write_joint_control_cmds(&mut self) -> Result<(), SolverError>;

    /// Reset the internal simulation to the real joint state
    ///
    /// Called once when the controller starts.
    fn sync_state(&mut self) -> Result<(), SolverError> {
        Ok(())
    }
}

impl<T: ForwardDynamics + ?Sized> ForwardDynamics for Box<T> {
    fn end_effector_pose(&self) -> Pose {
        (**self).end_effector_pose()
    }

    fn compute_joint_control_cmds(
        &mut self,
        error: &Error6D,
        period: Duration,
    ) -> Result<(), SolverError> {
        (**self).compute_joint_control_cmds(error, period)
    }

    fn write_joint_control_cmds(&mut self) -> Result<(), SolverError> {
        (**self).write_joint_control_cmds()
    }

    fn sync_state(&mut self) -> Result<(), SolverError> {
        (**self).sync_state()
    }
}

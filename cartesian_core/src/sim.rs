//! Point-mass forward-dynamics model
//!
//! A free-floating end-effector with translational mass and rotational
//! inertia. The Cartesian error acts as a spatial spring, a viscous damper
//! opposes the twist, and each sub-step is integrated with semi-implicit
//! Euler:
//!
//! ```text
//! f = K * e - D * v
//! v += f / M * dt
//! p += v_lin * dt,   R = exp(w * dt) * R
//! ```
//!
//! The six "joints" are the Cartesian coordinates themselves: positions are
//! the translation followed by the rotation's scaled axis, velocities are the
//! twist.

use crate::config::ActuationInterface;
use crate::pose::{Error6D, Pose};
use crate::solver::{ForwardDynamics, SolverError};
use nalgebra::{Translation3, UnitQuaternion, Vector3, Vector6};
use std::time::Duration;

/// Joint-level commands produced by one simulation step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardwareCommand {
    pub positions: Vector6<f64>,
    pub velocities: Vector6<f64>,
}

impl HardwareCommand {
    fn from_state(pose: &Pose, velocity: &Vector6<f64>) -> Self {
        let t = pose.translation.vector;
        let r = pose.rotation.scaled_axis();
        Self {
            positions: Vector6::new(t.x, t.y, t.z, r.x, r.y, r.z),
            velocities: *velocity,
        }
    }

    /// Values a hardware interface of the given kind would receive
    pub fn for_interface(&self, interface: ActuationInterface) -> &Vector6<f64> {
        match interface {
            ActuationInterface::Velocity => &self.velocities,
            ActuationInterface::Position | ActuationInterface::Effort => &self.positions,
        }
    }
}

/// Damped point-mass end-effector
#[derive(Debug, Clone)]
pub struct PointMassModel {
    interface: ActuationInterface,

    pose: Pose,
    velocity: Vector6<f64>,

    mass: f64,
    inertia: f64,
    stiffness: f64,
    damping: f64,

    /// Translations beyond this distance from the base are unreachable
    workspace_radius: f64,

    simulated: HardwareCommand,
    written: Option<HardwareCommand>,
    writes: u64,
}

impl PointMassModel {
    /// Model at the base origin with unit mass and a critically damped spring
    pub fn new(interface: ActuationInterface) -> Self {
        let pose = Pose::identity();
        Self {
            interface,
            pose,
            velocity: Vector6::zeros(),
            mass: 1.0,
            inertia: 1.0,
            stiffness: 25.0,
            damping: 10.0,
            workspace_radius: f64::INFINITY,
            simulated: HardwareCommand::from_state(&pose, &Vector6::zeros()),
            written: None,
            writes: 0,
        }
    }

    /// Start from `pose` at rest
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self.velocity = Vector6::zeros();
        self.simulated = HardwareCommand::from_state(&self.pose, &self.velocity);
        self
    }

    /// Spring stiffness and viscous damping, shared by all six axes
    pub fn with_gains(mut self, stiffness: f64, damping: f64) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
        self
    }

    pub fn with_mass(mut self, mass: f64, inertia: f64) -> Self {
        self.mass = mass;
        self.inertia = inertia;
        self
    }

    /// Reject steps that would move the end-effector beyond `radius`
    pub fn with_workspace_radius(mut self, radius: f64) -> Self {
        self.workspace_radius = radius;
        self
    }

    pub fn interface(&self) -> ActuationInterface {
        self.interface
    }

    /// Current twist (linear, angular) in the base frame
    pub fn velocity(&self) -> &Vector6<f64> {
        &self.velocity
    }

    /// Commands of the most recent simulation step
    pub fn simulated(&self) -> &HardwareCommand {
        &self.simulated
    }

    /// Commands most recently written to the hardware
    pub fn written(&self) -> Option<&HardwareCommand> {
        self.written.as_ref()
    }

    pub fn write_count(&self) -> u64 {
        self.writes
    }
}

impl ForwardDynamics for PointMassModel {
    fn end_effector_pose(&self) -> Pose {
        self.pose
    }

    fn compute_joint_control_cmds(
        &mut self,
        error: &Error6D,
        period: Duration,
    ) -> Result<(), SolverError> {
        if !error.iter().all(|v| v.is_finite()) {
            return Err(SolverError::NonFinite("cartesian error"));
        }
        let dt = period.as_secs_f64();

        let force = error * self.stiffness - self.velocity * self.damping;
        let mut velocity = self.velocity;
        for i in 0..3 {
            velocity[i] += force[i] / self.mass * dt;
            velocity[i + 3] += force[i + 3] / self.inertia * dt;
        }

        let linear = Vector3::new(velocity[0], velocity[1], velocity[2]);
        let angular = Vector3::new(velocity[3], velocity[4], velocity[5]);

        let translation = self.pose.translation.vector + linear * dt;
        if translation.norm() > self.workspace_radius {
            return Err(SolverError::Unreachable(format!(
                "end effector would leave the {:.3} m workspace",
                self.workspace_radius
            )));
        }

        let mut rotation = UnitQuaternion::from_scaled_axis(angular * dt) * self.pose.rotation;
        rotation.renormalize();

        self.velocity = velocity;
        self.pose = Pose::from_parts(Translation3::from(translation), rotation);
        self.simulated = HardwareCommand::from_state(&self.pose, &self.velocity);
        Ok(())
    }

    fn write_joint_control_cmds(&mut self) -> Result<(), SolverError> {
        self.written = Some(self.simulated);
        self.writes += 1;
        Ok(())
    }

    /// The model is its own robot: syncing brings it to rest where it is
    fn sync_state(&mut self) -> Result<(), SolverError> {
        self.velocity = Vector6::zeros();
        self.simulated = HardwareCommand::from_state(&self.pose, &self.velocity);
        Ok(())
    }
}

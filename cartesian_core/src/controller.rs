//! Cartesian motion control loop
//!
//! Forward dynamics turns the search for joint motion into a control process:
//! every tick the controller drives the collaborator's internal model toward
//! the target for a number of fixed-length sub-steps, then writes the final
//! commands to the hardware once.
//!
//! - Position / effort interfaces run `iterations` sub-steps per tick
//! - The velocity interface runs exactly one sub-step per tick
//!
//! The sub-step length is independent of the outer period.
//!
//! `update` does no I/O and no heap allocation of its own; it locks the
//! shared target only for the duration of a pose copy.

use crate::config::ControllerConfig;
use crate::error::CartesianResult;
use crate::messages::CurrentPose;
use crate::motion_error::{compute_motion_error, ErrorLimits};
use crate::pose::Error6D;
use crate::publisher::PosePublisher;
use crate::reference::ReferenceHandle;
use crate::solver::ForwardDynamics;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Timing and activity counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerStats {
    /// Completed or failed `update` calls, excluding paused ones
    pub ticks: u64,
    /// Command-synthesis calls that succeeded
    pub substeps: u64,
    /// Ticks that returned an error
    pub failed_ticks: u64,
    /// Ticks whose wall time exceeded the outer period
    pub overruns: u64,
    /// Wall time of the most recent tick
    pub last_tick: Duration,
    /// Longest tick observed
    pub max_tick: Duration,
}

/// Cartesian motion controller driving a [`ForwardDynamics`] collaborator
pub struct CartesianMotionController<S, P> {
    config: ControllerConfig,
    solver: S,
    publisher: P,
    reference: ReferenceHandle,

    // Hot-path copies of the configuration
    limits: ErrorLimits,
    internal_period: Duration,
    substeps: u32,
    error_scale: f64,

    paused: bool,
    stats: ControllerStats,
}

impl<S: ForwardDynamics, P: PosePublisher> CartesianMotionController<S, P> {
    /// Create a controller; the target starts at the solver's current pose
    pub fn new(config: ControllerConfig, solver: S, publisher: P) -> CartesianResult<Self> {
        config.validate()?;

        let reference = ReferenceHandle::with_throttle(
            config.robot_base_link.clone(),
            solver.end_effector_pose(),
            config.warn_throttle(),
        );

        debug!(
            base = %config.robot_base_link,
            tip = %config.end_effector_link,
            interface = config.interface.as_str(),
            substeps = config.substeps(),
            "Cartesian motion controller created"
        );

        Ok(Self {
            limits: config.limits(),
            internal_period: config.internal_period(),
            substeps: config.substeps(),
            error_scale: config.error_scale,
            config,
            solver,
            publisher,
            reference,
            paused: false,
            stats: ControllerStats::default(),
        })
    }

    /// Reset the internal simulation with the real joint state and start
    /// where we are
    pub fn starting(&mut self) -> CartesianResult<()> {
        self.solver.sync_state()?;
        let pose = self.solver.end_effector_pose();
        self.reference.resync(pose);

        info!(
            position = ?pose.translation.vector.as_slice(),
            interface = self.config.interface.as_str(),
            "Cartesian motion controller started"
        );
        Ok(())
    }

    pub fn stopping(&mut self) {
        info!(
            ticks = self.stats.ticks,
            failed = self.stats.failed_ticks,
            overruns = self.stats.overruns,
            "Cartesian motion controller stopped"
        );
    }

    /// Advance one outer control cycle of length `period`
    ///
    /// Solver failures abort the tick and are returned unchanged; the next
    /// tick starts fresh. While paused, the current pose is still published
    /// but no commands are synthesized or written.
    pub fn update(&mut self, period: Duration) -> CartesianResult<()> {
        if self.paused {
            self.compute_motion_error();
            return Ok(());
        }

        let start = Instant::now();
        let result = self.run_substeps();
        let elapsed = start.elapsed();

        self.stats.ticks += 1;
        self.stats.last_tick = elapsed;
        self.stats.max_tick = self.stats.max_tick.max(elapsed);
        if !period.is_zero() && elapsed > period {
            self.stats.overruns += 1;
        }
        if result.is_err() {
            self.stats.failed_ticks += 1;
        }

        result
    }

    fn run_substeps(&mut self) -> CartesianResult<()> {
        for _ in 0..self.substeps {
            let error = self.compute_motion_error() * self.error_scale;
            self.solver
                .compute_joint_control_cmds(&error, self.internal_period)?;
            self.stats.substeps += 1;
        }

        self.solver.write_joint_control_cmds()?;
        Ok(())
    }

    /// Publish the current pose and compute the bounded error toward the target
    pub fn compute_motion_error(&mut self) -> Error6D {
        let current = self.solver.end_effector_pose();
        self.reference.record_published(current);
        self.publisher.publish(&CurrentPose::from_pose(&current));

        compute_motion_error(&self.reference.target(), &current, &self.limits)
    }

    /// Stop synthesizing and writing commands
    ///
    /// The controller takes no joint feedback, so the hardware drifts from
    /// the model if the target keeps moving while paused.
    pub fn pause(&mut self) {
        if !self.paused {
            info!("Cartesian motion controller paused");
        }
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            info!("Cartesian motion controller resumed");
        }
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Change the sub-step count and error gain at runtime
    pub fn reconfigure(&mut self, iterations: u32, error_scale: f64) -> CartesianResult<()> {
        let mut config = self.config.clone();
        config.iterations = iterations;
        config.error_scale = error_scale;
        config.validate()?;

        self.substeps = config.substeps();
        self.error_scale = config.error_scale;
        self.config = config;

        info!(
            iterations,
            error_scale,
            substeps = self.substeps,
            "Cartesian motion controller reconfigured"
        );
        Ok(())
    }

    /// Handle for event handlers on other threads
    pub fn reference_handle(&self) -> ReferenceHandle {
        self.reference.clone()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Sub-steps per tick after applying the interface rule
    pub fn substeps(&self) -> u32 {
        self.substeps
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    /// Take the collaborators back
    pub fn into_parts(self) -> (S, P) {
        (self.solver, self.publisher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActuationInterface;
    use crate::error::CartesianError;
    use crate::pose::Pose;
    use crate::publisher::NullPublisher;
    use crate::solver::SolverError;
    use approx::assert_relative_eq;

    /// Solver that never moves and counts calls
    struct FrozenSolver {
        pose: Pose,
        last_error: Error6D,
        computes: usize,
        writes: usize,
        synced: bool,
    }

    impl Default for FrozenSolver {
        fn default() -> Self {
            Self {
                pose: Pose::identity(),
                last_error: Error6D::zeros(),
                computes: 0,
                writes: 0,
                synced: false,
            }
        }
    }

    impl ForwardDynamics for FrozenSolver {
        fn end_effector_pose(&self) -> Pose {
            self.pose
        }

        fn compute_joint_control_cmds(
            &mut self,
            error: &Error6D,
            _period: Duration,
        ) -> Result<(), SolverError> {
            self.last_error = *error;
            self.computes += 1;
            Ok(())
        }

        fn write_joint_control_cmds(&mut self) -> Result<(), SolverError> {
            self.writes += 1;
            Ok(())
        }

        fn sync_state(&mut self) -> Result<(), SolverError> {
            self.synced = true;
            Ok(())
        }
    }

    fn controller(config: ControllerConfig) -> CartesianMotionController<FrozenSolver, NullPublisher> {
        CartesianMotionController::new(config, FrozenSolver::default(), NullPublisher).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result =
            CartesianMotionController::new(ControllerConfig::position(0), FrozenSolver::default(), NullPublisher);
        assert!(result.is_err());
    }

    #[test]
    fn test_unrepresentable_period_rejected_at_construction() {
        let config = ControllerConfig {
            internal_period_secs: 1e20,
            ..ControllerConfig::position(2)
        };
        let result = CartesianMotionController::new(config, FrozenSolver::default(), NullPublisher);
        assert!(matches!(
            result,
            Err(CartesianError::Config { field: "internal_period_secs", .. })
        ));
    }

    #[test]
    fn test_starting_syncs_and_zeroes_error() {
        let mut ctrl = controller(ControllerConfig::position(3));
        ctrl.solver_mut().pose = Pose::translation(0.2, 0.0, 0.4);
        ctrl.starting().unwrap();

        assert!(ctrl.solver().synced);
        assert_eq!(ctrl.reference_handle().target(), Pose::translation(0.2, 0.0, 0.4));
        assert_eq!(ctrl.compute_motion_error(), Error6D::zeros());
    }

    #[test]
    fn test_iteration_counts_per_interface() {
        let mut position = controller(ControllerConfig::position(4));
        position.update(Duration::from_millis(10)).unwrap();
        assert_eq!(position.solver().computes, 4);
        assert_eq!(position.solver().writes, 1);

        let mut velocity = controller(ControllerConfig {
            iterations: 4,
            ..ControllerConfig::velocity()
        });
        velocity.update(Duration::from_millis(10)).unwrap();
        assert_eq!(velocity.solver().computes, 1);
        assert_eq!(velocity.solver().writes, 1);
    }

    #[test]
    fn test_pause_skips_commands() {
        let mut ctrl = controller(ControllerConfig::position(2));
        ctrl.pause();
        ctrl.update(Duration::from_millis(10)).unwrap();
        assert!(ctrl.is_paused());
        assert_eq!(ctrl.solver().computes, 0);
        assert_eq!(ctrl.solver().writes, 0);
        assert_eq!(ctrl.stats().ticks, 0);

        ctrl.resume();
        ctrl.update(Duration::from_millis(10)).unwrap();
        assert_eq!(ctrl.solver().computes, 2);
        assert_eq!(ctrl.solver().writes, 1);
    }

    #[test]
    fn test_reconfigure() {
        let mut ctrl = controller(ControllerConfig::position(1));
        ctrl.reconfigure(6, 0.5).unwrap();
        assert_eq!(ctrl.substeps(), 6);
        assert_eq!(ctrl.config().error_scale, 0.5);

        assert!(ctrl.reconfigure(0, 1.0).is_err());
        assert!(ctrl.reconfigure(2, f64::NAN).is_err());
        // Failed reconfiguration leaves the old values
        assert_eq!(ctrl.substeps(), 6);
    }

    #[test]
    fn test_reconfigure_velocity_keeps_single_step() {
        let mut ctrl = controller(ControllerConfig::velocity());
        ctrl.reconfigure(8, 1.0).unwrap();
        assert_eq!(ctrl.config().interface, ActuationInterface::Velocity);
        assert_eq!(ctrl.substeps(), 1);
    }

    #[test]
    fn test_error_scale_applied_to_error() {
        let mut ctrl = controller(ControllerConfig::position(1));
        ctrl.reference_handle().set_target(Pose::translation(0.4, 0.0, 0.0));

        let raw = ctrl.compute_motion_error();
        assert_relative_eq!(raw[0], 0.4, epsilon = 1e-12);

        ctrl.update(Duration::from_millis(10)).unwrap();
        assert_relative_eq!(ctrl.solver().last_error[0], 0.4, epsilon = 1e-12);

        ctrl.reconfigure(1, 0.5).unwrap();
        ctrl.update(Duration::from_millis(10)).unwrap();
        assert_relative_eq!(ctrl.solver().last_error[0], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_stats_track_ticks() {
        let mut ctrl = controller(ControllerConfig::position(3));
        for _ in 0..5 {
            ctrl.update(Duration::from_secs(1)).unwrap();
        }
        let stats = ctrl.stats();
        assert_eq!(stats.ticks, 5);
        assert_eq!(stats.substeps, 15);
        assert_eq!(stats.failed_ticks, 0);
        assert_eq!(stats.overruns, 0);
        assert!(stats.max_tick >= stats.last_tick);
    }
}

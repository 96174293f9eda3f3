// Control loop behaviour against a scripted forward-dynamics collaborator
use cartesian_core::motion_error::apply_motion_error;
use cartesian_core::{
    CartesianError, CartesianMotionController, ControllerConfig, CurrentPose, Error6D,
    ForwardDynamics, NullPublisher, Pose, PoseStamped, ReferenceUpdate, SolverError,
};
use approx::assert_relative_eq;
use crossbeam::channel::bounded;
use std::thread;
use std::time::Duration;

const OUTER_PERIOD: Duration = Duration::from_millis(10);

/// Moves a fixed fraction of every error it receives and records the calls
struct ScriptedSolver {
    pose: Pose,
    gain: f64,
    fail_on_call: Option<usize>,
    fail_writes: bool,
    delay: Duration,
    calls: Vec<(Error6D, Duration)>,
    writes: usize,
}

impl ScriptedSolver {
    fn new(gain: f64) -> Self {
        Self {
            pose: Pose::identity(),
            gain,
            fail_on_call: None,
            fail_writes: false,
            delay: Duration::ZERO,
            calls: Vec::new(),
            writes: 0,
        }
    }

    fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    fn rejecting_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    fn sleeping(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl ForwardDynamics for ScriptedSolver {
    fn end_effector_pose(&self) -> Pose {
        self.pose
    }

    fn compute_joint_control_cmds(
        &mut self,
        error: &Error6D,
        period: Duration,
    ) -> Result<(), SolverError> {
        self.calls.push((*error, period));
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.fail_on_call == Some(self.calls.len()) {
            return Err(SolverError::Unreachable("joint limit".to_string()));
        }
        self.pose = apply_motion_error(&self.pose, &(error * self.gain));
        Ok(())
    }

    fn write_joint_control_cmds(&mut self) -> Result<(), SolverError> {
        if self.fail_writes {
            return Err(SolverError::Hardware("command interface unavailable".to_string()));
        }
        self.writes += 1;
        Ok(())
    }
}

fn target(x: f64) -> PoseStamped {
    PoseStamped::new("base_link", [x, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0])
}

#[test]
fn test_iterative_tick_runs_n_substeps_and_one_write() {
    let config = ControllerConfig::position(5);
    let mut ctrl =
        CartesianMotionController::new(config, ScriptedSolver::new(0.5), NullPublisher).unwrap();
    ctrl.starting().unwrap();
    assert_eq!(ctrl.reference_handle().on_target_pose(&target(0.8)), ReferenceUpdate::Applied);

    ctrl.update(OUTER_PERIOD).unwrap();

    let solver = ctrl.solver();
    assert_eq!(solver.calls.len(), 5);
    assert_eq!(solver.writes, 1);
    for (_, period) in &solver.calls {
        assert_eq!(*period, Duration::from_millis(20));
    }
}

#[test]
fn test_error_recomputed_every_substep() {
    let mut ctrl = CartesianMotionController::new(
        ControllerConfig::position(4),
        ScriptedSolver::new(0.5),
        NullPublisher,
    )
    .unwrap();
    ctrl.starting().unwrap();
    let _ = ctrl.reference_handle().on_target_pose(&target(0.8));

    ctrl.update(OUTER_PERIOD).unwrap();

    // The solver closes half of the gap per sub-step
    let errors: Vec<f64> = ctrl.solver().calls.iter().map(|(e, _)| e[0]).collect();
    assert_relative_eq!(errors[0], 0.8, epsilon = 1e-12);
    assert_relative_eq!(errors[1], 0.4, epsilon = 1e-12);
    assert_relative_eq!(errors[2], 0.2, epsilon = 1e-12);
    assert_relative_eq!(errors[3], 0.1, epsilon = 1e-12);
}

#[test]
fn test_velocity_tick_runs_single_substep() {
    let config = ControllerConfig {
        iterations: 5,
        ..ControllerConfig::velocity()
    };
    let mut ctrl =
        CartesianMotionController::new(config, ScriptedSolver::new(0.5), NullPublisher).unwrap();
    ctrl.starting().unwrap();

    for _ in 0..3 {
        ctrl.update(OUTER_PERIOD).unwrap();
    }
    assert_eq!(ctrl.solver().calls.len(), 3);
    assert_eq!(ctrl.solver().writes, 3);
}

#[test]
fn test_current_pose_published_per_substep() {
    let (tx, rx) = bounded::<CurrentPose>(64);
    let mut ctrl =
        CartesianMotionController::new(ControllerConfig::position(5), ScriptedSolver::new(0.5), tx)
            .unwrap();
    ctrl.starting().unwrap();
    let _ = ctrl.reference_handle().on_target_pose(&target(0.8));

    ctrl.update(OUTER_PERIOD).unwrap();

    let published: Vec<CurrentPose> = rx.try_iter().collect();
    assert_eq!(published.len(), 5);
    assert_eq!(published[0].position, [0.0, 0.0, 0.0]);
    assert_relative_eq!(published[1].position[0], 0.4, epsilon = 1e-12);
}

#[test]
fn test_solver_failure_aborts_tick_without_write() {
    let solver = ScriptedSolver::new(0.5).failing_on(2);
    let mut ctrl =
        CartesianMotionController::new(ControllerConfig::position(5), solver, NullPublisher)
            .unwrap();
    ctrl.starting().unwrap();

    let result = ctrl.update(OUTER_PERIOD);
    assert!(matches!(
        result,
        Err(CartesianError::Solver(SolverError::Unreachable(_)))
    ));
    assert_eq!(ctrl.solver().calls.len(), 2);
    assert_eq!(ctrl.solver().writes, 0);
    assert_eq!(ctrl.stats().failed_ticks, 1);

    // The next tick starts fresh
    ctrl.update(OUTER_PERIOD).unwrap();
    assert_eq!(ctrl.solver().calls.len(), 7);
    assert_eq!(ctrl.solver().writes, 1);
    assert_eq!(ctrl.stats().ticks, 2);
}

#[test]
fn test_frame_mismatch_keeps_target() {
    let mut ctrl = CartesianMotionController::new(
        ControllerConfig::position(3),
        ScriptedSolver::new(0.5),
        NullPublisher,
    )
    .unwrap();
    ctrl.starting().unwrap();

    let foreign = PoseStamped::new("odom", [1.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]);
    assert_eq!(
        ctrl.reference_handle().on_target_pose(&foreign),
        ReferenceUpdate::FrameMismatch
    );

    ctrl.update(OUTER_PERIOD).unwrap();
    for (error, _) in &ctrl.solver().calls {
        assert_eq!(*error, Error6D::zeros());
    }
    assert_eq!(ctrl.solver().pose, Pose::identity());
}

#[test]
fn test_error_bounded_for_distant_target() {
    let config = ControllerConfig::position(1).with_limits(0.5, 0.25);
    let mut ctrl =
        CartesianMotionController::new(config, ScriptedSolver::new(0.0), NullPublisher).unwrap();
    ctrl.starting().unwrap();

    let far = PoseStamped::new("base_link", [3.0, 4.0, 0.0], [0.0, 0.0, 1.0, 0.0]);
    let _ = ctrl.reference_handle().on_target_pose(&far);
    ctrl.update(OUTER_PERIOD).unwrap();

    let (error, _) = ctrl.solver().calls[0];
    assert_relative_eq!(error.fixed_rows::<3>(0).norm(), 0.25, epsilon = 1e-12);
    assert_relative_eq!(error.fixed_rows::<3>(3).norm(), 0.5, epsilon = 1e-12);
}

#[test]
fn test_write_failure_propagates_after_substeps() {
    let solver = ScriptedSolver::new(0.5).rejecting_writes();
    let mut ctrl =
        CartesianMotionController::new(ControllerConfig::position(3), solver, NullPublisher)
            .unwrap();
    ctrl.starting().unwrap();

    let result = ctrl.update(OUTER_PERIOD);
    assert!(matches!(
        result,
        Err(CartesianError::Solver(SolverError::Hardware(_)))
    ));
    assert_eq!(ctrl.solver().calls.len(), 3);
    assert_eq!(ctrl.solver().writes, 0);

    let stats = ctrl.stats();
    assert_eq!(stats.ticks, 1);
    assert_eq!(stats.substeps, 3);
    assert_eq!(stats.failed_ticks, 1);
}

#[test]
fn test_slow_tick_counted_as_overrun() {
    let solver = ScriptedSolver::new(0.5).sleeping(Duration::from_millis(2));
    let mut ctrl =
        CartesianMotionController::new(ControllerConfig::position(1), solver, NullPublisher)
            .unwrap();
    ctrl.starting().unwrap();

    ctrl.update(Duration::from_micros(1)).unwrap();
    assert_eq!(ctrl.stats().overruns, 1);

    // A generous period is not an overrun
    ctrl.update(Duration::from_secs(10)).unwrap();
    let stats = ctrl.stats();
    assert_eq!(stats.overruns, 1);
    assert_eq!(stats.ticks, 2);
    assert!(stats.max_tick >= Duration::from_millis(2));
}

/// Cartesian Motion Controller Node
///
/// Runs the Cartesian motion controller against the point-mass model at a
/// fixed rate. A teleop thread nudges the target with small twists, a planner
/// thread sends absolute target poses, and an observer thread logs the
/// published end-effector pose.

use anyhow::{ensure, Context};
use cartesian_core::pose::rotation_from_rpy;
use cartesian_core::{
    CartesianMotionController, ControllerConfig, CurrentPose, ForwardDynamics, PointMassModel,
    Pose, PoseStamped, ReferenceHandle, TwistCommand,
};
use clap::Parser;
use crossbeam::channel::{bounded, tick, Receiver, RecvTimeoutError};
use nalgebra::Translation3;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_RATE_HZ: f64 = 100.0;
const DEFAULT_ITERATIONS: u32 = 10;
const POSE_QUEUE: usize = 256;
const TELEOP_INTERVAL: Duration = Duration::from_millis(500);
const TARGET_INTERVAL: Duration = Duration::from_secs(4);
const OBSERVER_LOG_INTERVAL: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "cartesian_node")]
#[command(about = "Cartesian motion controller driving a simulated end-effector", long_about = None)]
struct Args {
    /// Controller configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Control loop rate in Hz
    #[arg(short, long, default_value_t = DEFAULT_RATE_HZ)]
    rate: f64,

    /// Stop after this many seconds (runs until Ctrl+C otherwise)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "cartesian_node=debug,cartesian_core=debug"
    } else {
        "cartesian_node=info,cartesian_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    ensure!(
        args.rate.is_finite() && args.rate > 0.0,
        "rate must be a positive number of Hz, got {}",
        args.rate
    );
    let period = Duration::try_from_secs_f64(1.0 / args.rate)
        .with_context(|| format!("rate {} Hz gives an unusable period", args.rate))?;
    let run_for = args
        .duration
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .with_context(|| format!("duration must be a non-negative number of seconds, got {}", secs))
        })
        .transpose()?;

    let config = match &args.config {
        Some(path) => ControllerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ControllerConfig::position(DEFAULT_ITERATIONS),
    };
    info!(
        base = %config.robot_base_link,
        interface = config.interface.as_str(),
        substeps = config.substeps(),
        rate_hz = args.rate,
        "Loaded controller configuration"
    );

    let (pose_tx, pose_rx) = bounded::<CurrentPose>(POSE_QUEUE);
    let model = PointMassModel::new(config.interface);
    let mut controller = CartesianMotionController::new(config, model, pose_tx)
        .context("Failed to create controller")?;
    controller.starting().context("Failed to start controller")?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set signal handler: {}", e);
    }

    let base_link = controller.config().robot_base_link.clone();
    let workers = vec![
        spawn_worker("observer", {
            let running = running.clone();
            move || observe(pose_rx, running)
        })?,
        spawn_worker("teleop", {
            let running = running.clone();
            let reference = controller.reference_handle();
            move || teleop(reference, running)
        })?,
        spawn_worker("planner", {
            let running = running.clone();
            let reference = controller.reference_handle();
            move || plan_targets(reference, base_link, running)
        })?,
    ];

    let start = Instant::now();
    let mut last = start;
    let mut next = start + period;
    while running.load(Ordering::SeqCst) {
        if run_for.is_some_and(|limit| start.elapsed() >= limit) {
            break;
        }

        let now = Instant::now();
        if let Err(e) = controller.update(now - last) {
            error!("Control tick failed: {}", e);
        }
        last = now;

        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
            next += period;
        } else {
            // Fell behind; don't try to catch up with a burst of ticks
            next = now + period;
        }
    }

    running.store(false, Ordering::SeqCst);
    controller.stopping();

    let stats = controller.stats();
    info!(
        ticks = stats.ticks,
        substeps = stats.substeps,
        failed = stats.failed_ticks,
        overruns = stats.overruns,
        max_tick_us = stats.max_tick.as_micros() as u64,
        "Control loop finished"
    );

    // Dropping the publisher disconnects the observer
    let (model, publisher) = controller.into_parts();
    drop(publisher);
    for worker in workers {
        if worker.join().is_err() {
            warn!("Worker thread panicked");
        }
    }

    let pose = model.end_effector_pose();
    info!(
        position = ?pose.translation.vector.as_slice(),
        writes = model.write_count(),
        "Final end-effector pose"
    );
    Ok(())
}

fn spawn_worker<F>(name: &str, body: F) -> anyhow::Result<thread::JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .with_context(|| format!("Failed to spawn {} thread", name))
}

/// Block until the next tick; false once shutdown was requested
///
/// Polls so shutdown isn't delayed by a whole interval.
fn wait_tick(ticker: &Receiver<Instant>, running: &AtomicBool) -> bool {
    while running.load(Ordering::SeqCst) {
        if ticker.recv_timeout(POLL_INTERVAL).is_ok() {
            return true;
        }
    }
    false
}

/// Log the latest published pose about once a second
fn observe(poses: Receiver<CurrentPose>, running: Arc<AtomicBool>) {
    let mut latest: Option<CurrentPose> = None;
    let mut received: u64 = 0;
    let mut last_log = Instant::now();

    loop {
        match poses.recv_timeout(POLL_INTERVAL) {
            Ok(pose) => {
                latest = Some(pose);
                received += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                if !running.load(Ordering::SeqCst) && poses.is_empty() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_log.elapsed() >= OBSERVER_LOG_INTERVAL {
            if let Some(pose) = latest {
                info!(position = ?pose.position, orientation = ?pose.orientation, "Current pose");
            }
            last_log = Instant::now();
        }
    }
    debug!(received, "Observer stopped");
}

/// Walk a small square with one twist per interval
fn teleop(reference: ReferenceHandle, running: Arc<AtomicBool>) {
    const STEP: f64 = 0.05;
    let pattern = [
        TwistCommand::new([STEP, 0.0, 0.0], [0.0, 0.0, 0.0]),
        TwistCommand::new([0.0, STEP, 0.0], [0.0, 0.0, 0.1]),
        TwistCommand::new([-STEP, 0.0, 0.0], [0.0, 0.0, 0.0]),
        TwistCommand::new([0.0, -STEP, 0.0], [0.0, 0.0, -0.1]),
    ];

    let ticker = tick(TELEOP_INTERVAL);
    for twist in pattern.iter().cycle() {
        if !wait_tick(&ticker, &running) {
            return;
        }
        let outcome = reference.on_twist(twist);
        debug!(?outcome, linear = ?twist.linear, angular = ?twist.angular, "Teleop twist");
    }
}

/// Send absolute targets, including one in a foreign frame
fn plan_targets(reference: ReferenceHandle, base_link: String, running: Arc<AtomicBool>) {
    let waypoints = [
        (
            base_link.clone(),
            Pose::from_parts(Translation3::new(0.3, 0.0, 0.2), rotation_from_rpy(0.0, 0.0, 0.5)),
        ),
        (
            "camera_link".to_string(),
            Pose::from_parts(Translation3::new(1.0, 1.0, 1.0), rotation_from_rpy(0.0, 0.0, 0.0)),
        ),
        (
            base_link,
            Pose::from_parts(Translation3::new(0.0, 0.2, 0.1), rotation_from_rpy(0.3, 0.0, 0.0)),
        ),
    ];

    let ticker = tick(TARGET_INTERVAL);
    for (frame, pose) in waypoints.iter().cycle() {
        if !wait_tick(&ticker, &running) {
            return;
        }
        let msg = PoseStamped::from_pose(frame.as_str(), pose);
        let outcome = reference.on_target_pose(&msg);
        info!(frame = %frame, position = ?msg.position, ?outcome, "Sent target pose");
    }
}

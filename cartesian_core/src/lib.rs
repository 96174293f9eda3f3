//! # Cartesian Core
//!
//! Cartesian-space motion control for robotic manipulators.
//!
//! Given a desired end-effector pose (or a stream of incremental twist
//! commands), the controller repeatedly computes a bounded 6D pose error and
//! drives a forward-dynamics model toward zero error to produce joint
//! commands.
//!
//! ## Structure
//!
//! ```text
//! cartesian_core/
//! ── pose           # SE(3) helpers on nalgebra types
//! ── messages       # Inbound target/twist events, outbound current pose
//! ── motion_error   # Bounded 6D Cartesian error (axis-angle encoding)
//! ── reference      # Shared target pose and its event handlers
//! ── controller     # Control loop (iterative and single-step variants)
//! ── solver         # Forward-dynamics collaborator trait
//! ── publisher      # Current-pose sinks
//! ── config         # Controller configuration (TOML)
//! ── sim            # Point-mass reference model
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use cartesian_core::{
//!     CartesianMotionController, ControllerConfig, NullPublisher, PointMassModel, PoseStamped,
//! };
//! use std::time::Duration;
//!
//! let config = ControllerConfig::position(10);
//! let model = PointMassModel::new(config.interface);
//! let mut controller = CartesianMotionController::new(config, model, NullPublisher).unwrap();
//! controller.starting().unwrap();
//!
//! // Event handlers live on other threads and only need the handle
//! let reference = controller.reference_handle();
//! reference.on_target_pose(&PoseStamped::new("base_link", [0.1, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]));
//!
//! controller.update(Duration::from_millis(10)).unwrap();
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod messages;
pub mod motion_error;
pub mod pose;
pub mod publisher;
pub mod reference;
pub mod sim;
pub mod solver;

// Re-export commonly used types for easy access
pub use config::{ActuationInterface, ControllerConfig};
pub use controller::{CartesianMotionController, ControllerStats};
pub use error::{CartesianError, CartesianResult};
pub use messages::{CurrentPose, PoseStamped, TwistCommand};
pub use motion_error::{compute_motion_error, ErrorLimits};
pub use pose::{Error6D, Pose};
pub use publisher::{NullPublisher, PosePublisher};
pub use reference::{ReferenceHandle, ReferenceUpdate};
pub use sim::{HardwareCommand, PointMassModel};
pub use solver::{ForwardDynamics, SolverError};

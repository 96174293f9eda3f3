//! Controller configuration
//!
//! Loaded from TOML; every field has a default, so an empty document is a
//! valid configuration.
//!
//! ```toml
//! robot_base_link = "base_link"
//! end_effector_link = "tool0"
//! interface = "position"
//! iterations = 10
//! internal_period_secs = 0.02
//! max_angle = 1.0
//! max_distance = 1.0
//! ```

use crate::error::{CartesianError, CartesianResult};
use crate::motion_error::ErrorLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Hardware interface the joint commands are written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuationInterface {
    /// Joint position commands
    #[default]
    Position,
    /// Joint effort commands
    Effort,
    /// Joint velocity commands
    Velocity,
}

impl ActuationInterface {
    /// Internal sub-steps per control tick
    ///
    /// The velocity interface always runs a single step.
    pub fn substeps(&self, configured: u32) -> u32 {
        match self {
            ActuationInterface::Velocity => 1,
            ActuationInterface::Position | ActuationInterface::Effort => configured,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Effort => "effort",
            Self::Velocity => "velocity",
        }
    }
}

/// Configuration for the Cartesian motion controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Frame all target poses must be expressed in
    ///
    /// Default: "base_link"
    pub robot_base_link: String,

    /// Tool frame whose pose is controlled
    ///
    /// Default: "tool0"
    pub end_effector_link: String,

    /// Hardware interface the commands are written to
    ///
    /// Default: position
    pub interface: ActuationInterface,

    /// Internal sub-steps per tick (ignored for the velocity interface)
    ///
    /// Default: 1
    /// Range: >= 1
    pub iterations: u32,

    /// Duration of one internal sub-step in seconds
    ///
    /// Independent of the outer control period.
    /// Default: 0.02
    pub internal_period_secs: f64,

    /// Rotational error ceiling per cycle in radians
    ///
    /// Default: 1.0
    pub max_angle: f64,

    /// Translational error ceiling per cycle in meters
    ///
    /// Default: 1.0
    pub max_distance: f64,

    /// Gain applied to the error before command synthesis
    ///
    /// Default: 1.0
    pub error_scale: f64,

    /// Minimum spacing between repeated warnings in seconds
    ///
    /// Default: 3.0
    pub warn_throttle_secs: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            robot_base_link: "base_link".to_string(),
            end_effector_link: "tool0".to_string(),
            interface: ActuationInterface::Position,
            iterations: 1,
            internal_period_secs: 0.02,
            max_angle: 1.0,
            max_distance: 1.0,
            error_scale: 1.0,
            warn_throttle_secs: 3.0,
        }
    }
}

impl ControllerConfig {
    /// Position interface preset with `iterations` sub-steps per tick
    pub fn position(iterations: u32) -> Self {
        Self {
            interface: ActuationInterface::Position,
            iterations,
            ..Self::default()
        }
    }

    /// Velocity interface preset (always one sub-step per tick)
    pub fn velocity() -> Self {
        Self {
            interface: ActuationInterface::Velocity,
            ..Self::default()
        }
    }

    /// Set the base frame
    pub fn with_base_link(mut self, frame: impl Into<String>) -> Self {
        self.robot_base_link = frame.into();
        self
    }

    /// Set the error ceilings
    pub fn with_limits(mut self, max_angle: f64, max_distance: f64) -> Self {
        self.max_angle = max_angle;
        self.max_distance = max_distance;
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> CartesianResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> CartesianResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CartesianError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> CartesianResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CartesianError::config("config", e.to_string()))
    }

    /// Check all values are usable by the control loop
    pub fn validate(&self) -> CartesianResult<()> {
        if self.robot_base_link.is_empty() {
            return Err(CartesianError::config("robot_base_link", "must not be empty"));
        }
        if self.iterations == 0 {
            return Err(CartesianError::config("iterations", "must be at least 1"));
        }
        Self::check_positive("internal_period_secs", self.internal_period_secs)?;
        Self::check_duration("internal_period_secs", self.internal_period_secs)?;
        Self::check_positive("max_angle", self.max_angle)?;
        Self::check_positive("max_distance", self.max_distance)?;
        Self::check_error_scale(self.error_scale)?;
        if !self.warn_throttle_secs.is_finite() || self.warn_throttle_secs < 0.0 {
            return Err(CartesianError::config(
                "warn_throttle_secs",
                format!("must be finite and non-negative, got {}", self.warn_throttle_secs),
            ));
        }
        Self::check_duration("warn_throttle_secs", self.warn_throttle_secs)?;
        Ok(())
    }

    fn check_duration(field: &'static str, secs: f64) -> CartesianResult<()> {
        Duration::try_from_secs_f64(secs).map(|_| ()).map_err(|_| {
            CartesianError::config(field, format!("not representable as a duration, got {}", secs))
        })
    }

    fn check_error_scale(error_scale: f64) -> CartesianResult<()> {
        if !error_scale.is_finite() || error_scale < 0.0 {
            return Err(CartesianError::config(
                "error_scale",
                format!("must be finite and non-negative, got {}", error_scale),
            ));
        }
        Ok(())
    }

    fn check_positive(field: &'static str, value: f64) -> CartesianResult<()> {
        if !value.is_finite() || value <= 0.0 {
            return Err(CartesianError::config(
                field,
                format!("must be finite and positive, got {}", value),
            ));
        }
        Ok(())
    }

    /// Sub-steps per tick after applying the interface rule
    pub fn substeps(&self) -> u32 {
        self.interface.substeps(self.iterations)
    }

    /// Internal sub-step duration
    pub fn internal_period(&self) -> Duration {
        Duration::from_secs_f64(self.internal_period_secs)
    }

    /// Error ceilings
    pub fn limits(&self) -> ErrorLimits {
        ErrorLimits::new(self.max_angle, self.max_distance)
    }

    /// Warning throttle window
    pub fn warn_throttle(&self) -> Duration {
        Duration::from_secs_f64(self.warn_throttle_secs)
    }
}

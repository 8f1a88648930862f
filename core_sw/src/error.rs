//! Error types for swerve control and shot compensation
//!
//! Only [`ConfigurationError`] is meant to stop anything, and only at startup. The rest are
//! reported after the affected output has already gone neutral.

use crate::names::ModuleName;

/// A sensor sample that must not reach a control computation
#[derive(Copy, Clone, Debug, PartialEq, thiserror::Error)]
pub enum SensorFault {
    /// The device returned NaN or infinity
    #[error("sensor reading is not finite")]
    NotFinite,

    /// An angle outside `[0, 2π)`; `wrapped` is the same angle after an explicit modulo
    #[error("angle {raw} rad is outside [0, 2π), wraps to {wrapped}")]
    OutOfDomain {
        /// The reading as reported
        raw: f32,
        /// The reading brought into `[0, 2π)`
        wrapped: f32,
    },

    /// The device reported a stale or invalid sample
    #[error("device reported an invalid sample")]
    Device,

    /// A finite rate that the drivetrain cannot physically produce
    #[error("reading {value} is not physically plausible")]
    Implausible {
        /// The converted reading
        value: f32,
    },
}

/// Why a module went to a stop instead of following its command
#[derive(Copy, Clone, Debug, PartialEq, thiserror::Error)]
pub enum ModuleError {
    #[error("{module}: {fault}")]
    Sensor {
        module: ModuleName,
        fault: SensorFault,
    },

    #[error("{module}: commanded state is not finite")]
    InvalidCommand { module: ModuleName },
}

impl ModuleError {
    pub fn module(&self) -> ModuleName {
        match self {
            ModuleError::Sensor { module, .. } | ModuleError::InvalidCommand { module } => *module,
        }
    }
}

/// An input to shot compensation that would produce NaN or infinity
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ShotHazard {
    /// Distance to the target is zero, negative, not finite or unavailable
    #[error("distance to target unavailable")]
    InvalidDistance,

    /// Chassis velocity is not finite
    #[error("chassis velocity is not finite")]
    InvalidVelocity,
}

/// A robot definition that is unsafe to drive with
#[derive(Copy, Clone, Debug, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{module}: encoder offset {offset} rad is outside [0, 2π)")]
    EncoderOffsetOutOfRange { module: ModuleName, offset: f32 },

    #[error("{name} is out of range, got {value}")]
    InvalidConstant { name: &'static str, value: f32 },

    #[error("module definition {index} is {found}, modules must be listed in order")]
    ModuleOrder { index: usize, found: ModuleName },

    #[error("module locations do not span the robot")]
    DegenerateGeometry,
}

/// Fail with [`ConfigurationError::InvalidConstant`] unless `value` is finite and `> 0`
pub(crate) fn require_positive(name: &'static str, value: f32) -> Result<f32, ConfigurationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigurationError::InvalidConstant { name, value })
    }
}

/// Fail with [`ConfigurationError::InvalidConstant`] unless `value` is finite and `>= 0`
pub(crate) fn require_non_negative(
    name: &'static str,
    value: f32,
) -> Result<f32, ConfigurationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigurationError::InvalidConstant { name, value })
    }
}

use crate::constants::*;
use crate::drive_system::DriveSystem;
use crate::error::{require_non_negative, require_positive, ConfigurationError};
use crate::geometry::{pose, Pose};
use crate::names::{ModuleName, NUM_MODULES};
use core::f32::consts::{PI, TAU};
use core::time::Duration;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// All the information that may vary from robot to robot
///
/// Loaded once before the control loop starts; see [`RobotDefinition::validate`]
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RobotDefinition {
    /// Left-to-right distance between wheel centers, m
    pub track_width: f32,
    /// Front-to-back distance between wheel centers, m
    pub wheel_base: f32,

    /// Calibration for each module, in [`ModuleName`] order
    pub modules: [ModuleDefinition; NUM_MODULES],
    /// Shared physical characteristics of the drive modules
    pub drive: DriveConstants,
    /// Gains for the closed-loop steering controller
    pub steer: SteerGains,
    /// Move-and-shoot targeting
    pub shoot: ShootSettings,

    /// Period of the control loop, ms
    pub control_period_ms: u64,
}

/// Per-module absolute encoder and motor direction settings
///
/// Set once from static configuration; a module controller never changes it
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleCalibration {
    /// Raw encoder angle when the wheel points forwards, rad, `0 <= offset < 2π`
    pub encoder_offset: f32,
    /// Whether the absolute encoder counts clockwise
    pub encoder_reversed: bool,
    /// Whether positive drive effort should turn the drive motor backwards
    pub drive_inverted: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub name: ModuleName,
    pub calibration: ModuleCalibration,
}

/// Conversion factors from drive encoder ticks to physical units
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriveConstants {
    /// Encoder ticks per drive motor revolution
    pub ticks_per_revolution: f32,
    /// The encoder reports rate as ticks per this many seconds
    pub tick_rate_window_s: f32,
    /// Wheel revolutions per motor revolution
    pub gear_reduction: f32,
    /// m
    pub wheel_diameter: f32,
    /// Wheel speed that corresponds to full drive effort, m/s
    pub max_velocity: f32,
    /// Commanded wheel speeds with magnitude below this stop the module, as does zero, m/s
    pub deadband: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SteerGains {
    pub p: f32,
    pub i: f32,
    pub d: f32,
    /// Bound on steer effort, `0 < output_limit <= 1`
    pub output_limit: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShootSettings {
    /// Field-relative reference pose of the target
    pub target: PoseDefinition,
    /// Relative target offsets within this distance on an axis count as aligned, m
    pub alignment_tolerance: f32,
    /// Shooter speed scale per m/s of lateral velocity
    pub compensation_gain: f32,
}

/// Serializable form of a [`Pose`]
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseDefinition {
    pub x: f32,
    pub y: f32,
    /// rad
    pub heading: f32,
}

impl PoseDefinition {
    pub fn to_pose(&self) -> Pose {
        pose(self.x, self.y, self.heading)
    }
}

impl Default for RobotDefinition {
    fn default() -> Self {
        Self {
            track_width: TRACK_WIDTH_M,
            wheel_base: WHEEL_BASE_M,

            modules: ModuleName::get_all().map(|name| ModuleDefinition {
                name,
                calibration: ModuleCalibration::default(),
            }),
            drive: DriveConstants::default(),
            steer: SteerGains::default(),
            shoot: ShootSettings::default(),

            control_period_ms: CONTROL_PERIOD_MS,
        }
    }
}

impl Default for DriveConstants {
    fn default() -> Self {
        Self {
            ticks_per_revolution: FALCON_TICKS_PER_REVOLUTION,
            tick_rate_window_s: FALCON_VELOCITY_WINDOW_S,
            gear_reduction: MK4_L2_DRIVE_REDUCTION,
            wheel_diameter: MK4_WHEEL_DIAMETER_M,
            max_velocity: MAX_VELOCITY_M_PER_S,
            deadband: DRIVE_DEADBAND_M_PER_S,
        }
    }
}

impl Default for SteerGains {
    fn default() -> Self {
        Self {
            p: STEER_P,
            i: 0.0,
            d: STEER_D,
            output_limit: 1.0,
        }
    }
}

impl Default for ShootSettings {
    fn default() -> Self {
        Self {
            target: PoseDefinition::default(),
            alignment_tolerance: SHOT_ALIGNMENT_TOLERANCE_M,
            compensation_gain: 1.0,
        }
    }
}

impl ModuleCalibration {
    pub fn validate(&self, module: ModuleName) -> Result<(), ConfigurationError> {
        let offset = self.encoder_offset;
        if offset.is_finite() && (0.0..TAU).contains(&offset) {
            Ok(())
        } else {
            Err(ConfigurationError::EncoderOffsetOutOfRange { module, offset })
        }
    }
}

impl DriveConstants {
    pub fn wheel_circumference(&self) -> f32 {
        self.wheel_diameter * PI
    }

    /// Motor revolutions per second for one unit of reported tick rate
    pub fn ticks_to_revolutions(&self) -> f32 {
        1.0 / (self.ticks_per_revolution * self.tick_rate_window_s)
    }

    /// Reported tick rate to wheel surface speed, m/s
    pub fn tick_rate_to_velocity(&self, tick_rate: f32) -> f32 {
        tick_rate * self.ticks_to_revolutions() * self.gear_reduction * self.wheel_circumference()
    }

    /// Accumulated ticks to distance travelled by the wheel, m
    pub fn ticks_to_distance(&self, ticks: i64) -> f32 {
        ticks as f32 / self.ticks_per_revolution * self.gear_reduction * self.wheel_circumference()
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        require_positive("drive.ticks_per_revolution", self.ticks_per_revolution)?;
        require_positive("drive.tick_rate_window_s", self.tick_rate_window_s)?;
        require_positive("drive.gear_reduction", self.gear_reduction)?;
        require_positive("drive.wheel_diameter", self.wheel_diameter)?;
        require_positive("drive.max_velocity", self.max_velocity)?;
        require_non_negative("drive.deadband", self.deadband)?;
        Ok(())
    }
}

impl SteerGains {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        require_non_negative("steer.p", self.p)?;
        require_non_negative("steer.i", self.i)?;
        require_non_negative("steer.d", self.d)?;
        let limit = require_positive("steer.output_limit", self.output_limit)?;
        if limit > 1.0 {
            return Err(ConfigurationError::InvalidConstant {
                name: "steer.output_limit",
                value: limit,
            });
        }
        Ok(())
    }
}

impl ShootSettings {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let PoseDefinition { x, y, heading } = self.target;
        for (name, value) in [
            ("shoot.target.x", x),
            ("shoot.target.y", y),
            ("shoot.target.heading", heading),
        ] {
            if !value.is_finite() {
                return Err(ConfigurationError::InvalidConstant { name, value });
            }
        }
        require_non_negative("shoot.alignment_tolerance", self.alignment_tolerance)?;
        require_non_negative("shoot.compensation_gain", self.compensation_gain)?;
        Ok(())
    }
}

impl RobotDefinition {
    /// Check everything that would make the robot unsafe to drive
    ///
    /// Reports the first offending module or constant
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        require_positive("track_width", self.track_width)?;
        require_positive("wheel_base", self.wheel_base)?;
        for (index, module) in self.modules.iter().enumerate() {
            if module.name as usize != index {
                return Err(ConfigurationError::ModuleOrder {
                    index,
                    found: module.name,
                });
            }
            module.calibration.validate(module.name)?;
        }
        self.drive.validate()?;
        self.steer.validate()?;
        self.shoot.validate()?;
        if self.control_period_ms == 0 {
            return Err(ConfigurationError::InvalidConstant {
                name: "control_period_ms",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// Wheel locations relative to the robot center, in [`ModuleName`] order
    pub fn module_locations(&self) -> [Vector2<f32>; NUM_MODULES] {
        ModuleName::get_all().map(|name| {
            let [x, y] = name.location(self.track_width, self.wheel_base);
            Vector2::new(x, y)
        })
    }

    pub fn drive_system(&self) -> Result<DriveSystem<NUM_MODULES>, ConfigurationError> {
        DriveSystem::new_swerve(self.module_locations()).ok_or(ConfigurationError::DegenerateGeometry)
    }

    pub fn control_period(&self) -> Duration {
        Duration::from_millis(self.control_period_ms)
    }
}

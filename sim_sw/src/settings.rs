use anyhow::{ensure, Context};
use core_sw::geometry::{ChassisVelocity, FieldFrame};
use core_sw::names::NUM_MODULES;
use core_sw::robot_definition::{PoseDefinition, RobotDefinition};
use core_sw::routine::ShooterMode;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything needed to run one simulation
///
/// Every field may be omitted from the JSON file, falling back to [`Default`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    pub robot: RobotDefinition,

    /// Where the robot starts on the field
    pub start: PoseDefinition,
    /// Physical wheel headings at startup, rad
    pub module_headings: [f32; NUM_MODULES],

    /// Number of control ticks to run
    pub ticks: u32,
    /// If false, run as fast as possible instead of sleeping for each period
    pub realtime: bool,

    /// Field-relative driver command: vx, vy (m/s), omega (rad/s)
    pub driver_command: [f32; 3],
    pub shooter_mode: ShooterMode,
    /// Index of a module whose absolute encoder reports errors from the start
    pub faulty_encoder: Option<usize>,

    /// Steering speed at full effort, rad/s
    pub steer_rate: f32,
    /// Time for wheel speed to approach its commanded value, s
    pub drive_time_constant_s: f32,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            robot: RobotDefinition::default(),

            start: PoseDefinition::default(),
            module_headings: [0.0; NUM_MODULES],

            ticks: 250,
            realtime: true,

            driver_command: [1.0, 0.5, 0.0],
            shooter_mode: ShooterMode::Armed,
            faulty_encoder: None,

            steer_rate: 12.0,
            drive_time_constant_s: 0.1,
        }
    }
}

impl SimSettings {
    /// Read settings from a JSON file, or use the defaults if there is no path
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            info!("No settings file given, using defaults");
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Reject settings that would make the simulation meaningless or the robot unsafe
    pub fn validate(&self) -> anyhow::Result<()> {
        self.robot.validate()?;
        ensure!(
            self.steer_rate.is_finite() && self.steer_rate > 0.0,
            "steer_rate must be positive, got {}",
            self.steer_rate
        );
        ensure!(
            self.drive_time_constant_s.is_finite() && self.drive_time_constant_s > 0.0,
            "drive_time_constant_s must be positive, got {}",
            self.drive_time_constant_s
        );
        ensure!(
            self.driver_command.iter().all(|v| v.is_finite()),
            "driver_command must be finite, got {:?}",
            self.driver_command
        );
        if let Some(index) = self.faulty_encoder {
            ensure!(index < NUM_MODULES, "faulty_encoder must be a module index, got {index}");
        }
        Ok(())
    }

    pub fn driver_command(&self) -> ChassisVelocity<FieldFrame> {
        let [vx, vy, omega] = self.driver_command;
        ChassisVelocity::new(vx, vy, omega)
    }
}

//! Simulated motors and encoders for the swerve modules

use core_sw::angle::wrap_angle;
use core_sw::hardware::{AbsoluteEncoder, DriveEncoder, Motor, NeutralBehavior};
use core_sw::robot_definition::{DriveConstants, ModuleCalibration};
use std::f32::consts::TAU;
use std::sync::{Arc, RwLock};

/// Physical state of one module, shared by its devices and the physics step
#[derive(Copy, Clone, Debug)]
pub struct SimModule {
    /// True wheel heading, rad
    pub steer_angle: f32,
    /// True wheel surface speed, m/s
    pub wheel_speed: f32,
    /// Wheel travel since the drive encoder was last zeroed, m
    pub wheel_distance: f32,

    pub drive_effort: f32,
    pub steer_effort: f32,
    pub drive_inverted: bool,
    pub steer_inverted: bool,
    pub drive_neutral: NeutralBehavior,

    /// How the absolute encoder is mounted
    pub mounting: ModuleCalibration,
    /// When set, the absolute encoder reports an error
    pub encoder_fault: bool,
}

impl SimModule {
    pub fn new(steer_angle: f32, mounting: ModuleCalibration) -> Self {
        Self {
            steer_angle: wrap_angle(steer_angle),
            wheel_speed: 0.0,
            wheel_distance: 0.0,
            drive_effort: 0.0,
            steer_effort: 0.0,
            drive_inverted: false,
            steer_inverted: false,
            drive_neutral: NeutralBehavior::Coast,
            mounting,
            encoder_fault: false,
        }
    }

    /// Drive effort as seen by the wheel, after the motor's direction setting
    pub fn applied_drive_effort(&self) -> f32 {
        if self.drive_inverted {
            -self.drive_effort
        } else {
            self.drive_effort
        }
    }

    pub fn applied_steer_effort(&self) -> f32 {
        if self.steer_inverted {
            -self.steer_effort
        } else {
            self.steer_effort
        }
    }

    /// What the absolute encoder reports for the current wheel heading
    pub fn raw_angle(&self) -> f32 {
        let mounted = wrap_angle(self.steer_angle + self.mounting.encoder_offset);
        if self.mounting.encoder_reversed && mounted != 0.0 {
            TAU - mounted
        } else {
            mounted
        }
    }
}

pub type SharedModule = Arc<RwLock<SimModule>>;

#[derive(Debug)]
pub enum SimHardwareError {
    Poisoned,
    Disconnected,
}

/// Drive motor with its integrated encoder
pub struct SimDriveMotor {
    module: SharedModule,
    constants: DriveConstants,
}

impl SimDriveMotor {
    pub fn new(module: SharedModule, constants: DriveConstants) -> Self {
        Self { module, constants }
    }

    /// Wheel surface distance for one encoder tick, m
    fn meters_per_tick(&self) -> f32 {
        self.constants.ticks_to_distance(1)
    }

    /// The encoder reports in the motor's own direction
    fn sensor_sign(module: &SimModule) -> f32 {
        if module.drive_inverted {
            -1.0
        } else {
            1.0
        }
    }
}

impl Motor for SimDriveMotor {
    fn set_effort(&mut self, effort: f32) {
        if let Ok(mut module) = self.module.write() {
            module.drive_effort = effort;
        }
    }

    fn set_neutral_behavior(&mut self, behavior: NeutralBehavior) {
        if let Ok(mut module) = self.module.write() {
            module.drive_neutral = behavior;
        }
    }

    fn set_inverted(&mut self, inverted: bool) {
        if let Ok(mut module) = self.module.write() {
            module.drive_inverted = inverted;
        }
    }
}

impl DriveEncoder for SimDriveMotor {
    type Error = SimHardwareError;

    fn tick_count(&mut self) -> Result<i64, Self::Error> {
        let module = self.module.read().map_err(|_| SimHardwareError::Poisoned)?;
        let ticks = module.wheel_distance / self.meters_per_tick() * Self::sensor_sign(&module);
        Ok(ticks.round() as i64)
    }

    fn tick_rate(&mut self) -> Result<f32, Self::Error> {
        let module = self.module.read().map_err(|_| SimHardwareError::Poisoned)?;
        let per_tick_rate = self.constants.tick_rate_to_velocity(1.0);
        Ok(module.wheel_speed / per_tick_rate * Self::sensor_sign(&module))
    }

    fn reset_ticks(&mut self) {
        if let Ok(mut module) = self.module.write() {
            module.wheel_distance = 0.0;
        }
    }
}

pub struct SimSteerMotor {
    module: SharedModule,
}

impl SimSteerMotor {
    pub fn new(module: SharedModule) -> Self {
        Self { module }
    }
}

impl Motor for SimSteerMotor {
    fn set_effort(&mut self, effort: f32) {
        if let Ok(mut module) = self.module.write() {
            module.steer_effort = effort;
        }
    }

    /// Steering has no inertia in this model, so it holds position either way
    fn set_neutral_behavior(&mut self, _behavior: NeutralBehavior) {}

    fn set_inverted(&mut self, inverted: bool) {
        if let Ok(mut module) = self.module.write() {
            module.steer_inverted = inverted;
        }
    }
}

pub struct SimAbsoluteEncoder {
    module: SharedModule,
}

impl SimAbsoluteEncoder {
    pub fn new(module: SharedModule) -> Self {
        Self { module }
    }
}

impl AbsoluteEncoder for SimAbsoluteEncoder {
    type Error = SimHardwareError;

    fn absolute_angle(&mut self) -> Result<f32, Self::Error> {
        let module = self.module.read().map_err(|_| SimHardwareError::Poisoned)?;
        if module.encoder_fault {
            return Err(SimHardwareError::Disconnected);
        }
        Ok(module.raw_angle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use core_sw::angle::normalize;

    #[test]
    fn raw_angle_inverts_calibration() {
        for (offset, reversed) in [(0.0, false), (1.3, false), (5.0, true), (0.0, true)] {
            let mounting = ModuleCalibration {
                encoder_offset: offset,
                encoder_reversed: reversed,
                drive_inverted: false,
            };
            for i in 0..12 {
                let heading = i as f32 * TAU / 12.0 + 0.05;
                let module = SimModule::new(heading, mounting);
                let measured = normalize(module.raw_angle(), offset, reversed).unwrap();
                assert_relative_eq!(
                    core_sw::angle::shortest_delta(heading, measured),
                    0.0,
                    epsilon = 1e-4
                );
            }
        }
    }

    #[test]
    fn drive_encoder_follows_inversion() {
        let module = Arc::new(RwLock::new(SimModule::new(0.0, Default::default())));
        let constants = DriveConstants::default();
        let mut motor = SimDriveMotor::new(module.clone(), constants);
        motor.set_inverted(true);
        module.write().unwrap().wheel_speed = -1.0;
        module.write().unwrap().wheel_distance = -2.0;

        assert_relative_eq!(
            constants.tick_rate_to_velocity(motor.tick_rate().unwrap()),
            1.0,
            epsilon = 1e-4
        );
        let distance = constants.ticks_to_distance(motor.tick_count().unwrap());
        assert_relative_eq!(distance, 2.0, epsilon = 1e-3);

        motor.reset_ticks();
        assert_eq!(motor.tick_count().unwrap(), 0);
    }

    #[test]
    fn encoder_fault_is_reported() {
        let module = Arc::new(RwLock::new(SimModule::new(1.0, Default::default())));
        let mut encoder = SimAbsoluteEncoder::new(module.clone());
        assert_relative_eq!(encoder.absolute_angle().unwrap(), 1.0);
        module.write().unwrap().encoder_fault = true;
        assert!(encoder.absolute_angle().is_err());
    }
}

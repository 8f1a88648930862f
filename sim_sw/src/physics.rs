use crate::driving::{
    SharedModule, SimAbsoluteEncoder, SimDriveMotor, SimHardwareError, SimModule, SimSteerMotor,
};
use crate::settings::SimSettings;
use core_sw::angle::wrap_angle;
use core_sw::drive_system::DriveSystem;
use core_sw::error::ConfigurationError;
use core_sw::geometry::{pose, ChassisVelocity, FieldFrame, Pose};
use core_sw::hardware::{NeutralBehavior, PoseProvider, RangeProvider};
use core_sw::names::NUM_MODULES;
use core_sw::nalgebra::Vector2;
use core_sw::robot_definition::DriveConstants;
use core_sw::swerve_module::WheelState;
use std::sync::{Arc, RwLock};

/// Coasting wheels lose speed this much slower than driven ones
const COAST_SLOWDOWN: f32 = 10.0;

pub type SimModuleHardware = (SimDriveMotor, SimSteerMotor, SimAbsoluteEncoder);

/// The simulated robot body, its modules and the target it shoots at
pub struct SimWorld {
    modules: [SharedModule; NUM_MODULES],
    drive_system: DriveSystem<NUM_MODULES>,
    constants: DriveConstants,

    /// Steering speed at full effort, rad/s
    steer_rate: f32,
    /// Time for wheel speed to approach its commanded value, s
    drive_time_constant: f32,

    pose: Pose,
    velocity: ChassisVelocity<FieldFrame>,
    target: Vector2<f32>,
}

impl SimWorld {
    pub fn new(settings: &SimSettings) -> Result<Self, ConfigurationError> {
        let robot = &settings.robot;
        let mut i = 0;
        let modules = settings.module_headings.map(|heading| {
            let module = SimModule::new(heading, robot.modules[i].calibration);
            i += 1;
            Arc::new(RwLock::new(module))
        });
        Ok(Self {
            modules,
            drive_system: robot.drive_system()?,
            constants: robot.drive,
            steer_rate: settings.steer_rate,
            drive_time_constant: settings.drive_time_constant_s,
            pose: settings.start.to_pose(),
            velocity: ChassisVelocity::zero(),
            target: Vector2::new(robot.shoot.target.x, robot.shoot.target.y),
        })
    }

    /// One device set per module, in module order
    pub fn hardware(&self) -> [SimModuleHardware; NUM_MODULES] {
        self.modules.clone().map(|module| {
            (
                SimDriveMotor::new(module.clone(), self.constants),
                SimSteerMotor::new(module.clone()),
                SimAbsoluteEncoder::new(module),
            )
        })
    }

    pub fn module(&self, index: usize) -> Result<SimModule, SimHardwareError> {
        let module = self.modules[index]
            .read()
            .map_err(|_| SimHardwareError::Poisoned)?;
        Ok(*module)
    }

    #[cfg(test)]
    pub fn shared_module(&self, index: usize) -> SharedModule {
        self.modules[index].clone()
    }

    pub fn set_encoder_fault(&self, index: usize, fault: bool) -> Result<(), SimHardwareError> {
        let mut module = self.modules[index]
            .write()
            .map_err(|_| SimHardwareError::Poisoned)?;
        module.encoder_fault = fault;
        Ok(())
    }

    /// Advance the modules and the robot body by `dt` seconds
    pub fn step(&mut self, dt: f32) -> Result<(), SimHardwareError> {
        let blend = (dt / self.drive_time_constant).min(1.0);
        let mut states = [WheelState::default(); NUM_MODULES];

        for (module, state) in self.modules.iter().zip(states.iter_mut()) {
            let mut m = module.write().map_err(|_| SimHardwareError::Poisoned)?;

            m.steer_angle =
                wrap_angle(m.steer_angle + m.applied_steer_effort() * self.steer_rate * dt);

            let drive = m.applied_drive_effort();
            let target_speed = drive * self.constants.max_velocity;
            let rate = if drive == 0.0 && m.drive_neutral == NeutralBehavior::Coast {
                blend / COAST_SLOWDOWN
            } else {
                blend
            };
            m.wheel_speed += (target_speed - m.wheel_speed) * rate;
            m.wheel_distance += m.wheel_speed * dt;

            *state = WheelState::new(m.wheel_speed, m.steer_angle);
        }

        let robot = self.drive_system.get_chassis_velocity(&states);
        self.velocity = robot.to_field_relative(self.pose.rotation);
        self.pose = pose(
            self.pose.translation.x + self.velocity.vx * dt,
            self.pose.translation.y + self.velocity.vy * dt,
            self.pose.rotation.angle() + self.velocity.omega * dt,
        );
        Ok(())
    }

    /// Field heading as a gyro would report it, rad
    pub fn gyro(&self) -> f32 {
        wrap_angle(self.pose.rotation.angle())
    }

    /// A snapshot of the range sensor for one tick
    pub fn range_finder(&self) -> SimRangeFinder {
        let distance = (self.target - self.pose.translation.vector).norm();
        SimRangeFinder {
            distance: Some(distance),
        }
    }
}

/// Ground truth, for comparison against odometry
impl PoseProvider for SimWorld {
    fn current_pose(&self) -> Pose {
        self.pose
    }

    fn current_chassis_velocity(&self) -> ChassisVelocity<FieldFrame> {
        self.velocity
    }
}

pub struct SimRangeFinder {
    distance: Option<f32>,
}

impl RangeProvider for SimRangeFinder {
    fn distance_to_target(&self) -> Option<f32> {
        self.distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use core_sw::hardware::Motor;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn driven_wheels_move_the_body() {
        let settings = SimSettings::default();
        let mut world = SimWorld::new(&settings).unwrap();
        for (mut drive, mut steer, _) in world.hardware() {
            drive.set_effort(0.5);
            steer.set_effort(0.0);
        }
        for _ in 0..100 {
            world.step(0.02).unwrap();
        }
        let speed = 0.5 * settings.robot.drive.max_velocity;
        assert_relative_eq!(world.current_chassis_velocity().vx, speed, epsilon = 1e-3);
        assert!(world.current_pose().translation.x > speed);
        assert_relative_eq!(world.current_pose().translation.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn steering_changes_heading() {
        let mut world = SimWorld::new(&SimSettings::default()).unwrap();
        let hardware = world.hardware();
        let (_, mut steer, _) = hardware.into_iter().next().unwrap();
        steer.set_effort(1.0);
        world.step(0.1).unwrap();
        let module = world.module(0).unwrap();
        assert_relative_eq!(module.steer_angle, world.steer_rate * 0.1, epsilon = 1e-5);
        assert!(module.steer_angle < FRAC_PI_2);
    }

    #[test]
    fn range_is_distance_to_target() {
        let mut settings = SimSettings::default();
        settings.robot.shoot.target.x = 3.0;
        settings.robot.shoot.target.y = 4.0;
        let world = SimWorld::new(&settings).unwrap();
        assert_relative_eq!(world.range_finder().distance_to_target().unwrap(), 5.0);
    }
}

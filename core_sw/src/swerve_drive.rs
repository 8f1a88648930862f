//! Four [`SwerveModule`]s driven as one chassis

use crate::drive_system::DriveSystem;
use crate::error::{ConfigurationError, ModuleError};
use crate::geometry::{ChassisVelocity, FieldFrame, RobotFrame};
use crate::hardware::{AbsoluteEncoder, DriveEncoder, Motor};
use crate::names::{ModuleName, NUM_MODULES};
use crate::robot_definition::RobotDefinition;
use crate::swerve_module::{ModuleCommand, ModulePosition, SwerveModule, WheelState};
use log::info;
use nalgebra::UnitComplex;

/// A drivetrain that routines can command
pub trait ChassisDrive {
    /// Command every module from one robot-relative velocity snapshot
    fn drive(&mut self, target: ChassisVelocity<RobotFrame>) -> DriveReport;

    /// Zero every actuator
    fn stop(&mut self);
}

/// Per-module outcome of one chassis command, in [`ModuleName`] order
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DriveReport {
    pub modules: [Result<ModuleCommand, ModuleError>; NUM_MODULES],
}

impl DriveReport {
    /// Modules that failed safe this tick
    pub fn faults(&self) -> impl Iterator<Item = &ModuleError> {
        self.modules.iter().filter_map(|r| r.as_ref().err())
    }

    pub fn is_healthy(&self) -> bool {
        self.faults().next().is_none()
    }
}

pub struct SwerveDrive<D, S, E> {
    modules: [SwerveModule<D, S, E>; NUM_MODULES],
    drive_system: DriveSystem<NUM_MODULES>,
    max_velocity: f32,
}

impl<D, S, E> SwerveDrive<D, S, E>
where
    D: Motor + DriveEncoder,
    S: Motor,
    E: AbsoluteEncoder,
{
    /// Validate `definition` and build one module per `(drive, steer, encoder)` triple,
    /// in [`ModuleName`] order
    pub fn new(
        definition: &RobotDefinition,
        hardware: [(D, S, E); NUM_MODULES],
    ) -> Result<Self, ConfigurationError> {
        definition.validate()?;
        let drive_system = definition.drive_system()?;

        let mut hardware = hardware.into_iter();
        let modules = array_init::try_array_init(|i| {
            let (drive, steer, encoder) = hardware
                .next()
                .ok_or(ConfigurationError::DegenerateGeometry)?;
            SwerveModule::new(
                &definition.modules[i],
                &definition.drive,
                &definition.steer,
                drive,
                steer,
                encoder,
            )
        })?;

        info!("Swerve drive configured with {} modules", NUM_MODULES);

        Ok(Self {
            modules,
            drive_system,
            max_velocity: definition.drive.max_velocity,
        })
    }

    pub fn drive_system(&self) -> &DriveSystem<NUM_MODULES> {
        &self.drive_system
    }

    pub fn module(&self, name: ModuleName) -> &SwerveModule<D, S, E> {
        &self.modules[name as usize]
    }

    pub fn module_mut(&mut self, name: ModuleName) -> &mut SwerveModule<D, S, E> {
        &mut self.modules[name as usize]
    }

    /// Drive at a robot-relative velocity
    ///
    /// All four states are computed from `target` before any module is commanded, and every
    /// module is commanded even if an earlier one faults
    pub fn set_chassis_velocity(&mut self, target: ChassisVelocity<RobotFrame>) -> DriveReport {
        let mut states = self.drive_system.get_module_states(target);
        DriveSystem::desaturate(&mut states, self.max_velocity);
        self.set_module_states(states)
    }

    /// Drive at a field-relative velocity, given the robot's field heading
    pub fn drive_field_relative(
        &mut self,
        target: ChassisVelocity<FieldFrame>,
        heading: UnitComplex<f32>,
    ) -> DriveReport {
        self.set_chassis_velocity(target.to_robot_relative(heading))
    }

    /// Command each module directly, in [`ModuleName`] order
    pub fn set_module_states(&mut self, states: [WheelState; NUM_MODULES]) -> DriveReport {
        let mut i = 0;
        let modules = states.map(|state| {
            let result = self.modules[i].set_desired_state(state);
            i += 1;
            result
        });
        DriveReport { modules }
    }

    /// Measured robot-relative velocity from the wheel states
    pub fn chassis_velocity(&mut self) -> Result<ChassisVelocity<RobotFrame>, ModuleError> {
        let states = self.module_states()?;
        Ok(self.drive_system.get_chassis_velocity(&states))
    }

    pub fn module_states(&mut self) -> Result<[WheelState; NUM_MODULES], ModuleError> {
        array_init::try_array_init(|i| self.modules[i].state())
    }

    pub fn module_positions(&mut self) -> Result<[ModulePosition; NUM_MODULES], ModuleError> {
        array_init::try_array_init(|i| self.modules[i].position())
    }

    pub fn reset_encoders(&mut self) {
        for module in &mut self.modules {
            module.reset_encoders();
        }
    }

    pub fn stop(&mut self) {
        for module in &mut self.modules {
            module.stop();
        }
    }
}

impl<D, S, E> ChassisDrive for SwerveDrive<D, S, E>
where
    D: Motor + DriveEncoder,
    S: Motor,
    E: AbsoluteEncoder,
{
    fn drive(&mut self, target: ChassisVelocity<RobotFrame>) -> DriveReport {
        self.set_chassis_velocity(target)
    }

    fn stop(&mut self) {
        SwerveDrive::stop(self)
    }
}

//! Control of a single independently driven and steered wheel
//!
//! See [`SwerveModule::set_desired_state`] for the per-tick algorithm.

use crate::angle::{normalize, shortest_delta, wrap_angle};
use crate::error::{ConfigurationError, ModuleError, SensorFault};
use crate::hardware::{AbsoluteEncoder, DriveEncoder, Motor, NeutralBehavior};
use crate::names::ModuleName;
use crate::robot_definition::{DriveConstants, ModuleCalibration, ModuleDefinition, SteerGains};
use core::f32::consts::{FRAC_PI_2, PI};
use log::{trace, warn};
use pid::Pid;

/// A direct heading whose delta exceeds π/2 by no more than this still counts as a tie,
/// and ties keep the direct heading
pub const OPTIMIZE_TIE_TOLERANCE: f32 = 1e-5;

/// Measured drive speeds beyond `max_velocity` times this are sensor faults
const PLAUSIBLE_SPEED_FACTOR: f32 = 2.0;

/// Speed and steering angle of one wheel
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct WheelState {
    /// m/s, negative drives the wheel backwards
    pub speed: f32,
    /// rad, `0 <= heading < 2π`
    pub heading: f32,
}

impl WheelState {
    pub const fn new(speed: f32, heading: f32) -> Self {
        Self { speed, heading }
    }
}

/// Distance driven by one wheel and its current heading, for odometry
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ModulePosition {
    /// m since the last encoder reset
    pub distance: f32,
    /// rad, `0 <= heading < 2π`
    pub heading: f32,
}

/// What a module sent to its actuators during one tick
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ModuleCommand {
    /// Both actuators were commanded zero effort
    Idle,
    Driving {
        /// The optimized state being followed
        state: WheelState,
        drive_effort: f32,
        steer_effort: f32,
    },
}

/// Choose between `desired` and its rotational opposite, whichever needs less steering from
/// `current_heading`
///
/// The result's heading is within π/2 of `current_heading` (plus [`OPTIMIZE_TIE_TOLERANCE`]).
/// When both are exactly π/2 away, `desired` is returned unchanged.
pub fn optimize(desired: WheelState, current_heading: f32) -> WheelState {
    let heading = wrap_angle(desired.heading);
    let delta = shortest_delta(current_heading, heading);
    if libm::fabsf(delta) > FRAC_PI_2 + OPTIMIZE_TIE_TOLERANCE {
        WheelState::new(-desired.speed, wrap_angle(heading + PI))
    } else {
        WheelState::new(desired.speed, heading)
    }
}

/// Owns one module's drive motor, steer motor and absolute encoder
///
/// Calibration is fixed at construction; a module with new calibration is a new
/// `SwerveModule`
pub struct SwerveModule<D, S, E> {
    name: ModuleName,
    calibration: ModuleCalibration,
    constants: DriveConstants,

    drive: D,
    steer: S,
    encoder: E,

    // PID on the circular heading error, so the setpoint is always zero
    steer_pid: Pid<f32>,
    heading_setpoint: f32,
    last_fault: Option<ModuleError>,
}

impl<D, S, E> SwerveModule<D, S, E>
where
    D: Motor + DriveEncoder,
    S: Motor,
    E: AbsoluteEncoder,
{
    /// Configure the hardware for one module
    ///
    /// Both motors are set to brake, the drive motor direction is applied, and the drive
    /// encoder is zeroed
    pub fn new(
        definition: &ModuleDefinition,
        constants: &DriveConstants,
        gains: &SteerGains,
        mut drive: D,
        mut steer: S,
        encoder: E,
    ) -> Result<Self, ConfigurationError> {
        definition.calibration.validate(definition.name)?;
        constants.validate()?;
        gains.validate()?;

        drive.set_neutral_behavior(NeutralBehavior::Brake);
        steer.set_neutral_behavior(NeutralBehavior::Brake);
        drive.set_inverted(definition.calibration.drive_inverted);
        drive.reset_ticks();

        let limit = gains.output_limit;
        let mut steer_pid = Pid::new(0.0, limit);
        steer_pid.p(gains.p, limit).i(gains.i, limit).d(gains.d, limit);

        Ok(Self {
            name: definition.name,
            calibration: definition.calibration,
            constants: *constants,

            drive,
            steer,
            encoder,

            steer_pid,
            heading_setpoint: 0.0,
            last_fault: None,
        })
    }

    pub fn name(&self) -> ModuleName {
        self.name
    }

    pub fn calibration(&self) -> &ModuleCalibration {
        &self.calibration
    }

    /// The heading the steer loop is currently holding
    pub fn heading_setpoint(&self) -> f32 {
        self.heading_setpoint
    }

    /// The fault from the most recent tick, if that tick failed safe
    pub fn last_fault(&self) -> Option<ModuleError> {
        self.last_fault
    }

    fn sensor_fault(&self, fault: SensorFault) -> ModuleError {
        ModuleError::Sensor {
            module: self.name,
            fault,
        }
    }

    /// Calibrated wheel heading from the absolute encoder
    pub fn current_heading(&mut self) -> Result<f32, ModuleError> {
        let raw = match self.encoder.absolute_angle() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("{} absolute encoder error: {:?}", self.name, e);
                return Err(self.sensor_fault(SensorFault::Device));
            }
        };
        normalize(
            raw,
            self.calibration.encoder_offset,
            self.calibration.encoder_reversed,
        )
        .map_err(|fault| self.sensor_fault(fault))
    }

    /// Wheel surface speed from the drive encoder, m/s
    pub fn current_velocity(&mut self) -> Result<f32, ModuleError> {
        let rate = match self.drive.tick_rate() {
            Ok(rate) => rate,
            Err(e) => {
                warn!("{} drive encoder error: {:?}", self.name, e);
                return Err(self.sensor_fault(SensorFault::Device));
            }
        };
        if !rate.is_finite() {
            return Err(self.sensor_fault(SensorFault::NotFinite));
        }
        let velocity = self.constants.tick_rate_to_velocity(rate);
        if libm::fabsf(velocity) > self.constants.max_velocity * PLAUSIBLE_SPEED_FACTOR {
            return Err(self.sensor_fault(SensorFault::Implausible { value: velocity }));
        }
        Ok(velocity)
    }

    /// Measured speed and heading
    pub fn state(&mut self) -> Result<WheelState, ModuleError> {
        Ok(WheelState::new(self.current_velocity()?, self.current_heading()?))
    }

    /// Distance driven since the last reset and current heading
    pub fn position(&mut self) -> Result<ModulePosition, ModuleError> {
        let ticks = match self.drive.tick_count() {
            Ok(ticks) => ticks,
            Err(e) => {
                warn!("{} drive encoder error: {:?}", self.name, e);
                return Err(self.sensor_fault(SensorFault::Device));
            }
        };
        Ok(ModulePosition {
            distance: self.constants.ticks_to_distance(ticks),
            heading: self.current_heading()?,
        })
    }

    pub fn reset_encoders(&mut self) {
        self.drive.reset_ticks();
    }

    /// Follow `desired` for one tick
    ///
    /// - Zero speed, or speed below the deadband, stops the module without moving the
    ///   heading setpoint
    /// - Otherwise the state is [`optimize`]d against the measured heading, the drive motor
    ///   gets `speed / max_velocity` and the steer motor gets the PID output on the
    ///   circular heading error
    ///
    /// On any error the module has already been stopped; no NaN reaches an actuator.
    pub fn set_desired_state(&mut self, desired: WheelState) -> Result<ModuleCommand, ModuleError> {
        let result = self.follow(desired);
        self.last_fault = result.err();
        if let Err(e) = result {
            warn!("{}, stopping", e);
            self.stop();
        }
        result
    }

    fn follow(&mut self, desired: WheelState) -> Result<ModuleCommand, ModuleError> {
        if !desired.speed.is_finite() || !desired.heading.is_finite() {
            return Err(ModuleError::InvalidCommand { module: self.name });
        }

        if desired.speed == 0.0 || libm::fabsf(desired.speed) < self.constants.deadband {
            self.stop();
            return Ok(ModuleCommand::Idle);
        }

        let current = self.current_heading()?;
        let state = optimize(desired, current);
        self.heading_setpoint = state.heading;

        let drive_effort = (state.speed / self.constants.max_velocity).clamp(-1.0, 1.0);
        let error = shortest_delta(current, state.heading);
        // the pid crate computes setpoint - measurement, so feed it the negated error
        let steer_effort = self.steer_pid.next_control_output(-error).output;

        self.drive.set_effort(drive_effort);
        self.steer.set_effort(steer_effort);
        trace!(
            "{} current {} target {:?} drive {} steer {}",
            self.name,
            current,
            state,
            drive_effort,
            steer_effort
        );

        Ok(ModuleCommand::Driving {
            state,
            drive_effort,
            steer_effort,
        })
    }

    /// Zero both actuators; the heading setpoint is kept
    pub fn stop(&mut self) {
        self.drive.set_effort(0.0);
        self.steer.set_effort(0.0);
        self.steer_pid.reset_integral_term();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::names::ModuleName::FrontLeft;
    use approx::assert_relative_eq;
    use core::f32::consts::TAU;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Everything the fake devices have been told, shared with the test
    #[derive(Debug, Default)]
    pub struct FakeWiring {
        pub drive_effort: Cell<f32>,
        pub steer_effort: Cell<f32>,
        pub drive_inverted: Cell<bool>,
        pub drive_neutral: Cell<Option<NeutralBehavior>>,
        pub steer_neutral: Cell<Option<NeutralBehavior>>,
        pub raw_angle: Cell<f32>,
        pub tick_rate: Cell<f32>,
        pub ticks: Cell<i64>,
        pub encoder_broken: Cell<bool>,
        pub effort_writes: Cell<usize>,
    }

    #[derive(Clone)]
    pub struct FakeDrive(pub Rc<FakeWiring>);
    #[derive(Clone)]
    pub struct FakeSteer(pub Rc<FakeWiring>);
    #[derive(Clone)]
    pub struct FakeEncoder(pub Rc<FakeWiring>);

    impl Motor for FakeDrive {
        fn set_effort(&mut self, effort: f32) {
            self.0.drive_effort.set(effort);
            self.0.effort_writes.set(self.0.effort_writes.get() + 1);
        }
        fn set_neutral_behavior(&mut self, behavior: NeutralBehavior) {
            self.0.drive_neutral.set(Some(behavior));
        }
        fn set_inverted(&mut self, inverted: bool) {
            self.0.drive_inverted.set(inverted);
        }
    }

    impl DriveEncoder for FakeDrive {
        type Error = ();

        fn tick_count(&mut self) -> Result<i64, ()> {
            Ok(self.0.ticks.get())
        }
        fn tick_rate(&mut self) -> Result<f32, ()> {
            Ok(self.0.tick_rate.get())
        }
        fn reset_ticks(&mut self) {
            self.0.ticks.set(0);
        }
    }

    impl Motor for FakeSteer {
        fn set_effort(&mut self, effort: f32) {
            self.0.steer_effort.set(effort);
            self.0.effort_writes.set(self.0.effort_writes.get() + 1);
        }
        fn set_neutral_behavior(&mut self, behavior: NeutralBehavior) {
            self.0.steer_neutral.set(Some(behavior));
        }
        fn set_inverted(&mut self, _inverted: bool) {}
    }

    impl AbsoluteEncoder for FakeEncoder {
        type Error = &'static str;

        fn absolute_angle(&mut self) -> Result<f32, &'static str> {
            if self.0.encoder_broken.get() {
                Err("no response")
            } else {
                Ok(self.0.raw_angle.get())
            }
        }
    }

    pub type FakeModule = SwerveModule<FakeDrive, FakeSteer, FakeEncoder>;

    pub fn fake_module_named(
        name: ModuleName,
        calibration: ModuleCalibration,
    ) -> (FakeModule, Rc<FakeWiring>) {
        let wiring = Rc::new(FakeWiring::default());
        let module = SwerveModule::new(
            &ModuleDefinition { name, calibration },
            &DriveConstants::default(),
            &SteerGains {
                p: 0.5,
                i: 0.0,
                d: 0.0,
                output_limit: 1.0,
            },
            FakeDrive(wiring.clone()),
            FakeSteer(wiring.clone()),
            FakeEncoder(wiring.clone()),
        )
        .expect("Failed to create module for test");
        (module, wiring)
    }

    fn fake_module(offset: f32) -> (FakeModule, Rc<FakeWiring>) {
        fake_module_named(
            FrontLeft,
            ModuleCalibration {
                encoder_offset: offset,
                ..Default::default()
            },
        )
    }

    fn samples(n: usize) -> impl Iterator<Item = f32> {
        (0..n).map(move |i| i as f32 * TAU / n as f32)
    }

    #[test]
    fn construction_configures_hardware() {
        let (_module, wiring) = fake_module_named(
            FrontLeft,
            ModuleCalibration {
                encoder_offset: 0.0,
                encoder_reversed: false,
                drive_inverted: true,
            },
        );
        assert!(wiring.drive_inverted.get());
        assert_eq!(wiring.drive_neutral.get(), Some(NeutralBehavior::Brake));
        assert_eq!(wiring.steer_neutral.get(), Some(NeutralBehavior::Brake));
    }

    #[test]
    fn bad_offset_fails_construction() {
        let wiring = Rc::new(FakeWiring::default());
        let result = SwerveModule::new(
            &ModuleDefinition {
                name: FrontLeft,
                calibration: ModuleCalibration {
                    encoder_offset: 7.0,
                    ..Default::default()
                },
            },
            &DriveConstants::default(),
            &SteerGains::default(),
            FakeDrive(wiring.clone()),
            FakeSteer(wiring.clone()),
            FakeEncoder(wiring),
        );
        assert!(matches!(
            result,
            Err(ConfigurationError::EncoderOffsetOutOfRange {
                module: FrontLeft,
                ..
            })
        ));
    }

    #[test]
    fn optimize_bound() {
        for desired in samples(73) {
            for current in samples(67) {
                let optimized = optimize(WheelState::new(1.0, desired), current);
                let delta = shortest_delta(current, optimized.heading);
                assert!(
                    libm::fabsf(delta) <= FRAC_PI_2 + OPTIMIZE_TIE_TOLERANCE + 1e-5,
                    "desired {desired} current {current} chose {optimized:?}"
                );
                assert!((0.0..TAU).contains(&optimized.heading));
            }
        }
    }

    #[test]
    fn optimize_prefers_direct_heading_when_close() {
        for desired in samples(73) {
            for current in samples(67) {
                if libm::fabsf(shortest_delta(current, desired)) <= FRAC_PI_2 {
                    let optimized = optimize(WheelState::new(1.5, desired), current);
                    assert_eq!(optimized, WheelState::new(1.5, desired));
                }
            }
        }
    }

    #[test]
    fn optimize_flips_when_far() {
        let optimized = optimize(WheelState::new(2.0, PI), 0.1);
        assert_relative_eq!(optimized.speed, -2.0);
        assert_relative_eq!(optimized.heading, 0.0, epsilon = 1e-6);

        let optimized = optimize(WheelState::new(-1.0, 0.2), 3.0);
        assert_relative_eq!(optimized.speed, 1.0);
        assert_relative_eq!(optimized.heading, 0.2 + PI, epsilon = 1e-6);
    }

    #[test]
    fn optimize_tie_keeps_direct_heading() {
        // exactly π/2 either way around
        assert_eq!(
            optimize(WheelState::new(2.0, 0.0), 3.0 * FRAC_PI_2),
            WheelState::new(2.0, 0.0)
        );
        assert_eq!(
            optimize(WheelState::new(2.0, 0.0), FRAC_PI_2),
            WheelState::new(2.0, 0.0)
        );
        assert_eq!(
            optimize(WheelState::new(-0.5, PI), FRAC_PI_2),
            WheelState::new(-0.5, PI)
        );
    }

    #[test]
    fn calibrated_module_scenario() {
        let (mut module, wiring) = fake_module(FRAC_PI_2);
        wiring.raw_angle.set(0.0);
        assert_relative_eq!(module.current_heading().unwrap(), 3.0 * FRAC_PI_2, epsilon = 1e-6);

        // direct and flipped are both π/2 away; the direct state is kept
        let command = module.set_desired_state(WheelState::new(2.0, 0.0)).unwrap();
        match command {
            ModuleCommand::Driving {
                state,
                drive_effort,
                ..
            } => {
                assert_eq!(state, WheelState::new(2.0, 0.0));
                assert_relative_eq!(drive_effort, 2.0 / DriveConstants::default().max_velocity);
            }
            ModuleCommand::Idle => panic!("module should be driving"),
        }
        assert_eq!(module.heading_setpoint(), 0.0);
    }

    #[test]
    fn deadband_stops_without_moving_setpoint() {
        let (mut module, wiring) = fake_module(0.0);
        wiring.raw_angle.set(0.3);
        module.set_desired_state(WheelState::new(1.0, 0.5)).unwrap();
        let setpoint = module.heading_setpoint();
        assert_relative_eq!(setpoint, 0.5);

        let command = module.set_desired_state(WheelState::new(0.0005, 1.2)).unwrap();
        assert_eq!(command, ModuleCommand::Idle);
        assert_eq!(wiring.drive_effort.get(), 0.0);
        assert_eq!(wiring.steer_effort.get(), 0.0);
        assert_eq!(module.heading_setpoint(), setpoint);

        module.set_desired_state(WheelState::new(0.0, 2.0)).unwrap();
        assert_eq!(module.heading_setpoint(), setpoint);
        module.set_desired_state(WheelState::new(-0.0009, 2.0)).unwrap();
        assert_eq!(module.heading_setpoint(), setpoint);
    }

    #[test]
    fn zero_speed_idles_without_deadband() {
        let wiring = Rc::new(FakeWiring::default());
        let mut module = SwerveModule::new(
            &ModuleDefinition {
                name: FrontLeft,
                calibration: ModuleCalibration::default(),
            },
            &DriveConstants {
                deadband: 0.0,
                ..Default::default()
            },
            &SteerGains::default(),
            FakeDrive(wiring.clone()),
            FakeSteer(wiring.clone()),
            FakeEncoder(wiring.clone()),
        )
        .unwrap();
        wiring.raw_angle.set(0.3);

        for speed in [0.0, -0.0] {
            let command = module.set_desired_state(WheelState::new(speed, 2.0)).unwrap();
            assert_eq!(command, ModuleCommand::Idle);
            assert_eq!(module.heading_setpoint(), 0.0);
            assert_eq!(wiring.drive_effort.get(), 0.0);
            assert_eq!(wiring.steer_effort.get(), 0.0);
        }

        // any non-zero speed drives
        let command = module.set_desired_state(WheelState::new(1e-6, 0.5)).unwrap();
        assert!(matches!(command, ModuleCommand::Driving { .. }));
        assert_relative_eq!(module.heading_setpoint(), 0.5);
    }

    #[test]
    fn drive_effort_is_clamped() {
        let (mut module, wiring) = fake_module(0.0);
        wiring.raw_angle.set(0.0);
        module.set_desired_state(WheelState::new(100.0, 0.0)).unwrap();
        assert_eq!(wiring.drive_effort.get(), 1.0);
    }

    #[test]
    fn steer_error_wraps_around_zero() {
        let (mut module, wiring) = fake_module(0.0);
        wiring.raw_angle.set(0.1);
        module.set_desired_state(WheelState::new(1.0, 6.2)).unwrap();
        // the short way from 0.1 to 6.2 is clockwise, so steer effort is negative and small
        let effort = wiring.steer_effort.get();
        let expected = 0.5 * shortest_delta(0.1, 6.2);
        assert_relative_eq!(effort, expected, epsilon = 1e-5);
        assert!(effort < 0.0);
        assert_relative_eq!(wiring.drive_effort.get(), 1.0 / DriveConstants::default().max_velocity);
    }

    #[test]
    fn velocity_uses_mechanical_constants() {
        let (mut module, wiring) = fake_module(0.0);
        let constants = DriveConstants::default();
        wiring.tick_rate.set(1000.0);
        assert_relative_eq!(
            module.current_velocity().unwrap(),
            1000.0 * constants.ticks_to_revolutions()
                * constants.gear_reduction
                * constants.wheel_circumference(),
            epsilon = 1e-6
        );

        wiring.ticks.set(4096);
        wiring.raw_angle.set(1.0);
        let position = module.position().unwrap();
        assert_relative_eq!(position.distance, 2.0 * constants.gear_reduction * constants.wheel_circumference(), epsilon = 1e-6);
        assert_relative_eq!(position.heading, 1.0);

        module.reset_encoders();
        assert_eq!(module.position().unwrap().distance, 0.0);
    }

    #[test]
    fn bad_drive_rate_is_a_fault() {
        let (mut module, wiring) = fake_module(0.0);
        wiring.tick_rate.set(f32::NAN);
        assert!(matches!(
            module.current_velocity(),
            Err(ModuleError::Sensor {
                fault: SensorFault::NotFinite,
                ..
            })
        ));
        wiring.tick_rate.set(1e9);
        assert!(matches!(
            module.current_velocity(),
            Err(ModuleError::Sensor {
                fault: SensorFault::Implausible { .. },
                ..
            })
        ));
    }

    #[test]
    fn sensor_faults_fail_safe() {
        let (mut module, wiring) = fake_module(0.0);
        wiring.raw_angle.set(1.0);
        module.set_desired_state(WheelState::new(1.0, 1.0)).unwrap();
        assert!(wiring.drive_effort.get() != 0.0);

        for bad in [f32::NAN, 9.0, -1.0] {
            module.set_desired_state(WheelState::new(1.0, 1.0)).unwrap();
            wiring.raw_angle.set(bad);
            let result = module.set_desired_state(WheelState::new(1.0, 2.0));
            assert!(
                matches!(result, Err(ModuleError::Sensor { module: FrontLeft, .. })),
                "{bad} gave {result:?}"
            );
            assert_eq!(module.last_fault(), result.err());
            assert_eq!(wiring.drive_effort.get(), 0.0);
            assert_eq!(wiring.steer_effort.get(), 0.0);
            wiring.raw_angle.set(1.0);
        }

        wiring.encoder_broken.set(true);
        assert!(matches!(
            module.set_desired_state(WheelState::new(1.0, 2.0)),
            Err(ModuleError::Sensor {
                fault: SensorFault::Device,
                ..
            })
        ));
        assert_eq!(wiring.drive_effort.get(), 0.0);

        wiring.encoder_broken.set(false);
        assert!(module.set_desired_state(WheelState::new(1.0, 2.0)).is_ok());
        assert_eq!(module.last_fault(), None);
    }

    #[test]
    fn non_finite_command_stops() {
        let (mut module, wiring) = fake_module(0.0);
        wiring.raw_angle.set(1.0);
        module.set_desired_state(WheelState::new(1.0, 1.0)).unwrap();
        let result = module.set_desired_state(WheelState::new(f32::NAN, 1.0));
        assert_eq!(result, Err(ModuleError::InvalidCommand { module: FrontLeft }));
        assert_eq!(wiring.drive_effort.get(), 0.0);
        assert_eq!(wiring.steer_effort.get(), 0.0);
        assert!(module
            .set_desired_state(WheelState::new(1.0, f32::INFINITY))
            .is_err());
    }

    #[test]
    fn stop_keeps_setpoint() {
        let (mut module, wiring) = fake_module(0.0);
        wiring.raw_angle.set(0.2);
        module.set_desired_state(WheelState::new(1.0, 0.4)).unwrap();
        module.stop();
        assert_eq!(wiring.drive_effort.get(), 0.0);
        assert_eq!(wiring.steer_effort.get(), 0.0);
        assert_relative_eq!(module.heading_setpoint(), 0.4);
    }
}

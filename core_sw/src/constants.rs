//! Physical constants of the competition drivetrain
//!
//! These seed [`crate::robot_definition::RobotDefinition::default`]; code should read them from
//! the loaded definition rather than from here.

use core::f32::consts::PI;

/// Free speed of a Falcon 500 at 12V, rpm
///
/// Full drive effort is 12V; if that changes, this value should be modified
pub const FALCON_FREE_RPM: f32 = 6380.0;

/// Counts per revolution of the Falcon integrated sensor
pub const FALCON_TICKS_PER_REVOLUTION: f32 = 2048.0;
/// The Falcon integrated sensor reports velocity in ticks per 100ms
pub const FALCON_VELOCITY_WINDOW_S: f32 = 0.1;

/// SDS MK4 L2: (14 / 50) * (27 / 17) * (15 / 45)
pub const MK4_L2_DRIVE_REDUCTION: f32 = (14.0 / 50.0) * (27.0 / 17.0) * (15.0 / 45.0);
/// SDS MK4 wheel diameter, m
pub const MK4_WHEEL_DIAMETER_M: f32 = 0.10033;

/// `[Motor free speed RPM] / 60 * [Drive reduction] * [Wheel diameter meters] * pi`
pub const MAX_VELOCITY_M_PER_S: f32 =
    FALCON_FREE_RPM / 60.0 * MK4_L2_DRIVE_REDUCTION * MK4_WHEEL_DIAMETER_M * PI;

/// Left-to-right distance between wheel centers, m
pub const TRACK_WIDTH_M: f32 = 1.0;
/// Front-to-back distance between wheel centers, m
pub const WHEEL_BASE_M: f32 = 1.0;

/// Commanded wheel speeds below this are treated as a stop, m/s
pub const DRIVE_DEADBAND_M_PER_S: f32 = 0.001;

pub const STEER_P: f32 = 0.5;
pub const STEER_D: f32 = 0.01;

/// Relative target positions within this distance on an axis count as aligned, m
pub const SHOT_ALIGNMENT_TOLERANCE_M: f32 = 0.2;

/// Default period of the control loop
pub const CONTROL_PERIOD_MS: u64 = 20;

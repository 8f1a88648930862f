//! Functionality that robot hosts must provide
//!
//! Every call here is a synchronous register or bus access with bounded latency. Calls that
//! write to a device are idempotent.

use crate::geometry::{ChassisVelocity, FieldFrame, Pose};
use core::fmt::Debug;
use serde::{Deserialize, Serialize};

/// What a motor does when commanded zero effort
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeutralBehavior {
    Brake,
    Coast,
}

/// A motor controller driven by a normalized effort
pub trait Motor {
    /// Set output; `-1.0 <= effort <= 1.0`
    fn set_effort(&mut self, effort: f32);

    fn set_neutral_behavior(&mut self, behavior: NeutralBehavior);

    /// If inverted, positive effort turns the motor the other way
    fn set_inverted(&mut self, inverted: bool);
}

/// The incremental sensor on a drive motor
pub trait DriveEncoder {
    type Error: Debug;

    /// Accumulated ticks since the last [`DriveEncoder::reset_ticks`]
    fn tick_count(&mut self) -> Result<i64, Self::Error>;

    /// Ticks per velocity measurement window, signed
    fn tick_rate(&mut self) -> Result<f32, Self::Error>;

    fn reset_ticks(&mut self);
}

/// An absolute encoder on the steering axis
pub trait AbsoluteEncoder {
    type Error: Debug;

    /// Raw angle in rad, `0 <= angle < 2π` for a healthy sensor
    fn absolute_angle(&mut self) -> Result<f32, Self::Error>;
}

/// Source of the robot's field-relative state, typically odometry
pub trait PoseProvider {
    fn current_pose(&self) -> Pose;

    fn current_chassis_velocity(&self) -> ChassisVelocity<FieldFrame>;
}

/// Measures distance to the shooting target, typically vision
pub trait RangeProvider {
    /// Distance in m, or None if no measurement is available
    fn distance_to_target(&self) -> Option<f32>;
}

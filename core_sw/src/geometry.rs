//! Poses and frame-tagged chassis velocities
//!
//! A [`ChassisVelocity`] carries its reference frame in its type. Converting between
//! [`RobotFrame`] and [`FieldFrame`] requires the robot's heading, so a field-relative
//! command can never be handed to code expecting a robot-relative one.

use core::marker::PhantomData;
use nalgebra::{Isometry2, UnitComplex, Vector2};

/// Field-relative or target-relative pose; x forwards, y left, rotation counterclockwise
pub type Pose = Isometry2<f32>;

/// Velocities expressed relative to the robot: x forwards, y left
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RobotFrame;

/// Velocities expressed relative to the field
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FieldFrame;

/// Whole-platform velocity in frame `F`
///
/// - vx, vy: m/s
/// - omega: rad/s, counterclockwise positive; identical in both frames
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ChassisVelocity<F> {
    pub vx: f32,
    pub vy: f32,
    pub omega: f32,
    frame: PhantomData<F>,
}

impl<F> ChassisVelocity<F> {
    pub const fn new(vx: f32, vy: f32, omega: f32) -> Self {
        Self {
            vx,
            vy,
            omega,
            frame: PhantomData,
        }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn translation(&self) -> Vector2<f32> {
        Vector2::new(self.vx, self.vy)
    }

    pub fn is_finite(&self) -> bool {
        self.vx.is_finite() && self.vy.is_finite() && self.omega.is_finite()
    }
}

impl ChassisVelocity<FieldFrame> {
    /// Express this velocity relative to a robot whose field heading is `heading`
    pub fn to_robot_relative(&self, heading: UnitComplex<f32>) -> ChassisVelocity<RobotFrame> {
        let v = heading.inverse() * self.translation();
        ChassisVelocity::new(v.x, v.y, self.omega)
    }
}

impl ChassisVelocity<RobotFrame> {
    /// Express this velocity relative to the field, given the robot's field heading
    pub fn to_field_relative(&self, heading: UnitComplex<f32>) -> ChassisVelocity<FieldFrame> {
        let v = heading * self.translation();
        ChassisVelocity::new(v.x, v.y, self.omega)
    }
}

/// Build a pose from its parts; `heading` in rad
pub fn pose(x: f32, y: f32, heading: f32) -> Pose {
    Isometry2::new(Vector2::new(x, y), heading)
}

/// `target` expressed in the frame of `reference`
pub fn relative_to(target: &Pose, reference: &Pose) -> Pose {
    reference.inv_mul(target)
}

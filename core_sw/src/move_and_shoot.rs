//! Shot compensation for a robot that shoots while moving

use crate::error::ShotHazard;
use crate::geometry::{relative_to, ChassisVelocity, FieldFrame, Pose};
use crate::hardware::{PoseProvider, RangeProvider};
use crate::robot_definition::ShootSettings;
use log::trace;
use nalgebra::Vector2;

/// Both shot corrections for one tick, from one derivation
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ShotCompensation {
    pub shooter_speed_scale: f32,
    pub aim_angle_offset_degrees: f32,
    /// Set when an input forced an output to neutral
    pub hazard: Option<ShotHazard>,
}

impl ShotCompensation {
    /// Never negative
    pub fn calculate_shooter_speed(&self) -> f32 {
        self.shooter_speed_scale
    }

    pub fn calculate_angle_offset_degrees(&self) -> f32 {
        self.aim_angle_offset_degrees
    }
}

pub struct MoveAndShootController {
    /// Field-relative reference pose of the target
    origin: Pose,
    alignment_tolerance: f32,
    compensation_gain: f32,
}

impl MoveAndShootController {
    pub fn new(settings: &ShootSettings) -> Self {
        Self {
            origin: settings.target.to_pose(),
            alignment_tolerance: settings.alignment_tolerance,
            compensation_gain: settings.compensation_gain,
        }
    }

    pub fn origin(&self) -> &Pose {
        &self.origin
    }

    /// Compute this tick's shooter speed scale and aim offset
    ///
    /// Chassis velocity is only read if at least one output is not gated, and range only if
    /// the aim offset is needed
    pub fn solve(&self, pose: &dyn PoseProvider, range: &dyn RangeProvider) -> ShotCompensation {
        let robot = pose.current_pose();
        let relative = relative_to(&self.origin, &robot).translation.vector;

        let speed_gated = libm::fabsf(relative.x) <= self.alignment_tolerance;
        let angle_gated = libm::fabsf(relative.y) <= self.alignment_tolerance;
        if speed_gated && angle_gated {
            return ShotCompensation::default();
        }

        let velocity = pose.current_chassis_velocity();
        if !velocity.is_finite() {
            return ShotCompensation {
                hazard: Some(ShotHazard::InvalidVelocity),
                ..Default::default()
            };
        }
        let line_of_sight = self.origin.translation.vector - robot.translation.vector;
        let Some(direction) = line_of_sight.try_normalize(0.0) else {
            return ShotCompensation::default();
        };
        let across = sideways(&direction, &velocity);
        let lateral = libm::fabsf(across);

        let mut compensation = ShotCompensation::default();
        if !speed_gated {
            compensation.shooter_speed_scale = lateral * self.compensation_gain;
        }
        if !angle_gated {
            match range.distance_to_target() {
                // leads against the sideways motion, and is zero without any
                Some(distance) if distance.is_finite() && distance > 0.0 => {
                    compensation.aim_angle_offset_degrees =
                        -libm::atanf(across / distance).to_degrees();
                }
                _ => compensation.hazard = Some(ShotHazard::InvalidDistance),
            }
        }

        trace!(
            "shot: relative ({}, {}), lateral {lateral}, {compensation:?}",
            relative.x,
            relative.y
        );
        compensation
    }
}

/// Velocity across the unit `direction`, positive when moving to its left
fn sideways(direction: &Vector2<f32>, velocity: &ChassisVelocity<FieldFrame>) -> f32 {
    direction.x * velocity.vy - direction.y * velocity.vx
}

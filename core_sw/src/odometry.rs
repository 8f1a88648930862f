//! Field pose estimation from wheel distances and a gyro

use crate::angle::{shortest_delta, wrap_angle};
use crate::drive_system::DriveSystem;
use crate::geometry::{pose, ChassisVelocity, FieldFrame, Pose};
use crate::hardware::PoseProvider;
use crate::names::NUM_MODULES;
use crate::swerve_module::{ModulePosition, WheelState};
use core::time::Duration;
use log::info;
use nalgebra::{UnitComplex, Vector2};

pub struct SwerveOdometry {
    drive_system: DriveSystem<NUM_MODULES>,
    period_s: f32,

    pose: Pose,
    /// Field heading minus gyro heading, rad
    gyro_offset: f32,
    last_heading: f32,
    last_distances: [f32; NUM_MODULES],
    velocity: ChassisVelocity<FieldFrame>,
}

impl SwerveOdometry {
    /// Start tracking from `initial`; `period` is the expected time between updates
    pub fn new(
        drive_system: DriveSystem<NUM_MODULES>,
        period: Duration,
        initial: Pose,
        gyro_heading: f32,
        positions: &[ModulePosition; NUM_MODULES],
    ) -> Self {
        let mut odometry = Self {
            drive_system,
            period_s: period.as_secs_f32(),
            pose: initial,
            gyro_offset: 0.0,
            last_heading: 0.0,
            last_distances: [0.0; NUM_MODULES],
            velocity: ChassisVelocity::zero(),
        };
        odometry.reset(initial, gyro_heading, positions);
        odometry
    }

    /// Forget history and continue from `pose`
    pub fn reset(
        &mut self,
        pose: Pose,
        gyro_heading: f32,
        positions: &[ModulePosition; NUM_MODULES],
    ) {
        self.pose = pose;
        self.gyro_offset = pose.rotation.angle() - gyro_heading;
        self.last_heading = wrap_angle(pose.rotation.angle());
        self.last_distances = positions.map(|p| p.distance);
        self.velocity = ChassisVelocity::zero();
        info!(
            "Odometry reset to ({}, {}, {})",
            pose.translation.x,
            pose.translation.y,
            pose.rotation.angle()
        );
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Integrate one period of wheel motion
    ///
    /// The robot-relative displacement comes from the change in each wheel's distance along
    /// its current heading, and is rotated into the field by the mean of the previous and
    /// current headings
    pub fn update(&mut self, gyro_heading: f32, positions: &[ModulePosition; NUM_MODULES]) -> Pose {
        let heading = wrap_angle(gyro_heading + self.gyro_offset);
        let rotation = shortest_delta(self.last_heading, heading);

        let mut i = 0;
        let deltas = positions.map(|p| {
            let delta = WheelState::new(p.distance - self.last_distances[i], p.heading);
            i += 1;
            delta
        });
        let displacement = self.drive_system.get_chassis_velocity(&deltas);

        let mean = UnitComplex::new(self.last_heading + rotation / 2.0);
        let field = mean * Vector2::new(displacement.vx, displacement.vy);

        self.pose = pose(
            self.pose.translation.x + field.x,
            self.pose.translation.y + field.y,
            heading,
        );
        if self.period_s > 0.0 {
            self.velocity = ChassisVelocity::new(
                field.x / self.period_s,
                field.y / self.period_s,
                rotation / self.period_s,
            );
        }
        self.last_heading = heading;
        self.last_distances = positions.map(|p| p.distance);
        self.pose
    }
}

impl PoseProvider for SwerveOdometry {
    fn current_pose(&self) -> Pose {
        self.pose
    }

    fn current_chassis_velocity(&self) -> ChassisVelocity<FieldFrame> {
        self.velocity
    }
}

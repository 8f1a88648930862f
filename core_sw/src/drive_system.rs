//! Systems for wheel state calculations
//!
//! Note: lengths are in m and speeds in m/s throughout. Angular velocities are
//! counterclockwise positive, matching [`ChassisVelocity`].

use crate::angle::wrap_angle;
use crate::geometry::{ChassisVelocity, RobotFrame};
use crate::swerve_module::WheelState;
use nalgebra::Vector2;

/// Below this wheel speed a computed heading is meaningless, m/s
const STATIONARY_SPEED: f32 = 1e-6;

#[derive(Copy, Clone, Debug)]
pub enum DriveSystem<const WHEELS: usize> {
    /// A drive system where every wheel is independently driven and steered
    Swerve {
        /// Robot-relative location of each wheel, in m
        module_locations: [Vector2<f32>; WHEELS],
        /// Mean of `module_locations`
        centroid: Vector2<f32>,
        /// Sum of squared distances from `centroid` to each wheel; always positive
        spread: f32,
    },
}

impl<const WHEELS: usize> DriveSystem<WHEELS> {
    /// A drive system where every wheel is independently driven and steered
    ///
    /// # Arguments
    ///
    /// - module_locations: location of each wheel relative to the robot center, in m,
    ///   x forwards and y to the left
    ///
    /// # Returns
    ///
    /// DriveSystem if the configuration is valid, otherwise None; the wheels must be finite
    /// and not all in one place
    pub fn new_swerve(module_locations: [Vector2<f32>; WHEELS]) -> Option<DriveSystem<WHEELS>> {
        if WHEELS < 2 || module_locations.iter().any(|l| !l.x.is_finite() || !l.y.is_finite()) {
            return None;
        }

        let centroid = module_locations
            .iter()
            .fold(Vector2::zeros(), |sum, l| sum + l)
            / WHEELS as f32;
        let spread: f32 = module_locations
            .iter()
            .map(|l| (l - centroid).norm_squared())
            .sum();
        if spread <= f32::EPSILON {
            return None;
        }

        Some(Self::Swerve {
            module_locations,
            centroid,
            spread,
        })
    }

    pub fn module_locations(&self) -> &[Vector2<f32>; WHEELS] {
        match self {
            DriveSystem::Swerve {
                module_locations, ..
            } => module_locations,
        }
    }

    /// Get the state each wheel should follow for the given target
    ///
    /// Headings are canonical; a wheel that should not move gets heading 0 and speed 0
    pub fn get_module_states(&self, target: ChassisVelocity<RobotFrame>) -> [WheelState; WHEELS] {
        match self {
            DriveSystem::Swerve {
                module_locations, ..
            } => module_locations.map(|location| {
                // velocity of this wheel's contact patch: translation plus omega x r
                let vx = target.vx - target.omega * location.y;
                let vy = target.vy + target.omega * location.x;
                let speed = libm::hypotf(vx, vy);
                if speed < STATIONARY_SPEED {
                    WheelState::new(0.0, 0.0)
                } else {
                    WheelState::new(speed, wrap_angle(libm::atan2f(vy, vx)))
                }
            }),
        }
    }

    /// Given measured wheel states, find the robot-relative velocity of the robot
    ///
    /// This is the least-squares fit, exact when the wheels agree with a rigid motion
    pub fn get_chassis_velocity(&self, states: &[WheelState; WHEELS]) -> ChassisVelocity<RobotFrame> {
        match self {
            DriveSystem::Swerve {
                module_locations,
                centroid,
                spread,
            } => {
                let velocities = states.map(|s| {
                    Vector2::new(
                        s.speed * libm::cosf(s.heading),
                        s.speed * libm::sinf(s.heading),
                    )
                });
                let mean = velocities.iter().fold(Vector2::zeros(), |sum, v| sum + v)
                    / WHEELS as f32;

                // omega from the cross product of each wheel's offset from the centroid with its velocity
                let omega = module_locations
                    .iter()
                    .zip(velocities.iter())
                    .map(|(location, v)| {
                        let r = location - centroid;
                        r.x * v.y - r.y * v.x
                    })
                    .sum::<f32>()
                    / spread;

                // the centroid moves at the mean velocity; move that back to the robot center
                let vx = mean.x + omega * centroid.y;
                let vy = mean.y - omega * centroid.x;
                ChassisVelocity::new(vx, vy, omega)
            }
        }
    }

    /// Scale every wheel speed down by the same factor so none exceeds `max_speed`
    ///
    /// Preserves the ratios between wheels, so the chassis still moves in the commanded
    /// direction, only slower
    pub fn desaturate(states: &mut [WheelState; WHEELS], max_speed: f32) {
        let fastest = states
            .iter()
            .map(|s| libm::fabsf(s.speed))
            .fold(0.0, f32::max);
        if fastest > max_speed && max_speed > 0.0 {
            let scale = max_speed / fastest;
            for state in states.iter_mut() {
                state.speed *= scale;
            }
        }
    }
}

//! Swerve module control and move-and-shoot compensation shared by every host
//!
//! Hosts (sim_sw, robot firmware) enable feature std where available

#![cfg_attr(not(feature = "std"), no_std)]

pub mod angle;
pub mod constants;
pub mod drive_system;
pub mod error;
pub mod geometry;
pub mod hardware;
pub mod move_and_shoot;
pub mod names;
pub mod odometry;
pub mod robot_definition;
pub mod routine;
pub mod swerve_drive;
pub mod swerve_module;

pub use nalgebra;

//! See [`ModuleName`], a unique identifier for each swerve module position

use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use ModuleName::*;

/// The number of unique [`ModuleName`]s
pub const NUM_MODULES: usize = 4;

/// Identifies one corner of the drivetrain
///
/// usize values are consecutive such that an array like `[(); NUM_MODULES]`
/// can be indexed like `arr[module_name as usize]`; kinematics, configuration and
/// telemetry arrays all use this order
#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ModuleName {
    FrontLeft = 0,
    FrontRight = 1,
    BackLeft = 2,
    BackRight = 3,
}

impl TryFrom<usize> for ModuleName {
    type Error = usize;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FrontLeft),
            1 => Ok(FrontRight),
            2 => Ok(BackLeft),
            3 => Ok(BackRight),
            _ => Err(value),
        }
    }
}

impl Display for ModuleName {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            FrontLeft => write!(f, "FrontLeft"),
            FrontRight => write!(f, "FrontRight"),
            BackLeft => write!(f, "BackLeft"),
            BackRight => write!(f, "BackRight"),
        }
    }
}

impl ModuleName {
    /// All module names in order
    pub fn get_all() -> [ModuleName; NUM_MODULES] {
        [FrontLeft, FrontRight, BackLeft, BackRight]
    }

    /// Whether this module sits on the front half of the robot
    pub fn is_front(&self) -> bool {
        matches!(self, FrontLeft | FrontRight)
    }

    /// Whether this module sits on the left half of the robot
    pub fn is_left(&self) -> bool {
        matches!(self, FrontLeft | BackLeft)
    }

    /// Location of the wheel's contact patch relative to the robot center, in m
    ///
    /// x is forwards, y is to the left
    pub fn location(&self, track_width: f32, wheel_base: f32) -> [f32; 2] {
        let x = if self.is_front() { wheel_base } else { -wheel_base };
        let y = if self.is_left() { track_width } else { -track_width };
        [x / 2.0, y / 2.0]
    }
}

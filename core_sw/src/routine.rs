//! Routines that run on the control loop, and the runner that owns their lifecycle

use crate::geometry::{ChassisVelocity, FieldFrame, RobotFrame};
use crate::hardware::{PoseProvider, RangeProvider};
use crate::move_and_shoot::{MoveAndShootController, ShotCompensation};
use crate::swerve_drive::{ChassisDrive, DriveReport};
use log::info;
use serde::{Deserialize, Serialize};

/// Whether the shooter wants compensation this tick
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShooterMode {
    #[default]
    Off,
    Armed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoutineStatus {
    Continue,
    Done,
}

/// Everything a routine may read or command during one tick
pub struct TickContext<'a> {
    pub drive: &'a mut dyn ChassisDrive,
    pub pose: &'a dyn PoseProvider,
    pub range: &'a dyn RangeProvider,
    /// Field-relative command from the driver
    pub driver_command: ChassisVelocity<FieldFrame>,
    pub shooter_mode: ShooterMode,

    /// Written by the routine: shot corrections for the shooter, if it is armed
    pub shot: Option<ShotCompensation>,
    /// Written by the routine: result of the last chassis command
    pub report: Option<DriveReport>,
}

impl<'a> TickContext<'a> {
    pub fn new(
        drive: &'a mut dyn ChassisDrive,
        pose: &'a dyn PoseProvider,
        range: &'a dyn RangeProvider,
    ) -> Self {
        Self {
            drive,
            pose,
            range,
            driver_command: ChassisVelocity::zero(),
            shooter_mode: ShooterMode::Off,
            shot: None,
            report: None,
        }
    }
}

pub trait Routine {
    fn name(&self) -> &'static str;

    fn start(&mut self, ctx: &mut TickContext<'_>);

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> RoutineStatus;

    /// Must leave the drive stopped
    fn stop(&mut self, ctx: &mut TickContext<'_>, interrupted: bool);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoutineState {
    Idle,
    Running,
    Finished,
}

/// Drives one [`Routine`] through `start`, `tick` and `stop`
pub struct RoutineRunner<R> {
    routine: R,
    state: RoutineState,
}

impl<R: Routine> RoutineRunner<R> {
    pub fn new(routine: R) -> Self {
        Self {
            routine,
            state: RoutineState::Idle,
        }
    }

    pub fn state(&self) -> RoutineState {
        self.state
    }

    pub fn routine(&self) -> &R {
        &self.routine
    }

    /// Run one tick, starting the routine first if it has not started
    pub fn step(&mut self, ctx: &mut TickContext<'_>) -> RoutineState {
        match self.state {
            RoutineState::Finished => return self.state,
            RoutineState::Idle => {
                info!("Starting {}", self.routine.name());
                self.routine.start(ctx);
                self.state = RoutineState::Running;
            }
            RoutineState::Running => {}
        }

        if self.routine.tick(ctx) == RoutineStatus::Done {
            self.routine.stop(ctx, false);
            self.state = RoutineState::Finished;
            info!("{} finished", self.routine.name());
        }
        self.state
    }

    /// Stop the routine early, leaving every module stopped
    pub fn interrupt(&mut self, ctx: &mut TickContext<'_>) {
        if self.state == RoutineState::Running {
            self.routine.stop(ctx, true);
            info!("{} interrupted", self.routine.name());
        }
        ctx.drive.stop();
        ctx.shot = None;
        self.state = RoutineState::Finished;
    }

    /// Allow the routine to run again from `start`
    pub fn reset(&mut self) {
        self.state = RoutineState::Idle;
    }
}

/// Field-relative driving from the driver's command, with shot compensation while armed
pub struct DriveAndAim {
    shot: MoveAndShootController,
}

impl DriveAndAim {
    pub fn new(shot: MoveAndShootController) -> Self {
        Self { shot }
    }
}

impl Routine for DriveAndAim {
    fn name(&self) -> &'static str {
        "DriveAndAim"
    }

    fn start(&mut self, ctx: &mut TickContext<'_>) {
        ctx.shot = None;
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> RoutineStatus {
        let heading = ctx.pose.current_pose().rotation;
        let target = ctx.driver_command.to_robot_relative(heading);
        ctx.report = Some(ctx.drive.drive(target));

        ctx.shot = match ctx.shooter_mode {
            ShooterMode::Armed => Some(self.shot.solve(ctx.pose, ctx.range)),
            ShooterMode::Off => None,
        };
        RoutineStatus::Continue
    }

    fn stop(&mut self, ctx: &mut TickContext<'_>, _interrupted: bool) {
        ctx.drive.stop();
        ctx.shot = None;
    }
}

/// Drive at a fixed robot-relative velocity for a number of ticks
pub struct TimedDrive {
    velocity: ChassisVelocity<RobotFrame>,
    ticks: u32,
    elapsed: u32,
}

impl TimedDrive {
    pub fn new(velocity: ChassisVelocity<RobotFrame>, ticks: u32) -> Self {
        Self {
            velocity,
            ticks,
            elapsed: 0,
        }
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }
}

impl Routine for TimedDrive {
    fn name(&self) -> &'static str {
        "TimedDrive"
    }

    fn start(&mut self, _ctx: &mut TickContext<'_>) {
        self.elapsed = 0;
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> RoutineStatus {
        if self.elapsed >= self.ticks {
            return RoutineStatus::Done;
        }
        ctx.report = Some(ctx.drive.drive(self.velocity));
        self.elapsed += 1;
        if self.elapsed >= self.ticks {
            RoutineStatus::Done
        } else {
            RoutineStatus::Continue
        }
    }

    fn stop(&mut self, ctx: &mut TickContext<'_>, _interrupted: bool) {
        ctx.drive.stop();
    }
}

use crate::driving::{SimAbsoluteEncoder, SimDriveMotor, SimSteerMotor};
use crate::physics::SimWorld;
use crate::settings::SimSettings;
use anyhow::anyhow;
use core_sw::geometry::{ChassisVelocity, FieldFrame};
use core_sw::hardware::PoseProvider;
use core_sw::move_and_shoot::{MoveAndShootController, ShotCompensation};
use core_sw::names::NUM_MODULES;
use core_sw::odometry::SwerveOdometry;
use core_sw::routine::{DriveAndAim, RoutineRunner, ShooterMode, TickContext};
use core_sw::swerve_drive::SwerveDrive;
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// How often to log the robot's state, in ticks
const STATUS_INTERVAL: u64 = 50;

pub type SimDrive = SwerveDrive<SimDriveMotor, SimSteerMotor, SimAbsoluteEncoder>;

/// The control loop running against the simulated world
pub struct Simulation {
    pub world: SimWorld,
    pub drive: SimDrive,
    pub odometry: SwerveOdometry,
    runner: RoutineRunner<DriveAndAim>,

    period: Duration,
    pub driver_command: ChassisVelocity<FieldFrame>,
    pub shooter_mode: ShooterMode,

    last_shot: Option<ShotCompensation>,
    ticks: u64,
}

impl Simulation {
    /// Build the world and the robot's controllers; settings are validated first
    pub fn new(settings: &SimSettings) -> anyhow::Result<Self> {
        settings.validate()?;
        let robot = &settings.robot;

        let world = SimWorld::new(settings)?;
        let mut drive = SwerveDrive::new(robot, world.hardware())?;
        let positions = drive.module_positions()?;
        let odometry = SwerveOdometry::new(
            robot.drive_system()?,
            robot.control_period(),
            settings.start.to_pose(),
            world.gyro(),
            &positions,
        );
        if let Some(index) = settings.faulty_encoder {
            warn!("Simulating a failed absolute encoder on module {index}");
            world
                .set_encoder_fault(index, true)
                .map_err(|e| anyhow!("Failed to inject encoder fault: {e:?}"))?;
        }
        let runner = RoutineRunner::new(DriveAndAim::new(MoveAndShootController::new(
            &robot.shoot,
        )));

        Ok(Self {
            world,
            drive,
            odometry,
            runner,
            period: robot.control_period(),
            driver_command: settings.driver_command(),
            shooter_mode: settings.shooter_mode,
            last_shot: None,
            ticks: 0,
        })
    }

    /// Advance physics by one period, then run one control tick
    pub fn tick(&mut self) -> anyhow::Result<()> {
        self.world
            .step(self.period.as_secs_f32())
            .map_err(|e| anyhow!("Physics step failed: {e:?}"))?;

        match self.drive.module_positions() {
            Ok(positions) => {
                self.odometry.update(self.world.gyro(), &positions);
            }
            Err(e) => warn!("Skipping odometry update: {e}"),
        }

        let range = self.world.range_finder();
        let mut ctx = TickContext::new(&mut self.drive, &self.odometry, &range);
        ctx.driver_command = self.driver_command;
        ctx.shooter_mode = self.shooter_mode;
        self.runner.step(&mut ctx);
        self.last_shot = ctx.shot;

        self.ticks += 1;
        if self.ticks % STATUS_INTERVAL == 0 {
            let pose = self.odometry.current_pose();
            info!(
                "tick {}: odometry ({:.2}, {:.2}, {:.2}), shot {:?}",
                self.ticks,
                pose.translation.x,
                pose.translation.y,
                pose.rotation.angle(),
                self.last_shot
            );
        } else {
            debug!("tick {}: shot {:?}", self.ticks, self.last_shot);
        }
        Ok(())
    }

    /// Run `ticks` control ticks, sleeping out each period if `realtime`
    ///
    /// The robot is stopped afterwards, also when a tick fails
    pub fn run(&mut self, ticks: u32, realtime: bool) -> anyhow::Result<()> {
        info!("Running {ticks} ticks of {:?}", self.period);
        for _ in 0..ticks {
            let started = Instant::now();
            if let Err(e) = self.tick() {
                self.shutdown();
                return Err(e);
            }
            if realtime {
                std::thread::sleep(self.period.saturating_sub(started.elapsed()));
            }
        }
        self.shutdown();
        Ok(())
    }

    /// Interrupt the running routine, leaving every module stopped
    pub fn shutdown(&mut self) {
        let range = self.world.range_finder();
        let mut ctx = TickContext::new(&mut self.drive, &self.odometry, &range);
        self.runner.interrupt(&mut ctx);
        self.last_shot = None;

        let truth = self.world.current_pose();
        let estimate = self.odometry.current_pose();
        info!(
            "Simulation stopped after {} ticks at ({:.2}, {:.2}), odometry ({:.2}, {:.2})",
            self.ticks,
            truth.translation.x,
            truth.translation.y,
            estimate.translation.x,
            estimate.translation.y
        );
        for index in 0..NUM_MODULES {
            if let Ok(module) = self.world.module(index) {
                debug!("module {index}: {module:?}");
            }
        }
    }
}

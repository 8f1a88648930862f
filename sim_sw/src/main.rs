mod driving;
mod physics;
mod settings;
mod simulation;

use crate::settings::SimSettings;
use crate::simulation::Simulation;
use log::info;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("Swerve simulation starting up");

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = SimSettings::load(path.as_deref())?;

    let mut simulation = Simulation::new(&settings)?;
    simulation.run(settings.ticks, settings.realtime)
}

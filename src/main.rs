use std::path::PathBuf;

use anyhow::{Context, anyhow};
use chrono::Local;
use env_logger::Builder;
use log::{LevelFilter, info};

use fleet_relay_simulator::common::config::SimulationConfig;
use fleet_relay_simulator::common::scene::load_scene;
use fleet_relay_simulator::simulation::Simulation;

fn usage() -> anyhow::Error {
    anyhow!("Usage: fleet-relay-simulator <scene.json> [config.toml]")
}

fn main() -> anyhow::Result<()> {
    // Logging setup
    Builder::new().filter_level(LevelFilter::Info).filter(Some("fleet_relay_simulator"), LevelFilter::Debug).init();

    info!("Starting up");

    let mut args = std::env::args().skip(1);
    let scene_path = args.next().ok_or_else(usage)?;
    let config_path = args.next().map(PathBuf::from).unwrap_or_else(|| SimulationConfig::config_path_from_scene(&scene_path));

    let config = SimulationConfig::load_or_default(&config_path).map_err(|e| anyhow!("{}: {}", config_path.display(), e))?;
    let scene = load_scene(&scene_path).map_err(|e| anyhow!("{}: {}", scene_path, e))?;

    let duration = config.duration_seconds;
    let log_path = config
        .log_path
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("SF_{}.csv", Local::now().format("%Y%m%d_%H%M%S"))));

    let mut simulation = Simulation::new(config);
    simulation.initialize(&scene);

    let ticks = simulation.run_for(duration);
    let completed: u64 = simulation.agents().iter().map(|a| a.completed_total()).sum();
    let unfilled: u64 = simulation.agents().iter().map(|a| a.unfilled_waypoints()).sum();
    info!(
        "Finished after {} ticks ({:.1}s): {} tasks completed, {} relay positions unfilled, {} transmissions",
        ticks,
        simulation.now_seconds(),
        completed,
        unfilled,
        simulation.medium().transmissions()
    );

    if let Some(last) = simulation.log().tail(1).first() {
        info!("Last log line: {}", last);
    }

    simulation.log().save_to_file(&log_path).context("Saving the result log")?;
    info!("Result log written to {}", log_path.display());
    Ok(())
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fleet_map_core::engine::EngineEvent;
use fleet_map_core::features::feature_collection;
use fleet_map_core::headless::{CameraCall, HeadlessEngine};
use fleet_map_core::{build_device_features, parse_geofence, FleetData, MapConfig, MapSession, Theme};
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Map settings file (JSON). Defaults to the per-user config location.
    #[arg(short, long, env = "FLEET_MAP_CONFIG")]
    config: Option<PathBuf>,

    /// Log per-update detail
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a geofence area string and print its geometry
    Geofence { area: String },
    /// Print the device FeatureCollection for a fleet snapshot file
    Features { file: PathBuf },
    /// Run a headless map session over a fleet snapshot file
    Replay {
        file: PathBuf,
        /// Device to select after the first sync
        #[arg(long)]
        select: Option<i64>,
        /// Switch to this theme before the final sync
        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)
        .context("Failed to initialize logger")?;

    let config = MapConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load map config")?;

    match cli.command {
        Commands::Geofence { area } => match parse_geofence(&area) {
            Some(geometry) => {
                println!("{}", serde_json::to_string_pretty(&geometry.to_geojson())?);
                if let Some(anchor) = geometry.label_point() {
                    println!("Label at {:.6}, {:.6}", anchor.lat, anchor.lng);
                }
            }
            None => println!("Unparseable geofence area: {}", area),
        },
        Commands::Features { file } => {
            let data = load_fleet(&file)?;
            let features = build_device_features(&data.devices, &data.positions);
            println!("{}", serde_json::to_string_pretty(&feature_collection(&features))?);
        }
        Commands::Replay {
            file,
            select,
            theme,
        } => {
            let data = load_fleet(&file)?;
            replay(config, &data, select, theme.map(Theme::from))?;
        }
    }

    Ok(())
}

fn load_fleet(path: &Path) -> Result<FleetData> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fleet snapshot {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid fleet snapshot {:?}", path))
}

fn replay(config: MapConfig, data: &FleetData, select: Option<i64>, theme: Option<Theme>) -> Result<()> {
    let mut session = MapSession::new(config, Theme::Light);
    session.mount(HeadlessEngine::from_config);
    session.handle_event(EngineEvent::Load, data);
    info!("Replay loaded — devices={} geofences={}", data.devices.len(), data.geofences.len());

    if let Some(device_id) = select {
        match session.select_device(device_id, data) {
            Some(task) => {
                info!("Selected device {} — popup after {:?}", device_id, task.delay);
                session.run_deferred(task, data);
            }
            None => println!("Device {} has no position", device_id),
        }
    }

    if let Some(theme) = theme {
        session.set_theme(theme);
        session.handle_event(EngineEvent::StyleLoad, data);
    }
    session.sync_devices(data);
    session.sync_geofences(data);

    let engine = session
        .engine()
        .ok_or_else(|| anyhow::anyhow!("Headless engine was not mounted"))?;

    println!("Style: {}", engine.style().unwrap_or("-"));
    if let Some(initial) = engine.initial_camera() {
        println!(
            "Initial view: {:.5}, {:.5} zoom {}",
            initial.center.lat,
            initial.center.lng,
            initial.zoom.unwrap_or_default()
        );
    }
    println!("Layers:");
    for id in engine.layer_ids() {
        println!("  {}", id);
    }
    println!("Devices on map: {}", session.features().len());
    match session.popup().handle().and_then(|h| engine.popup(h)) {
        Some(popup) => println!(
            "Popup at {:.5}, {:.5} (device {:?})",
            popup.at.lat,
            popup.at.lng,
            session.focused_device()
        ),
        None => println!("Popup: none"),
    }
    println!("Camera:");
    for call in engine.camera_calls() {
        match call {
            CameraCall::FlyTo(options) => println!("  fly_to {:?}", options),
            CameraCall::EaseTo(options) => println!("  ease_to {:?}", options),
            CameraCall::FitBounds(bounds, options) => println!(
                "  fit_bounds {:?} .. {:?} padding={}",
                bounds.south_west(),
                bounds.north_east(),
                options.padding
            ),
        }
    }

    if let Some(engine) = session.teardown() {
        info!("Replay finished — destroy_calls={}", engine.destroy_calls());
    }
    Ok(())
}

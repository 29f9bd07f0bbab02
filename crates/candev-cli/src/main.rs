//! Operator tool for CAN-bus peripherals.
//!
//! Builds the devices described by a bus configuration on the simulated
//! native driver, applies their initial configuration and logs telemetry
//! snapshots at a fixed period.

use anyhow::{Context, Result};
use candev_core::{ChannelId, Measurement, RangingMode, RegionOfInterest, StatusCode, TimingBudget};
use candev_hardware::manager::{BusConfig, DeviceManager, RangefinderConfig, RegulatorConfig};
use candev_hardware::sim::SimDriver;
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "candev", version, about = "CAN-bus peripheral tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the devices and log telemetry snapshots
    Run {
        /// Bus configuration file (JSON); a demo bus is used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use mock devices instead of the simulated driver
        #[arg(long, action = ArgAction::SetTrue)]
        mock: bool,

        /// Number of snapshots to log
        #[arg(long, default_value_t = 10u32)]
        cycles: u32,

        /// Time between snapshots, in milliseconds
        #[arg(long, default_value_t = 100u64)]
        period_ms: u64,
    },
    /// Check a bus configuration file without building anything
    Validate {
        /// Bus configuration file (JSON)
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    setup_tracing();

    match Cli::parse().command {
        Commands::Run {
            config,
            mock,
            cycles,
            period_ms,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => demo_config(),
            };
            config.simulation |= mock;
            run(config, cycles, Duration::from_millis(period_ms))
        }
        Commands::Validate { config } => {
            let config = load_config(&config)?;
            println!(
                "ok: {} rangefinder(s), {} regulator(s)",
                config.rangefinders.len(),
                config.regulators.len()
            );
            Ok(())
        }
    }
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_config(path: &Path) -> Result<BusConfig> {
    BusConfig::from_path(path)
        .with_context(|| format!("failed to load bus configuration {}", path.display()))
}

/// One rangefinder and one regulator, configured like a typical robot.
fn demo_config() -> BusConfig {
    BusConfig {
        rangefinders: vec![
            RangefinderConfig::new("front", 0)
                .with_ranging_mode(RangingMode::Short)
                .with_roi(RegionOfInterest::new(8, 8, 16, 16))
                .with_timing_budget(TimingBudget::Ms33),
        ],
        regulators: vec![
            RegulatorConfig::new("pdh", 0)
                .with_adjustable_voltage(12.0)
                .with_enabled_channel(ChannelId::FiveVA)
                .with_enabled_channel(ChannelId::Adjustable),
        ],
        ..BusConfig::default()
    }
}

fn run(config: BusConfig, cycles: u32, period: Duration) -> Result<()> {
    let sim = Arc::new(SimDriver::new());
    let backend = sim.backend();

    // Regulators only accept writes once they have reported status.
    for reg in &config.regulators {
        sim.publish_regulator_status(reg.can_id);
    }

    let simulation = config.simulation;
    let rangefinders: Vec<RangefinderConfig> = config.rangefinders.clone();
    let regulators: Vec<u8> = config.regulators.iter().map(|r| r.can_id).collect();

    let manager = DeviceManager::build(config, Some(&backend)).context("failed to build devices")?;
    let stats = manager.stats();
    info!(
        backend = backend.name(),
        hardware = stats.hardware,
        mocks = stats.mocks,
        "Bus ready"
    );

    for cycle in 0..cycles {
        if !simulation {
            feed_bus(&sim, &rangefinders, &regulators, cycle);
        }

        let snapshot = manager.snapshot()?;
        info!(cycle, snapshot = %serde_json::to_string(&snapshot)?, "Telemetry");
        thread::sleep(period);
    }

    manager.shutdown();
    let sim_stats = sim.stats();
    info!(
        inits = sim_stats.inits,
        frees = sim_stats.frees,
        rejected_frees = sim_stats.rejected_frees,
        "Native handles"
    );
    Ok(())
}

/// Publish one round of frames on the simulated bus.
fn feed_bus(sim: &SimDriver, rangefinders: &[RangefinderConfig], regulators: &[u8], cycle: u32) {
    let distance_mm = u16::try_from(200 + (cycle % 40) * 25).unwrap_or(u16::MAX);

    for rf in rangefinders {
        let measurement = Measurement {
            status: StatusCode::ValidMeasurement,
            distance_mm,
            ambient: 25,
            is_long: rf.ranging_mode.is_some_and(RangingMode::is_long),
            budget_ms: rf.timing_budget.unwrap_or_default().as_millis(),
            roi: rf.roi.unwrap_or_default(),
        };
        sim.publish_measurement(rf.can_id, measurement.into());
    }

    for &can_id in regulators {
        sim.publish_regulator_status(can_id);
        sim.set_channel_current(can_id, ChannelId::FiveVA, 0.8 + f64::from(cycle % 5) * 0.1);
        sim.set_channel_voltage_reading(can_id, 11.95);
    }
}

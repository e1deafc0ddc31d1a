use std::path::PathBuf;

use clap::Parser;
use stopline::config::RecorderConfig;
use stopline::recorder::run_recording;

#[derive(Debug, Parser)]
#[command(author, version, about = "Record per-vehicle traces from a SUMO run over TraCI")]
struct Cli {
    /// Scenario configuration handed to SUMO with -c
    #[arg(long, default_value = "Traci1.sumocfg")]
    scenario: PathBuf,

    /// Run sumo-gui instead of the headless binary
    #[arg(long)]
    gui: bool,

    /// Simulation step length in seconds
    #[arg(long)]
    step_length: Option<f64>,

    /// GUI render delay in milliseconds
    #[arg(long)]
    delay: Option<f64>,

    /// Sublane lateral resolution in meters
    #[arg(long)]
    lateral_resolution: Option<f64>,

    /// CSV export path, overwritten on every run
    #[arg(long, default_value = "simulation_data.csv")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = RecorderConfig {
        scenario: cli.scenario,
        gui: cli.gui,
        output: cli.output,
        ..RecorderConfig::default()
    };
    if let Some(v) = cli.step_length {
        cfg.step_length = v;
    }
    if let Some(v) = cli.delay {
        cfg.delay_ms = v;
    }
    if let Some(v) = cli.lateral_resolution {
        cfg.lateral_resolution = v;
    }

    let summary = run_recording(&cfg)?;
    println!("Ticks: {} | Samples: {}", summary.ticks, summary.samples);
    Ok(())
}

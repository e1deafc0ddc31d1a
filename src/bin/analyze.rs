use std::path::PathBuf;

use clap::Parser;
use stopline::analysis::{analyze, load_samples};
use stopline::config::AnalyzerConfig;
use stopline::plot::plot_leader_speed;
use stopline::report::{render_empty_alert, render_report, write_summary, AnalysisSummary};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Detect leader stop/restart cycles and estimate signal phase durations"
)]
struct Cli {
    /// Recording produced by stopline-record
    #[arg(long, default_value = "simulation_data.csv")]
    input: PathBuf,

    /// Stop-line x coordinate in meters
    #[arg(long)]
    stop_line_x: Option<f64>,

    /// Braking-onset acceleration threshold in m/s^2, negative
    #[arg(long)]
    decel_threshold: Option<f64>,

    /// Speed at or below which a vehicle counts as stopped, in m/s
    #[arg(long)]
    stop_speed: Option<f64>,

    /// Lower admissible Df bound for restarts, in meters
    #[arg(long)]
    df_min: Option<f64>,

    /// Upper admissible Df bound for restarts, in meters
    #[arg(long)]
    df_max: Option<f64>,

    /// Minimum stop duration for a cycle to count, in seconds
    #[arg(long)]
    min_stop_duration: Option<f64>,

    /// Write a JSON summary of the analysis here
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Write a PNG of leader speed with detected events here
    #[arg(long)]
    plot: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = AnalyzerConfig::default();
    if let Some(v) = cli.stop_line_x {
        cfg.stop_line_x = v;
    }
    if let Some(v) = cli.decel_threshold {
        cfg.decel_threshold = v;
    }
    if let Some(v) = cli.stop_speed {
        cfg.stop_speed = v;
    }
    if let Some(v) = cli.df_min {
        cfg.df_min = v;
    }
    if let Some(v) = cli.df_max {
        cfg.df_max = v;
    }
    if let Some(v) = cli.min_stop_duration {
        cfg.min_stop_duration = v;
    }

    println!("Loading data...");
    let samples = load_samples(&cli.input)?;
    let outcome = analyze(&samples, &cfg)?;

    if !outcome.has_events() {
        println!("{}", render_empty_alert(&cfg));
        std::process::exit(1);
    }

    println!("{}", render_report(&outcome.events, &outcome.phases, &cfg));

    if let Some(path) = cli.summary.as_deref() {
        let summary = AnalysisSummary::new(&cfg, &outcome.events, &outcome.phases);
        write_summary(path, &summary)?;
        println!("Summary: {}", path.display());
    }
    if let Some(path) = cli.plot.as_deref() {
        plot_leader_speed(path, &outcome.leader_series, &outcome.events)?;
        println!("Plot: {}", path.display());
    }

    Ok(())
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Launch parameters for the recording stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Scenario configuration handed to SUMO with `-c`
    pub scenario: PathBuf,
    /// Run `sumo-gui` instead of the headless `sumo` binary
    pub gui: bool,
    /// Simulation step length [s]
    pub step_length: f64,
    /// GUI render delay [ms]
    pub delay_ms: f64,
    /// Sublane model lateral resolution [m]
    pub lateral_resolution: f64,
    /// CSV export path, overwritten on every run
    pub output: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            scenario: PathBuf::from("Traci1.sumocfg"),
            gui: false,
            step_length: 0.1,
            delay_ms: 1000.0,
            lateral_resolution: 0.1,
            output: PathBuf::from("simulation_data.csv"),
        }
    }
}

impl RecorderConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.step_length > 0.0, "step_length must be > 0");
        anyhow::ensure!(self.delay_ms >= 0.0, "delay_ms must be >= 0");
        anyhow::ensure!(
            self.lateral_resolution > 0.0,
            "lateral_resolution must be > 0"
        );
        Ok(())
    }
}

/// Thresholds for leader tracking and cycle detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Stop-line x coordinate [m]; `Df = stop_line_x - pos_x`
    pub stop_line_x: f64,
    /// Braking-onset acceleration threshold [m/s^2], negative
    pub decel_threshold: f64,
    /// Speed at or below which a vehicle counts as stopped [m/s]
    pub stop_speed: f64,
    /// Lower bound of the admissible `Df` window for restarts [m]
    pub df_min: f64,
    /// Upper bound of the admissible `Df` window for restarts [m]
    pub df_max: f64,
    /// Minimum stop duration for a cycle to count [s]
    pub min_stop_duration: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            stop_line_x: -4.20,
            decel_threshold: -0.5,
            stop_speed: 0.1,
            df_min: -5.0,
            df_max: 10.0,
            min_stop_duration: 1.0,
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.decel_threshold < 0.0,
            "decel_threshold must be negative"
        );
        anyhow::ensure!(self.stop_speed >= 0.0, "stop_speed must be >= 0");
        anyhow::ensure!(self.df_min < self.df_max, "df_min must be below df_max");
        anyhow::ensure!(
            self.min_stop_duration > 0.0,
            "min_stop_duration must be > 0"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        RecorderConfig::default().validate().unwrap();
        AnalyzerConfig::default().validate().unwrap();
    }

    #[test]
    fn inverted_df_window_is_rejected() {
        let cfg = AnalyzerConfig {
            df_min: 10.0,
            df_max: -5.0,
            ..AnalyzerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}

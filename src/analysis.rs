//! Analyzer pipeline: a recording in, cycle events and phase estimates out.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::AnalyzerConfig;
use crate::events::{self, VehicleEvents};
use crate::leader::{self, LeaderSample};
use crate::report::{self, CycleEvent, PhaseEstimate};
use crate::trace::{self, Sample};

/// Everything the analyzer derives from one recording.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub sample_count: usize,
    pub leader_series: BTreeMap<String, Vec<LeaderSample>>,
    pub events: Vec<CycleEvent>,
    pub phases: PhaseEstimate,
}

impl AnalysisOutcome {
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }
}

/// Loads a recording; a missing file is a fatal prerequisite error.
pub fn load_samples(path: &Path) -> anyhow::Result<Vec<Sample>> {
    anyhow::ensure!(
        path.exists(),
        "input file {} not found; run stopline-record first or pass --input",
        path.display()
    );
    trace::read_samples(path)
}

/// Runs the full detection pipeline over loaded samples.
pub fn analyze(samples: &[Sample], cfg: &AnalyzerConfig) -> anyhow::Result<AnalysisOutcome> {
    cfg.validate()?;

    let flags = leader::flag_leaders(samples, cfg);
    let series = leader::leader_series(samples, &flags, cfg);

    let mut per_vehicle: BTreeMap<String, VehicleEvents> = BTreeMap::new();
    for (vehicle, observations) in &series {
        per_vehicle.insert(vehicle.clone(), events::filter_cycle_events(observations, cfg));
    }

    let merged = report::merge_events(&per_vehicle);
    let phases = report::estimate_phases(&merged);

    Ok(AnalysisOutcome {
        sample_count: samples.len(),
        leader_series: series,
        events: merged,
        phases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::EventKind;
    use tempfile::TempDir;

    fn sample(t: f64, veh_id: &str, pos_x: f64, v: f64, a: f64) -> Sample {
        Sample {
            t,
            a,
            veh_id: veh_id.into(),
            pos_x,
            pos_y: 0.0,
            v,
        }
    }

    #[test]
    fn full_pipeline_detects_one_cycle() {
        let cfg = AnalyzerConfig {
            stop_line_x: 0.0,
            ..AnalyzerConfig::default()
        };

        // veh0 stands at the stop line from t=2 to t=5; veh1 queues behind it
        // and never becomes leader.
        let mut samples = Vec::new();
        let profile = [
            (0.0, 2.0, 0.0),
            (1.0, 2.0, -1.0),
            (2.0, 0.05, 0.0),
            (3.0, 0.05, 0.0),
            (4.0, 0.05, 0.0),
            (5.0, 2.0, 1.0),
        ];
        for &(t, v, a) in &profile {
            samples.push(sample(t, "veh0", -3.0, v, a));
            samples.push(sample(t, "veh1", -50.0, 8.0, 0.0));
        }

        let outcome = analyze(&samples, &cfg).unwrap();
        assert_eq!(outcome.sample_count, 12);
        assert_eq!(outcome.leader_series.len(), 1);
        assert_eq!(outcome.leader_series["veh0"].len(), 6);

        assert_eq!(outcome.events.len(), 2);
        assert_eq!(outcome.events[0].kind, EventKind::Tvr);
        assert_eq!(outcome.events[0].time, 1.0);
        assert_eq!(outcome.events[1].kind, EventKind::Trv);
        assert_eq!(outcome.events[1].time, 5.0);

        assert!((outcome.phases.mean_red_s - 4.0).abs() < 1e-12);
        assert_eq!(outcome.phases.mean_green_s, 0.0);
    }

    #[test]
    fn header_only_recording_yields_no_events() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        trace::write_samples(&path, &[]).unwrap();

        let samples = load_samples(&path).unwrap();
        let outcome = analyze(&samples, &AnalyzerConfig::default()).unwrap();
        assert!(!outcome.has_events());
        assert_eq!(outcome.sample_count, 0);
    }

    #[test]
    fn missing_input_is_a_prerequisite_error() {
        let dir = TempDir::new().unwrap();
        let err = load_samples(&dir.path().join("nope.csv")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}

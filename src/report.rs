//! Cycle aggregation, phase estimation and the console report.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;

use crate::config::AnalyzerConfig;
use crate::events::VehicleEvents;

const SEPARATOR_WIDTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    Tvr,
    Trv,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Tvr => write!(f, "Tvr"),
            EventKind::Trv => write!(f, "Trv"),
        }
    }
}

/// One surviving cycle event, tagged with its vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleEvent {
    pub time: f64,
    pub kind: EventKind,
    pub vehicle: String,
}

/// Merges per-vehicle final event sets into one chronological list.
pub fn merge_events(per_vehicle: &BTreeMap<String, VehicleEvents>) -> Vec<CycleEvent> {
    let mut events = Vec::new();
    for (vehicle, set) in per_vehicle {
        for &t in &set.tvr {
            events.push(CycleEvent {
                time: t,
                kind: EventKind::Tvr,
                vehicle: vehicle.clone(),
            });
        }
        for &t in &set.trv {
            events.push(CycleEvent {
                time: t,
                kind: EventKind::Trv,
                vehicle: vehicle.clone(),
            });
        }
    }
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
    events
}

/// Red/green phase duration estimates from the merged event list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseEstimate {
    pub red_samples: Vec<f64>,
    pub green_samples: Vec<f64>,
    pub mean_red_s: f64,
    pub mean_green_s: f64,
}

/// Index-pairs the globally sorted `Tvr` and `Trv` lists.
///
/// Red is the span from a braking onset to the matching restart
/// (`trv[i] - tvr[i]`); green is the span from a restart to the next braking
/// onset (`tvr[i+1] - trv[i]`). Pairing is positional across all vehicles
/// combined, a deliberate single-leader-lane simplification. Non-positive
/// differences are discarded; an empty sample list averages to 0.
pub fn estimate_phases(events: &[CycleEvent]) -> PhaseEstimate {
    let mut tvr: Vec<f64> = events
        .iter()
        .filter(|e| e.kind == EventKind::Tvr)
        .map(|e| e.time)
        .collect();
    let mut trv: Vec<f64> = events
        .iter()
        .filter(|e| e.kind == EventKind::Trv)
        .map(|e| e.time)
        .collect();
    tvr.sort_by(f64::total_cmp);
    trv.sort_by(f64::total_cmp);

    let red_samples: Vec<f64> = tvr
        .iter()
        .zip(&trv)
        .map(|(tvr_t, trv_t)| trv_t - tvr_t)
        .filter(|d| *d > 0.0)
        .collect();

    let green_samples: Vec<f64> = trv
        .iter()
        .enumerate()
        .filter_map(|(i, trv_t)| tvr.get(i + 1).map(|next| next - trv_t))
        .filter(|d| *d > 0.0)
        .collect();

    PhaseEstimate {
        mean_red_s: mean(&red_samples),
        mean_green_s: mean(&green_samples),
        red_samples,
        green_samples,
    }
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}

pub fn separator() -> String {
    "-".repeat(SEPARATOR_WIDTH)
}

/// Renders the chronological timeline and the phase averages.
pub fn render_report(events: &[CycleEvent], phases: &PhaseEstimate, cfg: &AnalyzerConfig) -> String {
    let sep = separator();
    let labels = (1..=events.len())
        .map(|i| format!("T{i}"))
        .collect::<Vec<_>>()
        .join(" ");
    let timeline = events
        .iter()
        .map(|e| format!("{}{}({:.1})", e.kind, e.vehicle, e.time))
        .collect::<Vec<_>>()
        .join(" ");

    [
        sep.clone(),
        "FINAL RESULTS (Tvr and Trv):".to_string(),
        format!(
            "Logic: only stop cycles of more than {} seconds are kept.",
            cfg.min_stop_duration
        ),
        "Format: events (kind, vehicle id, time) on a single chronological line.".to_string(),
        sep.clone(),
        labels,
        timeline,
        sep.clone(),
        "SIGNAL PHASE ANALYSIS (estimates based on leader behavior):".to_string(),
        format!(
            "Estimated mean RED duration (Trv - Tvr): {:.2} seconds",
            phases.mean_red_s
        ),
        format!(
            "Estimated mean GREEN duration (Tvr(i+1) - Trv(i)): {:.2} seconds",
            phases.mean_green_s
        ),
        sep,
        "Analysis complete.".to_string(),
    ]
    .join("\n")
}

/// Diagnostic block for the empty-result path.
pub fn render_empty_alert(cfg: &AnalyzerConfig) -> String {
    let sep = separator();
    [
        sep.clone(),
        format!(
            "ALERT: no Tvr/Trv events detected (stop-duration criterion > {}s not met).",
            cfg.min_stop_duration
        ),
        "Check the thresholds or the simulation duration.".to_string(),
        sep,
    ]
    .join("\n")
}

/// JSON document written next to the console report.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub generated_utc: String,
    pub config: AnalyzerConfig,
    pub event_count: usize,
    pub events: Vec<CycleEvent>,
    pub phases: PhaseEstimate,
}

impl AnalysisSummary {
    pub fn new(cfg: &AnalyzerConfig, events: &[CycleEvent], phases: &PhaseEstimate) -> Self {
        Self {
            generated_utc: Utc::now().to_rfc3339(),
            config: cfg.clone(),
            event_count: events.len(),
            events: events.to_vec(),
            phases: phases.clone(),
        }
    }
}

pub fn write_summary(path: &Path, summary: &AnalysisSummary) -> anyhow::Result<()> {
    let data = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, data)
        .with_context(|| format!("failed to write summary {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(time: f64, kind: EventKind) -> CycleEvent {
        CycleEvent {
            time,
            kind,
            vehicle: "veh0".into(),
        }
    }

    #[test]
    fn red_durations_pair_positionally_and_discard_nonpositive() {
        // tvr = [10, 40], trv = [25, 30]: 25-10 kept, 30-40 discarded.
        let events = vec![
            event(10.0, EventKind::Tvr),
            event(25.0, EventKind::Trv),
            event(30.0, EventKind::Trv),
            event(40.0, EventKind::Tvr),
        ];
        let phases = estimate_phases(&events);
        assert_eq!(phases.red_samples, vec![15.0]);
        assert!((phases.mean_red_s - 15.0).abs() < 1e-12);
    }

    #[test]
    fn green_durations_pair_with_the_next_braking_onset() {
        let events = vec![
            event(10.0, EventKind::Tvr),
            event(25.0, EventKind::Trv),
            event(40.0, EventKind::Tvr),
            event(55.0, EventKind::Trv),
        ];
        let phases = estimate_phases(&events);
        assert_eq!(phases.green_samples, vec![15.0]);
        assert!((phases.mean_green_s - 15.0).abs() < 1e-12);
    }

    #[test]
    fn no_events_yield_zero_means() {
        let phases = estimate_phases(&[]);
        assert_eq!(phases.mean_red_s, 0.0);
        assert_eq!(phases.mean_green_s, 0.0);
        assert!(phases.red_samples.is_empty());
        assert!(phases.green_samples.is_empty());
    }

    #[test]
    fn merged_events_are_chronological() {
        let mut per_vehicle = BTreeMap::new();
        per_vehicle.insert(
            "b".to_string(),
            VehicleEvents {
                tvr: vec![30.0],
                trv: vec![45.0],
            },
        );
        per_vehicle.insert(
            "a".to_string(),
            VehicleEvents {
                tvr: vec![10.0],
                trv: vec![25.0],
            },
        );

        let merged = merge_events(&per_vehicle);
        let times: Vec<f64> = merged.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![10.0, 25.0, 30.0, 45.0]);
        assert_eq!(merged[0].vehicle, "a");
        assert_eq!(merged[2].vehicle, "b");
    }

    #[test]
    fn report_renders_ordinals_and_the_timeline() {
        let events = vec![event(10.0, EventKind::Tvr), event(25.0, EventKind::Trv)];
        let phases = estimate_phases(&events);
        let report = render_report(&events, &phases, &AnalyzerConfig::default());

        assert!(report.contains("T1 T2"));
        assert!(report.contains("Tvrveh0(10.0) Trvveh0(25.0)"));
        assert!(report.contains("Estimated mean RED duration (Trv - Tvr): 15.00 seconds"));
    }

    #[test]
    fn summary_serializes_with_the_report_means() {
        let events = vec![event(10.0, EventKind::Tvr), event(25.0, EventKind::Trv)];
        let phases = estimate_phases(&events);
        let summary = AnalysisSummary::new(&AnalyzerConfig::default(), &events, &phases);

        let json = serde_json::to_string(&summary).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event_count"], 2);
        assert_eq!(value["phases"]["mean_red_s"], 15.0);
        assert_eq!(value["events"][0]["kind"], "Tvr");
    }
}

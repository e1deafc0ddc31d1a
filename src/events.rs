//! Cycle event detection over a vehicle's leader-only series.
//!
//! All detectors are single forward scans with a previous-sample cursor.
//! NaN fields (from unparseable CSV numerics) fail every threshold
//! comparison, so such rows never produce events.

use crate::config::AnalyzerConfig;
use crate::leader::LeaderSample;

pub fn is_braking(sample: &LeaderSample, cfg: &AnalyzerConfig) -> bool {
    sample.a < cfg.decel_threshold && sample.v > cfg.stop_speed
}

pub fn is_stopped(sample: &LeaderSample, cfg: &AnalyzerConfig) -> bool {
    sample.v <= cfg.stop_speed
}

/// Restart candidates: speed rises through the stop threshold with time
/// strictly increasing and `Df` inside the admissible window.
///
/// The first sample of a series is never a candidate (no prior to compare).
pub fn trv_candidates(series: &[LeaderSample], cfg: &AnalyzerConfig) -> Vec<f64> {
    series
        .windows(2)
        .filter(|w| {
            let (prev, cur) = (&w[0], &w[1]);
            cur.v > cfg.stop_speed
                && prev.v <= cfg.stop_speed
                && cur.t - prev.t > 0.0
                && cur.df > cfg.df_min
                && cur.df < cfg.df_max
        })
        .map(|w| w[1].t)
        .collect()
}

/// Braking-onset candidates: rising edge of the braking predicate.
pub fn tvr_candidates(series: &[LeaderSample], cfg: &AnalyzerConfig) -> Vec<f64> {
    series
        .windows(2)
        .filter(|w| is_braking(&w[1], cfg) && !is_braking(&w[0], cfg))
        .map(|w| w[1].t)
        .collect()
}

/// Stop start/end edge times over a vehicle's series.
///
/// A series that begins stopped opens an interval at its first sample; a
/// stop still open at the end of the series has no end edge.
pub fn stop_edges(series: &[LeaderSample], cfg: &AnalyzerConfig) -> (Vec<f64>, Vec<f64>) {
    let mut starts = Vec::new();
    let mut ends = Vec::new();
    let mut prev_stopped = false;
    for sample in series {
        let stopped = is_stopped(sample, cfg);
        if stopped && !prev_stopped {
            starts.push(sample.t);
        } else if !stopped && prev_stopped {
            ends.push(sample.t);
        }
        prev_stopped = stopped;
    }
    (starts, ends)
}

/// A validated stop: `[start, end)` with duration at or above threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopInterval {
    pub start: f64,
    pub end: f64,
}

/// Forward-only two-pointer pairing of stop starts with stop ends.
///
/// When an end precedes (or equals) the current start, the end pointer alone
/// advances and the match is retried. The walk never backtracks, so one
/// malformed end time can desynchronize later pairings.
pub fn match_stop_intervals(starts: &[f64], ends: &[f64], min_duration: f64) -> Vec<StopInterval> {
    let mut intervals = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < starts.len() && j < ends.len() {
        let (start, end) = (starts[i], ends[j]);
        if end > start {
            if end - start >= min_duration {
                intervals.push(StopInterval { start, end });
            }
            i += 1;
            j += 1;
        } else {
            j += 1;
        }
    }
    intervals
}

/// Final event times for one vehicle after the stop-duration filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleEvents {
    pub tvr: Vec<f64>,
    pub trv: Vec<f64>,
}

/// Applies the stop-duration filter.
///
/// Per valid stop interval: the qualifying `Tvr` is the latest braking-onset
/// candidate strictly before the stop start (a stop with no preceding onset
/// contributes none); the qualifying `Trv` is exactly the interval end.
pub fn filter_cycle_events(series: &[LeaderSample], cfg: &AnalyzerConfig) -> VehicleEvents {
    let (starts, ends) = stop_edges(series, cfg);
    let intervals = match_stop_intervals(&starts, &ends, cfg.min_stop_duration);
    let candidates = tvr_candidates(series, cfg);

    let mut events = VehicleEvents::default();
    for interval in &intervals {
        if let Some(&onset) = candidates.iter().filter(|&&t| t < interval.start).last() {
            events.tvr.push(onset);
        }
        events.trv.push(interval.end);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> AnalyzerConfig {
        AnalyzerConfig {
            stop_line_x: 0.0,
            ..AnalyzerConfig::default()
        }
    }

    fn series(points: &[(f64, f64, f64)]) -> Vec<LeaderSample> {
        points
            .iter()
            .map(|&(t, v, a)| LeaderSample { t, v, a, df: 3.0 })
            .collect()
    }

    #[test]
    fn one_full_stop_cycle_is_detected() {
        // Approach at 2 m/s, brake at t=1, stand from t=2 to t=5, restart.
        let leader = series(&[
            (0.0, 2.0, 0.0),
            (1.0, 2.0, -1.0),
            (2.0, 0.05, 0.0),
            (3.0, 0.05, 0.0),
            (4.0, 0.05, 0.0),
            (5.0, 2.0, 1.0),
        ]);
        let cfg = cfg();

        let (starts, ends) = stop_edges(&leader, &cfg);
        assert_eq!(starts, vec![2.0]);
        assert_eq!(ends, vec![5.0]);

        assert_eq!(tvr_candidates(&leader, &cfg), vec![1.0]);
        assert_eq!(trv_candidates(&leader, &cfg), vec![5.0]);

        let events = filter_cycle_events(&leader, &cfg);
        assert_eq!(events.tvr, vec![1.0]);
        assert_eq!(events.trv, vec![5.0]);
    }

    #[test]
    fn short_stops_are_rejected() {
        let leader = series(&[(0.0, 2.0, -1.0), (1.0, 0.05, 0.0), (1.5, 2.0, 1.0)]);
        let events = filter_cycle_events(&leader, &cfg());
        assert!(events.tvr.is_empty());
        assert!(events.trv.is_empty());
    }

    #[test]
    fn a_valid_stop_without_braking_onset_contributes_no_tvr() {
        let leader = series(&[(0.0, 2.0, 0.0), (1.0, 0.05, 0.0), (3.0, 2.0, 0.0)]);
        let events = filter_cycle_events(&leader, &cfg());
        assert!(events.tvr.is_empty());
        assert_eq!(events.trv, vec![3.0]);
    }

    #[test]
    fn first_sample_is_never_a_candidate() {
        let braking_first = series(&[(0.0, 2.0, -1.0), (1.0, 2.0, -1.0)]);
        assert!(tvr_candidates(&braking_first, &cfg()).is_empty());

        let moving_first = series(&[(0.0, 2.0, 0.0)]);
        assert!(trv_candidates(&moving_first, &cfg()).is_empty());
    }

    #[test]
    fn a_series_that_begins_stopped_opens_an_interval() {
        let leader = series(&[(0.0, 0.05, 0.0), (1.0, 0.05, 0.0), (2.0, 2.0, 0.0)]);
        let (starts, ends) = stop_edges(&leader, &cfg());
        assert_eq!(starts, vec![0.0]);
        assert_eq!(ends, vec![2.0]);
    }

    #[test]
    fn restarts_outside_the_df_window_are_not_candidates() {
        let mut leader = series(&[(0.0, 0.05, 0.0), (1.0, 0.05, 0.0), (2.0, 2.0, 0.0)]);
        for sample in &mut leader {
            sample.df = 50.0;
        }
        assert!(trv_candidates(&leader, &cfg()).is_empty());
    }

    #[test]
    fn matcher_skips_malformed_end_times() {
        // The end at 0.5 precedes the only start; only the end pointer moves.
        let intervals = match_stop_intervals(&[1.0], &[0.5, 3.0], 1.0);
        assert_eq!(
            intervals,
            vec![StopInterval {
                start: 1.0,
                end: 3.0
            }]
        );
    }

    #[test]
    fn matcher_is_idempotent() {
        let starts = [1.0, 10.0, 20.0];
        let ends = [0.5, 4.0, 12.0, 29.0];
        let first = match_stop_intervals(&starts, &ends, 1.0);
        let second = match_stop_intervals(&starts, &ends, 1.0);
        assert_eq!(first, second);
    }

    #[test]
    fn accepted_pairs_meet_the_duration_threshold() {
        let starts = [0.0, 10.0, 20.0];
        let ends = [0.5, 14.0, 27.0];
        let intervals = match_stop_intervals(&starts, &ends, 1.0);

        // [0.0, 0.5) is in order but too short; the rest qualify.
        assert_eq!(intervals.len(), 2);
        for interval in &intervals {
            assert!(interval.end - interval.start >= 1.0);
        }
    }

    #[test]
    fn nan_speeds_produce_no_events() {
        let leader = series(&[
            (0.0, 2.0, 0.0),
            (1.0, f64::NAN, f64::NAN),
            (2.0, 2.0, 0.0),
        ]);
        let cfg = cfg();
        assert!(tvr_candidates(&leader, &cfg).is_empty());
        assert!(trv_candidates(&leader, &cfg).is_empty());
        let (starts, ends) = stop_edges(&leader, &cfg);
        assert!(starts.is_empty());
        assert!(ends.is_empty());
    }
}

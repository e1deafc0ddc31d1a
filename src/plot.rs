//! Leader speed plot with detected cycle events marked.

use std::collections::BTreeMap;
use std::path::Path;

use plotters::prelude::*;

use crate::leader::LeaderSample;
use crate::report::CycleEvent;

/// Renders leader speed vs. time as a PNG, with final events marked.
pub fn plot_leader_speed(
    path: &Path,
    series: &BTreeMap<String, Vec<LeaderSample>>,
    events: &[CycleEvent],
) -> anyhow::Result<()> {
    let mut points: Vec<(f64, f64)> = series.values().flatten().map(|s| (s.t, s.v)).collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    anyhow::ensure!(!points.is_empty(), "no leader samples to plot");

    let t_max = points.last().map(|p| p.0).unwrap_or(1.0).max(1.0);
    let v_max = points.iter().map(|p| p.1).fold(0.0_f64, f64::max).max(1.0);

    let root = BitMapBackend::new(path, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Leader Speed at the Stop Line", ("sans-serif", 34).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..t_max, 0.0..v_max * 1.1)?;

    chart
        .configure_mesh()
        .x_desc("Time [s]")
        .y_desc("Speed [m/s]")
        .draw()?;

    chart
        .draw_series(LineSeries::new(points.iter().copied(), &BLUE))?
        .label("leader speed")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], BLUE.stroke_width(3)));

    chart
        .draw_series(
            events
                .iter()
                .map(|e| Circle::new((e.time, 0.0), 5, RED.filled())),
        )?
        .label("cycle events")
        .legend(|(x, y)| Circle::new((x + 12, y), 5, RED.filled()));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.7))
        .draw()?;

    root.present()?;
    Ok(())
}

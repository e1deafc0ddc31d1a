use std::path::Path;

use anyhow::Context;
use serde::Serialize;

/// One vehicle observation at one simulation tick.
///
/// The serde renames pin the exact CSV header of the export; the analyzer
/// reads columns back by position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    #[serde(rename = "t (s)")]
    pub t: f64,
    #[serde(rename = "acceleration (m/s^2)")]
    pub a: f64,
    #[serde(rename = "veh_id")]
    pub veh_id: String,
    #[serde(rename = "position_x (m)")]
    pub pos_x: f64,
    #[serde(rename = "position_y (m)")]
    pub pos_y: f64,
    #[serde(rename = "vitesse (m/s)")]
    pub v: f64,
}

impl Sample {
    /// Console echo line, mirroring the CSV column order.
    pub fn echo_line(&self) -> String {
        format!(
            "{:.1},{:.2},{},{:.2},{:.2},{:.2}",
            self.t, self.a, self.veh_id, self.pos_x, self.pos_y, self.v
        )
    }
}

/// Console header printed before the first echo line.
pub const ECHO_HEADER: &str = "T (s),a (m/s^2),vehID,Pos X (m),Pos Y (m),V (m/s)";

/// CSV header row, written even when the recording holds no samples.
pub const CSV_HEADER: [&str; 6] = [
    "t (s)",
    "acceleration (m/s^2)",
    "veh_id",
    "position_x (m)",
    "position_y (m)",
    "vitesse (m/s)",
];

/// Writes a recording, header row first, overwriting any existing file.
pub fn write_samples(path: &Path, samples: &[Sample]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open CSV path {}", path.display()))?;

    if samples.is_empty() {
        writer.write_record(CSV_HEADER)?;
    }
    for sample in samples {
        writer.serialize(sample)?;
    }

    writer.flush()?;
    Ok(())
}

/// Reads a recording back by column position.
///
/// Rows whose time column does not parse are dropped; other unparseable
/// numerics become NaN, which can never satisfy a threshold comparison.
pub fn read_samples(path: &Path) -> anyhow::Result<Vec<Sample>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("cannot read recording {}", path.display()))?;

    let mut samples = Vec::new();
    for record in reader.records() {
        let record = record?;
        let t = match record.get(0).and_then(|f| f.trim().parse::<f64>().ok()) {
            Some(t) if t.is_finite() => t,
            _ => continue,
        };
        samples.push(Sample {
            t,
            a: numeric(&record, 1),
            veh_id: record.get(2).unwrap_or("").to_string(),
            pos_x: numeric(&record, 3),
            pos_y: numeric(&record, 4),
            v: numeric(&record, 5),
        });
    }
    Ok(samples)
}

fn numeric(record: &csv::StringRecord, index: usize) -> f64 {
    record
        .get(index)
        .and_then(|f| f.trim().parse().ok())
        .unwrap_or(f64::NAN)
}

//! Recording stage: drives SUMO step by step and exports the sampled trace.

use std::path::Path;

use crate::config::RecorderConfig;
use crate::trace::{self, Sample, ECHO_HEADER};
use crate::traci::TraciConnection;

/// Outcome of a completed recording run.
#[derive(Debug, Clone)]
pub struct RecordingSummary {
    pub ticks: usize,
    pub samples: usize,
    pub exported: bool,
}

/// Runs the full record-and-export cycle.
///
/// The drive loop keeps stepping while vehicles are present or still waiting
/// to be inserted. Export failures are reported but never discard the run:
/// the recording itself is considered complete once the loop ends.
pub fn run_recording(cfg: &RecorderConfig) -> anyhow::Result<RecordingSummary> {
    cfg.validate()?;

    let mut conn = TraciConnection::start(cfg)?;
    let (api, software) = conn.api_version()?;
    println!("Connected to {software} (TraCI API {api})");

    println!("--- SIMULATION START (CSV-like output) ---");
    println!("{ECHO_HEADER}");

    let mut samples: Vec<Sample> = Vec::new();
    let mut ticks = 0usize;
    while conn.min_expected_vehicles()? > 0 {
        conn.simulation_step()?;
        sample_tick(&mut conn, &mut samples)?;
        ticks += 1;
    }

    println!();
    println!("Simulation stopped: the network is empty (no vehicles present or pending).");
    conn.close()?;

    let exported = export_csv(&cfg.output, &samples);
    Ok(RecordingSummary {
        ticks,
        samples: samples.len(),
        exported,
    })
}

/// Samples every active vehicle once and echoes each row.
fn sample_tick(conn: &mut TraciConnection, samples: &mut Vec<Sample>) -> anyhow::Result<()> {
    let t = conn.simulation_time()?;
    for veh_id in conn.vehicle_ids()? {
        let v = conn.speed(&veh_id)?;
        let (pos_x, pos_y) = conn.position(&veh_id)?;
        let a = conn.acceleration(&veh_id)?;

        let sample = Sample {
            t,
            a,
            veh_id,
            pos_x,
            pos_y,
            v,
        };
        println!("{}", sample.echo_line());
        samples.push(sample);
    }
    Ok(())
}

/// Writes the recording, reporting failures without propagating them.
///
/// A failed export leaves the collected data in memory only; the next run
/// overwrites whatever landed on disk.
pub fn export_csv(path: &Path, samples: &[Sample]) -> bool {
    match trace::write_samples(path, samples) {
        Ok(()) => {
            println!();
            println!("CSV file created: {}", absolute_display(path));
            println!("Recorded data rows (excluding header): {}", samples.len());
            true
        }
        Err(err) => {
            println!();
            if is_permission_denied(&err) {
                println!("PERMISSION ERROR: cannot write to {}", path.display());
                println!("Check that the file is not open elsewhere and that the directory is writable.");
            } else {
                println!("Unexpected error while writing the CSV file: {err:#}");
            }
            false
        }
    }
}

fn is_permission_denied(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return io.kind() == std::io::ErrorKind::PermissionDenied;
        }
        if let Some(csv_err) = cause.downcast_ref::<csv::Error>() {
            if let csv::ErrorKind::Io(io) = csv_err.kind() {
                return io.kind() == std::io::ErrorKind::PermissionDenied;
            }
        }
        false
    })
}

fn absolute_display(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn export_failure_reports_and_returns_false() {
        // The target path is an existing directory, so the writer cannot open it.
        let dir = TempDir::new().unwrap();
        assert!(!export_csv(dir.path(), &[]));
    }

    #[test]
    fn export_success_returns_true() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        assert!(export_csv(&path, &[]));
        assert!(path.exists());
    }

    #[test]
    fn permission_errors_are_classified() {
        let denied = anyhow::Error::new(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(is_permission_denied(&denied));

        let missing = anyhow::Error::new(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        assert!(!is_permission_denied(&missing));
    }
}

//! stopline - traffic-signal phase estimation from SUMO vehicle traces
//!
//! Two batch stages connected by a CSV file on disk: the recorder drives a
//! SUMO run over TraCI and samples every vehicle each simulation tick; the
//! analyzer replays the CSV, tracks the leader vehicle approaching a stop
//! line and estimates red/green phase durations from its stop/restart
//! cycles.

pub mod analysis;
pub mod config;
pub mod events;
pub mod leader;
pub mod plot;
pub mod recorder;
pub mod report;
pub mod trace;
pub mod traci;

// Re-export main types
pub use analysis::AnalysisOutcome;
pub use config::{AnalyzerConfig, RecorderConfig};
pub use report::{CycleEvent, EventKind, PhaseEstimate};
pub use trace::Sample;

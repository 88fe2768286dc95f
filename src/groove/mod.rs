// Groove Engine - Tempo and beat grid
// The beat oracle that feeds segmentation and bar-length edits

pub mod grid;
pub mod oracle;
pub mod tempo;

pub use grid::{bar_duration, BeatGrid};
pub use oracle::{BeatOracle, FixedTempo, OnsetBeatTracker, OracleError};
pub use tempo::{estimate_tempo, TempoConfig, TempoEstimate};

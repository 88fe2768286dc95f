// Beat oracle abstraction
// Supplies tempo, beat and onset times for a waveform. Real beat trackers plug in
// behind the trait; the onset-based tracker and a fixed-tempo grid ship here.

use thiserror::Error;

use crate::audio::features::{detect_onsets, OnsetConfig};
use crate::groove::grid::BeatGrid;
use crate::groove::tempo::{estimate_tempo, TempoConfig};

/// Errors a beat oracle may report
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Invalid tempo: {0}")]
    InvalidTempo(f64),

    #[error("Beat tracking failed: {0}")]
    TrackingFailed(String),
}

/// Waveform -> {tempo, beat times, onset times}
pub trait BeatOracle {
    fn track(&self, mono: &[f32], sample_rate: u32) -> Result<BeatGrid, OracleError>;
}

/// Spectral-flux onsets followed by IOI histogram tempo estimation
#[derive(Debug, Clone, Default)]
pub struct OnsetBeatTracker {
    pub onset: OnsetConfig,
    pub tempo: TempoConfig,
}

impl OnsetBeatTracker {
    pub fn new(onset: OnsetConfig, tempo: TempoConfig) -> Self {
        OnsetBeatTracker { onset, tempo }
    }
}

impl BeatOracle for OnsetBeatTracker {
    fn track(&self, mono: &[f32], sample_rate: u32) -> Result<BeatGrid, OracleError> {
        if sample_rate == 0 {
            return Err(OracleError::InvalidSampleRate(sample_rate));
        }

        let duration = mono.len() as f64 / sample_rate as f64;
        let onsets = detect_onsets(mono, sample_rate, &self.onset);
        let estimate = estimate_tempo(&onsets, duration, &self.tempo);

        log::debug!(
            "Beat tracking: {} onsets, {:.1} BPM (confidence {:.2}), {} beats",
            onsets.len(),
            estimate.bpm,
            estimate.confidence,
            estimate.beat_times.len()
        );

        if !(estimate.bpm.is_finite() && estimate.bpm > 0.0) {
            return Err(OracleError::TrackingFailed(format!(
                "non-positive tempo {}",
                estimate.bpm
            )));
        }

        Ok(BeatGrid::new(
            estimate.bpm,
            estimate.beat_times,
            onsets.into_iter().map(|o| o.time).collect(),
            duration,
        ))
    }
}

/// Regular beat grid at a known tempo
#[derive(Debug, Clone, Copy)]
pub struct FixedTempo {
    pub bpm: f64,

    /// Time of the first downbeat in seconds
    pub offset: f64,
}

impl FixedTempo {
    pub fn new(bpm: f64) -> Self {
        FixedTempo { bpm, offset: 0.0 }
    }
}

impl BeatOracle for FixedTempo {
    fn track(&self, mono: &[f32], sample_rate: u32) -> Result<BeatGrid, OracleError> {
        if sample_rate == 0 {
            return Err(OracleError::InvalidSampleRate(sample_rate));
        }
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(OracleError::InvalidTempo(self.bpm));
        }

        let duration = mono.len() as f64 / sample_rate as f64;
        Ok(BeatGrid::regular(self.bpm, self.offset, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_tempo_grid() {
        let oracle = FixedTempo::new(120.0);
        let grid = oracle.track(&vec![0.0; 4000], 1000).unwrap();

        assert_eq!(grid.bpm, 120.0);
        assert_eq!(grid.beat_times.len(), 9);
        assert_eq!(grid.beat_times[8], 4.0);
    }

    #[test]
    fn test_fixed_tempo_rejects_bad_tempo() {
        assert!(FixedTempo::new(0.0).track(&[0.0; 10], 1000).is_err());
        assert!(FixedTempo::new(120.0).track(&[0.0; 10], 0).is_err());
    }

    #[test]
    fn test_onset_tracker_on_silence_falls_back() {
        let tracker = OnsetBeatTracker::default();
        let grid = tracker.track(&vec![0.0; 22050 * 3], 22050).unwrap();

        assert_eq!(grid.bpm, 120.0);
        assert!(grid.onset_times.is_empty());
        assert!(!grid.beat_times.is_empty());
        assert!(grid.beat_times.iter().all(|&t| (0.0..=3.0).contains(&t)));
    }
}

// Beat Grid - tempo plus beat and onset timestamps for one track
// Provides beat snapping and bar arithmetic for segmentation and editing

use serde::{Deserialize, Serialize};

/// Tempo and beat positions delivered by a beat oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatGrid {
    /// Beats per minute (> 0)
    pub bpm: f64,

    /// Monotonic beat times in seconds, within [0, track duration]
    pub beat_times: Vec<f64>,

    /// Detected onset times in seconds (may be empty)
    pub onset_times: Vec<f64>,
}

impl BeatGrid {
    /// Create a grid from raw oracle output, sorting and clamping beats to the track
    pub fn new(bpm: f64, mut beat_times: Vec<f64>, onset_times: Vec<f64>, duration: f64) -> Self {
        beat_times.retain(|t| t.is_finite() && *t >= 0.0 && *t <= duration);
        beat_times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        beat_times.dedup();

        BeatGrid {
            bpm,
            beat_times,
            onset_times,
        }
    }

    /// Regular grid at a fixed tempo starting at `offset` and covering [0, duration]
    pub fn regular(bpm: f64, offset: f64, duration: f64) -> Self {
        let mut beats = Vec::new();
        if bpm > 0.0 && duration > 0.0 {
            let interval = 60.0 / bpm;
            let mut t = offset.rem_euclid(interval);
            while t <= duration {
                beats.push(t);
                t += interval;
            }
        }

        BeatGrid::new(bpm, beats, Vec::new(), duration)
    }

    /// Duration of one beat in seconds
    pub fn beat_duration(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of one bar in seconds
    pub fn bar_duration(&self, beats_per_bar: u32) -> f64 {
        bar_duration(self.bpm, beats_per_bar)
    }

    /// Find the beat closest to a timestamp
    /// Returns None when the grid has no beats
    pub fn nearest_beat(&self, time: f64) -> Option<f64> {
        if self.beat_times.is_empty() {
            return None;
        }

        // Beats are sorted, so binary search for the insertion point
        let idx = self.beat_times.partition_point(|&b| b < time);
        let after = self.beat_times.get(idx).copied();
        let before = idx.checked_sub(1).map(|i| self.beat_times[i]);

        match (before, after) {
            (Some(b), Some(a)) => {
                // Ties go to the earlier beat
                if (time - b).abs() <= (a - time).abs() {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (Some(b), None) => Some(b),
            (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }
}

/// Seconds per bar at the given tempo
pub fn bar_duration(bpm: f64, beats_per_bar: u32) -> f64 {
    if bpm <= 0.0 {
        return 0.0;
    }
    (60.0 / bpm) * beats_per_bar as f64
}

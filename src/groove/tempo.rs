// Tempo Estimation - BPM detection using inter-onset intervals
// Uses an IOI histogram to find periodic structure, then phase-aligns a beat grid

use serde::{Deserialize, Serialize};

use crate::audio::features::Onset;

/// Tempo estimation result with BPM and beat grid positions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoEstimate {
    /// Estimated beats per minute
    pub bpm: f64,

    /// Confidence in the estimate [0.0, 1.0]
    pub confidence: f32,

    /// Beat positions in seconds, spanning the whole track
    pub beat_times: Vec<f64>,
}

/// Configuration for tempo estimation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Minimum BPM to consider
    pub min_bpm: f64,

    /// Maximum BPM to consider
    pub max_bpm: f64,

    /// Number of bins for IOI histogram
    pub histogram_bins: usize,

    /// Minimum number of onsets required for estimation
    pub min_onsets: usize,

    /// Tempo used when there is not enough rhythmic material
    pub fallback_bpm: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        TempoConfig {
            min_bpm: 60.0,
            max_bpm: 180.0,
            histogram_bins: 300,
            min_onsets: 8,
            fallback_bpm: 120.0,
        }
    }
}

/// Estimate tempo from onset detections and lay a beat grid over [0, duration]
///
/// Algorithm:
/// 1. Compute inter-onset intervals (IOIs)
/// 2. Build IOI histogram (with half/double tempo votes)
/// 3. Pick strongest smoothed peak in valid BPM range
/// 4. Choose the grid phase that best matches the onsets
pub fn estimate_tempo(onsets: &[Onset], duration: f64, config: &TempoConfig) -> TempoEstimate {
    let fallback = || TempoEstimate {
        bpm: config.fallback_bpm,
        confidence: 0.0,
        beat_times: regular_beats(0.0, 60.0 / config.fallback_bpm, duration),
    };

    if onsets.len() < config.min_onsets {
        return fallback();
    }

    let iois = compute_iois(onsets);
    if iois.is_empty() {
        return fallback();
    }

    let histogram = build_ioi_histogram(&iois, config);
    let peaks = find_histogram_peaks(&histogram);

    let Some((interval, confidence)) = select_best_tempo(&peaks, &histogram, config) else {
        return fallback();
    };

    let bpm = (60.0 / interval).clamp(config.min_bpm, config.max_bpm);
    let interval = 60.0 / bpm;
    let phase = best_phase(onsets, interval);

    TempoEstimate {
        bpm,
        confidence,
        beat_times: regular_beats(phase, interval, duration),
    }
}

/// Compute inter-onset intervals (time between consecutive onsets)
fn compute_iois(onsets: &[Onset]) -> Vec<f64> {
    onsets
        .windows(2)
        .map(|pair| pair[1].time - pair[0].time)
        .filter(|&interval| interval > 0.0)
        .collect()
}

fn interval_range(config: &TempoConfig) -> Option<(f64, f64)> {
    if config.max_bpm <= 0.0 || config.min_bpm <= 0.0 || config.histogram_bins == 0 {
        return None;
    }
    let min_interval = 60.0 / config.max_bpm;
    let max_interval = 60.0 / config.min_bpm;
    if max_interval - min_interval <= f64::EPSILON {
        return None;
    }
    Some((min_interval, max_interval))
}

/// Build histogram of inter-onset intervals
/// Bins are distributed linearly across the tempo range
fn build_ioi_histogram(iois: &[f64], config: &TempoConfig) -> Vec<f32> {
    let Some((min_interval, max_interval)) = interval_range(config) else {
        return vec![0.0f32; config.histogram_bins];
    };

    let bins = config.histogram_bins;
    let bin_width = (max_interval - min_interval) / bins as f64;
    let mut histogram = vec![0.0f32; bins];

    let mut vote = |interval: f64, weight: f32| {
        if interval >= min_interval && interval <= max_interval {
            let bin = (((interval - min_interval) / bin_width) as usize).min(bins - 1);
            histogram[bin] += weight;
        }
    };

    for &ioi in iois {
        vote(ioi, 1.0);
        // Half and double tempo relationships get a lower weight
        vote(ioi / 2.0, 0.5);
        vote(ioi * 2.0, 0.5);
    }

    smooth_histogram(&histogram, 3)
}

/// Smooth histogram using moving average filter
fn smooth_histogram(histogram: &[f32], window_size: usize) -> Vec<f32> {
    let half_window = window_size / 2;

    (0..histogram.len())
        .map(|i| {
            let start = i.saturating_sub(half_window);
            let end = (i + half_window + 1).min(histogram.len());
            let sum: f32 = histogram[start..end].iter().sum();
            sum / (end - start) as f32
        })
        .collect()
}

/// Find local maxima, strongest first, keeping the top five
fn find_histogram_peaks(histogram: &[f32]) -> Vec<(usize, f32)> {
    if histogram.len() < 3 {
        return Vec::new();
    }

    let mut peaks: Vec<(usize, f32)> = (1..histogram.len() - 1)
        .filter(|&i| histogram[i] > histogram[i - 1] && histogram[i] >= histogram[i + 1])
        .map(|i| (i, histogram[i]))
        .collect();

    peaks.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    peaks.truncate(5);
    peaks
}

/// Convert the strongest peak into a beat interval (seconds) and a confidence
fn select_best_tempo(
    peaks: &[(usize, f32)],
    histogram: &[f32],
    config: &TempoConfig,
) -> Option<(f64, f32)> {
    let &(best_bin, peak_strength) = peaks.first()?;
    let (min_interval, max_interval) = interval_range(config)?;

    let bin_width = (max_interval - min_interval) / config.histogram_bins as f64;
    // Centre of the bin
    let interval = min_interval + (best_bin as f64 + 0.5) * bin_width;

    let histogram_mean = histogram.iter().sum::<f32>() / histogram.len().max(1) as f32;
    let confidence = if histogram_mean > 0.0 && peak_strength.is_finite() {
        (peak_strength / (histogram_mean * 3.0)).min(1.0)
    } else {
        0.0
    };

    Some((interval, confidence))
}

/// Find the grid phase (in [0, interval)) that best aligns with the onsets
fn best_phase(onsets: &[Onset], interval: f64) -> f64 {
    let Some(first) = onsets.first() else {
        return 0.0;
    };
    let last = onsets[onsets.len() - 1].time;

    let num_phase_tests = 16;
    let phase_step = interval / num_phase_tests as f64;

    let mut best_phase = first.time;
    let mut best_score = f64::MIN;

    for i in 0..num_phase_tests {
        let phase = first.time + i as f64 * phase_step;
        let score = score_beat_alignment(onsets, phase, interval, last);
        if score > best_score {
            best_score = score;
            best_phase = phase;
        }
    }

    best_phase.rem_euclid(interval)
}

/// Score how well a beat grid aligns with detected onsets
fn score_beat_alignment(onsets: &[Onset], phase: f64, interval: f64, end_time: f64) -> f64 {
    let tolerance = interval * 0.15;
    if tolerance <= 0.0 {
        return 0.0;
    }

    let mut score = 0.0;
    let mut beat_time = phase;
    while beat_time <= end_time {
        let closest_distance = onsets
            .iter()
            .map(|onset| (onset.time - beat_time).abs())
            .fold(f64::MAX, f64::min);

        if closest_distance < tolerance {
            score += (tolerance - closest_distance) / tolerance;
        }

        beat_time += interval;
    }

    score
}

/// Evenly spaced beats from `phase` up to and including `duration`
fn regular_beats(phase: f64, interval: f64, duration: f64) -> Vec<f64> {
    if interval <= 0.0 || duration <= 0.0 {
        return Vec::new();
    }

    let mut beats = Vec::new();
    let mut index = 0u64;
    loop {
        // Multiply rather than accumulate to avoid drift over long tracks
        let t = phase + index as f64 * interval;
        if t > duration {
            break;
        }
        beats.push(t);
        index += 1;
    }
    beats
}

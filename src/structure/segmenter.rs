// Segmentation engine
// Features -> affinity -> novelty -> peaks -> beat-snapped boundaries -> labeled sections

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::groove::BeatGrid;
use crate::structure::features::{extract_frame_features, FrameFeatures};
use crate::structure::labels::{
    classify_span, disambiguate, energy_stats, label_confidence, SectionKind, SpanContext,
};
use crate::structure::similarity::{
    adaptive_threshold, affinity_matrix, normalize_curve, novelty_curve, pick_peaks,
};
use crate::structure::types::{Section, BOUNDARY_TOLERANCE};

#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),
}

/// Tunables for structure analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// FFT window in samples
    pub window_size: usize,

    /// Hop between analysis frames in samples
    pub hop_size: usize,

    /// Frames are mean-pooled down to at most this many before the affinity step
    pub max_frames: usize,

    /// Frequency range folded into the chroma vector
    pub chroma_min_hz: f32,
    pub chroma_max_hz: f32,

    pub mel_bands: usize,
    pub mfcc_count: usize,

    /// Lower bound on the affinity bandwidth (feature-space distance)
    pub bandwidth_floor: f64,

    /// Raw novelty below this everywhere means no boundaries at all
    pub novelty_floor: f64,

    /// Peak threshold = mean + factor * std of the normalized novelty curve
    pub threshold_std_factor: f64,

    /// Minimum seconds between boundary peaks
    pub min_peak_separation: f64,

    /// First/last spans shorter than these become intro/outro
    pub intro_max_duration: f64,
    pub outro_max_duration: f64,

    /// chorus: energy > median + chorus_std_factor * std
    pub chorus_std_factor: f64,

    /// bridge: energy < median - bridge_std_factor * std
    pub bridge_std_factor: f64,

    pub epsilon: f64,

    /// Peak frame RMS at or below this counts as silence
    pub silence_rms: f32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        SegmentationConfig {
            window_size: 2048,
            hop_size: 512,
            max_frames: 2000,
            chroma_min_hz: 55.0,
            chroma_max_hz: 5000.0,
            mel_bands: 40,
            mfcc_count: 13,
            bandwidth_floor: 0.1,
            novelty_floor: 0.01,
            threshold_std_factor: 0.5,
            min_peak_separation: 4.0,
            intro_max_duration: 15.0,
            outro_max_duration: 15.0,
            chorus_std_factor: 0.5,
            bridge_std_factor: 0.3,
            epsilon: 1e-10,
            silence_rms: 1e-5,
        }
    }
}

/// Sections plus the intermediate curves, kept for tracing and inspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationResult {
    pub sections: Vec<Section>,

    /// Final boundaries including 0 and the track duration
    pub boundaries: Vec<f64>,

    /// Normalized novelty; entry t sits between analysis frames t and t+1
    pub novelty: Vec<f64>,

    pub threshold: f64,

    /// Seconds per analysis frame after pooling
    pub frame_duration: f64,

    pub total_duration: f64,

    /// True when the track was silent and fell back to one section
    pub degenerate: bool,
}

/// Split a mono signal into labeled sections covering [0, duration]
pub fn segment(
    mono: &[f32],
    sample_rate: u32,
    grid: &BeatGrid,
    config: &SegmentationConfig,
) -> Result<SegmentationResult, SegmentationError> {
    if sample_rate == 0 {
        return Err(SegmentationError::InvalidSampleRate(sample_rate));
    }
    if mono.is_empty() {
        return Err(SegmentationError::DegenerateInput("zero-length audio".into()));
    }

    let total_duration = mono.len() as f64 / sample_rate as f64;
    let features = extract_frame_features(mono, sample_rate, config);

    let peak_rms = features.rms.iter().cloned().fold(0.0f32, f32::max);
    if peak_rms <= config.silence_rms {
        log::warn!(
            "Silent input ({:.1}s), falling back to a single section",
            total_duration
        );
        return Ok(SegmentationResult {
            sections: vec![Section::new(
                SectionKind::Verse.as_str(),
                0.0,
                total_duration,
                0.0,
                0.0,
            )],
            boundaries: vec![0.0, total_duration],
            novelty: Vec::new(),
            threshold: 0.0,
            frame_duration: features.frame_duration,
            total_duration,
            degenerate: true,
        });
    }

    let (novelty, threshold, peak_times) = find_boundary_peaks(&features, sample_rate, config);
    let boundaries = snap_boundaries(&peak_times, grid, total_duration);
    let sections = label_spans(&boundaries, &features, config);

    log::debug!(
        "Segmentation: {} frames ({:.3}s each), {} peaks, {} sections",
        features.frame_count(),
        features.frame_duration,
        peak_times.len(),
        sections.len()
    );

    Ok(SegmentationResult {
        sections,
        boundaries,
        novelty,
        threshold,
        frame_duration: features.frame_duration,
        total_duration,
        degenerate: false,
    })
}

/// Novelty peaks as times in seconds, with the normalized curve and threshold used
fn find_boundary_peaks(
    features: &FrameFeatures,
    sample_rate: u32,
    config: &SegmentationConfig,
) -> (Vec<f64>, f64, Vec<f64>) {
    if features.frame_count() < 2 {
        return (Vec::new(), 0.0, Vec::new());
    }

    let affinity = affinity_matrix(&features.matrix, config.bandwidth_floor);
    let raw = novelty_curve(&affinity);
    let novelty = normalize_curve(&raw, config.epsilon);
    let threshold = adaptive_threshold(&novelty, config.threshold_std_factor);

    let raw_max = raw.iter().cloned().fold(0.0f64, f64::max);
    if raw_max < config.novelty_floor {
        return (novelty, threshold, Vec::new());
    }

    let distance = (config.min_peak_separation / features.frame_duration).ceil().max(1.0) as usize;
    // Entry t compares frames t and t+1; the change sits between their window centres
    let centre_offset = (config.window_size as f64 - config.hop_size as f64) / (2.0 * sample_rate as f64);

    let times = pick_peaks(&novelty, threshold, distance)
        .into_iter()
        .map(|t| (t + 1) as f64 * features.frame_duration + centre_offset)
        .collect();

    (novelty, threshold, times)
}

/// {0, peaks.., duration} with interior points snapped to beats, deduplicated and sorted
pub fn snap_boundaries(peak_times: &[f64], grid: &BeatGrid, total_duration: f64) -> Vec<f64> {
    let mut interior: Vec<f64> = peak_times
        .iter()
        .map(|&t| grid.nearest_beat(t).unwrap_or(t))
        .filter(|&t| t > BOUNDARY_TOLERANCE && t < total_duration - BOUNDARY_TOLERANCE)
        .collect();

    interior.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    interior.dedup_by(|a, b| (*a - *b).abs() <= BOUNDARY_TOLERANCE);

    let mut boundaries = Vec::with_capacity(interior.len() + 2);
    boundaries.push(0.0);
    boundaries.extend(interior);
    boundaries.push(total_duration);
    boundaries
}

/// Mean hop RMS across [start, end); a span narrower than one hop reads one value
fn span_energy(features: &FrameFeatures, start: f64, end: f64) -> f64 {
    let rms = &features.rms;
    if rms.is_empty() || features.rms_hop_duration <= 0.0 {
        return 0.0;
    }

    let first = ((start / features.rms_hop_duration).floor() as usize).min(rms.len() - 1);
    let last = ((end / features.rms_hop_duration).floor() as usize).min(rms.len());
    let last = last.max(first + 1);

    let frames = &rms[first..last];
    frames.iter().map(|&v| v as f64).sum::<f64>() / frames.len() as f64
}

fn label_spans(boundaries: &[f64], features: &FrameFeatures, config: &SegmentationConfig) -> Vec<Section> {
    let spans: Vec<(f64, f64)> = boundaries.windows(2).map(|w| (w[0], w[1])).collect();
    let energies: Vec<f64> = spans
        .iter()
        .map(|&(start, end)| span_energy(features, start, end))
        .collect();
    let stats = energy_stats(&energies);

    let kinds: Vec<&str> = spans
        .iter()
        .zip(energies.iter())
        .enumerate()
        .map(|(index, (&(start, end), &energy))| {
            let context = SpanContext {
                index,
                count: spans.len(),
                duration: end - start,
                energy,
            };
            classify_span(&context, &stats, config).as_str()
        })
        .collect();

    disambiguate(&kinds)
        .into_iter()
        .zip(spans.iter().zip(energies.iter()))
        .map(|(label, (&(start, end), &energy))| {
            let confidence = label_confidence(energy, &stats, config.epsilon);
            Section::new(label, start, end, confidence, energy)
        })
        .collect()
}

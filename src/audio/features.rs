// Spectral framing and onset detection
// Short-time magnitude spectra shared by the beat oracle and the segmenter,
// plus Spectral Flux onset detection

use realfft::{RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Onset detection result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Onset {
    /// Time in seconds from start of audio
    pub time: f64,

    /// Onset strength/confidence [0.0, 1.0]
    pub strength: f32,
}

/// Configuration for onset detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    /// FFT window size in samples (power of 2)
    pub window_size: usize,

    /// Hop size in samples (advance between frames)
    pub hop_size: usize,

    /// Threshold multiplier for adaptive peak picking
    /// Threshold = mean(flux) + threshold_factor * std(flux)
    pub threshold_factor: f32,

    /// Minimum time between onsets in seconds
    pub min_onset_gap: f64,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        OnsetConfig {
            window_size: 2048,
            hop_size: 512,
            threshold_factor: 1.5,
            min_onset_gap: 0.05,
        }
    }
}

/// Reusable forward FFT of a fixed window size with a Hann window
pub struct SpectralFrames {
    window_size: usize,
    hop_size: usize,
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
}

impl SpectralFrames {
    pub fn new(window_size: usize, hop_size: usize) -> Self {
        let window_size = window_size.max(2);
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);

        let mut window = vec![1.0; window_size];
        apply_hann_window(&mut window);

        SpectralFrames {
            window_size,
            hop_size: hop_size.max(1),
            window,
            fft,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Number of magnitude bins per frame (N/2 + 1)
    pub fn bin_count(&self) -> usize {
        self.window_size / 2 + 1
    }

    /// Number of whole windows that fit in a signal of `len` samples.
    /// A signal shorter than one window still yields a single zero-padded frame.
    pub fn frame_count(&self, len: usize) -> usize {
        if len == 0 {
            0
        } else if len <= self.window_size {
            1
        } else {
            1 + (len - self.window_size) / self.hop_size
        }
    }

    /// Hann-windowed magnitude spectrum of the frame starting at `start`
    pub fn magnitude_at(&self, samples: &[f32], start: usize) -> Vec<f32> {
        let mut input = vec![0.0f32; self.window_size];
        if start < samples.len() {
            let end = (start + self.window_size).min(samples.len());
            input[..end - start].copy_from_slice(&samples[start..end]);
        }
        for (x, w) in input.iter_mut().zip(self.window.iter()) {
            *x *= w;
        }

        let mut spectrum = self.fft.make_output_vec();
        if self.fft.process(&mut input, &mut spectrum).is_err() {
            return vec![0.0; self.bin_count()];
        }

        spectrum.iter().map(|c| c.norm()).collect()
    }

    /// Magnitude spectra for every hop across the signal
    pub fn magnitudes(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        (0..self.frame_count(samples.len()))
            .map(|i| self.magnitude_at(samples, i * self.hop_size))
            .collect()
    }
}

/// Apply Hann window function to reduce spectral leakage
pub fn apply_hann_window(samples: &mut [f32]) {
    let n = samples.len();
    if n == 0 {
        return;
    }

    for (i, sample) in samples.iter_mut().enumerate() {
        let window_val = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos());
        *sample *= window_val;
    }
}

/// Root-mean-square energy for each hop-aligned frame of `window_size` samples
pub fn frame_rms(samples: &[f32], window_size: usize, hop_size: usize) -> Vec<f32> {
    if samples.is_empty() || hop_size == 0 {
        return Vec::new();
    }

    let frames = (samples.len() + hop_size - 1) / hop_size;
    (0..frames)
        .map(|i| {
            let start = i * hop_size;
            let end = (start + window_size).min(samples.len());
            let frame = &samples[start..end];
            if frame.is_empty() {
                return 0.0;
            }
            let sum_squares: f32 = frame.iter().map(|s| s * s).sum();
            (sum_squares / frame.len() as f32).sqrt()
        })
        .collect()
}

/// Detect onsets in a mono signal using Spectral Flux
pub fn detect_onsets(mono: &[f32], sample_rate: u32, config: &OnsetConfig) -> Vec<Onset> {
    if mono.is_empty() || sample_rate == 0 {
        return Vec::new();
    }

    let flux = compute_spectral_flux(mono, config);
    if flux.is_empty() {
        return Vec::new();
    }

    pick_onset_peaks(&flux, sample_rate, config)
}

/// Spectral flux = sum of positive differences between consecutive magnitude spectra
fn compute_spectral_flux(samples: &[f32], config: &OnsetConfig) -> Vec<f32> {
    if samples.len() < config.window_size || config.hop_size == 0 {
        return Vec::new();
    }

    let frames = SpectralFrames::new(config.window_size, config.hop_size);
    let num_frames = (samples.len() - config.window_size) / config.hop_size + 1;

    let mut flux = Vec::with_capacity(num_frames);
    let mut prev_spectrum: Option<Vec<f32>> = None;

    for frame_idx in 0..num_frames {
        let spectrum = frames.magnitude_at(samples, frame_idx * config.hop_size);

        let frame_flux = match prev_spectrum {
            Some(ref prev) => spectrum
                .iter()
                .zip(prev.iter())
                .map(|(curr, prev)| (curr - prev).max(0.0))
                .sum(),
            None => 0.0,
        };

        flux.push(frame_flux);
        prev_spectrum = Some(spectrum);
    }

    flux
}

/// Pick onset peaks from spectral flux using adaptive threshold
fn pick_onset_peaks(flux: &[f32], sample_rate: u32, config: &OnsetConfig) -> Vec<Onset> {
    if flux.len() < 3 {
        return Vec::new();
    }

    let mean = flux.iter().sum::<f32>() / flux.len() as f32;
    let variance = flux.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / flux.len() as f32;
    let std_dev = variance.sqrt();
    let threshold = mean + config.threshold_factor * std_dev;

    let hop_secs = config.hop_size as f64 / sample_rate as f64;
    let min_gap_frames = (config.min_onset_gap / hop_secs).ceil() as usize;

    let mut onsets = Vec::new();
    let mut last_onset_frame: Option<usize> = None;

    for i in 1..flux.len() - 1 {
        let is_peak = flux[i] > flux[i - 1] && flux[i] >= flux[i + 1];
        let above_threshold = flux[i] > threshold;
        let gap_ok = last_onset_frame.map_or(true, |last| i - last >= min_gap_frames);

        if is_peak && above_threshold && gap_ok {
            // 1e-6 keeps flat flux from dividing by zero
            let strength = (flux[i] - threshold) / (std_dev + 1e-6);

            onsets.push(Onset {
                time: i as f64 * hop_secs,
                strength: strength.clamp(0.0, 1.0),
            });

            last_onset_frame = Some(i);
        }
    }

    onsets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_track(sample_rate: u32, seconds: f64, interval: f64) -> Vec<f32> {
        let len = (sample_rate as f64 * seconds) as usize;
        let mut samples = vec![0.0f32; len];
        let mut t = 0.25;
        while t < seconds {
            let start = (t * sample_rate as f64) as usize;
            for i in 0..400 {
                if start + i < len {
                    // Decaying noise-like burst
                    let phase = (i as f32 * 1.7).sin() * (i as f32 * 0.31).cos();
                    samples[start + i] = phase * (1.0 - i as f32 / 400.0);
                }
            }
            t += interval;
        }
        samples
    }

    #[test]
    fn test_hann_window() {
        let mut samples = vec![1.0; 100];
        apply_hann_window(&mut samples);

        assert!(samples[0] < 0.1);
        assert!(samples[99] < 0.1);
        assert!(samples[50] > 0.9);
    }

    #[test]
    fn test_frame_count_whole_windows() {
        let frames = SpectralFrames::new(1024, 256);
        assert_eq!(frames.frame_count(0), 0);
        assert_eq!(frames.frame_count(1), 1);
        assert_eq!(frames.frame_count(1024), 1);
        assert_eq!(frames.frame_count(1280), 2);
        assert_eq!(frames.frame_count(1279), 1);
        assert_eq!(frames.bin_count(), 513);
    }

    #[test]
    fn test_magnitude_peak_at_sine_bin() {
        let sample_rate = 8000.0;
        let window = 1024;
        // Frequency exactly on bin 64
        let freq = 64.0 * sample_rate / window as f32;
        let samples: Vec<f32> = (0..window)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect();

        let frames = SpectralFrames::new(window, 512);
        let spectrum = frames.magnitude_at(&samples, 0);
        let (peak_bin, _) = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert_eq!(peak_bin, 64);
    }

    #[test]
    fn test_frame_rms() {
        let samples = vec![0.5f32; 1000];
        let rms = frame_rms(&samples, 256, 256);
        assert_eq!(rms.len(), 4);
        assert!(rms.iter().all(|&r| (r - 0.5).abs() < 1e-6));

        assert!(frame_rms(&[], 256, 256).is_empty());
    }

    #[test]
    fn test_onset_detection_empty() {
        let onsets = detect_onsets(&[], 44100, &OnsetConfig::default());
        assert!(onsets.is_empty());
    }

    #[test]
    fn test_onset_detection_finds_clicks() {
        let sample_rate = 22050;
        let samples = click_track(sample_rate, 4.0, 0.5);
        let onsets = detect_onsets(&samples, sample_rate, &OnsetConfig::default());

        // Eight clicks; allow for edge effects
        assert!(onsets.len() >= 5, "found {} onsets", onsets.len());
        for pair in onsets.windows(2) {
            assert!(pair[1].time > pair[0].time);
        }
    }
}

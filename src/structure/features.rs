// Frame-level harmonic and timbral features for structure analysis
// Chroma (pitch-class energy) stacked with MFCCs; each block and then the whole
// column is L2-normalized per frame

use ndarray::{s, Array1, Array2, Axis};
use std::f32::consts::PI;

use crate::audio::features::{frame_rms, SpectralFrames};
use crate::structure::segmenter::SegmentationConfig;

/// Per-frame feature matrix plus the frame energies used for labeling
#[derive(Debug, Clone)]
pub struct FrameFeatures {
    /// One row per (pooled) analysis frame: [chroma | mfcc], unit norm or zero
    pub matrix: Array2<f32>,

    /// Seconds between consecutive rows of `matrix`
    pub frame_duration: f64,

    /// RMS energy for every hop of the signal (not pooled)
    pub rms: Vec<f32>,

    /// Seconds between consecutive `rms` values
    pub rms_hop_duration: f64,
}

impl FrameFeatures {
    pub fn frame_count(&self) -> usize {
        self.matrix.nrows()
    }
}

/// Compute stacked chroma/MFCC features for a mono signal
pub fn extract_frame_features(
    mono: &[f32],
    sample_rate: u32,
    config: &SegmentationConfig,
) -> FrameFeatures {
    let frames = SpectralFrames::new(config.window_size, config.hop_size);
    let spectra = frames.magnitudes(mono);

    let chroma_map = chroma_bin_map(
        frames.window_size(),
        sample_rate,
        config.chroma_min_hz,
        config.chroma_max_hz,
    );
    let mel_bank = mel_filterbank(config.mel_bands, frames.window_size(), sample_rate);
    let dct = compute_dct_matrix(config.mel_bands, config.mfcc_count);

    let dims = 12 + config.mfcc_count;
    let mut matrix = Array2::<f32>::zeros((spectra.len(), dims));

    for (t, spectrum) in spectra.iter().enumerate() {
        let power = Array1::from_iter(spectrum.iter().map(|m| m * m));

        let mut chroma = chroma_from_power(&power, &chroma_map);
        let mut mfcc = mfcc_from_power(&power, &mel_bank, &dct);

        l2_normalize(chroma.view_mut());
        l2_normalize(mfcc.view_mut());

        let mut row = matrix.row_mut(t);
        row.slice_mut(s![..12]).assign(&chroma);
        row.slice_mut(s![12..]).assign(&mfcc);
        l2_normalize(row);
    }

    let hop_duration = frames.hop_size() as f64 / sample_rate as f64;
    let (matrix, pool) = pool_frames(matrix, config.max_frames);

    FrameFeatures {
        matrix,
        frame_duration: hop_duration * pool as f64,
        rms: frame_rms(mono, frames.window_size(), frames.hop_size()),
        rms_hop_duration: hop_duration,
    }
}

/// Pitch class (C = 0) for each FFT bin, None outside the chroma range
fn chroma_bin_map(window_size: usize, sample_rate: u32, min_hz: f32, max_hz: f32) -> Vec<Option<usize>> {
    let bins = window_size / 2 + 1;
    let bin_width = sample_rate as f32 / window_size as f32;
    let max_hz = max_hz.min(sample_rate as f32 / 2.0);

    (0..bins)
        .map(|k| {
            let freq = k as f32 * bin_width;
            if freq < min_hz || freq > max_hz {
                return None;
            }
            let midi = 69.0 + 12.0 * (freq / 440.0).log2();
            Some((midi.round() as i64).rem_euclid(12) as usize)
        })
        .collect()
}

fn chroma_from_power(power: &Array1<f32>, map: &[Option<usize>]) -> Array1<f32> {
    let mut chroma = Array1::<f32>::zeros(12);
    for (p, class) in power.iter().zip(map.iter()) {
        if let Some(c) = class {
            chroma[*c] += p;
        }
    }
    // Log compress
    chroma.mapv_inplace(|x| (1.0 + x).ln());
    chroma
}

fn mfcc_from_power(power: &Array1<f32>, mel_bank: &Array2<f32>, dct: &Array2<f32>) -> Array1<f32> {
    let mel = mel_bank.dot(power);
    // Clamp 60 dB below the loudest band so round-off in empty bands stays flat
    let peak = mel.fold(0.0f32, |m, &x| m.max(x));
    let floor = peak * 1e-6 + 1e-10;
    let log_mel = mel.mapv(|x| x.max(floor).ln());
    dct.dot(&log_mel)
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank, shape (bands, fft bins)
fn mel_filterbank(bands: usize, window_size: usize, sample_rate: u32) -> Array2<f32> {
    let bins = window_size / 2 + 1;
    let bin_width = sample_rate as f32 / window_size as f32;
    let max_mel = hz_to_mel(sample_rate as f32 / 2.0);

    let edges: Vec<f32> = (0..bands + 2)
        .map(|i| mel_to_hz(max_mel * i as f32 / (bands + 1) as f32))
        .collect();

    let mut bank = Array2::<f32>::zeros((bands, bins));
    for b in 0..bands {
        let (lower, centre, upper) = (edges[b], edges[b + 1], edges[b + 2]);
        for k in 0..bins {
            let freq = k as f32 * bin_width;
            let weight = if freq > lower && freq <= centre {
                (freq - lower) / (centre - lower)
            } else if freq > centre && freq < upper {
                (upper - freq) / (upper - centre)
            } else {
                0.0
            };
            bank[[b, k]] = weight;
        }
    }
    bank
}

/// Orthonormal type-II DCT, keeping the first `k` coefficients of `n` inputs
fn compute_dct_matrix(n: usize, k: usize) -> Array2<f32> {
    let mut matrix = Array2::<f32>::zeros((k, n));
    let scale = (2.0 / n as f32).sqrt();

    for i in 0..k {
        let s = if i == 0 { (0.5f32).sqrt() } else { 1.0 };
        for j in 0..n {
            let v = (PI / n as f32 * (j as f32 + 0.5) * i as f32).cos();
            matrix[[i, j]] = scale * s * v;
        }
    }
    matrix
}

fn l2_normalize(mut v: ndarray::ArrayViewMut1<f32>) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        v.mapv_inplace(|x| x / norm);
    } else {
        v.fill(0.0);
    }
}

/// Mean-pool consecutive rows so at most `max_frames` remain, renormalizing each row.
/// Returns the pooled matrix and the pooling factor.
fn pool_frames(matrix: Array2<f32>, max_frames: usize) -> (Array2<f32>, usize) {
    let n = matrix.nrows();
    let max_frames = max_frames.max(1);
    if n <= max_frames {
        return (matrix, 1);
    }

    let pool = (n + max_frames - 1) / max_frames;
    let pooled_rows = n / pool;
    let mut pooled = Array2::<f32>::zeros((pooled_rows, matrix.ncols()));

    for (i, mut row) in pooled.axis_iter_mut(Axis(0)).enumerate() {
        let block = matrix.slice(s![i * pool..(i + 1) * pool, ..]);
        if let Some(mean) = block.mean_axis(Axis(0)) {
            row.assign(&mean);
        }
        l2_normalize(row);
    }

    (pooled, pool)
}

// Audio ingestion module
// Reads WAV files into interleaved f32 buffers with their metadata

use hound::{SampleFormat, WavReader};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to read WAV file: {0}")]
    WavReadError(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid audio data")]
    InvalidData,
}

#[derive(Debug, Clone)]
pub struct AudioData {
    /// Interleaved samples normalized to f32 in range [-1.0, 1.0]
    pub samples: Vec<f32>,

    /// Sample rate in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Bit depth of original audio (8, 16, 24, 32)
    pub bit_depth: u16,

    /// Duration in milliseconds
    pub duration_ms: i64,

    /// Total number of frames (samples / channels)
    pub frame_count: usize,
}

impl AudioData {
    /// Build from interleaved samples, deriving frame count and duration
    pub fn from_interleaved(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let frame_count = samples.len() / channels as usize;
        let duration_ms = if sample_rate > 0 {
            (frame_count as f64 * 1000.0 / sample_rate as f64) as i64
        } else {
            0
        };

        AudioData {
            samples,
            sample_rate,
            channels,
            bit_depth: 32,
            duration_ms,
            frame_count,
        }
    }

    /// Exact duration in seconds, derived from the frame count
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count as f64 / self.sample_rate as f64
    }

    /// Convert to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels == 1 {
            return self.samples.clone();
        }

        let mut mono = Vec::with_capacity(self.frame_count);
        let channels = self.channels as usize;

        for frame_idx in 0..self.frame_count {
            let mut sum = 0.0;
            for ch in 0..channels {
                sum += self.samples[frame_idx * channels + ch];
            }
            mono.push(sum / channels as f32);
        }

        mono
    }

    /// Interleaved samples for the frame range [start_frame, end_frame)
    /// Out-of-range bounds are clamped to the buffer
    pub fn frames(&self, start_frame: usize, end_frame: usize) -> &[f32] {
        let channels = self.channels as usize;
        let end = end_frame.min(self.frame_count);
        let start = start_frame.min(end);
        &self.samples[start * channels..end * channels]
    }
}

/// Load and decode a WAV file from disk
pub fn load_wav(path: &Path) -> Result<(AudioData, Vec<u8>), AudioError> {
    let bytes = std::fs::read(path)?;
    let audio = ingest_wav(&bytes)?;
    Ok((audio, bytes))
}

/// Ingest a WAV file from raw bytes
/// Returns AudioData with normalized samples and metadata
pub fn ingest_wav(data: &[u8]) -> Result<AudioData, AudioError> {
    let cursor = Cursor::new(data);
    let mut reader = WavReader::new(cursor)?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels;
    let bit_depth = spec.bits_per_sample;
    let sample_format = spec.sample_format;

    if channels == 0 || sample_rate == 0 {
        return Err(AudioError::InvalidData);
    }

    // Read and normalize samples to f32 [-1.0, 1.0]
    let samples: Vec<f32> = match (sample_format, bit_depth) {
        (SampleFormat::Int, 8) => {
            // hound yields 8-bit samples already centred on zero
            reader
                .samples::<i8>()
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .map(|s| s as f32 / 128.0)
                .collect()
        }
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 32768.0)
            .collect(),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 8388608.0)
            .collect(),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 2147483648.0)
            .collect(),
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?} {}-bit audio",
                sample_format, bit_depth
            )));
        }
    };

    let mut audio = AudioData::from_interleaved(samples, sample_rate, channels);
    audio.bit_depth = bit_depth;

    Ok(audio)
}

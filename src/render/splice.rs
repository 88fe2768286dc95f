// Section splicing
// Cuts each section's source range out of the original recording, fades the
// edges and lays the clips end to end on the output timeline

use hound::{SampleFormat, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

use crate::audio::AudioData;
use crate::structure::Section;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("WAV encode error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::state::storage::StorageError),
}

/// Sample encoding for exported clips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Int16,
    Float32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Edge fade length in seconds
    pub fade_duration: f64,

    /// Upper bound on the fade length in samples
    pub fade_max_samples: usize,

    pub output_format: OutputFormat,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            fade_duration: 0.01,
            fade_max_samples: 512,
            output_format: OutputFormat::Int16,
        }
    }
}

impl RenderConfig {
    /// Fade length in frames for a given sample rate
    pub fn fade_frames(&self, sample_rate: u32) -> usize {
        ((sample_rate as f64 * self.fade_duration) as usize).min(self.fade_max_samples)
    }
}

/// Interleaved audio owned by one clip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl ClipAudio {
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn to_wav_bytes(&self, format: OutputFormat) -> Result<Vec<u8>, RenderError> {
        let spec = WavSpec {
            channels: self.channels.max(1),
            sample_rate: self.sample_rate,
            bits_per_sample: match format {
                OutputFormat::Int16 => 16,
                OutputFormat::Float32 => 32,
            },
            sample_format: match format {
                OutputFormat::Int16 => SampleFormat::Int,
                OutputFormat::Float32 => SampleFormat::Float,
            },
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for &sample in &self.samples {
                match format {
                    OutputFormat::Int16 => {
                        writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16)?
                    }
                    OutputFormat::Float32 => writer.write_sample(sample)?,
                }
            }
            writer.finalize()?;
        }

        Ok(cursor.into_inner())
    }
}

/// One spliced section ready for placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedClip {
    /// Position in the output order
    pub index: usize,
    pub label: String,

    /// Range of the original recording this clip was cut from
    pub source_start: f64,
    pub source_end: f64,

    /// Offset of the clip on the output timeline, in seconds
    pub timeline_position: f64,

    /// Rendered length in seconds (frames / sample rate)
    pub duration: f64,

    #[serde(skip)]
    pub audio: ClipAudio,
}

/// A section that produced no audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSkip {
    pub index: usize,
    pub label: String,
    pub source_start: f64,
    pub source_end: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderReport {
    pub clips: Vec<RenderedClip>,
    pub skipped: Vec<RenderSkip>,

    /// Timeline offset of the first clip
    pub start_offset: f64,

    /// Sum of clip durations
    pub total_duration: f64,
}

impl RenderReport {
    /// Timeline position just past the last clip
    pub fn end_offset(&self) -> f64 {
        self.start_offset + self.total_duration
    }
}

/// Seconds -> frame index, clamped to the recording
fn to_frame(seconds: f64, sample_rate: u32, frame_count: usize) -> usize {
    if !(seconds > 0.0) {
        return 0;
    }
    ((seconds * sample_rate as f64).floor() as usize).min(frame_count)
}

/// Cut every section out of `audio` in order. Empty slices are skipped and reported.
pub fn render_sections(
    sections: &[Section],
    audio: &AudioData,
    start_offset: f64,
    config: &RenderConfig,
) -> RenderReport {
    let fade = config.fade_frames(audio.sample_rate);
    let mut clips = Vec::with_capacity(sections.len());
    let mut skipped = Vec::new();
    let mut offset = start_offset;

    for (index, section) in sections.iter().enumerate() {
        let start = to_frame(section.source_start, audio.sample_rate, audio.frame_count);
        let end = to_frame(section.source_end, audio.sample_rate, audio.frame_count);

        if end <= start || audio.sample_rate == 0 {
            log::warn!(
                "Skipping section {} ({}): {:.3}-{:.3}s is empty within the {:.3}s recording",
                index,
                section.label,
                section.source_start,
                section.source_end,
                audio.duration_secs()
            );
            skipped.push(RenderSkip {
                index,
                label: section.label.clone(),
                source_start: section.source_start,
                source_end: section.source_end,
                reason: format!("empty sample range {}..{}", start, end),
            });
            continue;
        }

        let mut samples = audio.frames(start, end).to_vec();
        let frames = end - start;
        if fade > 0 && frames > 2 * fade {
            apply_edge_fades(&mut samples, audio.channels as usize, fade);
        }

        let duration = frames as f64 / audio.sample_rate as f64;
        clips.push(RenderedClip {
            index: clips.len(),
            label: section.label.clone(),
            source_start: section.source_start,
            source_end: section.source_end,
            timeline_position: offset,
            duration,
            audio: ClipAudio {
                samples,
                sample_rate: audio.sample_rate,
                channels: audio.channels,
            },
        });
        offset += duration;
    }

    log::info!(
        "Rendered {} clips ({} skipped), {:.3}s total",
        clips.len(),
        skipped.len(),
        offset - start_offset
    );

    RenderReport {
        clips,
        skipped,
        start_offset,
        total_duration: offset - start_offset,
    }
}

/// Linear ramps over the first and last `fade` frames, gain i / (fade - 1)
pub fn apply_edge_fades(samples: &mut [f32], channels: usize, fade: usize) {
    let channels = channels.max(1);
    let frames = samples.len() / channels;
    if fade == 0 || frames < 2 * fade {
        return;
    }

    for i in 0..fade {
        let gain = if fade > 1 {
            i as f32 / (fade - 1) as f32
        } else {
            0.0
        };
        let head = i * channels;
        let tail = (frames - 1 - i) * channels;
        for ch in 0..channels {
            samples[head + ch] *= gain;
            samples[tail + ch] *= gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_audio(seconds: usize, sample_rate: u32, channels: u16) -> AudioData {
        let frames = seconds * sample_rate as usize;
        AudioData::from_interleaved(vec![0.5; frames * channels as usize], sample_rate, channels)
    }

    fn ramp_audio(seconds: usize, sample_rate: u32) -> AudioData {
        // Sample value encodes its own time so slices can be checked
        let frames = seconds * sample_rate as usize;
        let samples = (0..frames).map(|i| i as f32 / frames as f32).collect();
        AudioData::from_interleaved(samples, sample_rate, 1)
    }

    fn scenario_sections() -> Vec<Section> {
        vec![
            Section::new("intro", 0.0, 8.0, 0.9, 0.1),
            Section::new("verse", 8.0, 20.0, 0.6, 0.3),
            Section::new("chorus", 20.0, 32.0, 1.0, 0.9),
            Section::new("chorus_copy", 20.0, 32.0, 1.0, 0.9),
            Section::new("outro", 32.0, 40.0, 0.9, 0.1),
        ]
    }

    #[test]
    fn test_clips_follow_source_ranges() {
        let audio = ramp_audio(40, 1000);
        let report = render_sections(&scenario_sections(), &audio, 0.0, &RenderConfig::default());

        assert_eq!(report.clips.len(), 5);
        assert!(report.skipped.is_empty());
        for clip in &report.clips[2..4] {
            assert_eq!((clip.source_start, clip.source_end), (20.0, 32.0));
            assert_eq!(clip.audio.frame_count(), 12_000);
            // Past the fade, the audio comes from 20s into the source
            assert!((clip.audio.samples[100] - 20_100.0 / 40_000.0).abs() < 1e-6);
        }
        assert!((report.total_duration - 52.0).abs() < 1e-9);
    }

    #[test]
    fn test_timeline_positions_are_contiguous_from_offset() {
        let audio = constant_audio(40, 1000, 1);
        let report = render_sections(&scenario_sections(), &audio, 3.0, &RenderConfig::default());

        assert_eq!(report.clips[0].timeline_position, 3.0);
        for pair in report.clips.windows(2) {
            let expected = pair[0].timeline_position + pair[0].duration;
            assert!((pair[1].timeline_position - expected).abs() < 1e-9);
            assert!(pair[1].timeline_position > pair[0].timeline_position);
        }
        assert!((report.end_offset() - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_section_is_skipped() {
        let audio = constant_audio(10, 1000, 1);
        let sections = vec![
            Section::new("verse", 0.0, 10.0, 0.5, 0.2),
            Section::new("verse_copy", 12.0, 20.0, 0.5, 0.2),
        ];
        let report = render_sections(&sections, &audio, 0.0, &RenderConfig::default());

        assert_eq!(report.clips.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(report.skipped[0].label, "verse_copy");
    }

    #[test]
    fn test_section_past_end_is_clamped() {
        let audio = constant_audio(10, 1000, 1);
        let sections = vec![Section::new("outro", 8.0, 14.0, 0.5, 0.2)];
        let report = render_sections(&sections, &audio, 0.0, &RenderConfig::default());

        assert_eq!(report.clips.len(), 1);
        assert!((report.clips[0].duration - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_fades_at_edges() {
        let audio = constant_audio(1, 44100, 2);
        let sections = vec![Section::new("verse", 0.0, 1.0, 0.5, 0.2)];
        let report = render_sections(&sections, &audio, 0.0, &RenderConfig::default());
        let samples = &report.clips[0].audio.samples;

        // 10ms at 44.1kHz = 441 frames, under the 512 cap
        assert_eq!(RenderConfig::default().fade_frames(44100), 441);
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[1], 0.0);
        assert!((samples[440 * 2] - 0.5).abs() < 1e-6);
        assert!((samples[1000 * 2] - 0.5).abs() < 1e-6);
        assert_eq!(samples[samples.len() - 1], 0.0);
    }

    #[test]
    fn test_fade_cap() {
        assert_eq!(RenderConfig::default().fade_frames(96000), 512);
    }

    #[test]
    fn test_short_slice_is_not_faded() {
        let audio = constant_audio(1, 1000, 1);
        // 10 frames, fade would be 10
        let sections = vec![Section::new("blip", 0.0, 0.01, 0.5, 0.2)];
        let report = render_sections(&sections, &audio, 0.0, &RenderConfig::default());
        assert!(report.clips[0].audio.samples.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_wav_bytes_round_trip_through_ingest() {
        let clip = ClipAudio {
            samples: vec![0.0, 0.25, -0.25, 0.5],
            sample_rate: 8000,
            channels: 2,
        };
        let bytes = clip.to_wav_bytes(OutputFormat::Float32).unwrap();
        let decoded = crate::audio::ingest_wav(&bytes).unwrap();

        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.frame_count, 2);
        assert_eq!(decoded.samples, clip.samples);
    }
}

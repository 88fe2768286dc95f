// Temporal arranger
// analyze: waveform -> Arrangement
// rearrange: waveform + instruction -> Operation -> new section order -> rendered clips

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::{AudioData, AudioError};
use crate::config::ArrangerConfig;
use crate::edit::{self, EditError, Operation, PlacedSection};
use crate::groove::{BeatOracle, FixedTempo, OnsetBeatTracker, OracleError};
use crate::pipeline::trace::{Stage, Tracer};
use crate::render::{
    place_clips, render_sections, ClipExporter, EngineError, PlacementReport, PlaybackEngine,
    RenderReport,
};
use crate::structure::{segment, Arrangement, SegmentationError};

#[derive(Debug, Error)]
pub enum ArrangerError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Beat tracking error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Segmentation error: {0}")]
    Segmentation(#[from] SegmentationError),

    #[error("Invalid arrangement: {0}")]
    InvalidArrangement(String),

    /// Carries the parsed operation so callers can show what was attempted
    #[error("Cannot apply {operation}: {source}")]
    Edit {
        operation: Operation,
        source: EditError,
    },

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Everything one rearrange call produced, before engine placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rearrangement {
    pub original_arrangement: Arrangement,
    pub operation: Operation,

    /// New order with timeline positions from 0
    pub new_sections: Vec<PlacedSection>,

    /// Timeline positions and source slices are tracked separately
    pub distinct_coordinates: bool,

    pub rendered: RenderReport,
}

pub struct TemporalArranger {
    config: ArrangerConfig,
    oracle: Box<dyn BeatOracle>,
    tracer: Tracer,
}

impl TemporalArranger {
    pub fn new(config: ArrangerConfig, oracle: Box<dyn BeatOracle>) -> Self {
        TemporalArranger {
            config,
            oracle,
            tracer: Tracer::disabled(),
        }
    }

    /// Built-in onset tracker, or a fixed grid when the tempo is known
    pub fn with_default_oracle(config: ArrangerConfig, bpm: Option<f64>) -> Self {
        let oracle: Box<dyn BeatOracle> = match bpm {
            Some(bpm) => Box::new(FixedTempo::new(bpm)),
            None => Box::new(OnsetBeatTracker::new(
                config.onset.clone(),
                config.tempo.clone(),
            )),
        };
        Self::new(config, oracle)
    }

    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn config(&self) -> &ArrangerConfig {
        &self.config
    }

    /// Discover the sections of a recording. Deterministic for a deterministic oracle.
    pub fn analyze(&self, audio: &AudioData) -> Result<Arrangement, ArrangerError> {
        let total_duration = audio.duration_secs();
        log::info!(
            "Analyzing {:.2}s of audio at {} Hz ({} channels)",
            total_duration,
            audio.sample_rate,
            audio.channels
        );

        let mono = audio.to_mono();

        self.tracer.start(Stage::BeatTracking, "Tracking beats");
        let grid = self.oracle.track(&mono, audio.sample_rate)?;
        self.tracer.complete(
            Stage::BeatTracking,
            format!("{:.1} BPM", grid.bpm),
            serde_json::json!({
                "bpm": grid.bpm,
                "beats": grid.beat_times.len(),
                "onsets": grid.onset_times.len(),
            }),
        );

        self.tracer.start(Stage::Segmentation, "Segmenting");
        let result = segment(&mono, audio.sample_rate, &grid, &self.config.segmentation)?;
        self.tracer.complete(
            Stage::Segmentation,
            format!("{} sections", result.sections.len()),
            serde_json::json!({
                "boundaries": result.boundaries,
                "threshold": result.threshold,
                "frame_duration": result.frame_duration,
                "degenerate": result.degenerate,
            }),
        );

        let arrangement = Arrangement {
            bpm: grid.bpm,
            total_duration: result.total_duration,
            sections: result.sections,
            beat_times: grid.beat_times,
        };
        arrangement
            .check_partition()
            .map_err(|v| ArrangerError::InvalidArrangement(format!("{:?}", v)))?;

        log::info!(
            "Analysis complete: {:.1} BPM, {} sections [{}]",
            arrangement.bpm,
            arrangement.sections.len(),
            arrangement.labels().join(", ")
        );

        Ok(arrangement)
    }

    /// Analyze, interpret `prompt`, apply it and render the new order starting at
    /// `start_offset` on the output timeline. Nothing is committed if the edit fails.
    pub fn rearrange(
        &self,
        audio: &AudioData,
        prompt: &str,
        start_offset: f64,
    ) -> Result<Rearrangement, ArrangerError> {
        let original_arrangement = self.analyze(audio)?;

        self.tracer.start(Stage::Interpret, prompt);
        let operation = edit::interpret(prompt, &original_arrangement);
        self.tracer.complete(
            Stage::Interpret,
            operation.to_string(),
            serde_json::to_value(&operation).unwrap_or_default(),
        );

        self.tracer.start(Stage::Rearrange, operation.to_string());
        let outcome = edit::apply(&original_arrangement, &operation, self.config.beats_per_bar)
            .map_err(|source| ArrangerError::Edit {
                operation: operation.clone(),
                source,
            })?;
        self.tracer.complete(
            Stage::Rearrange,
            format!("{} sections", outcome.sections.len()),
            serde_json::json!({
                "labels": outcome.sections.iter().map(|s| s.label.as_str()).collect::<Vec<_>>(),
            }),
        );

        self.tracer.start(Stage::Render, "Splicing sections");
        let rendered = render_sections(&outcome.sections, audio, start_offset, &self.config.render);
        self.tracer.complete(
            Stage::Render,
            format!("{} clips, {} skipped", rendered.clips.len(), rendered.skipped.len()),
            serde_json::json!({
                "total_duration": rendered.total_duration,
                "skipped": rendered.skipped,
            }),
        );

        Ok(Rearrangement {
            original_arrangement,
            operation,
            new_sections: outcome.timeline,
            distinct_coordinates: outcome.distinct_coordinates,
            rendered,
        })
    }

    /// Hand the rendered clips to a playback engine on a new track
    pub fn insert(
        &self,
        rearrangement: &Rearrangement,
        engine: &mut dyn PlaybackEngine,
        exporter: &ClipExporter,
    ) -> Result<PlacementReport, ArrangerError> {
        self.tracer.start(Stage::Insert, "Placing clips");
        let placement = place_clips(engine, exporter, &rearrangement.rendered)?;
        self.tracer.complete(
            Stage::Insert,
            format!("{} placed, {} failed", placement.placed.len(), placement.failed.len()),
            serde_json::json!({
                "track_id": placement.track_id,
                "failed": placement.failed,
            }),
        );
        Ok(placement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::trace::read_trace_file;
    use crate::render::{OutputFormat, RecordingEngine};
    use std::f64::consts::TAU;
    use tempfile::TempDir;

    const SR: u32 = 8000;

    /// intro 0-8, verse 8-20, chorus 20-32, outro 32-40 as sine blocks
    fn four_part_song() -> AudioData {
        let blocks = [
            (330.0, 0.1, 8.0),
            (440.0, 0.3, 12.0),
            (550.0, 0.9, 12.0),
            (660.0, 0.1, 8.0),
        ];
        let mut samples = Vec::new();
        for (freq, amp, seconds) in blocks {
            let n = (seconds * SR as f64) as usize;
            samples.extend((0..n).map(|i| amp * (TAU * freq * i as f64 / SR as f64).sin() as f32));
        }
        AudioData::from_interleaved(samples, SR, 1)
    }

    fn arranger() -> TemporalArranger {
        TemporalArranger::with_default_oracle(ArrangerConfig::default(), Some(120.0))
    }

    #[test]
    fn test_analyze_partitions_track() {
        let arrangement = arranger().analyze(&four_part_song()).unwrap();

        assert_eq!(arrangement.bpm, 120.0);
        assert_eq!(arrangement.total_duration, 40.0);
        assert_eq!(arrangement.labels(), vec!["intro", "verse", "chorus", "outro"]);
        assert_eq!(arrangement.check_partition(), Ok(()));
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let audio = four_part_song();
        let a = arranger().analyze(&audio).unwrap();
        let b = arranger().analyze(&audio).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_double_the_chorus_end_to_end() {
        let result = arranger().rearrange(&four_part_song(), "double the chorus", 0.0).unwrap();

        let labels: Vec<&str> = result.new_sections.iter().map(|p| p.section.label.as_str()).collect();
        assert_eq!(labels, vec!["intro", "verse", "chorus", "chorus_copy", "outro"]);
        assert_eq!(result.rendered.clips.len(), 5);
        for clip in &result.rendered.clips[2..4] {
            assert_eq!((clip.source_start, clip.source_end), (20.0, 32.0));
        }
        assert!(result.distinct_coordinates);
        assert!((result.rendered.total_duration - 52.0).abs() < 1e-9);
    }

    #[test]
    fn test_swap_keeps_source_ranges() {
        let result = arranger().rearrange(&four_part_song(), "swap verse and outro", 0.0).unwrap();

        let clips = &result.rendered.clips;
        let labels: Vec<&str> = clips.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["intro", "outro", "chorus", "verse"]);
        assert_eq!((clips[1].source_start, clips[1].source_end), (32.0, 40.0));
        assert_eq!((clips[3].source_start, clips[3].source_end), (8.0, 20.0));
        // Timeline positions are recomputed, not copied from the source
        assert_eq!(clips[1].timeline_position, 8.0);
        assert_eq!(clips[3].timeline_position, 28.0);
    }

    #[test]
    fn test_missing_section_aborts_with_operation() {
        let err = arranger()
            .rearrange(&four_part_song(), "remove the bridge", 0.0)
            .unwrap_err();

        match err {
            ArrangerError::Edit { operation, source } => {
                assert_eq!(
                    operation,
                    Operation::Remove {
                        target_label: "bridge".into()
                    }
                );
                assert_eq!(
                    source,
                    EditError::NotFound {
                        label: "bridge".into()
                    }
                );
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unknown_instruction_is_reported() {
        let err = arranger()
            .rearrange(&four_part_song(), "make it louder", 0.0)
            .unwrap_err();
        assert!(matches!(
            err,
            ArrangerError::Edit {
                operation: Operation::Unknown { .. },
                source: EditError::Unrecognized { .. }
            }
        ));
    }

    #[test]
    fn test_empty_audio_aborts_analysis() {
        let audio = AudioData::from_interleaved(Vec::new(), SR, 1);
        assert!(matches!(
            arranger().analyze(&audio),
            Err(ArrangerError::Segmentation(SegmentationError::DegenerateInput(_)))
        ));
    }

    #[test]
    fn test_insert_places_every_clip_and_traces() {
        let dir = TempDir::new().unwrap();
        let trace_path = dir.path().join("trace.jsonl");
        let arranger = arranger().with_tracer(Tracer::to_file(&trace_path));

        let result = arranger.rearrange(&four_part_song(), "extend the intro by 2 bars", 5.0).unwrap();
        let mut engine = RecordingEngine::new();
        let exporter = ClipExporter::new(dir.path().join("clips"), OutputFormat::Int16);
        let placement = arranger.insert(&result, &mut engine, &exporter).unwrap();

        assert_eq!(placement.placed.len(), 4);
        assert_eq!(engine.entries[0].timeline_start, 5.0);
        // Intro now 12s long, so the verse starts 12s after the offset
        assert!((engine.entries[1].timeline_start - 17.0).abs() < 1e-9);

        let stages: Vec<Stage> = read_trace_file(&trace_path)
            .unwrap()
            .into_iter()
            .map(|e| e.stage)
            .collect();
        for stage in [
            Stage::BeatTracking,
            Stage::Segmentation,
            Stage::Interpret,
            Stage::Rearrange,
            Stage::Render,
            Stage::Insert,
        ] {
            assert!(stages.contains(&stage), "missing {}", stage);
        }
    }
}

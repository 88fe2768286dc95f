// Command layer
// Entry points behind the CLI: each takes a plain input struct and returns a
// serialisable result or a CommandError
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::audio::{self, AudioData};
use crate::config::{ArrangerConfig, ConfigError};
use crate::edit::{EditError, Operation, PlacedSection, TEMPLATES};
use crate::pipeline::{ArrangerError, Stage, TemporalArranger, Tracer};
use crate::render::{ClipExporter, ManifestEngine, PlacementReport, RenderReport};
use crate::state;
use crate::structure::Arrangement;

#[derive(Debug, Serialize)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl<E: std::fmt::Display> From<E> for CommandError {
    fn from(error: E) -> Self {
        CommandError {
            message: error.to_string(),
        }
    }
}

type CommandResult<T> = Result<T, CommandError>;

/// Defaults, overridden by a TOML file when one is given
pub fn load_config(path: Option<&Path>) -> Result<ArrangerConfig, ConfigError> {
    match path {
        Some(path) => ArrangerConfig::from_toml_file(path),
        None => Ok(ArrangerConfig::default()),
    }
}

fn load_source(path: &Path, tracer: &Tracer) -> CommandResult<(AudioData, String)> {
    tracer.start(Stage::Load, path.display().to_string());

    let (audio, bytes) = audio::load_wav(path).map_err(|e| CommandError {
        message: format!("Failed to load {}: {}", path.display(), e),
    })?;
    let sha256 = state::calculate_sha256(&bytes);

    log::info!(
        "Loaded {}: {} Hz, {} channels, {} bit, {} ms",
        path.display(),
        audio.sample_rate,
        audio.channels,
        audio.bit_depth,
        audio.duration_ms
    );
    tracer.complete(
        Stage::Load,
        "Decoded input",
        serde_json::json!({
            "sha256": sha256,
            "sample_rate": audio.sample_rate,
            "channels": audio.channels,
            "duration_ms": audio.duration_ms,
        }),
    );

    Ok((audio, sha256))
}

fn build_tracer(trace_path: Option<&PathBuf>) -> Tracer {
    trace_path.map(Tracer::to_file).unwrap_or_default()
}

// ==================== ANALYZE ====================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeInput {
    pub path: PathBuf,
    /// Skip beat tracking and use a fixed grid at this tempo
    pub bpm: Option<f64>,
    pub config_path: Option<PathBuf>,
    pub trace_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub input: String,
    pub source_sha256: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub arrangement: Arrangement,
}

pub fn analyze(input: &AnalyzeInput) -> CommandResult<AnalysisReport> {
    let config = load_config(input.config_path.as_deref())?;
    let tracer = build_tracer(input.trace_path.as_ref());
    let (audio, source_sha256) = load_source(&input.path, &tracer)?;

    let arranger = TemporalArranger::with_default_oracle(config, input.bpm).with_tracer(tracer);
    let arrangement = arranger.analyze(&audio)?;

    Ok(AnalysisReport {
        input: input.path.display().to_string(),
        source_sha256,
        sample_rate: audio.sample_rate,
        channels: audio.channels,
        arrangement,
    })
}

// ==================== REARRANGE ====================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RearrangeInput {
    pub path: PathBuf,
    pub prompt: String,
    /// Timeline offset (seconds) of the first placed clip
    pub start_time: f64,
    /// Where clips and placements.json go; a fresh data-dir folder when absent
    pub output_dir: Option<PathBuf>,
    pub bpm: Option<f64>,
    pub config_path: Option<PathBuf>,
    pub trace_path: Option<PathBuf>,
    /// Render but write nothing
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct RearrangeResult {
    pub input: String,
    pub source_sha256: String,
    pub original_arrangement: Arrangement,
    pub operation: Operation,
    pub new_sections: Vec<PlacedSection>,
    pub distinct_coordinates: bool,
    pub rendered: RenderReport,
    pub placement: Option<PlacementReport>,
}

pub fn rearrange(input: &RearrangeInput) -> CommandResult<RearrangeResult> {
    let config = load_config(input.config_path.as_deref())?;
    let tracer = build_tracer(input.trace_path.as_ref());
    let (audio, source_sha256) = load_source(&input.path, &tracer)?;

    let arranger = TemporalArranger::with_default_oracle(config, input.bpm).with_tracer(tracer);
    let rearrangement = arranger
        .rearrange(&audio, &input.prompt, input.start_time)
        .map_err(describe_arranger_error)?;

    let output_format = arranger.config().render.output_format;
    let placement = if input.dry_run {
        None
    } else {
        let exporter = match &input.output_dir {
            Some(dir) => ClipExporter::new(dir, output_format),
            None => ClipExporter::with_default_dir(&Uuid::new_v4(), output_format)?,
        };
        let mut engine = ManifestEngine::new(exporter.output_dir());
        let placement = arranger.insert(&rearrangement, &mut engine, &exporter)?;
        log::info!("Placements written to {}", engine.manifest_path().display());
        Some(placement)
    };

    Ok(RearrangeResult {
        input: input.path.display().to_string(),
        source_sha256,
        original_arrangement: rearrangement.original_arrangement,
        operation: rearrangement.operation,
        new_sections: rearrangement.new_sections,
        distinct_coordinates: rearrangement.distinct_coordinates,
        rendered: rearrangement.rendered,
        placement,
    })
}

/// Unrecognized instructions come back with the list of supported templates
fn describe_arranger_error(error: ArrangerError) -> CommandError {
    match &error {
        ArrangerError::Edit {
            source: EditError::Unrecognized { raw_text },
            ..
        } => CommandError {
            message: format!(
                "Unrecognized instruction \"{}\". Supported instructions:\n  {}",
                raw_text,
                TEMPLATES.join("\n  ")
            ),
        },
        _ => CommandError::from(error),
    }
}

// ==================== INFO ====================

pub fn list_templates() -> Vec<&'static str> {
    TEMPLATES.to_vec()
}

pub fn default_config_toml() -> CommandResult<String> {
    Ok(ArrangerConfig::default().to_toml_string()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{ClipAudio, OutputFormat};
    use std::f64::consts::TAU;
    use tempfile::TempDir;

    /// Stereo 16-bit WAV: quiet 8s, mid 12s, loud 12s, quiet 8s
    fn write_song(dir: &Path) -> PathBuf {
        let sr = 8000u32;
        let mut samples = Vec::new();
        for (freq, amp, seconds) in [
            (330.0, 0.1, 8.0),
            (440.0, 0.3, 12.0),
            (550.0, 0.9, 12.0),
            (660.0, 0.1, 8.0),
        ] {
            let n = (seconds * sr as f64) as usize;
            for i in 0..n {
                let s = amp * (TAU * freq * i as f64 / sr as f64).sin() as f32;
                samples.push(s);
                samples.push(s);
            }
        }

        let clip = ClipAudio {
            samples,
            sample_rate: sr,
            channels: 2,
        };
        let path = dir.join("song.wav");
        std::fs::write(&path, clip.to_wav_bytes(OutputFormat::Int16).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_analyze_command() {
        let dir = TempDir::new().unwrap();
        let path = write_song(dir.path());

        let report = analyze(&AnalyzeInput {
            path,
            bpm: Some(120.0),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(report.channels, 2);
        assert_eq!(report.source_sha256.len(), 64);
        assert_eq!(report.arrangement.check_partition(), Ok(()));
        assert_eq!(report.arrangement.labels(), vec!["intro", "verse", "chorus", "outro"]);
    }

    #[test]
    fn test_rearrange_writes_clips_and_manifest() {
        let dir = TempDir::new().unwrap();
        let path = write_song(dir.path());
        let output_dir = dir.path().join("out");
        let trace_path = dir.path().join("trace.jsonl");

        let result = rearrange(&RearrangeInput {
            path,
            prompt: "double the chorus".into(),
            start_time: 2.0,
            output_dir: Some(output_dir.clone()),
            bpm: Some(120.0),
            trace_path: Some(trace_path.clone()),
            ..Default::default()
        })
        .unwrap();

        let placement = result.placement.unwrap();
        assert_eq!(placement.placed.len(), 5);
        assert!(placement.placed.iter().all(|p| p.path.exists()));
        assert_eq!(placement.placed[0].timeline_start, 2.0);
        assert!(output_dir.join(ManifestEngine::MANIFEST_NAME).exists());

        // Serialised result keeps every clip field except the audio itself
        let json = serde_json::to_value(&result.rendered).unwrap();
        assert_eq!(json["clips"][3]["label"], "chorus_copy");
        assert_eq!(json["clips"][3]["source_start"], 20.0);
        assert!(json["clips"][3].get("audio").is_none());

        let stages: Vec<Stage> = crate::pipeline::read_trace_file(&trace_path)
            .unwrap()
            .into_iter()
            .map(|e| e.stage)
            .collect();
        assert_eq!(stages.first(), Some(&Stage::Load));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = write_song(dir.path());
        let output_dir = dir.path().join("out");

        let result = rearrange(&RearrangeInput {
            path,
            prompt: "remove the verse".into(),
            output_dir: Some(output_dir.clone()),
            bpm: Some(120.0),
            dry_run: true,
            ..Default::default()
        })
        .unwrap();

        assert!(result.placement.is_none());
        assert_eq!(result.rendered.clips.len(), 3);
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_unknown_prompt_lists_templates() {
        let dir = TempDir::new().unwrap();
        let path = write_song(dir.path());

        let err = rearrange(&RearrangeInput {
            path,
            prompt: "make it louder".into(),
            bpm: Some(120.0),
            dry_run: true,
            ..Default::default()
        })
        .unwrap_err();

        assert!(err.message().contains("make it louder"));
        assert!(err.message().contains("swap"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = analyze(&AnalyzeInput {
            path: PathBuf::from("/nonexistent/song.wav"),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.message().contains("Failed to load"));
    }

    #[test]
    fn test_templates_and_config() {
        assert_eq!(list_templates().len(), 4);
        let toml = default_config_toml().unwrap();
        assert!(toml.contains("beats_per_bar"));
        assert!(toml.contains("[segmentation]"));
    }
}

// Playback engine adapter
// Places rendered clips on a new engine track. The networked engine sits behind
// the PlaybackEngine trait; an in-memory engine and a JSON manifest writer ship here.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::render::export::ClipExporter;
use crate::render::splice::{RenderError, RenderReport};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Clip insertion refused: {0}")]
    ClipRefused(String),

    #[error("Unknown track: {0}")]
    UnknownTrack(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Audio file handed to the engine for one clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRegionRef {
    pub path: PathBuf,
    pub label: String,
    pub duration: f64,
    pub source_start: f64,
    pub source_end: f64,
}

pub trait PlaybackEngine {
    /// Create an empty track and return its id
    fn add_track(&mut self) -> Result<u32, EngineError>;

    /// Place `region` on `track_id` starting at `timeline_start` seconds
    fn insert_audio_clip(
        &mut self,
        track_id: u32,
        region: &AudioRegionRef,
        timeline_start: f64,
    ) -> Result<(), EngineError>;
}

/// A clip the engine accepted; the file now belongs to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipPlacement {
    pub index: usize,
    pub label: String,
    pub path: PathBuf,
    pub timeline_start: f64,
    pub duration: f64,
}

/// A clip that could not be exported or inserted; its slot on the timeline stays empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementFailure {
    pub index: usize,
    pub label: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementReport {
    pub track_id: u32,
    pub placed: Vec<ClipPlacement>,
    pub failed: Vec<PlacementFailure>,
}

/// Export every rendered clip and insert it on a fresh track at its timeline position.
///
/// Failing to create the track aborts. Per-clip failures are collected; a clip whose
/// insertion fails has its temporary file removed and later clips keep their offsets.
pub fn place_clips<E: PlaybackEngine + ?Sized>(
    engine: &mut E,
    exporter: &ClipExporter,
    report: &RenderReport,
) -> Result<PlacementReport, EngineError> {
    let track_id = engine.add_track()?;
    let mut placed = Vec::with_capacity(report.clips.len());
    let mut failed = Vec::new();

    for clip in &report.clips {
        let path = match exporter.export(clip) {
            Ok(path) => path,
            Err(e) => {
                log::warn!("Failed to export clip {} ({}): {}", clip.index, clip.label, e);
                failed.push(PlacementFailure {
                    index: clip.index,
                    label: clip.label.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let region = AudioRegionRef {
            path: path.clone(),
            label: clip.label.clone(),
            duration: clip.duration,
            source_start: clip.source_start,
            source_end: clip.source_end,
        };

        match engine.insert_audio_clip(track_id, &region, clip.timeline_position) {
            Ok(()) => placed.push(ClipPlacement {
                index: clip.index,
                label: clip.label.clone(),
                path,
                timeline_start: clip.timeline_position,
                duration: clip.duration,
            }),
            Err(e) => {
                log::warn!(
                    "Engine rejected clip {} ({}) at {:.3}s: {}",
                    clip.index,
                    clip.label,
                    clip.timeline_position,
                    e
                );
                if let Err(remove_err) = fs::remove_file(&path) {
                    log::warn!("Failed to remove {}: {}", path.display(), remove_err);
                }
                failed.push(PlacementFailure {
                    index: clip.index,
                    label: clip.label.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    log::info!(
        "Placed {} clips on track {} ({} failed)",
        placed.len(),
        track_id,
        failed.len()
    );

    Ok(PlacementReport {
        track_id,
        placed,
        failed,
    })
}

/// One accepted insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEntry {
    pub track_id: u32,
    pub timeline_start: f64,
    pub region: AudioRegionRef,
}

/// Keeps placements in memory. Labels listed in `reject_labels` are refused.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    pub tracks: Vec<u32>,
    pub entries: Vec<EngineEntry>,
    pub reject_labels: Vec<String>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(labels: &[&str]) -> Self {
        RecordingEngine {
            reject_labels: labels.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl PlaybackEngine for RecordingEngine {
    fn add_track(&mut self) -> Result<u32, EngineError> {
        let id = self.tracks.len() as u32;
        self.tracks.push(id);
        Ok(id)
    }

    fn insert_audio_clip(
        &mut self,
        track_id: u32,
        region: &AudioRegionRef,
        timeline_start: f64,
    ) -> Result<(), EngineError> {
        if !self.tracks.contains(&track_id) {
            return Err(EngineError::UnknownTrack(track_id));
        }
        if self.reject_labels.iter().any(|l| *l == region.label) {
            return Err(EngineError::ClipRefused(format!("{} rejected", region.label)));
        }

        self.entries.push(EngineEntry {
            track_id,
            timeline_start,
            region: region.clone(),
        });
        Ok(())
    }
}

/// Offline stand-in for a live engine: records placements in `placements.json`
#[derive(Debug)]
pub struct ManifestEngine {
    manifest_path: PathBuf,
    track_count: u32,
    entries: Vec<EngineEntry>,
}

impl ManifestEngine {
    pub const MANIFEST_NAME: &'static str = "placements.json";

    pub fn new(output_dir: &Path) -> Self {
        ManifestEngine {
            manifest_path: output_dir.join(Self::MANIFEST_NAME),
            track_count: 0,
            entries: Vec::new(),
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn entries(&self) -> &[EngineEntry] {
        &self.entries
    }

    fn write_manifest(&self, entries: &[EngineEntry]) -> Result<(), EngineError> {
        if let Some(parent) = self.manifest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.manifest_path, json)?;
        Ok(())
    }
}

impl PlaybackEngine for ManifestEngine {
    fn add_track(&mut self) -> Result<u32, EngineError> {
        let id = self.track_count;
        self.track_count += 1;
        Ok(id)
    }

    fn insert_audio_clip(
        &mut self,
        track_id: u32,
        region: &AudioRegionRef,
        timeline_start: f64,
    ) -> Result<(), EngineError> {
        if track_id >= self.track_count {
            return Err(EngineError::UnknownTrack(track_id));
        }
        if !region.path.exists() {
            return Err(EngineError::ClipRefused(format!(
                "missing audio file {}",
                region.path.display()
            )));
        }

        // Only entries that made it to disk are kept
        let mut entries = self.entries.clone();
        entries.push(EngineEntry {
            track_id,
            timeline_start,
            region: region.clone(),
        });
        self.write_manifest(&entries)?;
        self.entries = entries;
        Ok(())
    }
}

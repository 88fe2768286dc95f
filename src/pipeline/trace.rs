// Progress tracing
// Append-only JSONL trace of analyze/rearrange stages

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    BeatTracking,
    Segmentation,
    Interpret,
    Rearrange,
    Render,
    Insert,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::BeatTracking => "beat_tracking",
            Stage::Segmentation => "segmentation",
            Stage::Interpret => "interpret",
            Stage::Rearrange => "rearrange",
            Stage::Render => "render",
            Stage::Insert => "insert",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the trace file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// RFC 3339 timestamp
    pub timestamp: String,

    pub stage: Stage,

    /// Progress within the stage [0.0, 1.0]
    pub progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    pub fn new(stage: Stage, progress: f32, message: impl Into<String>) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            stage,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize to a JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Appends entries to a JSONL file, creating it on first write
#[derive(Debug, Clone)]
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        TraceWriter {
            file_path: file_path.into(),
        }
    }

    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        file.write_all(entry.to_json_line()?.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Optional trace destination threaded through a pipeline call.
/// Write failures are logged and never abort the call being traced.
#[derive(Debug, Clone, Default)]
pub struct Tracer {
    writer: Option<TraceWriter>,
}

impl Tracer {
    pub fn disabled() -> Self {
        Tracer { writer: None }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Tracer {
            writer: Some(TraceWriter::new(path)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn record(&self, entry: TraceEntry) {
        if let Some(writer) = &self.writer {
            if let Err(e) = writer.write(&entry) {
                log::warn!(
                    "Failed to write trace entry to {}: {}",
                    writer.path().display(),
                    e
                );
            }
        }
    }

    pub fn start(&self, stage: Stage, message: impl Into<String>) {
        self.record(TraceEntry::new(stage, 0.0, message));
    }

    pub fn complete(&self, stage: Stage, message: impl Into<String>, data: serde_json::Value) {
        self.record(TraceEntry::new(stage, 1.0, message).with_data(data));
    }
}

/// Read every entry of a JSONL trace file, skipping blank lines
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(TraceError::from))
        .collect()
}

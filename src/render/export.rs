// Clip export
// Writes rendered clips as standalone WAV files for the playback engine to ingest

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::render::splice::{OutputFormat, RenderError, RenderedClip};
use crate::state::storage;

/// `<data dir>/songform/renders/<run id>`, one fresh directory per call
pub fn default_output_dir(run_id: &Uuid) -> Result<PathBuf, RenderError> {
    Ok(storage::get_render_dir(run_id)?)
}

/// Writes clips into one directory, one uniquely named file each
#[derive(Debug, Clone)]
pub struct ClipExporter {
    output_dir: PathBuf,
    format: OutputFormat,
}

impl ClipExporter {
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        ClipExporter {
            output_dir: output_dir.into(),
            format,
        }
    }

    pub fn with_default_dir(run_id: &Uuid, format: OutputFormat) -> Result<Self, RenderError> {
        Ok(Self::new(default_output_dir(run_id)?, format))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Encode and write one clip, returning the file path
    pub fn export(&self, clip: &RenderedClip) -> Result<PathBuf, RenderError> {
        fs::create_dir_all(&self.output_dir)?;

        let filename = format!(
            "section_{}_{}_{}.wav",
            clip.index,
            sanitize_label(&clip.label),
            Uuid::new_v4()
        );
        let path = self.output_dir.join(filename);

        let bytes = clip.audio.to_wav_bytes(self.format)?;
        write_or_remove(&path, |file| file.write_all(&bytes))?;

        log::debug!("Wrote clip {} ({}) to {}", clip.index, clip.label, path.display());
        Ok(path)
    }
}

/// Create `path` and fill it with `write`; a failed write leaves no partial file behind
fn write_or_remove<F>(path: &Path, write: F) -> std::io::Result<()>
where
    F: FnOnce(&mut fs::File) -> std::io::Result<()>,
{
    let mut file = fs::File::create(path)?;
    let result = write(&mut file).and_then(|_| file.flush());
    drop(file);

    if let Err(e) = result {
        if let Err(remove_err) = fs::remove_file(path) {
            log::warn!("Failed to remove partial clip {}: {}", path.display(), remove_err);
        }
        return Err(e);
    }
    Ok(())
}

/// Keep labels filesystem-safe
fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "section".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::splice::ClipAudio;
    use tempfile::TempDir;

    fn clip(index: usize, label: &str) -> RenderedClip {
        RenderedClip {
            index,
            label: label.to_string(),
            source_start: 0.0,
            source_end: 0.5,
            timeline_position: 0.0,
            duration: 0.5,
            audio: ClipAudio {
                samples: vec![0.1; 4000],
                sample_rate: 8000,
                channels: 1,
            },
        }
    }

    #[test]
    fn test_export_writes_named_wav() {
        let dir = TempDir::new().unwrap();
        let exporter = ClipExporter::new(dir.path(), OutputFormat::Int16);

        let path = exporter.export(&clip(2, "chorus_copy")).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("section_2_chorus_copy_"));
        assert!(name.ends_with(".wav"));

        let decoded = crate::audio::ingest_wav(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(decoded.frame_count, 4000);
        assert_eq!(decoded.bit_depth, 16);
    }

    #[test]
    fn test_exports_never_collide() {
        let dir = TempDir::new().unwrap();
        let exporter = ClipExporter::new(dir.path().join("nested"), OutputFormat::Float32);

        let a = exporter.export(&clip(0, "verse")).unwrap();
        let b = exporter.export(&clip(0, "verse")).unwrap();
        assert_ne!(a, b);
        assert!(a.exists() && b.exists());
    }

    #[test]
    fn test_failed_write_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.wav");

        let result = write_or_remove(&path, |file| {
            file.write_all(b"RIFF")?;
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        });

        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_or_remove_keeps_complete_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.wav");

        write_or_remove(&path, |file| file.write_all(b"RIFF")).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF");
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("verse_1"), "verse_1");
        assert_eq!(sanitize_label("a/b c"), "a_b_c");
        assert_eq!(sanitize_label(""), "section");
    }
}

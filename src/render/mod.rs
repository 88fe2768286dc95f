// Render Module - splicing source audio into clips and placing them on an engine track

pub mod engine;
pub mod export;
pub mod splice;

pub use engine::{
    place_clips, AudioRegionRef, ClipPlacement, EngineError, ManifestEngine, PlacementFailure,
    PlacementReport, PlaybackEngine, RecordingEngine,
};
pub use export::{default_output_dir, ClipExporter};
pub use splice::{
    apply_edge_fades, render_sections, ClipAudio, OutputFormat, RenderConfig, RenderError,
    RenderReport, RenderSkip, RenderedClip,
};

// Audio processing module
// Handles WAV file ingestion and short-time spectral analysis

pub mod features;
pub mod ingest;

pub use features::{detect_onsets, frame_rms, Onset, OnsetConfig, SpectralFrames};
pub use ingest::{ingest_wav, load_wav, AudioData, AudioError};

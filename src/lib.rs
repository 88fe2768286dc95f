// Songform - song structure analysis and prompt-driven rearrangement
// Module declarations

pub mod audio;
pub mod commands;
pub mod config;
pub mod edit;
pub mod groove;
pub mod pipeline;
pub mod render;
pub mod state;
pub mod structure;

pub use config::{ArrangerConfig, ConfigError};
pub use edit::{EditError, Operation};
pub use pipeline::{ArrangerError, Rearrangement, TemporalArranger};
pub use structure::{Arrangement, Section};

// Edit Module - instruction parsing and section rearrangement

pub mod executor;
pub mod operation;
pub mod prompt;

pub use executor::{apply, layout_timeline, EditError, EditOutcome, PlacedSection};
pub use operation::Operation;
pub use prompt::{find_section, find_section_index, interpret, TEMPLATES};

// Structure Module - song section discovery
// Frame features, self-similarity novelty and heuristic section labels

pub mod features;
pub mod labels;
pub mod segmenter;
pub mod similarity;
pub mod types;

pub use labels::{classify_span, disambiguate, energy_stats, EnergyStats, SectionKind, SpanContext};
pub use segmenter::{segment, SegmentationConfig, SegmentationError, SegmentationResult};
pub use types::{Arrangement, PartitionViolation, Section, BOUNDARY_TOLERANCE};

// Song structure types
// Sections reference the original recording; Arrangements are immutable analysis results

use serde::{Deserialize, Serialize};

/// Tolerance (seconds) when checking that boundaries line up
pub const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// A contiguous labeled span of music
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Role tag: intro, verse, chorus, bridge, outro, or a numbered variant
    pub label: String,

    /// Start offset (seconds) into the original recording
    pub source_start: f64,

    /// End offset (seconds) into the original recording
    pub source_end: f64,

    /// Heuristic certainty of the label [0.0, 1.0]
    pub confidence: f64,

    /// Relative loudness used for classification only
    pub energy: f64,
}

impl Section {
    pub fn new(
        label: impl Into<String>,
        source_start: f64,
        source_end: f64,
        confidence: f64,
        energy: f64,
    ) -> Self {
        Section {
            label: label.into(),
            source_start,
            source_end,
            confidence,
            energy,
        }
    }

    /// Length of the referenced audio in seconds
    pub fn duration(&self) -> f64 {
        self.source_end - self.source_start
    }
}

/// The analysis result for one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrangement {
    /// Tempo in beats per minute (> 0)
    pub bpm: f64,

    /// Track length in seconds
    pub total_duration: f64,

    /// Sections partitioning [0, total_duration] in order
    pub sections: Vec<Section>,

    /// Monotonic beat times within [0, total_duration]
    pub beat_times: Vec<f64>,
}

/// Ways an Arrangement can break its partition invariant
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionViolation {
    Empty,
    DoesNotStartAtZero(f64),
    DoesNotReachEnd { end: f64, total_duration: f64 },
    Gap { index: usize, previous_end: f64, start: f64 },
    EmptySection { index: usize },
}

impl Arrangement {
    pub fn labels(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.label.as_str()).collect()
    }

    /// Check that sections cover [0, total_duration] with no gaps or overlaps
    pub fn check_partition(&self) -> Result<(), PartitionViolation> {
        let first = self.sections.first().ok_or(PartitionViolation::Empty)?;
        if first.source_start.abs() > BOUNDARY_TOLERANCE {
            return Err(PartitionViolation::DoesNotStartAtZero(first.source_start));
        }

        for (index, section) in self.sections.iter().enumerate() {
            if section.source_end - section.source_start <= 0.0 {
                return Err(PartitionViolation::EmptySection { index });
            }
            if index > 0 {
                let previous_end = self.sections[index - 1].source_end;
                if (section.source_start - previous_end).abs() > BOUNDARY_TOLERANCE {
                    return Err(PartitionViolation::Gap {
                        index,
                        previous_end,
                        start: section.source_start,
                    });
                }
            }
        }

        let end = self.sections[self.sections.len() - 1].source_end;
        if (end - self.total_duration).abs() > BOUNDARY_TOLERANCE {
            return Err(PartitionViolation::DoesNotReachEnd {
                end,
                total_duration: self.total_duration,
            });
        }

        Ok(())
    }
}

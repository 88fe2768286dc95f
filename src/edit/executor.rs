// Rearrangement executor
// Applies one Operation to a private copy of an arrangement's sections and lays the
// result out on a fresh playback timeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::edit::operation::Operation;
use crate::edit::prompt::find_section_index;
use crate::groove::bar_duration;
use crate::structure::{Arrangement, Section, BOUNDARY_TOLERANCE};

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("Section not found: {label}")]
    NotFound { label: String },

    #[error("Cannot remove {label}: it is the only section")]
    LastSection { label: String },

    #[error("Extending {label} to {requested_end:.3}s runs past the end of the recording ({total_duration:.3}s)")]
    ExtendPastEnd {
        label: String,
        requested_end: f64,
        total_duration: f64,
    },

    #[error("Unrecognized instruction: {raw_text}")]
    Unrecognized { raw_text: String },

    #[error("Bar count must be at least 1, got {0}")]
    InvalidBars(u32),

    #[error("Repeat count must be at least 2, got {0}")]
    InvalidTimes(u32),
}

/// A section placed on the output timeline. `source_*` still address the original
/// recording; `timeline_position` is where playback of it begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedSection {
    #[serde(flatten)]
    pub section: Section,
    pub timeline_position: f64,
    pub duration: f64,
}

/// Result of applying one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOutcome {
    /// New section order, source coordinates untouched except for Extend
    pub sections: Vec<Section>,

    /// The same sections laid end to end from 0
    pub timeline: Vec<PlacedSection>,

    /// Timeline positions and source offsets are separate fields; clips are always
    /// sliced by source offsets
    pub distinct_coordinates: bool,
}

impl EditOutcome {
    pub fn total_duration(&self) -> f64 {
        self.timeline
            .last()
            .map(|p| p.timeline_position + p.duration)
            .unwrap_or(0.0)
    }
}

/// Apply `operation` to a copy of `arrangement.sections`; the arrangement is untouched
pub fn apply(
    arrangement: &Arrangement,
    operation: &Operation,
    beats_per_bar: u32,
) -> Result<EditOutcome, EditError> {
    let mut sections = arrangement.sections.clone();

    match operation {
        Operation::Duplicate { target_label, times } => {
            if *times < 2 {
                return Err(EditError::InvalidTimes(*times));
            }
            let index = locate(&sections, target_label)?;
            let original = sections[index].clone();

            for copy in 1..*times {
                let base = format!("{}_copy", original.label);
                let label = unique_label(&sections, &base);
                let duplicate = Section {
                    label,
                    ..original.clone()
                };
                sections.insert(index + copy as usize, duplicate);
            }
        }

        Operation::Remove { target_label } => {
            let index = locate(&sections, target_label)?;
            if sections.len() == 1 {
                return Err(EditError::LastSection {
                    label: sections[index].label.clone(),
                });
            }
            sections.remove(index);
        }

        Operation::Swap { label_a, label_b } => {
            let a = locate(&sections, label_a)?;
            let b = locate(&sections, label_b)?;
            if a == b {
                log::debug!("Swap of {} with itself leaves the order unchanged", label_a);
            }
            sections.swap(a, b);
        }

        Operation::Extend { target_label, bars } => {
            if *bars == 0 {
                return Err(EditError::InvalidBars(*bars));
            }
            let index = locate(&sections, target_label)?;
            let extension = *bars as f64 * bar_duration(arrangement.bpm, beats_per_bar);
            let requested_end = sections[index].source_end + extension;

            if requested_end > arrangement.total_duration + BOUNDARY_TOLERANCE {
                return Err(EditError::ExtendPastEnd {
                    label: sections[index].label.clone(),
                    requested_end,
                    total_duration: arrangement.total_duration,
                });
            }
            sections[index].source_end = requested_end;
        }

        Operation::Unknown { raw_text } => {
            return Err(EditError::Unrecognized {
                raw_text: raw_text.clone(),
            });
        }
    }

    log::info!(
        "Applied {}: {} -> {} sections",
        operation,
        arrangement.sections.len(),
        sections.len()
    );

    let timeline = layout_timeline(&sections, 0.0);
    Ok(EditOutcome {
        sections,
        timeline,
        distinct_coordinates: true,
    })
}

/// Place sections back to back starting at `start`
pub fn layout_timeline(sections: &[Section], start: f64) -> Vec<PlacedSection> {
    let mut position = start;
    sections
        .iter()
        .map(|section| {
            let duration = section.duration();
            let placed = PlacedSection {
                section: section.clone(),
                timeline_position: position,
                duration,
            };
            position += duration;
            placed
        })
        .collect()
}

fn locate(sections: &[Section], label: &str) -> Result<usize, EditError> {
    find_section_index(sections, label).ok_or_else(|| EditError::NotFound {
        label: label.to_string(),
    })
}

/// `base`, or `base_2`, `base_3`.. if that label is taken
fn unique_label(sections: &[Section], base: &str) -> String {
    let taken = |label: &str| sections.iter().any(|s| s.label == label);
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

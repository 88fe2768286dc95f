// Section labeling heuristics
// Classification is a pure function of a span's position, duration and energy
// relative to the track's energy statistics

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::structure::segmenter::SegmentationConfig;
use crate::structure::similarity::median;

/// Base role of a section before numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Intro,
    Verse,
    Chorus,
    Bridge,
    Outro,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Intro => "intro",
            SectionKind::Verse => "verse",
            SectionKind::Chorus => "chorus",
            SectionKind::Bridge => "bridge",
            SectionKind::Outro => "outro",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a span sits and how loud it is
#[derive(Debug, Clone, Copy)]
pub struct SpanContext {
    pub index: usize,
    pub count: usize,
    pub duration: f64,
    pub energy: f64,
}

/// Track-wide energy distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyStats {
    pub median: f64,
    /// Population standard deviation
    pub std_dev: f64,
}

pub fn energy_stats(energies: &[f64]) -> EnergyStats {
    if energies.is_empty() {
        return EnergyStats {
            median: 0.0,
            std_dev: 0.0,
        };
    }

    let n = energies.len() as f64;
    let mean = energies.iter().sum::<f64>() / n;
    let variance = energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;

    let mut sorted = energies.to_vec();
    EnergyStats {
        median: median(&mut sorted),
        std_dev: variance.sqrt(),
    }
}

/// Assign a base role to one span.
///
/// Short first/last spans become intro/outro. A lone span only gets the
/// energy rule, which for a single value always yields verse.
pub fn classify_span(span: &SpanContext, stats: &EnergyStats, config: &SegmentationConfig) -> SectionKind {
    if span.count > 1 {
        if span.index == 0 && span.duration < config.intro_max_duration {
            return SectionKind::Intro;
        }
        if span.index + 1 == span.count && span.duration < config.outro_max_duration {
            return SectionKind::Outro;
        }
    }

    if span.energy > stats.median + config.chorus_std_factor * stats.std_dev {
        SectionKind::Chorus
    } else if span.energy < stats.median - config.bridge_std_factor * stats.std_dev {
        SectionKind::Bridge
    } else {
        SectionKind::Verse
    }
}

/// `min(1, 0.5 + 0.5 * |energy - median| / (std + epsilon))`
pub fn label_confidence(energy: f64, stats: &EnergyStats, epsilon: f64) -> f64 {
    let spread = (energy - stats.median).abs() / (stats.std_dev + epsilon);
    (0.5 + 0.5 * spread).min(1.0)
}

/// Number repeated labels in order of appearance: verse, chorus, verse ->
/// verse_1, chorus, verse_2. Labels that occur once are left alone.
pub fn disambiguate<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        *totals.entry(label.as_ref()).or_insert(0) += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    labels
        .iter()
        .map(|label| {
            let label = label.as_ref();
            if totals.get(label).copied().unwrap_or(0) < 2 {
                return label.to_string();
            }
            let n = seen.entry(label).or_insert(0);
            *n += 1;
            format!("{}_{}", label, n)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(index: usize, count: usize, duration: f64, energy: f64) -> SpanContext {
        SpanContext {
            index,
            count,
            duration,
            energy,
        }
    }

    #[test]
    fn test_energy_stats() {
        let stats = energy_stats(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stats.median, 2.5);
        assert!((stats.std_dev - 1.25f64.sqrt()).abs() < 1e-12);

        let empty = energy_stats(&[]);
        assert_eq!(empty.median, 0.0);
    }

    #[test]
    fn test_positional_labels() {
        let config = SegmentationConfig::default();
        let stats = EnergyStats {
            median: 0.5,
            std_dev: 0.1,
        };

        assert_eq!(classify_span(&span(0, 4, 8.0, 0.5), &stats, &config), SectionKind::Intro);
        assert_eq!(classify_span(&span(3, 4, 8.0, 0.5), &stats, &config), SectionKind::Outro);
        // Long first span falls through to the energy rule
        assert_eq!(classify_span(&span(0, 4, 20.0, 0.9), &stats, &config), SectionKind::Chorus);
    }

    #[test]
    fn test_energy_labels() {
        let config = SegmentationConfig::default();
        let stats = EnergyStats {
            median: 0.5,
            std_dev: 0.1,
        };

        // chorus above 0.55, bridge below 0.47
        assert_eq!(classify_span(&span(1, 4, 12.0, 0.56), &stats, &config), SectionKind::Chorus);
        assert_eq!(classify_span(&span(1, 4, 12.0, 0.46), &stats, &config), SectionKind::Bridge);
        assert_eq!(classify_span(&span(1, 4, 12.0, 0.50), &stats, &config), SectionKind::Verse);
    }

    #[test]
    fn test_single_span_uses_energy_rule() {
        let config = SegmentationConfig::default();
        let stats = energy_stats(&[0.3]);
        assert_eq!(classify_span(&span(0, 1, 5.0, 0.3), &stats, &config), SectionKind::Verse);
    }

    #[test]
    fn test_confidence() {
        let stats = EnergyStats {
            median: 0.5,
            std_dev: 0.2,
        };
        assert!((label_confidence(0.5, &stats, 1e-10) - 0.5).abs() < 1e-9);
        assert!((label_confidence(0.6, &stats, 1e-10) - 0.75).abs() < 1e-6);
        assert_eq!(label_confidence(5.0, &stats, 1e-10), 1.0);
    }

    #[test]
    fn test_disambiguate_numbers_repeats_in_order() {
        let labels = disambiguate(&["intro", "verse", "chorus", "verse", "chorus", "outro"]);
        assert_eq!(
            labels,
            vec!["intro", "verse_1", "chorus_1", "verse_2", "chorus_2", "outro"]
        );
    }

    #[test]
    fn test_disambiguate_unique_untouched() {
        let labels = disambiguate(&[SectionKind::Intro.as_str(), SectionKind::Verse.as_str()]);
        assert_eq!(labels, vec!["intro", "verse"]);
    }
}

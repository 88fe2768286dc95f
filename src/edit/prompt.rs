// Prompt interpreter
// Short instructions -> Operation, matched token-wise against a fixed template set

use crate::edit::operation::Operation;
use crate::structure::{Arrangement, Section};

/// Supported instruction shapes, in matching priority
pub const TEMPLATES: &[&str] = &[
    "duplicate|double|repeat [the] <section>",
    "remove|delete|cut [the] <section>",
    "swap [the] <section> and [the] <section>",
    "extend [the] <section> by <N> bar(s)",
];

const DUPLICATE_VERBS: &[&str] = &["duplicate", "double", "repeat"];
const REMOVE_VERBS: &[&str] = &["remove", "delete", "cut"];

/// Parse an instruction against the sections of `arrangement`.
///
/// Targets that resolve carry the matched section's label; ones that don't keep
/// the normalized text so the executor can report exactly what was missing.
pub fn interpret(text: &str, arrangement: &Arrangement) -> Operation {
    let tokens = tokenize(text);
    let resolve = |name: String| -> String {
        find_section(&arrangement.sections, &name)
            .map(|s| s.label.clone())
            .unwrap_or(name)
    };

    let operation = match_template(&tokens)
        .map(|parsed| match parsed {
            Parsed::Duplicate(target) => Operation::Duplicate {
                target_label: resolve(target),
                times: 2,
            },
            Parsed::Remove(target) => Operation::Remove {
                target_label: resolve(target),
            },
            Parsed::Swap(a, b) => Operation::Swap {
                label_a: resolve(a),
                label_b: resolve(b),
            },
            Parsed::Extend(target, bars) => Operation::Extend {
                target_label: resolve(target),
                bars,
            },
        })
        .unwrap_or_else(|| Operation::Unknown {
            raw_text: text.trim().to_string(),
        });

    log::info!("Interpreted \"{}\" as {}", text.trim(), operation);
    if operation.is_unknown() {
        log::debug!("No template matched; supported: {}", TEMPLATES.join(" | "));
    }
    operation
}

/// Resolve a section by name: exact (case-insensitive) first, then substring
/// in either direction. Spaces and underscores are interchangeable.
pub fn find_section<'a>(sections: &'a [Section], name: &str) -> Option<&'a Section> {
    find_section_index(sections, name).map(|i| &sections[i])
}

pub fn find_section_index(sections: &[Section], name: &str) -> Option<usize> {
    let wanted = normalize_label(name);
    if wanted.is_empty() {
        return None;
    }

    let labels: Vec<String> = sections.iter().map(|s| normalize_label(&s.label)).collect();

    labels.iter().position(|l| *l == wanted).or_else(|| {
        labels
            .iter()
            .position(|l| l.contains(&wanted) || wanted.contains(l.as_str()))
    })
}

fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

enum Parsed {
    Duplicate(String),
    Remove(String),
    Swap(String, String),
    Extend(String, u32),
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '_').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn match_template(tokens: &[String]) -> Option<Parsed> {
    let (verb, rest) = tokens.split_first()?;
    let verb = verb.as_str();

    if DUPLICATE_VERBS.contains(&verb) {
        let (target, _) = take_target(rest)?;
        return Some(Parsed::Duplicate(target));
    }

    if REMOVE_VERBS.contains(&verb) {
        let (target, _) = take_target(rest)?;
        return Some(Parsed::Remove(target));
    }

    if verb == "swap" {
        let (a, rest) = take_target(rest)?;
        let rest = expect_word(rest, "and")?;
        let (b, _) = take_target(rest)?;
        return Some(Parsed::Swap(a, b));
    }

    if verb == "extend" {
        let (target, rest) = take_target(rest)?;
        let rest = expect_word(rest, "by")?;
        let (count, rest) = rest.split_first()?;
        let bars: u32 = count.parse().ok()?;
        let (unit, _) = rest.split_first()?;
        if unit != "bar" && unit != "bars" {
            return None;
        }
        return Some(Parsed::Extend(target, bars));
    }

    None
}

/// `[the] word [number]` -> "word" or "word_number"
fn take_target(tokens: &[String]) -> Option<(String, &[String])> {
    let tokens = match tokens.split_first() {
        Some((first, rest)) if first == "the" => rest,
        _ => tokens,
    };

    let (word, rest) = tokens.split_first()?;
    if !word.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }

    match rest.split_first() {
        Some((number, after)) if number.chars().all(|c| c.is_ascii_digit()) => {
            Some((format!("{}_{}", word, number), after))
        }
        _ => Some((word.clone(), rest)),
    }
}

fn expect_word<'a>(tokens: &'a [String], word: &str) -> Option<&'a [String]> {
    match tokens.split_first() {
        Some((first, rest)) if first == word => Some(rest),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrangement(labels: &[&str]) -> Arrangement {
        let sections = labels
            .iter()
            .enumerate()
            .map(|(i, l)| Section::new(*l, i as f64 * 10.0, (i + 1) as f64 * 10.0, 0.5, 0.1))
            .collect();
        Arrangement {
            bpm: 120.0,
            total_duration: labels.len() as f64 * 10.0,
            sections,
            beat_times: Vec::new(),
        }
    }

    #[test]
    fn test_duplicate_variants() {
        let arr = arrangement(&["intro", "verse", "chorus", "outro"]);
        for prompt in ["double the chorus", "Duplicate chorus", "repeat the chorus!"] {
            assert_eq!(
                interpret(prompt, &arr),
                Operation::Duplicate {
                    target_label: "chorus".into(),
                    times: 2
                },
                "prompt: {}",
                prompt
            );
        }
    }

    #[test]
    fn test_remove_unresolved_keeps_name() {
        let arr = arrangement(&["intro", "verse", "chorus", "outro"]);
        assert_eq!(
            interpret("remove the bridge", &arr),
            Operation::Remove {
                target_label: "bridge".into()
            }
        );
        assert_eq!(
            interpret("cut the intro", &arr),
            Operation::Remove {
                target_label: "intro".into()
            }
        );
    }

    #[test]
    fn test_swap_numbered_targets() {
        let arr = arrangement(&["intro", "verse_1", "chorus", "verse_2", "outro"]);
        assert_eq!(
            interpret("swap verse 1 and verse 2", &arr),
            Operation::Swap {
                label_a: "verse_1".into(),
                label_b: "verse_2".into()
            }
        );
    }

    #[test]
    fn test_swap_fuzzy_resolution() {
        let arr = arrangement(&["intro", "verse_1", "chorus", "verse_2", "outro"]);
        assert_eq!(
            interpret("swap the verse and the outro", &arr),
            Operation::Swap {
                label_a: "verse_1".into(),
                label_b: "outro".into()
            }
        );
    }

    #[test]
    fn test_extend() {
        let arr = arrangement(&["intro", "verse", "outro"]);
        assert_eq!(
            interpret("extend the intro by 8 bars", &arr),
            Operation::Extend {
                target_label: "intro".into(),
                bars: 8
            }
        );
        assert_eq!(
            interpret("extend verse by 1 bar", &arr),
            Operation::Extend {
                target_label: "verse".into(),
                bars: 1
            }
        );
        // Missing unit or count does not match the template
        assert!(interpret("extend verse by 2", &arr).is_unknown());
        assert!(interpret("extend verse by many bars", &arr).is_unknown());
    }

    #[test]
    fn test_unknown_reports_raw_text() {
        let arr = arrangement(&["verse"]);
        assert_eq!(
            interpret("make it louder", &arr),
            Operation::Unknown {
                raw_text: "make it louder".into()
            }
        );
        assert!(interpret("", &arr).is_unknown());
        assert!(interpret("double", &arr).is_unknown());
    }

    #[test]
    fn test_find_section_exact_before_substring() {
        let arr = arrangement(&["verse_1", "verse"]);
        assert_eq!(find_section_index(&arr.sections, "verse"), Some(1));
        assert_eq!(find_section_index(&arr.sections, "VERSE 1"), Some(0));
        assert_eq!(find_section_index(&arr.sections, "bridge"), None);
        assert_eq!(find_section_index(&arr.sections, "  "), None);
    }

    #[test]
    fn test_find_section_substring_both_ways() {
        let arr = arrangement(&["intro", "chorus_1", "chorus_2"]);
        // requested name inside the label
        assert_eq!(find_section(&arr.sections, "chorus").map(|s| s.label.as_str()), Some("chorus_1"));
        // label inside the requested name
        assert_eq!(find_section(&arr.sections, "intro_part").map(|s| s.label.as_str()), Some("intro"));
    }
}

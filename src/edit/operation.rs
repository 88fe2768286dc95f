// Edit operations
// Structured requests produced by the prompt interpreter and consumed by the executor

use serde::{Deserialize, Serialize};
use std::fmt;

/// One edit request. Targets are section labels as resolved against the current arrangement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    Duplicate { target_label: String, times: u32 },
    Remove { target_label: String },
    Swap { label_a: String, label_b: String },
    Extend { target_label: String, bars: u32 },
    Unknown { raw_text: String },
}

impl Operation {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Operation::Unknown { .. })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Duplicate { target_label, times } => {
                write!(f, "duplicate {} x{}", target_label, times)
            }
            Operation::Remove { target_label } => write!(f, "remove {}", target_label),
            Operation::Swap { label_a, label_b } => write!(f, "swap {} and {}", label_a, label_b),
            Operation::Extend { target_label, bars } => {
                write!(f, "extend {} by {} bars", target_label, bars)
            }
            Operation::Unknown { raw_text } => write!(f, "unknown \"{}\"", raw_text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_is_tagged() {
        let op = Operation::Swap {
            label_a: "verse".into(),
            label_b: "outro".into(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["kind"], "swap");
        assert_eq!(json["label_a"], "verse");
        assert_eq!(json["label_b"], "outro");

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_unknown_keeps_raw_text() {
        let op = Operation::Unknown {
            raw_text: "make it louder".into(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["kind"], "unknown");
        assert_eq!(json["raw_text"], "make it louder");
        assert!(op.is_unknown());
    }

    #[test]
    fn test_display() {
        let op = Operation::Extend {
            target_label: "intro".into(),
            bars: 8,
        };
        assert_eq!(op.to_string(), "extend intro by 8 bars");
    }
}

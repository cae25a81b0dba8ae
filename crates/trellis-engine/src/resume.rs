use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

impl ApprovalDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

/// The normalized human decision for a paused approval node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalInput {
    pub decision: ApprovalDecision,
    pub note: String,
}

impl ApprovalInput {
    /// Liberal parsing of whatever the caller sent back. Callers may send
    /// structured objects or freeform text, so rejection is detected rather
    /// than validated: a string containing "reject", or an object whose
    /// `decision` field equals "reject" (case-insensitive), rejects;
    /// everything else approves.
    pub fn parse(input: &Value) -> Self {
        match input {
            Value::String(raw) => Self {
                decision: if raw.to_lowercase().contains("reject") {
                    ApprovalDecision::Reject
                } else {
                    ApprovalDecision::Approve
                },
                note: String::new(),
            },
            Value::Object(map) => {
                let decision = match map.get("decision").and_then(Value::as_str) {
                    Some(raw) if raw.eq_ignore_ascii_case("reject") => ApprovalDecision::Reject,
                    _ => ApprovalDecision::Approve,
                };
                Self {
                    decision,
                    note: map
                        .get("note")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                }
            }
            _ => Self {
                decision: ApprovalDecision::Approve,
                note: String::new(),
            },
        }
    }

    /// Human-readable form used for the `input_received` log entry.
    pub fn describe(&self) -> String {
        let base = match self.decision {
            ApprovalDecision::Approve => "User approved this step.",
            ApprovalDecision::Reject => "User rejected this step.",
        };
        let note = self.note.trim();
        if note.is_empty() {
            base.to_string()
        } else {
            format!("{base} Feedback: {note}")
        }
    }
}

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Key holding the most recent node output, consumed by the next node.
pub const LAST_OUTPUT: &str = "last_output";
/// Snapshot of `last_output` taken right before an approval pause.
pub const PRE_APPROVAL_OUTPUT: &str = "pre_approval_output";
/// Suffix of the audit keys recording normalized approval decisions.
pub const APPROVAL_KEY_SUFFIX: &str = "_approval";

/// The scratchpad for one run: string keys to arbitrary JSON values.
///
/// Backed by a plain vector so that write recency is observable — the agent
/// executor's approval-leak guard scans newest-first. Lookups are linear,
/// which is fine at workflow scale (a handful of keys per run). A run is
/// strictly sequential, so there are no concurrent writers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunState {
    entries: Vec<(String, Value)>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a value. Re-setting an existing key moves it to the newest
    /// position, so recency scans see the latest write first.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.entries.retain(|(existing, _)| *existing != key);
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self
            .entries
            .iter()
            .position(|(existing, _)| existing == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Newest-first scan for the last string output that is not approval
    /// bookkeeping: skips `last_output`, `pre_approval_output`, and any
    /// `*_approval` audit key. Used to keep approval metadata out of model
    /// prompts.
    pub fn last_string_ignoring_approvals(&self) -> Option<String> {
        self.entries.iter().rev().find_map(|(key, value)| {
            if key == LAST_OUTPUT
                || key == PRE_APPROVAL_OUTPUT
                || key.ends_with(APPROVAL_KEY_SUFFIX)
            {
                return None;
            }
            value.as_str().map(str::to_string)
        })
    }
}

impl Serialize for RunState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_round_trip() {
        let mut state = RunState::new();
        state.set(LAST_OUTPUT, json!("draft"));
        state.set("node-1", json!("draft"));

        assert_eq!(state.get(LAST_OUTPUT), Some(&json!("draft")));
        assert_eq!(state.get("missing"), None);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn set_existing_key_expected_recency_refreshed() {
        let mut state = RunState::new();
        state.set("first", json!("a"));
        state.set("second", json!("b"));
        state.set("first", json!("a2"));

        let keys: Vec<&str> = state.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["second", "first"]);
        assert_eq!(state.get("first"), Some(&json!("a2")));
    }

    #[test]
    fn remove_expected_value_returned_and_key_gone() {
        let mut state = RunState::new();
        state.set(PRE_APPROVAL_OUTPUT, json!("kept"));
        assert_eq!(state.remove(PRE_APPROVAL_OUTPUT), Some(json!("kept")));
        assert_eq!(state.remove(PRE_APPROVAL_OUTPUT), None);
        assert!(state.is_empty());
    }

    #[test]
    fn last_string_ignoring_approvals_expected_newest_non_approval_string() {
        let mut state = RunState::new();
        state.set("draft-node", json!("the draft"));
        state.set("score-node", json!(42));
        state.set("gate_approval", json!({ "decision": "approve" }));
        state.set(LAST_OUTPUT, json!({ "decision": "approve", "note": "x" }));
        state.set(PRE_APPROVAL_OUTPUT, json!("snapshot"));

        assert_eq!(
            state.last_string_ignoring_approvals(),
            Some("the draft".to_string())
        );
    }

    #[test]
    fn last_string_ignoring_approvals_no_candidates_expected_none() {
        let mut state = RunState::new();
        state.set(LAST_OUTPUT, json!("ignored"));
        state.set("count-node", json!(3));
        assert_eq!(state.last_string_ignoring_approvals(), None);
    }

    #[test]
    fn serialize_expected_insertion_ordered_map() {
        let mut state = RunState::new();
        state.set("zebra", json!(1));
        state.set("apple", json!(2));
        let text = serde_json::to_string(&state).expect("state should serialize");
        assert_eq!(text, r#"{"zebra":1,"apple":2}"#);
    }
}

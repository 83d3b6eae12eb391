//! Normalization helpers shared by every backend adapter.
//!
//! Raw hits arrive in radically different shapes; everything here
//! funnels them toward the uniform [`SearchResult`] contract: missing
//! optional fields become empty strings, configured event names bind to
//! adapter-built payloads, and duplicate backend types get suffixed
//! instance ids so results stay attributable.

use crate::config::BackendDefinition;
use crate::types::{Action, ActionKind, ConfiguredEvents, EventMap};
use serde_json::Value;
use std::collections::BTreeMap;

/// String value at `key`, empty when missing or non-textual. Numbers
/// render through their display form so ids survive normalization.
pub fn text(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// String value at a nested path, empty when any step is missing.
pub fn nested_text(value: &Value, path: &[&str]) -> String {
    let mut current = value;
    for key in path {
        match current.get(key) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    match current {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// String value at a dot-separated path (`"_source.name"`), empty when
/// any step is missing.
pub fn path_text(value: &Value, dot_path: &str) -> String {
    let segments: Vec<&str> = dot_path.split('.').collect();
    nested_text(value, &segments)
}

/// Bind each configured action name, in configured order, to the
/// payload the adapter built for this hit. Names without a payload are
/// skipped — unresolved actions are inert, never errors. The resulting
/// event keys are always a subset of the configured lists.
pub fn normalize_result_events(
    configured: &ConfiguredEvents,
    possible: &BTreeMap<ActionKind, Action>,
) -> EventMap {
    let mut events = EventMap::new();
    for (interaction, kinds) in &configured.0 {
        let actions: Vec<Action> = kinds
            .iter()
            .filter_map(|kind| possible.get(kind).cloned())
            .collect();
        if !actions.is_empty() {
            events.insert(*interaction, actions);
        }
    }
    events
}

/// Instance ids for an ordered list of backend definitions.
///
/// A type tag occurring once keeps the bare tag; tags occurring more
/// than once get `_0`, `_1`, … appended in first-seen configuration
/// order, so results from sibling instances stay attributable.
pub fn assign_instance_ids(definitions: &[BackendDefinition]) -> Vec<String> {
    let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
    for definition in definitions {
        *totals.entry(definition.kind.as_str()).or_default() += 1;
    }
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    definitions
        .iter()
        .map(|definition| {
            let kind = definition.kind.as_str();
            if totals[kind] > 1 {
                let ordinal = seen.entry(kind).or_default();
                let id = format!("{kind}_{ordinal}");
                *ordinal += 1;
                id
            } else {
                kind.to_string()
            }
        })
        .collect()
}

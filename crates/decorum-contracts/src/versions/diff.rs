use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};
use similar::TextDiff;

use super::graph::VersionNode;
use crate::runs::receipts::sanitize_payload;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionDiff {
    pub from_id: String,
    pub to_id: String,
    /// `{field: {"from": .., "to": ..}}` for every design field that changed.
    pub design_changes: Map<String, Value>,
    /// Unified diff of the free-text instructions, empty when unchanged.
    pub instructions_diff: Vec<String>,
}

impl VersionDiff {
    pub fn is_empty(&self) -> bool {
        self.design_changes.is_empty() && self.instructions_diff.is_empty()
    }
}

pub(super) fn diff_nodes(parent: &VersionNode, child: &VersionNode) -> VersionDiff {
    let before = design_map(parent);
    let after = design_map(child);
    VersionDiff {
        from_id: parent.id.clone(),
        to_id: child.id.clone(),
        design_changes: field_changes(&before, &after),
        instructions_diff: text_diff(&parent.config.instructions, &child.config.instructions),
    }
}

fn design_map(node: &VersionNode) -> Map<String, Value> {
    let value = serde_json::to_value(&node.config).unwrap_or(Value::Null);
    let mut map = sanitize_payload(&value)
        .as_object()
        .cloned()
        .unwrap_or_default();
    map.remove("next_item_seq");
    map
}

fn field_changes(prev: &Map<String, Value>, curr: &Map<String, Value>) -> Map<String, Value> {
    let keys: BTreeSet<&String> = prev.keys().chain(curr.keys()).collect();
    let mut diff = Map::new();
    for key in keys {
        let left = prev.get(key);
        let right = curr.get(key);
        if left != right {
            let mut row = Map::new();
            row.insert("from".to_string(), left.cloned().unwrap_or(Value::Null));
            row.insert("to".to_string(), right.cloned().unwrap_or(Value::Null));
            diff.insert(key.clone(), Value::Object(row));
        }
    }
    diff
}

fn text_diff(prev: &str, curr: &str) -> Vec<String> {
    if prev == curr {
        return Vec::new();
    }
    TextDiff::from_lines(prev, curr)
        .unified_diff()
        .header("parent", "version")
        .to_string()
        .lines()
        .map(str::to_string)
        .collect()
}

use std::path::Path;

use serde_json::{Map, Value};

pub const RECEIPT_SCHEMA_VERSION: u64 = 1;

/// Everything a receipt records about one exported artifact.
#[derive(Debug, Clone)]
pub struct ReceiptInput<'a> {
    pub kind: &'a str,
    pub artifact_id: &'a str,
    pub parent_id: Option<&'a str>,
    pub created_at: &'a str,
    pub label: &'a str,
    pub mime_type: &'a str,
    pub sha256: &'a str,
    pub config: Value,
    pub insights: Option<Value>,
    pub artifact_path: &'a Path,
    pub receipt_path: &'a Path,
}

pub fn build_receipt(input: &ReceiptInput<'_>) -> Value {
    let mut root = Map::new();
    root.insert(
        "schema_version".to_string(),
        Value::Number(RECEIPT_SCHEMA_VERSION.into()),
    );
    root.insert("kind".to_string(), Value::String(input.kind.to_string()));
    root.insert(
        "artifact_id".to_string(),
        Value::String(input.artifact_id.to_string()),
    );
    root.insert(
        "parent_id".to_string(),
        input
            .parent_id
            .map(|value| Value::String(value.to_string()))
            .unwrap_or(Value::Null),
    );
    root.insert(
        "created_at".to_string(),
        Value::String(input.created_at.to_string()),
    );
    root.insert("label".to_string(), Value::String(input.label.to_string()));
    root.insert("config".to_string(), sanitize_payload(&input.config));
    root.insert(
        "insights".to_string(),
        input
            .insights
            .as_ref()
            .map(sanitize_payload)
            .unwrap_or(Value::Null),
    );

    let mut artifacts = Map::new();
    artifacts.insert(
        "artifact_path".to_string(),
        Value::String(input.artifact_path.to_string_lossy().to_string()),
    );
    artifacts.insert(
        "receipt_path".to_string(),
        Value::String(input.receipt_path.to_string_lossy().to_string()),
    );
    artifacts.insert(
        "mime_type".to_string(),
        Value::String(input.mime_type.to_string()),
    );
    artifacts.insert("sha256".to_string(), Value::String(input.sha256.to_string()));
    root.insert("artifacts".to_string(), Value::Object(artifacts));
    Value::Object(root)
}

pub fn write_receipt(path: &Path, payload: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(payload)?)?;
    Ok(())
}

/// Replaces inline binary payloads (base64 image data and the like) with a
/// placeholder so receipts, diffs, and logs stay readable.
pub fn sanitize_payload(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
        Value::Array(rows) => Value::Array(rows.iter().map(sanitize_payload).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, row) in map {
                let lowered = key.to_ascii_lowercase();
                if matches!(
                    lowered.as_str(),
                    "data" | "bytes" | "bytesbase64encoded" | "image_bytes" | "b64_json"
                ) {
                    out.insert(key.clone(), Value::String("<omitted>".to_string()));
                    continue;
                }
                out.insert(key.clone(), sanitize_payload(row));
            }
            Value::Object(out)
        }
    }
}

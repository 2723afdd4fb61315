use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use decorum_contracts::design::extension_for_mime;
use decorum_contracts::runs::receipts::{build_receipt, write_receipt, ReceiptInput};
use decorum_contracts::session::DesignSession;
use decorum_contracts::versions::VersionError;
use sha2::{Digest, Sha256};

/// Files written for one exported artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedArtifact {
    pub artifact_path: PathBuf,
    pub receipt_path: PathBuf,
    pub sha256: String,
}

pub fn export_version(
    session: &DesignSession,
    version_id: &str,
    out_dir: &Path,
) -> Result<ExportedArtifact> {
    let node = session
        .graph
        .get(version_id)
        .ok_or_else(|| VersionError::NotFound(version_id.to_string()))?;
    let bytes = node.image.decode()?;
    let exported = write_artifact(out_dir, &node.id, &bytes, &node.image.mime_type)?;
    let insights = node
        .insights
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;
    let payload = build_receipt(&ReceiptInput {
        kind: "image",
        artifact_id: &node.id,
        parent_id: node.parent_id.as_deref(),
        created_at: &node.timestamp,
        label: &node.prompt_used,
        mime_type: &node.image.mime_type,
        sha256: &exported.sha256,
        config: serde_json::to_value(&node.config)?,
        insights,
        artifact_path: &exported.artifact_path,
        receipt_path: &exported.receipt_path,
    });
    write_receipt(&exported.receipt_path, &payload)?;
    Ok(exported)
}

pub fn export_video(
    session: &DesignSession,
    video_id: &str,
    out_dir: &Path,
) -> Result<ExportedArtifact> {
    let entry = session
        .videos
        .get(video_id)
        .ok_or_else(|| VersionError::NotFound(video_id.to_string()))?;
    let exported = write_artifact(out_dir, &entry.id, &entry.video.bytes, &entry.video.mime_type)?;
    let payload = build_receipt(&ReceiptInput {
        kind: "video",
        artifact_id: &entry.id,
        parent_id: entry.source_version_id.as_deref(),
        created_at: &entry.timestamp,
        label: "walkthrough video",
        mime_type: &entry.video.mime_type,
        sha256: &exported.sha256,
        config: serde_json::to_value(&entry.config)?,
        insights: None,
        artifact_path: &exported.artifact_path,
        receipt_path: &exported.receipt_path,
    });
    write_receipt(&exported.receipt_path, &payload)?;
    Ok(exported)
}

/// Writes the artifact bytes under a content-addressed name and returns the
/// paths; the receipt is written by the caller.
fn write_artifact(
    out_dir: &Path,
    id: &str,
    bytes: &[u8],
    mime_type: &str,
) -> Result<ExportedArtifact> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let sha256 = sha256_hex(bytes);
    let stem = format!("decorum-{id}-{}", &sha256[..8]);
    let artifact_path = out_dir.join(format!("{stem}.{}", extension_for_mime(mime_type)));
    let receipt_path = out_dir.join(format!("{stem}.json"));

    fs::write(&artifact_path, bytes)
        .with_context(|| format!("failed to write {}", artifact_path.display()))?;

    Ok(ExportedArtifact {
        artifact_path,
        receipt_path,
        sha256,
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

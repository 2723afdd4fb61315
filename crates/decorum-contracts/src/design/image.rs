use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Image payload as the model sees it: a media type plus the raw base64
/// encoding (never a `data:` URI).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub mime_type: String,
    pub data: String,
}

impl ImageData {
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// Accepts either a raw base64 string or a full data URI.
    pub fn from_encoded(mime_type: impl Into<String>, value: &str) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: strip_data_uri_prefix(value).trim().to_string(),
        }
    }

    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let Some(mime_type) = data_uri_mime(uri) else {
            bail!("not a base64 image data URI");
        };
        Ok(Self::from_encoded(mime_type, uri))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        let mime_type = mime_for_path(path)
            .or_else(|| sniff_image_mime(&bytes))
            .unwrap_or("image/png");
        Ok(Self::from_bytes(mime_type, &bytes))
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(strip_data_uri_prefix(&self.data).trim().as_bytes())
            .context("image base64 decode failed")
    }

    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            strip_data_uri_prefix(&self.data)
        )
    }

    /// Copy with any data URI scheme prefix removed from `data`.
    pub fn normalized(&self) -> Self {
        Self {
            mime_type: self.mime_type.clone(),
            data: strip_data_uri_prefix(&self.data).to_string(),
        }
    }

    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

/// Returns the payload after `data:<mime>;base64,`. Raw encodings come back
/// unchanged, so applying it twice is the same as applying it once.
pub fn strip_data_uri_prefix(value: &str) -> &str {
    let trimmed = value.trim_start();
    let Some(rest) = trimmed.strip_prefix("data:") else {
        return value;
    };
    if let Some(idx) = rest.find(";base64,") {
        return &rest[idx + ";base64,".len()..];
    }
    match rest.find(',') {
        Some(idx) => &rest[idx + 1..],
        None => value,
    }
}

fn data_uri_mime(uri: &str) -> Option<String> {
    let rest = uri.trim_start().strip_prefix("data:")?;
    let end = rest.find(";base64,")?;
    let mime = rest[..end].trim();
    if mime.is_empty() {
        return None;
    }
    Some(mime.to_string())
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    ::image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let lowered = mime_type.to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    if lowered.contains("mp4") {
        return "mp4";
    }
    if lowered.contains("webm") {
        return "webm";
    }
    "png"
}

#[cfg(test)]
mod tests {
    use super::{extension_for_mime, strip_data_uri_prefix, ImageData};

    #[test]
    fn strip_prefix_is_idempotent_and_lossless_for_raw_input() {
        let uri = "data:image/png;base64,iVBORw0KGgo=";
        let once = strip_data_uri_prefix(uri);
        assert_eq!(once, "iVBORw0KGgo=");
        assert_eq!(strip_data_uri_prefix(once), once);
        assert_eq!(strip_data_uri_prefix("iVBORw0KGgo="), "iVBORw0KGgo=");
    }

    #[test]
    fn data_uri_round_trips_through_image_data() -> anyhow::Result<()> {
        let uri = "data:image/jpeg;base64,/9j/4AAQ";
        let image = ImageData::from_data_uri(uri)?;
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.data, "/9j/4AAQ");
        assert_eq!(image.to_data_uri(), uri);
        assert_eq!(image.normalized(), image);
        Ok(())
    }

    #[test]
    fn from_path_uses_extension_then_sniffs() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let png_header = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let named = temp.path().join("room.jpg");
        std::fs::write(&named, png_header)?;
        assert_eq!(ImageData::from_path(&named)?.mime_type, "image/jpeg");

        let unnamed = temp.path().join("room.bin");
        std::fs::write(&unnamed, png_header)?;
        let sniffed = ImageData::from_path(&unnamed)?;
        assert_eq!(sniffed.mime_type, "image/png");
        assert_eq!(sniffed.decode()?, png_header.to_vec());
        Ok(())
    }

    #[test]
    fn non_image_data_uri_is_rejected() {
        assert!(ImageData::from_data_uri("hello").is_err());
        assert!(ImageData::from_data_uri("data:;base64,AAAA").is_err());
        assert_eq!(extension_for_mime("video/mp4"), "mp4");
    }
}

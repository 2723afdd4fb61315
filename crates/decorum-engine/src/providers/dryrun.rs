use std::io::Cursor;

use anyhow::{Context, Result};
use decorum_contracts::design::ImageData;
use decorum_contracts::versions::VideoArtifact;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::json;
use sha2::{Digest, Sha256};

use super::{
    DesignModel, ImageRequest, ModelReply, ReplyPart, VideoOperation, VideoPoll, VideoRequest,
};
use crate::compiler::RequestPart;
use crate::error::GenerationError;

const DRYRUN_WIDTH: u32 = 64;
const DRYRUN_HEIGHT: u32 = 48;
const DRYRUN_URI_PREFIX: &str = "dryrun://video/";

/// Offline model: a solid-color PNG whose color is derived from the request,
/// plus a well-formed metadata block. Videos are placeholder bytes.
#[derive(Debug, Default, Clone)]
pub struct DryrunModel;

impl DryrunModel {
    pub fn new() -> Self {
        Self
    }
}

impl DesignModel for DryrunModel {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn ensure_ready(&self) -> Result<(), GenerationError> {
        Ok(())
    }

    fn generate_image(&self, request: &ImageRequest) -> Result<ModelReply> {
        let brief: String = request
            .parts
            .iter()
            .filter_map(RequestPart::as_text)
            .collect::<Vec<_>>()
            .join("\n");
        let digest = digest_of(&brief);
        let png = solid_png(DRYRUN_WIDTH, DRYRUN_HEIGHT, (digest[0], digest[1], digest[2]))?;
        let metadata = json!({
            "vibeSummary": format!("Dry run {}", hex::encode(&digest[..4])),
            "reasoning": "Synthesized offline without contacting a model.",
            "suggestions": ["Run again with a real provider to see the redesign."],
            "sustainabilityScore": u64::from(digest[3]) * 100 / 255,
        });
        Ok(ModelReply {
            parts: vec![
                ReplyPart::Image(ImageData::from_bytes("image/png", &png)),
                ReplyPart::Text(metadata.to_string()),
            ],
        })
    }

    fn start_video(&self, request: &VideoRequest) -> Result<VideoOperation> {
        let digest = digest_of(&format!("{}|{}", request.prompt, request.image.data));
        Ok(VideoOperation {
            name: format!("operations/dryrun-{}", hex::encode(&digest[..6])),
        })
    }

    fn poll_video(&self, operation: &VideoOperation) -> Result<VideoPoll> {
        let id = operation
            .name
            .rsplit('/')
            .next()
            .unwrap_or(operation.name.as_str());
        Ok(VideoPoll::Done(Some(format!("{DRYRUN_URI_PREFIX}{id}"))))
    }

    fn fetch_video(&self, uri: &str) -> Result<VideoArtifact> {
        Ok(VideoArtifact {
            mime_type: "video/mp4".to_string(),
            bytes: format!("DRYRUN-VIDEO {uri}").into_bytes(),
            source_uri: Some(uri.to_string()),
        })
    }
}

fn digest_of(text: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

fn solid_png(width: u32, height: u32, (r, g, b): (u8, u8, u8)) -> Result<Vec<u8>> {
    let mut image = RgbImage::new(width, height);
    for pixel in image.pixels_mut() {
        *pixel = Rgb([r, g, b]);
    }
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("failed to encode dry-run image")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use decorum_contracts::design::ImageData;
    use decorum_contracts::versions::{AspectRatio, Resolution};

    use super::DryrunModel;
    use crate::compiler::RequestPart;
    use crate::normalizer::normalize_reply;
    use crate::providers::{DesignModel, ImageRequest, VideoPoll, VideoRequest};

    #[test]
    fn dryrun_reply_normalizes_without_fallbacks() -> anyhow::Result<()> {
        let model = DryrunModel::new();
        let reply = model.generate_image(&ImageRequest {
            model: "dryrun-image-1".to_string(),
            parts: vec![RequestPart::Text("brief".to_string())],
        })?;
        let normalized = normalize_reply(&reply)?;
        assert!(normalized.fallback_fields.is_empty());
        assert_eq!(normalized.image.mime_type, "image/png");

        let decoded = image::load_from_memory(&normalized.image.decode()?)?;
        assert_eq!(decoded.width(), 64);
        Ok(())
    }

    #[test]
    fn dryrun_video_completes_on_first_poll() -> anyhow::Result<()> {
        let model = DryrunModel::new();
        let operation = model.start_video(&VideoRequest {
            model: "dryrun-video-1".to_string(),
            prompt: "pan".to_string(),
            image: ImageData::from_bytes("image/png", b"x"),
            resolution: Resolution::Hd,
            aspect_ratio: AspectRatio::Landscape,
        })?;
        let VideoPoll::Done(Some(uri)) = model.poll_video(&operation)? else {
            anyhow::bail!("dry-run video should finish immediately");
        };
        let artifact = model.fetch_video(&uri)?;
        assert_eq!(artifact.mime_type, "video/mp4");
        assert_eq!(artifact.source_uri.as_deref(), Some(uri.as_str()));
        Ok(())
    }
}

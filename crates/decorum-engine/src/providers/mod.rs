mod dryrun;
mod gemini;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use decorum_contracts::design::ImageData;
use decorum_contracts::versions::{AspectRatio, Resolution, VideoArtifact};
use reqwest::blocking::Response as HttpResponse;
use serde_json::Value;

use crate::compiler::RequestPart;
use crate::config::StudioConfig;
use crate::error::{truncate_text, GenerationError, ProviderHttpError};

pub use dryrun::DryrunModel;
pub use gemini::GeminiModel;

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub model: String,
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub model: String,
    pub prompt: String,
    pub image: ImageData,
    pub resolution: Resolution,
    pub aspect_ratio: AspectRatio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPart {
    Text(String),
    Image(ImageData),
}

/// Raw reply parts in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub parts: Vec<ReplyPart>,
}

/// Handle of a long-running video job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOperation {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoPoll {
    Pending,
    /// Finished. `None` when the job completed without producing a video.
    Done(Option<String>),
}

/// The external generative model. Every call blocks the caller's thread.
pub trait DesignModel: Send + Sync {
    fn name(&self) -> &str;

    /// Fails with `GenerationError::Configuration` when a call could not
    /// possibly succeed (missing credential).
    fn ensure_ready(&self) -> Result<(), GenerationError>;

    fn generate_image(&self, request: &ImageRequest) -> Result<ModelReply>;

    fn start_video(&self, request: &VideoRequest) -> Result<VideoOperation>;

    fn poll_video(&self, operation: &VideoOperation) -> Result<VideoPoll>;

    fn fetch_video(&self, uri: &str) -> Result<VideoArtifact>;
}

#[derive(Default)]
pub struct ProviderRegistry {
    models: BTreeMap<String, Arc<dyn DesignModel>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: DesignModel + 'static>(&mut self, model: M) {
        self.models
            .insert(model.name().to_string(), Arc::new(model));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DesignModel>> {
        self.models.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }
}

pub fn default_provider_registry(config: &StudioConfig) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    registry.register(DryrunModel::new());
    registry.register(GeminiModel::new(config)?);
    Ok(registry)
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        return Err(ProviderHttpError {
            provider: provider.to_string(),
            status: status.as_u16(),
            body: truncate_text(&body, 512),
        }
        .into());
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::{default_provider_registry, ProviderRegistry};
    use crate::config::StudioConfig;

    #[test]
    fn default_registry_has_offline_and_gemini_models() -> anyhow::Result<()> {
        let registry = default_provider_registry(&StudioConfig::default())?;
        assert_eq!(registry.names(), vec!["dryrun".to_string(), "gemini".to_string()]);
        assert!(registry.get("dryrun").is_some());
        assert!(ProviderRegistry::new().get("gemini").is_none());
        Ok(())
    }
}

use std::env;
use std::fmt;
use std::time::Duration;

use decorum_contracts::models::{ModelSelection, ModelSelector};

use crate::error::GenerationError;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_LIVE_WS_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

const REQUEST_TIMEOUT_S: (f64, f64, f64) = (90.0, 15.0, 300.0);
const POLL_INTERVAL_S: (f64, f64, f64) = (10.0, 0.05, 60.0);
const POLL_TIMEOUT_S: (f64, f64, f64) = (600.0, 1.0, 3600.0);

/// Runtime settings for a studio, read from the environment and optionally
/// overridden by the caller.
#[derive(Clone)]
pub struct StudioConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub live_ws_url: String,
    pub image_model: Option<String>,
    pub video_model: Option<String>,
    pub transcribe_model: Option<String>,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            live_ws_url: DEFAULT_LIVE_WS_URL.to_string(),
            image_model: None,
            video_model: None,
            transcribe_model: None,
            request_timeout: Duration::from_secs_f64(REQUEST_TIMEOUT_S.0),
            poll_interval: Duration::from_secs_f64(POLL_INTERVAL_S.0),
            poll_timeout: Duration::from_secs_f64(POLL_TIMEOUT_S.0),
        }
    }
}

impl fmt::Debug for StudioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudioConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("live_ws_url", &self.live_ws_url)
            .field("image_model", &self.image_model)
            .field("video_model", &self.video_model)
            .field("transcribe_model", &self.transcribe_model)
            .field("request_timeout", &self.request_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

impl StudioConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY")),
            api_base: non_empty_env("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            live_ws_url: non_empty_env("DECORUM_LIVE_WS_URL")
                .unwrap_or_else(|| DEFAULT_LIVE_WS_URL.to_string()),
            image_model: non_empty_env("DECORUM_IMAGE_MODEL"),
            video_model: non_empty_env("DECORUM_VIDEO_MODEL"),
            transcribe_model: non_empty_env("DECORUM_TRANSCRIBE_MODEL"),
            request_timeout: seconds_env("DECORUM_REQUEST_TIMEOUT", REQUEST_TIMEOUT_S),
            poll_interval: seconds_env("DECORUM_POLL_INTERVAL", POLL_INTERVAL_S),
            poll_timeout: seconds_env("DECORUM_POLL_TIMEOUT", POLL_TIMEOUT_S),
        }
    }

    pub fn require_api_key(&self) -> Result<&str, GenerationError> {
        self.api_key.as_deref().ok_or_else(|| {
            GenerationError::Configuration(
                "GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string(),
            )
        })
    }

    /// Resolves the model for `capability`, falling back to the registry
    /// default for `provider` when the configured one is unknown.
    pub fn select_model(
        &self,
        capability: &str,
        provider: &str,
    ) -> Result<ModelSelection, GenerationError> {
        let requested = match capability {
            decorum_contracts::models::CAPABILITY_IMAGE => self.image_model.as_deref(),
            decorum_contracts::models::CAPABILITY_VIDEO => self.video_model.as_deref(),
            decorum_contracts::models::CAPABILITY_TRANSCRIBE => self.transcribe_model.as_deref(),
            _ => None,
        };
        ModelSelector::new(None)
            .select(requested, capability, Some(provider))
            .map_err(GenerationError::Configuration)
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn seconds_env(key: &str, (default, min, max): (f64, f64, f64)) -> Duration {
    let seconds = non_empty_env(key)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .map(|value| value.clamp(min, max))
        .unwrap_or(default);
    Duration::from_secs_f64(seconds)
}

#[cfg(test)]
mod tests {
    use decorum_contracts::models::{CAPABILITY_IMAGE, CAPABILITY_TRANSCRIBE, CAPABILITY_VIDEO};

    use super::StudioConfig;
    use crate::error::GenerationError;

    #[test]
    fn debug_output_redacts_api_key() {
        let config = StudioConfig {
            api_key: Some("secret-key-123".to_string()),
            ..StudioConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-key-123"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let config = StudioConfig::default();
        assert!(matches!(
            config.require_api_key(),
            Err(GenerationError::Configuration(_))
        ));
    }

    #[test]
    fn unknown_model_falls_back_with_reason() -> anyhow::Result<()> {
        let config = StudioConfig {
            image_model: Some("not-a-model".to_string()),
            ..StudioConfig::default()
        };
        let selection = config.select_model(CAPABILITY_IMAGE, "gemini")?;
        assert_eq!(selection.model.name, "gemini-2.5-flash-image");
        assert!(selection.fallback_reason.is_some());

        let video = config.select_model(CAPABILITY_VIDEO, "dryrun")?;
        assert_eq!(video.model.name, "dryrun-video-1");

        assert!(config.select_model(CAPABILITY_TRANSCRIBE, "dryrun").is_err());
        Ok(())
    }
}

use anyhow::{bail, Context, Result};
use decorum_contracts::design::ImageData;
use decorum_contracts::versions::VideoArtifact;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    response_json_or_error, DesignModel, ImageRequest, ModelReply, ReplyPart, VideoOperation,
    VideoPoll, VideoRequest,
};
use crate::config::StudioConfig;
use crate::error::{GenerationError, ProviderHttpError};

const API_KEY_HEADER: &str = "x-goog-api-key";

const SAFETY_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "IMAGE_SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "RECITATION",
];

/// Gemini image generation and Veo video generation over the public REST API.
pub struct GeminiModel {
    api_base: String,
    api_key: Option<String>,
    http: HttpClient,
}

impl GeminiModel {
    pub fn new(config: &StudioConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    fn api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) => Ok(key),
            None => Err(GenerationError::Configuration(
                "GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string(),
            )
            .into()),
        }
    }

    fn model_endpoint(&self, model: &str, method: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:{}", self.api_base, model_path, method)
    }

    /// Sends with the credential in a header. Transport errors are stripped
    /// of their URL before they reach logs or the event stream.
    fn send(&self, request: RequestBuilder) -> Result<HttpResponse> {
        let key = self.api_key()?;
        Ok(request
            .header(API_KEY_HEADER, key)
            .send()
            .map_err(reqwest::Error::without_url)?)
    }

    fn post_json(&self, endpoint: &str, payload: &Value) -> Result<Value> {
        let response = self
            .send(self.http.post(endpoint).json(payload))
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        response_json_or_error("Gemini", response)
    }
}

impl DesignModel for GeminiModel {
    fn name(&self) -> &str {
        "gemini"
    }

    fn ensure_ready(&self) -> Result<(), GenerationError> {
        if self.api_key.is_none() {
            return Err(GenerationError::Configuration(
                "GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string(),
            ));
        }
        Ok(())
    }

    fn generate_image(&self, request: &ImageRequest) -> Result<ModelReply> {
        let endpoint = self.model_endpoint(&request.model, "generateContent");
        let parts: Vec<Value> = request.parts.iter().map(|part| part.to_json()).collect();
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
            },
        });
        debug!(model = %request.model, parts = parts.len(), "gemini generateContent");
        let response = self.post_json(&endpoint, &payload)?;
        reply_from_payload(&response)
    }

    fn start_video(&self, request: &VideoRequest) -> Result<VideoOperation> {
        let endpoint = self.model_endpoint(&request.model, "predictLongRunning");
        let image = request.image.normalized();
        let payload = json!({
            "instances": [{
                "prompt": request.prompt,
                "image": {
                    "bytesBase64Encoded": image.data,
                    "mimeType": image.mime_type,
                },
            }],
            "parameters": {
                "aspectRatio": request.aspect_ratio.as_str(),
                "resolution": request.resolution.as_str(),
            },
        });
        let response = self.post_json(&endpoint, &payload)?;
        let Some(name) = response.get("name").and_then(Value::as_str) else {
            bail!("Veo response did not include an operation name");
        };
        Ok(VideoOperation {
            name: name.to_string(),
        })
    }

    fn poll_video(&self, operation: &VideoOperation) -> Result<VideoPoll> {
        let endpoint = format!(
            "{}/{}",
            self.api_base,
            operation.name.trim_start_matches('/')
        );
        let response = self
            .send(self.http.get(&endpoint))
            .with_context(|| format!("Veo operation poll failed ({endpoint})"))?;
        let payload = response_json_or_error("Veo", response)?;
        poll_from_payload(&payload)
    }

    fn fetch_video(&self, uri: &str) -> Result<VideoArtifact> {
        let response = self
            .send(self.http.get(uri))
            .context("Veo video download failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ProviderHttpError {
                provider: "Veo".to_string(),
                status: status.as_u16(),
                body,
            }
            .into());
        }
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
            .filter(|value| value.starts_with("video/"))
            .unwrap_or_else(|| "video/mp4".to_string());
        let bytes = response
            .bytes()
            .map_err(reqwest::Error::without_url)
            .context("Veo video body read failed")?
            .to_vec();
        Ok(VideoArtifact {
            mime_type,
            bytes,
            source_uri: Some(uri.to_string()),
        })
    }
}

/// Flattens `candidates[].content.parts[]` into reply parts. Blocked prompts
/// and safety stops are surfaced as text so the normalizer can classify them.
fn reply_from_payload(payload: &Value) -> Result<ModelReply> {
    let mut parts = Vec::new();

    if let Some(reason) = payload
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(Value::as_str)
    {
        parts.push(ReplyPart::Text(format!(
            "Request blocked by safety policy ({reason})."
        )));
    }

    let candidates = payload
        .get("candidates")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for candidate in candidates {
        let rows = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for part in rows {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                parts.push(ReplyPart::Text(text.to_string()));
                continue;
            }
            let inline = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object);
            let Some(inline) = inline else {
                continue;
            };
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            parts.push(ReplyPart::Image(ImageData::from_encoded(mime_type, data)));
        }

        if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str) {
            if SAFETY_FINISH_REASONS.contains(&reason) {
                parts.push(ReplyPart::Text(format!(
                    "Generation stopped by safety policy ({reason})."
                )));
            }
        }
    }

    Ok(ModelReply { parts })
}

fn poll_from_payload(payload: &Value) -> Result<VideoPoll> {
    if !payload.get("done").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(VideoPoll::Pending);
    }
    if let Some(error) = payload.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        bail!("Veo operation failed: {message}");
    }
    let uri = payload
        .pointer("/response/generateVideoResponse/generatedSamples/0/video/uri")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(VideoPoll::Done(uri))
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    use decorum_contracts::design::ImageData;
    use serde_json::json;

    use super::{poll_from_payload, reply_from_payload, GeminiModel};
    use crate::compiler::RequestPart;
    use crate::config::StudioConfig;
    use crate::error::{GenerationError, TransportKind};
    use crate::providers::{DesignModel, ImageRequest, ReplyPart, VideoOperation, VideoPoll};

    const KEY: &str = "SECRETKEY123";

    fn keyed_config(api_base: String) -> StudioConfig {
        StudioConfig {
            api_key: Some(KEY.to_string()),
            api_base,
            request_timeout: Duration::from_secs(5),
            ..StudioConfig::default()
        }
    }

    #[test]
    fn reply_parts_keep_arrival_order() -> anyhow::Result<()> {
        let reply = reply_from_payload(&json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "{\"vibeSummary\": \"Airy\"}"},
                    {"inlineData": {"mimeType": "image/jpeg", "data": "QUJD"}},
                ]},
                "finishReason": "STOP",
            }]
        }))?;
        assert_eq!(reply.parts.len(), 2);
        assert!(matches!(&reply.parts[0], ReplyPart::Text(text) if text.contains("Airy")));
        assert!(matches!(
            &reply.parts[1],
            ReplyPart::Image(image) if image.mime_type == "image/jpeg" && image.data == "QUJD"
        ));
        Ok(())
    }

    #[test]
    fn blocked_prompts_become_refusal_text() -> anyhow::Result<()> {
        let blocked = reply_from_payload(&json!({"promptFeedback": {"blockReason": "SAFETY"}}))?;
        assert!(matches!(&blocked.parts[0], ReplyPart::Text(text) if text.contains("safety policy")));

        let stopped = reply_from_payload(&json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "IMAGE_SAFETY"}]
        }))?;
        assert_eq!(stopped.parts.len(), 1);
        Ok(())
    }

    #[test]
    fn operation_polls_report_progress_and_uri() -> anyhow::Result<()> {
        assert_eq!(poll_from_payload(&json!({"name": "op"}))?, VideoPoll::Pending);
        assert_eq!(
            poll_from_payload(&json!({
                "done": true,
                "response": {"generateVideoResponse": {"generatedSamples": [
                    {"video": {"uri": "https://files.example/v.mp4"}}
                ]}}
            }))?,
            VideoPoll::Done(Some("https://files.example/v.mp4".to_string()))
        );
        assert_eq!(poll_from_payload(&json!({"done": true}))?, VideoPoll::Done(None));
        assert!(poll_from_payload(&json!({"done": true, "error": {"message": "quota"}})).is_err());
        Ok(())
    }

    #[test]
    fn missing_key_fails_before_any_request() -> anyhow::Result<()> {
        let model = GeminiModel::new(&StudioConfig::default())?;
        assert!(model.ensure_ready().is_err());
        assert_eq!(
            model.model_endpoint("gemini-2.5-flash-image", "generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
        Ok(())
    }

    #[test]
    fn transport_errors_do_not_carry_the_key() -> anyhow::Result<()> {
        let model = GeminiModel::new(&keyed_config("http://127.0.0.1:1/v1beta".to_string()))?;
        let err = model
            .generate_image(&ImageRequest {
                model: "m".to_string(),
                parts: vec![
                    RequestPart::Text("brief".to_string()),
                    RequestPart::Image(ImageData::from_bytes("image/png", b"png")),
                ],
            })
            .err()
            .ok_or_else(|| anyhow::anyhow!("request to a closed port succeeded"))?;
        assert!(!format!("{err:#}").contains(KEY));

        let mapped = GenerationError::from_provider(err);
        assert!(matches!(
            &mapped,
            GenerationError::Transport { kind: TransportKind::Connectivity, message }
                if !message.contains(KEY)
        ));
        assert!(!mapped.to_string().contains(KEY));
        Ok(())
    }

    #[test]
    fn key_travels_in_header_not_query() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let server = thread::spawn(move || -> anyhow::Result<Vec<String>> {
            let (stream, _) = listener.accept()?;
            let mut reader = BufReader::new(stream.try_clone()?);
            let mut lines = Vec::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line)? == 0 || line == "\r\n" {
                    break;
                }
                lines.push(line.trim_end().to_ascii_lowercase());
            }
            let body = r#"{"done": false}"#;
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            )?;
            Ok(lines)
        });

        let model = GeminiModel::new(&keyed_config(format!("http://{addr}/v1beta")))?;
        let poll = model.poll_video(&VideoOperation {
            name: "operations/op-1".to_string(),
        })?;
        assert_eq!(poll, VideoPoll::Pending);

        let lines = server
            .join()
            .map_err(|_| anyhow::anyhow!("server thread panicked"))??;
        assert!(lines[0].starts_with("get /v1beta/operations/op-1 "));
        assert!(!lines[0].contains("key="));
        assert!(lines.contains(&format!("x-goog-api-key: {}", KEY.to_ascii_lowercase())));
        Ok(())
    }
}

use std::fmt;
use std::io;

use decorum_contracts::versions::VersionError;

/// The two generation pipelines. Each runs at most one cycle at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Image,
    Video,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Stream::Image => "image",
            Stream::Video => "video",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    RateLimited,
    Credential,
    Connectivity,
    Provider,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::RateLimited => "rate_limited",
            TransportKind::Credential => "credential",
            TransportKind::Connectivity => "connectivity",
            TransportKind::Provider => "provider",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("the model returned no image")]
    EmptyResult,
    #[error("the model declined the request: {0}")]
    RefusedContent(String),
    #[error("{kind} transport error: {message}")]
    Transport {
        kind: TransportKind,
        message: String,
    },
    #[error("video generation did not finish within {waited_s}s")]
    Timeout { waited_s: u64 },
    #[error("generation cancelled")]
    Cancelled,
    #[error("{0} generation already in progress")]
    Busy(Stream),
    #[error("no current version to generate from")]
    MissingBaseImage,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// Non-success HTTP reply from a model endpoint. Carried inside provider
/// `anyhow` chains so the orchestrator can classify it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{provider} request failed ({status}): {body}")]
pub struct ProviderHttpError {
    pub provider: String,
    pub status: u16,
    pub body: String,
}

impl ProviderHttpError {
    fn kind(&self) -> TransportKind {
        let body = self.body.to_ascii_uppercase();
        if self.status == 429 || body.contains("RESOURCE_EXHAUSTED") {
            return TransportKind::RateLimited;
        }
        if matches!(self.status, 401 | 403)
            || body.contains("API_KEY_INVALID")
            || body.contains("API KEY NOT VALID")
            || body.contains("PERMISSION_DENIED")
        {
            return TransportKind::Credential;
        }
        TransportKind::Provider
    }
}

impl GenerationError {
    /// Classifies a provider failure chain into the error taxonomy.
    pub fn from_provider(err: anyhow::Error) -> Self {
        let err = match err.downcast::<GenerationError>() {
            Ok(typed) => return typed,
            Err(err) => err,
        };
        let message = error_chain_text(&err, 600);

        if let Some(http) = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<ProviderHttpError>())
        {
            return GenerationError::Transport {
                kind: http.kind(),
                message,
            };
        }
        if is_connectivity_error(&err) {
            return GenerationError::Transport {
                kind: TransportKind::Connectivity,
                message,
            };
        }
        GenerationError::Transport {
            kind: TransportKind::Provider,
            message,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            GenerationError::Configuration(_) => "configuration",
            GenerationError::EmptyResult => "empty_result",
            GenerationError::RefusedContent(_) => "refused_content",
            GenerationError::Transport { kind, .. } => kind.as_str(),
            GenerationError::Timeout { .. } => "timeout",
            GenerationError::Cancelled => "cancelled",
            GenerationError::Busy(_) => "busy",
            GenerationError::MissingBaseImage => "missing_base_image",
            GenerationError::InvalidInput(_) => "invalid_input",
            GenerationError::Version(_) => "version",
        }
    }

    /// Text suitable for showing to the person driving the session.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::Configuration(detail) => {
                format!("Setup problem: {detail}")
            }
            GenerationError::EmptyResult => {
                "The model did not return an image. Try adjusting the instructions and generate again."
                    .to_string()
            }
            GenerationError::RefusedContent(_) => {
                "The model declined this request. Try rephrasing the instructions.".to_string()
            }
            GenerationError::Transport { kind, .. } => match kind {
                TransportKind::RateLimited => {
                    "Rate limit reached. Wait a minute before generating again.".to_string()
                }
                TransportKind::Credential => {
                    "The API key was rejected. Check GEMINI_API_KEY.".to_string()
                }
                TransportKind::Connectivity => {
                    "Could not reach the model service. Check your network connection.".to_string()
                }
                TransportKind::Provider => {
                    "The model service reported an error. Try again shortly.".to_string()
                }
            },
            GenerationError::Timeout { waited_s } => {
                format!("The video was not ready after {waited_s}s. Try again later.")
            }
            GenerationError::Cancelled => "Generation cancelled.".to_string(),
            GenerationError::Busy(stream) => {
                format!("A {stream} generation is already running.")
            }
            GenerationError::MissingBaseImage => {
                "Upload a room photo before generating.".to_string()
            }
            GenerationError::InvalidInput(detail) => detail.clone(),
            GenerationError::Version(err) => err.to_string(),
        }
    }
}

fn is_connectivity_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map(|reqwest_err| {
                reqwest_err.is_timeout() || reqwest_err.is_connect() || reqwest_err.is_request()
            })
            .unwrap_or(false)
            || cause
                .downcast_ref::<tungstenite::Error>()
                .map(is_tungstenite_transport_error)
                .unwrap_or(false)
            || cause
                .downcast_ref::<io::Error>()
                .map(|io_err| is_transport_io_error_kind(io_err.kind()))
                .unwrap_or(false)
    })
}

pub(crate) fn is_tungstenite_transport_error(err: &tungstenite::Error) -> bool {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => true,
        tungstenite::Error::Io(io_err) => is_transport_io_error_kind(io_err.kind()),
        tungstenite::Error::Tls(_) => true,
        _ => false,
    }
}

fn is_transport_io_error_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected
    )
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

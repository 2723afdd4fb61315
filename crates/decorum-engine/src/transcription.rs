//! Streaming speech-to-text over the Gemini Live websocket.
//!
//! A [`TranscriptionSession`] owns both the socket and the audio source for
//! its whole lifetime. Dropping it closes the socket and releases the source,
//! whichever way the session ends.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::net::TcpStream;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use tracing::{debug, info};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect as websocket_connect, Message as WsMessage, WebSocket};

pub const INPUT_SAMPLE_RATE: u32 = 16_000;
pub const INPUT_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// 100 ms of 16-bit mono audio.
const DEFAULT_CHUNK_BYTES: usize = (INPUT_SAMPLE_RATE as usize / 10) * 2;
const READ_POLL: Duration = Duration::from_millis(50);
const SETUP_TIMEOUT: Duration = Duration::from_secs(15);
const FINAL_TRANSCRIPT_WAIT: Duration = Duration::from_secs(10);

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Producer of raw 16 kHz mono little-endian PCM.
pub trait AudioSource: Send {
    /// Next chunk, or `None` once the source is exhausted.
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;

    /// Frees the underlying device or file. Called exactly once.
    fn release(&mut self) {}
}

pub struct PcmFileSource {
    reader: Option<BufReader<File>>,
    chunk_bytes: usize,
}

impl PcmFileSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed opening {}", path.display()))?;
        Ok(Self {
            reader: Some(BufReader::new(file)),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        })
    }
}

impl AudioSource for PcmFileSource {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let mut buf = vec![0u8; self.chunk_bytes];
        let mut filled = 0;
        while filled < buf.len() {
            match reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err).context("failed reading PCM audio"),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(buf))
    }

    fn release(&mut self) {
        self.reader = None;
    }
}

pub struct TranscriptionSession<S: AudioSource> {
    socket: Option<Socket>,
    source: S,
    transcript: String,
}

impl<S: AudioSource> TranscriptionSession<S> {
    /// Connects, sends the setup message and waits for the server to accept
    /// it. On failure the source has already been released.
    pub fn open(ws_url: &str, api_key: &str, model: &str, mut source: S) -> Result<Self> {
        let url = match live_url(ws_url, api_key) {
            Ok(url) => url,
            Err(err) => {
                source.release();
                return Err(err);
            }
        };
        let mut socket = match websocket_connect(url.as_str()) {
            Ok((socket, _)) => socket,
            Err(err) => {
                source.release();
                return Err(anyhow::Error::new(err)
                    .context("failed to connect live transcription websocket"));
            }
        };
        set_socket_read_timeout(&mut socket, Some(READ_POLL));

        let mut session = Self {
            socket: Some(socket),
            source,
            transcript: String::new(),
        };
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        session.send(&json!({
            "setup": {
                "model": model_path,
                "generationConfig": {"responseModalities": ["TEXT"]},
                "inputAudioTranscription": {},
            }
        }))?;
        session.await_setup()?;
        info!(model = %model_path, "live transcription session open");
        Ok(session)
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Streams the whole source, then waits for the final transcript.
    /// `on_delta` sees each transcription fragment as it arrives.
    pub fn run(&mut self, mut on_delta: impl FnMut(&str)) -> Result<String> {
        let mut frames: u64 = 0;
        while let Some(chunk) = self.source.next_chunk()? {
            self.send(&json!({
                "realtimeInput": {
                    "audio": {
                        "data": BASE64.encode(&chunk),
                        "mimeType": INPUT_MIME_TYPE,
                    }
                }
            }))?;
            frames += 1;
            while let Some(message) = self.read_message()? {
                if self.handle(&message, &mut on_delta)? {
                    break;
                }
            }
        }
        self.send(&json!({"realtimeInput": {"audioStreamEnd": true}}))?;
        debug!(frames, "audio stream ended");

        let deadline = Instant::now() + FINAL_TRANSCRIPT_WAIT;
        while Instant::now() < deadline {
            let Some(message) = self.read_message()? else {
                continue;
            };
            if self.handle(&message, &mut on_delta)? {
                break;
            }
        }
        Ok(self.transcript.clone())
    }

    fn await_setup(&mut self) -> Result<()> {
        let deadline = Instant::now() + SETUP_TIMEOUT;
        while Instant::now() < deadline {
            let Some(message) = self.read_message()? else {
                continue;
            };
            if message.get("setupComplete").is_some() {
                return Ok(());
            }
            if let Some(error) = message.get("error") {
                bail!("live session rejected setup: {}", error_message(error));
            }
        }
        bail!("live session did not confirm setup within {}s", SETUP_TIMEOUT.as_secs())
    }

    /// Returns true once the server marks the turn complete.
    fn handle(&mut self, message: &Value, on_delta: &mut impl FnMut(&str)) -> Result<bool> {
        if let Some(error) = message.get("error") {
            bail!("live session error: {}", error_message(error));
        }
        let Some(content) = message.get("serverContent") else {
            return Ok(false);
        };
        if let Some(text) = content
            .pointer("/inputTranscription/text")
            .and_then(Value::as_str)
        {
            if !text.is_empty() {
                self.transcript.push_str(text);
                on_delta(text);
            }
        }
        Ok(content
            .get("turnComplete")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    fn send(&mut self, value: &Value) -> Result<()> {
        let socket = self.socket_mut()?;
        let raw = serde_json::to_string(value).context("failed to serialize live payload")?;
        socket
            .send(WsMessage::Text(raw.into()))
            .context("failed to send live payload")
    }

    /// `Ok(None)` when nothing arrived within the read poll window.
    fn read_message(&mut self) -> Result<Option<Value>> {
        let socket = self.socket_mut()?;
        let message = match socket.read() {
            Ok(message) => message,
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                return Ok(None);
            }
            Err(err) => return Err(anyhow::Error::new(err).context("live socket read failed")),
        };
        let raw = match message {
            WsMessage::Text(text) => text.to_string(),
            WsMessage::Binary(bytes) => String::from_utf8_lossy(&bytes).to_string(),
            WsMessage::Close(_) => bail!("live socket closed by server"),
            _ => return Ok(None),
        };
        Ok(serde_json::from_str(&raw).ok())
    }

    fn socket_mut(&mut self) -> Result<&mut Socket> {
        match self.socket.as_mut() {
            Some(socket) => Ok(socket),
            None => bail!("live session already closed"),
        }
    }
}

impl<S: AudioSource> Drop for TranscriptionSession<S> {
    fn drop(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None);
            let _ = socket.flush();
        }
        self.source.release();
        debug!("live transcription session closed");
    }
}

/// Opens a session, streams `source` through it and returns the transcript.
pub fn transcribe_stream<S: AudioSource>(
    ws_url: &str,
    api_key: &str,
    model: &str,
    source: S,
    on_delta: impl FnMut(&str),
) -> Result<String> {
    let mut session = TranscriptionSession::open(ws_url, api_key, model, source)?;
    session.run(on_delta)
}

fn live_url(ws_url: &str, api_key: &str) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(ws_url)
        .with_context(|| format!("invalid live websocket url: {ws_url}"))?;
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

fn set_socket_read_timeout(socket: &mut Socket, timeout: Option<Duration>) {
    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => {
            let _ = stream.set_read_timeout(timeout);
        }
        MaybeTlsStream::Rustls(stream) => {
            let _ = stream.get_mut().set_read_timeout(timeout);
        }
        _ => {}
    }
}

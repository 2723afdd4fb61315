use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use decorum_contracts::design::{DesignState, ImageData};
use decorum_contracts::events::{EventPayload, EventWriter};
use decorum_contracts::models::{CAPABILITY_IMAGE, CAPABILITY_VIDEO};
use decorum_contracts::session::DesignSession;
use decorum_contracts::versions::VersionError;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::compiler::{compile_design_request, compile_video_prompt, version_label, BaseVersion};
use crate::config::StudioConfig;
use crate::error::{GenerationError, Stream};
use crate::normalizer::normalize_reply;
use crate::providers::{DesignModel, ImageRequest, VideoPoll, VideoRequest};

const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(100);

/// Where a stream is in its generation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Compiling,
    AwaitingModel,
    Normalizing,
    Appended,
    Failed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Compiling => "compiling",
            Phase::AwaitingModel => "awaiting_model",
            Phase::Normalizing => "normalizing",
            Phase::Appended => "appended",
            Phase::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StudioOptions {
    pub image_model: String,
    pub video_model: String,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub events_path: Option<PathBuf>,
}

impl StudioOptions {
    /// Resolves model names for `provider` and copies the polling bounds.
    pub fn from_config(config: &StudioConfig, provider: &str) -> Result<Self, GenerationError> {
        let image = config.select_model(CAPABILITY_IMAGE, provider)?;
        let video = config.select_model(CAPABILITY_VIDEO, provider)?;
        for (selection, capability) in [(&image, CAPABILITY_IMAGE), (&video, CAPABILITY_VIDEO)] {
            if let (Some(requested), Some(reason)) =
                (selection.requested.as_deref(), selection.fallback_reason.as_deref())
            {
                warn!(capability, requested, model = %selection.model.name, "{reason}");
            }
        }
        Ok(Self {
            image_model: image.model.name,
            video_model: video.model.name,
            poll_interval: config.poll_interval,
            poll_timeout: config.poll_timeout,
            events_path: None,
        })
    }
}

/// Drives generation cycles against one [`DesignModel`] for one session.
///
/// Image and video streams each run at most one cycle at a time; a second
/// request while a stream is busy fails with [`GenerationError::Busy`]. The
/// session lock is never held while the model is working, so edits and
/// navigation stay responsive during a long video job.
pub struct Studio {
    model: Arc<dyn DesignModel>,
    options: StudioOptions,
    session: Mutex<DesignSession>,
    events: Mutex<EventWriter>,
    image_phase: Mutex<Phase>,
    video_phase: Mutex<Phase>,
    cancel_video: AtomicBool,
}

struct StreamGuard<'a> {
    cell: &'a Mutex<Phase>,
}

impl<'a> StreamGuard<'a> {
    fn acquire(cell: &'a Mutex<Phase>, stream: Stream) -> Result<Self, GenerationError> {
        Self::acquire_with(cell, stream, || {})
    }

    /// Claims the stream and runs `on_claim` while the phase lock is held.
    fn acquire_with(
        cell: &'a Mutex<Phase>,
        stream: Stream,
        on_claim: impl FnOnce(),
    ) -> Result<Self, GenerationError> {
        let mut phase = lock(cell);
        if *phase != Phase::Idle {
            return Err(GenerationError::Busy(stream));
        }
        *phase = Phase::Compiling;
        on_claim();
        Ok(Self { cell })
    }

    fn set(&self, phase: Phase) {
        *lock(self.cell) = phase;
    }
}

impl Drop for StreamGuard<'_> {
    fn drop(&mut self) {
        *lock(self.cell) = Phase::Idle;
    }
}

fn lock<T>(cell: &Mutex<T>) -> MutexGuard<'_, T> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ImageJob {
    parent_id: String,
    base_image: ImageData,
    design: DesignState,
}

impl Studio {
    pub fn new(model: Arc<dyn DesignModel>, options: StudioOptions) -> Self {
        let session = DesignSession::new();
        let events = event_writer(options.events_path.clone(), &session.session_id);
        info!(
            provider = model.name(),
            image_model = %options.image_model,
            video_model = %options.video_model,
            session_id = %session.session_id,
            "studio ready"
        );
        Self {
            model,
            options,
            session: Mutex::new(session),
            events: Mutex::new(events),
            image_phase: Mutex::new(Phase::Idle),
            video_phase: Mutex::new(Phase::Idle),
            cancel_video: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &StudioOptions {
        &self.options
    }

    pub fn provider_name(&self) -> &str {
        self.model.name()
    }

    pub fn phase(&self, stream: Stream) -> Phase {
        *lock(self.phase_cell(stream))
    }

    /// Runs `f` with exclusive access to the session. Do not call back into
    /// the studio from inside `f`.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut DesignSession) -> R) -> R {
        let mut session = lock(&self.session);
        f(&mut session)
    }

    pub fn snapshot(&self) -> DesignSession {
        lock(&self.session).clone()
    }

    pub fn session_id(&self) -> String {
        lock(&self.session).session_id.clone()
    }

    /// Stores a room photo as the root of the history. Uploading over an
    /// existing history starts it over; the design form is kept. Refused
    /// while a video is rendering.
    pub fn upload_original(&self, image: ImageData) -> Result<String, GenerationError> {
        let guard = StreamGuard::acquire(&self.image_phase, Stream::Image)?;
        let _video = StreamGuard::acquire(&self.video_phase, Stream::Video)?;
        let (id, replaced) = self.with_session(|session| {
            let replaced = session.graph.len();
            if replaced > 0 {
                session.graph.clear();
                session.videos.clear();
            }
            let config = session.design.clone();
            session
                .graph
                .append(None, image, config, "", None)
                .map(|id| (id, replaced))
        })?;
        guard.set(Phase::Appended);
        self.emit(
            "original_uploaded",
            json!({"version_id": id, "replaced_versions": replaced}),
        );
        Ok(id)
    }

    /// Redesigns the current version with the live design form.
    pub fn generate_image(&self) -> Result<String, GenerationError> {
        let guard = StreamGuard::acquire(&self.image_phase, Stream::Image)?;
        let result = self.model.ensure_ready().and_then(|()| {
            let job = self.with_session(|session| {
                let (parent_id, base_image) = session
                    .generation_base()
                    .ok_or(GenerationError::MissingBaseImage)?;
                Ok::<_, GenerationError>(ImageJob {
                    parent_id,
                    base_image,
                    design: session.design.clone(),
                })
            })?;
            self.run_image_cycle(&guard, job)
        });
        self.finish(&guard, Stream::Image, result)
    }

    /// Re-runs the design of version `id` against that version's parent
    /// image, producing a sibling.
    pub fn regenerate(&self, id: &str) -> Result<String, GenerationError> {
        let guard = StreamGuard::acquire(&self.image_phase, Stream::Image)?;
        let result = self.model.ensure_ready().and_then(|()| {
            let job = self.with_session(|session| {
                let node = session
                    .graph
                    .get(id)
                    .ok_or_else(|| VersionError::NotFound(id.to_string()))?;
                let parent_id = node
                    .parent_id
                    .clone()
                    .ok_or_else(|| VersionError::NoParent(id.to_string()))?;
                let parent = session
                    .graph
                    .get(&parent_id)
                    .ok_or_else(|| VersionError::InvalidParent(parent_id.clone()))?;
                Ok::<_, GenerationError>(ImageJob {
                    base_image: parent.image.clone(),
                    design: node.config.clone(),
                    parent_id,
                })
            })?;
            self.run_image_cycle(&guard, job)
        });
        self.finish(&guard, Stream::Image, result)
    }

    fn run_image_cycle(&self, guard: &StreamGuard<'_>, job: ImageJob) -> Result<String, GenerationError> {
        let ImageJob {
            parent_id,
            base_image,
            design,
        } = job;
        let base = if self
            .with_session(|session| session.graph.get(&parent_id).map(|node| node.is_root()))
            .unwrap_or(true)
        {
            BaseVersion::Initial
        } else {
            BaseVersion::Version(&parent_id)
        };
        let parts = compile_design_request(&base_image, &design, base);
        let label = version_label(&design);

        guard.set(Phase::AwaitingModel);
        self.emit(
            "generation_started",
            json!({
                "stream": Stream::Image.as_str(),
                "parent_id": parent_id,
                "model": self.options.image_model,
                "parts": parts.len(),
                "label": label,
            }),
        );
        let started = Instant::now();
        let reply = self
            .model
            .generate_image(&ImageRequest {
                model: self.options.image_model.clone(),
                parts,
            })
            .map_err(GenerationError::from_provider)?;

        guard.set(Phase::Normalizing);
        let normalized = normalize_reply(&reply)?;
        if !normalized.fallback_fields.is_empty() {
            debug!(
                fields = ?normalized.fallback_fields,
                metadata_found = normalized.metadata_found,
                "model metadata incomplete; defaults applied"
            );
        }
        let insights = normalized
            .metadata_found
            .then(|| normalized.insights.clone());

        let id = self.with_session(|session| {
            session
                .graph
                .append(Some(&parent_id), normalized.image, design, label.clone(), insights)
        })?;
        self.emit(
            "version_created",
            json!({
                "version_id": id,
                "parent_id": parent_id,
                "label": label,
                "latency_s": started.elapsed().as_secs_f64(),
                "fallback_fields": normalized.fallback_fields,
            }),
        );
        Ok(id)
    }

    /// Renders a walkthrough video of the current version with the live
    /// video parameters. Blocks until the job finishes, times out or is
    /// cancelled through [`Studio::cancel_video`].
    pub fn generate_video(&self) -> Result<String, GenerationError> {
        let guard = StreamGuard::acquire_with(&self.video_phase, Stream::Video, || {
            self.cancel_video.store(false, Ordering::SeqCst)
        })?;
        let result = self
            .model
            .ensure_ready()
            .and_then(|()| self.run_video_cycle(&guard));
        self.finish(&guard, Stream::Video, result)
    }

    fn run_video_cycle(&self, guard: &StreamGuard<'_>) -> Result<String, GenerationError> {
        let (source_id, image, video_state, prompt) = self.with_session(|session| {
            session
                .video
                .validate()
                .map_err(GenerationError::InvalidInput)?;
            let (source_id, image) = session
                .generation_base()
                .ok_or(GenerationError::MissingBaseImage)?;
            let prompt = compile_video_prompt(&session.video, &session.design);
            Ok::<_, GenerationError>((source_id, image, session.video.clone(), prompt))
        })?;

        guard.set(Phase::AwaitingModel);
        self.emit(
            "generation_started",
            json!({
                "stream": Stream::Video.as_str(),
                "source_version_id": source_id,
                "model": self.options.video_model,
                "resolution": video_state.resolution.as_str(),
                "aspect_ratio": video_state.aspect_ratio.as_str(),
            }),
        );
        let operation = self
            .model
            .start_video(&VideoRequest {
                model: self.options.video_model.clone(),
                prompt,
                image,
                resolution: video_state.resolution,
                aspect_ratio: video_state.aspect_ratio,
            })
            .map_err(GenerationError::from_provider)?;
        self.emit(
            "video_operation_started",
            json!({"operation": operation.name}),
        );

        let started = Instant::now();
        let mut attempt: u64 = 0;
        let uri = loop {
            if self.cancel_video.load(Ordering::SeqCst) {
                return Err(GenerationError::Cancelled);
            }
            attempt += 1;
            let poll = self
                .model
                .poll_video(&operation)
                .map_err(GenerationError::from_provider)?;
            self.emit(
                "video_poll",
                json!({
                    "operation": operation.name,
                    "attempt": attempt,
                    "done": poll != VideoPoll::Pending,
                    "elapsed_s": started.elapsed().as_secs_f64(),
                }),
            );
            match poll {
                VideoPoll::Done(Some(uri)) => break uri,
                VideoPoll::Done(None) => return Err(GenerationError::EmptyResult),
                VideoPoll::Pending => {}
            }
            let elapsed = started.elapsed();
            if elapsed >= self.options.poll_timeout {
                return Err(GenerationError::Timeout {
                    waited_s: elapsed.as_secs(),
                });
            }
            self.sleep_unless_cancelled(self.options.poll_interval);
        };

        guard.set(Phase::Normalizing);
        let video = self
            .model
            .fetch_video(&uri)
            .map_err(GenerationError::from_provider)?;
        let bytes = video.bytes.len();
        let id = self.with_session(|session| {
            session
                .videos
                .add(video, video_state, Some(source_id.clone()))
        });
        self.emit(
            "video_created",
            json!({
                "video_id": id,
                "source_version_id": source_id,
                "bytes": bytes,
                "polls": attempt,
            }),
        );
        Ok(id)
    }

    fn sleep_unless_cancelled(&self, total: Duration) {
        let deadline = Instant::now() + total;
        loop {
            if self.cancel_video.load(Ordering::SeqCst) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep(CANCEL_CHECK_SLICE.min(deadline - now));
        }
    }

    /// Asks a running video cycle to stop at its next poll.
    pub fn cancel_video(&self) {
        let phase = lock(&self.video_phase);
        if *phase != Phase::Idle {
            info!("video cancellation requested");
            self.cancel_video.store(true, Ordering::SeqCst);
        }
    }

    /// Discards the session and starts a fresh one. Refused while either
    /// stream is mid-cycle.
    pub fn new_project(&self) -> Result<String, GenerationError> {
        let _image = StreamGuard::acquire(&self.image_phase, Stream::Image)?;
        let _video = StreamGuard::acquire(&self.video_phase, Stream::Video)?;
        let (previous, session_id) = self.with_session(|session| {
            let previous = session.session_id.clone();
            session.reset();
            (previous, session.session_id.clone())
        });
        {
            let mut events = lock(&self.events);
            *events = event_writer(events.path().map(PathBuf::from), &session_id);
        }
        self.emit("project_reset", json!({"previous_session_id": previous}));
        Ok(session_id)
    }

    fn finish(
        &self,
        guard: &StreamGuard<'_>,
        stream: Stream,
        result: Result<String, GenerationError>,
    ) -> Result<String, GenerationError> {
        match &result {
            Ok(id) => {
                guard.set(Phase::Appended);
                info!(stream = stream.as_str(), id = %id, "generation finished");
            }
            Err(err) => {
                guard.set(Phase::Failed);
                warn!(stream = stream.as_str(), kind = err.kind_name(), "generation failed: {err}");
                self.emit(
                    "generation_failed",
                    json!({
                        "stream": stream.as_str(),
                        "error_kind": err.kind_name(),
                        "error": err.to_string(),
                    }),
                );
            }
        }
        result
    }

    fn phase_cell(&self, stream: Stream) -> &Mutex<Phase> {
        match stream {
            Stream::Image => &self.image_phase,
            Stream::Video => &self.video_phase,
        }
    }

    fn emit(&self, event_type: &str, payload: Value) {
        let payload: EventPayload = match payload {
            Value::Object(map) => map,
            _ => EventPayload::new(),
        };
        let events = lock(&self.events).clone();
        if let Err(err) = events.emit(event_type, payload) {
            warn!(event_type, "failed to write event: {err:#}");
        }
    }
}

fn event_writer(path: Option<PathBuf>, session_id: &str) -> EventWriter {
    match path {
        Some(path) => EventWriter::new(path, session_id),
        None => EventWriter::disabled(session_id),
    }
}

use serde::{Deserialize, Serialize};

use super::{monotonic_timestamp, VersionError};

pub const MOTION_INTENSITY_MIN: u8 = 1;
pub const MOTION_INTENSITY_MAX: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Resolution {
    #[default]
    #[serde(rename = "720p")]
    Hd,
    #[serde(rename = "1080p")]
    FullHd,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Hd => "720p",
            Resolution::FullHd => "1080p",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "720p" | "720" | "hd" => Some(Resolution::Hd),
            "1080p" | "1080" | "fullhd" | "full-hd" => Some(Resolution::FullHd),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "16:9" | "landscape" | "wide" => Some(AspectRatio::Landscape),
            "9:16" | "portrait" | "tall" => Some(AspectRatio::Portrait),
            _ => None,
        }
    }
}

/// Parameters for the next walkthrough video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoState {
    pub resolution: Resolution,
    pub aspect_ratio: AspectRatio,
    pub style: String,
    pub motion_intensity: u8,
    pub prompt: String,
}

impl Default for VideoState {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            aspect_ratio: AspectRatio::default(),
            style: "cinematic".to_string(),
            motion_intensity: 5,
            prompt: String::new(),
        }
    }
}

impl VideoState {
    pub fn validate(&self) -> Result<(), String> {
        if !(MOTION_INTENSITY_MIN..=MOTION_INTENSITY_MAX).contains(&self.motion_intensity) {
            return Err(format!(
                "motion intensity must be between {MOTION_INTENSITY_MIN} and {MOTION_INTENSITY_MAX}, got {}",
                self.motion_intensity
            ));
        }
        Ok(())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct VideoArtifact {
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub source_uri: Option<String>,
}

impl std::fmt::Debug for VideoArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoArtifact")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .field("source_uri", &self.source_uri)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoVersion {
    pub id: String,
    pub timestamp: String,
    pub video: VideoArtifact,
    pub config: VideoState,
    pub source_version_id: Option<String>,
}

/// Flat list of generated videos; no branching.
#[derive(Debug, Clone, Default)]
pub struct VideoHistory {
    versions: Vec<VideoVersion>,
    next_seq: u64,
    last_timestamp: Option<String>,
}

impl VideoHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        video: VideoArtifact,
        config: VideoState,
        source_version_id: Option<String>,
    ) -> String {
        self.next_seq += 1;
        let id = format!("vid{}", self.next_seq);
        let timestamp = monotonic_timestamp(self.last_timestamp.as_deref());
        self.last_timestamp = Some(timestamp.clone());
        self.versions.push(VideoVersion {
            id: id.clone(),
            timestamp,
            video,
            config,
            source_version_id,
        });
        id
    }

    pub fn remove(&mut self, id: &str) -> Result<VideoVersion, VersionError> {
        let idx = self
            .versions
            .iter()
            .position(|entry| entry.id == id)
            .ok_or_else(|| VersionError::NotFound(id.to_string()))?;
        Ok(self.versions.remove(idx))
    }

    pub fn get(&self, id: &str) -> Option<&VideoVersion> {
        self.versions.iter().find(|entry| entry.id == id)
    }

    pub fn latest(&self) -> Option<&VideoVersion> {
        self.versions.last()
    }

    pub fn list(&self) -> &[VideoVersion] {
        &self.versions
    }

    pub fn clear(&mut self) {
        self.versions.clear();
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{AspectRatio, Resolution, VideoArtifact, VideoHistory, VideoState};
    use crate::versions::VersionError;

    fn clip(tag: &str) -> VideoArtifact {
        VideoArtifact {
            mime_type: "video/mp4".to_string(),
            bytes: tag.as_bytes().to_vec(),
            source_uri: None,
        }
    }

    #[test]
    fn history_is_flat_and_ids_are_not_reused() -> anyhow::Result<()> {
        let mut history = VideoHistory::new();
        let first = history.add(clip("a"), VideoState::default(), Some("v2".to_string()));
        let second = history.add(clip("b"), VideoState::default(), None);
        history.remove(&first)?;
        let third = history.add(clip("c"), VideoState::default(), None);

        assert_eq!(history.len(), 2);
        assert_ne!(third, first);
        assert_eq!(history.latest().map(|v| v.id.as_str()), Some(third.as_str()));
        assert!(history.get(&second).is_some());
        assert_eq!(
            history.remove("vid99").err(),
            Some(VersionError::NotFound("vid99".to_string()))
        );
        Ok(())
    }

    #[test]
    fn stamps_stay_ordered_after_removing_latest() {
        let mut history = VideoHistory::new();
        let ahead = "2999-01-01T00:00:00.000000+00:00";
        history.last_timestamp = Some(ahead.to_string());
        let latest = history.add(clip("a"), VideoState::default(), None);
        assert!(history.remove(&latest).is_ok());
        history.add(clip("b"), VideoState::default(), None);
        assert_eq!(history.latest().map(|v| v.timestamp.as_str()), Some(ahead));
    }

    #[test]
    fn motion_intensity_bounds_are_validated() {
        let mut state = VideoState::default();
        assert!(state.validate().is_ok());
        state.motion_intensity = 0;
        assert!(state.validate().is_err());
        state.motion_intensity = 11;
        assert!(state.validate().is_err());
        state.motion_intensity = 10;
        assert!(state.validate().is_ok());
    }

    #[test]
    fn video_options_parse_and_serialize() -> anyhow::Result<()> {
        assert_eq!(Resolution::parse("1080"), Some(Resolution::FullHd));
        assert_eq!(AspectRatio::parse("portrait"), Some(AspectRatio::Portrait));
        assert_eq!(serde_json::to_value(Resolution::Hd)?, serde_json::json!("720p"));
        assert_eq!(
            serde_json::to_value(AspectRatio::Portrait)?,
            serde_json::json!("9:16")
        );
        Ok(())
    }
}

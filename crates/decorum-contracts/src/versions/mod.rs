mod diff;
mod graph;
mod video;

pub use diff::VersionDiff;
pub use graph::{DesignInsights, VersionGraph, VersionNode, ORIGINAL_UPLOAD_LABEL};
pub use video::{
    AspectRatio, Resolution, VideoArtifact, VideoHistory, VideoState, VideoVersion,
    MOTION_INTENSITY_MAX, MOTION_INTENSITY_MIN,
};

/// Contract violations on the version collections. These indicate a caller
/// bug rather than a user-facing condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("parent version '{0}' does not exist")]
    InvalidParent(String),
    #[error("version '{0}' not found")]
    NotFound(String),
    #[error("version '{0}' has no parent")]
    NoParent(String),
    #[error("no version is selected")]
    NoSelection,
}

/// Current UTC time as RFC 3339 with microseconds.
pub fn now_utc_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}

/// Fixed-width RFC 3339 strings compare in chronological order, so clamping
/// against the previous value keeps a collection's timestamps non-decreasing.
pub(crate) fn monotonic_timestamp(previous: Option<&str>) -> String {
    let now = now_utc_iso();
    match previous {
        Some(prev) if prev > now.as_str() => prev.to_string(),
        _ => now,
    }
}

use uuid::Uuid;

use crate::design::{DesignState, ImageData};
use crate::versions::{now_utc_iso, VersionGraph, VideoHistory, VideoState};

/// Everything one design project owns: the live form, the image tree, the
/// video parameters and the produced videos.
#[derive(Debug, Clone)]
pub struct DesignSession {
    pub session_id: String,
    pub created_at: String,
    pub design: DesignState,
    pub graph: VersionGraph,
    pub video: VideoState,
    pub videos: VideoHistory,
}

impl Default for DesignSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DesignSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            created_at: now_utc_iso(),
            design: DesignState::new(),
            graph: VersionGraph::new(),
            video: VideoState::default(),
            videos: VideoHistory::new(),
        }
    }

    /// Starts a new project: fresh id, default form, empty histories.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Current node id and image, the base for the next generation.
    pub fn generation_base(&self) -> Option<(String, ImageData)> {
        self.graph
            .current()
            .map(|node| (node.id.clone(), node.image.clone()))
    }

    /// Loads a node's design back into the live form and selects it.
    pub fn restore(&mut self, version_id: &str) -> Result<(), crate::versions::VersionError> {
        self.design = self.graph.select(version_id)?;
        Ok(())
    }
}

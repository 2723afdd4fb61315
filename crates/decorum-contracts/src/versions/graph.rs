use serde::{Deserialize, Serialize};

use super::diff::{diff_nodes, VersionDiff};
use super::{monotonic_timestamp, VersionError};
use crate::design::{DesignState, ImageData};

/// Label carried by every original upload.
pub const ORIGINAL_UPLOAD_LABEL: &str = "Original Upload";

/// Structured commentary the model returned alongside an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignInsights {
    pub vibe_summary: String,
    pub reasoning: String,
    pub suggestions: Vec<String>,
    pub sustainability_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub timestamp: String,
    pub image: ImageData,
    pub config: DesignState,
    pub prompt_used: String,
    pub insights: Option<DesignInsights>,
}

impl VersionNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Append-only tree of generated images plus the current selection.
///
/// Node contents never change after insertion. The only rewrite is the
/// parent link of children whose parent gets removed: they move up to the
/// removed node's parent, so no node ever points at a missing parent.
#[derive(Debug, Clone, Default)]
pub struct VersionGraph {
    nodes: Vec<VersionNode>,
    current: Option<String>,
    next_seq: u64,
    /// Newest stamp ever issued, kept across removals.
    last_timestamp: Option<String>,
}

impl VersionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node and makes it current. A `None` parent creates a root,
    /// which always carries [`ORIGINAL_UPLOAD_LABEL`].
    pub fn append(
        &mut self,
        parent_id: Option<&str>,
        image: ImageData,
        config: DesignState,
        prompt_used: impl Into<String>,
        insights: Option<DesignInsights>,
    ) -> Result<String, VersionError> {
        if let Some(parent) = parent_id {
            if self.get(parent).is_none() {
                return Err(VersionError::InvalidParent(parent.to_string()));
            }
        }
        let prompt_used = match parent_id {
            Some(_) => prompt_used.into(),
            None => ORIGINAL_UPLOAD_LABEL.to_string(),
        };
        self.next_seq += 1;
        let id = format!("v{}", self.next_seq);
        let timestamp = monotonic_timestamp(self.last_timestamp.as_deref());
        self.last_timestamp = Some(timestamp.clone());
        self.nodes.push(VersionNode {
            id: id.clone(),
            parent_id: parent_id.map(str::to_string),
            timestamp,
            image: image.normalized(),
            config,
            prompt_used,
            insights,
        });
        self.current = Some(id.clone());
        Ok(id)
    }

    /// Makes `id` current and hands back a copy of the design that produced it.
    pub fn select(&mut self, id: &str) -> Result<DesignState, VersionError> {
        let config = self
            .get(id)
            .map(|node| node.config.clone())
            .ok_or_else(|| VersionError::NotFound(id.to_string()))?;
        self.current = Some(id.to_string());
        Ok(config)
    }

    pub fn remove(&mut self, id: &str) -> Result<VersionNode, VersionError> {
        let idx = self
            .position(id)
            .ok_or_else(|| VersionError::NotFound(id.to_string()))?;
        let removed = self.nodes.remove(idx);
        for node in self.nodes.iter_mut() {
            if node.parent_id.as_deref() == Some(removed.id.as_str()) {
                node.parent_id = removed.parent_id.clone();
            }
        }
        if self.current.as_deref() == Some(removed.id.as_str()) {
            self.current = self.most_recent().map(|node| node.id.clone());
        }
        Ok(removed)
    }

    /// Moves the selection to the current node's parent.
    pub fn undo(&mut self) -> Result<String, VersionError> {
        let current = self.current().ok_or(VersionError::NoSelection)?;
        let parent = current
            .parent_id
            .clone()
            .ok_or_else(|| VersionError::NoParent(current.id.clone()))?;
        self.current = Some(parent.clone());
        Ok(parent)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.current = None;
    }

    pub fn get(&self, id: &str) -> Option<&VersionNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn current(&self) -> Option<&VersionNode> {
        self.current.as_deref().and_then(|id| self.get(id))
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> &[VersionNode] {
        &self.nodes
    }

    pub fn children(&self, id: &str) -> Vec<&VersionNode> {
        self.nodes
            .iter()
            .filter(|node| node.parent_id.as_deref() == Some(id))
            .collect()
    }

    /// Path from the root down to `id`, inclusive.
    pub fn lineage(&self, id: &str) -> Result<Vec<&VersionNode>, VersionError> {
        let mut cursor = self
            .get(id)
            .ok_or_else(|| VersionError::NotFound(id.to_string()))?;
        let mut path = vec![cursor];
        while let Some(parent_id) = cursor.parent_id.as_deref() {
            let Some(parent) = self.get(parent_id) else {
                break;
            };
            if path.len() > self.nodes.len() {
                break;
            }
            path.push(parent);
            cursor = parent;
        }
        path.reverse();
        Ok(path)
    }

    /// What changed between `id` and its parent. `None` for roots.
    pub fn diff(&self, id: &str) -> Result<Option<VersionDiff>, VersionError> {
        let node = self
            .get(id)
            .ok_or_else(|| VersionError::NotFound(id.to_string()))?;
        let Some(parent) = node.parent_id.as_deref().and_then(|pid| self.get(pid)) else {
            return Ok(None);
        };
        Ok(Some(diff_nodes(parent, node)))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == id)
    }

    // Latest timestamp wins; equal timestamps resolve to the later insertion.
    fn most_recent(&self) -> Option<&VersionNode> {
        self.nodes
            .iter()
            .enumerate()
            .max_by(|(left_idx, left), (right_idx, right)| {
                left.timestamp
                    .cmp(&right.timestamp)
                    .then(left_idx.cmp(right_idx))
            })
            .map(|(_, node)| node)
    }
}

#[cfg(test)]
mod tests {
    use super::{DesignInsights, VersionGraph, ORIGINAL_UPLOAD_LABEL};
    use crate::design::{DesignState, DesignStyle, ImageData};
    use crate::versions::VersionError;

    fn image(tag: &str) -> ImageData {
        ImageData::from_bytes("image/png", tag.as_bytes())
    }

    fn seeded() -> anyhow::Result<(VersionGraph, String)> {
        let mut graph = VersionGraph::new();
        let root = graph.append(None, image("root"), DesignState::new(), "ignored", None)?;
        Ok((graph, root))
    }

    #[test]
    fn branching_from_root_creates_siblings() -> anyhow::Result<()> {
        let (mut graph, root) = seeded()?;
        let c1 = graph.append(Some(&root), image("c1"), DesignState::new(), "first", None)?;
        let c2 = graph.append(Some(&root), image("c2"), DesignState::new(), "second", None)?;

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.children(&root).len(), 2);
        assert_eq!(graph.current_id(), Some(c2.as_str()));
        assert_ne!(c1, c2);
        assert_eq!(graph.get(&root).map(|n| n.prompt_used.as_str()), Some(ORIGINAL_UPLOAD_LABEL));
        assert!(graph.get(&root).map(|n| n.is_root()).unwrap_or(false));
        Ok(())
    }

    #[test]
    fn append_rejects_unknown_parent() -> anyhow::Result<()> {
        let (mut graph, _) = seeded()?;
        let err = graph
            .append(Some("v42"), image("x"), DesignState::new(), "x", None)
            .err();
        assert_eq!(err, Some(VersionError::InvalidParent("v42".to_string())));
        assert_eq!(graph.len(), 1);
        Ok(())
    }

    #[test]
    fn select_returns_copy_and_moves_current() -> anyhow::Result<()> {
        let (mut graph, root) = seeded()?;
        let mut design = DesignState::new();
        design.style = DesignStyle::Japandi;
        let child = graph.append(Some(&root), image("c"), design.clone(), "japandi", None)?;

        let mut selected = graph.select(&root)?;
        assert_eq!(graph.current_id(), Some(root.as_str()));
        selected.instructions = "mutated".to_string();
        assert_eq!(graph.get(&root).map(|n| n.config.instructions.as_str()), Some(""));

        let before = graph.nodes().to_vec();
        graph.select(&child)?;
        graph.select(&child)?;
        assert_eq!(graph.nodes(), before.as_slice());
        assert_eq!(graph.select("v9"), Err(VersionError::NotFound("v9".to_string())));
        Ok(())
    }

    #[test]
    fn removing_only_node_clears_selection() -> anyhow::Result<()> {
        let (mut graph, root) = seeded()?;
        graph.remove(&root)?;
        assert!(graph.is_empty());
        assert_eq!(graph.current_id(), None);
        assert_eq!(graph.undo(), Err(VersionError::NoSelection));
        Ok(())
    }

    #[test]
    fn removing_current_falls_back_to_most_recent_survivor() -> anyhow::Result<()> {
        let (mut graph, root) = seeded()?;
        let a = graph.append(Some(&root), image("a"), DesignState::new(), "a", None)?;
        let b = graph.append(Some(&root), image("b"), DesignState::new(), "b", None)?;
        graph.select(&a)?;

        graph.remove(&b)?;
        assert_eq!(graph.current_id(), Some(a.as_str()));

        let existed: Vec<String> = graph.nodes().iter().map(|n| n.id.clone()).collect();
        graph.remove(&a)?;
        let fallback = graph.current_id().map(str::to_string).unwrap_or_default();
        assert!(existed.contains(&fallback));
        assert_eq!(fallback, root);
        Ok(())
    }

    #[test]
    fn removed_ids_are_never_reissued() -> anyhow::Result<()> {
        let (mut graph, root) = seeded()?;
        let a = graph.append(Some(&root), image("a"), DesignState::new(), "a", None)?;
        graph.remove(&a)?;
        let b = graph.append(Some(&root), image("b"), DesignState::new(), "b", None)?;
        assert_ne!(a, b);
        assert!(graph.get(&a).is_none());
        Ok(())
    }

    #[test]
    fn removal_reparents_children_to_grandparent() -> anyhow::Result<()> {
        let (mut graph, root) = seeded()?;
        let mid = graph.append(Some(&root), image("m"), DesignState::new(), "mid", None)?;
        let leaf = graph.append(Some(&mid), image("l"), DesignState::new(), "leaf", None)?;

        graph.remove(&mid)?;
        assert_eq!(
            graph.get(&leaf).and_then(|n| n.parent_id.clone()),
            Some(root.clone())
        );
        assert_eq!(graph.current_id(), Some(leaf.as_str()));
        assert_eq!(graph.undo()?, root);
        for node in graph.nodes() {
            if let Some(parent) = node.parent_id.as_deref() {
                assert!(graph.get(parent).is_some());
            }
        }
        Ok(())
    }

    #[test]
    fn undo_walks_to_parent_and_stops_at_root() -> anyhow::Result<()> {
        let (mut graph, root) = seeded()?;
        let child = graph.append(Some(&root), image("c"), DesignState::new(), "c", None)?;
        assert_eq!(graph.undo()?, root);
        assert_eq!(graph.undo(), Err(VersionError::NoParent(root.clone())));
        assert_eq!(graph.lineage(&child)?.len(), 2);
        Ok(())
    }

    #[test]
    fn timestamps_never_decrease() -> anyhow::Result<()> {
        let (mut graph, root) = seeded()?;
        for idx in 0..5 {
            graph.append(Some(&root), image(&idx.to_string()), DesignState::new(), "n", None)?;
        }
        let stamps: Vec<&str> = graph.nodes().iter().map(|n| n.timestamp.as_str()).collect();
        assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
        Ok(())
    }

    #[test]
    fn removing_newest_node_does_not_rewind_timestamps() -> anyhow::Result<()> {
        let (mut graph, root) = seeded()?;
        let ahead = "2999-01-01T00:00:00.000000+00:00";
        graph.last_timestamp = Some(ahead.to_string());
        let newest = graph.append(Some(&root), image("n"), DesignState::new(), "n", None)?;
        assert_eq!(graph.get(&newest).map(|n| n.timestamp.as_str()), Some(ahead));

        graph.remove(&newest)?;
        let next = graph.append(Some(&root), image("m"), DesignState::new(), "m", None)?;
        assert_eq!(graph.get(&next).map(|n| n.timestamp.as_str()), Some(ahead));
        Ok(())
    }

    #[test]
    fn data_uri_images_are_stored_raw() -> anyhow::Result<()> {
        let mut graph = VersionGraph::new();
        let raw = ImageData {
            mime_type: "image/png".to_string(),
            data: "data:image/png;base64,AAAA".to_string(),
        };
        let root = graph.append(None, raw, DesignState::new(), "", None)?;
        assert_eq!(graph.get(&root).map(|n| n.image.data.as_str()), Some("AAAA"));

        let insights = DesignInsights {
            vibe_summary: "Calm".to_string(),
            reasoning: "Soft palette".to_string(),
            suggestions: vec!["Rug".to_string()],
            sustainability_score: 70,
        };
        let child = graph.append(Some(&root), image("c"), DesignState::new(), "c", Some(insights))?;
        assert_eq!(
            graph.get(&child).and_then(|n| n.insights.as_ref()).map(|i| i.sustainability_score),
            Some(70)
        );
        Ok(())
    }
}

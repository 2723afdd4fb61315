mod choices;
mod image;
mod presets;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub use choices::{Budget, DesignStyle, RoomType};
pub use image::{extension_for_mime, mime_for_path, strip_data_uri_prefix, ImageData};
pub use presets::{find_preset, preset_phrase, PresetSpec, PRESETS};

pub const DEFAULT_PLACEMENT: &str = "natural placement";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomItem {
    pub id: String,
    pub image: ImageData,
    #[serde(default)]
    pub instruction: String,
}

impl CustomItem {
    pub fn placement(&self) -> &str {
        let trimmed = self.instruction.trim();
        if trimmed.is_empty() {
            DEFAULT_PLACEMENT
        } else {
            trimmed
        }
    }
}

/// Editable design intent. Cloned into every version it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DesignState {
    pub room_type: RoomType,
    pub style: DesignStyle,
    pub budget: Budget,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub locked_elements: String,
    #[serde(default)]
    pub custom_items: Vec<CustomItem>,
    #[serde(default)]
    pub inspiration_image: Option<ImageData>,
    #[serde(default)]
    pub selected_presets: BTreeSet<String>,
    #[serde(default)]
    next_item_seq: u64,
}

impl DesignState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reference asset and returns its id, unique within this state.
    pub fn add_custom_item(&mut self, image: ImageData, instruction: impl Into<String>) -> String {
        let id = loop {
            self.next_item_seq += 1;
            let candidate = format!("item-{}", self.next_item_seq);
            if !self.custom_items.iter().any(|item| item.id == candidate) {
                break candidate;
            }
        };
        self.custom_items.push(CustomItem {
            id: id.clone(),
            image,
            instruction: instruction.into(),
        });
        id
    }

    pub fn remove_custom_item(&mut self, id: &str) -> bool {
        let before = self.custom_items.len();
        self.custom_items.retain(|item| item.id != id);
        self.custom_items.len() != before
    }

    pub fn set_item_instruction(&mut self, id: &str, instruction: impl Into<String>) -> bool {
        match self.custom_items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.instruction = instruction.into();
                true
            }
            None => false,
        }
    }

    /// Flips a preset tag and reports whether it is selected afterwards.
    pub fn toggle_preset(&mut self, id: &str) -> bool {
        let tag = id.trim().to_ascii_lowercase();
        if tag.is_empty() {
            return false;
        }
        if self.selected_presets.remove(&tag) {
            return false;
        }
        self.selected_presets.insert(tag);
        true
    }

    pub fn set_inspiration(&mut self, image: Option<ImageData>) {
        self.inspiration_image = image;
    }
}

#[cfg(test)]
mod tests {
    use super::{DesignState, ImageData, DEFAULT_PLACEMENT};

    fn pixel() -> ImageData {
        ImageData::from_bytes("image/png", b"px")
    }

    #[test]
    fn custom_item_ids_stay_unique_after_removal() {
        let mut design = DesignState::new();
        let first = design.add_custom_item(pixel(), "by the window");
        let second = design.add_custom_item(pixel(), "");
        assert!(design.remove_custom_item(&first));
        let third = design.add_custom_item(pixel(), "corner");

        assert_ne!(first, second);
        assert_ne!(third, first);
        assert_ne!(third, second);
        assert_eq!(design.custom_items.len(), 2);
        assert_eq!(design.custom_items[0].placement(), DEFAULT_PLACEMENT);
        assert!(!design.remove_custom_item("item-99"));
    }

    #[test]
    fn item_ids_skip_collisions_with_deserialized_items() -> anyhow::Result<()> {
        let mut design = DesignState::new();
        design.add_custom_item(pixel(), "a");
        let mut raw = serde_json::to_value(&design)?;
        raw["next_item_seq"] = serde_json::json!(0);
        let mut restored: DesignState = serde_json::from_value(raw)?;
        let id = restored.add_custom_item(pixel(), "b");
        assert_eq!(id, "item-2");
        Ok(())
    }

    #[test]
    fn toggle_preset_is_membership_only() {
        let mut design = DesignState::new();
        assert!(design.toggle_preset("Warm-Lighting"));
        assert!(design.toggle_preset("declutter"));
        assert!(!design.toggle_preset("warm-lighting"));
        assert_eq!(
            design.selected_presets.iter().cloned().collect::<Vec<_>>(),
            vec!["declutter".to_string()]
        );
        assert!(!design.toggle_preset("   "));
    }
}

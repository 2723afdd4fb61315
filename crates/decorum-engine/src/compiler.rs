//! Turns the design form into the ordered multimodal request the image model
//! expects. Pure: no I/O, no clock.

use decorum_contracts::design::{preset_phrase, DesignState, ImageData};
use decorum_contracts::versions::VideoState;
use serde_json::{json, Value};

pub const SYSTEM_INSTRUCTION: &str = "You are an expert interior designer. Redesign the room in the attached photo according to the brief below. \
Keep the room's architecture, windows, doors and camera perspective unless the brief says otherwise, and leave every locked element exactly as it is. \
Return the redesigned room as an image. Also return a JSON object with these fields: \
\"vibeSummary\" (one sentence describing the new atmosphere), \
\"reasoning\" (why the design choices suit the room), \
\"suggestions\" (an array of short follow-up ideas) and \
\"sustainabilityScore\" (an integer from 0 to 100).";

pub const INSPIRATION_LABEL: &str =
    "Inspiration image. Borrow its palette, materials and overall mood, not its layout:";

/// Which node the request iterates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseVersion<'a> {
    Initial,
    Version(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPart {
    Text(String),
    Image(ImageData),
}

impl RequestPart {
    pub fn to_json(&self) -> Value {
        match self {
            RequestPart::Text(text) => json!({ "text": text }),
            RequestPart::Image(image) => json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": image.data,
                }
            }),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RequestPart::Text(text) => Some(text),
            RequestPart::Image(_) => None,
        }
    }
}

/// Builds the request parts in their fixed order: instruction, brief, base
/// image, optional inspiration, then one label and image per custom item.
pub fn compile_design_request(
    base_image: &ImageData,
    state: &DesignState,
    base: BaseVersion<'_>,
) -> Vec<RequestPart> {
    let mut parts = vec![
        RequestPart::Text(SYSTEM_INSTRUCTION.to_string()),
        RequestPart::Text(describe_design(state, base)),
        RequestPart::Image(base_image.normalized()),
    ];

    if let Some(inspiration) = state.inspiration_image.as_ref() {
        parts.push(RequestPart::Text(INSPIRATION_LABEL.to_string()));
        parts.push(RequestPart::Image(inspiration.normalized()));
    }

    for (idx, item) in state.custom_items.iter().enumerate() {
        parts.push(RequestPart::Text(format!(
            "Reference item {} ({}). Place this exact item in the room: {}.",
            idx + 1,
            item.id,
            item.placement()
        )));
        parts.push(RequestPart::Image(item.image.normalized()));
    }

    parts
}

pub fn describe_design(state: &DesignState, base: BaseVersion<'_>) -> String {
    let mut lines = vec![
        format!("Room type: {}", state.room_type.label()),
        format!("Design style: {}", state.style.label()),
    ];
    let mood = state.mood.trim();
    if !mood.is_empty() {
        lines.push(format!("Mood: {mood}"));
    }
    if !state.selected_presets.is_empty() {
        let phrases: Vec<String> = state
            .selected_presets
            .iter()
            .map(|tag| preset_phrase(tag))
            .collect();
        lines.push(format!("Include: {}", phrases.join("; ")));
    }
    lines.push(format!(
        "Budget: {} ({})",
        state.budget.label(),
        state.budget.guidance()
    ));
    let locked = state.locked_elements.trim();
    if !locked.is_empty() {
        lines.push(format!("Keep unchanged: {locked}"));
    }
    let instructions = state.instructions.trim();
    if !instructions.is_empty() {
        lines.push(format!("Instructions: {instructions}"));
    }
    lines.push(match base {
        BaseVersion::Initial => "Starting point: the original photo of the room.".to_string(),
        BaseVersion::Version(id) => {
            format!("Starting point: design version {id}. Refine it rather than starting over.")
        }
    });
    lines.join("\n")
}

/// Short human label stored on the version node.
pub fn version_label(state: &DesignState) -> String {
    let instructions = state.instructions.trim();
    if !instructions.is_empty() {
        return instructions.to_string();
    }
    format!("{} {} redesign", state.style.label(), state.room_type.label())
}

pub fn motion_descriptor(intensity: u8) -> &'static str {
    match intensity {
        0..=3 => "slow, gentle camera movement",
        4..=7 => "smooth, moderate camera movement",
        _ => "dynamic, sweeping camera movement",
    }
}

pub fn compile_video_prompt(video: &VideoState, design: &DesignState) -> String {
    let mut prompt = format!(
        "A {} walkthrough video of this {} {}, {}.",
        video.style.trim(),
        design.style.label().to_lowercase(),
        design.room_type.label().to_lowercase(),
        motion_descriptor(video.motion_intensity)
    );
    let mood = design.mood.trim();
    if !mood.is_empty() {
        prompt.push_str(&format!(" The mood is {mood}."));
    }
    let extra = video.prompt.trim();
    if !extra.is_empty() {
        prompt.push(' ');
        prompt.push_str(extra);
    }
    prompt.push_str(" Keep the furniture and layout exactly as shown in the image.");
    prompt
}

#[cfg(test)]
mod tests {
    use decorum_contracts::design::{Budget, DesignState, DesignStyle, ImageData, RoomType};
    use decorum_contracts::versions::VideoState;
    use serde_json::json;

    use super::*;

    fn state_with_extras() -> DesignState {
        let mut state = DesignState::new();
        state.room_type = RoomType::Bedroom;
        state.style = DesignStyle::Japandi;
        state.budget = Budget::High;
        state.mood = "calm".to_string();
        state.locked_elements = "the fireplace".to_string();
        state.instructions = "Add a reading nook".to_string();
        state.toggle_preset("warm-lighting");
        state.set_inspiration(Some(ImageData::from_encoded("image/jpeg", "data:image/jpeg;base64,SU5TUA==")));
        state.add_custom_item(ImageData::from_bytes("image/png", b"lamp"), "next to the bed");
        state.add_custom_item(ImageData::from_bytes("image/png", b"rug"), "");
        state
    }

    #[test]
    fn parts_follow_fixed_order() {
        let base = ImageData::from_bytes("image/png", b"room");
        let parts = compile_design_request(&base, &state_with_extras(), BaseVersion::Version("v2"));

        assert_eq!(parts.len(), 9);
        assert_eq!(parts[0].as_text(), Some(SYSTEM_INSTRUCTION));
        assert!(matches!(&parts[2], RequestPart::Image(image) if *image == base));
        assert_eq!(parts[3].as_text(), Some(INSPIRATION_LABEL));
        assert!(matches!(&parts[4], RequestPart::Image(image) if image.data == "SU5TUA=="));
        assert!(parts[5].as_text().unwrap_or("").contains("next to the bed"));
        assert!(matches!(&parts[6], RequestPart::Image(_)));
        assert!(parts[7].as_text().unwrap_or("").contains("natural placement"));
        assert!(matches!(&parts[8], RequestPart::Image(_)));
    }

    #[test]
    fn minimal_request_has_instruction_brief_and_image() {
        let base = ImageData::from_encoded("image/png", "data:image/png;base64,QUJD");
        let parts = compile_design_request(&base, &DesignState::new(), BaseVersion::Initial);
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[2].to_json(),
            json!({"inlineData": {"mimeType": "image/png", "data": "QUJD"}})
        );
        assert!(parts[1].as_text().unwrap_or("").contains("original photo"));
    }

    #[test]
    fn brief_mentions_every_populated_field() {
        let brief = describe_design(&state_with_extras(), BaseVersion::Version("v3"));
        for needle in [
            "Bedroom",
            "Japandi",
            "calm",
            "warm, layered ambient lighting",
            "High",
            "the fireplace",
            "Add a reading nook",
            "v3",
        ] {
            assert!(brief.contains(needle), "missing {needle} in {brief}");
        }
    }

    #[test]
    fn labels_and_motion_bands() {
        let mut state = DesignState::new();
        assert_eq!(version_label(&state), "Modern Living Room redesign");
        state.instructions = "  brighter  ".to_string();
        assert_eq!(version_label(&state), "brighter");

        assert!(motion_descriptor(1).starts_with("slow"));
        assert!(motion_descriptor(5).starts_with("smooth"));
        assert!(motion_descriptor(10).starts_with("dynamic"));

        let mut video = VideoState::default();
        video.prompt = "End on the window.".to_string();
        let prompt = compile_video_prompt(&video, &state);
        assert!(prompt.contains("cinematic"));
        assert!(prompt.contains("smooth"));
        assert!(prompt.contains("End on the window."));
    }
}

use decorum_contracts::design::ImageData;
use decorum_contracts::versions::DesignInsights;
use serde_json::Value;

use crate::error::GenerationError;
use crate::providers::{ModelReply, ReplyPart};

pub const DEFAULT_VIBE_SUMMARY: &str = "A refreshed atmosphere that brings new life to your space.";
pub const DEFAULT_REASONING: &str = "This design balances your requested style with the room's existing architecture, light, and proportions.";
pub const DEFAULT_SUGGESTIONS: &[&str] = &[
    "Layer lighting at different heights to add warmth in the evening.",
    "Add textured textiles such as a wool throw or linen cushions.",
    "Introduce a few plants to soften hard lines.",
    "Edit accessories down to a few meaningful pieces.",
];
pub const DEFAULT_SUSTAINABILITY_SCORE: u8 = 50;

/// Lowercase fragments that mark a text-only reply as a refusal.
pub const REFUSAL_VOCABULARY: &[&str] = &[
    "cannot",
    "can't",
    "unable to comply",
    "safety",
    "policy",
    "refuse",
    "declin",
    "inappropriate",
    "not allowed",
    "blocked",
];

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReply {
    pub image: ImageData,
    pub insights: DesignInsights,
    /// Whether the text contained a parseable JSON object at all.
    pub metadata_found: bool,
    /// Insight fields that were missing or malformed and got their default.
    pub fallback_fields: Vec<&'static str>,
    pub text: String,
}

pub fn normalize_reply(reply: &ModelReply) -> Result<NormalizedReply, GenerationError> {
    let mut image: Option<ImageData> = None;
    let mut text = String::new();
    for part in &reply.parts {
        match part {
            ReplyPart::Image(candidate) => {
                if image.is_none() {
                    image = Some(candidate.normalized());
                }
            }
            ReplyPart::Text(chunk) => text.push_str(chunk),
        }
    }

    let Some(image) = image else {
        return Err(classify_missing_image(&text));
    };

    let metadata = find_json_object(&text);
    let metadata_found = metadata.is_some();
    let metadata = metadata.unwrap_or(Value::Null);
    let mut fallback_fields = Vec::new();

    let vibe_summary = non_empty_string(metadata.get("vibeSummary")).unwrap_or_else(|| {
        fallback_fields.push("vibeSummary");
        DEFAULT_VIBE_SUMMARY.to_string()
    });
    let reasoning = non_empty_string(metadata.get("reasoning")).unwrap_or_else(|| {
        fallback_fields.push("reasoning");
        DEFAULT_REASONING.to_string()
    });
    let suggestions = string_list(metadata.get("suggestions")).unwrap_or_else(|| {
        fallback_fields.push("suggestions");
        DEFAULT_SUGGESTIONS.iter().map(|row| row.to_string()).collect()
    });
    let sustainability_score = score(metadata.get("sustainabilityScore")).unwrap_or_else(|| {
        fallback_fields.push("sustainabilityScore");
        DEFAULT_SUSTAINABILITY_SCORE
    });

    Ok(NormalizedReply {
        image,
        insights: DesignInsights {
            vibe_summary,
            reasoning,
            suggestions,
            sustainability_score,
        },
        metadata_found,
        fallback_fields,
        text,
    })
}

fn classify_missing_image(text: &str) -> GenerationError {
    let lowered = text.to_lowercase();
    if REFUSAL_VOCABULARY
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        return GenerationError::RefusedContent(text.trim().to_string());
    }
    GenerationError::EmptyResult
}

/// Brace positions tried before giving up on a reply's metadata.
const MAX_JSON_CANDIDATES: usize = 64;

/// Returns the first well-formed JSON object embedded in `text`. Markdown
/// code fences around it are tolerated. Only the first
/// [`MAX_JSON_CANDIDATES`] opening braces are tried, which keeps the scan
/// linear on long replies full of unterminated objects.
pub fn find_json_object(text: &str) -> Option<Value> {
    let cleaned = text.replace("```json", "```").replace("```", "\n");
    let starts = cleaned
        .char_indices()
        .filter(|(_, ch)| *ch == '{')
        .map(|(idx, _)| idx)
        .take(MAX_JSON_CANDIDATES);
    for idx in starts {
        let mut stream = serde_json::Deserializer::from_str(&cleaned[idx..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = stream.next() {
            return Some(value);
        }
    }
    None
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let rows: Vec<String> = value?
        .as_array()?
        .iter()
        .filter_map(|row| non_empty_string(Some(row)))
        .collect();
    if rows.is_empty() {
        None
    } else {
        Some(rows)
    }
}

fn score(value: Option<&Value>) -> Option<u8> {
    let raw = match value? {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() || !(0.0..=100.0).contains(&raw) {
        return None;
    }
    Some(raw.round() as u8)
}

#[cfg(test)]
mod tests {
    use decorum_contracts::design::ImageData;
    use serde_json::json;

    use super::*;
    use crate::providers::{ModelReply, ReplyPart};

    fn reply(parts: Vec<ReplyPart>) -> ModelReply {
        ModelReply { parts }
    }

    fn png() -> ReplyPart {
        ReplyPart::Image(ImageData::from_bytes("image/png", b"img"))
    }

    #[test]
    fn complete_metadata_is_used_verbatim() -> anyhow::Result<()> {
        let text = r#"Here you go:
```json
{"vibeSummary": "Serene", "reasoning": "Soft woods", "suggestions": ["Add a rug"], "sustainabilityScore": 72.4}
```"#;
        let normalized = normalize_reply(&reply(vec![ReplyPart::Text(text.to_string()), png()]))?;
        assert!(normalized.metadata_found);
        assert!(normalized.fallback_fields.is_empty());
        assert_eq!(normalized.insights.vibe_summary, "Serene");
        assert_eq!(normalized.insights.suggestions, vec!["Add a rug".to_string()]);
        assert_eq!(normalized.insights.sustainability_score, 72);
        Ok(())
    }

    #[test]
    fn each_field_falls_back_independently() -> anyhow::Result<()> {
        let text = r#"{"vibeSummary": "", "reasoning": "Kept the beams", "suggestions": [1, ""], "sustainabilityScore": "140"}"#;
        let normalized = normalize_reply(&reply(vec![png(), ReplyPart::Text(text.to_string())]))?;
        assert_eq!(normalized.insights.vibe_summary, DEFAULT_VIBE_SUMMARY);
        assert_eq!(normalized.insights.reasoning, "Kept the beams");
        assert_eq!(normalized.insights.suggestions.len(), DEFAULT_SUGGESTIONS.len());
        assert_eq!(normalized.insights.sustainability_score, DEFAULT_SUSTAINABILITY_SCORE);
        assert_eq!(
            normalized.fallback_fields,
            vec!["vibeSummary", "suggestions", "sustainabilityScore"]
        );
        Ok(())
    }

    #[test]
    fn empty_suggestions_fall_back_to_default_list() -> anyhow::Result<()> {
        let text = r#"Done! {"vibeSummary":"Cozy loft","suggestions":[]} Enjoy."#;
        let normalized = normalize_reply(&reply(vec![ReplyPart::Text(text.to_string()), png()]))?;
        assert_eq!(normalized.insights.vibe_summary, "Cozy loft");
        let defaults: Vec<String> = DEFAULT_SUGGESTIONS.iter().map(|row| row.to_string()).collect();
        assert_eq!(normalized.insights.suggestions, defaults);
        assert_eq!(normalized.insights.sustainability_score, DEFAULT_SUSTAINABILITY_SCORE);
        Ok(())
    }

    #[test]
    fn image_without_text_gets_all_defaults() -> anyhow::Result<()> {
        let normalized = normalize_reply(&reply(vec![png(), png()]))?;
        assert!(!normalized.metadata_found);
        assert_eq!(normalized.fallback_fields.len(), 4);
        assert_eq!(normalized.insights.sustainability_score, 50);
        Ok(())
    }

    #[test]
    fn text_only_replies_are_refusals_or_empty() {
        let refused = normalize_reply(&reply(vec![ReplyPart::Text(
            "I can't help with that request due to safety policy.".to_string(),
        )]));
        assert!(matches!(refused, Err(GenerationError::RefusedContent(_))));

        let empty = normalize_reply(&reply(vec![ReplyPart::Text(
            "Here is a lovely description of the room.".to_string(),
        )]));
        assert_eq!(empty, Err(GenerationError::EmptyResult));
        assert_eq!(normalize_reply(&reply(Vec::new())), Err(GenerationError::EmptyResult));
    }

    #[test]
    fn json_scan_stops_after_bounded_candidates() {
        let noise = "{".repeat(10_000);
        let late = format!("{noise} {{\"vibeSummary\": \"late\"}}");
        assert_eq!(find_json_object(&late), None);

        let early = format!("{} {{\"vibeSummary\": \"early\"}} {noise}", "{ x".repeat(3));
        assert_eq!(
            find_json_object(&early),
            Some(json!({"vibeSummary": "early"}))
        );
    }

    #[test]
    fn json_scan_skips_broken_braces() {
        assert_eq!(
            find_json_object("notes {not json} then {\"a\": 1} and {\"b\": 2}"),
            Some(json!({"a": 1}))
        );
        assert_eq!(find_json_object("no braces here"), None);
        assert_eq!(find_json_object("{\"unterminated\": "), None);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PresetSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub phrase: &'static str,
}

pub const PRESETS: &[PresetSpec] = &[
    PresetSpec {
        id: "warm-lighting",
        label: "Warm lighting",
        phrase: "warm, layered ambient lighting",
    },
    PresetSpec {
        id: "more-plants",
        label: "More plants",
        phrase: "abundant indoor plants and greenery",
    },
    PresetSpec {
        id: "declutter",
        label: "Declutter",
        phrase: "a clean, decluttered layout with hidden storage",
    },
    PresetSpec {
        id: "natural-light",
        label: "Natural light",
        phrase: "maximized natural light with sheer window treatments",
    },
    PresetSpec {
        id: "cozy-textiles",
        label: "Cozy textiles",
        phrase: "cozy layered textiles, throws, and rugs",
    },
    PresetSpec {
        id: "statement-art",
        label: "Statement art",
        phrase: "one bold statement art piece",
    },
    PresetSpec {
        id: "eco-materials",
        label: "Eco materials",
        phrase: "sustainable, natural, and reclaimed materials",
    },
    PresetSpec {
        id: "open-layout",
        label: "Open layout",
        phrase: "an open, airy furniture arrangement",
    },
];

pub fn find_preset(id: &str) -> Option<&'static PresetSpec> {
    let wanted = id.trim().to_ascii_lowercase();
    PRESETS.iter().find(|preset| preset.id == wanted)
}

/// Prompt phrase for a preset tag; tags outside the catalog compile verbatim.
pub fn preset_phrase(id: &str) -> String {
    find_preset(id)
        .map(|preset| preset.phrase.to_string())
        .unwrap_or_else(|| id.trim().replace('-', " "))
}

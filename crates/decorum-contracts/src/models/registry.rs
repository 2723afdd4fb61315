use indexmap::IndexMap;

use super::{CAPABILITY_IMAGE, CAPABILITY_TRANSCRIBE, CAPABILITY_VIDEO};

/// Built-in catalog as `(name, provider, capability)`. Order matters: the
/// first row for a capability and provider is its default model.
const CATALOG: &[(&str, &str, &str)] = &[
    ("gemini-2.5-flash-image", "gemini", CAPABILITY_IMAGE),
    ("gemini-3-pro-image-preview", "gemini", CAPABILITY_IMAGE),
    ("veo-3.1-fast-generate-preview", "gemini", CAPABILITY_VIDEO),
    ("veo-3.1-generate-preview", "gemini", CAPABILITY_VIDEO),
    (
        "gemini-2.5-flash-native-audio-preview-09-2025",
        "gemini",
        CAPABILITY_TRANSCRIBE,
    ),
    ("dryrun-image-1", "dryrun", CAPABILITY_IMAGE),
    ("dryrun-video-1", "dryrun", CAPABILITY_VIDEO),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn new(name: &str, provider: &str, capabilities: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            provider: provider.to_string(),
            capabilities: capabilities.iter().map(|item| (*item).to_string()).collect(),
        }
    }

    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }

    fn matches(&self, capability: &str, provider: Option<&str>) -> bool {
        self.supports(capability) && provider.map_or(true, |name| self.provider == name)
    }
}

/// Models keyed by name, kept in preference order.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::from_specs(
            CATALOG
                .iter()
                .map(|(name, provider, capability)| ModelSpec::new(name, provider, &[capability])),
        )
    }
}

impl ModelRegistry {
    pub fn from_specs(specs: impl IntoIterator<Item = ModelSpec>) -> Self {
        Self {
            models: specs
                .into_iter()
                .map(|spec| (spec.name.clone(), spec))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    /// `name` if it exists and serves `capability` (for `provider`, when given).
    pub fn find(&self, name: &str, capability: &str, provider: Option<&str>) -> Option<&ModelSpec> {
        self.get(name)
            .filter(|model| model.matches(capability, provider))
    }

    pub fn default_for(&self, capability: &str, provider: Option<&str>) -> Option<&ModelSpec> {
        self.list().find(|model| model.matches(capability, provider))
    }
}

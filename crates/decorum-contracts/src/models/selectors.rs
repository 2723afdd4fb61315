use super::registry::{ModelRegistry, ModelSpec};

/// Outcome of resolving a requested model name. `fallback_reason` is set
/// whenever the default was used instead of an explicit, valid request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_default(),
        }
    }

    pub fn select(
        &self,
        requested: Option<&str>,
        capability: &str,
        provider: Option<&str>,
    ) -> Result<ModelSelection, String> {
        if let Some(model) =
            requested.and_then(|name| self.registry.find(name, capability, provider))
        {
            return Ok(ModelSelection {
                model: model.clone(),
                requested: requested.map(str::to_string),
                fallback_reason: None,
            });
        }

        let model = self
            .registry
            .default_for(capability, provider)
            .cloned()
            .ok_or_else(|| match provider {
                Some(provider) => format!("Provider '{provider}' has no {capability} model."),
                None => format!("No {capability} model is registered."),
            })?;
        let fallback_reason = match requested {
            Some(name) => format!("Model '{name}' cannot serve {capability}; using {}.", model.name),
            None => format!("Using default {capability} model {}.", model.name),
        };
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason: Some(fallback_reason),
        })
    }
}

//! Model registry for managing available LLM providers

use super::{all_models, LlmService, LoggingService, ModelDef, Provider};
use std::collections::HashMap;
use std::sync::Arc;

/// Model used when `DEFAULT_MODEL` is unset and it is available
pub const PREFERRED_DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    /// OpenAI-compatible proxy base URL; providers are reached under
    /// `{gateway}/openai` and `{gateway}/groq/openai`
    pub gateway: Option<String>,
    /// Default model ID
    pub default_model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: std::env::var(Provider::OpenAI.api_key_env_var()).ok(),
            groq_api_key: std::env::var(Provider::Groq.api_key_env_var()).ok(),
            gateway: std::env::var("LLM_GATEWAY").ok(),
            default_model: std::env::var("DEFAULT_MODEL").ok(),
        }
    }
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_model: String,
}

impl ModelRegistry {
    /// Create an empty registry for testing purposes
    pub fn new_empty() -> Self {
        Self {
            services: HashMap::new(),
            default_model: PREFERRED_DEFAULT_MODEL.to_string(),
        }
    }

    pub fn new(config: &LlmConfig) -> Self {
        let mut services: HashMap<String, Arc<dyn LlmService>> = HashMap::new();

        for model_def in all_models() {
            if let Some(service) = Self::try_create_model(model_def, config) {
                services.insert(model_def.id.to_string(), service);
            }
        }

        let default_model = config
            .default_model
            .clone()
            .or_else(|| {
                if services.contains_key(PREFERRED_DEFAULT_MODEL) {
                    Some(PREFERRED_DEFAULT_MODEL.to_string())
                } else {
                    // Fall back to the first available model in table order
                    all_models()
                        .iter()
                        .find(|m| services.contains_key(m.id))
                        .map(|m| m.id.to_string())
                }
            })
            .unwrap_or_else(|| PREFERRED_DEFAULT_MODEL.to_string());

        Self {
            services,
            default_model,
        }
    }

    /// Try to create a model service, validating prerequisites
    fn try_create_model(model_def: &ModelDef, config: &LlmConfig) -> Option<Arc<dyn LlmService>> {
        // In gateway mode the proxy handles authentication
        let api_key = if config.gateway.is_some() {
            "implicit".to_string()
        } else {
            match model_def.provider {
                Provider::OpenAI => config.openai_api_key.as_ref()?,
                Provider::Groq => config.groq_api_key.as_ref()?,
            }
            .clone()
        };

        match (model_def.factory)(&api_key, config.gateway.as_deref()) {
            Ok(service) => Some(Arc::new(LoggingService::new(service))),
            Err(e) => {
                tracing::debug!(model = model_def.id, error = %e, "Model unavailable");
                None
            }
        }
    }

    /// Register a service under an explicit ID
    #[cfg(test)]
    pub fn insert(&mut self, id: impl Into<String>, service: Arc<dyn LlmService>) {
        self.services.insert(id.into(), service);
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// Get the default model
    pub fn default(&self) -> Option<Arc<dyn LlmService>> {
        self.get(&self.default_model)
    }

    /// Get the default model ID
    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    /// List all available model IDs
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<_> = self.services.keys().cloned().collect();
        models.sort();
        models
    }

    /// Get detailed information about available models
    pub fn available_model_info(&self) -> Vec<crate::api::ModelInfo> {
        all_models()
            .iter()
            .filter(|m| self.services.contains_key(m.id))
            .map(|m| crate::api::ModelInfo {
                id: m.id.to_string(),
                provider: m.provider.display_name().to_string(),
                description: m.description.to_string(),
            })
            .collect()
    }

    /// Check if any models are available
    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_api_keys_no_models() {
        let config = LlmConfig::default();
        let registry = ModelRegistry::new(&config);
        assert!(registry.available_models().is_empty());
        assert!(registry.default().is_none());
    }

    #[test]
    fn test_openai_key_only_openai_models() {
        let config = LlmConfig {
            openai_api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        let registry = ModelRegistry::new(&config);

        let models = registry.available_models();
        assert_eq!(models, vec!["gpt-4.1-nano".to_string(), "gpt-4o-mini".to_string()]);
    }

    #[test]
    fn test_groq_key_only_defaults_to_groq() {
        let config = LlmConfig {
            groq_api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        let registry = ModelRegistry::new(&config);

        assert_eq!(registry.available_models(), vec!["llama-3.3-70b-groq".to_string()]);
        assert_eq!(registry.default_model_id(), "llama-3.3-70b-groq");
        assert!(registry.default().is_some());
    }

    #[test]
    fn test_gateway_enables_all_models() {
        let config = LlmConfig {
            gateway: Some("https://example.com".to_string()),
            ..Default::default()
        };
        let registry = ModelRegistry::new(&config);
        assert_eq!(registry.available_models().len(), all_models().len());
        assert!(registry.get("gpt-4.1-nano").is_some());
        assert!(registry.get("llama-3.3-70b-groq").is_some());
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let config = LlmConfig {
            openai_api_key: Some(String::new()),
            ..Default::default()
        };
        let registry = ModelRegistry::new(&config);
        assert!(!registry.has_models());
    }

    #[test]
    fn test_default_model_selection() {
        let config = LlmConfig {
            openai_api_key: Some("test-key".to_string()),
            groq_api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        let registry = ModelRegistry::new(&config);
        assert_eq!(registry.default_model_id(), "gpt-4.1-nano");
    }

    #[test]
    fn test_custom_default_model() {
        let config = LlmConfig {
            openai_api_key: Some("test-key".to_string()),
            default_model: Some("gpt-4o-mini".to_string()),
            ..Default::default()
        };
        let registry = ModelRegistry::new(&config);

        assert_eq!(registry.default_model_id(), "gpt-4o-mini");
        assert_eq!(registry.default().unwrap().model_id(), "gpt-4o-mini");
    }

    #[test]
    fn test_model_info_metadata() {
        let config = LlmConfig {
            openai_api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        let registry = ModelRegistry::new(&config);

        let infos = registry.available_model_info();
        assert_eq!(infos.len(), 2);
        for info in &infos {
            assert_eq!(info.provider, "OpenAI");
            assert!(!info.description.is_empty());
        }
    }
}

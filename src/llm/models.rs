//! Centralized model definitions for all LLM providers
//!
//! This module contains all model definitions in a single location,
//! making it easier to add new models and providers.

use super::openai::OpenAIModel;
use super::{LlmError, LlmService, OpenAIService};
use std::sync::Arc;

/// LLM provider enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAI,
    Groq,
}

impl Provider {
    /// Get the display name for this provider
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::OpenAI => "OpenAI",
            Provider::Groq => "Groq",
        }
    }

    /// Get the environment variable name for this provider's API key
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
        }
    }
}

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// User-facing model ID (e.g., "gpt-4.1-nano")
    pub id: &'static str,
    /// Provider for this model
    pub provider: Provider,
    /// Human-readable description
    pub description: &'static str,
    /// Factory function to create the service
    pub factory: fn(&str, Option<&str>) -> Result<Arc<dyn LlmService>, LlmError>,
}

fn openai_compatible(
    model: OpenAIModel,
    api_key: &str,
    gateway: Option<&str>,
) -> Result<Arc<dyn LlmService>, LlmError> {
    // Accept any non-empty key (including "implicit" for gateway mode)
    if api_key.is_empty() {
        return Err(LlmError::auth(format!("{} requires an API key or gateway", model.model_id())));
    }
    Ok(Arc::new(OpenAIService::new(api_key.to_string(), model, gateway)?))
}

/// Get all available model definitions
pub fn all_models() -> &'static [ModelDef] {
    &[
        ModelDef {
            id: "gpt-4.1-nano",
            provider: Provider::OpenAI,
            description: "GPT-4.1 nano (fast, low cost, default)",
            factory: |api_key, gateway| openai_compatible(OpenAIModel::GPT41Nano, api_key, gateway),
        },
        ModelDef {
            id: "gpt-4o-mini",
            provider: Provider::OpenAI,
            description: "GPT-4o mini",
            factory: |api_key, gateway| openai_compatible(OpenAIModel::GPT4oMini, api_key, gateway),
        },
        ModelDef {
            id: "llama-3.3-70b-groq",
            provider: Provider::Groq,
            description: "Llama 3.3 70B on Groq (JSON mode)",
            factory: |api_key, gateway| {
                openai_compatible(OpenAIModel::Llama33Groq, api_key, gateway)
            },
        },
    ]
}

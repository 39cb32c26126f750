//! LLM provider abstraction
//!
//! Structured-output generation against hosted models. A provider turns an
//! [`ObjectRequest`] into a lazy stream of cumulative JSON snapshots that ends
//! with the complete object or an error.

mod error;
mod models;
mod openai;
pub mod partial_json;
mod registry;
#[cfg(test)]
pub mod testing;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use models::{all_models, ModelDef, Provider};
pub use openai::{OpenAIModel, OpenAIService};
pub use registry::{LlmConfig, ModelRegistry};
pub use types::*;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Stream of object snapshots produced by a provider
pub type ObjectStream = Pin<Box<dyn Stream<Item = Result<ObjectChunk, LlmError>> + Send>>;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Start a structured generation.
    ///
    /// Errors returned here mean the provider refused the request outright;
    /// failures after the first byte arrive as stream items.
    async fn stream_object(&self, request: &ObjectRequest) -> Result<ObjectStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn stream_object(&self, request: &ObjectRequest) -> Result<ObjectStream, LlmError> {
        let start = Instant::now();
        let result = self.inner.stream_object(request).await;
        let duration = start.elapsed();

        match result {
            Ok(stream) => {
                tracing::debug!(
                    model = %self.model_id,
                    open_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    "LLM stream opened"
                );
                let model_id = self.model_id.clone();
                Ok(Box::pin(stream.inspect(move |item| match item {
                    Ok(ObjectChunk::Complete { usage, .. }) => tracing::info!(
                        model = %model_id,
                        duration_ms = %start.elapsed().as_millis(),
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "LLM request completed"
                    ),
                    Err(e) => tracing::error!(
                        model = %model_id,
                        duration_ms = %start.elapsed().as_millis(),
                        error = %e.message,
                        retryable = e.kind.is_retryable(),
                        "LLM stream failed"
                    ),
                    Ok(ObjectChunk::Partial(_)) => {}
                })))
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "LLM request failed"
                );
                Err(e)
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

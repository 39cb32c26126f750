//! Ruling generation over the model gateway

use super::prompt::{ruling_schema, system_prompt, user_turn, SCHEMA_NAME};
use super::types::{PartialRulingResult, Role, RulingRequest, RulingResult, SchemaViolation};
use crate::llm::{
    LlmError, LlmMessage, LlmService, ObjectChunk, ObjectRequest, ObjectSchema,
};
use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Sampling temperature for ruling generation
pub const RULING_TEMPERATURE: f32 = 0.2;

const MAX_OUTPUT_TOKENS: u32 = 2048;

/// Message shown to users for any failure past request validation
pub const GENERIC_FAILURE_MESSAGE: &str = "Unable to determine a ruling. Please try again.";

/// Stream of cumulative ruling snapshots
pub type RulingStream =
    Pin<Box<dyn Stream<Item = Result<PartialRulingResult, RulingError>> + Send>>;

#[derive(Debug, Clone, Error)]
pub enum RulingError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("model gateway failed: {0}")]
    GatewayFailure(#[from] LlmError),
    #[error("model output violated the ruling schema: {0}")]
    SchemaViolation(#[from] SchemaViolation),
}

impl RulingError {
    /// Message safe to show to the end user
    pub fn public_message(&self) -> String {
        match self {
            RulingError::InvalidRequest(message) => message.clone(),
            RulingError::GatewayFailure(_) | RulingError::SchemaViolation(_) => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
        }
    }
}

/// Builds ruling prompts and relays the gateway's snapshots
#[derive(Clone)]
pub struct RulingService {
    llm: Arc<dyn LlmService>,
}

impl RulingService {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self { llm }
    }

    pub fn model_id(&self) -> &str {
        self.llm.model_id()
    }

    /// Start generating a ruling.
    ///
    /// Only request validation fails here. Gateway failures, including a
    /// refused connection, arrive as the last item of the stream.
    pub fn generate_ruling_stream(&self, request: &RulingRequest) -> Result<RulingStream, RulingError> {
        if request.query.trim().is_empty() {
            return Err(RulingError::InvalidRequest("query must not be empty".to_string()));
        }

        let object_request = build_object_request(request);
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            request_id = %request_id,
            model = %self.llm.model_id(),
            history_len = request.history.len(),
            "Generating ruling"
        );

        Ok(Box::pin(relay(Arc::clone(&self.llm), object_request, request_id)))
    }
}

/// Turn a ruling request into the gateway's message list
pub fn build_object_request(request: &RulingRequest) -> ObjectRequest {
    let mut messages: Vec<LlmMessage> = request
        .history
        .iter()
        .map(|turn| match turn.role {
            Role::User => LlmMessage::user(turn.content.clone()),
            Role::Assistant => LlmMessage::assistant(turn.content.clone()),
        })
        .collect();

    if messages.is_empty() {
        messages.push(LlmMessage::user(user_turn(&request.query)));
    }

    ObjectRequest {
        system: system_prompt(&request.query, !request.history.is_empty()),
        messages,
        schema: ObjectSchema {
            name: SCHEMA_NAME.to_string(),
            schema: ruling_schema(),
        },
        temperature: RULING_TEMPERATURE,
        max_tokens: Some(MAX_OUTPUT_TOKENS),
    }
}

/// Snapshots that don't fit the relaxed ruling shape are dropped
fn accept_partial(value: Value) -> Option<PartialRulingResult> {
    serde_json::from_value::<PartialRulingResult>(value)
        .ok()
        .filter(PartialRulingResult::references_within_bounds)
}

fn finalize(object: Value) -> Result<RulingResult, RulingError> {
    let partial: PartialRulingResult = serde_json::from_value(object)
        .map_err(|e| SchemaViolation(format!("terminal object does not match: {e}")))?;
    Ok(RulingResult::try_from(partial)?)
}

fn log_completion(
    request_id: &str,
    start: Instant,
    chunks: usize,
    outcome: Result<&RulingResult, &RulingError>,
) {
    let duration_ms = start.elapsed().as_millis();
    match outcome {
        Ok(result) => tracing::info!(
            request_id = %request_id,
            duration_ms = %duration_ms,
            chunks,
            ruling = result.ruling().as_str(),
            "Ruling stream completed"
        ),
        Err(e) => tracing::error!(
            request_id = %request_id,
            duration_ms = %duration_ms,
            chunks,
            error = %e,
            "Ruling stream failed"
        ),
    }
}

fn relay(
    llm: Arc<dyn LlmService>,
    object_request: ObjectRequest,
    request_id: String,
) -> impl Stream<Item = Result<PartialRulingResult, RulingError>> + Send {
    stream! {
        let start = Instant::now();
        let mut chunks = 0usize;
        let mut last: Option<PartialRulingResult> = None;

        let mut upstream = match llm.stream_object(&object_request).await {
            Ok(upstream) => upstream,
            Err(e) => {
                let error = RulingError::from(e);
                log_completion(&request_id, start, chunks, Err(&error));
                yield Err(error);
                return;
            }
        };

        while let Some(item) = upstream.next().await {
            match item {
                Ok(ObjectChunk::Partial(value)) => {
                    let Some(partial) = accept_partial(value) else {
                        tracing::trace!(request_id = %request_id, "Discarded snapshot");
                        continue;
                    };
                    if let Some(previous) = &last {
                        if previous == &partial {
                            continue;
                        }
                        if !partial.keeps_fields_of(previous) {
                            tracing::trace!(request_id = %request_id, "Discarded regressing snapshot");
                            continue;
                        }
                    }
                    chunks += 1;
                    last = Some(partial.clone());
                    yield Ok(partial);
                }
                Ok(ObjectChunk::Complete { object, .. }) => {
                    match finalize(object) {
                        Ok(result) => {
                            let normalized = PartialRulingResult::from(&result);
                            if last.as_ref() != Some(&normalized) {
                                chunks += 1;
                                yield Ok(normalized);
                            }
                            log_completion(&request_id, start, chunks, Ok(&result));
                        }
                        Err(error) => {
                            log_completion(&request_id, start, chunks, Err(&error));
                            yield Err(error);
                        }
                    }
                    return;
                }
                Err(e) => {
                    let error = RulingError::from(e);
                    log_completion(&request_id, start, chunks, Err(&error));
                    yield Err(error);
                    return;
                }
            }
        }

        let error = RulingError::GatewayFailure(LlmError::network("stream ended before completion"));
        log_completion(&request_id, start, chunks, Err(&error));
        yield Err(error);
    }
}

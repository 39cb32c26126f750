//! `OpenAI` and `OpenAI`-compatible provider implementation
//!
//! Streams chat completions and re-parses the accumulated text as partial
//! JSON after every content delta, so callers see the object take shape.

use super::partial_json;
use super::types::{LlmMessage, ObjectChunk, ObjectRequest, Usage};
use super::{LlmError, LlmService, ObjectStream};
use crate::sse::SseDecoder;
use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// `OpenAI`-compatible models (`OpenAI` and Groq)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIModel {
    GPT41Nano,
    GPT4oMini,
    // Groq models (use OpenAI API)
    Llama33Groq,
}

impl OpenAIModel {
    pub fn api_name(self) -> &'static str {
        match self {
            OpenAIModel::GPT41Nano => "gpt-4.1-nano",
            OpenAIModel::GPT4oMini => "gpt-4o-mini",
            OpenAIModel::Llama33Groq => "llama-3.3-70b-versatile",
        }
    }

    pub fn model_id(self) -> &'static str {
        match self {
            OpenAIModel::GPT41Nano => "gpt-4.1-nano",
            OpenAIModel::GPT4oMini => "gpt-4o-mini",
            OpenAIModel::Llama33Groq => "llama-3.3-70b-groq",
        }
    }

    pub fn is_groq(self) -> bool {
        matches!(self, OpenAIModel::Llama33Groq)
    }

    /// Groq only guarantees JSON mode, not strict schema adherence
    pub fn supports_json_schema(self) -> bool {
        !self.is_groq()
    }
}

/// OpenAI-compatible streaming service
pub struct OpenAIService {
    client: Client,
    api_key: String,
    model: OpenAIModel,
    base_url: String,
    model_id: String,
}

impl OpenAIService {
    pub fn new(api_key: String, model: OpenAIModel, gateway: Option<&str>) -> Result<Self, LlmError> {
        let base_url = match (gateway, model.is_groq()) {
            (Some(gw), true) => {
                format!("{}/groq/openai/v1/chat/completions", gw.trim_end_matches('/'))
            }
            (Some(gw), false) => format!("{}/openai/v1/chat/completions", gw.trim_end_matches('/')),
            (None, true) => "https://api.groq.com/openai/v1/chat/completions".to_string(),
            (None, false) => "https://api.openai.com/v1/chat/completions".to_string(),
        };

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url,
            model_id: model.model_id().to_string(),
        })
    }

    /// Point the service at an explicit chat-completions URL
    #[cfg(test)]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn translate_request(&self, request: &ObjectRequest) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        messages.push(OpenAIMessage {
            role: "system".to_string(),
            content: request.system.clone(),
        });
        messages.extend(request.messages.iter().map(Self::translate_message));

        let response_format = if self.model.supports_json_schema() {
            json!({
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema.name,
                    "strict": true,
                    "schema": request.schema.schema,
                }
            })
        } else {
            json!({ "type": "json_object" })
        };

        OpenAIRequest {
            model: self.model.api_name().to_string(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format,
            stream: true,
            stream_options: (!self.model.is_groq()).then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    fn translate_message(msg: &LlmMessage) -> OpenAIMessage {
        OpenAIMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

#[async_trait]
impl LlmService for OpenAIService {
    async fn stream_object(&self, request: &ObjectRequest) -> Result<ObjectStream, LlmError> {
        let openai_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;
            let message = serde_json::from_str::<OpenAIErrorResponse>(&body)
                .map_or(body, |resp| resp.error.message);
            return Err(LlmError::from_status(status.as_u16(), &message));
        }

        Ok(Box::pin(decode_object_stream(response.bytes_stream())))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Turn a chat-completions SSE body into cumulative object snapshots
fn decode_object_stream<S, B>(body: S) -> impl Stream<Item = Result<ObjectChunk, LlmError>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send,
{
    try_stream! {
        let mut body = Box::pin(body);
        let mut decoder = SseDecoder::new();
        let mut text = String::new();
        let mut last: Option<Value> = None;
        let mut usage = Usage::default();
        let mut done = false;

        while let Some(chunk) = body.next().await {
            let chunk = chunk
                .map_err(|e| LlmError::network(format!("Stream interrupted: {e}")))?;

            for frame in decoder.push(chunk.as_ref()) {
                if frame.data == "[DONE]" {
                    done = true;
                    break;
                }

                let parsed: StreamChunk = serde_json::from_str(&frame.data).map_err(|e| {
                    LlmError::unknown(format!("Failed to decode stream chunk: {e}"))
                })?;

                if let Some(error) = parsed.error {
                    Err(LlmError::server_error(format!("Stream error: {}", error.message)))?;
                }
                if let Some(u) = parsed.usage {
                    usage = Usage {
                        input_tokens: u64::from(u.prompt_tokens),
                        output_tokens: u64::from(u.completion_tokens),
                    };
                }

                let mut changed = false;
                for choice in parsed.choices {
                    if let Some(content) = choice.delta.content {
                        changed |= !content.is_empty();
                        text.push_str(&content);
                    }
                }

                if changed {
                    if let Some(snapshot) = partial_json::parse(&text) {
                        if last.as_ref() != Some(&snapshot) {
                            last = Some(snapshot.clone());
                            yield ObjectChunk::Partial(snapshot);
                        }
                    }
                }
            }

            if done {
                break;
            }
        }

        if !done {
            tracing::debug!("Provider stream closed without [DONE] marker");
        }

        let object: Value = serde_json::from_str(text.trim()).map_err(|e| {
            LlmError::invalid_output(format!("Model output is not valid JSON: {e}"))
        })?;
        yield ObjectChunk::Complete { object, usage };
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    response_format: Value,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
    #[serde(default)]
    error: Option<OpenAIError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

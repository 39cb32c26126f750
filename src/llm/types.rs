//! Common types for structured-output generation

use serde_json::Value;

/// Structured generation request: the model must answer with a JSON object
/// conforming to `schema`.
#[derive(Debug, Clone)]
pub struct ObjectRequest {
    pub system: String,
    pub messages: Vec<LlmMessage>,
    pub schema: ObjectSchema,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Named JSON schema for the requested object
#[derive(Debug, Clone)]
pub struct ObjectSchema {
    pub name: String,
    pub schema: Value,
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub content: String,
}

impl LlmMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One element of an object stream.
///
/// Every `Partial` is the whole object-so-far, never a delta. A successful
/// stream ends with exactly one `Complete`.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectChunk {
    Partial(Value),
    Complete { object: Value, usage: Usage },
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

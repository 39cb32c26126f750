//! Scripted LLM service for tests

use super::{LlmError, LlmService, ObjectChunk, ObjectRequest, ObjectStream, Usage};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

type Script = Result<Vec<Result<ObjectChunk, LlmError>>, LlmError>;

/// Mock LLM service that replays queued streams
pub struct MockLlmService {
    scripts: Mutex<VecDeque<Script>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<ObjectRequest>>,
}

impl MockLlmService {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a stream that emits each snapshot as a partial and then
    /// completes with the last one
    pub fn queue_object(&self, snapshots: Vec<Value>) {
        let mut chunks: Vec<Result<ObjectChunk, LlmError>> = snapshots
            .iter()
            .cloned()
            .map(|v| Ok(ObjectChunk::Partial(v)))
            .collect();
        if let Some(object) = snapshots.last().cloned() {
            chunks.push(Ok(ObjectChunk::Complete {
                object,
                usage: Usage::default(),
            }));
        }
        self.queue_stream(chunks);
    }

    /// Queue an exact sequence of stream items
    pub fn queue_stream(&self, chunks: Vec<Result<ObjectChunk, LlmError>>) {
        self.scripts.lock().unwrap().push_back(Ok(chunks));
    }

    /// Queue a failure to open the stream
    pub fn queue_error(&self, error: LlmError) {
        self.scripts.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<ObjectRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn stream_object(&self, request: &ObjectRequest) -> Result<ObjectStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::unknown("No mock response queued")));
        let chunks = script?;
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

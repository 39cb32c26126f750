//! HTTP transport for the ruling endpoint

use super::session::{ClientError, PartialStream, RulingTransport};
use crate::api::{ErrorResponse, ERROR_EVENT, PARTIAL_EVENT};
use crate::ruling::{PartialRulingResult, RulingRequest};
use crate::sse::{SseDecoder, SseFrame};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::time::Duration;

/// Server the terminal client talks to when `HALAL_URL` is unset
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to `POST /api/ruling` and decodes its event stream
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/ruling", base_url.trim_end_matches('/')),
        })
    }

    /// Build from `HALAL_URL`
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url =
            std::env::var("HALAL_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        Self::new(&base_url)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RulingTransport for HttpTransport {
    async fn open(&self, request: &RulingRequest) -> Result<PartialStream, ClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Box::pin(decode_partials(response.bytes_stream())))
    }
}

fn decode_partials<S, B>(body: S) -> impl Stream<Item = Result<PartialRulingResult, ClientError>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send,
{
    try_stream! {
        let mut body = Box::pin(body);
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ClientError::Network(format!("Stream interrupted: {e}")))?;
            for frame in decoder.push(chunk.as_ref()) {
                if let Some(partial) = frame_to_partial(frame)? {
                    yield partial;
                }
            }
        }

        if let Some(frame) = decoder.finish() {
            if let Some(partial) = frame_to_partial(frame)? {
                yield partial;
            }
        }
    }
}

fn frame_to_partial(frame: SseFrame) -> Result<Option<PartialRulingResult>, ClientError> {
    match frame.event.as_deref() {
        Some(ERROR_EVENT) => {
            let message = serde_json::from_str::<ErrorResponse>(&frame.data)
                .map(|e| e.error)
                .unwrap_or(frame.data);
            Err(ClientError::Stream(message))
        }
        Some(PARTIAL_EVENT) | None => serde_json::from_str(&frame.data)
            .map(Some)
            .map_err(|e| ClientError::Stream(format!("Malformed ruling chunk: {e}"))),
        Some(other) => {
            tracing::debug!(event = other, "Ignoring unknown event");
            Ok(None)
        }
    }
}

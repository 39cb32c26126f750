//! Server-Sent Events relay for ruling streams

use super::types::{ErrorResponse, ERROR_EVENT, PARTIAL_EVENT};
use crate::ruling::{PartialRulingResult, RulingError, RulingStream};
use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::StreamExt;

/// Relay ruling snapshots as `partial` events.
///
/// A failure becomes one `error` event and ends the response; success ends
/// it when the ruling stream does.
pub fn ruling_sse(mut rulings: RulingStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = stream! {
        while let Some(item) = rulings.next().await {
            match item {
                Ok(partial) => yield Ok(partial_event(&partial)),
                Err(e) => {
                    yield Ok(error_event(&e));
                    break;
                }
            }
        }
    };

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn partial_event(partial: &PartialRulingResult) -> Event {
    let data = serde_json::to_string(partial).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(PARTIAL_EVENT).data(data)
}

fn error_event(error: &RulingError) -> Event {
    let body = ErrorResponse::new(error.public_message());
    let data = serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(ERROR_EVENT).data(data)
}

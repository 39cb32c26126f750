//! Events that can occur in a conversation

use super::state::RequestId;
use crate::ruling::PartialRulingResult;

/// Events that trigger state transitions
///
/// User events that start a request carry the id the request will run
/// under; stream events carry the id of the request they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User events
    SubmitQuery {
        query: String,
        request_id: RequestId,
    },
    AnswerClarification {
        answer: String,
        request_id: RequestId,
    },
    FollowUp {
        text: String,
        request_id: RequestId,
    },
    Retry {
        request_id: RequestId,
    },
    StartOver,

    // Stream events
    StreamChunk {
        request_id: RequestId,
        partial: PartialRulingResult,
    },
    StreamCompleted {
        request_id: RequestId,
    },
    StreamFailed {
        request_id: RequestId,
        message: String,
    },
}

impl Event {
    /// Request the event belongs to, for stream events
    pub fn stream_request_id(&self) -> Option<RequestId> {
        match self {
            Event::StreamChunk { request_id, .. }
            | Event::StreamCompleted { request_id }
            | Event::StreamFailed { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }
}

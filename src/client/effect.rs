//! Effects produced by state transitions

use super::state::RequestId;
use crate::ruling::RulingRequest;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a ruling stream; its events must carry `request_id`
    SendRequest {
        request_id: RequestId,
        request: RulingRequest,
    },

    /// Stop reading the stream of an abandoned request.
    ///
    /// Only produced when `StartOver` arrives mid-stream, which requires a
    /// host that feeds user and stream events through one queue. [`Session`]
    /// awaits each stream to its end, so it never sees this effect.
    ///
    /// [`Session`]: super::Session
    AbortRequest { request_id: RequestId },
}

//! Pure state transition function
//!
//! Given the same state and event this always produces the same result;
//! requests are only described, as effects, never performed here.

use super::state::{Conversation, ConvState, RequestId, Round, Submission};
use super::{Effect, Event};
use crate::ruling::{PartialRulingResult, GENERIC_FAILURE_MESSAGE};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("A ruling is already being generated")]
    Busy,
    #[error("Input must not be empty")]
    EmptyInput,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

fn non_empty(text: &str) -> Result<String, TransitionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(TransitionError::EmptyInput)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Start streaming `submission` under `request_id`
fn send(submission: Submission, request_id: RequestId) -> TransitionResult {
    let request = submission.request();
    TransitionResult::new(ConvState::AwaitingRuling {
        submission,
        request_id,
        partial: None,
    })
    .with_effect(Effect::SendRequest {
        request_id,
        request,
    })
}

/// Pure transition function
pub fn transition(state: &ConvState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Reset
        // ============================================================
        (ConvState::AwaitingRuling { request_id, .. }, Event::StartOver) => {
            Ok(TransitionResult::new(ConvState::Idle).with_effect(Effect::AbortRequest {
                request_id: *request_id,
            }))
        }
        (_, Event::StartOver) => Ok(TransitionResult::new(ConvState::Idle)),

        // ============================================================
        // One request at a time
        // ============================================================
        (
            ConvState::AwaitingRuling { .. },
            Event::SubmitQuery { .. }
            | Event::AnswerClarification { .. }
            | Event::FollowUp { .. }
            | Event::Retry { .. },
        ) => Err(TransitionError::Busy),

        // ============================================================
        // New question: always starts a fresh conversation
        // ============================================================
        (_, Event::SubmitQuery { query, request_id }) => {
            let query = non_empty(&query)?;
            Ok(send(
                Submission {
                    conversation: Conversation::new(query),
                    round: Round::Initial,
                },
                request_id,
            ))
        }

        // ============================================================
        // Clarification sub-dialogue
        // ============================================================
        (
            ConvState::AwaitingClarificationResponse {
                conversation,
                question,
                finalized,
            },
            Event::AnswerClarification { answer, request_id },
        ) => {
            let answer = non_empty(&answer)?;
            Ok(send(
                Submission {
                    conversation: conversation.clone(),
                    round: Round::ClarificationAnswer {
                        question: question.clone(),
                        answer,
                        finalized: finalized.clone(),
                    },
                },
                request_id,
            ))
        }

        // ============================================================
        // Follow-up to a finished ruling
        // ============================================================
        (
            ConvState::Ruled {
                conversation,
                verdict,
            },
            Event::FollowUp { text, request_id },
        ) => {
            let text = non_empty(&text)?;
            Ok(send(
                Submission {
                    conversation: conversation.clone(),
                    round: Round::FollowUp {
                        text,
                        verdict: verdict.clone(),
                    },
                },
                request_id,
            ))
        }

        // ============================================================
        // Recovery
        // ============================================================
        (ConvState::Failed { submission, .. }, Event::Retry { request_id }) => {
            Ok(send(submission.clone(), request_id))
        }

        // A fresh answer or follow-up replaces the failed round
        (
            ConvState::Failed { submission, .. },
            event @ (Event::AnswerClarification { .. } | Event::FollowUp { .. }),
        ) => transition(&submission.resume(), event),

        // ============================================================
        // Streaming
        // ============================================================
        (
            ConvState::AwaitingRuling {
                submission,
                request_id,
                ..
            },
            Event::StreamChunk {
                request_id: chunk_id,
                partial,
            },
        ) if *request_id == chunk_id => Ok(TransitionResult::new(ConvState::AwaitingRuling {
            submission: submission.clone(),
            request_id: *request_id,
            partial: Some(partial),
        })),

        (
            ConvState::AwaitingRuling {
                submission,
                request_id,
                partial,
            },
            Event::StreamCompleted {
                request_id: completed_id,
            },
        ) if *request_id == completed_id => {
            let new_state = match partial.as_ref().map(PartialRulingResult::validate) {
                Some(Ok(result)) => submission.commit(result),
                Some(Err(_)) | None => ConvState::Failed {
                    submission: submission.clone(),
                    message: GENERIC_FAILURE_MESSAGE.to_string(),
                },
            };
            Ok(TransitionResult::new(new_state))
        }

        (
            ConvState::AwaitingRuling {
                submission,
                request_id,
                ..
            },
            Event::StreamFailed {
                request_id: failed_id,
                message,
            },
        ) if *request_id == failed_id => Ok(TransitionResult::new(ConvState::Failed {
            submission: submission.clone(),
            message,
        })),

        // Events from an abandoned request
        (_, event) if event.stream_request_id().is_some() => {
            Ok(TransitionResult::new(state.clone()))
        }

        // ============================================================
        // Everything else
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with {event:?}"
        ))),
    }
}

//! Drives the conversation state machine against a ruling transport

use super::state::{ConvState, ConversationView, RequestId};
use super::transition::{transition, TransitionError};
use super::{Effect, Event};
use crate::ruling::{PartialRulingResult, RulingRequest};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use thiserror::Error;

/// Stream of cumulative ruling snapshots as received by the client
pub type PartialStream =
    Pin<Box<dyn Stream<Item = Result<PartialRulingResult, ClientError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Could not reach the server: {0}")]
    Network(String),
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("{0}")]
    Stream(String),
}

/// Opens ruling streams
#[async_trait]
pub trait RulingTransport: Send + Sync {
    async fn open(&self, request: &RulingRequest) -> Result<PartialStream, ClientError>;
}

/// One conversation with a single request in flight at a time.
///
/// Every method that sends a request returns once the stream has ended;
/// `on_update` sees the view after every state change. Because the session
/// is borrowed for the whole stream, a request is abandoned only by dropping
/// the returned future, which drops the stream and closes the connection.
pub struct Session<T> {
    transport: T,
    state: ConvState,
    next_request_id: u64,
}

impl<T: RulingTransport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: ConvState::Idle,
            next_request_id: 1,
        }
    }

    pub fn state(&self) -> &ConvState {
        &self.state
    }

    pub fn view(&self) -> ConversationView {
        self.state.view()
    }

    pub async fn submit_query<F>(&mut self, query: &str, mut on_update: F) -> Result<(), TransitionError>
    where
        F: FnMut(&ConversationView),
    {
        let request_id = self.mint_request_id();
        let event = Event::SubmitQuery {
            query: query.to_string(),
            request_id,
        };
        self.dispatch(event, &mut on_update).await
    }

    pub async fn answer_clarification<F>(
        &mut self,
        answer: &str,
        mut on_update: F,
    ) -> Result<(), TransitionError>
    where
        F: FnMut(&ConversationView),
    {
        let request_id = self.mint_request_id();
        let event = Event::AnswerClarification {
            answer: answer.to_string(),
            request_id,
        };
        self.dispatch(event, &mut on_update).await
    }

    pub async fn follow_up<F>(&mut self, text: &str, mut on_update: F) -> Result<(), TransitionError>
    where
        F: FnMut(&ConversationView),
    {
        let request_id = self.mint_request_id();
        let event = Event::FollowUp {
            text: text.to_string(),
            request_id,
        };
        self.dispatch(event, &mut on_update).await
    }

    pub async fn retry<F>(&mut self, mut on_update: F) -> Result<(), TransitionError>
    where
        F: FnMut(&ConversationView),
    {
        let request_id = self.mint_request_id();
        self.dispatch(Event::Retry { request_id }, &mut on_update).await
    }

    pub fn start_over(&mut self) {
        // Nothing is streaming between calls, so there is no request to abort
        self.state = ConvState::Idle;
    }

    fn mint_request_id(&mut self) -> RequestId {
        let id = RequestId(self.next_request_id);
        self.next_request_id += 1;
        id
    }

    /// Apply an event and run the effects it produces
    async fn dispatch<F>(&mut self, event: Event, on_update: &mut F) -> Result<(), TransitionError>
    where
        F: FnMut(&ConversationView),
    {
        let mut effects: VecDeque<Effect> = self.apply(event, on_update)?.into();

        while let Some(effect) = effects.pop_front() {
            match effect {
                Effect::SendRequest {
                    request_id,
                    request,
                } => {
                    let follow_up = self.run_request(request_id, &request, on_update).await;
                    effects.extend(follow_up);
                }
                // Unreachable while requests run to completion, see `Effect::AbortRequest`
                Effect::AbortRequest { request_id } => {
                    tracing::debug!(request_id = %request_id, "Request abandoned");
                }
            }
        }
        Ok(())
    }

    fn apply<F>(&mut self, event: Event, on_update: &mut F) -> Result<Vec<Effect>, TransitionError>
    where
        F: FnMut(&ConversationView),
    {
        let result = transition(&self.state, event)?;
        if result.new_state != self.state {
            self.state = result.new_state;
            on_update(&self.state.view());
        }
        Ok(result.effects)
    }

    /// Stream one request to its end, feeding every item to the state
    /// machine; returns effects those events produced
    async fn run_request<F>(
        &mut self,
        request_id: RequestId,
        request: &RulingRequest,
        on_update: &mut F,
    ) -> Vec<Effect>
    where
        F: FnMut(&ConversationView),
    {
        tracing::debug!(
            request_id = %request_id,
            history_len = request.history.len(),
            "Sending ruling request"
        );

        let mut effects = Vec::new();
        let mut stream = match self.transport.open(request).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Ruling request failed");
                let event = Event::StreamFailed {
                    request_id,
                    message: e.to_string(),
                };
                effects.extend(self.apply_stream_event(event, on_update));
                return effects;
            }
        };

        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(partial) => Event::StreamChunk {
                    request_id,
                    partial,
                },
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Ruling stream failed");
                    let event = Event::StreamFailed {
                        request_id,
                        message: e.to_string(),
                    };
                    effects.extend(self.apply_stream_event(event, on_update));
                    return effects;
                }
            };
            effects.extend(self.apply_stream_event(event, on_update));
        }

        effects.extend(self.apply_stream_event(Event::StreamCompleted { request_id }, on_update));
        effects
    }

    fn apply_stream_event<F>(&mut self, event: Event, on_update: &mut F) -> Vec<Effect>
    where
        F: FnMut(&ConversationView),
    {
        self.apply(event, on_update).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Stream event rejected");
            Vec::new()
        })
    }
}

//! Conversation state types

use crate::ruling::{PartialRulingResult, Ruling, RulingRequest, RulingResult, Turn, Verdict};
use std::fmt;

/// Identifies one request so stream events from an abandoned request can
/// be told apart from the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The original question and every committed turn since
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub original_query: String,
    pub history: Vec<Turn>,
}

impl Conversation {
    pub fn new(original_query: impl Into<String>) -> Self {
        Self {
            original_query: original_query.into(),
            history: Vec::new(),
        }
    }
}

/// What a request is asking the model to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Round {
    /// First evaluation of a new question
    Initial,
    /// Re-evaluation after answering the model's clarifying question
    ClarificationAnswer {
        question: String,
        answer: String,
        finalized: Option<Verdict>,
    },
    /// Re-evaluation after a follow-up to a finished ruling
    FollowUp { text: String, verdict: Verdict },
}

impl Round {
    /// Turns this round adds to history once its request succeeds
    pub fn pending_turns(&self) -> Vec<Turn> {
        match self {
            Round::Initial => vec![],
            Round::ClarificationAnswer {
                question, answer, ..
            } => vec![Turn::assistant(question.clone()), Turn::user(answer.clone())],
            Round::FollowUp { text, .. } => vec![Turn::user(text.clone())],
        }
    }

    /// The last finished ruling, kept on display through this round
    pub fn finalized(&self) -> Option<&Verdict> {
        match self {
            Round::Initial => None,
            Round::ClarificationAnswer { finalized, .. } => finalized.as_ref(),
            Round::FollowUp { verdict, .. } => Some(verdict),
        }
    }
}

/// A request together with the conversation it was made against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub conversation: Conversation,
    pub round: Round,
}

impl Submission {
    /// Request body: the original query plus committed and pending turns
    pub fn request(&self) -> RulingRequest {
        let mut history = self.conversation.history.clone();
        history.extend(self.round.pending_turns());
        RulingRequest {
            query: self.conversation.original_query.clone(),
            history,
        }
    }

    /// State the conversation was in before this submission
    pub fn resume(&self) -> ConvState {
        match &self.round {
            Round::Initial => ConvState::Idle,
            Round::ClarificationAnswer {
                question,
                finalized,
                ..
            } => ConvState::AwaitingClarificationResponse {
                conversation: self.conversation.clone(),
                question: question.clone(),
                finalized: finalized.clone(),
            },
            Round::FollowUp { verdict, .. } => ConvState::Ruled {
                conversation: self.conversation.clone(),
                verdict: verdict.clone(),
            },
        }
    }

    /// State after the request finished with `result`; pending turns are
    /// committed to history here and nowhere else
    pub fn commit(&self, result: RulingResult) -> ConvState {
        let mut conversation = self.conversation.clone();
        conversation.history.extend(self.round.pending_turns());

        match result {
            RulingResult::Concluded(verdict) => ConvState::Ruled {
                conversation,
                verdict,
            },
            RulingResult::NeedsClarification { question } => {
                ConvState::AwaitingClarificationResponse {
                    conversation,
                    question,
                    finalized: self.round.finalized().cloned(),
                }
            }
        }
    }
}

/// Client-side conversation state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConvState {
    /// Nothing asked yet, or reset
    #[default]
    Idle,

    /// A request is streaming
    AwaitingRuling {
        submission: Submission,
        request_id: RequestId,
        /// Latest accepted snapshot of the in-flight ruling
        partial: Option<PartialRulingResult>,
    },

    /// The model asked a clarifying question
    AwaitingClarificationResponse {
        conversation: Conversation,
        question: String,
        finalized: Option<Verdict>,
    },

    /// A ruling is finalized
    Ruled {
        conversation: Conversation,
        verdict: Verdict,
    },

    /// The last request failed; nothing was committed and it can be retried
    Failed {
        submission: Submission,
        message: String,
    },
}

impl ConvState {
    /// Check if a request is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, ConvState::AwaitingRuling { .. })
    }

    pub fn in_flight(&self) -> Option<RequestId> {
        match self {
            ConvState::AwaitingRuling { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        match self {
            ConvState::Idle => None,
            ConvState::AwaitingRuling { submission, .. } | ConvState::Failed { submission, .. } => {
                Some(&submission.conversation)
            }
            ConvState::AwaitingClarificationResponse { conversation, .. }
            | ConvState::Ruled { conversation, .. } => Some(conversation),
        }
    }

    /// Committed history; pending turns of an in-flight or failed round are
    /// not included
    pub fn history(&self) -> &[Turn] {
        self.conversation()
            .map(|c| c.history.as_slice())
            .unwrap_or_default()
    }

    /// Last finalized concrete ruling
    pub fn finalized(&self) -> Option<&Verdict> {
        match self {
            ConvState::Idle => None,
            ConvState::AwaitingRuling { submission, .. } | ConvState::Failed { submission, .. } => {
                submission.round.finalized()
            }
            ConvState::AwaitingClarificationResponse { finalized, .. } => finalized.as_ref(),
            ConvState::Ruled { verdict, .. } => Some(verdict),
        }
    }

    /// What a UI should render for this state
    pub fn view(&self) -> ConversationView {
        let finalized = self.finalized().map(verdict_snapshot);
        match self {
            ConvState::Idle => ConversationView {
                can_submit: true,
                ..ConversationView::default()
            },
            ConvState::AwaitingRuling { partial, .. } => {
                // A clarification request streaming in for a follow-up must
                // not replace the ruling already on screen
                let in_flight = partial.clone().filter(|p| {
                    finalized.is_none() || p.ruling != Some(Ruling::NeedsClarification)
                });
                ConversationView {
                    loading: true,
                    streaming: in_flight.is_some(),
                    ruling: in_flight.or(finalized),
                    ..ConversationView::default()
                }
            }
            ConvState::AwaitingClarificationResponse { question, .. } => ConversationView {
                ruling: finalized,
                clarifying_question: Some(question.clone()),
                can_submit: true,
                ..ConversationView::default()
            },
            ConvState::Ruled { .. } => ConversationView {
                ruling: finalized,
                can_submit: true,
                ..ConversationView::default()
            },
            ConvState::Failed {
                submission,
                message,
            } => ConversationView {
                ruling: finalized,
                clarifying_question: match &submission.round {
                    Round::ClarificationAnswer { question, .. } => Some(question.clone()),
                    _ => None,
                },
                error: Some(message.clone()),
                can_submit: true,
                ..ConversationView::default()
            },
        }
    }
}

fn verdict_snapshot(verdict: &Verdict) -> PartialRulingResult {
    PartialRulingResult::from(&RulingResult::Concluded(verdict.clone()))
}

/// Render model of a conversation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationView {
    pub loading: bool,
    /// In-flight partial while loading, otherwise the finalized ruling
    pub ruling: Option<PartialRulingResult>,
    /// `ruling` is the in-flight partial rather than the finalized fallback
    pub streaming: bool,
    pub clarifying_question: Option<String>,
    pub error: Option<String>,
    pub can_submit: bool,
}

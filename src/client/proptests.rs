//! Property-based tests for the conversation state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::ruling::{PartialRulingResult, Ruling, Turn, Verdict};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_request_id() -> impl Strategy<Value = RequestId> {
    (0u64..4).prop_map(RequestId)
}

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z ]{0,20}"
}

fn arb_concrete_ruling() -> impl Strategy<Value = Ruling> {
    prop_oneof![
        Just(Ruling::Haram),
        Just(Ruling::ProbablyHaram),
        Just(Ruling::Depends),
        Just(Ruling::ProbablyHalal),
        Just(Ruling::Halal),
    ]
}

fn arb_verdict() -> impl Strategy<Value = Verdict> {
    (
        arb_concrete_ruling(),
        "[a-zA-Z]{1,20}",
        proptest::collection::vec("[a-z]{1,10}", 0..=3),
    )
        .prop_map(|(ruling, explanation, references)| Verdict {
            ruling,
            explanation,
            references,
        })
}

fn arb_turn() -> impl Strategy<Value = Turn> {
    (any::<bool>(), "[a-z]{1,10}").prop_map(|(user, content)| {
        if user {
            Turn::user(content)
        } else {
            Turn::assistant(content)
        }
    })
}

fn arb_conversation() -> impl Strategy<Value = Conversation> {
    ("[a-z]{1,10}", proptest::collection::vec(arb_turn(), 0..6)).prop_map(
        |(original_query, history)| Conversation {
            original_query,
            history,
        },
    )
}

fn arb_round() -> impl Strategy<Value = Round> {
    prop_oneof![
        Just(Round::Initial),
        ("[a-z]{1,10}", "[a-z]{1,10}", proptest::option::of(arb_verdict())).prop_map(
            |(question, answer, finalized)| Round::ClarificationAnswer {
                question,
                answer,
                finalized,
            }
        ),
        ("[a-z]{1,10}", arb_verdict()).prop_map(|(text, verdict)| Round::FollowUp { text, verdict }),
    ]
}

fn arb_submission() -> impl Strategy<Value = Submission> {
    (arb_conversation(), arb_round()).prop_map(|(conversation, round)| Submission {
        conversation,
        round,
    })
}

/// Snapshots as the server would send them: sometimes incomplete,
/// sometimes clarification requests, sometimes invalid
fn arb_partial() -> impl Strategy<Value = PartialRulingResult> {
    prop_oneof![
        Just(PartialRulingResult::default()),
        arb_verdict().prop_map(|v| PartialRulingResult {
            ruling: Some(v.ruling),
            explanation: Some(v.explanation),
            references: Some(v.references),
            clarifying_question: None,
        }),
        "[a-z]{1,10}".prop_map(|q| PartialRulingResult {
            ruling: Some(Ruling::NeedsClarification),
            clarifying_question: Some(q),
            ..Default::default()
        }),
        arb_concrete_ruling().prop_map(|ruling| PartialRulingResult {
            ruling: Some(ruling),
            ..Default::default()
        }),
    ]
}

fn arb_awaiting_state() -> impl Strategy<Value = ConvState> {
    (arb_submission(), arb_request_id(), proptest::option::of(arb_partial())).prop_map(
        |(submission, request_id, partial)| ConvState::AwaitingRuling {
            submission,
            request_id,
            partial,
        },
    )
}

fn arb_state() -> impl Strategy<Value = ConvState> {
    prop_oneof![
        Just(ConvState::Idle),
        arb_awaiting_state(),
        (arb_conversation(), "[a-z]{1,10}", proptest::option::of(arb_verdict())).prop_map(
            |(conversation, question, finalized)| ConvState::AwaitingClarificationResponse {
                conversation,
                question,
                finalized,
            }
        ),
        (arb_conversation(), arb_verdict())
            .prop_map(|(conversation, verdict)| ConvState::Ruled { conversation, verdict }),
        (arb_submission(), "[a-z]{1,10}")
            .prop_map(|(submission, message)| ConvState::Failed { submission, message }),
    ]
}

fn arb_user_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (arb_text(), arb_request_id())
            .prop_map(|(query, request_id)| Event::SubmitQuery { query, request_id }),
        (arb_text(), arb_request_id())
            .prop_map(|(answer, request_id)| Event::AnswerClarification { answer, request_id }),
        (arb_text(), arb_request_id())
            .prop_map(|(text, request_id)| Event::FollowUp { text, request_id }),
        arb_request_id().prop_map(|request_id| Event::Retry { request_id }),
    ]
}

fn arb_stream_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (arb_request_id(), arb_partial())
            .prop_map(|(request_id, partial)| Event::StreamChunk { request_id, partial }),
        arb_request_id().prop_map(|request_id| Event::StreamCompleted { request_id }),
        (arb_request_id(), "[a-z]{1,10}")
            .prop_map(|(request_id, message)| Event::StreamFailed { request_id, message }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        4 => arb_user_event(),
        6 => arb_stream_event(),
        1 => Just(Event::StartOver),
    ]
}

// ============================================================================
// Invariant Checks
// ============================================================================

fn is_valid_state(state: &ConvState) -> bool {
    let view = state.view();
    if view.loading != state.is_busy() || view.can_submit == view.loading {
        return false;
    }
    if view.streaming && !view.loading {
        return false;
    }
    match state {
        ConvState::Ruled { verdict, .. } => {
            verdict.ruling.is_concrete() && !verdict.explanation.is_empty()
        }
        ConvState::AwaitingClarificationResponse { question, .. } => !question.is_empty(),
        ConvState::Failed { message, .. } => view.error.as_deref() == Some(message.as_str()),
        ConvState::Idle | ConvState::AwaitingRuling { .. } => view.error.is_none(),
    }
}

fn effects_are_valid(effects: &[Effect], new_state: &ConvState) -> bool {
    effects.iter().all(|effect| match effect {
        // A request is only sent when the new state waits for it
        Effect::SendRequest { request_id, request } => {
            new_state.in_flight() == Some(*request_id)
                && new_state.conversation().map(|c| c.original_query.as_str())
                    == Some(request.query.as_str())
        }
        Effect::AbortRequest { .. } => *new_state == ConvState::Idle,
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Arbitrary event sequences keep every reachable state valid
    #[test]
    fn prop_transitions_preserve_validity(events in proptest::collection::vec(arb_event(), 0..30)) {
        let mut state = ConvState::Idle;
        for event in events {
            if let Ok(result) = transition(&state, event) {
                prop_assert!(is_valid_state(&result.new_state), "invalid state {:?}", result.new_state);
                prop_assert!(effects_are_valid(&result.effects, &result.new_state));
                state = result.new_state;
            }
        }
    }

    /// History never shrinks except on reset or a new question
    #[test]
    fn prop_history_only_grows(state in arb_state(), event in arb_event()) {
        let starts_over = matches!(event, Event::StartOver | Event::SubmitQuery { .. });
        if let Ok(result) = transition(&state, event) {
            if !starts_over {
                let before = state.history();
                let after = result.new_state.history();
                prop_assert!(after.len() >= before.len());
                prop_assert_eq!(&after[..before.len()], before);
            }
        }
    }

    /// A successful completion commits exactly the round's pending turns
    #[test]
    fn prop_completion_commits_pending_turns(submission in arb_submission(), partial in arb_partial()) {
        let request_id = RequestId(1);
        let state = ConvState::AwaitingRuling {
            submission: submission.clone(),
            request_id,
            partial: Some(partial.clone()),
        };
        let result = transition(&state, Event::StreamCompleted { request_id }).unwrap();

        match partial.validate() {
            Ok(_) => {
                let expected = submission.conversation.history.len() + submission.round.pending_turns().len();
                prop_assert_eq!(result.new_state.history().len(), expected);
            }
            Err(_) => {
                let is_failed = matches!(result.new_state, ConvState::Failed { .. });
                prop_assert!(is_failed);
            }
        }
    }

    /// Failure leaves history and the finalized ruling untouched
    #[test]
    fn prop_failure_does_not_mutate(state in arb_awaiting_state(), message in "[a-z]{1,10}") {
        let request_id = state.in_flight().unwrap();
        let result = transition(&state, Event::StreamFailed { request_id, message }).unwrap();
        prop_assert_eq!(result.new_state.history(), state.history());
        prop_assert_eq!(result.new_state.finalized(), state.finalized());
        prop_assert!(result.effects.is_empty());
    }

    /// A failed request can always be retried with the same body
    #[test]
    fn prop_failed_is_retryable(submission in arb_submission(), message in "[a-z]{1,10}") {
        let expected = submission.request();
        let state = ConvState::Failed { submission, message };
        let result = transition(&state, Event::Retry { request_id: RequestId(9) }).unwrap();
        prop_assert_eq!(
            result.effects,
            vec![Effect::SendRequest { request_id: RequestId(9), request: expected }]
        );
    }

    /// Start over always lands in Idle
    #[test]
    fn prop_start_over_resets(state in arb_state()) {
        let result = transition(&state, Event::StartOver).unwrap();
        prop_assert_eq!(result.new_state, ConvState::Idle);
    }

    /// User input is rejected while a request is in flight
    #[test]
    fn prop_busy_rejects_user_input(state in arb_awaiting_state(), event in arb_user_event()) {
        prop_assert_eq!(transition(&state, event).unwrap_err(), TransitionError::Busy);
    }

    /// Stream events for any other request leave the state unchanged
    #[test]
    fn prop_stale_stream_events_ignored(state in arb_state(), event in arb_stream_event()) {
        let current = state.in_flight();
        if event.stream_request_id() != current {
            let result = transition(&state, event).unwrap();
            prop_assert_eq!(result.new_state, state);
            prop_assert!(result.effects.is_empty());
        }
    }

    /// A clarification snapshot never hides a finalized ruling
    #[test]
    fn prop_finalized_stays_displayed(verdict in arb_verdict(), conversation in arb_conversation(), question in "[a-z]{1,10}") {
        let state = ConvState::AwaitingRuling {
            submission: Submission {
                conversation,
                round: Round::FollowUp { text: "more".to_string(), verdict: verdict.clone() },
            },
            request_id: RequestId(1),
            partial: Some(PartialRulingResult {
                ruling: Some(Ruling::NeedsClarification),
                clarifying_question: Some(question),
                ..Default::default()
            }),
        };
        let shown = state.view().ruling.and_then(|r| r.ruling);
        prop_assert_eq!(shown, Some(verdict.ruling));
    }
}

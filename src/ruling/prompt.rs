//! System prompt and output schema for ruling generation

use super::types::{Ruling, MAX_REFERENCES, MAX_REFERENCE_CHARS};
use serde_json::{json, Value};

/// Name the output schema is registered under with the provider
pub const SCHEMA_NAME: &str = "ruling_result";

/// Base instruction establishing the grading policy
const BASE_PROMPT: &str = r"You are a knowledgeable assistant that judges whether something is halal (permissible) or haram (forbidden) in Islam.

Respond with a single JSON object with the fields `ruling`, `explanation`, `references` and `clarifyingQuestion`.

`ruling` must be one of: HARAM, PROBABLY_HARAM, DEPENDS, PROBABLY_HALAL, HALAL, NEEDS_CLARIFICATION.

Prefer a concrete ruling over DEPENDS or NEEDS_CLARIFICATION. When you are uncertain, lean toward the permissive end (PROBABLY_HALAL or HALAL) and state your assumptions in `explanation`.

Use NEEDS_CLARIFICATION only when the question is too ambiguous to judge and nobody has clarified it yet. In that case set `clarifyingQuestion` to one short question and leave `explanation` and `references` null. For every other ruling set `explanation` and leave `clarifyingQuestion` null.";

fn references_rule() -> String {
    format!(
        "`references` holds at most {MAX_REFERENCES} entries of at most {MAX_REFERENCE_CHARS} characters each. Prefer direct quotations of the Quran or hadith over bare citations."
    )
}

/// Build the system prompt.
///
/// Once a conversation has history, the original question is restated here
/// so it stays recoverable no matter how the history reads.
pub fn system_prompt(query: &str, has_history: bool) -> String {
    let mut prompt = format!("{BASE_PROMPT}\n\n{}", references_rule());
    if has_history {
        prompt.push_str("\n\nThe conversation below is about this original question: ");
        prompt.push_str(query.trim());
        prompt.push_str(
            "\nIf the conversation already contains a clarification exchange, give a concrete ruling.",
        );
    }
    prompt
}

/// Framing for the opening user turn
pub fn user_turn(query: &str) -> String {
    format!("Is this haram in Islam: {}", query.trim())
}

/// JSON schema for a ruling, in the strict structured-output dialect:
/// every field is required and optional ones are nullable
pub fn ruling_schema() -> Value {
    let rulings: Vec<&str> = Ruling::ALL.iter().map(|r| r.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "ruling": {
                "type": "string",
                "enum": rulings
            },
            "explanation": {
                "type": ["string", "null"],
                "description": "Reasoning behind the ruling; null when asking for clarification"
            },
            "references": {
                "type": ["array", "null"],
                "items": { "type": "string" },
                "description": format!("Up to {MAX_REFERENCES} quotations supporting the ruling")
            },
            "clarifyingQuestion": {
                "type": ["string", "null"],
                "description": "Set only when ruling is NEEDS_CLARIFICATION"
            }
        },
        "required": ["ruling", "explanation", "references", "clarifyingQuestion"],
        "additionalProperties": false
    })
}

//! Ruling request and result types
//!
//! The wire shape of a ruling is a flat object with every field optional
//! ([`PartialRulingResult`]). Finished results are validated into
//! [`RulingResult`], which makes "explanation or question, never both"
//! unrepresentable.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// At most this many references per ruling
pub const MAX_REFERENCES: usize = 3;

/// Maximum length of one reference, in characters
pub const MAX_REFERENCE_CHARS: usize = 1000;

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/ruling`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulingRequest {
    /// The original question; stays the same across clarifications and
    /// follow-ups
    pub query: String,
    #[serde(default)]
    pub history: Vec<Turn>,
}

impl RulingRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }
}

/// Ruling grades, from forbidden to permissible, plus the clarification
/// escape hatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ruling {
    Haram,
    ProbablyHaram,
    Depends,
    ProbablyHalal,
    Halal,
    NeedsClarification,
}

impl Ruling {
    pub const ALL: [Ruling; 6] = [
        Ruling::Haram,
        Ruling::ProbablyHaram,
        Ruling::Depends,
        Ruling::ProbablyHalal,
        Ruling::Halal,
        Ruling::NeedsClarification,
    ];

    /// Wire name, as used in the output schema
    pub fn as_str(self) -> &'static str {
        match self {
            Ruling::Haram => "HARAM",
            Ruling::ProbablyHaram => "PROBABLY_HARAM",
            Ruling::Depends => "DEPENDS",
            Ruling::ProbablyHalal => "PROBABLY_HALAL",
            Ruling::Halal => "HALAL",
            Ruling::NeedsClarification => "NEEDS_CLARIFICATION",
        }
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            Ruling::Haram => "Haram",
            Ruling::ProbablyHaram => "Probably Haram",
            Ruling::Depends => "Depends",
            Ruling::ProbablyHalal => "Probably Halal",
            Ruling::Halal => "Halal",
            Ruling::NeedsClarification => "Needs Clarification",
        }
    }

    /// Whether this is an actual ruling rather than a request for context
    pub fn is_concrete(self) -> bool {
        self != Ruling::NeedsClarification
    }
}

impl fmt::Display for Ruling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Object-so-far of a streamed ruling; every field may still be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialRulingResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruling: Option<Ruling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarifying_question: Option<String>,
}

impl PartialRulingResult {
    /// Whether the references seen so far respect the count and length limits
    pub fn references_within_bounds(&self) -> bool {
        self.references.as_ref().map_or(true, |refs| {
            refs.len() <= MAX_REFERENCES
                && refs.iter().all(|r| r.chars().count() <= MAX_REFERENCE_CHARS)
        })
    }

    /// Whether every field set in `previous` is still set here, with no fewer
    /// references
    pub fn keeps_fields_of(&self, previous: &Self) -> bool {
        fn kept<T>(now: Option<&T>, before: Option<&T>) -> bool {
            before.is_none() || now.is_some()
        }

        kept(self.ruling.as_ref(), previous.ruling.as_ref())
            && kept(self.explanation.as_ref(), previous.explanation.as_ref())
            && kept(
                self.clarifying_question.as_ref(),
                previous.clarifying_question.as_ref(),
            )
            && self.references.as_ref().map_or(0, Vec::len)
                >= previous.references.as_ref().map_or(0, Vec::len)
            && kept(self.references.as_ref(), previous.references.as_ref())
    }

    /// Check whether this snapshot would pass as a finished ruling
    pub fn validate(&self) -> Result<RulingResult, SchemaViolation> {
        RulingResult::try_from(self.clone())
    }
}

/// A finished concrete ruling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub ruling: Ruling,
    pub explanation: String,
    pub references: Vec<String>,
}

/// A validated, terminal ruling result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulingResult {
    Concluded(Verdict),
    NeedsClarification { question: String },
}

impl RulingResult {
    pub fn ruling(&self) -> Ruling {
        match self {
            RulingResult::Concluded(verdict) => verdict.ruling,
            RulingResult::NeedsClarification { .. } => Ruling::NeedsClarification,
        }
    }
}

/// The model produced a terminal object that breaks the ruling invariant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SchemaViolation(pub String);

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl TryFrom<PartialRulingResult> for RulingResult {
    type Error = SchemaViolation;

    fn try_from(partial: PartialRulingResult) -> Result<Self, Self::Error> {
        if !partial.references_within_bounds() {
            return Err(SchemaViolation(format!(
                "references must have at most {MAX_REFERENCES} entries of at most {MAX_REFERENCE_CHARS} characters"
            )));
        }

        let ruling = partial
            .ruling
            .ok_or_else(|| SchemaViolation("ruling is missing".to_string()))?;
        let explanation = non_blank(partial.explanation);
        let question = non_blank(partial.clarifying_question);
        let references: Vec<String> = partial
            .references
            .unwrap_or_default()
            .into_iter()
            .filter(|r| !r.trim().is_empty())
            .collect();

        if ruling == Ruling::NeedsClarification {
            if explanation.is_some() || !references.is_empty() {
                return Err(SchemaViolation(
                    "a clarification request must not carry an explanation or references".to_string(),
                ));
            }
            let question = question.ok_or_else(|| {
                SchemaViolation("clarifyingQuestion is required for NEEDS_CLARIFICATION".to_string())
            })?;
            Ok(RulingResult::NeedsClarification { question })
        } else {
            if question.is_some() {
                return Err(SchemaViolation(format!(
                    "clarifyingQuestion must be empty for {}",
                    ruling.as_str()
                )));
            }
            let explanation = explanation.ok_or_else(|| {
                SchemaViolation(format!("explanation is required for {}", ruling.as_str()))
            })?;
            Ok(RulingResult::Concluded(Verdict {
                ruling,
                explanation,
                references,
            }))
        }
    }
}

impl From<&RulingResult> for PartialRulingResult {
    fn from(result: &RulingResult) -> Self {
        match result {
            RulingResult::Concluded(verdict) => PartialRulingResult {
                ruling: Some(verdict.ruling),
                explanation: Some(verdict.explanation.clone()),
                references: Some(verdict.references.clone()),
                clarifying_question: None,
            },
            RulingResult::NeedsClarification { question } => PartialRulingResult {
                ruling: Some(Ruling::NeedsClarification),
                explanation: None,
                references: None,
                clarifying_question: Some(question.clone()),
            },
        }
    }
}

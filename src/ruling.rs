//! Halal/haram rulings
//!
//! Request and result types, the prompt sent to the model, and the service
//! that relays cumulative ruling snapshots from the model gateway.

pub mod prompt;
mod service;
mod types;

pub use service::{
    build_object_request, RulingError, RulingService, RulingStream, GENERIC_FAILURE_MESSAGE,
    RULING_TEMPERATURE,
};
pub use types::{
    PartialRulingResult, Role, Ruling, RulingRequest, RulingResult, SchemaViolation, Turn,
    Verdict, MAX_REFERENCES, MAX_REFERENCE_CHARS,
};

//! Halal Check - streaming halal/haram rulings from a hosted language model
//!
//! The server relays a ruling as cumulative JSON snapshots over SSE; the
//! client keeps the conversation state, including the one-question
//! clarification detour and follow-ups.

pub mod api;
pub mod client;
pub mod llm;
pub mod ruling;
pub mod sse;

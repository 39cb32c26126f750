//! HTTP API
//!
//! `POST /api/ruling` streams a ruling as Server-Sent Events; every `partial`
//! event holds the whole ruling so far.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
pub use types::*;

use crate::llm::ModelRegistry;
use crate::ruling::RulingService;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Ruling service on the default model; `None` when no model is configured
    pub ruling: Option<RulingService>,
    pub llm_registry: Arc<ModelRegistry>,
}

impl AppState {
    pub fn new(llm_registry: Arc<ModelRegistry>) -> Self {
        Self {
            ruling: llm_registry.default().map(RulingService::new),
            llm_registry,
        }
    }
}

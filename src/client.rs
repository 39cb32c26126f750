//! Conversation client
//!
//! Implements the Elm Architecture pattern with pure state transitions; a
//! [`Session`] executes the resulting effects against a transport.

mod effect;
pub mod event;
mod http;
mod session;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use http::{HttpTransport, DEFAULT_SERVER_URL};
pub use session::{ClientError, PartialStream, RulingTransport, Session};
pub use state::{ConvState, Conversation, ConversationView, RequestId, Round, Submission};
pub use transition::{transition, TransitionError, TransitionResult};

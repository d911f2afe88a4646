//! Per-session conversational client.
//!
//! Turns user utterances into gateway calls and keeps the transcript. Every
//! accepted send ends with at least one bot-authored message; gateway
//! failures are rendered in-band rather than returned.

pub mod client;
pub mod error;
pub mod types;

pub use client::ConversationalSessionClient;
pub use error::ChatError;
pub use types::{Author, ChatMessage, ConversationSession, Exchange, SessionState};

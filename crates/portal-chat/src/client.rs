//! Session client: send guard, debounce and in-band fallback.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use portal_core::config::ChatConfig;
use portal_gateway::{ConverseRequest, ServiceGateway, AGENT_FALLBACK_MESSAGE};

use crate::error::ChatError;
use crate::types::{ChatMessage, ConversationSession, Exchange, SessionState};

/// Clears the in-flight flag when a send finishes or is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ConversationalSessionClient {
    gateway: Arc<ServiceGateway>,
    config: ChatConfig,
    session: ConversationSession,
    transcript: Mutex<Vec<ChatMessage>>,
    in_flight: AtomicBool,
    last_failed: AtomicBool,
    generation: AtomicU64,
}

impl ConversationalSessionClient {
    /// Start a new session.
    pub fn new(gateway: Arc<ServiceGateway>, config: ChatConfig) -> Self {
        let session = ConversationSession::new();
        tracing::debug!(session_id = %session.session_id, "Chat session started");
        Self {
            gateway,
            config,
            session,
            transcript: Mutex::new(Vec::new()),
            in_flight: AtomicBool::new(false),
            last_failed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        if self.in_flight.load(Ordering::Acquire) {
            SessionState::Sending
        } else if self.last_failed.load(Ordering::Acquire) {
            SessionState::IdleWithError
        } else {
            SessionState::Idle
        }
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn append(&self, message: ChatMessage) {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    /// Debounced send: waits out the debounce window and sends only if no
    /// newer submission arrived meanwhile.
    pub async fn submit(&self, text: &str) -> Result<Exchange, ChatError> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tokio::time::sleep(Duration::from_millis(self.config.debounce_ms)).await;
        if self.generation.load(Ordering::Acquire) != generation {
            tracing::debug!(generation, "Submission superseded");
            return Err(ChatError::Superseded);
        }
        self.send_message(text).await
    }

    /// Send one utterance immediately.
    ///
    /// Ignored when `text` is blank or another send is in flight. Otherwise
    /// the user message is appended before the gateway call, followed by
    /// each non-empty reply in order, or by exactly one fallback message.
    pub async fn send_message(&self, text: &str) -> Result<Exchange, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(session_id = %self.session.session_id, "Send ignored, already in flight");
            return Err(ChatError::SendInFlight);
        }
        let _guard = InFlight(&self.in_flight);

        let user = ChatMessage::user(text);
        self.append(user.clone());

        let request = ConverseRequest::new(
            &self.config.bot_id,
            &self.config.bot_alias,
            &self.config.locale,
            self.session.session_id.to_string(),
            text,
        );

        let (replies, fell_back) = match self.gateway.converse(&request).await {
            Ok(reply) => {
                let replies: Vec<ChatMessage> = reply
                    .messages
                    .iter()
                    .filter(|m| !m.trim().is_empty())
                    .map(ChatMessage::bot)
                    .collect();
                if replies.is_empty() {
                    (vec![ChatMessage::bot(AGENT_FALLBACK_MESSAGE)], true)
                } else {
                    (replies, false)
                }
            }
            Err(failure) => {
                tracing::debug!(error = %failure.error, "Rendering conversational fallback");
                (vec![ChatMessage::bot(failure.fallback_message())], true)
            }
        };

        for reply in &replies {
            self.append(reply.clone());
        }
        self.last_failed.store(fell_back, Ordering::Release);

        Ok(Exchange {
            user,
            replies,
            fell_back,
        })
    }
}

//! Request and response types for the gateway facades.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use portal_core::ServiceError;

/// Longest expiry a signed URL may carry (seven days).
pub const MAX_SIGNED_URL_EXPIRY_SECS: u64 = 604_800;

/// Reply shown when the conversational agent cannot be reached.
pub const AGENT_FALLBACK_MESSAGE: &str =
    "I'm having trouble understanding right now. Please try again in a moment.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverseRequest {
    pub bot_id: String,
    pub bot_alias: String,
    pub locale: String,
    pub session_id: String,
    pub utterance: String,
}

impl ConverseRequest {
    pub fn new(
        bot_id: impl Into<String>,
        bot_alias: impl Into<String>,
        locale: impl Into<String>,
        session_id: impl Into<String>,
        utterance: impl Into<String>,
    ) -> Self {
        Self {
            bot_id: bot_id.into(),
            bot_alias: bot_alias.into(),
            locale: locale.into(),
            session_id: session_id.into(),
            utterance: utterance.into(),
        }
    }
}

/// Where a conversational reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOrigin {
    Backend,
    Cache,
    Mock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverseReply {
    pub messages: Vec<String>,
    pub session_id: String,
    pub intent: Option<String>,
    pub dialog_state: Option<String>,
    pub origin: ReplyOrigin,
}

impl ConverseReply {
    /// True when no message carries visible text.
    pub fn is_empty(&self) -> bool {
        self.messages.iter().all(|m| m.trim().is_empty())
    }
}

/// Failure payload for `converse`: the error plus exactly one fallback
/// message the caller can render as a bot utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverseFailure {
    pub error: ServiceError,
    pub messages: Vec<String>,
}

impl ConverseFailure {
    pub fn new(error: ServiceError) -> Self {
        Self {
            error,
            messages: vec![AGENT_FALLBACK_MESSAGE.to_string()],
        }
    }

    pub fn fallback_message(&self) -> &str {
        self.messages
            .first()
            .map(String::as_str)
            .unwrap_or(AGENT_FALLBACK_MESSAGE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutObjectOutput {
    pub bucket: String,
    pub key: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl SignedUrl {
    /// The instant `expiry_secs` from now, or `None` if it is not representable.
    pub fn deadline(expiry_secs: u64) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(expiry_secs).ok()?;
        Utc::now().checked_add_signed(TimeDelta::try_seconds(secs)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub text: String,
    pub source_locale: String,
    pub target_locale: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::ServiceKind;

    #[test]
    fn test_reply_is_empty_ignores_whitespace() {
        let reply = ConverseReply {
            messages: vec!["  ".into(), String::new()],
            session_id: "s".into(),
            intent: None,
            dialog_state: None,
            origin: ReplyOrigin::Backend,
        };
        assert!(reply.is_empty());
    }

    #[test]
    fn test_deadline_rejects_unrepresentable_expiry() {
        let hour = SignedUrl::deadline(3600).unwrap();
        assert!(hour > Utc::now());
        assert!(SignedUrl::deadline(u64::MAX).is_none());
        assert!(SignedUrl::deadline(10_000_000_000_000).is_none());
    }

    #[test]
    fn test_failure_carries_single_fallback() {
        let failure = ConverseFailure::new(ServiceError::unavailable(
            ServiceKind::ConversationalAgent,
            "503",
        ));
        assert_eq!(failure.messages.len(), 1);
        assert_eq!(failure.fallback_message(), AGENT_FALLBACK_MESSAGE);
    }
}

//! Canned replies used when the gateway runs without credentials outside
//! production.
//!
//! Matching runs a fixed, ordered table of case-insensitive patterns; the
//! first row whose pattern matches the utterance wins. Keywords are anchored
//! at a word start, and short greetings must be a whole word. Output depends
//! only on the utterance, never on the session.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{ConverseReply, ReplyOrigin};

/// Reply used when no keyword matches.
pub const GENERIC_REPLY: &str =
    "Thanks for your message. I can help with policies, claims, treaties and document uploads. What would you like to know?";

const REPLY_TABLE: &[(&str, &str)] = &[
    (
        r"(?i)\bpolic(?:y|ies)",
        "I can help with policy questions. You can review active policies from the Policies page, or tell me the policy number you are interested in.",
    ),
    (
        r"(?i)\bclaim",
        "To file or track a claim, open the Claims section. Most claims are acknowledged within two business days.",
    ),
    (
        r"(?i)\btreat(?:y|ies)",
        "Treaty details, including layers and participating reinsurers, are listed under Treaties. Would you like a summary of a specific treaty?",
    ),
    (
        r"(?i)\bpremium",
        "Premium statements are issued monthly. You can download the latest statement from the Finance dashboard.",
    ),
    (
        r"(?i)\breinsurer",
        "The reinsurer directory lists each market's rating and capacity. Which reinsurer are you looking for?",
    ),
    (
        r"(?i)\b(?:upload|document)",
        "You can upload PDF, image and Office documents up to 10 MB from the Documents page.",
    ),
    (
        r"(?i)\b(?:hello|hi)\b",
        "Hello! I'm the reinsurance assistant. How can I help you today?",
    ),
    (
        r"(?i)\bhelp",
        "I can answer questions about policies, claims, treaties, premiums and documents. Just ask.",
    ),
];

static REPLY_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    REPLY_TABLE
        .iter()
        .map(|(pattern, reply)| (Regex::new(pattern).expect("Invalid reply regex"), *reply))
        .collect()
});

/// The canned reply text for `utterance`.
pub fn reply_text(utterance: &str) -> &'static str {
    REPLY_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(utterance))
        .map(|(_, reply)| *reply)
        .unwrap_or(GENERIC_REPLY)
}

/// Build a mock conversational reply for `utterance` on `session_id`.
pub fn converse_reply(session_id: &str, utterance: &str) -> ConverseReply {
    ConverseReply {
        messages: vec![reply_text(utterance).to_string()],
        session_id: session_id.to_string(),
        intent: None,
        dialog_state: Some("Fulfilled".to_string()),
        origin: ReplyOrigin::Mock,
    }
}

/// Placeholder object URL returned by the storage facade in mock mode.
pub fn object_url(bucket: &str, key: &str) -> String {
    format!("mock://{}/{}", bucket, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        assert_eq!(reply_text("What is my POLICY status?"), REPLY_TABLE[0].1);
        assert_eq!(reply_text("file a Claim"), REPLY_TABLE[1].1);
    }

    #[test]
    fn test_first_row_wins_on_multiple_matches() {
        // "claim" and "treaty" both appear; claim comes first in the table.
        assert_eq!(reply_text("treaty claim"), REPLY_TABLE[1].1);
    }

    #[test]
    fn test_greeting_must_be_a_whole_word() {
        let greeting = REPLY_TABLE[6].1;
        assert_eq!(reply_text("hi"), greeting);
        assert_eq!(reply_text("Hi, anyone there?"), greeting);
        assert_eq!(reply_text("Can you ship this?"), GENERIC_REPLY);
        assert_eq!(reply_text("which one is nothing"), GENERIC_REPLY);
    }

    #[test]
    fn test_plural_keywords_match() {
        assert_eq!(reply_text("list my claims"), REPLY_TABLE[1].1);
        assert_eq!(reply_text("show all treaties"), REPLY_TABLE[2].1);
    }

    #[test]
    fn test_no_match_returns_generic() {
        assert_eq!(reply_text("what's the weather"), GENERIC_REPLY);
        assert_eq!(reply_text(""), GENERIC_REPLY);
    }

    #[test]
    fn test_reply_ignores_session() {
        let a = converse_reply("session-a", "upload a document");
        let b = converse_reply("session-b", "upload a document");
        assert_eq!(a.messages, b.messages);
        assert_eq!(a.origin, ReplyOrigin::Mock);
        assert_eq!(b.session_id, "session-b");
    }
}

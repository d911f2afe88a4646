//! Reasons a send is ignored.

/// A send that was not dispatched. The transcript is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("a message is already being sent")]
    SendInFlight,
    #[error("superseded by a newer submission")]
    Superseded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::SendInFlight.to_string(),
            "a message is already being sent"
        );
        assert_eq!(
            ChatError::Superseded.to_string(),
            "superseded by a newer submission"
        );
    }
}

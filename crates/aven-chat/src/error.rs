//! Error types for the chat session.

use aven_core::error::AvenError;

/// Errors from the chat session and its voice channel.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("voice unavailable: {0}")]
    VoiceUnavailable(String),
    #[error("voice provider error: {0}")]
    VoiceProvider(String),
    #[error("speech recognition error: {0}")]
    Recognizer(String),
    #[error("session is closed")]
    SessionClosed,
}

impl From<ChatError> for AvenError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::VoiceUnavailable(_)
            | ChatError::VoiceProvider(_)
            | ChatError::Recognizer(_) => AvenError::Voice(err.to_string()),
            _ => AvenError::Chat(err.to_string()),
        }
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one open widget session.
pub type SessionId = Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Who produced a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Assistant,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::User => write!(f, "user"),
            Origin::Assistant => write!(f, "assistant"),
        }
    }
}

/// Presentation state of the assistant avatar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Microphone capture requested.
    Listening,
    /// A reply is being produced.
    Thinking,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Idle => write!(f, "idle"),
            AgentState::Listening => write!(f, "listening"),
            AgentState::Thinking => write!(f, "thinking"),
        }
    }
}

/// Which path last produced assistant output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveChannel {
    #[default]
    None,
    Voice,
    Text,
}

// =============================================================================
// Message
// =============================================================================

/// Timeline message identifier.
///
/// Derived from the creation time in milliseconds and strictly increasing
/// within one timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the conversation timeline. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_user(&self) -> bool {
        self.origin == Origin::User
    }

    pub fn is_assistant(&self) -> bool {
        self.origin == Origin::Assistant
    }

    /// Display time in `HH:MM` form.
    pub fn display_time(&self) -> String {
        self.created_at.format("%H:%M").to_string()
    }
}

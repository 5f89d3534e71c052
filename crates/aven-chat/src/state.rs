//! Session state and avatar state derivation.

use aven_core::types::{ActiveChannel, AgentState};

/// Map the two in-flight flags to the avatar state.
///
/// Listening wins over thinking.
pub fn derive_state(listening: bool, thinking: bool) -> AgentState {
    if listening {
        AgentState::Listening
    } else if thinking {
        AgentState::Thinking
    } else {
        AgentState::Idle
    }
}

/// Mutable state of one open widget. Owned by the session orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Which path last produced assistant output.
    pub active_channel: ActiveChannel,
    /// Microphone capture requested.
    pub listening: bool,
    /// A reply is in flight.
    pub thinking: bool,
    /// Spoken playback requested for local replies.
    pub audio_enabled: bool,
    /// Dismissable runtime error banner.
    pub error: Option<String>,
}

impl SessionState {
    pub fn new(audio_enabled: bool) -> Self {
        Self {
            active_channel: ActiveChannel::None,
            listening: false,
            thinking: false,
            audio_enabled,
            error: None,
        }
    }

    pub fn agent_state(&self) -> AgentState {
        derive_state(self.listening, self.thinking)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(true)
    }
}

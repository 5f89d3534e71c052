use serde::{Deserialize, Serialize};

use crate::types::{AgentState, Message, SessionId};

/// Lifecycle of the voice channel as seen by the presentation layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceStatus {
    /// The provider has not been constructed yet.
    #[default]
    Uninitialized,
    /// Provider constructed, no call running.
    Ready,
    /// A call start was requested and has not been confirmed.
    Starting,
    /// A live call is running.
    Active,
    /// The last call ended. A new one may be started.
    Ended,
    /// The provider failed to initialize. Only the fallback recognizer is usable.
    Unavailable,
}

impl VoiceStatus {
    /// Whether a start request should be ignored in this phase.
    pub fn is_starting_or_active(&self) -> bool {
        matches!(self, VoiceStatus::Starting | VoiceStatus::Active)
    }
}

/// Events published by a session to its presentation subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A session was created (widget opened).
    SessionOpened { session_id: SessionId },

    /// A message was appended to the timeline.
    MessageAppended { message: Message },

    /// The derived avatar state changed.
    AgentStateChanged { state: AgentState },

    /// The voice channel moved to a new phase.
    VoiceStatusChanged { status: VoiceStatus },

    /// Spoken playback of a locally produced reply is requested.
    SpeakRequested { text: String },

    /// A transient, dismissable error banner should be shown.
    ErrorRaised { message: String },

    /// The error banner was dismissed.
    ErrorDismissed,

    /// The audio playback toggle changed.
    AudioToggled { enabled: bool },

    /// The session ended (widget closed).
    SessionClosed { session_id: SessionId },
}

//! Conversational session manager for the AVEN assistant widget.
//!
//! Unifies typed text and live voice into one ordered timeline, augments
//! replies with knowledge retrieval, and derives the avatar state from the
//! two input sources.

pub mod error;
pub mod orchestrator;
pub mod state;
pub mod synthesizer;
pub mod timeline;
pub mod voice;
pub mod widget;

pub use error::ChatError;
pub use orchestrator::{Route, SessionCommand, SessionOrchestrator};
pub use state::{derive_state, SessionState};
pub use synthesizer::{ResponseSynthesizer, Topic, APOLOGY_REPLY};
pub use timeline::Timeline;
pub use voice::{
    AdapterSignal, AdapterSignals, ConversationEntry, ProviderEvent, ProviderEventSink,
    ProviderMessage, RecognizerEvent, RecognizerSink, SpeechRecognizer, TranscriptSource,
    VoiceChannelAdapter, VoiceConnector, VoiceEvent, VoiceProvider,
};
pub use widget::{SessionFactory, SessionHandle, Widget};

//! Voice channel adapter.
//!
//! Wraps the hosted voice provider and the local fallback recognizer behind
//! traits, tracks the call lifecycle, and translates their raw events into
//! `VoiceEvent`s for the session orchestrator.
//!
//! Lifecycle:
//! - Uninitialized -> Ready (provider constructed)
//! - Uninitialized -> Unavailable (provider failed; fallback recognizer only)
//! - Ready | Ended -> Starting (call requested)
//! - Starting -> Active (call-start received)
//! - Starting -> Ready (start failed)
//! - Starting | Active -> Ended (call-end received or session ended)
//!
//! The fallback recognizer has its own independent active flag.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use aven_core::events::VoiceStatus;

use crate::error::ChatError;

// =============================================================================
// Collaborator boundaries
// =============================================================================

/// One entry of the provider's conversation transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationEntry {
    pub role: String,
    pub content: String,
}

/// Payload of the provider's generic message event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderMessage {
    /// Recognized user speech.
    Transcript { text: String, is_final: bool },
    /// The provider's view of the whole conversation.
    ConversationUpdate { conversation: Vec<ConversationEntry> },
    /// Result of a function the assistant called.
    FunctionCallResult { result: String },
    /// Text the assistant is speaking.
    Speech { text: String },
}

/// Inbound event from the hosted voice provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    CallStart,
    CallEnd,
    SpeechStart,
    SpeechEnd,
    Message(ProviderMessage),
    Error(String),
}

/// Inbound event from the fallback recognizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerEvent {
    Transcript(String),
    Error(String),
    Ended,
}

/// Everything that can arrive on the adapter's signal channel.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterSignal {
    Provider(ProviderEvent),
    Recognizer(RecognizerEvent),
    StartFailed(String),
    SendFailed { turn: u64, error: String },
}

/// Receiving half of the adapter's signal channel.
pub type AdapterSignals = mpsc::UnboundedReceiver<AdapterSignal>;

/// Handle given to the provider for reporting its events.
#[derive(Debug, Clone)]
pub struct ProviderEventSink(mpsc::UnboundedSender<AdapterSignal>);

impl ProviderEventSink {
    /// Returns `false` if the session is gone.
    pub fn emit(&self, event: ProviderEvent) -> bool {
        self.0.send(AdapterSignal::Provider(event)).is_ok()
    }
}

/// Handle given to the fallback recognizer for reporting its events.
#[derive(Debug, Clone)]
pub struct RecognizerSink(mpsc::UnboundedSender<AdapterSignal>);

impl RecognizerSink {
    /// Returns `false` if the session is gone.
    pub fn emit(&self, event: RecognizerEvent) -> bool {
        self.0.send(AdapterSignal::Recognizer(event)).is_ok()
    }
}

/// A constructed hosted voice session.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Begin a live call with the given assistant.
    async fn start(&self, assistant_id: &str) -> Result<(), ChatError>;
    /// End the live call.
    async fn stop(&self) -> Result<(), ChatError>;
    /// Inject a user turn into the live call.
    async fn send_user_message(&self, text: &str) -> Result<(), ChatError>;
}

/// Constructs the hosted voice provider.
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(&self, events: ProviderEventSink)
        -> Result<Arc<dyn VoiceProvider>, ChatError>;
}

/// Local single-shot speech recognizer.
///
/// Each activation reports exactly one transcript or error, then `Ended`.
pub trait SpeechRecognizer: Send + Sync {
    fn start(&self, events: RecognizerSink) -> Result<(), ChatError>;
    fn stop(&self);
}

// =============================================================================
// Upward events
// =============================================================================

/// Where a user transcript came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptSource {
    /// Recognized by the hosted provider during a live call.
    Provider,
    /// Recognized by the local fallback recognizer.
    Fallback,
}

/// Event surface the adapter reports to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    StatusChanged(VoiceStatus),
    Transcript {
        text: String,
        source: TranscriptSource,
    },
    AssistantText(String),
    Error(String),
    /// The fallback recognizer stopped without a transcript.
    FallbackStopped { error: Option<String> },
    /// The user turn `turn` could not be injected into the live call.
    SendFailed { turn: u64 },
}

// =============================================================================
// VoiceChannelAdapter
// =============================================================================

pub struct VoiceChannelAdapter {
    assistant_id: String,
    connector: Option<Arc<dyn VoiceConnector>>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    provider: Option<Arc<dyn VoiceProvider>>,
    status: VoiceStatus,
    fallback_active: bool,
    init_error: Option<String>,
    signals: mpsc::UnboundedSender<AdapterSignal>,
}

impl std::fmt::Debug for VoiceChannelAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceChannelAdapter")
            .field("assistant_id", &self.assistant_id)
            .field("status", &self.status)
            .field("fallback_active", &self.fallback_active)
            .field("has_provider", &self.provider.is_some())
            .field("has_recognizer", &self.recognizer.is_some())
            .field("init_error", &self.init_error)
            .finish()
    }
}

impl VoiceChannelAdapter {
    /// Create an adapter and the receiver for its signals.
    pub fn new(
        assistant_id: impl Into<String>,
        connector: Option<Arc<dyn VoiceConnector>>,
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
    ) -> (Self, AdapterSignals) {
        let (signals, rx) = mpsc::unbounded_channel();
        let adapter = Self {
            assistant_id: assistant_id.into(),
            connector,
            recognizer,
            provider: None,
            status: VoiceStatus::Uninitialized,
            fallback_active: false,
            init_error: None,
            signals,
        };
        (adapter, rx)
    }

    pub fn status(&self) -> VoiceStatus {
        self.status
    }

    /// Whether a live call is running.
    pub fn is_session_active(&self) -> bool {
        self.status == VoiceStatus::Active
    }

    /// Whether the hosted provider was constructed.
    pub fn is_provider_available(&self) -> bool {
        self.provider.is_some()
    }

    pub fn has_fallback(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn is_fallback_active(&self) -> bool {
        self.fallback_active
    }

    /// Why the provider failed to initialize, if it did.
    pub fn init_error(&self) -> Option<&str> {
        self.init_error.as_deref()
    }

    /// Construct the hosted provider.
    ///
    /// Never fails: a connection failure leaves only the fallback
    /// recognizer available and is recorded in `init_error`.
    pub async fn initialize(&mut self) -> VoiceStatus {
        if self.status != VoiceStatus::Uninitialized {
            return self.status;
        }

        let Some(connector) = self.connector.clone() else {
            self.mark_unavailable("no voice provider configured".to_string());
            return self.status;
        };

        match connector
            .connect(ProviderEventSink(self.signals.clone()))
            .await
        {
            Ok(provider) => {
                self.provider = Some(provider);
                self.status = VoiceStatus::Ready;
                tracing::info!("Voice provider initialized");
            }
            Err(e) => self.mark_unavailable(e.to_string()),
        }
        self.status
    }

    fn mark_unavailable(&mut self, reason: String) {
        tracing::warn!(reason = %reason, "Voice provider unavailable, using fallback recognizer");
        self.status = VoiceStatus::Unavailable;
        self.init_error = Some(reason);
    }

    /// Request a live call.
    ///
    /// Idempotent: returns `Ok(false)` without contacting the provider when a
    /// call is already starting or running.
    pub fn start_session(&mut self) -> Result<bool, ChatError> {
        if self.status.is_starting_or_active() {
            tracing::debug!(status = ?self.status, "Voice session already requested");
            return Ok(false);
        }
        let provider = match (&self.provider, self.status) {
            (Some(provider), VoiceStatus::Ready | VoiceStatus::Ended) => Arc::clone(provider),
            _ => {
                return Err(ChatError::VoiceUnavailable(
                    self.init_error
                        .clone()
                        .unwrap_or_else(|| "voice provider not initialized".to_string()),
                ))
            }
        };

        self.status = VoiceStatus::Starting;
        let assistant_id = self.assistant_id.clone();
        let signals = self.signals.clone();
        tokio::spawn(async move {
            if let Err(e) = provider.start(&assistant_id).await {
                let _ = signals.send(AdapterSignal::StartFailed(e.to_string()));
            }
        });
        tracing::info!("Voice session start requested");
        Ok(true)
    }

    /// Inject user turn `turn` into the live call.
    ///
    /// Delivery failures come back as `VoiceEvent::SendFailed` for that turn.
    pub fn send_text(&self, turn: u64, text: &str) -> Result<(), ChatError> {
        let provider = self
            .provider
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| ChatError::VoiceUnavailable("voice provider not initialized".to_string()))?;

        let text = text.to_string();
        let signals = self.signals.clone();
        tokio::spawn(async move {
            if let Err(e) = provider.send_user_message(&text).await {
                let _ = signals.send(AdapterSignal::SendFailed {
                    turn,
                    error: e.to_string(),
                });
            }
        });
        Ok(())
    }

    /// End the live call, if any.
    pub async fn end_session(&mut self) {
        if !self.status.is_starting_or_active() {
            return;
        }
        if let Some(provider) = &self.provider {
            if let Err(e) = provider.stop().await {
                tracing::warn!(error = %e, "Failed to stop voice session");
            }
        }
        self.status = VoiceStatus::Ended;
        tracing::info!("Voice session ended");
    }

    /// Start one activation of the fallback recognizer.
    pub fn start_fallback(&mut self) -> Result<(), ChatError> {
        let recognizer = self.recognizer.as_ref().ok_or_else(|| {
            ChatError::VoiceUnavailable("speech recognition is not supported".to_string())
        })?;
        if self.fallback_active {
            return Ok(());
        }
        recognizer.start(RecognizerSink(self.signals.clone()))?;
        self.fallback_active = true;
        tracing::debug!("Fallback recognizer started");
        Ok(())
    }

    /// Stop the fallback recognizer. Never touches a live call.
    pub fn stop_fallback(&mut self) {
        if !self.fallback_active {
            return;
        }
        if let Some(recognizer) = &self.recognizer {
            recognizer.stop();
        }
        self.fallback_active = false;
        tracing::debug!("Fallback recognizer stopped");
    }

    /// Apply a signal to the adapter state and translate it for the orchestrator.
    pub fn handle_signal(&mut self, signal: AdapterSignal) -> Vec<VoiceEvent> {
        match signal {
            AdapterSignal::Provider(event) => self.handle_provider_event(event),
            AdapterSignal::Recognizer(event) => self.handle_recognizer_event(event),
            AdapterSignal::StartFailed(error) => {
                tracing::warn!(error = %error, "Voice session failed to start");
                let mut events = Vec::new();
                if self.status == VoiceStatus::Starting {
                    self.status = VoiceStatus::Ready;
                    events.push(VoiceEvent::StatusChanged(self.status));
                }
                events.push(VoiceEvent::Error(format!("Failed to start voice call: {}", error)));
                events
            }
            AdapterSignal::SendFailed { turn, error } => {
                tracing::warn!(turn, error = %error, "Failed to send text to voice session");
                vec![VoiceEvent::SendFailed { turn }]
            }
        }
    }

    fn handle_provider_event(&mut self, event: ProviderEvent) -> Vec<VoiceEvent> {
        match event {
            ProviderEvent::CallStart => {
                self.status = VoiceStatus::Active;
                tracing::info!("Voice call started");
                vec![VoiceEvent::StatusChanged(self.status)]
            }
            ProviderEvent::CallEnd => {
                self.status = VoiceStatus::Ended;
                tracing::info!("Voice call ended");
                vec![VoiceEvent::StatusChanged(self.status)]
            }
            ProviderEvent::SpeechStart => {
                tracing::debug!("User started speaking");
                vec![]
            }
            ProviderEvent::SpeechEnd => {
                tracing::debug!("User stopped speaking");
                vec![]
            }
            ProviderEvent::Error(message) => {
                tracing::warn!(error = %message, "Voice provider error");
                let message = if message.trim().is_empty() {
                    "Voice assistant error".to_string()
                } else {
                    message
                };
                vec![VoiceEvent::Error(message)]
            }
            ProviderEvent::Message(message) => translate_message(message).into_iter().collect(),
        }
    }

    fn handle_recognizer_event(&mut self, event: RecognizerEvent) -> Vec<VoiceEvent> {
        let was_active = std::mem::replace(&mut self.fallback_active, false);
        match event {
            RecognizerEvent::Transcript(text) if !text.trim().is_empty() => {
                vec![VoiceEvent::Transcript {
                    text,
                    source: TranscriptSource::Fallback,
                }]
            }
            RecognizerEvent::Transcript(_) | RecognizerEvent::Ended if was_active => {
                vec![VoiceEvent::FallbackStopped { error: None }]
            }
            RecognizerEvent::Transcript(_) | RecognizerEvent::Ended => vec![],
            RecognizerEvent::Error(error) => {
                tracing::warn!(error = %error, "Speech recognition error");
                vec![VoiceEvent::FallbackStopped {
                    error: Some(format!("Speech recognition error: {}", error)),
                }]
            }
        }
    }
}

fn translate_message(message: ProviderMessage) -> Option<VoiceEvent> {
    let non_blank = |s: String| (!s.trim().is_empty()).then_some(s);
    match message {
        ProviderMessage::Transcript { text, is_final } => {
            if !is_final {
                return None;
            }
            non_blank(text).map(|text| VoiceEvent::Transcript {
                text,
                source: TranscriptSource::Provider,
            })
        }
        ProviderMessage::ConversationUpdate { conversation } => conversation
            .into_iter()
            .last()
            .filter(|entry| entry.role == "assistant")
            .and_then(|entry| non_blank(entry.content))
            .map(VoiceEvent::AssistantText),
        ProviderMessage::FunctionCallResult { result } => {
            non_blank(result).map(VoiceEvent::AssistantText)
        }
        ProviderMessage::Speech { text } => non_blank(text).map(VoiceEvent::AssistantText),
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Widget shell: opens and closes sessions and talks to them over channels.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use aven_core::config::AvenConfig;
use aven_core::events::SessionEvent;
use aven_core::types::SessionId;
use aven_knowledge::KnowledgeClient;

use crate::error::ChatError;
use crate::orchestrator::{SessionCommand, SessionOrchestrator};
use crate::synthesizer::ResponseSynthesizer;
use crate::timeline::Timeline;
use crate::voice::{SpeechRecognizer, VoiceChannelAdapter, VoiceConnector};

const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Builds fully wired session orchestrators from configuration.
pub struct SessionFactory {
    config: AvenConfig,
    knowledge: Arc<dyn KnowledgeClient>,
    connector: Option<Arc<dyn VoiceConnector>>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
}

impl SessionFactory {
    pub fn new(config: AvenConfig, knowledge: Arc<dyn KnowledgeClient>) -> Self {
        Self {
            config,
            knowledge,
            connector: None,
            recognizer: None,
        }
    }

    pub fn with_voice_connector(mut self, connector: Arc<dyn VoiceConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn config(&self) -> &AvenConfig {
        &self.config
    }

    /// Build a fresh session. Voice credentials are checked here; a
    /// session with missing credentials gets the fallback recognizer only.
    pub fn build(&self) -> SessionOrchestrator {
        let connector = match (&self.connector, self.config.validate_voice()) {
            (Some(connector), Ok(())) => Some(Arc::clone(connector)),
            (Some(_), Err(e)) => {
                tracing::warn!(error = %e, "Voice provider disabled");
                None
            }
            (None, _) => None,
        };

        let (voice, signals) = VoiceChannelAdapter::new(
            self.config.voice.assistant_id.clone(),
            connector,
            self.recognizer.clone(),
        );
        let synthesizer = Arc::new(ResponseSynthesizer::new(
            Arc::clone(&self.knowledge),
            Duration::from_secs(self.config.knowledge.timeout_secs),
        ));
        SessionOrchestrator::new(self.config.widget.clone(), voice, signals, synthesizer)
    }
}

/// Handle to a running session task.
pub struct SessionHandle {
    session_id: SessionId,
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
    first_events: Option<broadcast::Receiver<SessionEvent>>,
    task: JoinHandle<Timeline>,
}

impl SessionHandle {
    /// Spawn `orchestrator` on the current runtime.
    pub fn spawn(orchestrator: SessionOrchestrator) -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let session_id = orchestrator.session_id();
        let events = orchestrator.event_sender();
        // Subscribed before the task starts so the greeting is never missed.
        let first_events = Some(events.subscribe());
        let task = tokio::spawn(orchestrator.run(rx));

        Self {
            session_id,
            commands,
            events,
            first_events,
            task,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Event stream. The first call sees every event since the session started.
    pub fn events(&mut self) -> broadcast::Receiver<SessionEvent> {
        self.first_events
            .take()
            .unwrap_or_else(|| self.events.subscribe())
    }

    pub async fn submit_text(&self, text: impl Into<String>) -> Result<(), ChatError> {
        self.send(SessionCommand::SubmitText(text.into())).await
    }

    pub async fn toggle_listening(&self) -> Result<(), ChatError> {
        self.send(SessionCommand::ToggleListening).await
    }

    pub async fn set_audio_enabled(&self, enabled: bool) -> Result<(), ChatError> {
        self.send(SessionCommand::SetAudioEnabled(enabled)).await
    }

    pub async fn dismiss_error(&self) -> Result<(), ChatError> {
        self.send(SessionCommand::DismissError).await
    }

    /// Close the session and return its final timeline.
    pub async fn close(self) -> Result<Timeline, ChatError> {
        // The task may already be gone.
        let _ = self.commands.send(SessionCommand::Close).await;
        let session_id = self.session_id;
        self.task.await.map_err(|e| {
            tracing::error!(session_id = %session_id, error = %e, "Session task failed");
            ChatError::SessionClosed
        })
    }

    async fn send(&self, command: SessionCommand) -> Result<(), ChatError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ChatError::SessionClosed)
    }
}

/// The floating chat widget: at most one session, created on open and
/// discarded on close.
pub struct Widget {
    factory: SessionFactory,
    session: Option<SessionHandle>,
    audio_enabled: bool,
}

impl Widget {
    pub fn new(factory: SessionFactory) -> Self {
        let audio_enabled = factory.config().widget.audio_enabled;
        Self {
            factory,
            session: None,
            audio_enabled,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    /// Open the widget. Opening an open widget returns the current session.
    pub fn open(&mut self) -> &mut SessionHandle {
        if self.session.is_none() {
            self.audio_enabled = self.factory.config().widget.audio_enabled;
        }
        let factory = &self.factory;
        self.session.get_or_insert_with(|| {
            let handle = SessionHandle::spawn(factory.build());
            tracing::debug!(session_id = %handle.session_id(), "Widget opened");
            handle
        })
    }

    /// Close the widget, discarding the session. Returns its final timeline.
    pub async fn close(&mut self) -> Option<Timeline> {
        let handle = self.session.take()?;
        handle.close().await.ok()
    }

    /// Flip between open and closed. Returns whether the widget is now open.
    pub async fn toggle_open(&mut self) -> bool {
        if self.is_open() {
            self.close().await;
            false
        } else {
            self.open();
            true
        }
    }

    /// Flip spoken playback. Returns the new value.
    pub async fn toggle_audio(&mut self) -> Result<bool, ChatError> {
        let enabled = !self.audio_enabled;
        if let Some(session) = &self.session {
            session.set_audio_enabled(enabled).await?;
        }
        self.audio_enabled = enabled;
        Ok(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use aven_core::types::Origin;
    use aven_knowledge::{RetrievalError, RetrievalResult};

    struct OfflineClient;

    #[async_trait]
    impl KnowledgeClient for OfflineClient {
        async fn query(&self, _text: &str) -> Result<RetrievalResult, RetrievalError> {
            Err(RetrievalError::Unavailable("offline".to_string()))
        }
    }

    fn widget() -> Widget {
        let mut config = AvenConfig::default();
        config.widget.auto_start = false;
        Widget::new(SessionFactory::new(config, Arc::new(OfflineClient)))
    }

    async fn wait_for_reply(events: &mut broadcast::Receiver<SessionEvent>) -> String {
        loop {
            if let SessionEvent::MessageAppended { message } = events.recv().await.unwrap() {
                if message.is_assistant() && message.text != AvenConfig::default().widget.greeting {
                    return message.text;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_open_publishes_greeting() {
        let mut widget = widget();
        assert!(!widget.is_open());
        let mut events = widget.open().events();

        assert!(matches!(events.recv().await.unwrap(), SessionEvent::SessionOpened { .. }));
        match events.recv().await.unwrap() {
            SessionEvent::MessageAppended { message } => {
                assert_eq!(message.origin, Origin::Assistant);
                assert!(message.text.starts_with("Hi There!"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        widget.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_twice_keeps_session() {
        let mut widget = widget();
        let first = widget.open().session_id();
        let second = widget.open().session_id();
        assert_eq!(first, second);
        widget.close().await;
    }

    #[tokio::test]
    async fn test_reopen_starts_fresh_session() {
        let mut widget = widget();
        let handle = widget.open();
        let first_id = handle.session_id();
        let mut events = handle.events();
        handle.submit_text("hello").await.unwrap();
        wait_for_reply(&mut events).await;

        let timeline = widget.close().await.unwrap();
        assert_eq!(timeline.len(), 3);
        assert!(!widget.is_open());

        let second_id = widget.open().session_id();
        assert_ne!(first_id, second_id);
        let timeline = widget.close().await.unwrap();
        assert_eq!(timeline.len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_audio_suppresses_speech() {
        let mut widget = widget();
        let mut events = widget.open().events();
        assert!(!widget.toggle_audio().await.unwrap());

        widget.session().unwrap().submit_text("rates?").await.unwrap();
        let mut toggled = false;
        loop {
            match events.recv().await.unwrap() {
                SessionEvent::AudioToggled { enabled } => {
                    assert!(!enabled);
                    toggled = true;
                }
                SessionEvent::SpeakRequested { .. } => panic!("audio is off"),
                SessionEvent::MessageAppended { message }
                    if message.is_assistant() && message.text.contains("6.5% APR") =>
                {
                    break
                }
                _ => {}
            }
        }
        assert!(toggled);
        widget.close().await;
    }

    #[tokio::test]
    async fn test_toggle_open() {
        let mut widget = widget();
        assert!(widget.toggle_open().await);
        assert!(widget.is_open());
        assert!(!widget.toggle_open().await);
        assert!(!widget.is_open());
    }

    #[tokio::test]
    async fn test_missing_credentials_disable_provider() {
        struct NeverConnector;

        #[async_trait]
        impl VoiceConnector for NeverConnector {
            async fn connect(
                &self,
                _events: crate::voice::ProviderEventSink,
            ) -> Result<Arc<dyn crate::voice::VoiceProvider>, ChatError> {
                panic!("connector must not be called without credentials");
            }
        }

        let factory = SessionFactory::new(AvenConfig::default(), Arc::new(OfflineClient))
            .with_voice_connector(Arc::new(NeverConnector));
        let mut orch = factory.build();
        orch.initialize().await;
        assert!(!orch.voice().is_provider_available());
    }

    #[tokio::test]
    async fn test_commands_after_close_fail() {
        let mut widget = widget();
        let handle = SessionHandle::spawn(widget.factory.build());
        let commands = handle.commands.clone();
        handle.close().await.unwrap();
        assert!(commands.send(SessionCommand::DismissError).await.is_err());
        assert!(widget.close().await.is_none());
    }
}

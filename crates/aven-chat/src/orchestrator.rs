//! Session orchestrator: owns one open widget's timeline and state.
//!
//! Every user turn gets exactly one reply producer. When a live voice call
//! is running the provider answers; otherwise the local synthesizer does.
//! All mutation happens on the task that drives `run` (or, in tests,
//! `process_next_event`). Network work runs in spawned tasks and reports
//! back over channels.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use aven_core::config::WidgetConfig;
use aven_core::events::{SessionEvent, VoiceStatus};
use aven_core::types::{ActiveChannel, AgentState, Origin, SessionId};

use crate::error::ChatError;
use crate::state::SessionState;
use crate::synthesizer::{ResponseSynthesizer, APOLOGY_REPLY};
use crate::timeline::Timeline;
use crate::voice::{AdapterSignal, AdapterSignals, TranscriptSource, VoiceChannelAdapter, VoiceEvent};

/// Capacity of the presentation event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Which producer answers the next user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// No live call: the local synthesizer replies.
    NoVoice,
    /// A live call is running: the voice provider replies.
    VoiceActive,
}

/// User actions delivered to a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SubmitText(String),
    ToggleListening,
    SetAudioEnabled(bool),
    DismissError,
    Close,
}

/// Results of spawned work, delivered back to the session task.
#[derive(Debug)]
enum Completion {
    Synthesized { turn: u64, reply: String },
    VoiceReplyTimedOut { turn: u64 },
}

pub struct SessionOrchestrator {
    session_id: SessionId,
    config: WidgetConfig,
    timeline: Timeline,
    state: SessionState,
    voice: VoiceChannelAdapter,
    signals: AdapterSignals,
    synthesizer: Arc<ResponseSynthesizer>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    events: broadcast::Sender<SessionEvent>,
    pending_synthesis: BTreeSet<u64>,
    /// Turns handed to the voice provider and not yet answered, by turn.
    awaiting_voice: BTreeMap<u64, String>,
    next_turn: u64,
    published_state: AgentState,
    initialized: bool,
}

impl SessionOrchestrator {
    pub fn new(
        config: WidgetConfig,
        voice: VoiceChannelAdapter,
        signals: AdapterSignals,
        synthesizer: Arc<ResponseSynthesizer>,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = SessionState::new(config.audio_enabled);

        Self {
            session_id: Uuid::new_v4(),
            config,
            timeline: Timeline::new(),
            state,
            voice,
            signals,
            synthesizer,
            completions_tx,
            completions_rx,
            events,
            pending_synthesis: BTreeSet::new(),
            awaiting_voice: BTreeMap::new(),
            next_turn: 0,
            published_state: AgentState::Idle,
            initialized: false,
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn agent_state(&self) -> AgentState {
        self.state.agent_state()
    }

    pub fn voice(&self) -> &VoiceChannelAdapter {
        &self.voice
    }

    /// Producer for the next user turn.
    pub fn route(&self) -> Route {
        if self.voice.is_session_active() {
            Route::VoiceActive
        } else {
            Route::NoVoice
        }
    }

    /// Subscribe to presentation events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Sender half of the presentation channel, for late subscribers.
    pub fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Announce the session, append the greeting and construct the voice provider.
    pub async fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        tracing::info!(session_id = %self.session_id, "Session opened");
        self.publish(SessionEvent::SessionOpened {
            session_id: self.session_id,
        });

        let greeting = self.config.greeting.clone();
        self.append(Origin::Assistant, &greeting);

        let status = self.voice.initialize().await;
        self.publish(SessionEvent::VoiceStatusChanged { status });
    }

    /// Try to warm up a live call. Failures are logged only.
    pub fn auto_start_voice(&mut self) {
        if !self.voice.is_provider_available() {
            return;
        }
        match self.voice.start_session() {
            Ok(true) => self.publish_voice_status(),
            Ok(false) => {}
            Err(e) => tracing::debug!(error = %e, "Voice auto-start skipped"),
        }
    }

    /// Explicitly request a live call.
    pub fn start_voice_session(&mut self) -> Result<bool, ChatError> {
        let started = self.voice.start_session()?;
        if started {
            self.publish_voice_status();
        }
        Ok(started)
    }

    /// End the live call and stop recognition.
    pub async fn close(&mut self) {
        self.voice.stop_fallback();
        self.voice.end_session().await;
        self.state.listening = false;
        tracing::info!(
            session_id = %self.session_id,
            messages = self.timeline.len(),
            "Session closed"
        );
        self.publish(SessionEvent::SessionClosed {
            session_id: self.session_id,
        });
    }

    /// Drive the session until `Close` arrives or every command sender is gone.
    ///
    /// Returns the final timeline.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) -> Timeline {
        self.initialize().await;

        let auto_start = tokio::time::sleep(Duration::from_millis(self.config.auto_start_delay_ms));
        tokio::pin!(auto_start);
        let mut auto_start_pending = self.config.auto_start;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Close) | None => break,
                    Some(command) => self.handle_command(command),
                },
                _ = &mut auto_start, if auto_start_pending => {
                    auto_start_pending = false;
                    self.auto_start_voice();
                }
                Some(signal) = self.signals.recv() => self.handle_signal(signal),
                Some(done) = self.completions_rx.recv() => self.handle_completion(done),
            }
        }

        self.close().await;
        self.timeline
    }

    /// Wait for one adapter signal or spawned-work completion and apply it.
    pub async fn process_next_event(&mut self) {
        tokio::select! {
            Some(signal) = self.signals.recv() => self.handle_signal(signal),
            Some(done) = self.completions_rx.recv() => self.handle_completion(done),
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        let result = match command {
            SessionCommand::SubmitText(text) => self.submit_text(&text),
            SessionCommand::ToggleListening => self.toggle_listening(),
            SessionCommand::SetAudioEnabled(enabled) => {
                self.set_audio_enabled(enabled);
                Ok(())
            }
            SessionCommand::DismissError => {
                self.dismiss_error();
                Ok(())
            }
            SessionCommand::Close => Ok(()),
        };
        if let Err(e) = result {
            tracing::debug!(session_id = %self.session_id, error = %e, "Command not applied");
        }
    }

    // -------------------------------------------------------------------------
    // User operations
    // -------------------------------------------------------------------------

    /// Append a typed user turn and dispatch it to exactly one producer.
    ///
    /// Blank input changes nothing and returns `EmptyMessage`.
    pub fn submit_text(&mut self, text: &str) -> Result<(), ChatError> {
        self.begin_turn(text, false)
    }

    /// Handle a final transcript from either recognizer.
    pub fn on_voice_transcript(&mut self, text: &str, source: TranscriptSource) {
        self.state.listening = false;
        let result = self.begin_turn(text, source == TranscriptSource::Provider);
        if result.is_err() {
            self.sync_agent_state();
        }
    }

    /// Handle an utterance produced by the voice provider.
    pub fn on_assistant_utterance(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let duplicate = self
            .timeline
            .last()
            .is_some_and(|last| last.is_assistant() && last.text == text);
        if duplicate {
            tracing::debug!("Skipping repeated assistant utterance");
        } else {
            self.append(Origin::Assistant, text);
            // Replies arrive in the order the turns were sent.
            if let Some((turn, _)) = self.awaiting_voice.pop_first() {
                tracing::debug!(turn, "Voice reply received");
            }
        }

        self.state.active_channel = ActiveChannel::Voice;
        self.refresh_thinking();
    }

    pub fn toggle_listening(&mut self) -> Result<(), ChatError> {
        if self.state.listening {
            self.state.listening = false;
            self.voice.stop_fallback();
            self.sync_agent_state();
            return Ok(());
        }

        let started = if self.voice.is_provider_available() {
            self.voice.start_session().map(|_| ())
        } else {
            self.voice.start_fallback()
        };

        match started {
            Ok(()) => {
                self.dismiss_error();
                self.publish_voice_status();
                self.state.listening = true;
                self.sync_agent_state();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not start listening");
                self.raise_error(e.to_string());
                Err(e)
            }
        }
    }

    pub fn set_audio_enabled(&mut self, enabled: bool) {
        if self.state.audio_enabled == enabled {
            return;
        }
        self.state.audio_enabled = enabled;
        self.publish(SessionEvent::AudioToggled { enabled });
    }

    pub fn dismiss_error(&mut self) {
        if self.state.error.take().is_some() {
            self.publish(SessionEvent::ErrorDismissed);
        }
    }

    // -------------------------------------------------------------------------
    // Turn dispatch
    // -------------------------------------------------------------------------

    fn begin_turn(&mut self, text: &str, heard_by_provider: bool) -> Result<(), ChatError> {
        let message = self
            .append(Origin::User, text)
            .ok_or(ChatError::EmptyMessage)?;
        let turn = self.next_turn;
        self.next_turn += 1;

        match self.route() {
            Route::VoiceActive if heard_by_provider => self.await_voice_reply(turn, message),
            Route::VoiceActive => match self.voice.send_text(turn, &message) {
                Ok(()) => self.await_voice_reply(turn, message),
                Err(e) => {
                    tracing::warn!(turn, error = %e, "Voice forward failed, replying locally");
                    self.spawn_synthesis(turn, message);
                }
            },
            Route::NoVoice => self.spawn_synthesis(turn, message),
        }

        self.refresh_thinking();
        Ok(())
    }

    fn await_voice_reply(&mut self, turn: u64, text: String) {
        tracing::debug!(turn, "Awaiting voice reply");
        self.awaiting_voice.insert(turn, text);

        let secs = self.config.voice_reply_timeout_secs;
        if secs == 0 {
            return;
        }
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            let _ = tx.send(Completion::VoiceReplyTimedOut { turn });
        });
    }

    /// Move one awaited voice turn to local synthesis.
    fn hand_off_voice_turn(&mut self, turn: u64) {
        if let Some(text) = self.awaiting_voice.remove(&turn) {
            tracing::info!(turn, "Voice turn not delivered, replying locally");
            self.spawn_synthesis(turn, text);
        }
    }

    /// Move every awaited voice turn to local synthesis.
    fn hand_off_all_voice_turns(&mut self) {
        for (turn, text) in std::mem::take(&mut self.awaiting_voice) {
            tracing::info!(turn, "Voice producer gone, replying locally");
            self.spawn_synthesis(turn, text);
        }
    }

    fn spawn_synthesis(&mut self, turn: u64, text: String) {
        tracing::debug!(turn, "Dispatching to local synthesis");
        self.pending_synthesis.insert(turn);

        let synthesizer = Arc::clone(&self.synthesizer);
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let worker = tokio::spawn(async move { synthesizer.synthesize(&text).await });
            let reply = match worker.await {
                Ok(reply) if !reply.trim().is_empty() => reply,
                Ok(_) => APOLOGY_REPLY.to_string(),
                Err(e) => {
                    tracing::error!(turn, error = %e, "Synthesis task failed");
                    APOLOGY_REPLY.to_string()
                }
            };
            let _ = tx.send(Completion::Synthesized { turn, reply });
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Synthesized { turn, reply } => {
                if !self.pending_synthesis.remove(&turn) {
                    return;
                }
                self.append(Origin::Assistant, &reply);
                self.state.active_channel = ActiveChannel::Text;
                if self.state.audio_enabled {
                    self.publish(SessionEvent::SpeakRequested { text: reply });
                }
                self.refresh_thinking();
            }
            Completion::VoiceReplyTimedOut { turn } => {
                if self.awaiting_voice.remove(&turn).is_some() {
                    tracing::warn!(turn, "Voice provider did not reply in time");
                    self.refresh_thinking();
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Voice signals
    // -------------------------------------------------------------------------

    /// Apply one adapter signal.
    pub fn handle_signal(&mut self, signal: AdapterSignal) {
        for event in self.voice.handle_signal(signal) {
            match event {
                VoiceEvent::StatusChanged(status) => {
                    self.publish(SessionEvent::VoiceStatusChanged { status });
                    if matches!(status, VoiceStatus::Ended | VoiceStatus::Ready) {
                        self.state.listening = self.voice.is_fallback_active();
                        self.hand_off_all_voice_turns();
                        self.refresh_thinking();
                    }
                }
                VoiceEvent::Transcript { text, source } => self.on_voice_transcript(&text, source),
                VoiceEvent::AssistantText(text) => self.on_assistant_utterance(&text),
                VoiceEvent::Error(message) => self.raise_error(message),
                VoiceEvent::FallbackStopped { error } => {
                    self.state.listening = false;
                    if let Some(message) = error {
                        self.raise_error(message);
                    }
                    self.sync_agent_state();
                }
                VoiceEvent::SendFailed { turn } => {
                    self.hand_off_voice_turn(turn);
                    self.refresh_thinking();
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn append(&mut self, origin: Origin, text: &str) -> Option<String> {
        let message = self.timeline.append(origin, text)?;
        let text = message.text.clone();
        self.publish(SessionEvent::MessageAppended { message });
        Some(text)
    }

    fn raise_error(&mut self, message: String) {
        self.state.error = Some(message.clone());
        self.publish(SessionEvent::ErrorRaised { message });
    }

    fn refresh_thinking(&mut self) {
        self.state.thinking = !self.pending_synthesis.is_empty() || !self.awaiting_voice.is_empty();
        self.sync_agent_state();
    }

    fn sync_agent_state(&mut self) {
        let state = self.state.agent_state();
        if state != self.published_state {
            self.published_state = state;
            self.publish(SessionEvent::AgentStateChanged { state });
        }
    }

    fn publish_voice_status(&self) {
        self.publish(SessionEvent::VoiceStatusChanged {
            status: self.voice.status(),
        });
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

// =============================================================================
// Tests
// =============================================================================

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AvenError, Result};

/// Top-level configuration for the AVEN assistant.
///
/// Loaded from `~/.aven/config.toml` by default. Each section corresponds
/// to one collaborator of the chat session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvenConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub widget: WidgetConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

impl AvenConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AvenConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Overlay values from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("VAPI_PUBLIC_KEY") {
            self.voice.public_key = v;
        }
        if let Some(v) = lookup("VAPI_ASSISTANT_ID") {
            self.voice.assistant_id = v;
        }
        if let Some(v) = lookup("AVEN_KNOWLEDGE_URL") {
            self.knowledge.endpoint = v;
        }
        if let Some(v) = lookup("AVEN_PORT") {
            match v.parse::<u16>() {
                Ok(port) => self.general.port = port,
                Err(_) => warn!(value = %v, "Ignoring invalid AVEN_PORT"),
            }
        }
    }

    /// Check that the voice provider credentials are present.
    ///
    /// Reports every missing setting in a single error.
    pub fn validate_voice(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.voice.public_key.trim().is_empty() {
            missing.push("voice.public_key");
        }
        if self.voice.assistant_id.trim().is_empty() {
            missing.push("voice.assistant_id");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AvenError::Config(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )))
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP port for the knowledge service front.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            port: 3000,
        }
    }
}

/// Chat widget behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Assistant message shown when a session opens.
    pub greeting: String,
    /// Whether spoken playback starts enabled.
    pub audio_enabled: bool,
    /// Start a voice call automatically after the widget mounts.
    pub auto_start: bool,
    /// Delay before the automatic voice call start.
    pub auto_start_delay_ms: u64,
    /// How long to wait for a voice provider reply before clearing `thinking`.
    pub voice_reply_timeout_secs: u64,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            greeting: "Hi There! Welcome to AVEN! How can I assist you today?".to_string(),
            audio_enabled: true,
            auto_start: true,
            auto_start_delay_ms: 2000,
            voice_reply_timeout_secs: 30,
        }
    }
}

/// Hosted voice provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Public key used to construct the provider client.
    pub public_key: String,
    /// Assistant to start calls against.
    pub assistant_id: String,
    /// Language of the fallback speech recognizer.
    pub language: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            public_key: String::new(),
            assistant_id: String::new(),
            language: "en-US".to_string(),
        }
    }
}

/// Knowledge retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// URL of the retrieval endpoint used by the chat session.
    pub endpoint: String,
    /// Hard timeout for one retrieval call.
    pub timeout_secs: u64,
    /// Number of passages requested from the index.
    pub top_k: usize,
    /// Query script run by the service front.
    pub script_path: String,
    /// Interpreter used to run the query script.
    pub python_path: String,
    /// Hard timeout for one query script run.
    pub script_timeout_secs: u64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/knowledge-base".to_string(),
            timeout_secs: 10,
            top_k: 5,
            script_path: "scripts/query_knowledge_base.py".to_string(),
            python_path: "venv/bin/python".to_string(),
            script_timeout_secs: 30,
        }
    }
}

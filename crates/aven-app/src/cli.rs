//! CLI argument definitions for the AVEN assistant.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3000;

/// AVEN assistant: knowledge API server and terminal chat widget.
#[derive(Parser, Debug)]
#[command(name = "aven", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the knowledge-base and voice-function endpoints.
    Serve {
        /// API server port.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
    },
    /// Chat with the assistant in the terminal.
    Chat {
        /// Run the retrieval script in-process instead of calling the server.
        #[arg(long)]
        direct: bool,
    },
    /// Run one knowledge-base query and print the ranked passages.
    Query {
        /// Query text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Query the configured HTTP endpoint instead of running the script.
        #[arg(long)]
        http: bool,

        /// Print the raw JSON response.
        #[arg(long)]
        json: bool,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > AVEN_CONFIG env var > ~/.aven/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("AVEN_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > AVEN_PORT env var > config file value > 3000.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Command::Serve { port: Some(p) } = self.command {
            return p;
        }
        if let Some(p) = std::env::var("AVEN_PORT")
            .ok()
            .and_then(|val| val.parse::<u16>().ok())
        {
            return p;
        }
        if config_port != 0 {
            return config_port;
        }
        DEFAULT_PORT
    }

    /// Resolve the log filter directive.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".aven").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".aven").join("config.toml");
    }
    PathBuf::from("config.toml")
}

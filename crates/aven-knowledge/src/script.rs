//! Retrieval by running the index query script as a subprocess.
//!
//! The script takes the query as its single argument and prints one JSON
//! document (`{success, results, error?}`) on stdout.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use aven_core::config::KnowledgeConfig;

use crate::client::KnowledgeClient;
use crate::error::RetrievalError;
use crate::types::{QueryResponse, RetrievalResult};

#[derive(Debug, Clone)]
pub struct ScriptKnowledgeClient {
    interpreter: PathBuf,
    script: PathBuf,
    timeout: Duration,
}

impl ScriptKnowledgeClient {
    pub fn new(
        interpreter: impl Into<PathBuf>,
        script: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            timeout,
        }
    }

    pub fn from_config(config: &KnowledgeConfig) -> Self {
        Self::new(
            &config.python_path,
            &config.script_path,
            Duration::from_secs(config.script_timeout_secs),
        )
    }
}

#[async_trait]
impl KnowledgeClient for ScriptKnowledgeClient {
    async fn query(&self, text: &str) -> Result<RetrievalResult, RetrievalError> {
        let child = Command::new(&self.interpreter)
            .arg(&self.script)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RetrievalError::Unavailable(format!("failed to spawn query script: {}", e))
            })?;

        // Dropping the child on timeout kills the script.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| RetrievalError::Timeout(self.timeout))?
            .map_err(|e| {
                RetrievalError::Unavailable(format!("failed to read script output: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RetrievalError::Unavailable(format!(
                "query script failed: {}",
                stderr.trim()
            )));
        }

        let parsed: QueryResponse = serde_json::from_slice(&output.stdout)?;
        parsed.into_result()
    }
}

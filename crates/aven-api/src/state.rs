//! Shared state passed to handlers via axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use aven_core::config::AvenConfig;
use aven_knowledge::{FunctionCallHandler, KnowledgeClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AvenConfig>,
    /// Retrieval backend.
    pub knowledge: Arc<dyn KnowledgeClient>,
    /// Voice-assistant function dispatcher, sharing the same backend.
    pub functions: Arc<FunctionCallHandler>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: AvenConfig, knowledge: Arc<dyn KnowledgeClient>) -> Self {
        let functions = Arc::new(FunctionCallHandler::new(Arc::clone(&knowledge)));
        Self {
            config: Arc::new(config),
            knowledge,
            functions,
            start_time: Instant::now(),
        }
    }
}

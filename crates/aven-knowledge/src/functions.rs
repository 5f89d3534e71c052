//! Function calls issued by the hosted voice assistant.
//!
//! The voice assistant calls `search_knowledge_base` mid-conversation and
//! speaks whatever text comes back, so every outcome (including failure)
//! is turned into a speakable reply.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::KnowledgeClient;
use crate::types::RetrievalResult;
use crate::{excerpt, CUSTOMER_SERVICE_PHONE};

/// Name of the knowledge search function exposed to the voice assistant.
pub const SEARCH_KNOWLEDGE_BASE: &str = "search_knowledge_base";

/// Number of passages summarized in a search reply.
const SUMMARY_RESULTS: usize = 3;

/// Characters of each passage included in a search reply.
const SUMMARY_EXCERPT_CHARS: usize = 200;

/// One function invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Request envelope sent by the voice provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionCallRequest {
    #[serde(default)]
    pub function: Option<FunctionCall>,
}

/// Speakable result of a function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallReply {
    pub result: String,
}

impl FunctionCallReply {
    fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
        }
    }
}

/// Dispatches voice-assistant function calls.
pub struct FunctionCallHandler {
    client: Arc<dyn KnowledgeClient>,
}

impl FunctionCallHandler {
    pub fn new(client: Arc<dyn KnowledgeClient>) -> Self {
        Self { client }
    }

    /// Handle a request envelope.
    pub async fn handle_request(&self, request: &FunctionCallRequest) -> FunctionCallReply {
        match &request.function {
            Some(call) => self.handle(call).await,
            None => FunctionCallReply::new("Function not recognized"),
        }
    }

    /// Handle a single function call.
    pub async fn handle(&self, call: &FunctionCall) -> FunctionCallReply {
        if call.name != SEARCH_KNOWLEDGE_BASE {
            tracing::debug!(function = %call.name, "Unknown function call");
            return FunctionCallReply::new("Function not recognized");
        }

        let query = call
            .parameters
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or("");
        if query.is_empty() {
            return FunctionCallReply::new("No search query provided");
        }

        tracing::info!(query = %query, "Searching knowledge base for voice assistant");
        match self.client.query(query).await {
            Ok(result) if !result.is_empty() => FunctionCallReply::new(summarize(query, &result)),
            Ok(_) => FunctionCallReply::new(format!(
                "I searched AVEN's knowledge base for \"{}\" but didn't find specific information. \
                 However, I can provide general guidance about AVEN's services. For detailed \
                 information, I recommend contacting AVEN customer service at {}.",
                query, CUSTOMER_SERVICE_PHONE
            )),
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind(), "Knowledge search for function call failed");
                FunctionCallReply::new(format!(
                    "I encountered an issue searching the knowledge base. Let me provide you with \
                     general information about AVEN's services, or you can contact customer \
                     service at {} for specific details.",
                    CUSTOMER_SERVICE_PHONE
                ))
            }
        }
    }
}

fn summarize(query: &str, result: &RetrievalResult) -> String {
    let summary = result
        .ranked()
        .into_iter()
        .take(SUMMARY_RESULTS)
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "{}. From {} (Relevance: {:.1}%): {}...",
                i + 1,
                hit.title,
                hit.score * 100.0,
                excerpt(&hit.content, SUMMARY_EXCERPT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Found {} relevant results for \"{}\":\n\n{}\n\nBased on this information from AVEN's \
         website, I can help answer your question.",
        result.len(),
        query,
        summary
    )
}

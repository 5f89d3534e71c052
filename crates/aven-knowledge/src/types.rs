//! Wire and domain types for knowledge retrieval.

use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// One passage returned by the retrieval service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub title: String,
    pub content: String,
    /// Relevance in `[0, 1]`.
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
}

/// Passages for one query. The service does not guarantee any order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievalHit>,
}

impl RetrievalResult {
    pub fn new(hits: Vec<RetrievalHit>) -> Self {
        Self { hits }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Hits sorted by descending score.
    pub fn ranked(&self) -> Vec<&RetrievalHit> {
        let mut hits: Vec<&RetrievalHit> = self.hits.iter().collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits
    }

    /// The highest-scoring hit.
    pub fn top(&self) -> Option<&RetrievalHit> {
        self.hits.iter().max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

/// Request body of the retrieval endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Response body of the retrieval endpoint and of the query script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub results: Vec<RetrievalHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_results: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    /// Successful response carrying `hits`.
    pub fn ok(query: &str, hits: Vec<RetrievalHit>) -> Self {
        Self {
            success: true,
            query: Some(query.to_string()),
            total_results: Some(hits.len()),
            results: hits,
            error: None,
        }
    }

    /// Convert into a retrieval result, rejecting reported failures.
    pub fn into_result(self) -> Result<RetrievalResult, RetrievalError> {
        if !self.success {
            return Err(RetrievalError::Unavailable(
                self.error
                    .unwrap_or_else(|| "retrieval reported failure".to_string()),
            ));
        }
        Ok(RetrievalResult::new(self.results))
    }
}

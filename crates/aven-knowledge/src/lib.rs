//! Knowledge retrieval for the AVEN assistant.
//!
//! Provides the `KnowledgeClient` seam used by the chat session, an HTTP
//! client for the retrieval endpoint, a subprocess client that runs the
//! index query script, and the handler for voice-provider function calls.

pub mod client;
pub mod error;
pub mod functions;
pub mod script;
pub mod types;

pub use client::{HttpKnowledgeClient, KnowledgeClient};
pub use error::RetrievalError;
pub use functions::{FunctionCall, FunctionCallHandler, FunctionCallReply, FunctionCallRequest};
pub use script::ScriptKnowledgeClient;
pub use types::{QueryRequest, QueryResponse, RetrievalHit, RetrievalResult};

/// Customer-service phone number offered whenever retrieval cannot help.
pub const CUSTOMER_SERVICE_PHONE: &str = "1-800-AVEN-123";

/// Return at most `max_chars` characters of `text`.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_shorter_than_limit() {
        assert_eq!(excerpt("short", 200), "short");
    }

    #[test]
    fn test_excerpt_truncates() {
        assert_eq!(excerpt("abcdef", 3), "abc");
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("\u{00e9}t\u{00e9} here", 3), "\u{00e9}t\u{00e9}");
    }

    #[test]
    fn test_excerpt_zero() {
        assert_eq!(excerpt("abc", 0), "");
    }
}

//! Knowledge client seam and the HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use aven_core::config::KnowledgeConfig;

use crate::error::RetrievalError;
use crate::types::{QueryRequest, QueryResponse, RetrievalResult};

/// Out-of-process knowledge retrieval.
#[async_trait]
pub trait KnowledgeClient: Send + Sync {
    /// Retrieve passages relevant to `text`.
    async fn query(&self, text: &str) -> Result<RetrievalResult, RetrievalError>;
}

/// Retrieval over `POST {endpoint}` with a JSON `{query}` body.
#[derive(Clone)]
pub struct HttpKnowledgeClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpKnowledgeClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            timeout,
        }
    }

    pub fn from_config(config: &KnowledgeConfig) -> Self {
        Self::new(
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, text: &str) -> Result<RetrievalResult, RetrievalError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&QueryRequest {
                query: text.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::Unavailable(format!(
                "retrieval endpoint returned {}",
                status
            )));
        }

        let body = response.text().await?;
        let parsed: QueryResponse = serde_json::from_str(&body)?;
        parsed.into_result()
    }
}

#[async_trait]
impl KnowledgeClient for HttpKnowledgeClient {
    async fn query(&self, text: &str) -> Result<RetrievalResult, RetrievalError> {
        tracing::debug!(endpoint = %self.endpoint, "Querying knowledge base");
        match tokio::time::timeout(self.timeout, self.send(text)).await {
            Ok(result) => result,
            Err(_) => Err(RetrievalError::Timeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    /// Serve `router` on an ephemeral port and return the retrieval URL.
    async fn stub_endpoint(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/knowledge-base", addr)
    }

    async fn client_for(router: Router) -> HttpKnowledgeClient {
        HttpKnowledgeClient::new(stub_endpoint(router).await, Duration::from_secs(5))
    }

    fn replying(status: StatusCode, body: &'static str) -> Router {
        Router::new().route(
            "/api/knowledge-base",
            post(move || async move { (status, body) }),
        )
    }

    #[tokio::test]
    async fn test_success_schema_is_parsed() {
        let router = Router::new().route(
            "/api/knowledge-base",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["query"], "what is a heloc");
                Json(json!({
                    "success": true,
                    "query": body["query"],
                    "results": [
                        {"title": "Rates", "content": "From 6.5% APR.", "score": 0.4},
                        {"title": "HELOC Basics", "content": "Borrow against equity.", "score": 0.9,
                         "url": "https://www.aven.com/education", "chunk_index": 2}
                    ],
                    "total_results": 2
                }))
            }),
        );
        let client = client_for(router).await;

        let result = client.query("what is a heloc").await.unwrap();
        assert_eq!(result.len(), 2);
        let top = result.top().unwrap();
        assert_eq!(top.title, "HELOC Basics");
        assert_eq!(top.chunk_index, Some(2));
        assert_eq!(result.ranked()[1].url, None);
    }

    #[tokio::test]
    async fn test_empty_results_are_not_an_error() {
        let client = client_for(replying(StatusCode::OK, r#"{"success":true,"results":[]}"#)).await;
        assert!(client.query("boats").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_unavailable() {
        let client = client_for(replying(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"internal","message":"Failed to query knowledge base"}"#,
        ))
        .await;
        let err = client.query("rates").await.unwrap_err();
        assert_eq!(err.kind(), "unavailable");
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_reported_failure_is_unavailable() {
        let client = client_for(replying(
            StatusCode::OK,
            r#"{"success":false,"results":[],"error":"index not loaded"}"#,
        ))
        .await;
        assert_eq!(
            client.query("rates").await.unwrap_err(),
            RetrievalError::Unavailable("index not loaded".to_string())
        );
    }

    #[tokio::test]
    async fn test_unexpected_body_is_malformed() {
        for body in [
            "<html>Bad Gateway</html>",
            r#"{"results":[]}"#,
            r#"{"success":true,"results":[{"title":"No content"}]}"#,
        ] {
            let client = client_for(replying(StatusCode::OK, body)).await;
            let err = client.query("rates").await.unwrap_err();
            assert_eq!(err.kind(), "malformed_response", "body: {body}");
        }
    }

    #[tokio::test]
    async fn test_hanging_endpoint_times_out() {
        let router = Router::new().route(
            "/api/knowledge-base",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                "{}"
            }),
        );
        let client =
            HttpKnowledgeClient::new(stub_endpoint(router).await, Duration::from_millis(200));
        assert_eq!(
            client.query("rates").await.unwrap_err(),
            RetrievalError::Timeout(Duration::from_millis(200))
        );
    }

    #[test]
    fn test_from_config() {
        let config = KnowledgeConfig {
            endpoint: "http://kb.test/query".to_string(),
            timeout_secs: 4,
            ..KnowledgeConfig::default()
        };
        let client = HttpKnowledgeClient::from_config(&config);
        assert_eq!(client.endpoint(), "http://kb.test/query");
        assert_eq!(client.timeout, Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        // Port 9 (discard) on localhost is closed in test environments.
        let client = HttpKnowledgeClient::new("http://127.0.0.1:9/kb", Duration::from_secs(5));
        let err = client.query("heloc").await.unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::Unavailable(_) | RetrievalError::Timeout(_)
        ));
    }

    #[tokio::test]
    async fn test_invalid_url_is_unavailable() {
        let client = HttpKnowledgeClient::new("not a url", Duration::from_secs(1));
        let err = client.query("rates").await.unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }
}

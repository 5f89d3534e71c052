//! Reply synthesis for text turns that the voice provider does not own.
//!
//! Composes answers from the top retrieved passage when the knowledge base
//! responds, and from a canned table otherwise. Never fails: every path
//! ends in a non-empty reply.

use std::sync::Arc;
use std::time::Duration;

use aven_knowledge::{excerpt, KnowledgeClient};

/// Reply used when synthesis itself could not run.
pub const APOLOGY_REPLY: &str = "I'm experiencing technical difficulties. Please try again or \
     contact AVEN customer service at 1-800-AVEN-123.";

// =============================================================================
// Topic
// =============================================================================

/// Topic of a user utterance, decided by keyword rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    HomeEquity,
    Application,
    Rates,
    CreditCard,
    General,
}

/// Keyword rules in priority order. First match wins.
const TOPIC_RULES: &[(Topic, &[&str])] = &[
    (Topic::HomeEquity, &["heloc", "home equity"]),
    (Topic::Application, &["apply", "application"]),
    (Topic::Rates, &["rate", "interest"]),
    (Topic::CreditCard, &["credit card"]),
];

impl Topic {
    /// Case-insensitive substring classification.
    pub fn classify(text: &str) -> Topic {
        let lowered = text.to_lowercase();
        TOPIC_RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(topic, _)| *topic)
            .unwrap_or(Topic::General)
    }

    /// Reply built around a retrieved passage.
    pub fn augmented_reply(&self, context: &str) -> String {
        match self {
            Topic::HomeEquity => format!(
                "Based on AVEN's information: A HELOC (Home Equity Line of Credit) allows you to \
                 borrow against your home's equity. {}... Would you like me to help you calculate \
                 your potential credit line or learn more about our application process?",
                excerpt(context, 200)
            ),
            Topic::Rates => format!(
                "Here's what I found about AVEN's rates: {}... Our rates are competitive and based \
                 on your creditworthiness. Would you like to see if you pre-qualify?",
                excerpt(context, 250)
            ),
            Topic::Application => format!(
                "Great! I can help you with the application process. {}... The process typically \
                 takes about 10 minutes and you'll get an instant pre-approval decision. Shall we \
                 begin?",
                excerpt(context, 200)
            ),
            Topic::CreditCard | Topic::General => format!(
                "Based on AVEN's information: {}... How else can I help you with your HELOC or \
                 credit needs?",
                excerpt(context, 300)
            ),
        }
    }

    /// Complete answer that needs no retrieved content.
    pub fn canned_reply(&self) -> &'static str {
        match self {
            Topic::HomeEquity => {
                "A HELOC (Home Equity Line of Credit) allows you to borrow against your home's \
                 equity. With our competitive rates starting at 6.5% APR, you could access up to \
                 80% of your home's value. Would you like me to calculate your potential credit line?"
            }
            Topic::Application => {
                "Great! I can help you start your HELOC application right now. The process takes \
                 about 10 minutes and you'll get an instant pre-approval decision. Shall we begin \
                 with some basic information about your home and financial situation?"
            }
            Topic::Rates => {
                "Our current HELOC rates start at 6.5% APR for qualified borrowers. Rates are \
                 variable and based on your creditworthiness, loan-to-value ratio, and current \
                 market conditions. Would you like to see if you pre-qualify?"
            }
            Topic::CreditCard => {
                "We offer premium credit cards with competitive rates and rewards. Our HELOC \
                 Credit Card combines the flexibility of a credit card with the low rates of a \
                 home equity line. Would you like to learn more about our credit card options?"
            }
            Topic::General => {
                "I'd be happy to help you with your HELOC and credit needs! I can assist with rate \
                 quotes, application processes, eligibility requirements, or answer any questions \
                 about our products. What specific information would you like to know?"
            }
        }
    }
}

// =============================================================================
// ResponseSynthesizer
// =============================================================================

/// Produces assistant replies for text turns.
pub struct ResponseSynthesizer {
    client: Arc<dyn KnowledgeClient>,
    timeout: Duration,
}

impl ResponseSynthesizer {
    /// Create a synthesizer that bounds every retrieval call by `timeout`.
    pub fn new(client: Arc<dyn KnowledgeClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Produce a reply for `user_text`. Always returns a non-empty string.
    pub async fn synthesize(&self, user_text: &str) -> String {
        let topic = Topic::classify(user_text);

        match tokio::time::timeout(self.timeout, self.client.query(user_text)).await {
            Ok(Ok(result)) => match result.top() {
                Some(hit) if !hit.content.trim().is_empty() => {
                    tracing::debug!(?topic, score = hit.score, "Composing reply from knowledge base");
                    return topic.augmented_reply(hit.content.trim());
                }
                _ => tracing::debug!(?topic, "Knowledge base returned no usable passages"),
            },
            Ok(Err(e)) => {
                tracing::warn!(error = %e, kind = e.kind(), "Knowledge base query failed");
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    kind = "timeout",
                    "Knowledge base query timed out"
                );
            }
        }

        topic.canned_reply().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use aven_knowledge::{RetrievalError, CUSTOMER_SERVICE_PHONE, RetrievalHit, RetrievalResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClient {
        result: Result<RetrievalResult, RetrievalError>,
        calls: AtomicUsize,
    }

    impl FixedClient {
        fn new(result: Result<RetrievalResult, RetrievalError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl KnowledgeClient for FixedClient {
        async fn query(&self, _text: &str) -> Result<RetrievalResult, RetrievalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    struct HangingClient;

    #[async_trait]
    impl KnowledgeClient for HangingClient {
        async fn query(&self, _text: &str) -> Result<RetrievalResult, RetrievalError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(RetrievalResult::default())
        }
    }

    fn passage(content: &str, score: f32) -> RetrievalHit {
        RetrievalHit {
            title: "AVEN".to_string(),
            content: content.to_string(),
            score,
            url: None,
            chunk_index: None,
        }
    }

    fn synth(client: Arc<dyn KnowledgeClient>) -> ResponseSynthesizer {
        ResponseSynthesizer::new(client, Duration::from_secs(5))
    }

    // ---- Topic classification ----

    #[test]
    fn test_classify_keywords() {
        assert_eq!(Topic::classify("what is a heloc"), Topic::HomeEquity);
        assert_eq!(Topic::classify("Tell me about HOME EQUITY"), Topic::HomeEquity);
        assert_eq!(Topic::classify("show me rates"), Topic::Rates);
        assert_eq!(Topic::classify("interest charges?"), Topic::Rates);
        assert_eq!(Topic::classify("how do I apply"), Topic::Application);
        assert_eq!(Topic::classify("application status"), Topic::Application);
        assert_eq!(Topic::classify("credit card perks"), Topic::CreditCard);
        assert_eq!(Topic::classify("hello there"), Topic::General);
    }

    #[test]
    fn test_apply_beats_rate() {
        assert_eq!(
            Topic::classify("what is the apply process and rate"),
            Topic::Application
        );
    }

    #[test]
    fn test_heloc_beats_everything() {
        assert_eq!(
            Topic::classify("heloc rate and application for a credit card"),
            Topic::HomeEquity
        );
    }

    #[test]
    fn test_apply_beats_credit_card() {
        assert_eq!(Topic::classify("apply for a credit card"), Topic::Application);
    }

    #[test]
    fn test_credit_card_mentioning_rates_is_rates() {
        // "rates" is checked before "credit card"
        assert_eq!(Topic::classify("credit card rates"), Topic::Rates);
    }

    // ---- Templates ----

    #[test]
    fn test_augmented_reply_excerpt_bounds() {
        let context = "y".repeat(1000);
        let heloc = Topic::HomeEquity.augmented_reply(&context);
        assert!(heloc.contains(&format!("{}...", "y".repeat(200))));
        assert!(!heloc.contains(&"y".repeat(201)));

        let rates = Topic::Rates.augmented_reply(&context);
        assert!(rates.contains(&format!("{}...", "y".repeat(250))));
        assert!(!rates.contains(&"y".repeat(251)));

        let general = Topic::General.augmented_reply(&context);
        assert!(general.contains(&format!("{}...", "y".repeat(300))));
        assert!(!general.contains(&"y".repeat(301)));
    }

    #[test]
    fn test_every_reply_ends_with_question() {
        for topic in [
            Topic::HomeEquity,
            Topic::Application,
            Topic::Rates,
            Topic::CreditCard,
            Topic::General,
        ] {
            assert!(topic.canned_reply().ends_with('?'), "{topic:?}");
            assert!(topic.augmented_reply("ctx").ends_with('?'), "{topic:?}");
        }
    }

    // ---- Synthesis ----

    #[tokio::test]
    async fn test_augmented_path_uses_top_scored_passage() {
        let client = FixedClient::new(Ok(RetrievalResult::new(vec![
            passage("weak passage", 0.2),
            passage("Rates start at 6.5% APR", 0.9),
        ])));
        let reply = synth(client.clone()).synthesize("what are your rates").await;
        assert!(reply.starts_with("Here's what I found about AVEN's rates: Rates start at 6.5% APR..."));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_augmented_general_for_credit_card() {
        let client = FixedClient::new(Ok(RetrievalResult::new(vec![passage("Cards", 0.5)])));
        let reply = synth(client).synthesize("credit card options").await;
        assert!(reply.starts_with("Based on AVEN's information: Cards..."));
    }

    #[tokio::test]
    async fn test_empty_results_fall_back_to_canned() {
        let client = FixedClient::new(Ok(RetrievalResult::default()));
        let reply = synth(client).synthesize("Tell me about the credit card").await;
        assert_eq!(reply, Topic::CreditCard.canned_reply());
    }

    #[tokio::test]
    async fn test_credit_card_application_gets_application_answer() {
        let client = FixedClient::new(Ok(RetrievalResult::default()));
        let reply = synth(client).synthesize("Can I apply for a credit card?").await;
        assert_eq!(reply, Topic::Application.canned_reply());
    }

    #[tokio::test]
    async fn test_blank_passage_falls_back_to_canned() {
        let client = FixedClient::new(Ok(RetrievalResult::new(vec![passage("   ", 0.9)])));
        let reply = synth(client).synthesize("apply now").await;
        assert_eq!(reply, Topic::Application.canned_reply());
    }

    #[tokio::test]
    async fn test_every_error_kind_falls_back() {
        for err in [
            RetrievalError::Timeout(Duration::from_secs(1)),
            RetrievalError::Unavailable("down".to_string()),
            RetrievalError::MalformedResponse("eof".to_string()),
        ] {
            let reply = synth(FixedClient::new(Err(err))).synthesize("what is a heloc").await;
            assert_eq!(reply, Topic::HomeEquity.canned_reply());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_client_is_cut_off() {
        let synthesizer = ResponseSynthesizer::new(Arc::new(HangingClient), Duration::from_secs(10));
        let reply = synthesizer.synthesize("what is a heloc").await;
        assert_eq!(reply, Topic::HomeEquity.canned_reply());
    }

    #[tokio::test]
    async fn test_default_answer_for_unmatched_input() {
        let client = FixedClient::new(Err(RetrievalError::Unavailable("down".to_string())));
        let reply = synth(client).synthesize("good morning").await;
        assert_eq!(reply, Topic::General.canned_reply());
        assert!(!reply.is_empty());
    }

    #[test]
    fn test_apology_names_customer_service() {
        assert!(APOLOGY_REPLY.contains(CUSTOMER_SERVICE_PHONE));
    }
}

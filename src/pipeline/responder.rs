//! Responder: drafts the SMS reply in the sender's language.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, record_usage};
use crate::pipeline::types::{Language, Outcome};

/// Reply sent when generation fails for any reason.
pub const FALLBACK_REPLY: &str = "Thank you for your message. We'll get back to you soon!";

/// Tuning for reply generation.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// What the business is, e.g. "barbershop". Goes into the system prompt.
    pub business: String,
    pub temperature: f32,
    /// Keeps replies SMS-sized.
    pub max_tokens: u32,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            business: "barbershop".to_string(),
            temperature: 0.7,
            max_tokens: 150,
        }
    }
}

/// Generates a natural-language reply. Never fails.
pub struct Responder {
    llm: Arc<dyn LlmProvider>,
    config: ResponderConfig,
}

impl Responder {
    pub fn new(llm: Arc<dyn LlmProvider>, config: ResponderConfig) -> Self {
        Self { llm, config }
    }

    /// Produce a reply; on any failure, `FALLBACK_REPLY`.
    ///
    /// The customer name and booking intent are passed to the model as
    /// hints only; no branching happens on them here.
    pub async fn generate_reply(
        &self,
        message: &str,
        language: Language,
        customer_name: Option<&str>,
        booking_intent: bool,
    ) -> Outcome<String> {
        match self
            .try_generate(message, language, customer_name, booking_intent)
            .await
        {
            Ok(reply) => {
                debug!(language = %language, chars = reply.chars().count(), "Reply generated");
                Outcome::Fresh(reply)
            }
            Err(cause) => {
                warn!(error = %cause, "Reply generation failed, using fallback");
                Outcome::Fallback {
                    value: FALLBACK_REPLY.to_string(),
                    cause,
                }
            }
        }
    }

    async fn try_generate(
        &self,
        message: &str,
        language: Language,
        customer_name: Option<&str>,
        booking_intent: bool,
    ) -> Result<String, PipelineError> {
        let system_prompt =
            build_reply_system_prompt(&self.config.business, language, customer_name, booking_intent);

        let request = CompletionRequest::new(vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(message),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = self.llm.complete(request).await?;
        record_usage(self.llm.as_ref(), &response, "reply");
        let reply = response.content.trim();
        if reply.is_empty() {
            return Err(PipelineError::Generation("model returned an empty reply".into()));
        }
        Ok(reply.to_string())
    }
}

fn build_reply_system_prompt(
    business: &str,
    language: Language,
    customer_name: Option<&str>,
    booking_intent: bool,
) -> String {
    let mut prompt = format!(
        "You are a friendly AI assistant for a {business}.\n\
         Respond in {lang} language.\n\
         Be helpful, professional, and encourage booking appointments.\n\
         Keep responses concise and natural for SMS.\n",
        lang = language.code().to_uppercase(),
    );
    match customer_name {
        Some(name) => prompt.push_str(&format!("Customer name: {name}\n")),
        None => prompt.push_str("Customer name: unknown\n"),
    }
    prompt.push_str(&format!("Booking intent detected: {booking_intent}"));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    use crate::error::LlmError;
    use crate::llm::CompletionResponse;

    /// Records the last request and answers with a fixed reply or error.
    struct MockReplyLlm {
        reply: Result<String, ()>,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    impl MockReplyLlm {
        fn new(reply: Result<&str, ()>) -> Self {
            Self {
                reply: reply.map(String::from),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockReplyLlm {
        fn model_name(&self) -> &str {
            "mock-reply"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            *self.last_request.lock().await = Some(request);
            match &self.reply {
                Ok(text) => Ok(CompletionResponse {
                    content: text.clone(),
                    input_tokens: 80,
                    output_tokens: 30,
                }),
                Err(()) => Err(LlmError::RateLimited {
                    provider: "mock".into(),
                    retry_after: None,
                }),
            }
        }
    }

    #[test]
    fn system_prompt_carries_hints() {
        let prompt = build_reply_system_prompt("barbershop", Language::Fr, Some("Sarah"), true);
        assert!(prompt.contains("barbershop"));
        assert!(prompt.contains("Respond in FR language"));
        assert!(prompt.contains("Sarah"));
        assert!(prompt.contains("Booking intent detected: true"));
    }

    #[test]
    fn system_prompt_without_name() {
        let prompt = build_reply_system_prompt("salon", Language::En, None, false);
        assert!(prompt.contains("Customer name: unknown"));
        assert!(prompt.contains("Booking intent detected: false"));
    }

    #[tokio::test]
    async fn reply_is_trimmed_and_request_is_bounded() {
        let llm = Arc::new(MockReplyLlm::new(Ok("  Hi Sarah! When works for you?\n")));
        let responder = Responder::new(llm.clone(), ResponderConfig::default());

        let outcome = responder
            .generate_reply("I need a haircut", Language::En, Some("Sarah"), true)
            .await;
        assert!(!outcome.is_fallback());
        assert_eq!(outcome.value(), "Hi Sarah! When works for you?");

        let request = llm.last_request.lock().await.take().unwrap();
        assert_eq!(request.max_tokens, Some(150));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].content, "I need a haircut");
    }

    #[tokio::test]
    async fn upstream_error_yields_fallback_reply() {
        let responder = Responder::new(Arc::new(MockReplyLlm::new(Err(()))), ResponderConfig::default());
        let outcome = responder.generate_reply("Hello", Language::Fr, None, false).await;
        assert!(outcome.is_fallback());
        assert_eq!(outcome.into_value(), FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn empty_generation_yields_fallback_reply() {
        let responder = Responder::new(Arc::new(MockReplyLlm::new(Ok("   "))), ResponderConfig::default());
        let outcome = responder.generate_reply("Hello", Language::En, None, false).await;
        assert!(matches!(outcome.cause(), Some(PipelineError::Generation(_))));
        assert_eq!(outcome.value(), FALLBACK_REPLY);
    }
}

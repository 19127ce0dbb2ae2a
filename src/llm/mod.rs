//! LLM integration for BookingBuddy.
//!
//! Supports:
//! - **OpenAI**: Direct API access via rig-core (default, `gpt-4o`)
//! - **Anthropic**: Direct API access via rig-core
//!
//! Uses the rig-core crate for HTTP transport and the `RigAdapter` to bridge
//! rig's `CompletionModel` trait to our `LlmProvider` trait. Without an API
//! key the service still runs on `OfflineProvider`, and every message takes
//! the fallback paths.

mod costs;
pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

impl LlmBackend {
    /// Provider label used in logs and the health report.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAi => "gpt-4o",
        }
    }
}

impl std::str::FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(format!("unknown LLM backend '{other}' (expected openai or anthropic)")),
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: Option<secrecy::SecretString>,
    pub model: String,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let Some(api_key) = config.api_key.as_ref() else {
        tracing::warn!(
            backend = config.backend.as_str(),
            "No API key configured, replies will use fallback text"
        );
        return Ok(Arc::new(OfflineProvider::new(config.backend.as_str())));
    };

    match config.backend {
        LlmBackend::Anthropic => create_anthropic_provider(api_key, &config.model),
        LlmBackend::OpenAi => create_openai_provider(api_key, &config.model),
    }
}

fn create_anthropic_provider(
    api_key: &secrecy::SecretString,
    model_name: &str,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::anthropic;

    let client: rig::client::Client<anthropic::client::AnthropicExt> =
        anthropic::Client::new(api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("Failed to create Anthropic client: {}", e),
            }
        })?;

    let model = client.completion_model(model_name);
    tracing::info!("Using Anthropic (model: {})", model_name);
    Ok(Arc::new(RigAdapter::new(model, model_name)))
}

fn create_openai_provider(
    api_key: &secrecy::SecretString,
    model_name: &str,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let model = client.completion_model(model_name);
    tracing::info!("Using OpenAI (model: {})", model_name);
    Ok(Arc::new(RigAdapter::new(model, model_name)))
}

/// Log token usage and cost of one completion. Returns the cost in USD.
pub fn record_usage(
    llm: &dyn LlmProvider,
    response: &CompletionResponse,
    purpose: &str,
) -> Decimal {
    let cost = response.cost(llm.cost_per_token());
    tracing::debug!(
        model = llm.model_name(),
        purpose,
        input_tokens = response.input_tokens,
        output_tokens = response.output_tokens,
        cost = %cost,
        "LLM call completed"
    );
    cost
}

/// Provider used when no credentials are configured. Every call fails.
pub struct OfflineProvider {
    provider: String,
}

impl OfflineProvider {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
        }
    }
}

#[async_trait]
impl LlmProvider for OfflineProvider {
    fn model_name(&self) -> &str {
        "offline"
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        (Decimal::ZERO, Decimal::ZERO)
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::AuthFailed {
            provider: self.provider.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_missing_key_still_constructs() {
        // rig-core clients accept any string as API key at construction time.
        // The actual auth failure happens when making a request.
        let config = LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key: Some(secrecy::SecretString::from("test-key")),
            model: "claude-3-5-sonnet-latest".to_string(),
        };
        let provider = create_provider(&config);
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().model_name(), "claude-3-5-sonnet-latest");
    }

    #[test]
    fn test_create_openai_provider() {
        let config = LlmConfig {
            backend: LlmBackend::OpenAi,
            api_key: Some(secrecy::SecretString::from("sk-test")),
            model: "gpt-4o".to_string(),
        };
        let provider = create_provider(&config);
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().model_name(), "gpt-4o");
    }

    #[tokio::test]
    async fn no_key_yields_offline_provider_that_always_fails() {
        let config = LlmConfig {
            backend: LlmBackend::OpenAi,
            api_key: None,
            model: "gpt-4o".to_string(),
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "offline");

        let result = provider
            .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
            .await;
        assert!(matches!(result, Err(LlmError::AuthFailed { .. })));
    }

    struct PricedStub;

    #[async_trait]
    impl LlmProvider for PricedStub {
        fn model_name(&self) -> &str {
            "gpt-4o"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            costs::model_cost("gpt-4o")
        }

        async fn complete(&self, _: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            unreachable!("not called")
        }
    }

    #[test]
    fn record_usage_prices_both_directions() {
        let response = CompletionResponse {
            content: "Hi!".to_string(),
            input_tokens: 1_000_000,
            output_tokens: 100_000,
        };
        // 1M input at $2.50/M plus 100k output at $10/M.
        let cost = record_usage(&PricedStub, &response, "reply");
        assert_eq!(cost, rust_decimal_macros::dec!(3.50));
    }

    #[test]
    fn offline_provider_costs_nothing() {
        let response = CompletionResponse {
            content: String::new(),
            input_tokens: 500,
            output_tokens: 500,
        };
        assert_eq!(
            record_usage(&OfflineProvider::new("openai"), &response, "classify"),
            Decimal::ZERO
        );
    }

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<LlmBackend>().unwrap(), LlmBackend::OpenAi);
        assert_eq!(" anthropic ".parse::<LlmBackend>().unwrap(), LlmBackend::Anthropic);
        assert!("mistral".parse::<LlmBackend>().is_err());
    }
}

//! Configuration types.
//!
//! Everything is read from the environment; `main` calls
//! `ServiceConfig::from_env()` once at startup.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Tuning for the intake pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// What the business is, e.g. "barbershop". Shapes the reply prompt.
    pub business: String,
    /// Temperature for classification.
    pub classify_temperature: f32,
    /// Temperature for reply generation.
    pub reply_temperature: f32,
    /// Reply length cap in tokens (SMS-sized).
    pub reply_max_tokens: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            business: "barbershop".to_string(),
            classify_temperature: 0.1,
            reply_temperature: 0.7,
            reply_max_tokens: 150,
        }
    }
}

/// Where customers and message logs live.
#[derive(Debug, Clone)]
pub enum StoreLocation {
    Local(PathBuf),
    Remote { url: String, auth_token: SecretString },
}

/// Process-level configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind: String,
    pub port: u16,
    pub llm: LlmConfig,
    pub store: StoreLocation,
    pub pipeline: PipelineConfig,
    /// Only used to report whether the SMS provider is set up.
    pub twilio_configured: bool,
}

impl ServiceConfig {
    /// Read configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = match get("BOOKING_BUDDY_PORT") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "BOOKING_BUDDY_PORT".into(),
                message: format!("{raw:?} is not a port number: {e}"),
            })?,
            None => 5000,
        };
        let bind = get("BOOKING_BUDDY_BIND").unwrap_or_else(|| "0.0.0.0".to_string());

        let backend: LlmBackend = match get("BOOKING_BUDDY_LLM_BACKEND") {
            Some(raw) => raw.parse().map_err(|message| ConfigError::InvalidValue {
                key: "BOOKING_BUDDY_LLM_BACKEND".into(),
                message,
            })?,
            None => LlmBackend::OpenAi,
        };
        let key_var = match backend {
            LlmBackend::OpenAi => "OPENAI_API_KEY",
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        };
        let llm = LlmConfig {
            backend,
            api_key: get(key_var).map(SecretString::from),
            model: get("BOOKING_BUDDY_MODEL").unwrap_or_else(|| backend.default_model().to_string()),
        };

        let store = match get("BOOKING_BUDDY_DB_URL") {
            Some(url) => {
                let token = get("BOOKING_BUDDY_DB_TOKEN")
                    .ok_or_else(|| ConfigError::MissingEnvVar("BOOKING_BUDDY_DB_TOKEN".into()))?;
                StoreLocation::Remote {
                    url,
                    auth_token: SecretString::from(token),
                }
            }
            None => StoreLocation::Local(PathBuf::from(
                get("BOOKING_BUDDY_DB_PATH")
                    .unwrap_or_else(|| "./data/booking-buddy.db".to_string()),
            )),
        };

        let mut pipeline = PipelineConfig::default();
        if let Some(business) = get("BOOKING_BUDDY_BUSINESS") {
            pipeline.business = business;
        }

        Ok(Self {
            bind,
            port,
            llm,
            store,
            pipeline,
            twilio_configured: get("TWILIO_ACCOUNT_SID").is_some(),
        })
    }
}

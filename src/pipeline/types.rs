//! Shared types for the SMS intake pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

// ── Inbound message ─────────────────────────────────────────────────

/// One inbound text message, as handed over by the transport.
///
/// Created per request and never persisted directly; only the derived
/// customer and interaction records are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender phone number.
    pub channel_address: String,
    /// Message body.
    pub body: String,
    /// When the transport received it.
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(channel_address: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel_address: channel_address.into(),
            body: body.into(),
            received_at: Utc::now(),
        }
    }
}

// ── Classification ──────────────────────────────────────────────────

/// Languages the classifier can report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Fr => "fr",
        }
    }

    /// Lenient parse: anything that is not French is treated as English.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "fr" | "fr-ca" | "fr-fr" | "french" | "français" | "francais" => Self::Fr,
            _ => Self::En,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Structured analysis of one message.
///
/// `Default` is the designated fallback: English, no booking intent,
/// no name, name not prompted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub detected_language: Language,
    pub booking_intent: bool,
    pub name_extracted: Option<String>,
    pub name_prompted: bool,
}

impl ClassificationResult {
    pub fn fallback() -> Self {
        Self::default()
    }
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Result of a stage that never fails outward.
///
/// `Fallback` still carries a usable value, plus the cause that forced it,
/// so callers get a value either way while logs and tests can tell the
/// degraded path apart.
#[derive(Debug)]
pub enum Outcome<T> {
    Fresh(T),
    Fallback { value: T, cause: PipelineError },
}

impl<T> Outcome<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Fresh(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Fresh(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn cause(&self) -> Option<&PipelineError> {
        match self {
            Self::Fresh(_) => None,
            Self::Fallback { cause, .. } => Some(cause),
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fresh(_) => "fresh",
            Self::Fallback { .. } => "fallback",
        }
    }
}

//! Classifier: language, booking intent and name extraction.
//!
//! `classify()` is total: an upstream error or unusable model output
//! degrades to `ClassificationResult::fallback()` so the sender still gets
//! a reply. The degraded path is visible through `Outcome::Fallback`.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, record_usage};
use crate::pipeline::types::{ClassificationResult, Language, Outcome};

/// Default temperature for classification (near-deterministic).
pub const CLASSIFY_TEMPERATURE: f32 = 0.1;

/// Turns raw message text into a `ClassificationResult`.
pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
    temperature: f32,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            temperature: CLASSIFY_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Classify a message. Never fails.
    pub async fn classify(&self, message: &str) -> Outcome<ClassificationResult> {
        match self.try_classify(message).await {
            Ok(result) => {
                debug!(
                    language = %result.detected_language,
                    booking_intent = result.booking_intent,
                    has_name = result.name_extracted.is_some(),
                    "Message classified"
                );
                Outcome::Fresh(result)
            }
            Err(cause) => {
                warn!(error = %cause, "Classification failed, using fallback");
                Outcome::Fallback {
                    value: ClassificationResult::fallback(),
                    cause,
                }
            }
        }
    }

    async fn try_classify(&self, message: &str) -> Result<ClassificationResult, PipelineError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_classification_prompt()),
            ChatMessage::user(format!("Analyze this message: {message}")),
        ])
        .with_temperature(self.temperature);

        let response = self.llm.complete(request).await?;
        record_usage(self.llm.as_ref(), &response, "classify");

        parse_classification(&response.content).map_err(|e| {
            warn!(raw_response = %response.content, error = %e, "Unparseable classification");
            PipelineError::Classification(e)
        })
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_classification_prompt() -> String {
    "You are a language detection and information extraction assistant.\n\
     Analyze the message and return ONLY a valid JSON object with these exact fields:\n\
     {\n\
     \x20   \"detected_language\": \"en\" or \"fr\",\n\
     \x20   \"booking_intent\": true or false,\n\
     \x20   \"name_extracted\": \"name\" or null,\n\
     \x20   \"name_prompted\": true or false\n\
     }\n\n\
     Do not include any other text, only the JSON object."
        .to_string()
}

// ── Response parsing ────────────────────────────────────────────────

/// Raw model output. Every field is optional; gaps take fallback values.
#[derive(Debug, Default, serde::Deserialize)]
struct RawClassification {
    #[serde(default)]
    detected_language: Option<String>,
    #[serde(default)]
    booking_intent: Option<bool>,
    #[serde(default)]
    name_extracted: Option<String>,
    #[serde(default)]
    name_prompted: Option<bool>,
}

/// Parse model output into a `ClassificationResult`.
fn parse_classification(raw: &str) -> Result<ClassificationResult, String> {
    let json_str = extract_json_object(raw).ok_or("no JSON object found in response")?;
    let parsed: RawClassification =
        serde_json::from_str(json_str).map_err(|e| format!("JSON parse error: {e}"))?;

    let name_extracted = parsed
        .name_extracted
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty() && !n.eq_ignore_ascii_case("null"));

    Ok(ClassificationResult {
        detected_language: parsed
            .detected_language
            .as_deref()
            .map(Language::from_code)
            .unwrap_or_default(),
        booking_intent: parsed.booking_intent.unwrap_or(false),
        name_extracted,
        name_prompted: parsed.name_prompted.unwrap_or(false),
    })
}

/// Locate the JSON object in model output.
///
/// A clean `{...}` is taken as-is; otherwise the span from the first `{` to
/// the last `}` is tried. Output that is itself JSON but not an object
/// (an array, a string) yields `None`, even when it wraps an object.
fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    if trimmed.starts_with('[') || serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return None;
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => Some(&trimmed[start..=end]),
        _ => None,
    }
}

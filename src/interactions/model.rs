//! Interaction records: the append-only audit of each SMS turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::types::{ClassificationResult, Language};

/// One inbound message, how it was classified, and what we replied.
///
/// Write-once: the store only ever appends these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: Uuid,
    pub channel_address: String,
    pub body: String,
    pub detected_language: Language,
    pub booking_intent: bool,
    pub name_extracted: Option<String>,
    pub reply_text: String,
    pub name_prompted: bool,
    /// Server-assigned; the ordering key.
    pub timestamp: DateTime<Utc>,
}

impl InteractionRecord {
    pub fn new(
        channel_address: &str,
        body: &str,
        classification: &ClassificationResult,
        reply_text: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_address: channel_address.to_string(),
            body: body.to_string(),
            detected_language: classification.detected_language,
            booking_intent: classification.booking_intent,
            name_extracted: classification.name_extracted.clone(),
            reply_text: reply_text.to_string(),
            name_prompted: classification.name_prompted,
            timestamp: Utc::now(),
        }
    }
}

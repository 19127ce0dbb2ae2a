//! Intake pipeline: one inbound SMS in, one reply out.
//!
//! Flow:
//! 1. Classifier → language, booking intent, extracted name
//! 2. Customer resolver → durable customer (or transient view on store failure)
//! 3. Responder → reply text in the detected language
//! 4. Interaction logger → append-only audit record
//!
//! Every stage absorbs its own failures, so `handle()` cannot fail and the
//! sender always gets a reply. Stages talk only through returned values.

use std::sync::Arc;

use tracing::info;

use crate::config::PipelineConfig;
use crate::customers::{CustomerResolver, ResolvedCustomer};
use crate::interactions::InteractionLogger;
use crate::llm::LlmProvider;
use crate::pipeline::classifier::Classifier;
use crate::pipeline::responder::{Responder, ResponderConfig};
use crate::pipeline::types::{ClassificationResult, InboundMessage, Outcome};
use crate::store::Database;

/// Everything the pipeline produced for one message.
#[derive(Debug)]
pub struct PipelineReply {
    pub reply_text: String,
    pub classification: Outcome<ClassificationResult>,
    pub customer: Outcome<ResolvedCustomer>,
    /// True when the responder fell back to the fixed reply.
    pub reply_fallback: bool,
    /// True when the interaction record was written.
    pub logged: bool,
}

/// The four-stage intake pipeline, with its collaborators injected.
///
/// Holds no per-request state; one instance serves concurrent requests.
pub struct IntakePipeline {
    classifier: Classifier,
    resolver: CustomerResolver,
    responder: Responder,
    logger: InteractionLogger,
}

impl IntakePipeline {
    pub fn new(llm: Arc<dyn LlmProvider>, store: Arc<dyn Database>, config: PipelineConfig) -> Self {
        let responder_config = ResponderConfig {
            business: config.business,
            temperature: config.reply_temperature,
            max_tokens: config.reply_max_tokens,
        };
        Self {
            classifier: Classifier::new(Arc::clone(&llm))
                .with_temperature(config.classify_temperature),
            resolver: CustomerResolver::new(Arc::clone(&store)),
            responder: Responder::new(llm, responder_config),
            logger: InteractionLogger::new(store),
        }
    }

    /// Run the full pipeline for one message.
    pub async fn handle(&self, message: InboundMessage) -> PipelineReply {
        info!(
            channel_address = %message.channel_address,
            body = %message.body,
            "Received SMS"
        );

        let classification = self.classifier.classify(&message.body).await;
        let analysis = classification.value();

        let customer = self
            .resolver
            .resolve(&message.channel_address, analysis.name_extracted.as_deref())
            .await;

        let reply = self
            .responder
            .generate_reply(
                &message.body,
                analysis.detected_language,
                customer.value().name(),
                analysis.booking_intent,
            )
            .await;
        let reply_fallback = reply.is_fallback();
        let reply_text = reply.into_value();

        let logged = self
            .logger
            .record(&message.channel_address, &message.body, analysis, &reply_text)
            .await;

        info!(
            channel_address = %message.channel_address,
            classification = classification.label(),
            customer = customer.label(),
            reply_fallback,
            logged,
            "SMS handled"
        );

        PipelineReply {
            reply_text,
            classification,
            customer,
            reply_fallback,
            logged,
        }
    }

    /// Transport-facing entry point: address and body in, reply text out.
    pub async fn reply(&self, from_address: &str, body: &str) -> String {
        self.handle(InboundMessage::new(from_address, body))
            .await
            .reply_text
    }
}

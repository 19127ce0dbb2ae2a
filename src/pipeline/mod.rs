//! SMS intake pipeline.
//!
//! Every inbound message flows through:
//! 1. `Classifier::classify()`: language, booking intent, name (LLM)
//! 2. `CustomerResolver::resolve()`: durable customer identity
//! 3. `Responder::generate_reply()`: reply in the detected language (LLM)
//! 4. `InteractionLogger::record()`: append-only audit record
//!
//! **A reply is always produced.** Each stage has a fallback value.

pub mod classifier;
pub mod processor;
pub mod responder;
pub mod types;

pub use classifier::Classifier;
pub use processor::{IntakePipeline, PipelineReply};
pub use responder::{FALLBACK_REPLY, Responder};
pub use types::{ClassificationResult, InboundMessage, Language, Outcome};

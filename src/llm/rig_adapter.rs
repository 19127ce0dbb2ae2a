//! Bridge from rig-core's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, Message};
use rust_decimal::Decimal;

use super::costs::model_cost;
use super::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};
use crate::error::LlmError;

/// Wraps any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// rig wants a preamble, a prompt and history; we carry a flat message list.
///
/// The first system message becomes the preamble, the final user message the
/// prompt, and everything in between the history.
fn split_messages(messages: Vec<ChatMessage>) -> (Option<String>, Vec<Message>, String) {
    let mut preamble: Option<String> = None;
    let mut turns = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System if preamble.is_none() => preamble = Some(msg.content),
            Role::System => {
                // Later system messages are folded into the preamble.
                if let Some(p) = preamble.as_mut() {
                    p.push_str("\n\n");
                    p.push_str(&msg.content);
                }
            }
            Role::User | Role::Assistant => turns.push(msg),
        }
    }

    let prompt = match turns.last() {
        Some(last) if last.role == Role::User => turns.pop().map(|m| m.content).unwrap_or_default(),
        _ => String::new(),
    };

    let history = turns
        .into_iter()
        .map(|m| match m.role {
            Role::Assistant => Message::assistant(m.content),
            _ => Message::user(m.content),
        })
        .collect();

    (preamble, history, prompt)
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        model_cost(&self.model_name)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (preamble, history, prompt) = split_messages(request.messages);

        let mut builder = self.model.completion_request(Message::user(prompt));
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if !history.is_empty() {
            builder = builder.messages(history);
        }
        if let Some(t) = request.temperature {
            builder = builder.temperature(t as f64);
        }
        if let Some(max) = request.max_tokens {
            builder = builder.max_tokens(max as u64);
        }

        let response = builder.send().await.map_err(|e| {
            let reason = e.to_string();
            if reason.contains("429") {
                LlmError::RateLimited {
                    provider: self.model_name.clone(),
                    retry_after: None,
                }
            } else if reason.contains("401") || reason.contains("403") {
                LlmError::AuthFailed {
                    provider: self.model_name.clone(),
                }
            } else {
                LlmError::RequestFailed {
                    provider: self.model_name.clone(),
                    reason,
                }
            }
        })?;

        let texts: Vec<String> = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect();
        if texts.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "response carried no text content".to_string(),
            });
        }
        let content = texts.join("");

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens as u32,
            output_tokens: response.usage.output_tokens as u32,
        })
    }
}

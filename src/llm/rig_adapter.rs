//! Bridges rig-core's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::CompletionModel;
use rig::message::{AssistantContent, Message};
use rust_decimal::Decimal;

use crate::error::LlmError;
use crate::llm::costs;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

/// Adapter from a concrete rig completion model to `LlmProvider`.
pub struct RigAdapter<M: CompletionModel> {
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

    /// Provider label for error messages, derived from the model name.
    fn provider_label(&self) -> &'static str {
        if self.model_name.starts_with("claude") {
            "anthropic"
        } else if self.model_name.starts_with("gpt") || self.model_name.starts_with("o1") {
            "openai"
        } else {
            "llm"
        }
    }
}

#[async_trait]
impl<M: CompletionModel + 'static> LlmProvider for RigAdapter<M> {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        costs::per_token(&self.model_name)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        // rig wants history + a trailing prompt; peel the last user message off.
        let mut messages = request.messages;
        let prompt = match messages.iter().rposition(|m| m.role == Role::User) {
            Some(pos) => messages.remove(pos).content,
            None => {
                return Err(LlmError::RequestFailed {
                    provider: self.provider_label().to_string(),
                    reason: "request has no user message".to_string(),
                });
            }
        };

        let mut preamble: Option<String> = None;
        let mut history: Vec<Message> = Vec::new();
        for msg in messages {
            match msg.role {
                Role::System => {
                    preamble = Some(match preamble {
                        Some(existing) => format!("{existing}\n\n{}", msg.content),
                        None => msg.content,
                    });
                }
                Role::User => history.push(Message::user(msg.content)),
                Role::Assistant => history.push(Message::assistant(msg.content)),
            }
        }

        let mut builder = self.model.completion_request(prompt);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if !history.is_empty() {
            builder = builder.messages(history);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature as f64);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens as u64);
        }

        let response = self.model.completion(builder.build()).await.map_err(|e| {
            LlmError::RequestFailed {
                provider: self.provider_label().to_string(),
                reason: e.to_string(),
            }
        })?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|part| match part {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider_label().to_string(),
                reason: "completion contained no text".to_string(),
            });
        }

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens as u32,
            output_tokens: response.usage.output_tokens as u32,
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }
}

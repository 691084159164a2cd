//! Reasoning engine seam and the LLM-backed implementation

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use super::action::{AgentAction, ToolInvocationRequest};
use super::conversation::Conversation;
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, ToolDefinition};

/// Decides the next action for a conversation
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn decide(&self, conversation: &Conversation, tools: &[ToolDefinition]) -> Result<AgentAction, LlmError>;
}

/// Reasoning engine backed by an `LlmClient`
pub struct LlmReasoner<C: LlmClient> {
    client: Arc<C>,
    max_tokens: u32,
    temperature: f32,
}

impl<C: LlmClient> LlmReasoner<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            max_tokens: crate::llm::anthropic::DEFAULT_MAX_TOKENS,
            temperature: 0.0,
        }
    }

    pub fn with_limits(client: Arc<C>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            client,
            max_tokens,
            temperature,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn build_request(&self, conversation: &Conversation, tools: &[ToolDefinition]) -> CompletionRequest {
        let mut request = CompletionRequest::new(conversation.system_prompt())
            .with_tools(tools.to_vec())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);
        request.messages = conversation.messages();
        request
    }
}

#[async_trait]
impl<C: LlmClient> ReasoningEngine for LlmReasoner<C> {
    async fn decide(&self, conversation: &Conversation, tools: &[ToolDefinition]) -> Result<AgentAction, LlmError> {
        let request = self.build_request(conversation, tools);
        let response = self.client.complete(request).await?;
        debug!(
            "Engine replied: stop_reason={:?} tool_calls={} malformed={} tokens={}",
            response.stop_reason,
            response.tool_calls.len(),
            response.malformed.len(),
            response.usage.total()
        );
        Ok(classify_response(response))
    }
}

/// Turn a completion into exactly one action
///
/// Only the first tool call is honoured; any others in the same reply are
/// dropped and the engine can ask again on the next iteration.
pub fn classify_response(response: CompletionResponse) -> AgentAction {
    let CompletionResponse {
        content,
        tool_calls,
        malformed,
        stop_reason,
        ..
    } = response;

    if let Some(call) = tool_calls.into_iter().next() {
        return match call.input {
            Value::Object(args) => {
                AgentAction::ToolCall(ToolInvocationRequest::new(call.id, call.name, args).with_note(content))
            }
            other => AgentAction::unparseable(
                content,
                format!("arguments for {} must be a JSON object, got {}", call.name, other),
            ),
        };
    }

    if !malformed.is_empty() {
        return AgentAction::unparseable(content, malformed.join("; "));
    }

    if stop_reason == StopReason::MaxTokens {
        return AgentAction::unparseable(content, "the reply was cut off at the token limit");
    }

    if content.trim().is_empty() {
        return AgentAction::unparseable(content, "the reply was empty");
    }

    AgentAction::final_answer(content.trim())
}

//! Per-query conversation state and its replay as engine messages

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::ToolInvocationRequest;
use crate::llm::Message;
use crate::tools::ToolInvocationResult;

/// Placeholder for an assistant turn that carried no text
const EMPTY_REPLY: &str = "(empty reply)";

/// One recorded iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ExecutionStep {
    ToolCall {
        request: ToolInvocationRequest,
        result: ToolInvocationResult,
    },
    Unparseable {
        raw: String,
        hint: String,
    },
}

impl ExecutionStep {
    /// Messages this step contributes when the conversation is replayed
    fn replay(&self) -> [Message; 2] {
        match self {
            ExecutionStep::ToolCall { request, result } => [
                Message::tool_use(&request.id, &request.name, Value::Object(request.args.clone())),
                Message::tool_result(&request.id, result.text(), result.is_error()),
            ],
            ExecutionStep::Unparseable { raw, hint } => {
                let said = if raw.trim().is_empty() { EMPTY_REPLY } else { raw.as_str() };
                [Message::assistant(said), Message::user(hint)]
            }
        }
    }

    pub fn tool_name(&self) -> Option<&str> {
        match self {
            ExecutionStep::ToolCall { request, .. } => Some(&request.name),
            ExecutionStep::Unparseable { .. } => None,
        }
    }
}

/// Ordered, append-only record of a query's steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scratchpad {
    steps: Vec<ExecutionStep>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: ExecutionStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_steps(self) -> Vec<ExecutionStep> {
        self.steps
    }
}

/// System prompt, user query and scratchpad for one query
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    system_prompt: String,
    query: String,
    scratchpad: Scratchpad,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            query: query.into(),
            scratchpad: Scratchpad::new(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn scratchpad(&self) -> &Scratchpad {
        &self.scratchpad
    }

    pub fn record(&mut self, step: ExecutionStep) {
        self.scratchpad.push(step);
    }

    pub fn into_scratchpad(self) -> Scratchpad {
        self.scratchpad
    }

    /// Query followed by every step, in order
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(1 + self.scratchpad.len() * 2);
        messages.push(Message::user(&self.query));
        for step in self.scratchpad.steps() {
            messages.extend(step.replay());
        }
        messages
    }
}

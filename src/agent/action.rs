//! Engine decisions and the loop states they lead to

use serde::{Deserialize, Serialize};

use crate::tools::ToolArgs;

/// A tool call requested by the reasoning engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    /// Engine-assigned call id, echoed back with the observation
    pub id: String,
    pub name: String,
    pub args: ToolArgs,
    /// Text the engine wrote alongside the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ToolInvocationRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
            note: None,
        }
    }

    /// Attach accompanying text; blank text is dropped
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        let note = note.into();
        let trimmed = note.trim();
        self.note = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }
}

/// Exactly one decision per engine round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentAction {
    FinalAnswer { text: String },
    ToolCall(ToolInvocationRequest),
    /// The reply could not be read as either of the above
    Unparseable { raw: String, reason: String },
}

/// How a query ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    Answered,
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    AwaitingAction,
    ToolExecuting,
    Terminal(Terminal),
}

impl AgentAction {
    pub fn final_answer(text: impl Into<String>) -> Self {
        AgentAction::FinalAnswer { text: text.into() }
    }

    pub fn unparseable(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        AgentAction::Unparseable {
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    /// State the loop moves to after receiving this action
    pub fn next_state(&self) -> LoopState {
        match self {
            AgentAction::FinalAnswer { .. } => LoopState::Terminal(Terminal::Answered),
            AgentAction::ToolCall(_) => LoopState::ToolExecuting,
            AgentAction::Unparseable { .. } => LoopState::AwaitingAction,
        }
    }

    /// Free text carried by the action, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            AgentAction::FinalAnswer { text } => Some(text),
            AgentAction::ToolCall(request) => request.note.as_deref(),
            AgentAction::Unparseable { raw, .. } if !raw.trim().is_empty() => Some(raw),
            AgentAction::Unparseable { .. } => None,
        }
    }
}

impl LoopState {
    /// State after an action has been handled in iteration `iteration` of `max_iterations`
    pub fn after(self, iteration: u32, max_iterations: u32) -> LoopState {
        match self {
            LoopState::Terminal(t) => LoopState::Terminal(t),
            _ if iteration >= max_iterations => LoopState::Terminal(Terminal::Incomplete),
            _ => LoopState::AwaitingAction,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Terminal(_))
    }
}

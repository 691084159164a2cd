//! Bounded reason/act loop
//!
//! Each query starts from a fresh conversation. Every engine round trip
//! yields one action; tool calls and unreadable replies are recorded in the
//! scratchpad and replayed on the next round trip. The loop stops on a final
//! answer or when the iteration ceiling is reached.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::action::{AgentAction, LoopState, Terminal};
use super::conversation::{Conversation, ExecutionStep};
use super::reasoner::ReasoningEngine;
use crate::error::Result;
use crate::tools::{ToolArgs, ToolInvocationResult, ToolRegistry};

pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AWS assistant with tools to query AWS services like S3, EC2, \
     and IAM resources. Provide clear, concise answers.";

/// Sent back to the engine after a reply it must rephrase
const CORRECTION_HINT: &str = "Call exactly one of the available tools with a JSON object of arguments, \
     or reply with your final answer as plain text.";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Engine round trips allowed per query
    pub max_iterations: u32,
    pub system_prompt: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Result of running one query to a terminal state
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Answered {
        answer: String,
        steps: Vec<ExecutionStep>,
        iterations: u32,
    },
    Incomplete {
        /// Latest non-empty free text the engine produced
        partial: Option<String>,
        steps: Vec<ExecutionStep>,
        iterations: u32,
    },
}

impl QueryOutcome {
    pub fn terminal(&self) -> Terminal {
        match self {
            QueryOutcome::Answered { .. } => Terminal::Answered,
            QueryOutcome::Incomplete { .. } => Terminal::Incomplete,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, QueryOutcome::Answered { .. })
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        match self {
            QueryOutcome::Answered { steps, .. } | QueryOutcome::Incomplete { steps, .. } => steps,
        }
    }

    /// Engine round trips consumed
    pub fn iterations(&self) -> u32 {
        match self {
            QueryOutcome::Answered { iterations, .. } | QueryOutcome::Incomplete { iterations, .. } => *iterations,
        }
    }

    /// Text shown to the operator
    pub fn display_text(&self) -> String {
        match self {
            QueryOutcome::Answered { answer, .. } => answer.clone(),
            QueryOutcome::Incomplete {
                partial, iterations, ..
            } => {
                let notice = format!("Unable to complete the request within {iterations} steps.");
                match partial {
                    Some(text) => format!("{notice}\nLast response: {text}"),
                    None => notice,
                }
            }
        }
    }
}

/// Drives one query through the engine and the tool registry
pub struct ExecutionLoop<E: ReasoningEngine> {
    engine: Arc<E>,
    registry: Arc<ToolRegistry>,
    config: LoopConfig,
}

impl<E: ReasoningEngine> ExecutionLoop<E> {
    pub fn new(engine: Arc<E>, registry: Arc<ToolRegistry>) -> Self {
        Self::with_config(engine, registry, LoopConfig::default())
    }

    pub fn with_config(engine: Arc<E>, registry: Arc<ToolRegistry>, config: LoopConfig) -> Self {
        Self {
            engine,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run a query until the engine answers or the ceiling is reached
    ///
    /// Engine transport errors are returned; tool failures never are.
    pub async fn run(&self, query: &str) -> Result<QueryOutcome> {
        let mut conversation = Conversation::new(&self.config.system_prompt, query);
        let tools = self.registry.definitions();
        let mut partial: Option<String> = None;
        let mut iteration = 0;
        let mut state = LoopState::AwaitingAction.after(iteration, self.config.max_iterations);

        while !state.is_terminal() {
            iteration += 1;
            let action = self.engine.decide(&conversation, &tools).await?;
            debug!(iteration, state = ?action.next_state(), "engine decided");

            if let Some(text) = action.text() {
                partial = Some(text.to_string());
            }

            state = match action {
                AgentAction::FinalAnswer { text } => {
                    info!(iteration, "query answered");
                    return Ok(QueryOutcome::Answered {
                        answer: text,
                        steps: conversation.into_scratchpad().into_steps(),
                        iterations: iteration,
                    });
                }
                AgentAction::ToolCall(request) => {
                    let result = self.dispatch(&request.name, &request.args).await;
                    info!(
                        iteration,
                        tool = %request.name,
                        failed = result.is_error(),
                        "tool invoked"
                    );
                    conversation.record(ExecutionStep::ToolCall { request, result });
                    LoopState::ToolExecuting
                }
                AgentAction::Unparseable { raw, reason } => {
                    warn!(iteration, %reason, "engine reply could not be used");
                    conversation.record(ExecutionStep::Unparseable {
                        raw,
                        hint: format!("Your previous reply could not be used: {reason}. {CORRECTION_HINT}"),
                    });
                    LoopState::AwaitingAction
                }
            }
            .after(iteration, self.config.max_iterations);
        }

        info!(iteration, "iteration ceiling reached");
        Ok(QueryOutcome::Incomplete {
            partial,
            steps: conversation.into_scratchpad().into_steps(),
            iterations: iteration,
        })
    }

    async fn dispatch(&self, name: &str, args: &ToolArgs) -> ToolInvocationResult {
        if self.registry.lookup(name).is_err() {
            return ToolInvocationResult::failure(format!(
                "Unknown tool: {name}. Available tools: {}",
                self.registry.names().join(", ")
            ));
        }
        self.registry.invoke(name, args).await
    }
}

//! Agent module - the bounded reason/act cycle
//!
//! This module provides:
//! - AgentAction, the single decision made per engine round trip
//! - Conversation and Scratchpad, replayed to the engine each round trip
//! - ReasoningEngine trait and the LLM-backed LlmReasoner
//! - ExecutionLoop, which drives a query to Answered or Incomplete

mod action;
mod conversation;
mod execution;
mod reasoner;

pub use action::{AgentAction, LoopState, Terminal, ToolInvocationRequest};
pub use conversation::{Conversation, ExecutionStep, Scratchpad};
pub use execution::{DEFAULT_MAX_ITERATIONS, DEFAULT_SYSTEM_PROMPT, ExecutionLoop, LoopConfig, QueryOutcome};
pub use reasoner::{LlmReasoner, ReasoningEngine, classify_response};

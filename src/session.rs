//! Interactive question/answer session
//!
//! Reads one query per line, drives it through the execution loop and prints
//! the result. A failing or panicking query is reported and the session moves
//! on to the next line.

use std::any::Any;
use std::io::{self, Write};
use std::panic::AssertUnwindSafe;

use colored::*;
use futures::FutureExt;
use log::{error, info, warn};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::agent::{ExecutionLoop, QueryOutcome, ReasoningEngine};

const PROMPT: &str = "You: ";

/// Counts of how each query in a session ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub queries: usize,
    pub answered: usize,
    pub incomplete: usize,
    pub failed: usize,
}

/// What a line of input asks for
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Exit,
    Empty,
    Query(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Input::Empty
    } else if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        Input::Exit
    } else {
        Input::Query(trimmed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct InteractiveSession<E: ReasoningEngine> {
    execution: ExecutionLoop<E>,
    environment_label: String,
}

impl<E: ReasoningEngine> InteractiveSession<E> {
    pub fn new(execution: ExecutionLoop<E>, environment_label: impl Into<String>) -> Self {
        Self {
            execution,
            environment_label: environment_label.into(),
        }
    }

    fn banner<W: Write>(&self, output: &mut W) -> io::Result<()> {
        writeln!(output)?;
        writeln!(output, "{}", format!("Skyquery ({})", self.environment_label).bold())?;
        writeln!(output, "{}", "-".repeat(50))?;
        writeln!(output, "Type 'exit' to quit.")?;
        writeln!(output)
    }

    /// Run until an exit sentinel or end of input
    pub async fn run<R, W>(&self, mut input: R, output: &mut W) -> io::Result<SessionSummary>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut summary = SessionSummary::default();
        let mut buf = Vec::new();

        self.banner(output)?;

        loop {
            write!(output, "{}", PROMPT.green().bold())?;
            output.flush()?;

            buf.clear();
            if input.read_until(b'\n', &mut buf).await? == 0 {
                writeln!(output)?;
                info!("Input closed, ending session");
                break;
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Skipping unreadable input line: {}", e);
                    writeln!(output, "{} input is not valid UTF-8 ({})", "Error:".red(), e)?;
                    continue;
                }
            };

            match classify(line) {
                Input::Exit => {
                    writeln!(output, "\nExiting session.")?;
                    break;
                }
                Input::Empty => {
                    writeln!(output, "\n{}", "Please enter a valid query.".yellow())?;
                }
                Input::Query(query) => {
                    summary.queries += 1;
                    self.answer(query, output, &mut summary).await?;
                }
            }
        }

        info!(
            "Session ended: {} queries, {} answered, {} incomplete, {} failed",
            summary.queries, summary.answered, summary.incomplete, summary.failed
        );
        Ok(summary)
    }

    async fn answer<W: Write>(&self, query: &str, output: &mut W, summary: &mut SessionSummary) -> io::Result<()> {
        info!("Query: {}", query);
        let result = AssertUnwindSafe(self.execution.run(query)).catch_unwind().await;

        match result {
            Ok(Ok(outcome)) => {
                info!("Query finished: {:?} after {} round trips", outcome.terminal(), outcome.iterations());
                match &outcome {
                    QueryOutcome::Answered { .. } => summary.answered += 1,
                    QueryOutcome::Incomplete { .. } => summary.incomplete += 1,
                }
                writeln!(output, "\n{}\n", outcome.display_text())
            }
            Ok(Err(e)) => {
                summary.failed += 1;
                error!("Query failed: {}", e);
                writeln!(output, "{} {}", "Error:".red(), e)
            }
            Err(payload) => {
                summary.failed += 1;
                let message = panic_message(payload.as_ref());
                error!("Query panicked: {}", message);
                writeln!(output, "{} query aborted: {}", "Error:".red(), message)
            }
        }
    }
}

//! Browsing agent abstraction and its bounded execution.
//!
//! The orchestrator only sees [`BrowserAgent`]: an opaque capability that takes
//! a task and produces a final result, appending its steps to a shared
//! [`Transcript`] as it goes. [`AgentExecutor`] wraps any agent with a hard
//! wall-clock timeout. [`LlmBrowserAgent`] is the production agent, an
//! OpenAI-compatible tool-calling loop over plain HTTP page fetches.

mod executor;
mod runner;
mod tools;

pub use executor::{AgentExecutor, AgentFailure, AgentOutcome, RawRunResult, TimeoutOutcome};
pub use runner::LlmBrowserAgent;
pub use tools::{parse_tool_call, tool_definitions, BrowserTool, PageFetcher};

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// An autonomous agent that carries out a natural-language task.
#[async_trait]
pub trait BrowserAgent: Send + Sync {
    /// Run the task to completion.
    ///
    /// Steps are appended to `transcript` while running so that a run cut short
    /// by a timeout still leaves a record of what happened.
    async fn run(&self, task: &str, transcript: &Transcript) -> Result<AgentRun>;
}

/// What an agent reports when it returns.
#[derive(Debug, Clone, Default)]
pub struct AgentRun {
    /// Final textual result, if the agent produced one.
    pub final_output: Option<String>,
    /// The agent signalled completion.
    pub is_done: bool,
    /// The agent judged its own run successful.
    pub is_successful: bool,
    /// Non-fatal errors hit along the way (failed page loads and the like).
    pub errors: Vec<String>,
}

impl AgentRun {
    /// A completed run with the given output.
    pub fn finished(output: impl Into<String>, is_successful: bool) -> Self {
        Self {
            final_output: Some(output.into()),
            is_done: true,
            is_successful,
            errors: Vec::new(),
        }
    }
}

/// One step of an agent run.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub step: usize,
    pub action: String,
    pub result: String,
    pub at: DateTime<Utc>,
}

impl std::fmt::Display for StepRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] step {}: {}\n{}",
            self.at.format("%H:%M:%S"),
            self.step,
            self.action,
            self.result
        )
    }
}

/// Shared, append-only step log for a single run.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    steps: Arc<Mutex<Vec<StepRecord>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn record(&self, step: usize, action: impl Into<String>, result: impl Into<String>) {
        let record = StepRecord {
            step,
            action: action.into(),
            result: result.into(),
            at: Utc::now(),
        };
        self.lock().push(record);
    }

    /// Copy of all steps recorded so far.
    pub fn snapshot(&self) -> Vec<StepRecord> {
        self.lock().clone()
    }

    /// Number of distinct steps recorded so far.
    pub fn step_count(&self) -> usize {
        count_steps(&self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StepRecord>> {
        // A panic while holding the lock cannot leave a Vec half-pushed.
        self.steps.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Distinct step numbers in a step log; one step may record several actions.
pub(crate) fn count_steps(steps: &[StepRecord]) -> usize {
    let mut numbers: Vec<usize> = steps.iter().map(|s| s.step).collect();
    numbers.dedup();
    numbers.len()
}

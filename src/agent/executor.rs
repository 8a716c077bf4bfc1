//! Bounded execution of a browsing agent.

use super::{count_steps, BrowserAgent, StepRecord, Transcript};
use crate::models::ExecutionStats;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Output of an agent run that finished inside its budget.
#[derive(Debug, Clone)]
pub struct RawRunResult {
    /// Final agent output; empty when the agent returned nothing.
    pub output: String,
    pub stats: ExecutionStats,
    pub errors: Vec<String>,
    pub transcript: Vec<StepRecord>,
}

/// The agent was cancelled at the end of its budget.
#[derive(Debug, Clone)]
pub struct TimeoutOutcome {
    /// Steps recorded before cancellation.
    pub transcript: Vec<StepRecord>,
    pub elapsed: Duration,
}

impl TimeoutOutcome {
    pub fn stats(&self) -> ExecutionStats {
        ExecutionStats {
            total_steps: count_steps(&self.transcript),
            duration_seconds: self.elapsed.as_secs_f64(),
            is_done: false,
            is_successful: false,
        }
    }
}

/// The agent failed or stopped without completing.
#[derive(Debug, Clone)]
pub struct AgentFailure {
    pub message: String,
    pub stats: Option<ExecutionStats>,
    pub transcript: Vec<StepRecord>,
}

/// Result of one bounded agent run.
#[derive(Debug, Clone)]
pub enum AgentOutcome {
    Completed(RawRunResult),
    TimedOut(TimeoutOutcome),
    Failed(AgentFailure),
}

impl AgentOutcome {
    /// Steps recorded during the run, whatever its outcome.
    pub fn transcript(&self) -> &[StepRecord] {
        match self {
            AgentOutcome::Completed(r) => &r.transcript,
            AgentOutcome::TimedOut(t) => &t.transcript,
            AgentOutcome::Failed(f) => &f.transcript,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgentOutcome::Completed(_) => "completed",
            AgentOutcome::TimedOut(_) => "timed out",
            AgentOutcome::Failed(_) => "failed",
        }
    }
}

/// Runs an agent under a hard wall-clock timeout.
///
/// Each call is a single attempt with its own timer; there is no retry and no
/// state shared between runs.
#[derive(Clone)]
pub struct AgentExecutor {
    agent: Arc<dyn BrowserAgent>,
}

impl AgentExecutor {
    pub fn new(agent: Arc<dyn BrowserAgent>) -> Self {
        Self { agent }
    }

    /// Run `task`, cancelling the agent once `budget` has elapsed.
    #[instrument(skip(self, task), fields(budget_secs = budget.as_secs_f64()))]
    pub async fn run(&self, task: &str, budget: Duration) -> AgentOutcome {
        let transcript = Transcript::new();
        let started = Instant::now();

        let result = tokio::time::timeout(budget, self.agent.run(task, &transcript)).await;
        let elapsed = started.elapsed();
        let steps = transcript.step_count();

        match result {
            Err(_) => {
                warn!("Agent cancelled after {:.1}s ({} steps)", elapsed.as_secs_f64(), steps);
                AgentOutcome::TimedOut(TimeoutOutcome {
                    transcript: transcript.snapshot(),
                    elapsed,
                })
            }
            Ok(Err(e)) => {
                warn!("Agent failed after {:.1}s: {}", elapsed.as_secs_f64(), e);
                AgentOutcome::Failed(AgentFailure {
                    message: e.to_string(),
                    stats: Some(ExecutionStats {
                        total_steps: steps,
                        duration_seconds: elapsed.as_secs_f64(),
                        is_done: false,
                        is_successful: false,
                    }),
                    transcript: transcript.snapshot(),
                })
            }
            Ok(Ok(run)) if !run.is_done => {
                warn!("Agent stopped after {} steps without finishing", steps);
                let mut message = format!("agent stopped after {} steps without finishing", steps);
                if let Some(last) = run.errors.last() {
                    message.push_str(&format!(": {}", last));
                }
                AgentOutcome::Failed(AgentFailure {
                    message,
                    stats: Some(ExecutionStats {
                        total_steps: steps,
                        duration_seconds: elapsed.as_secs_f64(),
                        is_done: false,
                        is_successful: run.is_successful,
                    }),
                    transcript: transcript.snapshot(),
                })
            }
            Ok(Ok(run)) => {
                info!(
                    "Agent finished in {:.1}s ({} steps, successful: {})",
                    elapsed.as_secs_f64(),
                    steps,
                    run.is_successful
                );
                AgentOutcome::Completed(RawRunResult {
                    output: run.final_output.unwrap_or_default(),
                    stats: ExecutionStats {
                        total_steps: steps,
                        duration_seconds: elapsed.as_secs_f64(),
                        is_done: true,
                        is_successful: run.is_successful,
                    },
                    errors: run.errors,
                    transcript: transcript.snapshot(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRun;
    use crate::error::{GigscoutError, Result};
    use async_trait::async_trait;

    struct Finishing;

    #[async_trait]
    impl BrowserAgent for Finishing {
        async fn run(&self, _task: &str, transcript: &Transcript) -> Result<AgentRun> {
            transcript.record(1, "open_page", "results");
            transcript.record(2, "done", "[]");
            Ok(AgentRun::finished("[]", true))
        }
    }

    /// Records a step, then never returns.
    struct Hanging;

    #[async_trait]
    impl BrowserAgent for Hanging {
        async fn run(&self, _task: &str, transcript: &Transcript) -> Result<AgentRun> {
            transcript.record(1, "open_page", "loading");
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    struct Erroring;

    #[async_trait]
    impl BrowserAgent for Erroring {
        async fn run(&self, _task: &str, _transcript: &Transcript) -> Result<AgentRun> {
            Err(GigscoutError::Fetch("www.showstart.com unreachable".to_string()))
        }
    }

    struct GivingUp;

    #[async_trait]
    impl BrowserAgent for GivingUp {
        async fn run(&self, _task: &str, transcript: &Transcript) -> Result<AgentRun> {
            transcript.record(1, "open_page", "error");
            Ok(AgentRun {
                errors: vec!["HTTP 503".to_string()],
                ..AgentRun::default()
            })
        }
    }

    fn executor(agent: impl BrowserAgent + 'static) -> AgentExecutor {
        AgentExecutor::new(Arc::new(agent))
    }

    #[tokio::test]
    async fn test_completed_run() {
        let outcome = executor(Finishing).run("task", Duration::from_secs(5)).await;
        match outcome {
            AgentOutcome::Completed(result) => {
                assert_eq!(result.output, "[]");
                assert_eq!(result.stats.total_steps, 2);
                assert!(result.stats.is_done);
                assert!(result.stats.is_successful);
                assert_eq!(result.transcript.len(), 2);
            }
            other => panic!("expected completion, got {}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_timeout_cancels_and_keeps_partial_transcript() {
        let budget = Duration::from_millis(200);
        let started = Instant::now();
        let outcome = executor(Hanging).run("task", budget).await;
        let waited = started.elapsed();

        assert!(waited >= budget);
        assert!(waited < budget + Duration::from_secs(1));
        match outcome {
            AgentOutcome::TimedOut(timeout) => {
                assert_eq!(timeout.transcript.len(), 1);
                let stats = timeout.stats();
                assert!(!stats.is_done);
                assert_eq!(stats.total_steps, 1);
                assert!(stats.duration_seconds >= 0.2);
            }
            other => panic!("expected timeout, got {}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_agent_error_is_failure() {
        let outcome = executor(Erroring).run("task", Duration::from_secs(5)).await;
        match outcome {
            AgentOutcome::Failed(failure) => {
                assert!(failure.message.contains("unreachable"));
                assert!(!failure.stats.unwrap().is_done);
            }
            other => panic!("expected failure, got {}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_unfinished_run_is_failure() {
        let outcome = executor(GivingUp).run("task", Duration::from_secs(5)).await;
        match outcome {
            AgentOutcome::Failed(failure) => {
                assert!(failure.message.contains("without finishing"));
                assert!(failure.message.contains("HTTP 503"));
                assert_eq!(failure.stats.unwrap().total_steps, 1);
            }
            other => panic!("expected failure, got {}", other.label()),
        }
    }
}

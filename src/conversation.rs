//! Conversation transcripts written to disk after each agent run.

use crate::agent::AgentOutcome;
use crate::config::Settings;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MAX_NAME_ATTEMPTS: usize = 100;

/// Writes agent transcripts to `conversation_<performer>_<timestamp>.txt`.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    dir: PathBuf,
}

impl ConversationLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The configured log, or `None` when saving is disabled.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        settings
            .agent
            .save_conversations
            .then(|| Self::new(settings.conversation_dir()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a run for `performer` started at `started` is written to.
    pub fn path_for(&self, performer: &str, started: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!(
            "conversation_{}_{}.txt",
            file_safe(performer),
            started.format("%Y%m%d_%H%M%S")
        ))
    }

    /// Write the transcript of `outcome`. Failures are logged, never returned.
    ///
    /// The write runs on the blocking pool. A run for the same performer in
    /// the same second gets a numbered file instead of overwriting.
    pub async fn save(
        &self,
        performer: &str,
        task: &str,
        started: DateTime<Utc>,
        outcome: &AgentOutcome,
    ) -> Option<PathBuf> {
        let path = self.path_for(performer, started);
        let body = render(performer, task, started, outcome);
        let dir = self.dir.clone();

        let written =
            tokio::task::spawn_blocking(move || write_new(&dir, &path, &body)).await;
        match written {
            Ok(Ok(path)) => {
                debug!("Saved conversation to {:?}", path);
                Some(path)
            }
            Ok(Err(e)) => {
                warn!("Failed to save conversation for {}: {}", performer, e);
                None
            }
            Err(e) => {
                warn!("Conversation writer for {} did not finish: {}", performer, e);
                None
            }
        }
    }
}

/// Create `path`, or `<stem>_2.txt`, `<stem>_3.txt`... if it is taken.
fn write_new(dir: &Path, path: &Path, body: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let candidate = if attempt == 1 {
            path.to_path_buf()
        } else {
            path.with_file_name(format!("{}_{}.txt", stem, attempt))
        };

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut file) => {
                file.write_all(body.as_bytes())?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("{} names taken for {:?}", MAX_NAME_ATTEMPTS, path),
    ))
}

fn render(performer: &str, task: &str, started: DateTime<Utc>, outcome: &AgentOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "performer: {}", performer);
    let _ = writeln!(out, "started: {}", started.to_rfc3339());
    let _ = writeln!(out, "outcome: {}", outcome.label());
    let _ = writeln!(out, "\n=== task ===\n{}", task);
    let _ = writeln!(out, "\n=== steps ===");
    for step in outcome.transcript() {
        let _ = writeln!(out, "{}\n", step);
    }

    match outcome {
        AgentOutcome::Completed(result) => {
            let _ = writeln!(out, "=== final output ===\n{}", result.output);
            for error in &result.errors {
                let _ = writeln!(out, "error: {}", error);
            }
        }
        AgentOutcome::TimedOut(timeout) => {
            let _ = writeln!(out, "=== timed out after {:.1}s ===", timeout.elapsed.as_secs_f64());
        }
        AgentOutcome::Failed(failure) => {
            let _ = writeln!(out, "=== failed ===\n{}", failure.message);
        }
    }
    out
}

/// Replace characters that are unsafe in file names; keeps CJK names intact.
fn file_safe(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

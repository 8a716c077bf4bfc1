//! Search orchestration for Gigscout.
//!
//! Coordinates a single search from request validation through task
//! formulation, bounded agent execution and result parsing, and maps every
//! outcome into a [`SearchResponse`].

use crate::agent::{AgentExecutor, AgentOutcome, BrowserAgent, LlmBrowserAgent};
use crate::config::{Prompts, SearchSettings, Settings};
use crate::conversation::ConversationLog;
use crate::error::{GigscoutError, Result};
use crate::models::{SearchRequest, SearchResponse, TIMEOUT_ERROR};
use crate::parser;
use crate::task::{build_task_with, TargetSite};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Anything that can answer a performer search.
///
/// Implemented by [`SearchOrchestrator`] and by the cache and archive
/// decorators that wrap it.
#[async_trait]
pub trait PerformanceSearch: Send + Sync {
    /// Run one search.
    ///
    /// Returns `Err` only for requests rejected by validation; every other
    /// outcome, including timeouts and agent failures, is reported in-band.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse>;
}

#[async_trait]
impl<T: PerformanceSearch + ?Sized> PerformanceSearch for Arc<T> {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        (**self).search(request).await
    }
}

/// Lifecycle of one search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Created,
    Validating,
    Rejected,
    Executing,
    Parsing,
    TimedOut,
    Failed,
    Completed,
}

impl SearchPhase {
    fn can_advance_to(self, next: SearchPhase) -> bool {
        use SearchPhase::*;
        matches!(
            (self, next),
            (Created, Validating)
                | (Validating, Rejected)
                | (Validating, Executing)
                | (Executing, Parsing)
                | (Executing, TimedOut)
                | (Executing, Failed)
                | (Parsing, Completed)
                | (TimedOut, Completed)
                | (Failed, Completed)
        )
    }
}

/// Tracks the phase of a request and traces each transition.
struct PhaseTracker<'a> {
    performer: &'a str,
    phase: SearchPhase,
}

impl<'a> PhaseTracker<'a> {
    fn new(performer: &'a str) -> Self {
        Self {
            performer,
            phase: SearchPhase::Created,
        }
    }

    fn advance(&mut self, next: SearchPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "invalid search transition {:?} -> {:?}",
            self.phase,
            next
        );
        debug!("search {:?}: {:?} -> {:?}", self.performer, self.phase, next);
        self.phase = next;
    }
}

/// Request limits enforced before any agent work starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    pub max_name_length: usize,
    pub min_timeout_seconds: u64,
    pub max_timeout_seconds: u64,
}

impl From<&SearchSettings> for RequestLimits {
    fn from(search: &SearchSettings) -> Self {
        Self {
            max_name_length: search.max_name_length,
            min_timeout_seconds: search.min_timeout_seconds.max(1),
            max_timeout_seconds: search.max_timeout_seconds,
        }
    }
}

impl RequestLimits {
    /// Validate a request, returning the trimmed performer name.
    pub fn validate<'r>(&self, request: &'r SearchRequest) -> Result<&'r str> {
        let name = request.performer_name.trim();
        if name.is_empty() {
            return Err(GigscoutError::Validation(
                "rapper_name must not be empty".to_string(),
            ));
        }
        if name.chars().count() > self.max_name_length {
            return Err(GigscoutError::Validation(format!(
                "rapper_name must be at most {} characters",
                self.max_name_length
            )));
        }
        if request.timeout_seconds < self.min_timeout_seconds
            || request.timeout_seconds > self.max_timeout_seconds
        {
            return Err(GigscoutError::Validation(format!(
                "timeout_seconds must be between {} and {}",
                self.min_timeout_seconds, self.max_timeout_seconds
            )));
        }
        Ok(name)
    }
}

/// The core search component.
pub struct SearchOrchestrator {
    executor: AgentExecutor,
    prompts: Prompts,
    sites: Vec<TargetSite>,
    limits: RequestLimits,
    conversations: Option<ConversationLog>,
}

impl SearchOrchestrator {
    /// Create an orchestrator from settings, building the LLM agent.
    pub fn new(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let agent: Arc<dyn BrowserAgent> = Arc::new(LlmBrowserAgent::from_settings(settings, &prompts)?);
        info!(
            "Using {} at {} for browsing",
            settings.llm.model, settings.llm.base_url
        );

        Ok(Self::with_agent(agent, settings, prompts)
            .with_conversation_log(ConversationLog::from_settings(settings)))
    }

    /// Create an orchestrator around a custom agent.
    pub fn with_agent(agent: Arc<dyn BrowserAgent>, settings: &Settings, prompts: Prompts) -> Self {
        Self {
            executor: AgentExecutor::new(agent),
            prompts,
            sites: settings.search.sites.clone(),
            limits: RequestLimits::from(&settings.search),
            conversations: None,
        }
    }

    /// Write each run's transcript to `log`.
    pub fn with_conversation_log(mut self, log: Option<ConversationLog>) -> Self {
        self.conversations = log;
        self
    }

    pub fn sites(&self) -> &[TargetSite] {
        &self.sites
    }

    pub fn limits(&self) -> RequestLimits {
        self.limits
    }

    fn respond(
        &self,
        performer: &str,
        outcome: AgentOutcome,
        phase: &mut PhaseTracker<'_>,
        search_time: DateTime<Utc>,
    ) -> SearchResponse {
        match outcome {
            AgentOutcome::Completed(result) => {
                phase.advance(SearchPhase::Parsing);
                let performances = parser::parse(&result.output);
                if !result.errors.is_empty() {
                    debug!("Agent reported {} non-fatal errors", result.errors.len());
                }
                info!("Found {} performances for {}", performances.len(), performer);
                SearchResponse::found(performer, performances, search_time, result.stats)
            }
            AgentOutcome::TimedOut(timeout) => {
                phase.advance(SearchPhase::TimedOut);
                warn!("Search for {} timed out", performer);
                SearchResponse::failed(performer, TIMEOUT_ERROR, search_time, Some(timeout.stats()))
            }
            AgentOutcome::Failed(failure) => {
                phase.advance(SearchPhase::Failed);
                warn!("Search for {} failed: {}", performer, failure.message);
                SearchResponse::failed(performer, failure.message, search_time, failure.stats)
            }
        }
    }
}

#[async_trait]
impl PerformanceSearch for SearchOrchestrator {
    #[instrument(skip(self, request), fields(performer = %request.performer_name, timeout = request.timeout_seconds))]
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let search_time = Utc::now();
        let mut phase = PhaseTracker::new(&request.performer_name);

        phase.advance(SearchPhase::Validating);
        let validated = self.limits.validate(request).and_then(|name| {
            let task = build_task_with(&self.prompts, name, &self.sites)?;
            Ok((name, task))
        });
        let (performer, task) = match validated {
            Ok(v) => v,
            Err(e) => {
                phase.advance(SearchPhase::Rejected);
                return Err(e);
            }
        };

        phase.advance(SearchPhase::Executing);
        let outcome = self
            .executor
            .run(&task, Duration::from_secs(request.timeout_seconds))
            .await;

        if let Some(log) = &self.conversations {
            log.save(performer, &task, search_time, &outcome).await;
        }

        let response = self.respond(performer, outcome, &mut phase, search_time);
        phase.advance(SearchPhase::Completed);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentRun, Transcript};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::assert_ok;

    const KITO_OUTPUT: &str = r#"```json
{"performances": [{
    "address": "广州市荔湾区恩宁路265号3层",
    "venue": "MAOLivehouse广州（永庆坊店）",
    "date": "08月24日 19:00-08月24日 20:30",
    "guest": ["SHark米尔艾力", "LilAsian"],
    "ticket_prices": {"presale": "￥158", "regular": "￥198", "vip": "￥288"},
    "performance_url": "https://www.showstart.com/event/273756"
}]}
```"#;

    /// Returns a fixed output and counts invocations.
    struct Scripted {
        output: &'static str,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(output: &'static str) -> Arc<Self> {
            Arc::new(Self {
                output,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl BrowserAgent for Scripted {
        async fn run(&self, _task: &str, transcript: &Transcript) -> Result<AgentRun> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            transcript.record(1, "open_page(https://www.showstart.com)", "search results");
            transcript.record(2, "done(success=true)", self.output);
            Ok(AgentRun::finished(self.output, true))
        }
    }

    struct Sleeping;

    #[async_trait]
    impl BrowserAgent for Sleeping {
        async fn run(&self, _task: &str, transcript: &Transcript) -> Result<AgentRun> {
            transcript.record(1, "open_page(https://www.showstart.com)", "loading");
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(AgentRun::finished("[]", true))
        }
    }

    struct Broken;

    #[async_trait]
    impl BrowserAgent for Broken {
        async fn run(&self, _task: &str, _transcript: &Transcript) -> Result<AgentRun> {
            Err(GigscoutError::Llm("401 Unauthorized".to_string()))
        }
    }

    fn test_settings() -> Settings {
        let mut settings = Settings::default();
        settings.search.min_timeout_seconds = 1;
        settings
    }

    fn orchestrator(agent: Arc<dyn BrowserAgent>) -> SearchOrchestrator {
        SearchOrchestrator::with_agent(agent, &test_settings(), Prompts::default())
    }

    #[tokio::test]
    async fn test_found_single_show() {
        let agent = Scripted::new(KITO_OUTPUT);
        let response = assert_ok!(
            orchestrator(agent.clone())
                .search(&SearchRequest::new("kito", 300))
                .await
        );

        assert!(response.success);
        assert_eq!(response.performer_name, "kito");
        assert_eq!(response.total_count, 1);
        assert_eq!(response.total_count, response.performances.len());

        let record = &response.performances[0];
        assert_eq!(record.venue, "MAOLivehouse广州（永庆坊店）");
        let tiers: Vec<(&str, &str)> = record.ticket_prices.iter().collect();
        assert_eq!(
            tiers,
            vec![("presale", "￥158"), ("regular", "￥198"), ("vip", "￥288")]
        );

        let stats = response.execution_stats.unwrap();
        assert_eq!(stats.total_steps, 2);
        assert!(stats.is_done);
        assert!(response.error.is_none());
        assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_reported_in_band() {
        let started = std::time::Instant::now();
        let response = assert_ok!(
            orchestrator(Arc::new(Sleeping))
                .search(&SearchRequest::new("kito", 1))
                .await
        );

        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("timeout"));
        assert!(response.is_timeout());
        assert_eq!(response.total_count, 0);
        assert!(response.performances.is_empty());
        let stats = response.execution_stats.unwrap();
        assert!(!stats.is_done);
        assert_eq!(stats.total_steps, 1);
    }

    #[tokio::test]
    async fn test_empty_name_rejected_before_agent_runs() {
        let agent = Scripted::new(KITO_OUTPUT);
        let search = orchestrator(agent.clone());

        for name in ["", "   "] {
            let err = search
                .search(&SearchRequest::new(name, 300))
                .await
                .unwrap_err();
            assert!(err.is_validation());
        }
        assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_limits_rejected() {
        let agent = Scripted::new(KITO_OUTPUT);
        let search = orchestrator(agent.clone());

        let long_name = "名".repeat(51);
        assert!(search
            .search(&SearchRequest::new(long_name, 300))
            .await
            .unwrap_err()
            .is_validation());
        assert_ok!(search.search(&SearchRequest::new("名".repeat(50), 300)).await);

        for timeout in [0, 601] {
            assert!(search
                .search(&SearchRequest::new("kito", timeout))
                .await
                .unwrap_err()
                .is_validation());
        }
        assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_agent_failure_has_diagnostic() {
        let response = assert_ok!(
            orchestrator(Arc::new(Broken))
                .search(&SearchRequest::new("kito", 60))
                .await
        );

        assert!(!response.success);
        assert!(response.performances.is_empty());
        assert_eq!(response.total_count, 0);
        assert!(response.error.unwrap().contains("401 Unauthorized"));
        assert!(!response.execution_stats.unwrap().is_done);
    }

    #[tokio::test]
    async fn test_unparseable_output_is_empty_success() {
        let response = assert_ok!(
            orchestrator(Scripted::new("Sorry, I could not find any upcoming shows."))
                .search(&SearchRequest::new("kito", 60))
                .await
        );

        assert!(response.success);
        assert_eq!(response.total_count, 0);
        assert!(response.performances.is_empty());
    }

    #[tokio::test]
    async fn test_name_is_trimmed_in_response() {
        let response = assert_ok!(
            orchestrator(Scripted::new(KITO_OUTPUT))
                .search(&SearchRequest::new("  kito ", 60))
                .await
        );
        assert_eq!(response.performer_name, "kito");
    }

    #[tokio::test]
    async fn test_conversation_saved() {
        let dir = tempfile::tempdir().unwrap();
        let search = orchestrator(Scripted::new(KITO_OUTPUT))
            .with_conversation_log(Some(ConversationLog::new(dir.path())));

        assert_ok!(search.search(&SearchRequest::new("kito", 60)).await);

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let name = files[0].as_ref().unwrap().file_name();
        assert!(name.to_string_lossy().starts_with("conversation_kito_"));
    }

    #[test]
    fn test_phase_transitions() {
        use SearchPhase::*;
        assert!(Created.can_advance_to(Validating));
        assert!(Validating.can_advance_to(Rejected));
        assert!(Executing.can_advance_to(TimedOut));
        assert!(TimedOut.can_advance_to(Completed));
        assert!(!Created.can_advance_to(Executing));
        assert!(!Rejected.can_advance_to(Executing));
        assert!(!Parsing.can_advance_to(Failed));
    }
}

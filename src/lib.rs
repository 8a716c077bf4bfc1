//! Gigscout - live show search driven by a browsing agent
//!
//! Given a performer's name, Gigscout hands an LLM-driven browsing agent a
//! natural-language task, bounds the run with a timeout, and turns whatever
//! the agent reports into a normalized list of upcoming shows.
//!
//! # Architecture
//!
//! - `task` - Task text formulation from a performer and target sites
//! - `agent` - Browsing agent trait, the LLM tool loop, and bounded execution
//! - `parser` - Tolerant extraction of show records from agent output
//! - `orchestrator` - Validation, execution and outcome mapping per request
//! - `models` - Request and response contracts
//! - `cache` / `archive` - Optional decorators around a search
//! - `conversation` - Agent transcripts written to disk
//! - `config` - Settings and prompt templates
//!
//! # Example
//!
//! ```rust,no_run
//! use gigscout::config::Settings;
//! use gigscout::models::SearchRequest;
//! use gigscout::orchestrator::{PerformanceSearch, SearchOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = SearchOrchestrator::new(&settings)?;
//!
//!     let response = orchestrator.search(&SearchRequest::new("kito", 300)).await?;
//!     println!("Found {} shows", response.total_count);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod archive;
pub mod cache;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod models;
pub mod openai;
pub mod orchestrator;
pub mod parser;
pub mod service;
pub mod task;

pub use error::{GigscoutError, Result};

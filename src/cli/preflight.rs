//! Pre-flight checks before expensive operations.
//!
//! Validates that required configuration is available before starting
//! operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{GigscoutError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Searching runs the agent and needs an API key and target sites.
    Search,
    /// Printing a task needs target sites only.
    Task,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Search => {
            check_api_key(settings)?;
            check_sites(settings)?;
        }
        Operation::Task => {
            check_sites(settings)?;
        }
    }
    Ok(())
}

/// Check that the LLM API key is configured.
fn check_api_key(settings: &Settings) -> Result<()> {
    if settings.llm.has_api_key() {
        Ok(())
    } else {
        Err(GigscoutError::Config(
            "DEEPSEEK_API_KEY not set. Set it with: export DEEPSEEK_API_KEY='sk-...'".to_string(),
        ))
    }
}

fn check_sites(settings: &Settings) -> Result<()> {
    if settings.search.sites.is_empty() {
        Err(GigscoutError::Config(
            "No target sites configured under [[search.sites]]".to_string(),
        ))
    } else {
        Ok(())
    }
}

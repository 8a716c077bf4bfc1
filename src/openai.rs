//! OpenAI-compatible client configuration (DeepSeek by default).

use crate::config::LlmSettings;
use crate::error::{GigscoutError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Create a client for the configured endpoint.
///
/// The API key is read once here; the client is then shared for the lifetime
/// of the process.
pub fn create_client(settings: &LlmSettings) -> Result<Client<OpenAIConfig>> {
    let api_key = settings
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            GigscoutError::Config(
                "DEEPSEEK_API_KEY not set. Set it with: export DEEPSEEK_API_KEY='sk-...'"
                    .to_string(),
            )
        })?;

    create_client_with_timeout(
        &settings.base_url,
        api_key,
        Duration::from_secs(settings.request_timeout_seconds),
    )
}

/// Create a client with an explicit endpoint, key and request timeout.
pub fn create_client_with_timeout(
    base_url: &str,
    api_key: &str,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    let config = OpenAIConfig::new()
        .with_api_base(base_url.trim_end_matches('/'))
        .with_api_key(api_key);

    Ok(Client::with_config(config).with_http_client(http_client))
}

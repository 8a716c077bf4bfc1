//! Configuration settings for Gigscout.

use crate::models::DEFAULT_TIMEOUT_SECONDS;
use crate::task::TargetSite;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub server: ServerSettings,
    pub search: SearchSettings,
    pub agent: AgentSettings,
    pub cache: CacheSettings,
    pub archive: ArchiveSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.gigscout".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// OpenAI-compatible LLM endpoint that drives the browsing agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// API key. Usually supplied through `DEEPSEEK_API_KEY` instead of the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Per-request HTTP timeout for LLM calls.
    pub request_timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            request_timeout_seconds: 120,
        }
    }
}

impl LlmSettings {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Search request limits and target sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_timeout_seconds: u64,
    pub min_timeout_seconds: u64,
    pub max_timeout_seconds: u64,
    /// Maximum performer name length in characters.
    pub max_name_length: usize,
    /// Ticketing sites the agent is told to visit, in order.
    pub sites: Vec<TargetSite>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            min_timeout_seconds: 30,
            max_timeout_seconds: 600,
            max_name_length: 50,
            sites: vec![TargetSite::showstart()],
        }
    }
}

/// Browsing agent behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum LLM round trips before the agent gives up.
    pub max_steps: usize,
    /// Page text handed back to the model is truncated to this many characters.
    pub max_page_chars: usize,
    /// Timeout for a single page fetch.
    pub page_timeout_seconds: u64,
    pub user_agent: String,
    /// Write each run's step transcript to `conversation_dir`.
    pub save_conversations: bool,
    pub conversation_dir: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 30,
            max_page_chars: 12_000,
            page_timeout_seconds: 30,
            user_agent: concat!("gigscout/", env!("CARGO_PKG_VERSION")).to_string(),
            save_conversations: true,
            conversation_dir: "./conversations".to_string(),
        }
    }
}

/// Result cache in front of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_seconds: 3600,
            max_entries: 256,
        }
    }
}

/// SQLite archive of found performances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    pub enabled: bool,
    pub sqlite_path: String,
    /// Value stored in the `source` column.
    pub source: String,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            sqlite_path: "~/.gigscout/performances.db".to_string(),
            source: "showstart".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Environment variables override values from the file.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> crate::error::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DEEPSEEK_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = get("DEEPSEEK_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = get("DEEPSEEK_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("PORT") {
            self.server.port = parse_var("PORT", &v)?;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.general.log_level = v;
        }
        if let Some(v) = get("DEFAULT_TIMEOUT_SECONDS") {
            self.search.default_timeout_seconds = parse_var("DEFAULT_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("MIN_TIMEOUT_SECONDS") {
            self.search.min_timeout_seconds = parse_var("MIN_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("MAX_TIMEOUT_SECONDS") {
            self.search.max_timeout_seconds = parse_var("MAX_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("SAVE_CONVERSATIONS") {
            self.agent.save_conversations = v.eq_ignore_ascii_case("true") || v == "1";
        }
        if let Some(v) = get("CONVERSATION_DIR") {
            self.agent.conversation_dir = v;
        }

        Ok(())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::GigscoutError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gigscout")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded conversation transcript directory.
    pub fn conversation_dir(&self) -> PathBuf {
        Self::expand_path(&self.agent.conversation_dir)
    }

    /// Get the expanded archive database path.
    pub fn archive_path(&self) -> PathBuf {
        Self::expand_path(&self.archive.sqlite_path)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> crate::error::Result<T> {
    value.trim().parse().map_err(|_| {
        crate::error::GigscoutError::Config(format!("{} has an invalid value: {}", key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_service_contract() {
        let settings = Settings::default();
        assert_eq!(settings.search.default_timeout_seconds, 300);
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.llm.model, "deepseek-chat");
        assert_eq!(settings.search.sites.len(), 1);
        assert!(!settings.llm.has_api_key());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DEEPSEEK_API_KEY", "sk-test"),
            ("PORT", "9100"),
            ("SAVE_CONVERSATIONS", "false"),
            ("MIN_TIMEOUT_SECONDS", "5"),
            ("HOST", "  "),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.search.min_timeout_seconds, 5);
        assert!(!settings.agent.save_conversations);
        // Blank values are ignored.
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn test_invalid_override_is_config_error() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(|k| (k == "PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_toml_round_trip_with_sites() {
        let toml_str = r#"
[search]
min_timeout_seconds = 1

[[search.sites]]
name = "Damai"
base_url = "https://www.damai.cn"
"#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.search.min_timeout_seconds, 1);
        assert_eq!(settings.search.max_timeout_seconds, 600);
        assert_eq!(settings.search.sites.len(), 1);
        assert_eq!(settings.search.sites[0].name, "Damai");
        assert!(settings.search.sites[0].search_url.is_none());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(settings.cache.ttl_seconds, 3600);
    }
}

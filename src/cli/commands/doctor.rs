//! Doctor command - verify configuration.

use crate::cli::Output;
use crate::config::Settings;
use console::style;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Gigscout Doctor");
    println!();
    println!("Checking configuration...\n");

    let mut checks = Vec::new();

    let model = format!("{} at {}", settings.llm.model, settings.llm.base_url);
    let sections: [(&str, Vec<CheckResult>); 4] = [
        ("LLM", vec![check_api_key(settings), CheckResult::ok("Model", &model)]),
        ("Search", check_search(settings)),
        ("Directories", check_directories(settings)),
        ("Configuration", vec![check_config_file()]),
    ];

    for (title, results) in sections {
        println!("{}", style(title).bold());
        for check in &results {
            check.print();
        }
        println!();
        checks.extend(results);
    }

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before searching.",
            errors
        ));
        anyhow::bail!("doctor found {} error(s)", errors);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Gigscout is ready to search.");
    }

    Ok(())
}

/// Check the LLM API key, masking all but its ends.
fn check_api_key(settings: &Settings) -> CheckResult {
    const HINT: &str = "Set with: export DEEPSEEK_API_KEY='sk-...'";

    match settings.llm.api_key.as_deref().map(str::trim) {
        Some(key) if key.starts_with("sk-") && key.chars().count() > 12 => {
            let chars: Vec<char> = key.chars().collect();
            let head: String = chars[..6].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            CheckResult::ok("DEEPSEEK_API_KEY", &format!("configured ({}...{})", head, tail))
        }
        Some("") | None => CheckResult::error("DEEPSEEK_API_KEY", "not set", HINT),
        Some(_) => CheckResult::warning(
            "DEEPSEEK_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-...",
        ),
    }
}

/// Check target sites and timeout bounds.
fn check_search(settings: &Settings) -> Vec<CheckResult> {
    let search = &settings.search;
    let mut results = Vec::new();

    if search.sites.is_empty() {
        results.push(CheckResult::error(
            "Target sites",
            "none configured",
            "Add at least one [[search.sites]] entry",
        ));
    }
    for site in &search.sites {
        let how = match &site.search_url {
            Some(template) => format!("search via {}", template),
            None => "browse from the home page".to_string(),
        };
        results.push(CheckResult::ok(&site.name, &format!("{} ({})", site.base_url, how)));
    }

    let range = format!(
        "default {}s, allowed {}..={}s",
        search.default_timeout_seconds, search.min_timeout_seconds, search.max_timeout_seconds
    );
    if search.min_timeout_seconds > search.max_timeout_seconds {
        results.push(CheckResult::error(
            "Timeouts",
            &range,
            "min_timeout_seconds must not exceed max_timeout_seconds",
        ));
    } else if search.default_timeout_seconds < search.min_timeout_seconds
        || search.default_timeout_seconds > search.max_timeout_seconds
    {
        results.push(CheckResult::warning(
            "Timeouts",
            &range,
            "Requests without timeout_seconds will be rejected",
        ));
    } else {
        results.push(CheckResult::ok("Timeouts", &range));
    }

    results
}

/// Check data directories.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    if settings.agent.save_conversations {
        let dir = settings.conversation_dir();
        let message = if dir.exists() {
            format!("{}", dir.display())
        } else {
            format!("{} (will be created)", dir.display())
        };
        results.push(CheckResult::ok("Conversations", &message));
    } else {
        results.push(CheckResult::ok("Conversations", "not saved"));
    }

    if settings.archive.enabled {
        let db_path = settings.archive_path();
        if db_path.exists() {
            let size = std::fs::metadata(&db_path)
                .map(|m| format_size(m.len()))
                .unwrap_or_else(|_| "unknown size".to_string());
            results.push(CheckResult::ok(
                "Archive",
                &format!("{} ({})", db_path.display(), size),
            ));
        } else {
            results.push(CheckResult::warning(
                "Archive",
                &format!("{} (not created yet)", db_path.display()),
                "Database will be created on the first successful search",
            ));
        }
    } else {
        results.push(CheckResult::ok("Archive", "disabled"));
    }

    results
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: gigscout config edit",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmSettings;

    fn with_key(key: Option<&str>) -> Settings {
        let mut settings = Settings::default();
        settings.llm = LlmSettings {
            api_key: key.map(str::to_string),
            ..LlmSettings::default()
        };
        settings
    }

    #[test]
    fn test_api_key_checks() {
        let ok = check_api_key(&with_key(Some("sk-0123456789abcdef")));
        assert_eq!(ok.status, CheckStatus::Ok);
        assert!(ok.message.contains("sk-012...cdef"));

        assert_eq!(check_api_key(&with_key(None)).status, CheckStatus::Error);
        assert_eq!(check_api_key(&with_key(Some(" "))).status, CheckStatus::Error);
        assert_eq!(check_api_key(&with_key(Some("token"))).status, CheckStatus::Warning);
    }

    #[test]
    fn test_timeout_checks() {
        let mut settings = Settings::default();
        assert!(check_search(&settings)
            .iter()
            .all(|c| c.status == CheckStatus::Ok));

        settings.search.default_timeout_seconds = 5;
        let results = check_search(&settings);
        assert_eq!(results.last().unwrap().status, CheckStatus::Warning);

        settings.search.min_timeout_seconds = 700;
        let results = check_search(&settings);
        assert_eq!(results.last().unwrap().status, CheckStatus::Error);
    }

    #[test]
    fn test_no_sites_is_error() {
        let mut settings = Settings::default();
        settings.search.sites.clear();
        assert_eq!(check_search(&settings)[0].status, CheckStatus::Error);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
    }
}

//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings, config_path: Option<PathBuf>) -> Result<()> {
    let config_path = config_path.unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            println!("{}", render(&settings)?);
        }

        ConfigAction::Edit => {
            if create_default_config(&config_path)? {
                Output::info(&format!("Created default config at {:?}", config_path));
            }

            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string());

            Output::info(&format!("Opening config in {}...", editor));

            let status = std::process::Command::new(&editor)
                .arg(&config_path)
                .status();

            match status {
                Ok(s) if s.success() => {
                    Output::success("Config saved.");
                }
                Ok(_) => {
                    Output::warning("Editor exited with non-zero status.");
                }
                Err(e) => {
                    Output::error(&format!("Failed to open editor: {}", e));
                    Output::info(&format!("Config file is at: {:?}", config_path));
                }
            }
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

/// Write a default config file if none exists.
///
/// Writes plain defaults rather than the loaded settings: values that only
/// came from the environment must never land on disk.
fn create_default_config(path: &PathBuf) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    Settings::default().save_to(path)?;
    Ok(true)
}

/// Settings as TOML with the API key masked.
fn render(settings: &Settings) -> Result<String> {
    let mut shown = settings.clone();
    if shown.llm.api_key.is_some() {
        shown.llm.api_key = Some("<set>".to_string());
    }
    toml::to_string_pretty(&shown).map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_masks_api_key() {
        let mut settings = Settings::default();
        settings.llm.api_key = Some("sk-secret-value".to_string());

        let shown = render(&settings).unwrap();
        assert!(!shown.contains("sk-secret-value"));
        assert!(shown.contains("<set>"));
        assert!(shown.contains("[search]"));
    }

    #[test]
    fn test_created_config_omits_environment_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gigscout").join("config.toml");

        let mut loaded = Settings::default();
        loaded
            .apply_overrides(|key| match key {
                "DEEPSEEK_API_KEY" => Some("sk-from-env-secret".to_string()),
                "PORT" => Some("9999".to_string()),
                _ => None,
            })
            .unwrap();
        assert!(loaded.llm.has_api_key());

        assert!(create_default_config(&path).unwrap());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("sk-from-env-secret"));
        assert!(!written.contains("9999"));

        // An existing file is left alone.
        std::fs::write(&path, "# mine\n").unwrap();
        assert!(!create_default_config(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");
    }
}

//! Task text formulation for the browsing agent.
//!
//! Builds the natural-language instruction from a performer name and the
//! configured ticketing sites. Pure: identical inputs always produce identical
//! text.

use crate::config::Prompts;
use crate::error::{GigscoutError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Placeholder in [`TargetSite::search_url`] replaced by the encoded performer name.
pub const KEYWORD_PLACEHOLDER: &str = "{keyword}";

/// A ticketing site the agent should search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetSite {
    pub name: String,
    pub base_url: String,
    /// Search results URL template containing `{keyword}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_url: Option<String>,
}

impl TargetSite {
    pub fn new(name: &str, base_url: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            search_url: None,
        }
    }

    pub fn with_search_url(mut self, template: &str) -> Self {
        self.search_url = Some(template.to_string());
        self
    }

    /// Showstart (秀动), the site the service was built around.
    pub fn showstart() -> Self {
        Self::new("Showstart (秀动)", "https://www.showstart.com")
            .with_search_url("https://www.showstart.com/event/list?keyword={keyword}")
    }

    /// Direct search URL for a performer, if the site has a template.
    pub fn search_url_for(&self, performer_name: &str) -> Option<String> {
        self.search_url.as_ref().map(|template| {
            let keyword: String =
                url::form_urlencoded::byte_serialize(performer_name.as_bytes()).collect();
            template.replace(KEYWORD_PLACEHOLDER, &keyword)
        })
    }
}

/// Build the task text with the default prompt templates.
pub fn build_task(performer_name: &str, sites: &[TargetSite]) -> Result<String> {
    build_task_with(&Prompts::default(), performer_name, sites)
}

/// Build the task text with the given prompt templates.
pub fn build_task_with(
    prompts: &Prompts,
    performer_name: &str,
    sites: &[TargetSite],
) -> Result<String> {
    let performer = sanitize_name(performer_name);
    if performer.is_empty() {
        return Err(GigscoutError::Validation(
            "performer name must not be empty".to_string(),
        ));
    }
    if sites.is_empty() {
        return Err(GigscoutError::Validation(
            "at least one target site is required".to_string(),
        ));
    }

    let mut vars = HashMap::new();
    vars.insert("performer".to_string(), performer.clone());

    let preamble = prompts.render_with_custom(&prompts.task.preamble, &vars);

    let steps: Vec<String> = sites
        .iter()
        .enumerate()
        .map(|(i, site)| {
            let mut site_vars = vars.clone();
            site_vars.insert("index".to_string(), (i + 1).to_string());
            site_vars.insert("site_name".to_string(), site.name.clone());
            site_vars.insert("site_url".to_string(), site.base_url.clone());

            match site.search_url_for(&performer) {
                Some(url) => {
                    site_vars.insert("search_url".to_string(), url);
                    prompts.render_with_custom(&prompts.task.site_search, &site_vars)
                }
                None => prompts.render_with_custom(&prompts.task.site_browse, &site_vars),
            }
        })
        .collect();

    let output_format = prompts.render_with_custom(&prompts.task.output_format, &vars);

    Ok(format!(
        "{}\n\n{}\n\n{}",
        preamble,
        steps.join("\n"),
        output_format
    ))
}

/// Trim and strip template braces so a name can never expand into another placeholder.
fn sanitize_name(name: &str) -> String {
    name.replace("{{", "").replace("}}", "").trim().to_string()
}

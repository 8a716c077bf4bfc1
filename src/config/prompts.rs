//! Prompt templates for Gigscout.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub task: TaskPrompts,
    pub agent: AgentPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Building blocks of the task text handed to the browsing agent.
///
/// The task is `preamble`, then one rendered site step per target site, then
/// `output_format`. Site steps never reference each other, so adding a site
/// only appends text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskPrompts {
    pub preamble: String,
    /// Site step used when the site has a direct search URL.
    pub site_search: String,
    /// Site step used when only the home page is known.
    pub site_browse: String,
    pub output_format: String,
}

impl Default for TaskPrompts {
    fn default() -> Self {
        Self {
            preamble: r#"Find every upcoming live show of the performer "{{performer}}" on the ticketing sites listed below. Work through the sites in order:"#.to_string(),

            site_search: r#"{{index}}. {{site_name}}: open {{search_url}} to reach the search results for "{{performer}}". For every matching event card, open the event's detail page and record the venue, the venue address, the date and time range, the guest performers, every ticket price tier (presale, regular, vip or whatever tiers the page lists) and the detail page URL."#.to_string(),

            site_browse: r#"{{index}}. {{site_name}}: open {{site_url}}, search the site for "{{performer}}" and, for every matching event, open the event's detail page and record the venue, the venue address, the date and time range, the guest performers, every ticket price tier (presale, regular, vip or whatever tiers the page lists) and the detail page URL."#.to_string(),

            output_format: r#"When you have checked every site, call the `done` tool. Its `result` must be a single JSON document of this shape, with one object per event:

{"performances": [
  {
    "address": "广州市荔湾区恩宁路265号3层",
    "venue": "MAOLivehouse广州（永庆坊店）",
    "date": "08月24日 19:00-08月24日 20:30",
    "guest": ["SHark米尔艾力", "LilAsian"],
    "ticket_prices": {"presale": "￥158", "regular": "￥198", "vip": "￥288"},
    "performance_url": "https://www.showstart.com/event/273756"
  }
]}

Leave out fields you could not find instead of guessing. If there are no upcoming shows, return {"performances": []}."#.to_string(),
        }
    }
}

/// System prompt for the LLM that drives the browsing agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    pub system: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a web browsing agent that collects live show listings from ticketing websites.

You have tools to open a page and read its text, to list the links on a page, and to finish the task.
Think step-by-step about which page you need next, then use the appropriate tool.

Guidelines:
- Use 'open_page' to read a search results page or an event detail page
- Use 'find_links' to discover event detail URLs on a results page
- Only report information you actually read on a page
- Call 'done' exactly once with your final result; set success to false if you could not complete the task"#.to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let task_path = custom_path.join("task.toml");
            if task_path.exists() {
                let content = std::fs::read_to_string(&task_path)?;
                prompts.task = toml::from_str(&content)?;
            }

            let agent_path = custom_path.join("agent.toml");
            if agent_path.exists() {
                let content = std::fs::read_to_string(&agent_path)?;
                prompts.agent = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

//! Configuration module for Gigscout.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AgentPrompts, Prompts, TaskPrompts};
pub use settings::{
    AgentSettings, ArchiveSettings, CacheSettings, GeneralSettings, LlmSettings, PromptSettings,
    SearchSettings, ServerSettings, Settings,
};

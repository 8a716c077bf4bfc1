//! Task command - print the instructions the agent would receive.

use crate::cli::preflight::{self, Operation};
use crate::config::{Prompts, Settings};
use crate::task::build_task_with;
use anyhow::Result;

/// Run the task command.
pub fn run_task(name: &str, settings: &Settings) -> Result<()> {
    preflight::check(Operation::Task, settings)?;

    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;
    let task = build_task_with(&prompts, name, &settings.search.sites)?;
    println!("{}", task);
    Ok(())
}

//! CLI command implementations.

mod config;
mod doctor;
mod search;
mod serve;
mod task;

pub use config::run_config;
pub use doctor::run_doctor;
pub use search::run_search;
pub use serve::{router, run_serve, AppState};
pub use task::run_task;

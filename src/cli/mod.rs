//! CLI module for Gigscout.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Gigscout - Live show search driven by a browsing agent
///
/// Finds a performer's upcoming live shows on ticketing sites by handing an
/// LLM-driven browsing agent a search task, then normalizes what it reports.
#[derive(Parser, Debug)]
#[command(name = "gigscout")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP search API
    Serve {
        /// Host to bind to (defaults to server.host from config)
        #[arg(long, env = "HOST")]
        host: Option<String>,

        /// Port to bind to (defaults to server.port from config)
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Search for one or more performers' upcoming shows
    Search {
        /// Performer names
        #[arg(required = true)]
        names: Vec<String>,

        /// Agent time budget per performer, in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Print the raw response envelopes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the task text the agent would receive
    Task {
        /// Performer name
        name: String,
    },

    /// Check configuration and connectivity
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from(["gigscout", "-v", "search", "kito", "GAI", "--timeout", "120"])
            .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Search { names, timeout, json } => {
                assert_eq!(names, vec!["kito", "GAI"]);
                assert_eq!(timeout, Some(120));
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_search_requires_a_name() {
        assert!(Cli::try_parse_from(["gigscout", "search"]).is_err());
    }

    #[test]
    fn test_parse_config_path() {
        let cli = Cli::try_parse_from(["gigscout", "-c", "/tmp/g.toml", "config", "path"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("/tmp/g.toml"));
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Path
            }
        ));
    }
}

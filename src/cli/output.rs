//! CLI output formatting utilities.

use crate::models::{PerformanceRecord, SearchResponse};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a search response in human-readable form.
    pub fn search_response(response: &SearchResponse) {
        Output::header(&response.performer_name);

        if let Some(stats) = &response.execution_stats {
            Output::kv(
                "Agent",
                &format!(
                    "{} steps in {}",
                    stats.total_steps,
                    format_duration(stats.duration_seconds)
                ),
            );
        }

        if !response.success {
            Output::error(&format!(
                "Search failed: {}",
                response.error.as_deref().unwrap_or("unknown error")
            ));
            return;
        }

        if response.performances.is_empty() {
            Output::info("No upcoming shows found.");
            return;
        }

        Output::success(&format!("{} show(s) found", response.total_count));
        for record in &response.performances {
            Output::performance(record);
        }
    }

    /// Print a single show.
    pub fn performance(record: &PerformanceRecord) {
        println!(
            "\n  {} {} @ {}",
            style("*").cyan(),
            style(&record.date_range).bold(),
            style(&record.venue).bold()
        );
        if let Some(address) = &record.address {
            println!("    {}", address);
        }
        if !record.guests.is_empty() {
            println!("    {} {}", style("guests:").dim(), record.guests.join(", "));
        }
        if !record.ticket_prices.is_empty() {
            let tiers: Vec<String> = record
                .ticket_prices
                .iter()
                .map(|(tier, price)| format!("{} {}", tier, price))
                .collect();
            println!("    {} {}", style("tickets:").dim(), tiers.join(" / "));
        }
        if !record.source_url.is_empty() {
            println!("    {}", style(&record.source_url).dim());
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Format duration in seconds to a human-readable string.
fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u32;
    let minutes = total_seconds / 60;
    let secs = total_seconds % 60;

    if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{:.1}s", seconds.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(4.3), "4.3s");
        assert_eq!(format_duration(75.0), "1m 15s");
        assert_eq!(format_duration(-1.0), "0.0s");
    }
}

//! Tolerant parsing of agent output into performance records.
//!
//! Agent output is LLM-generated and untrusted. Parsing accepts or rejects
//! individual blocks and fields, never the whole document: a malformed event
//! is dropped, and output that holds no recognizable event at all parses to an
//! empty list rather than an error.

mod fields;
mod scan;

use crate::models::PerformanceRecord;
use tracing::debug;

/// Parse raw agent output into records, preserving their order of appearance.
pub fn parse(raw_output: &str) -> Vec<PerformanceRecord> {
    if raw_output.trim().is_empty() {
        return Vec::new();
    }

    let blocks = scan::candidate_blocks(raw_output);
    let mut records = Vec::with_capacity(blocks.len());

    for (index, block) in blocks.iter().enumerate() {
        match fields::extract_record(block) {
            Ok(record) => records.push(record),
            Err(reason) => debug!("Dropping event block {}: {}", index, reason),
        }
    }

    debug!(
        "Parsed {} of {} candidate event blocks",
        records.len(),
        blocks.len()
    );
    records
}

//! Request and response contracts exchanged with callers.
//!
//! Field names on the wire follow the public API (`rapper_name`, `date`,
//! `guest`, `performance_url`); the Rust names describe what the fields hold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default agent time budget in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// Error string reported in-band when the agent runs out of time.
pub const TIMEOUT_ERROR: &str = "timeout";

/// A single search request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRequest {
    #[serde(rename = "rapper_name", alias = "performer_name")]
    pub performer_name: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Skip any cached result and force a fresh agent run.
    #[serde(default)]
    pub bypass_cache: bool,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl SearchRequest {
    pub fn new(performer_name: impl Into<String>, timeout_seconds: u64) -> Self {
        Self {
            performer_name: performer_name.into(),
            timeout_seconds,
            bypass_cache: false,
        }
    }

    pub fn bypassing_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }
}

/// Ticket price tiers keyed by tier name (presale, regular, vip, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct TicketPriceTiers(BTreeMap<String, String>);

impl TicketPriceTiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tier: impl Into<String>, price: impl Into<String>) {
        self.0.insert(tier.into(), price.into());
    }

    pub fn get(&self, tier: &str) -> Option<&str> {
        self.0.get(tier).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TicketPriceTiers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One live show found by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerformanceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub venue: String,
    /// Start/end display string, e.g. `08月24日 19:00-08月24日 20:30`.
    #[serde(rename = "date")]
    pub date_range: String,
    #[serde(rename = "guest", default)]
    pub guests: Vec<String>,
    #[serde(default)]
    pub ticket_prices: TicketPriceTiers,
    /// Event detail page; empty when the agent gave no usable URL.
    #[serde(rename = "performance_url", default)]
    pub source_url: String,
}

/// Statistics describing the agent run (not the parsing step).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionStats {
    pub total_steps: usize,
    pub duration_seconds: f64,
    pub is_done: bool,
    pub is_successful: bool,
}

/// Envelope returned for every request that passed validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(rename = "rapper_name")]
    pub performer_name: String,
    pub performances: Vec<PerformanceRecord>,
    pub total_count: usize,
    pub search_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_stats: Option<ExecutionStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    /// Successful search; `total_count` is derived from the records.
    pub fn found(
        performer_name: &str,
        performances: Vec<PerformanceRecord>,
        search_time: DateTime<Utc>,
        stats: ExecutionStats,
    ) -> Self {
        Self {
            success: true,
            performer_name: performer_name.to_string(),
            total_count: performances.len(),
            performances,
            search_time,
            execution_stats: Some(stats),
            error: None,
        }
    }

    /// Failed search. Never carries records.
    pub fn failed(
        performer_name: &str,
        error: impl Into<String>,
        search_time: DateTime<Utc>,
        stats: Option<ExecutionStats>,
    ) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "agent failed without a diagnostic".to_string();
        }
        Self {
            success: false,
            performer_name: performer_name.to_string(),
            performances: Vec::new(),
            total_count: 0,
            search_time,
            execution_stats: stats,
            error: Some(error),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.error.as_deref() == Some(TIMEOUT_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_and_alias() {
        let req: SearchRequest = serde_json::from_str(r#"{"rapper_name": "kito"}"#).unwrap();
        assert_eq!(req.performer_name, "kito");
        assert_eq!(req.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
        assert!(!req.bypass_cache);

        let req: SearchRequest =
            serde_json::from_str(r#"{"performer_name": "kito", "timeout_seconds": 60}"#).unwrap();
        assert_eq!(req.timeout_seconds, 60);
    }

    #[test]
    fn test_record_wire_names() {
        let record = PerformanceRecord {
            address: None,
            venue: "MAO".to_string(),
            date_range: "08月24日 19:00".to_string(),
            guests: vec!["LilAsian".to_string()],
            ticket_prices: [("vip", "￥288"), ("presale", "￥158")].into_iter().collect(),
            source_url: "https://www.showstart.com/event/273756".to_string(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("address").is_none());
        assert_eq!(value["date"], "08月24日 19:00");
        assert_eq!(value["guest"][0], "LilAsian");
        assert_eq!(value["ticket_prices"]["presale"], "￥158");
        assert_eq!(value["performance_url"], "https://www.showstart.com/event/273756");
    }

    #[test]
    fn test_failed_envelope_invariants() {
        let resp = SearchResponse::failed("kito", "", Utc::now(), None);
        assert!(!resp.success);
        assert!(resp.performances.is_empty());
        assert_eq!(resp.total_count, 0);
        assert!(!resp.error.unwrap().is_empty());

        let resp = SearchResponse::failed("kito", TIMEOUT_ERROR, Utc::now(), None);
        assert!(resp.is_timeout());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["rapper_name"], "kito");
        assert_eq!(json["error"], "timeout");
    }
}

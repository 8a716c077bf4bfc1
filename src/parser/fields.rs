//! Field-by-field extraction of a performance record from one block.

use super::scan::Block;
use crate::models::{PerformanceRecord, TicketPriceTiers};
use serde_json::Value;
use url::Url;

const VENUE_KEYS: &[&str] = &["venue"];
const ADDRESS_KEYS: &[&str] = &["address"];
const DATE_KEYS: &[&str] = &["date", "date_range", "time", "datetime"];
const GUEST_KEYS: &[&str] = &["guest", "guests", "artists"];
const PRICE_KEYS: &[&str] = &["ticket_prices", "prices", "price"];
const URL_KEYS: &[&str] = &["performance_url", "url", "source_url", "purchase_url", "link"];

/// Tier assigned to a lone price that names no tier.
const DEFAULT_TIER: &str = "regular";

/// Separators used when a guest list arrives as one string.
const GUEST_SEPARATORS: &[char] = &[',', '，', '、', '/', ';', '；'];

/// Why a block produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    MissingVenue,
    MissingDate,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::MissingVenue => write!(f, "missing venue"),
            Rejection::MissingDate => write!(f, "missing date"),
        }
    }
}

/// Extract a record; venue and date are required, everything else is best effort.
pub(crate) fn extract_record(block: &Block) -> Result<PerformanceRecord, Rejection> {
    let venue = text_field(block, VENUE_KEYS).ok_or(Rejection::MissingVenue)?;
    let date_range = text_field(block, DATE_KEYS).ok_or(Rejection::MissingDate)?;

    Ok(PerformanceRecord {
        address: text_field(block, ADDRESS_KEYS),
        venue,
        date_range,
        guests: lookup(block, GUEST_KEYS).map(guest_list).unwrap_or_default(),
        ticket_prices: lookup(block, PRICE_KEYS).map(price_tiers).unwrap_or_default(),
        source_url: text_field(block, URL_KEYS)
            .and_then(|u| absolute_url(&u))
            .unwrap_or_default(),
    })
}

/// First value under any of `keys`, matched case-insensitively, in key order.
fn lookup<'a>(block: &'a Block, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| {
        block
            .iter()
            .find(|(k, v)| k.trim().eq_ignore_ascii_case(key) && !v.is_null())
            .map(|(_, v)| v)
    })
}

fn text_field(block: &Block, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| lookup(block, std::slice::from_ref(key)))
        .find_map(scalar_text)
}

/// Non-empty trimmed text of a string or number.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn guest_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(s) => s
            .split(GUEST_SEPARATORS)
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn price_tiers(value: &Value) -> TicketPriceTiers {
    let mut tiers = TicketPriceTiers::new();
    match value {
        Value::Object(map) => {
            for (tier, price) in map {
                let tier = tier.trim().to_lowercase();
                if tier.is_empty() {
                    continue;
                }
                if let Some(price) = scalar_text(price) {
                    tiers.insert(tier, price);
                }
            }
        }
        // [{"tier": "vip", "price": "￥288"}, ...]
        Value::Array(items) => {
            for item in items {
                let Value::Object(entry) = item else { continue };
                let tier = text_field(entry, &["tier", "name", "type"]);
                let price = text_field(entry, &["price", "amount"]);
                if let (Some(tier), Some(price)) = (tier, price) {
                    tiers.insert(tier.to_lowercase(), price);
                }
            }
        }
        other => {
            if let Some(price) = scalar_text(other) {
                tiers.insert(DEFAULT_TIER, price);
            }
        }
    }
    tiers
}

fn absolute_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(value: Value) -> Block {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_required_fields() {
        assert_eq!(
            extract_record(&block(json!({"date": "d"}))).unwrap_err(),
            Rejection::MissingVenue
        );
        assert_eq!(
            extract_record(&block(json!({"venue": "  ", "date": "d"}))).unwrap_err(),
            Rejection::MissingVenue
        );
        assert_eq!(
            extract_record(&block(json!({"venue": "MAO"}))).unwrap_err(),
            Rejection::MissingDate
        );
    }

    #[test]
    fn test_aliases_and_case() {
        let record = extract_record(&block(json!({
            "Venue": " MAO ",
            "time": "2025/09/07 19:00",
            "artists": ["黄旭", "KITO"],
            "purchase_url": "https://www.showstart.com/event/273756"
        })))
        .unwrap();
        assert_eq!(record.venue, "MAO");
        assert_eq!(record.date_range, "2025/09/07 19:00");
        assert_eq!(record.guests, vec!["黄旭", "KITO"]);
        assert_eq!(record.source_url, "https://www.showstart.com/event/273756");
        assert!(record.address.is_none());
        assert!(record.ticket_prices.is_empty());
    }

    #[test]
    fn test_guest_shapes_collapse() {
        assert_eq!(guest_list(&json!("A, B、C")), vec!["A", "B", "C"]);
        assert_eq!(guest_list(&json!([" A ", "", 7, null])), vec!["A", "7"]);
        assert_eq!(guest_list(&json!("Solo")), vec!["Solo"]);
        assert!(guest_list(&json!({"x": 1})).is_empty());
    }

    #[test]
    fn test_price_tiers_extracted_independently() {
        let tiers = price_tiers(&json!({
            "presale": "￥158",
            "Regular": 198,
            "vip": null,
            "student": {"nested": true},
            "door": ""
        }));
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers.get("presale"), Some("￥158"));
        assert_eq!(tiers.get("regular"), Some("198"));

        let single = price_tiers(&json!("¥158起"));
        assert_eq!(single.get("regular"), Some("¥158起"));

        let listed = price_tiers(&json!([{"tier": "VIP", "price": "￥288"}, {"price": "1"}]));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed.get("vip"), Some("￥288"));
    }

    #[test]
    fn test_invalid_url_is_dropped() {
        let record = extract_record(&block(json!({
            "venue": "MAO",
            "date": "d",
            "url": "/event/273756"
        })))
        .unwrap();
        assert_eq!(record.source_url, "");

        assert!(absolute_url("ftp://example.com/x").is_none());
    }
}

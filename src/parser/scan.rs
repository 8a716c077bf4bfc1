//! Locating candidate event blocks in raw agent output.

use serde_json::{Map, Value};

/// Keys whose value holds the list of events in a wrapper document.
const CONTAINER_KEYS: &[&str] = &["performances", "events", "shows"];

/// Keys that map straight to a ticket tier in `key: value` text.
const TIER_KEYS: &[&str] = &["presale", "regular", "vip"];

/// Prefixes marking a tier in `key: value` text, e.g. `price.presale`.
const TIER_PREFIXES: &[&str] = &["ticket_prices.", "prices.", "price."];

/// How deep JSON encoded inside JSON strings is followed.
const MAX_NESTING: usize = 3;

pub(crate) type Block = Map<String, Value>;

/// Split raw output into candidate event blocks, in order of appearance.
pub(crate) fn candidate_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    for value in json_values(text) {
        flatten(value, 0, &mut blocks);
    }

    // Stray brackets in prose (`[1]`, `{}`) decode as JSON but hold no events.
    if blocks.is_empty() {
        return line_blocks(text);
    }
    blocks
}

/// Decode every JSON object or array embedded in `text`.
///
/// Scanning restarts one byte past any opening bracket that does not start a
/// valid document, so a broken wrapper still yields the valid objects inside it.
pub(crate) fn json_values(text: &str) -> Vec<Value> {
    let mut values = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let Some(offset) = text[pos..].find(['{', '[']) else {
            break;
        };
        let start = pos + offset;

        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                let end = start + stream.byte_offset();
                values.push(value);
                pos = end.max(start + 1);
            }
            _ => pos = start + 1,
        }
    }

    values
}

fn flatten(value: Value, depth: usize, out: &mut Vec<Block>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten(item, depth, out);
            }
        }
        Value::Object(mut map) => {
            match take_container(&mut map) {
                Some(inner) => flatten(inner, depth, out),
                None => out.push(map),
            }
        }
        Value::String(s) if depth < MAX_NESTING => {
            for inner in json_values(&s) {
                flatten(inner, depth + 1, out);
            }
        }
        _ => {}
    }
}

/// Remove and return the event list of a wrapper object.
///
/// A container key only counts when its value can hold events, so an event
/// with `"shows": 2` stays an event.
fn take_container(map: &mut Block) -> Option<Value> {
    let key = map
        .iter()
        .find(|(key, value)| is_container_key(key) && holds_events(value))
        .map(|(key, _)| key.clone())?;
    map.remove(&key)
}

fn is_container_key(key: &str) -> bool {
    CONTAINER_KEYS.iter().any(|c| key.eq_ignore_ascii_case(c))
}

fn holds_events(value: &Value) -> bool {
    match value {
        Value::Array(_) => true,
        Value::Object(inner) => inner
            .iter()
            .any(|(key, value)| is_container_key(key) && holds_events(value)),
        Value::String(s) => !json_values(s).is_empty(),
        _ => false,
    }
}

/// Parse `key: value` blocks separated by blank lines.
///
/// A second `venue` line inside one block also starts a new block.
fn line_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current = Block::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("```") {
            if line.is_empty() && !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }

        let Some((key, value)) = split_key_value(line) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }

        if key == "venue" && current.contains_key("venue") {
            blocks.push(std::mem::take(&mut current));
        }
        insert_line_field(&mut current, &key, value);
    }

    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn split_key_value(line: &str) -> Option<(String, &str)> {
    let line = line
        .trim_start_matches(['-', '*', '•'])
        .trim_start()
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches(['.', ')'])
        .trim_start();

    let idx = line.find([':', '：'])?;
    let (raw_key, rest) = line.split_at(idx);
    let sep_len = rest.chars().next().map(char::len_utf8).unwrap_or(1);
    let value = rest[sep_len..].trim();

    let key = raw_key
        .trim()
        .trim_matches(['*', '"', '\'', '`'])
        .trim()
        .to_lowercase()
        .replace(' ', "_");
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

fn insert_line_field(block: &mut Block, key: &str, value: &str) {
    let tier = TIER_PREFIXES
        .iter()
        .find_map(|prefix| key.strip_prefix(prefix))
        .or_else(|| TIER_KEYS.iter().copied().find(|t| *t == key));

    if let Some(tier) = tier {
        let prices = block
            .entry("ticket_prices")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(prices) = prices {
            prices.insert(tier.to_string(), Value::String(value.to_string()));
        }
        return;
    }

    match block.get_mut(key) {
        // Repeated keys (several `guest:` lines) accumulate into a list.
        Some(Value::Array(items)) => items.push(Value::String(value.to_string())),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, Value::String(value.to_string())]);
        }
        None => {
            block.insert(key.to_string(), Value::String(value.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_values_skip_surrounding_text() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nand also [1, 2]";
        let values = json_values(text);
        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["a"], 1);
        assert!(values[1].is_array());
    }

    #[test]
    fn test_broken_wrapper_yields_inner_objects() {
        let text = r#"{"performances": [{"venue": "A", "date": "d1"}, {"venue": "B", "date": "d2"}, {"venue": "#;
        let blocks = candidate_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1]["venue"], "B");
    }

    #[test]
    fn test_wrapper_keys_are_case_insensitive() {
        let blocks = candidate_blocks(r#"{"Events": [{"venue": "A"}]}"#);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["venue"], "A");
    }

    #[test]
    fn test_json_inside_string_is_followed() {
        let text = r#"{"result": "{\"performances\": [{\"venue\": \"A\"}]}"}"#;
        // The outer object has no container key, so it is a block itself...
        let blocks = candidate_blocks(text);
        assert_eq!(blocks.len(), 1);
        // ...but a bare string payload is unwrapped.
        let mut out = Vec::new();
        flatten(Value::String(r#"[{"venue": "A"}]"#.to_string()), 0, &mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_line_blocks() {
        let text = "- **Venue**: MAO\n- Date：08月24日 19:00\n- guest: A\n- guest: B\n- price.presale: ￥158\n- vip: ￥288\n\nvenue: Second\ndate: tomorrow";
        let blocks = candidate_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["venue"], "MAO");
        assert_eq!(blocks[0]["date"], "08月24日 19:00");
        assert_eq!(blocks[0]["guest"], serde_json::json!(["A", "B"]));
        assert_eq!(blocks[0]["ticket_prices"]["presale"], "￥158");
        assert_eq!(blocks[0]["ticket_prices"]["vip"], "￥288");
        assert_eq!(blocks[1]["venue"], "Second");
    }

    #[test]
    fn test_repeated_venue_starts_new_block() {
        let blocks = candidate_blocks("venue: A\ndate: d\nvenue: B\ndate: e");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1]["date"], "e");
    }

    #[test]
    fn test_scalar_container_key_is_an_event_field() {
        let blocks = candidate_blocks(
            r#"{"performances": [{"venue": "MAO", "date": "09月07日", "shows": 2, "events": "sold out"}]}"#,
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["venue"], "MAO");
        assert_eq!(blocks[0]["shows"], 2);
    }

    #[test]
    fn test_nested_wrapper_objects_are_unwrapped() {
        let blocks = candidate_blocks(r#"{"data": 1, "shows": {"events": [{"venue": "A"}]}}"#);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["venue"], "A");
    }

    #[test]
    fn test_stray_brackets_fall_back_to_lines() {
        let blocks = candidate_blocks("venue: MAO Livehouse [1]\ndate: 2025/09/07 19:00\n\n{}");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["venue"], "MAO Livehouse [1]");
        assert_eq!(blocks[0]["date"], "2025/09/07 19:00");
    }

    #[test]
    fn test_url_value_keeps_scheme() {
        let blocks = candidate_blocks("url: https://www.showstart.com/event/1");
        assert_eq!(blocks[0]["url"], "https://www.showstart.com/event/1");
    }
}

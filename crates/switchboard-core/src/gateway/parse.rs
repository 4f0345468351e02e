//! Permissive parsing for gateway configuration output.
//!
//! The gateway nominally returns strict JSON, but in practice the
//! text can be wrapped in log noise. Strict parsing is tried first,
//! then bounded substring scans, then the caller gives up.

use serde_json::Value;

/// Try to recover a JSON document from a raw text blob.
pub fn parse_loose_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) else {
            continue;
        };
        if start >= end {
            continue;
        }
        if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
            return Some(value);
        }
    }
    None
}

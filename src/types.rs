// src/types.rs
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Absolute point in time expressed in the monitor's reference timezone.
pub type AbsoluteTime = DateTime<FixedOffset>;

/// One scraped headline, as produced by a source adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeadlineRecord {
    pub text: String,
    /// Timestamp exactly as the source rendered it, e.g. "15 mins ago".
    pub raw_timestamp: String,
    /// Pre-resolved time, when the adapter knows it precisely (RSS pubDate).
    #[serde(default)]
    pub parsed_time: Option<AbsoluteTime>,
    #[serde(default)]
    pub category: String,
    pub source: String,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub external_id: String,
}

impl HeadlineRecord {
    /// Minimal constructor used by adapters and tests; optional fields stay empty.
    pub fn new(
        text: impl Into<String>,
        raw_timestamp: impl Into<String>,
        source: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            raw_timestamp: raw_timestamp.into(),
            parsed_time: None,
            category: String::new(),
            source: source.into(),
            entity_id: entity_id.into(),
            external_id: String::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_parsed_time(mut self, t: AbsoluteTime) -> Self {
        self.parsed_time = Some(t);
        self
    }
}

/// Short (12 hex chars) SHA-256 digest, used for external ids and log correlation.
pub fn short_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Truncate to `max` chars for log lines.
pub(crate) fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut s: String = text.chars().take(max).collect();
    s.push_str("...");
    s
}

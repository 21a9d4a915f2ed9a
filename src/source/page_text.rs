// src/source/page_text.rs
//! Live-news page scraped as plain text. The page is reduced to its visible
//! text lines, then scanned for a headline line directly followed by a
//! timestamp line, optionally followed by a short category line.

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

use super::{entity_hint, http_client, normalize_text, SourceAdapter};
use crate::timestamp::looks_like_timestamp;
use crate::types::{short_hash, HeadlineRecord};

const MIN_HEADLINE_CHARS: usize = 30;
const MAX_HEADLINE_CHARS: usize = 1500;
const MAX_CATEGORY_CHARS: usize = 40;

/// Navigation entries matched exactly (lowercase).
const SKIP_EXACT: &[&str] = &[
    "live news",
    "all",
    "results",
    "block deals",
    "equity",
    "commentary",
    "global",
    "fixed income",
    "commodities",
    "solutions",
    "markets",
    "tools & resources",
    "support",
    "login / sign up",
    "search",
    "0 updates",
];

/// Marketing and legal boilerplate matched as substrings (lowercase).
const SKIP_CONTAINS: &[&str] = &[
    "sign up",
    "get started",
    "why nuvama",
    "support center",
    "helpdesk",
    "feedback",
    "visit",
    "locate",
    "healthy financial",
    "customer",
    "trader",
    "menu",
    "investor charter",
    "dispute resolution",
    "issue with our website",
    "issue is not resolved",
    "join ",
    "million customers",
    "empowering our clients",
    "mon-fri",
    "all rights reserved",
    "sebi scores",
    "broking services offered by",
    "registered office",
    "corporate office",
    "financial products distribution",
    "most important terms",
    "prevent unauthorized",
    "switch to old website",
    "clicking the button below",
];

static RE_DROP_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|svg)\b[^>]*>.*?</(script|style|noscript|svg)\s*>")
        .expect("drop-blocks regex")
});

static RE_BREAKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)<\s*(br|/?p|/?div|/?li|/?ul|/?ol|/?tr|/?td|/?th|/?h[1-6]|/?section|/?article|/?header|/?footer|/?main|/?nav|/?span)\b[^>]*>",
    )
    .expect("line-break regex")
});

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"));

/// Visible text of an HTML document, one non-empty line per block.
pub fn html_to_lines(html: &str) -> Vec<String> {
    let s = RE_DROP_BLOCKS.replace_all(html, "");
    let s = RE_BREAKS.replace_all(&s, "\n");
    let s = RE_TAGS.replace_all(&s, "");
    s.lines()
        .map(normalize_text)
        .filter(|l| !l.is_empty())
        .collect()
}

fn is_boilerplate(line: &str) -> bool {
    let lower = line.to_lowercase();
    SKIP_EXACT.contains(&lower.as_str()) || SKIP_CONTAINS.iter().any(|p| lower.contains(p))
}

fn is_headline_candidate(line: &str) -> bool {
    let n = line.chars().count();
    (MIN_HEADLINE_CHARS..=MAX_HEADLINE_CHARS).contains(&n) && !is_boilerplate(line)
}

/// Line-triple scan over page text, in page order.
pub fn extract_records(lines: &[String], source: &str) -> Vec<HeadlineRecord> {
    let mut out = Vec::new();
    let mut i = 0;
    while i + 1 < lines.len() {
        let line = lines[i].as_str();
        let next = lines[i + 1].as_str();
        if !looks_like_timestamp(next) || !is_headline_candidate(line) {
            i += 1;
            continue;
        }

        // The line after the timestamp is a category tag unless it is itself
        // the next headline.
        let category = lines
            .get(i + 2)
            .filter(|c| {
                c.chars().count() <= MAX_CATEGORY_CHARS
                    && !looks_like_timestamp(c)
                    && !lines.get(i + 3).is_some_and(|t| looks_like_timestamp(t))
            })
            .cloned()
            .unwrap_or_default();
        let consumed = if category.is_empty() { 2 } else { 3 };

        let mut rec = HeadlineRecord::new(line, next, source, entity_hint(line)).with_category(category);
        rec.external_id = short_hash(line);
        out.push(rec);
        i += consumed;
    }
    out
}

enum Mode {
    Inline(String),
    Http { url: String, client: reqwest::Client },
}

pub struct PageTextSource {
    name: String,
    mode: Mode,
}

impl PageTextSource {
    pub fn from_url(name: &str, url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            mode: Mode::Http {
                url: url.to_string(),
                client: http_client(timeout)?,
            },
        })
    }

    /// Fixed HTML body, for tests and replays.
    pub fn from_html(name: &str, html: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Inline(html.to_string()),
        }
    }

    fn parse(&self, html: &str) -> Vec<HeadlineRecord> {
        let lines = html_to_lines(html);
        let records = extract_records(&lines, &self.name);
        tracing::debug!(target: "source", source = %self.name, lines = lines.len(), records = records.len(), "page parsed");
        records
    }
}

#[async_trait]
impl SourceAdapter for PageTextSource {
    async fn fetch(&self) -> Result<Vec<HeadlineRecord>> {
        match &self.mode {
            Mode::Inline(html) => Ok(self.parse(html)),
            Mode::Http { url, client } => {
                let body = client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("{} http get()", self.name))?
                    .error_for_status()
                    .with_context(|| format!("{} http status", self.name))?
                    .text()
                    .await
                    .with_context(|| format!("{} http .text()", self.name))?;
                Ok(self.parse(&body))
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><head><style>.x{color:red}</style><script>var t = "15 mins ago";</script></head>
<body>
<nav><ul><li><a href="/live-news">Live News</a></li><li><a>Results</a></li></ul></nav>
<div class="card">
  <div>Natco Pharma (+1.2%): Receives EIR from USFDA for Chennai unit</div>
  <div>15 mins ago</div>
  <div>Equity</div>
</div>
<div class="card">
  <div>Tata Motors - : Q3 net profit rises 12% YoY to Rs 5,000 Cr</div>
  <div>03 Nov 08:26 AM</div>
  <div>Result</div>
</div>
<div class="card">
  <div>BEL &amp; HAL sign MoU for joint radar development programme</div>
  <div>Just Now</div>
</div>
<div class="card">
  <div>Reliance Industries: board approves bonus issue in 1:1 ratio</div>
  <div>2 hours ago</div>
</div>
<footer><p>All rights reserved. Broking services offered by Nuvama Wealth</p><p>Just Now</p></footer>
</body></html>
"#;

    #[test]
    fn html_to_lines_drops_scripts_and_tags() {
        let lines = html_to_lines(PAGE);
        assert!(lines.iter().all(|l| !l.contains('<')));
        assert!(!lines.iter().any(|l| l.contains("var t")));
        assert!(lines.contains(&"Live News".to_string()));
    }

    #[test]
    fn extracts_headline_timestamp_category_triples() {
        let recs = extract_records(&html_to_lines(PAGE), "nuvama");
        let texts: Vec<&str> = recs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(recs.len(), 4, "{texts:?}");

        assert_eq!(recs[0].raw_timestamp, "15 mins ago");
        assert_eq!(recs[0].category, "Equity");
        assert_eq!(recs[0].entity_id, "Natco Pharma");
        assert_eq!(recs[0].external_id.len(), 12);

        assert_eq!(recs[1].entity_id, "Tata Motors");
        assert_eq!(recs[1].category, "Result");

        // no category line: the next card's headline must not be swallowed
        assert_eq!(recs[2].text, "BEL & HAL sign MoU for joint radar development programme");
        assert_eq!(recs[2].category, "");
        assert_eq!(recs[3].raw_timestamp, "2 hours ago");
        assert!(recs.iter().all(|r| r.source == "nuvama"));
    }

    #[test]
    fn boilerplate_and_short_lines_are_not_headlines() {
        assert!(!is_headline_candidate("Live News"));
        assert!(!is_headline_candidate(
            "All rights reserved. Broking services offered by Nuvama Wealth"
        ));
        assert!(is_headline_candidate(
            "Infosys wins large deal from European retailer worth $1.5 bn"
        ));
    }

    #[tokio::test]
    async fn inline_mode_fetches_without_network() {
        let src = PageTextSource::from_html("nuvama", PAGE);
        assert_eq!(src.fetch().await.unwrap().len(), 4);
        assert_eq!(src.name(), "nuvama");
    }
}

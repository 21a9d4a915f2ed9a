// src/source/mod.rs
//! Source adapters: one polymorphic interface, one variant per kind of site,
//! selected by configuration.

pub mod fixture;
pub mod page_text;
pub mod rss;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

use crate::config::{SourceConfig, SourceKind};
use crate::metrics::{RECORDS_TOTAL, SOURCE_ERRORS_TOTAL};
use crate::types::HeadlineRecord;

pub use fixture::FixtureSource;
pub use page_text::PageTextSource;
pub use rss::RssSource;

/// Produces a finite batch of records per call; every cycle fetches afresh.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self) -> Result<Vec<HeadlineRecord>>;
    fn name(&self) -> &str;
}

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Decode entities, normalize typographic quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let out = html_escape::decode_html_entities(s).to_string();
    let out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    RE_WS.replace_all(&out, " ").trim().to_string()
}

/// Company hint from a headline's prefix: the text before the first " (",
/// " - :" or ":" ("Natco Pharma (+1.2%): ..." → "Natco Pharma").
pub fn entity_hint(headline: &str) -> String {
    let cut = [" (", " - :", ":"]
        .iter()
        .filter_map(|d| headline.find(d))
        .min();
    match cut {
        Some(i) => {
            let prefix = headline[..i].trim().trim_end_matches(['-', '–', '—']).trim();
            if prefix.chars().count() <= 80 {
                prefix.to_string()
            } else {
                String::new()
            }
        }
        None => String::new(),
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("headline-sentinel/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")
}

/// Construct one adapter from its configuration.
pub fn from_config(cfg: &SourceConfig, timeout: Duration) -> Result<Box<dyn SourceAdapter>> {
    let name = cfg.name.trim().to_string();
    match cfg.kind {
        SourceKind::PageText => {
            let url = cfg
                .url
                .clone()
                .ok_or_else(|| anyhow!("source {name}: page_text requires url"))?;
            Ok(Box::new(PageTextSource::from_url(&name, &url, timeout)?))
        }
        SourceKind::Rss => {
            let url = cfg
                .url
                .clone()
                .ok_or_else(|| anyhow!("source {name}: rss requires url"))?;
            Ok(Box::new(RssSource::from_url(&name, &url, timeout)?))
        }
        SourceKind::Fixture => {
            let path = cfg
                .path
                .clone()
                .ok_or_else(|| anyhow!("source {name}: fixture requires path"))?;
            Ok(Box::new(FixtureSource::new(&name, path)))
        }
    }
}

/// Every enabled source that could be constructed; broken entries are logged
/// and skipped.
pub fn build_sources<'a, I>(configs: I, timeout: Duration) -> Vec<Box<dyn SourceAdapter>>
where
    I: IntoIterator<Item = &'a SourceConfig>,
{
    configs
        .into_iter()
        .filter(|c| c.enabled)
        .filter_map(|c| match from_config(c, timeout) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(target: "source", source = %c.name, error = %format!("{e:#}"), "source disabled");
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    pub source: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct FetchBatch {
    pub records: Vec<HeadlineRecord>,
    pub errors: Vec<SourceError>,
}

/// Fetch every adapter in order, each bounded by `timeout`. Failures are
/// collected, never fatal: the batch holds whatever was obtained.
pub async fn fetch_all(sources: &[Box<dyn SourceAdapter>], timeout: Duration) -> FetchBatch {
    let mut batch = FetchBatch::default();
    for s in sources {
        let res = tokio::time::timeout(timeout, s.fetch()).await;
        let err = match res {
            Ok(Ok(mut v)) => {
                tracing::debug!(target: "source", source = s.name(), records = v.len(), "fetched");
                counter!(RECORDS_TOTAL, "source" => s.name().to_string()).increment(v.len() as u64);
                batch.records.append(&mut v);
                continue;
            }
            Ok(Err(e)) => format!("{e:#}"),
            Err(_) => format!("fetch timed out after {}s", timeout.as_secs()),
        };
        tracing::warn!(target: "source", source = s.name(), error = %err, "source fetch failed");
        counter!(SOURCE_ERRORS_TOTAL, "source" => s.name().to_string()).increment(1);
        batch.errors.push(SourceError {
            source: s.name().to_string(),
            message: err,
        });
    }
    batch
}

// src/source/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Offset, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use super::{entity_hint, http_client, normalize_text, SourceAdapter};
use crate::types::{short_hash, AbsoluteTime, HeadlineRecord};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    guid: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    category: Option<String>,
}

fn parse_pub_date(ts: &str) -> Option<AbsoluteTime> {
    let dt = OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()?;
    DateTime::from_timestamp(dt.unix_timestamp(), 0).map(|t| t.with_timezone(&Utc.fix()))
}

enum Mode {
    Inline(String),
    Http { url: String, client: reqwest::Client },
}

/// RSS 2.0 feed. `pubDate` is resolved here, so the record carries a parsed
/// time and the raw string only for display.
pub struct RssSource {
    name: String,
    mode: Mode,
}

impl RssSource {
    pub fn from_url(name: &str, url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            mode: Mode::Http {
                url: url.to_string(),
                client: http_client(timeout)?,
            },
        })
    }

    pub fn from_xml(name: &str, xml: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Inline(xml.to_string()),
        }
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<HeadlineRecord>> {
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing {} rss xml", self.name))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let text = normalize_text(it.title.as_deref().unwrap_or_default());
            if text.is_empty() {
                continue;
            }
            let raw_ts = it.pub_date.unwrap_or_default();
            let external_id = it
                .guid
                .or(it.link)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| short_hash(&text));

            let entity = entity_hint(&text);
            let mut rec = HeadlineRecord::new(text, raw_ts.as_str(), self.name.as_str(), entity)
                .with_category(it.category.unwrap_or_default());
            rec.parsed_time = parse_pub_date(&raw_ts);
            rec.external_id = external_id;
            out.push(rec);
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for RssSource {
    async fn fetch(&self) -> Result<Vec<HeadlineRecord>> {
        match &self.mode {
            Mode::Inline(xml) => self.parse_items_from_str(xml),
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
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&#8377;", "₹")
}

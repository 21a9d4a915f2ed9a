// src/source/fixture.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

use super::SourceAdapter;
use crate::types::HeadlineRecord;

/// JSON array of `HeadlineRecord`s read from disk on every fetch. Records with
/// an empty `source` are attributed to this adapter.
pub struct FixtureSource {
    name: String,
    path: PathBuf,
}

impl FixtureSource {
    pub fn new(name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for FixtureSource {
    async fn fetch(&self) -> Result<Vec<HeadlineRecord>> {
        let raw = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading fixture {}", self.path.display()))?;
        let mut records: Vec<HeadlineRecord> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing fixture {}", self.path.display()))?;
        for r in records.iter_mut() {
            if r.source.trim().is_empty() {
                r.source = self.name.clone();
            }
        }
        Ok(records)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

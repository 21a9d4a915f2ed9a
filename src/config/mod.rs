// src/config/mod.rs
//! Monitor configuration: one TOML document, every field defaulted, then
//! environment overrides on top. A missing file is the default configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::category::RESULTS;
use crate::similarity::DEFAULT_THRESHOLD;
use crate::timestamp::DEFAULT_UTC_OFFSET_MINUTES;

pub const ENV_CONFIG_PATH: &str = "SENTINEL_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/sentinel.toml";

pub const ENV_SIMILARITY_THRESHOLD: &str = "SIMILARITY_THRESHOLD";
pub const ENV_EMBEDDING: &str = "SENTINEL_EMBEDDING";
pub const ENV_EXCLUDE_RESULTS: &str = "EXCLUDE_RESULTS_ALERTS";
pub const ENV_STATE_DIR: &str = "SENTINEL_STATE_DIR";
pub const ENV_BIND: &str = "SENTINEL_BIND";

pub const DEFAULT_SOURCE_URL: &str = "https://www.nuvamawealth.com/live-news";

fn default_true() -> bool {
    true
}
fn default_interval() -> u64 {
    60
}
fn default_fetch_timeout() -> u64 {
    45
}
fn default_deliver_timeout() -> u64 {
    10
}
fn default_deliver_pause() -> u64 {
    2_000
}
fn default_offset() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}
fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}
fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}
fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_interval")]
    pub error_backoff_secs: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_deliver_timeout")]
    pub deliver_timeout_secs: u64,
    #[serde(default = "default_deliver_pause")]
    pub deliver_pause_ms: u64,
    #[serde(default = "default_offset")]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Alert on the very first cycle instead of seeding silently.
    #[serde(default)]
    pub first_run_alerts: bool,
    #[serde(default = "default_true")]
    pub startup_notice: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            error_backoff_secs: default_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
            deliver_timeout_secs: default_deliver_timeout(),
            deliver_pause_ms: default_deliver_pause(),
            utc_offset_minutes: default_offset(),
            state_dir: default_state_dir(),
            first_run_alerts: false,
            startup_notice: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilaritySettings {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default)]
    pub embedding: bool,
}

impl Default for SimilaritySettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            embedding: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchlistSettings {
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategorySettings {
    /// Categories whose records are archived but never alerted.
    #[serde(default)]
    pub suppress: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    PageText,
    Rss,
    Fixture,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl SourceConfig {
    pub fn fixture(name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            kind: SourceKind::Fixture,
            url: None,
            path: Some(path.into()),
            enabled: true,
        }
    }
}

fn default_sources() -> Vec<SourceConfig> {
    vec![SourceConfig {
        name: "nuvama".to_string(),
        kind: SourceKind::PageText,
        url: Some(DEFAULT_SOURCE_URL.to_string()),
        path: None,
        enabled: true,
    }]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub similarity: SimilaritySettings,
    #[serde(default)]
    pub watchlist: WatchlistSettings,
    #[serde(default)]
    pub categories: CategorySettings,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub api: ApiSettings,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorSettings::default(),
            similarity: SimilaritySettings::default(),
            watchlist: WatchlistSettings::default(),
            categories: CategorySettings::default(),
            sources: default_sources(),
            api: ApiSettings::default(),
        }
    }
}

/// Parse a float env value and clamp into [0, 1]; garbage is ignored.
fn parse_threshold_env(raw: Option<String>) -> Option<f32> {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

fn parse_bool_env(raw: Option<String>) -> Option<bool> {
    raw.map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl SentinelConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: SentinelConfig = toml::from_str(s).context("parsing sentinel config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&data)
    }

    /// `$SENTINEL_CONFIG_PATH`, else `config/sentinel.toml` if present, else
    /// defaults; environment overrides applied last.
    pub fn load() -> Result<Self> {
        let mut cfg = match env::var(ENV_CONFIG_PATH) {
            Ok(p) => Self::load_from_file(PathBuf::from(p))?,
            Err(_) => {
                let p = PathBuf::from(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    Self::load_from_file(&p)?
                } else {
                    tracing::info!(target: "monitor", "no config file; using defaults");
                    Self::default()
                }
            }
        };
        cfg.apply_env_overrides(|k| env::var(k).ok());
        Ok(cfg)
    }

    /// Overrides from a key lookup (the process env in production).
    pub fn apply_env_overrides<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(t) = parse_threshold_env(get(ENV_SIMILARITY_THRESHOLD)) {
            self.similarity.threshold = t;
        }
        if let Some(on) = parse_bool_env(get(ENV_EMBEDDING)) {
            self.similarity.embedding = on;
        }
        if parse_bool_env(get(ENV_EXCLUDE_RESULTS)) == Some(true)
            && !self
                .categories
                .suppress
                .iter()
                .any(|c| c.eq_ignore_ascii_case(RESULTS))
        {
            self.categories.suppress.push(RESULTS.to_string());
        }
        if let Some(dir) = get(ENV_STATE_DIR).filter(|s| !s.trim().is_empty()) {
            self.monitor.state_dir = PathBuf::from(dir.trim());
        }
        if let Some(bind) = get(ENV_BIND).filter(|s| !s.trim().is_empty()) {
            self.api.bind = bind.trim().to_string();
        }
        self.sanitize();
    }

    fn sanitize(&mut self) {
        if !(0.0..=1.0).contains(&self.similarity.threshold) {
            self.similarity.threshold = default_threshold();
        }
        let m = &mut self.monitor;
        for secs in [
            &mut m.interval_secs,
            &mut m.error_backoff_secs,
            &mut m.fetch_timeout_secs,
            &mut m.deliver_timeout_secs,
        ] {
            if *secs == 0 {
                *secs = 1;
            }
        }
        self.sources.retain(|s| !s.name.trim().is_empty());
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_document_is_default() {
        let cfg = SentinelConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.monitor.interval_secs, 60);
        assert_eq!(cfg.monitor.utc_offset_minutes, 330);
        assert_eq!(cfg.similarity.threshold, DEFAULT_THRESHOLD);
        assert!(!cfg.similarity.embedding);
        assert_eq!(cfg.sources.len(), 1);
        assert_eq!(cfg.sources[0].kind, SourceKind::PageText);
        assert_eq!(cfg.api.bind, "0.0.0.0:5000");
    }

    #[test]
    fn parses_sections_and_sanitizes() {
        let cfg = SentinelConfig::from_toml_str(
            r#"
[monitor]
interval_secs = 0
state_dir = "/tmp/s"

[similarity]
threshold = 4.2
embedding = true

[categories]
suppress = ["results"]

[[sources]]
name = "wire"
kind = "rss"
url = "https://example.com/feed.xml"

[[sources]]
name = "replay"
kind = "fixture"
path = "fixtures/a.json"
enabled = false
"#,
        )
        .unwrap();
        assert_eq!(cfg.monitor.interval_secs, 1);
        assert_eq!(cfg.monitor.state_dir, PathBuf::from("/tmp/s"));
        assert_eq!(cfg.similarity.threshold, DEFAULT_THRESHOLD);
        assert!(cfg.similarity.embedding);
        assert_eq!(cfg.sources.len(), 2);
        let names: Vec<_> = cfg.enabled_sources().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["wire"]);
    }

    #[test]
    fn env_overrides_apply_and_clamp() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_SIMILARITY_THRESHOLD, "1.5"),
            (ENV_EMBEDDING, "true"),
            (ENV_EXCLUDE_RESULTS, "TRUE"),
            (ENV_STATE_DIR, "/var/lib/sentinel"),
        ]);
        let mut cfg = SentinelConfig::default();
        cfg.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.similarity.threshold, 1.0);
        assert!(cfg.similarity.embedding);
        assert_eq!(cfg.categories.suppress, vec![RESULTS.to_string()]);
        assert_eq!(cfg.monitor.state_dir, PathBuf::from("/var/lib/sentinel"));

        // applying twice does not duplicate the category
        cfg.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.categories.suppress.len(), 1);
    }

    #[test]
    fn garbage_threshold_env_is_ignored() {
        assert_eq!(parse_threshold_env(Some("abc".into())), None);
        assert_eq!(parse_threshold_env(Some("NaN".into())), None);
        assert_eq!(parse_threshold_env(Some(" 0.7 ".into())), Some(0.7));
        assert_eq!(parse_threshold_env(Some("-3".into())), Some(0.0));
    }
}

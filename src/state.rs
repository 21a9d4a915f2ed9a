//! # State Store
//! Four independently loadable JSON documents under one state directory:
//!
//! - `headlines_seen.json`: layer A fingerprints
//! - `last_check_timestamp.json`: end of the last completed cycle
//! - `context_memory.json`: layer B memory window
//! - `error_log.json`: the most recent 100 errors
//!
//! Every read is lenient: a missing, unreadable or structurally invalid file
//! yields the empty default (logged, never propagated). Documents carry
//! `"version": 1`; legacy bare arrays are still accepted, a newer version is
//! treated as invalid. Writes go to a temp file that is then renamed over the
//! target.

use anyhow::{Context, Result};
use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::dedup::{Fingerprint, SeenSet};
use crate::types::AbsoluteTime;

pub const STATE_VERSION: u32 = 1;
pub const MEMORY_RETENTION_HOURS: i64 = 24;
pub const MEMORY_MAX_ENTRIES: usize = 200;
pub const ERROR_LOG_MAX: usize = 100;

pub const SEEN_FILE: &str = "headlines_seen.json";
pub const LAST_CHECK_FILE: &str = "last_check_timestamp.json";
pub const MEMORY_FILE: &str = "context_memory.json";
pub const ERROR_LOG_FILE: &str = "error_log.json";

/// One accepted headline kept for cross-source comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMemoryEntry {
    pub text: String,
    /// Aggressive canonical form.
    #[serde(default)]
    pub canonical_text: String,
    #[serde(default)]
    pub content_tokens: BTreeSet<String>,
    pub accepted_at: AbsoluteTime,
    pub source: String,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Rolling window of accepted headlines, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryWindow {
    entries: Vec<ContextMemoryEntry>,
}

impl MemoryWindow {
    pub fn from_entries(entries: Vec<ContextMemoryEntry>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, entry: ContextMemoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ContextMemoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries older than the retention window, then keep only the most
    /// recent `MEMORY_MAX_ENTRIES` by acceptance order.
    pub fn prune(&mut self, now: AbsoluteTime) {
        let cutoff = now - Duration::hours(MEMORY_RETENTION_HOURS);
        self.entries.retain(|e| e.accepted_at >= cutoff);
        if self.entries.len() > MEMORY_MAX_ENTRIES {
            let excess = self.entries.len() - MEMORY_MAX_ENTRIES;
            self.entries.drain(0..excess);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: AbsoluteTime,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Serialize)]
struct ListDocOut<'a, T> {
    version: u32,
    items: &'a [T],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListDocIn<T> {
    Versioned { version: u32, items: Vec<T> },
    Legacy(Vec<T>),
}

#[derive(Debug, Serialize, Deserialize)]
struct LastCheckDoc {
    #[serde(default = "legacy_version")]
    version: u32,
    last_check: AbsoluteTime,
    #[serde(default)]
    last_check_readable: String,
}

fn legacy_version() -> u32 {
    STATE_VERSION
}

#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    // --- fingerprints ---

    pub fn load_seen(&self) -> SeenSet {
        SeenSet::from_fingerprints(self.read_list::<Fingerprint>(SEEN_FILE))
    }

    pub fn save_seen(&self, seen: &SeenSet) -> Result<()> {
        let items: Vec<Fingerprint> = seen.snapshot().into_iter().collect();
        self.write_list(SEEN_FILE, &items)
    }

    // --- last check ---

    pub fn load_last_check(&self) -> Option<AbsoluteTime> {
        let raw = self.read_raw(LAST_CHECK_FILE)?;
        match serde_json::from_str::<LastCheckDoc>(&raw) {
            Ok(doc) if doc.version <= STATE_VERSION => Some(doc.last_check),
            Ok(doc) => {
                tracing::warn!(target: "state", file = LAST_CHECK_FILE, version = doc.version, "unsupported state version; ignoring");
                None
            }
            Err(e) => {
                tracing::warn!(target: "state", file = LAST_CHECK_FILE, error = %e, "invalid state document; using default");
                None
            }
        }
    }

    pub fn save_last_check(&self, t: AbsoluteTime) -> Result<()> {
        let doc = LastCheckDoc {
            version: STATE_VERSION,
            last_check: t,
            last_check_readable: t.format("%d %b %Y %I:%M:%S %p").to_string(),
        };
        self.write_json(LAST_CHECK_FILE, &doc)
    }

    // --- memory window ---

    pub fn load_memory(&self) -> MemoryWindow {
        MemoryWindow::from_entries(self.read_list(MEMORY_FILE))
    }

    /// Prunes `memory` in place, then persists it.
    pub fn save_memory(&self, memory: &mut MemoryWindow, now: AbsoluteTime) -> Result<()> {
        memory.prune(now);
        self.write_list(MEMORY_FILE, memory.entries())
    }

    // --- error log ---

    pub fn load_error_log(&self) -> Vec<ErrorRecord> {
        self.read_list(ERROR_LOG_FILE)
    }

    /// Append to the persisted error log, keeping the last `ERROR_LOG_MAX`.
    /// Failure to persist is logged only.
    pub fn record_error(
        &self,
        kind: &str,
        message: &str,
        details: Option<String>,
        now: AbsoluteTime,
    ) {
        let mut log = self.load_error_log();
        log.push(ErrorRecord {
            timestamp: now,
            kind: kind.to_string(),
            message: message.to_string(),
            details,
        });
        if log.len() > ERROR_LOG_MAX {
            let excess = log.len() - ERROR_LOG_MAX;
            log.drain(0..excess);
        }
        if let Err(e) = self.write_list(ERROR_LOG_FILE, &log) {
            tracing::warn!(target: "state", error = %format!("{e:#}"), "error log write failed");
        }
    }

    // --- plumbing ---

    fn read_raw(&self, file: &str) -> Option<String> {
        let path = self.path(file);
        match fs::read_to_string(&path) {
            Ok(s) => Some(s),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(target: "state", file, "no state file yet");
                None
            }
            Err(e) => {
                tracing::warn!(target: "state", file, error = %e, "state read failed; using default");
                None
            }
        }
    }

    fn read_list<T: DeserializeOwned>(&self, file: &str) -> Vec<T> {
        let Some(raw) = self.read_raw(file) else {
            return Vec::new();
        };
        match serde_json::from_str::<ListDocIn<T>>(&raw) {
            Ok(ListDocIn::Versioned { version, items }) if version <= STATE_VERSION => items,
            Ok(ListDocIn::Versioned { version, .. }) => {
                tracing::warn!(target: "state", file, version, "unsupported state version; ignoring");
                Vec::new()
            }
            Ok(ListDocIn::Legacy(items)) => items,
            Err(e) => {
                tracing::warn!(target: "state", file, error = %e, "invalid state document; using default");
                Vec::new()
            }
        }
    }

    fn write_list<T: Serialize>(&self, file: &str, items: &[T]) -> Result<()> {
        self.write_json(
            file,
            &ListDocOut {
                version: STATE_VERSION,
                items,
            },
        )
    }

    fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating state dir {}", self.dir.display()))?;
        let target = self.path(file);
        let tmp = self.path(&format!("{file}.tmp"));
        let body = serde_json::to_vec_pretty(value).context("serializing state")?;
        fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &target).with_context(|| format!("replacing {}", target.display()))?;
        Ok(())
    }
}

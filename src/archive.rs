//! Headline archive read by the dashboard API: a bare JSON array, newest first,
//! capped at `ARCHIVE_MAX` entries. Independent of the seen set and the memory
//! window.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ARCHIVE_FILE: &str = "headlines_database.json";
pub const ARCHIVE_MAX: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub headline: String,
    /// "03 Nov 08:26 AM", or the raw source string when it could not be parsed.
    pub timestamp: String,
    /// "2025-11-03"
    pub date: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub entity: String,
}

#[derive(Debug, Clone)]
pub struct JsonArchive {
    path: PathBuf,
}

impl JsonArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(ARCHIVE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, newest first. Unreadable or invalid files read as empty.
    pub fn load(&self) -> Vec<ArchiveEntry> {
        match fs::read_to_string(&self.path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(target: "state", file = %self.path.display(), error = %e, "archive unreadable; treating as empty");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<ArchiveEntry> {
        let mut v = self.load();
        v.truncate(limit);
        v
    }

    pub fn append(&self, entry: ArchiveEntry) -> Result<()> {
        let mut db = self.load();
        db.insert(0, entry);
        db.truncate(ARCHIVE_MAX);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating archive dir {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(&db).context("serializing archive")?;
        fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(h: &str) -> ArchiveEntry {
        ArchiveEntry {
            headline: h.into(),
            timestamp: "03 Nov 08:26 AM".into(),
            date: "2025-11-03".into(),
            source: "nuvama".into(),
            entity: String::new(),
        }
    }

    #[test]
    fn newest_first_and_capped() {
        let dir = tempfile::tempdir().unwrap();
        let a = JsonArchive::in_dir(dir.path());
        for i in 0..(ARCHIVE_MAX + 7) {
            a.append(e(&format!("h{i}"))).unwrap();
        }
        let all = a.load();
        assert_eq!(all.len(), ARCHIVE_MAX);
        assert_eq!(all[0].headline, format!("h{}", ARCHIVE_MAX + 6));
        assert_eq!(a.recent(2).len(), 2);
    }

    #[test]
    fn reads_dashboard_entries_without_source() {
        let dir = tempfile::tempdir().unwrap();
        let a = JsonArchive::in_dir(dir.path());
        fs::write(
            a.path(),
            r#"[{"headline":"x","timestamp":"03 Nov 08:26 AM","date":"2025-11-03"}]"#,
        )
        .unwrap();
        assert_eq!(a.load()[0].source, "");
    }

    #[test]
    fn corrupt_archive_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let a = JsonArchive::in_dir(dir.path());
        fs::write(a.path(), "{not json").unwrap();
        assert!(a.load().is_empty());
        a.append(e("fresh")).unwrap();
        assert_eq!(a.load().len(), 1);
    }
}

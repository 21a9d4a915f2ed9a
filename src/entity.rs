//! # Entity Filter
//! Watchlist built from one or more reference lists (JSON or TOML), each row
//! giving a symbol and/or display name plus optional explicit aliases.
//!
//! - Matching a record's entity id is **exact** against the alias set, never
//!   substring, so a two-letter alias cannot fire inside an unrelated word.
//! - If no reference list could be loaded, or the lists are empty, the filter
//!   fails open and every record matches.
//! - The similarity engine reuses the same aliases to find entities mentioned
//!   in headline text (`Watchlist::entities_in`).

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::canon::{self, CORPORATE_SUFFIXES};

/// One row of a reference list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferenceRow {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl ReferenceRow {
    pub fn new(symbol: &str, name: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            name: Some(name.to_string()),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }
}

/// Canonical entity name plus every lowercase alias that maps to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchlistEntry {
    pub canonical: String,
    pub aliases: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct TextAlias {
    phrase: String,
    canonical: String,
    multi_word: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Watchlist {
    entries: Vec<WatchlistEntry>,
    alias_to_canonical: HashMap<String, String>,
    text_aliases: Vec<TextAlias>,
}

/// Lowercase, `&` → "and", punctuation stripped, corporate suffixes dropped.
pub fn normalize_entity(s: &str) -> String {
    let lowered = s.trim().to_lowercase().replace('&', " and ");
    let mut cleaned = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        match ch {
            c if c.is_alphanumeric() || c.is_whitespace() => cleaned.push(c),
            '.' | '\'' | '’' => {}
            _ => cleaned.push(' '),
        }
    }
    cleaned
        .split_whitespace()
        .filter(|t| !CORPORATE_SUFFIXES.contains(t))
        .collect::<Vec<_>>()
        .join(" ")
}

fn without_spaces(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

impl Watchlist {
    pub fn from_rows<I: IntoIterator<Item = ReferenceRow>>(rows: I) -> Self {
        let mut wl = Watchlist::default();
        let mut index_of: HashMap<String, usize> = HashMap::new();

        for row in rows {
            let name = row.name.as_deref().map(str::trim).unwrap_or_default();
            let symbol = row.symbol.as_deref().map(str::trim).unwrap_or_default();
            let canonical = if !name.is_empty() { name } else { symbol };
            if canonical.is_empty() {
                continue;
            }

            let mut aliases = BTreeSet::new();
            if !symbol.is_empty() {
                aliases.insert(symbol.to_lowercase());
                aliases.insert(normalize_entity(symbol));
            }
            if !name.is_empty() {
                let norm = normalize_entity(name);
                aliases.insert(without_spaces(&norm));
                aliases.insert(norm);
            }
            for a in &row.aliases {
                aliases.insert(a.trim().to_lowercase());
                aliases.insert(normalize_entity(a));
            }
            aliases.retain(|a| !a.is_empty());

            let idx = *index_of.entry(canonical.to_string()).or_insert_with(|| {
                wl.entries.push(WatchlistEntry {
                    canonical: canonical.to_string(),
                    aliases: BTreeSet::new(),
                });
                wl.entries.len() - 1
            });
            for alias in aliases {
                if let Some(prev) = wl.alias_to_canonical.get(&alias) {
                    if prev != canonical {
                        tracing::debug!(
                            target: "watchlist",
                            %alias, kept = %prev, ignored = %canonical,
                            "alias collision; first entity wins"
                        );
                    }
                    continue;
                }
                wl.alias_to_canonical
                    .insert(alias.clone(), canonical.to_string());
                wl.entries[idx].aliases.insert(alias);
            }
        }

        wl.text_aliases = build_text_aliases(&wl.alias_to_canonical);
        wl
    }

    pub fn entries(&self) -> &[WatchlistEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup of an entity id (normalized, then its no-space form).
    pub fn canonical_for(&self, entity_id: &str) -> Option<&str> {
        let norm = normalize_entity(entity_id);
        if norm.is_empty() {
            return None;
        }
        self.alias_to_canonical
            .get(&norm)
            .or_else(|| self.alias_to_canonical.get(&without_spaces(&norm)))
            .map(String::as_str)
    }

    pub fn matches(&self, entity_id: &str) -> bool {
        self.canonical_for(entity_id).is_some()
    }

    /// Canonical names of watchlist entities mentioned in an aggressive
    /// canonical text. Single-word aliases must match a whole token;
    /// multi-word aliases may match as a substring.
    pub fn entities_in(&self, aggressive_text: &str) -> BTreeSet<&str> {
        let tokens: HashSet<&str> = aggressive_text.split_whitespace().collect();
        self.text_aliases
            .iter()
            .filter(|a| {
                if a.multi_word {
                    aggressive_text.contains(a.phrase.as_str())
                } else {
                    tokens.contains(a.phrase.as_str())
                }
            })
            .map(|a| a.canonical.as_str())
            .collect()
    }
}

/// Aliases rewritten into the aggressive canonical vocabulary so they line up
/// with headline text ("Natco Pharma Ltd" → "natco pharma").
fn build_text_aliases(alias_to_canonical: &HashMap<String, String>) -> Vec<TextAlias> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut sorted: Vec<(&String, &String)> = alias_to_canonical.iter().collect();
    sorted.sort();
    sorted
        .into_iter()
        .filter_map(|(alias, canonical)| {
            let phrase = canon::aggressive(alias);
            if phrase.is_empty() || !seen.insert(phrase.clone()) {
                return None;
            }
            Some(TextAlias {
                multi_word: phrase.contains(' '),
                phrase,
                canonical: canonical.clone(),
            })
        })
        .collect()
}

/// Load reference rows from an explicit path. Supports TOML or JSON formats.
pub fn load_reference_list(path: &Path) -> Result<Vec<ReferenceRow>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading watchlist from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_reference_list(&content, ext.as_str())
        .with_context(|| format!("parsing watchlist {}", path.display()))
}

fn parse_reference_list(s: &str, hint_ext: &str) -> Result<Vec<ReferenceRow>> {
    let try_toml = hint_ext == "toml" || s.contains("[[entities]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported watchlist format"))
}

fn parse_toml(s: &str) -> Result<Vec<ReferenceRow>> {
    #[derive(Deserialize)]
    struct TomlList {
        entities: Vec<ReferenceRow>,
    }
    let v: TomlList = toml::from_str(s)?;
    Ok(v.entities)
}

fn parse_json(s: &str) -> Result<Vec<ReferenceRow>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum JsonList {
        Rows(Vec<ReferenceRow>),
        Wrapped { entities: Vec<ReferenceRow> },
    }
    Ok(match serde_json::from_str::<JsonList>(s)? {
        JsonList::Rows(v) => v,
        JsonList::Wrapped { entities } => entities,
    })
}

/// Watchlist filter with fail-open semantics, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    watchlist: Option<Arc<Watchlist>>,
    load_errors: Vec<String>,
}

impl EntityFilter {
    /// Load and merge every reference list. Lists that fail to load are
    /// skipped; if none loads the filter stays open.
    pub fn load(paths: &[PathBuf]) -> Self {
        let mut rows = Vec::new();
        let mut loaded_any = false;
        let mut load_errors = Vec::new();

        for p in paths {
            match load_reference_list(p) {
                Ok(mut v) => {
                    loaded_any = true;
                    rows.append(&mut v);
                }
                Err(e) => {
                    tracing::warn!(target: "watchlist", error = %format!("{e:#}"), "watchlist load failed");
                    load_errors.push(format!("{e:#}"));
                }
            }
        }

        if !loaded_any {
            if !paths.is_empty() {
                tracing::warn!(target: "watchlist", "no watchlist loaded; entity filter fails open");
            }
            return Self {
                watchlist: None,
                load_errors,
            };
        }

        let wl = Watchlist::from_rows(rows);
        tracing::info!(target: "watchlist", entities = wl.len(), "watchlist loaded");
        Self {
            watchlist: Some(Arc::new(wl)),
            load_errors,
        }
    }

    pub fn from_watchlist(watchlist: Watchlist) -> Self {
        Self {
            watchlist: Some(Arc::new(watchlist)),
            load_errors: Vec::new(),
        }
    }

    /// Open filter: no watchlist at all.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn watchlist(&self) -> Option<Arc<Watchlist>> {
        self.watchlist.clone()
    }

    /// True when a non-empty watchlist is in force.
    pub fn is_active(&self) -> bool {
        self.watchlist.as_ref().is_some_and(|w| !w.is_empty())
    }

    pub fn load_errors(&self) -> &[String] {
        &self.load_errors
    }

    pub fn matches(&self, entity_id: &str) -> bool {
        match &self.watchlist {
            Some(w) if !w.is_empty() => w.matches(entity_id),
            _ => true,
        }
    }
}

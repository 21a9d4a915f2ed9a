//! Exact dedup (layer A): SHA-256 fingerprints of the conservative canonical
//! form, checked against the persisted set of everything seen so far.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashSet};

use crate::canon;

/// Hex-encoded SHA-256 of a headline's conservative canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(text: &str) -> Self {
        let canonical = canon::conservative(text);
        let digest = Sha256::digest(canonical.as_bytes());
        let mut hex = String::with_capacity(64);
        for b in digest.iter() {
            use std::fmt::Write as _;
            let _ = write!(&mut hex, "{:02x}", b);
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Append-only set of fingerprints seen across the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    inner: HashSet<Fingerprint>,
}

impl SeenSet {
    pub fn from_fingerprints<I: IntoIterator<Item = Fingerprint>>(items: I) -> Self {
        Self {
            inner: items.into_iter().collect(),
        }
    }

    /// Returns `true` when `text` was never seen and records it immediately, so a
    /// repeat later in the same cycle is already a duplicate.
    pub fn check(&mut self, text: &str) -> bool {
        self.inner.insert(Fingerprint::of(text))
    }

    pub fn contains(&self, text: &str) -> bool {
        self.inner.contains(&Fingerprint::of(text))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Sorted snapshot for deterministic persistence.
    pub fn snapshot(&self) -> BTreeSet<Fingerprint> {
        self.inner.iter().cloned().collect()
    }
}

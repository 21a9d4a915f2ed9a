//! # Contextual Similarity (layer B)
//! Weighted multi-signal score between two headlines, computed on their
//! aggressive canonical forms:
//!
//! | signal      | no embedding | with embedding |
//! |-------------|--------------|----------------|
//! | sequence    | 0.20         | 0.15           |
//! | jaccard     | 0.20         | 0.15           |
//! | containment | 0.20         | 0.15           |
//! | numeric     | 0.15         | 0.10           |
//! | entity      | 0.25         | 0.25           |
//! | embedding   | -            | 0.10           |
//!
//! The weighted sum is divided by the sum of the weights actually used, so an
//! omitted signal redistributes instead of counting as zero. An entity overlap
//! of at least 0.5 adds a fixed 0.08 bonus; the result is clipped to [0, 1].
//!
//! `is_duplicate` only compares against memory entries from *other* sources.

use std::collections::BTreeSet;
use std::sync::Arc;
use strsim::normalized_levenshtein;

use crate::canon;
use crate::embedding::{Embedder, NoopEmbedder};
use crate::entity::Watchlist;
use crate::state::ContextMemoryEntry;
use crate::types::AbsoluteTime;

pub const DEFAULT_THRESHOLD: f32 = 0.68;
pub const ENTITY_BONUS: f32 = 0.08;
pub const ENTITY_BONUS_MIN_OVERLAP: f32 = 0.5;
/// Score used when neither side carries a number.
pub const NUMERIC_NEUTRAL: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalWeights {
    pub sequence: f32,
    pub jaccard: f32,
    pub containment: f32,
    pub numeric: f32,
    pub entity: f32,
    pub embedding: f32,
}

impl SignalWeights {
    pub const LEXICAL: SignalWeights = SignalWeights {
        sequence: 0.20,
        jaccard: 0.20,
        containment: 0.20,
        numeric: 0.15,
        entity: 0.25,
        embedding: 0.0,
    };

    pub const WITH_EMBEDDING: SignalWeights = SignalWeights {
        sequence: 0.15,
        jaccard: 0.15,
        containment: 0.15,
        numeric: 0.10,
        entity: 0.25,
        embedding: 0.10,
    };
}

/// Individual signal values, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signals {
    pub sequence: f32,
    pub jaccard: f32,
    pub containment: f32,
    pub numeric: f32,
    pub entity: f32,
    pub embedding: Option<f32>,
}

/// Text with everything the signals need precomputed.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub aggressive: String,
    pub tokens: BTreeSet<String>,
    pub numbers: Vec<f64>,
    pub entities: BTreeSet<String>,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateVerdict {
    pub is_duplicate: bool,
    pub best_score: f32,
    pub best_match: Option<String>,
}

pub struct SimilarityEngine {
    watchlist: Option<Arc<Watchlist>>,
    embedder: Arc<dyn Embedder>,
    weights: SignalWeights,
    threshold: f32,
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new(None, Arc::new(NoopEmbedder), DEFAULT_THRESHOLD)
    }
}

impl SimilarityEngine {
    /// Weights follow the embedder: lexical-only for a disabled embedder.
    pub fn new(
        watchlist: Option<Arc<Watchlist>>,
        embedder: Arc<dyn Embedder>,
        threshold: f32,
    ) -> Self {
        let weights = if embedder.enabled() {
            SignalWeights::WITH_EMBEDDING
        } else {
            SignalWeights::LEXICAL
        };
        let threshold = if (0.0..=1.0).contains(&threshold) {
            threshold
        } else {
            DEFAULT_THRESHOLD
        };
        Self {
            watchlist,
            embedder,
            weights,
            threshold,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        if (0.0..=1.0).contains(&threshold) {
            self.threshold = threshold;
        }
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn weights(&self) -> SignalWeights {
        self.weights
    }

    pub fn prepare(&self, text: &str) -> Prepared {
        let aggressive = canon::aggressive(text);
        let embedding = self.embedder.encode(text);
        self.prepare_canonical(aggressive, None, embedding)
    }

    /// Reuse what a memory entry already stores.
    fn prepare_entry(&self, entry: &ContextMemoryEntry) -> Prepared {
        let aggressive = if entry.canonical_text.is_empty() {
            canon::aggressive(&entry.text)
        } else {
            entry.canonical_text.clone()
        };
        let tokens = (!entry.content_tokens.is_empty()).then(|| entry.content_tokens.clone());
        let embedding = if self.embedder.enabled() {
            entry
                .embedding
                .clone()
                .or_else(|| self.embedder.encode(&entry.text))
        } else {
            None
        };
        self.prepare_canonical(aggressive, tokens, embedding)
    }

    fn prepare_canonical(
        &self,
        aggressive: String,
        tokens: Option<BTreeSet<String>>,
        embedding: Option<Vec<f32>>,
    ) -> Prepared {
        let tokens = tokens.unwrap_or_else(|| canon::content_tokens(&aggressive));
        let numbers = canon::numbers(&aggressive);
        let entities = self
            .watchlist
            .as_ref()
            .map(|w| {
                w.entities_in(&aggressive)
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Prepared {
            aggressive,
            tokens,
            numbers,
            entities,
            embedding,
        }
    }

    pub fn signals(&self, a: &Prepared, b: &Prepared) -> Signals {
        let embedding = match (&a.embedding, &b.embedding) {
            (Some(x), Some(y)) if self.embedder.enabled() => {
                Some(self.embedder.similarity(x, y).clamp(0.0, 1.0))
            }
            _ => None,
        };
        Signals {
            sequence: normalized_levenshtein(&a.aggressive, &b.aggressive) as f32,
            jaccard: jaccard(&a.tokens, &b.tokens),
            containment: containment(&a.tokens, &b.tokens),
            numeric: numeric_overlap(&a.numbers, &b.numbers),
            entity: containment(&a.entities, &b.entities),
            embedding,
        }
    }

    /// Weighted, renormalized, bonus applied, clipped.
    pub fn combine(&self, s: &Signals) -> f32 {
        let w = &self.weights;
        let mut sum = w.sequence * s.sequence
            + w.jaccard * s.jaccard
            + w.containment * s.containment
            + w.numeric * s.numeric
            + w.entity * s.entity;
        let mut used = w.sequence + w.jaccard + w.containment + w.numeric + w.entity;
        if let Some(e) = s.embedding {
            if w.embedding > 0.0 {
                sum += w.embedding * e;
                used += w.embedding;
            }
        }
        let mut score = if used > 0.0 { sum / used } else { 0.0 };
        if s.entity >= ENTITY_BONUS_MIN_OVERLAP {
            score += ENTITY_BONUS;
        }
        score.clamp(0.0, 1.0)
    }

    pub fn score(&self, a: &str, b: &str) -> f32 {
        let pa = self.prepare(a);
        let pb = self.prepare(b);
        self.combine(&self.signals(&pa, &pb))
    }

    /// Best cross-source match in `memory`; duplicate when `best >= threshold`.
    pub fn is_duplicate(
        &self,
        text: &str,
        source: &str,
        memory: &[ContextMemoryEntry],
    ) -> DuplicateVerdict {
        let incoming = self.prepare(text);
        let mut best_score = 0.0f32;
        let mut best_match: Option<&ContextMemoryEntry> = None;

        for entry in memory.iter().filter(|e| e.source != source) {
            let other = self.prepare_entry(entry);
            let s = self.combine(&self.signals(&incoming, &other));
            if best_match.is_none() || s > best_score {
                best_score = s;
                best_match = Some(entry);
            }
        }

        let is_duplicate = best_match.is_some() && best_score >= self.threshold;
        if is_duplicate {
            tracing::debug!(
                target: "similarity",
                score = best_score,
                matched_source = best_match.map(|e| e.source.as_str()).unwrap_or_default(),
                "cross-source duplicate"
            );
        }
        DuplicateVerdict {
            is_duplicate,
            best_score,
            best_match: best_match.map(|e| e.text.clone()),
        }
    }

    /// Memory entry for an accepted headline, with its canonical form, content
    /// tokens and (if enabled) embedding cached.
    pub fn memory_entry(
        &self,
        text: &str,
        source: &str,
        entity_id: &str,
        accepted_at: AbsoluteTime,
    ) -> ContextMemoryEntry {
        let p = self.prepare(text);
        ContextMemoryEntry {
            text: text.to_string(),
            canonical_text: p.aggressive,
            content_tokens: p.tokens,
            accepted_at,
            source: source.to_string(),
            entity_id: entity_id.to_string(),
            embedding: p.embedding,
        }
    }
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// `|A ∩ B| / min(|A|, |B|)`; 0 when either side is empty.
fn containment(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / smaller as f32
}

fn numeric_overlap(a: &[f64], b: &[f64]) -> f32 {
    if a.is_empty() && b.is_empty() {
        return NUMERIC_NEUTRAL;
    }
    let inter = a.iter().filter(|x| b.contains(x)).count();
    let union = a.len() + b.len() - inter;
    if union == 0 {
        return NUMERIC_NEUTRAL;
    }
    inter as f32 / union as f32
}

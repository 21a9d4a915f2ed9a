//! Optional embedding signal for the similarity engine.
//!
//! The strategy is picked once at construction: `NoopEmbedder` when the signal
//! is disabled (the similarity engine then leaves the signal out of the weighted
//! sum entirely), `HashingEmbedder` when enabled. The hashing embedder is a
//! local feature-hashing encoder over word tokens and character trigrams, so no
//! model download or network access is needed. Like a model it sees the raw
//! headline; only case and punctuation are folded.

use sha2::{Digest, Sha256};
use std::sync::Arc;

pub const HASHING_DIMS: usize = 256;

pub trait Embedder: Send + Sync {
    /// `None` means this embedder does not produce vectors.
    fn encode(&self, text: &str) -> Option<Vec<f32>>;

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }

    fn name(&self) -> &'static str;

    fn enabled(&self) -> bool {
        true
    }
}

/// Disabled signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEmbedder;

impl Embedder for NoopEmbedder {
    fn encode(&self, _text: &str) -> Option<Vec<f32>> {
        None
    }

    fn similarity(&self, _a: &[f32], _b: &[f32]) -> f32 {
        0.0
    }

    fn name(&self) -> &'static str {
        "noop"
    }

    fn enabled(&self) -> bool {
        false
    }
}

/// Feature-hashing encoder: every lowercased word of the raw text and every
/// character trigram is hashed (SHA-256, first 4 bytes) into one of `dims` buckets with a
/// sign bit, then the vector is L2-normalized.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dims: HASHING_DIMS }
    }
}

impl HashingEmbedder {
    fn add_feature(&self, v: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let h = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        let idx = (h as usize) % self.dims;
        let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
        v[idx] += sign * weight;
    }
}

impl Embedder for HashingEmbedder {
    fn encode(&self, text: &str) -> Option<Vec<f32>> {
        let folded: String = text
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let words: Vec<&str> = folded.split_whitespace().collect();
        if words.is_empty() {
            return None;
        }
        let mut v = vec![0.0f32; self.dims];
        for tok in &words {
            self.add_feature(&mut v, &format!("w:{tok}"), 1.0);
        }
        let joined = words.join(" ");
        let chars: Vec<char> = joined.chars().collect();
        for w in chars.windows(3) {
            let gram: String = w.iter().collect();
            self.add_feature(&mut v, &format!("c:{gram}"), 0.5);
        }
        normalize(&mut v);
        Some(v)
    }

    fn name(&self) -> &'static str {
        "hashing"
    }
}

fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity clamped to [0, 1]; mismatched or zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(0.0, 1.0)
}

/// Strategy selection at startup.
pub fn from_flag(enabled: bool) -> Arc<dyn Embedder> {
    if enabled {
        Arc::new(HashingEmbedder::default())
    } else {
        Arc::new(NoopEmbedder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_produces_nothing() {
        let e = NoopEmbedder;
        assert!(e.encode("anything").is_none());
        assert!(!e.enabled());
    }

    #[test]
    fn hashing_vectors_are_unit_length_and_deterministic() {
        let e = HashingEmbedder::default();
        let a = e.encode("BEL secures defence order").unwrap();
        let b = e.encode("BEL secures defence order").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HASHING_DIMS);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
        assert!(e.encode("   ").is_none());
        assert!(e.encode("-- : --").is_none());
    }

    #[test]
    fn encodes_the_raw_wording() {
        // the canonical vocabulary maps would make these identical
        let e = HashingEmbedder::default();
        let a = e.encode("Sensex falls").unwrap();
        let b = e.encode("Sensex drops").unwrap();
        assert!(e.similarity(&a, &b) < 0.999);
        assert_eq!(e.encode("SENSEX, falls!").unwrap(), a);
    }

    #[test]
    fn related_texts_score_higher_than_unrelated() {
        let e = HashingEmbedder::default();
        let a = e.encode("BEL secures orders worth Rs 500 crore").unwrap();
        let b = e.encode("BEL bags orders worth 500 cr").unwrap();
        let c = e.encode("Monsoon arrives early over Kerala coast").unwrap();
        assert!(e.similarity(&a, &b) > e.similarity(&a, &c));
        assert!((e.similarity(&a, &a) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cosine_handles_degenerate_input() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn flag_selects_strategy() {
        assert_eq!(from_flag(false).name(), "noop");
        assert_eq!(from_flag(true).name(), "hashing");
    }
}

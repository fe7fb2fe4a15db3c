//! Text embedding capability.
//!
//! The pipeline only sees the [`TextEmbedder`] trait: text in, fixed-length
//! vector out. The model identity reported by [`TextEmbedder::model_id`] is
//! recorded in every artifact, so swapping the model invalidates everything
//! fitted on top of it.

use crate::error::{Error, Result};
use crate::vector::Vector;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::warn;

/// Default embedding dimension (matches common sentence encoders).
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// An opaque `text -> vector` capability.
pub trait TextEmbedder: Send + Sync {
    /// Identity of the underlying model, including anything that changes
    /// its output (name, version, dimension).
    fn model_id(&self) -> &str;

    /// Length of every vector returned by [`TextEmbedder::embed`].
    fn dim(&self) -> usize;

    /// Embed one non-empty text.
    fn embed(&self, text: &str) -> Result<Vector>;
}

/// Result of embedding one field occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEmbedding {
    pub vector: Vector,
    /// False when the text was blank or the embedder failed and the zero
    /// vector was substituted.
    pub present: bool,
}

impl FieldEmbedding {
    pub fn absent(dim: usize) -> Self {
        Self {
            vector: Vector::zeros(dim),
            present: false,
        }
    }
}

/// Embed `text`, substituting the zero vector for blank input and for any
/// embedder failure. Failures are logged and never propagated.
pub fn embed_or_zero(embedder: &dyn TextEmbedder, text: Option<&str>) -> FieldEmbedding {
    let dim = embedder.dim();
    let text = match text.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return FieldEmbedding::absent(dim),
    };

    let result = embedder.embed(text).and_then(|vector| {
        if vector.dim() != dim {
            Err(Error::EncodingFailure(format!(
                "model {} returned {} values, expected {}",
                embedder.model_id(),
                vector.dim(),
                dim
            )))
        } else if !vector.as_slice().iter().all(|x| x.is_finite()) {
            Err(Error::EncodingFailure(format!(
                "model {} returned non-finite values",
                embedder.model_id()
            )))
        } else {
            Ok(vector)
        }
    });

    match result {
        Ok(vector) => FieldEmbedding {
            vector,
            present: true,
        },
        Err(e) => {
            warn!(model = embedder.model_id(), error = %e, "embedding failed, using zero vector");
            FieldEmbedding::absent(dim)
        }
    }
}

/// Embed a batch of texts in parallel. Output order matches input order.
pub fn embed_batch(embedder: &dyn TextEmbedder, texts: &[Option<String>]) -> Vec<FieldEmbedding> {
    texts
        .par_iter()
        .map(|text| embed_or_zero(embedder, text.as_deref()))
        .collect()
}

/// Deterministic feature-hashing embedder.
///
/// Words and padded character trigrams are hashed into signed buckets with
/// SHA-256, so the output is stable across platforms and toolchains. Shared
/// words and spellings give a positive cosine similarity, which is enough
/// for tests and for deployments without a neural encoder.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            model_id: format!("hashing-trigram-v1/{}", dim),
        }
    }

    fn bucket(&self, feature: &str) -> (usize, f64) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(bytes);
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        ((hash % self.dim as u64) as usize, sign)
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM)
    }
}

impl TextEmbedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vector> {
        if self.dim == 0 {
            return Err(Error::InvalidConfig("embedding dimension must be positive".to_string()));
        }

        let mut data = vec![0.0f64; self.dim];
        let normalized = text.to_lowercase();

        for trigram in generate_trigrams(&normalized) {
            let (pos, sign) = self.bucket(&format!("t:{}", trigram));
            data[pos] += sign;
        }

        for word in normalized
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())
        {
            let (pos, sign) = self.bucket(&format!("w:{}", word));
            data[pos] += 2.0 * sign; // words weigh more than spelling
        }

        let mut vector = Vector::new(data);
        if vector.normalize().is_err() {
            return Ok(Vector::zeros(self.dim));
        }
        Ok(vector)
    }
}

fn generate_trigrams(s: &str) -> HashSet<String> {
    let padded = format!("  {}  ", s);
    let chars: Vec<char> = padded.chars().collect();

    chars.windows(3).map(|w| w.iter().collect::<String>()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingEmbedder;

    impl TextEmbedder for FailingEmbedder {
        fn model_id(&self) -> &str {
            "failing"
        }

        fn dim(&self) -> usize {
            8
        }

        fn embed(&self, text: &str) -> Result<Vector> {
            if text.contains("bad") {
                Err(Error::EncodingFailure("model crashed".to_string()))
            } else if text.contains("short") {
                Ok(Vector::zeros(3))
            } else if text.contains("nan") {
                Ok(Vector::new(vec![f64::NAN; 8]))
            } else if text.contains("inf") {
                Ok(Vector::new(vec![1.0, f64::INFINITY, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]))
            } else {
                Ok(Vector::new(vec![1.0; 8]))
            }
        }
    }

    #[test]
    fn test_hashing_embedder_dimension_and_norm() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.embed("Kanye West").unwrap();
        assert_eq!(v.dim(), 64);
        assert!((v.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hashing_embedder_deterministic() {
        let a = HashingEmbedder::new(384);
        let b = HashingEmbedder::new(384);
        assert_eq!(a.embed("classical piano").unwrap(), b.embed("classical piano").unwrap());
        assert_eq!(a.model_id(), b.model_id());
        assert_ne!(a.model_id(), HashingEmbedder::new(128).model_id());
    }

    #[test]
    fn test_shared_words_are_closer() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("songs like Kanye West").unwrap();
        let kanye = embedder.embed("Kanye West").unwrap();
        let chopin = embedder.embed("Frederic Chopin").unwrap();
        assert!(query.cosine_similarity(&kanye) > query.cosine_similarity(&chopin) + 0.3);
    }

    #[test]
    fn test_blank_text_is_zero() {
        let embedder = HashingEmbedder::new(16);
        let e = embed_or_zero(&embedder, Some("   "));
        assert!(!e.present);
        assert_eq!(e.vector, Vector::zeros(16));
        assert!(!embed_or_zero(&embedder, None).present);
    }

    #[test]
    fn test_failures_fall_back_to_zero() {
        let embedder = FailingEmbedder;
        let failed = embed_or_zero(&embedder, Some("bad input"));
        assert!(!failed.present);
        assert_eq!(failed.vector.dim(), 8);

        let wrong_len = embed_or_zero(&embedder, Some("short"));
        assert!(!wrong_len.present);
        assert_eq!(wrong_len.vector.dim(), 8);

        for text in ["nan output", "inf output"] {
            let non_finite = embed_or_zero(&embedder, Some(text));
            assert!(!non_finite.present);
            assert_eq!(non_finite.vector, Vector::zeros(8));
        }
    }

    #[test]
    fn test_batch_preserves_order() {
        let embedder = FailingEmbedder;
        let texts = vec![
            Some("fine".to_string()),
            Some("bad".to_string()),
            None,
            Some("also fine".to_string()),
        ];
        let out = embed_batch(&embedder, &texts);
        let present: Vec<bool> = out.iter().map(|e| e.present).collect();
        assert_eq!(present, vec![true, false, false, true]);
    }
}

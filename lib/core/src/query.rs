//! Serving-side query encoding.

use crate::artifact::{ModelArtifact, ServingContract};
use crate::embedder::{embed_or_zero, TextEmbedder};
use crate::error::{Error, Result};
use crate::pipeline::{encode_record, fuse_query};
use crate::record::{SongRecord, TextField};
use crate::vector::Vector;
use std::sync::Arc;
use tracing::debug;

/// Encode free text into the output space of `artifact`.
///
/// The query follows the transforms of the artifact's serving contract:
/// under [`ServingContract::TextOnly`] the embedding goes straight into the
/// global reduction; under [`ServingContract::Fused`] it is reduced by every
/// field reducer (or only by `field`'s), fused with neutral numeric slots,
/// and then reduced. Nothing is ever re-fitted.
pub fn encode_query(
    embedder: &dyn TextEmbedder,
    artifact: &ModelArtifact,
    text: &str,
    field: Option<TextField>,
) -> Result<Vector> {
    let embedding = embed_or_zero(embedder, Some(text));
    if !embedding.present {
        debug!("query produced no embedding, encoding the zero vector");
    }

    match (artifact.contract(), field) {
        (ServingContract::TextOnly, None) => artifact.reduction.encode(&embedding.vector),
        (ServingContract::TextOnly, Some(field)) => Err(Error::InvalidConfig(format!(
            "field '{}' requested but the artifact was fitted on text embeddings only",
            field
        ))),
        (ServingContract::Fused, None) => {
            let fused = fuse_query(artifact, &embedding, &TextField::ALL)?;
            artifact.reduction.encode(&fused)
        }
        (ServingContract::Fused, Some(field)) => {
            let fused = fuse_query(artifact, &embedding, &[field])?;
            artifact.reduction.encode(&fused)
        }
    }
}

/// A loaded artifact bound to the embedder it was fitted with.
///
/// Immutable once built; share it behind an `Arc` across request handlers.
#[derive(Clone)]
pub struct QueryEncoder {
    artifact: Arc<ModelArtifact>,
    embedder: Arc<dyn TextEmbedder>,
}

impl std::fmt::Debug for QueryEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEncoder")
            .field("header", &self.artifact.header)
            .field("embedder", &self.embedder.model_id())
            .finish()
    }
}

impl QueryEncoder {
    /// Bind `artifact` to `embedder`, refusing stale or inconsistent
    /// artifacts.
    pub fn new(artifact: impl Into<Arc<ModelArtifact>>, embedder: Arc<dyn TextEmbedder>) -> Result<Self> {
        let artifact = artifact.into();
        artifact.validate()?;
        artifact.check_compatible(embedder.as_ref())?;
        Ok(Self { artifact, embedder })
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn embedder(&self) -> &dyn TextEmbedder {
        self.embedder.as_ref()
    }

    pub fn target_dim(&self) -> usize {
        self.artifact.target_dim()
    }

    pub fn encode(&self, text: &str) -> Result<Vector> {
        encode_query(self.embedder.as_ref(), &self.artifact, text, None)
    }

    /// Encode a query meant to be compared within one field's space.
    pub fn encode_in_field(&self, text: &str, field: TextField) -> Result<Vector> {
        encode_query(self.embedder.as_ref(), &self.artifact, text, Some(field))
    }

    /// Encode a full song record the same way the corpus was encoded.
    pub fn encode_record(&self, record: &SongRecord) -> Result<Vector> {
        encode_record(&self.artifact, self.embedder.as_ref(), record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use crate::pipeline::{fit_pipeline, PipelineConfig};
    use crate::record::NumericAttribute;

    fn fitted(contract: ServingContract) -> ModelArtifact {
        let records: Vec<SongRecord> = (0..24)
            .map(|i| {
                SongRecord::new(i.to_string())
                    .with_artists([format!("Band {}", i % 6)])
                    .with_genre(["ambient", "metal", "folk"][i % 3])
                    .with_album(format!("Record {}", i % 4))
                    .with_track(format!("Piece {}", i))
                    .with_numeric(NumericAttribute::Valence, (i % 5) as f64 / 5.0)
                    .with_numeric(NumericAttribute::Loudness, -20.0 + i as f64)
            })
            .collect();
        let config = PipelineConfig {
            contract,
            ..Default::default()
        };
        fit_pipeline(&records, &HashingEmbedder::new(40), &config)
            .unwrap()
            .artifact
    }

    #[test]
    fn test_encode_is_deterministic_and_unit_norm() {
        let encoder = QueryEncoder::new(fitted(ServingContract::Fused), Arc::new(HashingEmbedder::new(40))).unwrap();
        let a = encoder.encode("heavy metal band").unwrap();
        let b = encoder.encode("heavy metal band").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dim(), 30);
        assert!((a.norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_encode_in_field() {
        let encoder = QueryEncoder::new(fitted(ServingContract::Fused), Arc::new(HashingEmbedder::new(40))).unwrap();
        let genre_only = encoder.encode_in_field("folk", TextField::Genre).unwrap();
        let everywhere = encoder.encode("folk").unwrap();
        assert_eq!(genre_only.dim(), 30);
        assert_ne!(genre_only, everywhere);
    }

    #[test]
    fn test_text_only_rejects_field_queries() {
        let encoder = QueryEncoder::new(fitted(ServingContract::TextOnly), Arc::new(HashingEmbedder::new(40))).unwrap();
        assert_eq!(encoder.encode("calm folk").unwrap().dim(), 30);
        assert!(matches!(
            encoder.encode_in_field("calm folk", TextField::Genre),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_other_embedding_model() {
        let artifact = fitted(ServingContract::Fused);
        let result = QueryEncoder::new(artifact, Arc::new(HashingEmbedder::new(64)));
        assert!(matches!(result, Err(Error::StaleArtifact(_))));
    }

    #[test]
    fn test_rejects_inconsistent_artifact() {
        let mut artifact = fitted(ServingContract::Fused);
        artifact.header.fused_dim += 1;
        let result = QueryEncoder::new(artifact, Arc::new(HashingEmbedder::new(40)));
        assert!(matches!(result, Err(Error::StaleArtifact(_))));
    }

    #[test]
    fn test_blank_query_does_not_fail() {
        let encoder = QueryEncoder::new(fitted(ServingContract::Fused), Arc::new(HashingEmbedder::new(40))).unwrap();
        let v = encoder.encode("   ").unwrap();
        assert_eq!(v.dim(), 30);
    }
}

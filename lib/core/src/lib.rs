//! # SongVec Core
//!
//! Feature fusion and dimensionality reduction for song similarity search.
//!
//! This crate turns song records into fixed-length, unit-norm vectors and
//! maps free-text queries into the same space:
//!
//! - [`NumericNormalizer`] - per-column standardization of audio features
//! - [`TextEmbedder`] - opaque text → vector capability ([`HashingEmbedder`] built in)
//! - [`FieldReducer`] - per text field PCA with a pluggable strategy
//! - [`FeatureFusion`] - weighted concatenation in canonical order
//! - [`GlobalReducer`] - final PCA to the output dimension
//! - [`QueryEncoder`] - replays the fitted transforms for queries
//!
//! All fitted state lives in one [`ModelArtifact`], an immutable value that
//! is passed by reference into pure transforms.
//!
//! ## Example
//!
//! ```rust
//! use songvec_core::{fit_pipeline, HashingEmbedder, NumericAttribute, PipelineConfig, QueryEncoder, SongRecord};
//! use std::sync::Arc;
//!
//! let records: Vec<SongRecord> = (0..40)
//!     .map(|i| {
//!         SongRecord::new(i.to_string())
//!             .with_artists([format!("Artist {}", i % 7)])
//!             .with_genre(if i % 2 == 0 { "hip-hop" } else { "classical" })
//!             .with_track(format!("Track {}", i))
//!             .with_numeric(NumericAttribute::Energy, i as f64 / 40.0)
//!     })
//!     .collect();
//!
//! let embedder = Arc::new(HashingEmbedder::default());
//! let fitted = fit_pipeline(&records, &*embedder, &PipelineConfig::default()).unwrap();
//! assert_eq!(fitted.outputs[0].features.len(), 30);
//!
//! let encoder = QueryEncoder::new(fitted.artifact, embedder).unwrap();
//! let query = encoder.encode("hip-hop tracks").unwrap();
//! assert_eq!(query.dim(), 30);
//! ```

pub mod artifact;
pub mod embedder;
pub mod error;
pub mod field_reducer;
pub mod fusion;
pub mod global_reducer;
pub mod normalizer;
pub mod pca;
pub mod pipeline;
pub mod query;
pub mod record;
pub mod vector;
pub mod weights;

pub use artifact::{ArtifactHeader, ModelArtifact, ServingContract, ARTIFACT_FORMAT_VERSION};
pub use embedder::{embed_batch, embed_or_zero, FieldEmbedding, HashingEmbedder, TextEmbedder, DEFAULT_EMBEDDING_DIM};
pub use error::{Error, Result};
pub use field_reducer::{FieldReducer, FieldReducerModel, FieldTransform, ReductionStrategy, DEFAULT_FIELD_COMPONENTS};
pub use fusion::{FeatureFusion, FusionLayout, ReducedFields, FUSED_LAYOUT_VERSION};
pub use global_reducer::{GlobalReducer, ReductionModel, DEFAULT_TARGET_DIM};
pub use normalizer::{ColumnStats, NormalizationStats, NumericFeatureSet, NumericNormalizer};
pub use pca::PcaModel;
pub use pipeline::{encode_record, fit_pipeline, fit_text_only, EmbeddedSong, FittedPipeline, PipelineConfig};
pub use query::{encode_query, QueryEncoder};
pub use record::{ArtistList, NumericAttribute, Scalar, SongRecord, TextField};
pub use vector::Vector;
pub use weights::WeightTable;

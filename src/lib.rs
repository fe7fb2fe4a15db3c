//! # SongVec
//!
//! Turns song records (audio features, genre, album, track and artist
//! metadata) into fixed-length unit vectors for cosine nearest-neighbor
//! search, and encodes free-text queries into the same space.
//!
//! ## Quick Start
//!
//! ### From the command line
//!
//! ```bash
//! songvec fit --input songs.jsonl --artifact model.bin --output songs.embedded.jsonl.gz
//! songvec serve --artifact model.bin --http-port 8000
//! curl -X POST localhost:8000/embed -d '{"text": "songs like Kanye West"}' -H 'content-type: application/json'
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use songvec::prelude::*;
//! use std::sync::Arc;
//!
//! let records = read_records("songs.jsonl").unwrap();
//! let embedder = Arc::new(HashingEmbedder::default());
//! let fitted = fit_pipeline(&records, &*embedder, &PipelineConfig::default()).unwrap();
//! ArtifactStore::new("model.bin").save(&fitted.artifact).unwrap();
//!
//! let encoder = QueryEncoder::new(fitted.artifact, embedder).unwrap();
//! let query = encoder.encode("songs like Kanye West").unwrap();
//! assert_eq!(query.dim(), 30);
//! ```
//!
//! ## Crate Structure
//!
//! - `songvec-core` - normalization, embedding, field/global PCA, fusion and query encoding
//! - `songvec-storage` - artifact file format, corpus IO and the model registry
//! - `songvec-api` - REST API

// Re-export core types
pub use songvec_core::{
    encode_query, fit_pipeline, fit_text_only,
    EmbeddedSong, FittedPipeline, PipelineConfig,
    FeatureFusion, FieldReducer, GlobalReducer, NumericNormalizer, QueryEncoder,
    HashingEmbedder, TextEmbedder,
    ModelArtifact, ServingContract, ReductionStrategy, WeightTable,
    NumericAttribute, SongRecord, TextField, Vector,
    Error, Result,
};

// Re-export storage
pub use songvec_storage::{read_embedded, read_records, write_embedded, ArtifactStore, ModelRegistry};

// Re-export API
pub use songvec_api::RestApi;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        encode_query, fit_pipeline, fit_text_only,
        EmbeddedSong, FittedPipeline, PipelineConfig,
        QueryEncoder, HashingEmbedder, TextEmbedder,
        ModelArtifact, ServingContract, ReductionStrategy, WeightTable,
        NumericAttribute, SongRecord, TextField, Vector,
        Error, Result,
        read_embedded, read_records, write_embedded, ArtifactStore, ModelRegistry,
        RestApi,
    };
}

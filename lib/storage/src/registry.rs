// Hot-swappable query encoder shared by request handlers.

use crate::artifact::ArtifactStore;
use parking_lot::RwLock;
use songvec_core::{ModelArtifact, QueryEncoder, Result, TextEmbedder};
use std::sync::Arc;
use tracing::{info, warn};

/// Holds the current [`QueryEncoder`] behind an `Arc`.
///
/// Readers clone the `Arc` and release the lock immediately, so a reload only
/// blocks for the pointer swap and in-flight requests finish on the encoder
/// they started with.
pub struct ModelRegistry {
    current: RwLock<Arc<QueryEncoder>>,
    store: ArtifactStore,
    embedder: Arc<dyn TextEmbedder>,
}

impl ModelRegistry {
    /// Load the artifact from `store` and validate it against `embedder`.
    pub fn open(store: ArtifactStore, embedder: Arc<dyn TextEmbedder>) -> Result<Self> {
        let artifact = store.load()?;
        let encoder = QueryEncoder::new(artifact, embedder.clone())?;
        Ok(Self {
            current: RwLock::new(Arc::new(encoder)),
            store,
            embedder,
        })
    }

    pub fn current(&self) -> Arc<QueryEncoder> {
        self.current.read().clone()
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Re-read the artifact file and swap it in. On failure the previous
    /// encoder stays active.
    pub fn reload(&self) -> Result<Arc<QueryEncoder>> {
        let loaded = self
            .store
            .load()
            .and_then(|artifact| QueryEncoder::new(artifact, self.embedder.clone()));
        match loaded {
            Ok(encoder) => {
                let encoder = Arc::new(encoder);
                *self.current.write() = Arc::clone(&encoder);
                info!(path = ?self.store.path(), "model reloaded");
                Ok(encoder)
            }
            Err(e) => {
                warn!(path = ?self.store.path(), error = %e, "model reload failed, keeping current model");
                Err(e)
            }
        }
    }

    /// Swap in an in-memory artifact without touching the file.
    pub fn swap(&self, artifact: ModelArtifact) -> Result<Arc<QueryEncoder>> {
        let encoder = Arc::new(QueryEncoder::new(artifact, self.embedder.clone())?);
        let previous = std::mem::replace(&mut *self.current.write(), Arc::clone(&encoder));
        info!(
            previous_records = previous.artifact().header.n_records,
            records = encoder.artifact().header.n_records,
            "model swapped"
        );
        Ok(encoder)
    }
}

//! Per-field dimensionality reduction.
//!
//! Each text field gets its own fitted transform from `D_text` down to
//! `R_field`. The strategy is pluggable so that "PCA per field" and "no
//! per-field reduction" share one model type and one artifact format.

use crate::error::{Error, Result};
use crate::pca::PcaModel;
use crate::record::TextField;
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default number of components kept per text field.
pub const DEFAULT_FIELD_COMPONENTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionStrategy {
    /// Fit a PCA per field.
    #[default]
    Pca,
    /// Keep the raw field embedding (`R_field = D_text`).
    Identity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldTransform {
    Pca(PcaModel),
    /// Truncate or zero-pad to the output length. Used for the identity
    /// strategy and as the small-corpus fallback.
    Resize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReducerModel {
    pub field: TextField,
    pub input_dim: usize,
    pub output_dim: usize,
    pub transform: FieldTransform,
}

impl FieldReducerModel {
    /// Project one field embedding. Never re-fits.
    pub fn transform(&self, vector: &Vector) -> Result<Vector> {
        Error::check_dim(self.input_dim, vector.dim())?;
        match &self.transform {
            FieldTransform::Pca(pca) => pca.transform(vector.as_slice()),
            FieldTransform::Resize => Ok(vector.resized(self.output_dim)),
        }
    }

    /// True when the model is the resize fallback rather than the
    /// configured strategy.
    pub fn is_fallback(&self, strategy: ReductionStrategy) -> bool {
        strategy == ReductionStrategy::Pca && matches!(self.transform, FieldTransform::Resize)
    }
}

pub struct FieldReducer;

impl FieldReducer {
    /// Fit the reducer for `field` over the embeddings of every record where
    /// the field is present.
    ///
    /// The PCA output length is `min(components, input_dim)`. With fewer
    /// rows than that, the reducer falls back to truncating/padding each
    /// embedding to the same length instead of failing.
    pub fn fit(
        field: TextField,
        embeddings: &[Vector],
        input_dim: usize,
        strategy: ReductionStrategy,
        components: usize,
    ) -> Result<FieldReducerModel> {
        for e in embeddings {
            Error::check_dim(input_dim, e.dim())?;
        }

        let components = components.min(input_dim);
        let (output_dim, transform) = match strategy {
            ReductionStrategy::Identity => (input_dim, FieldTransform::Resize),
            ReductionStrategy::Pca if embeddings.len() < components => {
                warn!(
                    field = %field,
                    rows = embeddings.len(),
                    components,
                    "too few rows for field PCA, falling back to truncate/pad"
                );
                (components, FieldTransform::Resize)
            }
            ReductionStrategy::Pca => {
                let pca = PcaModel::fit(embeddings, components)?;
                debug!(
                    field = %field,
                    rows = embeddings.len(),
                    fitted = pca.n_fitted,
                    explained = pca.explained_variance_ratio.sum(),
                    "fitted field PCA"
                );
                (components, FieldTransform::Pca(pca))
            }
        };

        Ok(FieldReducerModel {
            field,
            input_dim,
            output_dim,
            transform,
        })
    }
}

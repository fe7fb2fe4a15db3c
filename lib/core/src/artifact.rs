//! The persisted model artifact.
//!
//! Everything the serving path needs is carried here and nothing else
//! crosses from training to serving. The header pins the embedding model
//! and the serving contract so a mismatched deployment is refused instead
//! of silently producing incomparable vectors.

use crate::embedder::TextEmbedder;
use crate::error::{Error, Result};
use crate::field_reducer::{FieldReducerModel, ReductionStrategy};
use crate::fusion::{FusionLayout, FUSED_LAYOUT_VERSION};
use crate::global_reducer::ReductionModel;
use crate::normalizer::NormalizationStats;
use crate::record::TextField;
use crate::weights::WeightTable;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Which fitting path produced the global reduction, and therefore which
/// path queries must follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServingContract {
    /// Global reduction fitted over fused song vectors.
    #[default]
    Fused,
    /// Global reduction fitted over raw text embeddings.
    TextOnly,
}

impl ServingContract {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fused" => Some(ServingContract::Fused),
            "text-only" | "text" => Some(ServingContract::TextOnly),
            _ => None,
        }
    }
}

impl fmt::Display for ServingContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServingContract::Fused => f.write_str("fused"),
            ServingContract::TextOnly => f.write_str("text-only"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub format_version: u32,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub layout_version: u32,
    pub fused_dim: usize,
    pub target_dim: usize,
    pub contract: ServingContract,
    pub strategy: ReductionStrategy,
    /// Rows the artifact was fitted on.
    pub n_records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub header: ArtifactHeader,
    pub weights: WeightTable,
    pub stats: NormalizationStats,
    /// Per-field reducers in canonical order; empty for [`ServingContract::TextOnly`].
    pub fields: Vec<FieldReducerModel>,
    pub reduction: ReductionModel,
}

impl ModelArtifact {
    pub fn contract(&self) -> ServingContract {
        self.header.contract
    }

    pub fn target_dim(&self) -> usize {
        self.reduction.target_dim
    }

    pub fn field_model(&self, field: TextField) -> Option<&FieldReducerModel> {
        self.fields.get(field.index()).filter(|m| m.field == field)
    }

    /// Fused layout; `None` under the text-only contract.
    pub fn layout(&self) -> Option<FusionLayout> {
        if self.fields.len() != TextField::ALL.len() {
            return None;
        }
        let mut dims = [0usize; 4];
        for model in &self.fields {
            dims[model.field.index()] = model.output_dim;
        }
        Some(FusionLayout::new(dims))
    }

    /// Internal consistency of the header and the fitted parts.
    pub fn validate(&self) -> Result<()> {
        let header = &self.header;
        if header.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(Error::StaleArtifact(format!(
                "artifact format {} is not supported (expected {})",
                header.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if header.layout_version != FUSED_LAYOUT_VERSION {
            return Err(Error::StaleArtifact(format!(
                "fused layout version {} does not match {}",
                header.layout_version, FUSED_LAYOUT_VERSION
            )));
        }
        if header.target_dim != self.reduction.target_dim {
            return Err(Error::StaleArtifact(format!(
                "header target dimension {} disagrees with reduction model {}",
                header.target_dim, self.reduction.target_dim
            )));
        }
        if header.fused_dim != self.reduction.fused_dim() {
            return Err(Error::StaleArtifact(format!(
                "header fused dimension {} disagrees with reduction model {}",
                header.fused_dim,
                self.reduction.fused_dim()
            )));
        }

        match header.contract {
            ServingContract::TextOnly => {
                if header.fused_dim != header.embedding_dim {
                    return Err(Error::StaleArtifact(format!(
                        "text-only artifact reduces {} values but embeddings have {}",
                        header.fused_dim, header.embedding_dim
                    )));
                }
            }
            ServingContract::Fused => {
                for (field, model) in TextField::ALL.iter().zip(&self.fields) {
                    if model.field != *field {
                        return Err(Error::StaleArtifact(format!(
                            "field reducers out of order: found '{}' where '{}' belongs",
                            model.field, field
                        )));
                    }
                    if model.input_dim != header.embedding_dim {
                        return Err(Error::StaleArtifact(format!(
                            "reducer for '{}' expects {} values, embeddings have {}",
                            field, model.input_dim, header.embedding_dim
                        )));
                    }
                }
                let layout = self.layout().ok_or_else(|| {
                    Error::StaleArtifact(format!(
                        "fused artifact has {} field reducers, expected {}",
                        self.fields.len(),
                        TextField::ALL.len()
                    ))
                })?;
                if layout.fused_dim() != header.fused_dim {
                    return Err(Error::StaleArtifact(format!(
                        "field layout adds up to {} values, header says {}",
                        layout.fused_dim(),
                        header.fused_dim
                    )));
                }
            }
        }

        Ok(())
    }

    /// Refuse artifacts fitted with a different embedding model.
    pub fn check_compatible(&self, embedder: &dyn TextEmbedder) -> Result<()> {
        if self.header.embedding_model != embedder.model_id() {
            return Err(Error::StaleArtifact(format!(
                "artifact was fitted with embedding model '{}', configured model is '{}'",
                self.header.embedding_model,
                embedder.model_id()
            )));
        }
        if self.header.embedding_dim != embedder.dim() {
            return Err(Error::StaleArtifact(format!(
                "artifact expects {}-dimensional embeddings, configured model produces {}",
                self.header.embedding_dim,
                embedder.dim()
            )));
        }
        Ok(())
    }
}

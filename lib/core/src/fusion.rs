//! Weighted concatenation of the per-record sub-vectors.
//!
//! Canonical order: the numeric attributes in declared order, then the
//! reduced artists, genre, album and track embeddings.

use crate::error::{Error, Result};
use crate::normalizer::NumericFeatureSet;
use crate::record::{NumericAttribute, TextField};
use crate::vector::Vector;
use crate::weights::WeightTable;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Bumped whenever the canonical order or slot semantics change.
pub const FUSED_LAYOUT_VERSION: u32 = 1;

/// Reduced embeddings of one record, indexed by [`TextField::index`].
/// `None` marks an absent field, which fuses as zeros.
pub type ReducedFields = [Option<Vector>; 4];

/// Slot sizes of the fused vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionLayout {
    /// Reduced length per text field, indexed by [`TextField::index`].
    pub field_dims: [usize; 4],
}

impl FusionLayout {
    pub fn new(field_dims: [usize; 4]) -> Self {
        Self { field_dims }
    }

    pub fn numeric_dim(&self) -> usize {
        NumericAttribute::ALL.len()
    }

    pub fn fused_dim(&self) -> usize {
        self.numeric_dim() + self.field_dims.iter().sum::<usize>()
    }

    pub fn field_dim(&self, field: TextField) -> usize {
        self.field_dims[field.index()]
    }

    pub fn field_range(&self, field: TextField) -> Range<usize> {
        let start = self.numeric_dim() + self.field_dims[..field.index()].iter().sum::<usize>();
        start..start + self.field_dim(field)
    }
}

pub struct FeatureFusion;

impl FeatureFusion {
    /// Concatenate weighted numeric values and weighted reduced fields.
    ///
    /// Fails with [`Error::DimensionMismatch`] if a reduced field does not
    /// have the length recorded in `layout`.
    pub fn fuse(
        numeric: &NumericFeatureSet,
        reduced: &ReducedFields,
        weights: &WeightTable,
        layout: &FusionLayout,
    ) -> Result<Vector> {
        let mut fused = Vec::with_capacity(layout.fused_dim());

        for attr in NumericAttribute::ALL {
            fused.push(numeric.get(attr) * weights.numeric_weight(attr));
        }

        for field in TextField::ALL {
            let dim = layout.field_dim(field);
            match &reduced[field.index()] {
                Some(vector) => {
                    Error::check_dim(dim, vector.dim())?;
                    let w = weights.text_weight(field);
                    fused.extend(vector.as_slice().iter().map(|x| x * w));
                }
                None => fused.extend(std::iter::repeat(0.0).take(dim)),
            }
        }

        Ok(Vector::new(fused))
    }
}

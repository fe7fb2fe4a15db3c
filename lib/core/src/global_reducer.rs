//! Final reduction of fused vectors to the output dimension.

use crate::error::{Error, Result};
use crate::pca::PcaModel;
use crate::vector::Vector;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Length of every output vector.
pub const DEFAULT_TARGET_DIM: usize = 30;

/// The fitted global transform.
///
/// `components` always has `target_dim` rows; when fewer components could
/// be fitted the trailing rows are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionModel {
    pub target_dim: usize,
    pca: PcaModel,
}

impl ReductionModel {
    /// Length of the fused vectors this model was fitted on.
    pub fn fused_dim(&self) -> usize {
        self.pca.input_dim()
    }

    /// Components estimated from data (at most `target_dim`).
    pub fn n_fitted(&self) -> usize {
        self.pca.n_fitted
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.pca.mean
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.pca.components
    }

    pub fn explained_variance_ratio(&self) -> &Array1<f64> {
        &self.pca.explained_variance_ratio
    }

    /// Project a fused vector to `target_dim` values (not normalized).
    pub fn transform(&self, fused: &Vector) -> Result<Vector> {
        self.pca.transform(fused.as_slice())
    }

    /// Project and L2-normalize, falling back to the zero vector when the
    /// projection has zero norm.
    pub fn encode(&self, fused: &Vector) -> Result<Vector> {
        Ok(GlobalReducer::normalize_or_zero(self.transform(fused)?))
    }
}

pub struct GlobalReducer;

impl GlobalReducer {
    /// Fit the final PCA over the fused vectors of the whole corpus.
    ///
    /// When the corpus has fewer rows (or the fused vectors fewer values)
    /// than `target_dim`, only that many components are fitted and a warning
    /// is logged; outputs keep length `target_dim`.
    pub fn fit(fused: &[Vector], target_dim: usize) -> Result<ReductionModel> {
        if target_dim == 0 {
            return Err(Error::InvalidConfig("target dimension must be positive".to_string()));
        }
        if fused.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let fused_dim = fused[0].dim();
        let effective = target_dim.min(fused.len()).min(fused_dim);
        if effective < target_dim {
            warn!(
                rows = fused.len(),
                fused_dim,
                target_dim,
                fitted = effective,
                "corpus too small for the target dimension, fitting fewer components"
            );
        }

        let pca = PcaModel::fit(fused, target_dim)?;
        info!(
            rows = fused.len(),
            fused_dim,
            target_dim,
            explained = pca.explained_variance_ratio.sum(),
            "fitted global reduction"
        );

        Ok(ReductionModel { target_dim, pca })
    }

    pub fn transform(fused: &Vector, model: &ReductionModel) -> Result<Vector> {
        model.transform(fused)
    }

    /// L2-normalize; [`Error::DegenerateVector`] when the norm is exactly zero.
    pub fn normalize(vector: Vector) -> Result<Vector> {
        let mut vector = vector;
        vector.normalize()?;
        Ok(vector)
    }

    /// [`GlobalReducer::normalize`], leaving degenerate vectors as zeros.
    pub fn normalize_or_zero(vector: Vector) -> Vector {
        let dim = vector.dim();
        match Self::normalize(vector) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "leaving output as zero vector");
                Vector::zeros(dim)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(n: usize, dim: usize) -> Vec<Vector> {
        (0..n)
            .map(|i| {
                Vector::new(
                    (0..dim)
                        .map(|j| (((i * 31 + j * 17) % 23) as f64 - 11.0) / 7.0 + (i as f64 * j as f64).sin())
                        .collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_output_dimension_and_norm() {
        let data = corpus(50, 40);
        let model = GlobalReducer::fit(&data, 30).unwrap();
        assert_eq!(model.n_fitted(), 30);
        assert_eq!(model.components().dim(), (30, 40));
        assert_eq!(model.explained_variance_ratio().len(), 30);
        for row in &data {
            let out = model.encode(row).unwrap();
            assert_eq!(out.dim(), 30);
            assert!((out.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_small_corpus_keeps_target_dim() {
        let data = corpus(8, 40);
        let model = GlobalReducer::fit(&data, 30).unwrap();
        assert_eq!(model.target_dim, 30);
        // Eight centered rows have rank seven.
        assert_eq!(model.n_fitted(), 7);
        let nonzero_rows = model
            .components()
            .rows()
            .into_iter()
            .filter(|row| row.iter().any(|x| *x != 0.0))
            .count();
        assert_eq!(nonzero_rows, model.n_fitted());
        let out = model.encode(&data[0]).unwrap();
        assert_eq!(out.dim(), 30);
        assert!(out.as_slice()[7..].iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_transform_rejects_wrong_length() {
        let model = GlobalReducer::fit(&corpus(10, 12), 5).unwrap();
        assert!(matches!(
            GlobalReducer::transform(&Vector::zeros(13), &model),
            Err(Error::DimensionMismatch { expected: 12, actual: 13 })
        ));
    }

    #[test]
    fn test_normalize_degenerate() {
        assert!(matches!(
            GlobalReducer::normalize(Vector::zeros(3)),
            Err(Error::DegenerateVector)
        ));
        assert_eq!(GlobalReducer::normalize_or_zero(Vector::zeros(3)), Vector::zeros(3));
    }

    #[test]
    fn test_fit_errors() {
        assert!(matches!(GlobalReducer::fit(&[], 30), Err(Error::EmptyCorpus)));
        assert!(matches!(
            GlobalReducer::fit(&corpus(3, 3), 0),
            Err(Error::InvalidConfig(_))
        ));
    }
}

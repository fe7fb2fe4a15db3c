//! Principal component analysis.
//!
//! A fitted [`PcaModel`] is plain data: a mean vector, an orthonormal
//! component matrix and the variance each component explains. Fitting
//! centers the rows, then diagonalizes either the covariance matrix
//! (`d x d`) or the Gram matrix (`n x n`), whichever is smaller, with a
//! cyclic Jacobi solver. Component signs are fixed so that the
//! largest-magnitude loading is positive, which makes fits reproducible.

use crate::error::{Error, Result};
use crate::vector::Vector;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

const MAX_SWEEPS: usize = 100;
const OFF_DIAGONAL_TOLERANCE: f64 = 1e-22;
const RELATIVE_EIGEN_FLOOR: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaModel {
    /// Per-dimension mean of the training rows.
    pub mean: Array1<f64>,
    /// Projection matrix, one component per row (`n_components x input_dim`).
    /// Rows past `n_fitted` are zero.
    pub components: Array2<f64>,
    pub explained_variance: Array1<f64>,
    pub explained_variance_ratio: Array1<f64>,
    /// Components with non-negligible variance; the remaining rows are zero.
    pub n_fitted: usize,
}

impl PcaModel {
    /// Fit `n_components` components over `rows`.
    ///
    /// At most `min(n_components, rows, input_dim)` components can be
    /// estimated; the remaining rows of the component matrix are zero so the
    /// output length is always `n_components`. Directions with no variance
    /// also project to zero.
    pub fn fit(rows: &[Vector], n_components: usize) -> Result<Self> {
        let n = rows.len();
        if n == 0 {
            return Err(Error::EmptyCorpus);
        }
        let d = rows[0].dim();
        for row in rows {
            Error::check_dim(d, row.dim())?;
        }

        let flat: Vec<f64> = rows.iter().flat_map(|r| r.as_slice().iter().copied()).collect();
        let data = Array2::from_shape_vec((n, d), flat)
            .map_err(|e| Error::InvalidConfig(format!("bad training matrix: {}", e)))?;
        let mean = data.mean_axis(Axis(0)).ok_or(Error::EmptyCorpus)?;
        let centered = &data - &mean;

        let denom = n.saturating_sub(1).max(1) as f64;
        let total_variance = centered.iter().map(|x| x * x).sum::<f64>() / denom;

        let k = n_components.min(n).min(d);
        let mut fitted = 0;
        let mut components = Array2::<f64>::zeros((n_components, d));
        let mut explained_variance = Array1::<f64>::zeros(n_components);

        if n <= d {
            // Gram trick: eigenvectors u of X Xᵀ map to v = Xᵀ u / sqrt(λ).
            let gram = centered.dot(&centered.t());
            let (values, vectors) = symmetric_eigen(gram);
            let floor = RELATIVE_EIGEN_FLOOR * values.first().copied().unwrap_or(0.0).max(0.0);
            for i in 0..k {
                let lambda = values[i];
                if lambda <= floor || lambda <= 0.0 {
                    continue;
                }
                let component = centered.t().dot(&vectors.column(i)) / lambda.sqrt();
                components.row_mut(i).assign(&component);
                explained_variance[i] = lambda / denom;
                fitted += 1;
            }
        } else {
            let covariance = centered.t().dot(&centered) / denom;
            let (values, vectors) = symmetric_eigen(covariance);
            let floor = RELATIVE_EIGEN_FLOOR * values.first().copied().unwrap_or(0.0).max(0.0);
            for i in 0..k {
                let lambda = values[i];
                if lambda <= floor || lambda <= 0.0 {
                    continue;
                }
                components.row_mut(i).assign(&vectors.column(i));
                explained_variance[i] = lambda;
                fitted += 1;
            }
        }

        for mut row in components.rows_mut() {
            let pivot = row
                .iter()
                .copied()
                .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
            if pivot < 0.0 {
                row.mapv_inplace(|x| -x);
            }
        }

        let explained_variance_ratio = if total_variance > 0.0 {
            explained_variance.mapv(|v| v / total_variance)
        } else {
            Array1::zeros(n_components)
        };

        Ok(Self {
            mean,
            components,
            explained_variance,
            explained_variance_ratio,
            n_fitted: fitted,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.mean.len()
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    /// `(x - mean) · componentsᵀ`.
    pub fn transform(&self, x: &[f64]) -> Result<Vector> {
        Error::check_dim(self.input_dim(), x.len())?;
        let centered = Array1::from(x.to_vec()) - &self.mean;
        Ok(Vector::new(self.components.dot(&centered).to_vec()))
    }
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns eigenvalues in descending order and the matching eigenvectors
/// as columns.
fn symmetric_eigen(mut a: Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);

    let scale: f64 = a.iter().map(|x| x * x).sum();
    for _ in 0..MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if off <= OFF_DIAGONAL_TOLERANCE * scale || off == 0.0 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        a[[j, j]]
            .partial_cmp(&a[[i, i]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let values = order.iter().map(|&i| a[[i, i]]).collect();
    let vectors = v.select(Axis(1), &order);
    (values, vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[f64]]) -> Vec<Vector> {
        data.iter().map(|r| Vector::from_slice(r)).collect()
    }

    #[test]
    fn test_eigen_diagonal() {
        let a = Array2::from_shape_vec((2, 2), vec![1.0, 0.0, 0.0, 3.0]).unwrap();
        let (values, vectors) = symmetric_eigen(a);
        assert!((values[0] - 3.0).abs() < 1e-12);
        assert!((values[1] - 1.0).abs() < 1e-12);
        assert!((vectors[[1, 0]].abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_eigen_symmetric() {
        let a = Array2::from_shape_vec((2, 2), vec![2.0, 1.0, 1.0, 2.0]).unwrap();
        let (values, vectors) = symmetric_eigen(a.clone());
        assert!((values[0] - 3.0).abs() < 1e-10);
        assert!((values[1] - 1.0).abs() < 1e-10);
        // A v = λ v
        let v0 = vectors.column(0).to_owned();
        let av = a.dot(&v0);
        for i in 0..2 {
            assert!((av[i] - 3.0 * v0[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_fit_finds_dominant_direction() {
        // Points along y = x with a little noise on y = -x.
        let data = rows(&[
            &[-2.0, -2.1],
            &[-1.0, -0.9],
            &[0.0, 0.1],
            &[1.0, 0.9],
            &[2.0, 2.1],
            &[3.0, 2.9],
        ]);
        let model = PcaModel::fit(&data, 2).unwrap();
        let first = model.components.row(0);
        let expected = 1.0 / 2.0f64.sqrt();
        assert!((first[0] - expected).abs() < 0.05);
        assert!((first[1] - expected).abs() < 0.05);
        assert!(model.explained_variance_ratio[0] > 0.95);
        let ratio_sum: f64 = model.explained_variance_ratio.sum();
        assert!((ratio_sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_components_orthonormal() {
        let data = rows(&[
            &[1.0, 2.0, 0.5, 3.0],
            &[2.0, 1.0, 1.5, 0.0],
            &[0.0, 0.5, 2.5, 1.0],
            &[4.0, 3.0, 0.0, 2.0],
            &[1.5, 2.5, 1.0, 0.5],
            &[3.0, 0.0, 2.0, 1.5],
        ]);
        let model = PcaModel::fit(&data, 3).unwrap();
        let gram = model.components.dot(&model.components.t());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[[i, j]] - expected).abs() < 1e-9, "gram[{},{}]={}", i, j, gram[[i, j]]);
            }
        }
    }

    #[test]
    fn test_gram_and_covariance_paths_agree() {
        // 3 rows in 4 dims takes the Gram path; the same rows padded with
        // copies take the covariance path. Leading component must match.
        let base: Vec<Vec<f64>> = vec![
            vec![1.0, 0.0, 2.0, 1.0],
            vec![0.0, 1.0, 1.0, 3.0],
            vec![2.0, 2.0, 0.0, 0.0],
        ];
        let few: Vec<Vector> = base.iter().cloned().map(Vector::new).collect();
        let many: Vec<Vector> = base.iter().cycle().take(9).cloned().map(Vector::new).collect();

        let gram_model = PcaModel::fit(&few, 1).unwrap();
        let cov_model = PcaModel::fit(&many, 1).unwrap();
        for j in 0..4 {
            assert!((gram_model.components[[0, j]] - cov_model.components[[0, j]]).abs() < 1e-8);
        }
    }

    #[test]
    fn test_padding_when_too_few_rows() {
        let data = rows(&[&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]]);
        let model = PcaModel::fit(&data, 5).unwrap();
        assert_eq!(model.n_components(), 5);
        // Two centered rows span a single direction.
        assert_eq!(model.n_fitted, 1);
        let out = model.transform(&[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(out.dim(), 5);
        for x in &out.as_slice()[2..] {
            assert_eq!(*x, 0.0);
        }
    }

    #[test]
    fn test_transform_dimension_mismatch() {
        let data = rows(&[&[1.0, 2.0], &[3.0, 4.0], &[5.0, 7.0]]);
        let model = PcaModel::fit(&data, 1).unwrap();
        assert!(matches!(
            model.transform(&[1.0]),
            Err(Error::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_fit_rejects_ragged_rows() {
        let data = rows(&[&[1.0, 2.0], &[3.0]]);
        assert!(matches!(PcaModel::fit(&data, 1), Err(Error::DimensionMismatch { .. })));
        assert!(matches!(PcaModel::fit(&[], 1), Err(Error::EmptyCorpus)));
    }

    #[test]
    fn test_constant_rows_project_to_zero() {
        let data = rows(&[&[1.0, 1.0], &[1.0, 1.0], &[1.0, 1.0]]);
        let model = PcaModel::fit(&data, 2).unwrap();
        let out = model.transform(&[5.0, -3.0]).unwrap();
        assert!(out.is_zero());
        assert_eq!(model.n_fitted, 0);
        assert_eq!(model.explained_variance_ratio.sum(), 0.0);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let data = rows(&[&[1.0, 2.0, 3.0], &[2.0, 0.0, 1.0], &[0.0, 1.0, 4.0], &[3.0, 3.0, 0.0]]);
        let a = PcaModel::fit(&data, 2).unwrap();
        let b = PcaModel::fit(&data, 2).unwrap();
        assert_eq!(a, b);
    }
}

//! Per-column standardization of the numeric attributes.

use crate::record::{NumericAttribute, SongRecord};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Floor applied to the standard deviation inside `transform`.
pub const STD_EPSILON: f64 = 1e-9;

/// Mean and standard deviation of one attribute over the training corpus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub mean: f64,
    pub std: f64,
}

impl Default for ColumnStats {
    fn default() -> Self {
        Self { mean: 0.0, std: 1.0 }
    }
}

/// Fitted statistics for every numeric attribute, indexed in canonical order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    columns: Vec<ColumnStats>,
}

impl Default for NormalizationStats {
    fn default() -> Self {
        Self {
            columns: vec![ColumnStats::default(); NumericAttribute::ALL.len()],
        }
    }
}

impl NormalizationStats {
    pub fn get(&self, attr: NumericAttribute) -> ColumnStats {
        self.columns
            .get(attr.index())
            .copied()
            .unwrap_or_default()
    }

    pub fn columns(&self) -> &[ColumnStats] {
        &self.columns
    }
}

/// Standardized numeric values in canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericFeatureSet {
    values: Vec<f64>,
}

impl NumericFeatureSet {
    /// The neutral feature set: every attribute at the corpus mean.
    pub fn neutral() -> Self {
        Self {
            values: vec![0.0; NumericAttribute::ALL.len()],
        }
    }

    #[cfg(test)]
    pub(crate) fn from_values(values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), NumericAttribute::ALL.len());
        Self { values }
    }

    pub fn get(&self, attr: NumericAttribute) -> f64 {
        self.values[attr.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

pub struct NumericNormalizer;

impl NumericNormalizer {
    /// Fit mean/std per attribute.
    ///
    /// Missing values are imputed with the mean of the present values before
    /// the statistics are computed. A column with no usable value at all
    /// gets mean 0 and std 1, and a constant column gets std 1.
    pub fn fit(records: &[SongRecord]) -> NormalizationStats {
        let columns = NumericAttribute::ALL
            .iter()
            .map(|&attr| fit_column(attr, records))
            .collect();
        NormalizationStats { columns }
    }

    /// `(value - mean) / std`, with missing values imputed by the stored mean.
    pub fn transform(record: &SongRecord, stats: &NormalizationStats) -> NumericFeatureSet {
        let values = NumericAttribute::ALL
            .iter()
            .map(|&attr| {
                let column = stats.get(attr);
                let value = record.numeric(attr).unwrap_or(column.mean);
                (value - column.mean) / column.std.max(STD_EPSILON)
            })
            .collect();
        NumericFeatureSet { values }
    }
}

fn fit_column(attr: NumericAttribute, records: &[SongRecord]) -> ColumnStats {
    let present: Vec<f64> = records.iter().filter_map(|r| r.numeric(attr)).collect();

    if present.is_empty() {
        warn!(attribute = %attr, "no numeric values for attribute, using mean 0 and std 1");
        return ColumnStats::default();
    }

    let mean = present.iter().sum::<f64>() / present.len() as f64;

    // Imputed entries sit exactly on the mean, so they add nothing to the
    // squared deviations but still count towards the population size.
    let squared: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
    let variance = squared / records.len() as f64;
    let std = variance.sqrt();

    ColumnStats {
        mean,
        std: if std > 0.0 && std.is_finite() { std } else { 1.0 },
    }
}

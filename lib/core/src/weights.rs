//! Fusion weights.
//!
//! The weight table is part of the model configuration: it is stored in the
//! artifact and replayed at query time. Changing any weight requires a full
//! re-fit of the global reducer.

use crate::error::{Error, Result};
use crate::record::{NumericAttribute, TextField};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Entries absent from a serialized table keep their default weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    #[serde(default = "default_numeric", deserialize_with = "numeric_over_defaults")]
    pub numeric: BTreeMap<NumericAttribute, f64>,
    #[serde(default = "default_text", deserialize_with = "text_over_defaults")]
    pub text: BTreeMap<TextField, f64>,
}

fn default_numeric() -> BTreeMap<NumericAttribute, f64> {
    WeightTable::default().numeric
}

fn default_text() -> BTreeMap<TextField, f64> {
    WeightTable::default().text
}

fn numeric_over_defaults<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<NumericAttribute, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut weights = default_numeric();
    weights.extend(BTreeMap::<NumericAttribute, f64>::deserialize(deserializer)?);
    Ok(weights)
}

fn text_over_defaults<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<TextField, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut weights = default_text();
    weights.extend(BTreeMap::<TextField, f64>::deserialize(deserializer)?);
    Ok(weights)
}

impl Default for WeightTable {
    /// Every slot weighs 1.0 except popularity, which is damped to 0.3 so
    /// that chart position does not dominate the audio features.
    fn default() -> Self {
        let mut numeric: BTreeMap<NumericAttribute, f64> =
            NumericAttribute::ALL.iter().map(|&a| (a, 1.0)).collect();
        numeric.insert(NumericAttribute::Popularity, 0.3);
        let text = TextField::ALL.iter().map(|&f| (f, 1.0)).collect();
        Self { numeric, text }
    }
}

impl WeightTable {
    /// A table with every weight equal to 1.0.
    pub fn uniform() -> Self {
        Self {
            numeric: NumericAttribute::ALL.iter().map(|&a| (a, 1.0)).collect(),
            text: TextField::ALL.iter().map(|&f| (f, 1.0)).collect(),
        }
    }

    /// Missing entries weigh 1.0.
    pub fn numeric_weight(&self, attr: NumericAttribute) -> f64 {
        self.numeric.get(&attr).copied().unwrap_or(1.0)
    }

    pub fn text_weight(&self, field: TextField) -> f64 {
        self.text.get(&field).copied().unwrap_or(1.0)
    }

    pub fn set_numeric(&mut self, attr: NumericAttribute, weight: f64) {
        self.numeric.insert(attr, weight);
    }

    pub fn set_text(&mut self, field: TextField, weight: f64) {
        self.text.insert(field, weight);
    }

    /// Every weight must be finite and strictly positive.
    pub fn validate(&self) -> Result<()> {
        for (attr, w) in &self.numeric {
            if !(w.is_finite() && *w > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "weight for '{}' must be positive, got {}",
                    attr, w
                )));
            }
        }
        for (field, w) in &self.text {
            if !(w.is_finite() && *w > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "weight for '{}' must be positive, got {}",
                    field, w
                )));
            }
        }
        Ok(())
    }
}

//! Serde adapters for scores that may be NaN.
//!
//! JSON has no NaN; `serde_json` writes it as `null` and refuses to read
//! `null` back as `f64`. Use these with `#[serde(with = "...")]` so a failed
//! trial's score survives a save/load cycle. Non-finite values are written as
//! `null` and read back as NaN.

use serde::{Deserialize, Deserializer, Serializer};

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// One `f64` score.
pub mod score {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        match finite(*value) {
            Some(v) => serializer.serialize_some(&v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// A `Vec<f64>` of scores.
pub mod scores {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| finite(*v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let values = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

//! Meta-features describing a dataset.
//!
//! Column counts include the target column, matching the way dataset
//! repositories such as OpenML report them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use mt_types::{TunerError, TunerResult};

use crate::datasets::Dataset;

/// Meta-feature name → value.
pub type Metadata = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaFeature {
    NumberOfFeatures,
    NumberOfInstances,
    NumberOfNumericFeatures,
}

impl MetaFeature {
    pub const ALL: [MetaFeature; 3] = [
        Self::NumberOfFeatures,
        Self::NumberOfInstances,
        Self::NumberOfNumericFeatures,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::NumberOfFeatures => "NumberOfFeatures",
            Self::NumberOfInstances => "NumberOfInstances",
            Self::NumberOfNumericFeatures => "NumberOfNumericFeatures",
        }
    }

    pub fn extract(&self, dataset: &Dataset) -> f64 {
        match self {
            Self::NumberOfFeatures => (dataset.n_features() + 1) as f64,
            Self::NumberOfInstances => dataset.n_rows() as f64,
            Self::NumberOfNumericFeatures => {
                (dataset.n_numeric_features() + usize::from(dataset.target_numeric)) as f64
            }
        }
    }
}

impl fmt::Display for MetaFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetaFeature {
    type Err = TunerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|feature| feature.name() == s)
            .ok_or_else(|| TunerError::Index(format!("unknown meta-feature '{s}'")))
    }
}

/// Computes the registered meta-features of datasets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDataExtractor {
    features: Vec<MetaFeature>,
}

impl Default for MetaDataExtractor {
    fn default() -> Self {
        Self {
            features: MetaFeature::ALL.to_vec(),
        }
    }
}

impl MetaDataExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the registry to the named meta-features.
    pub fn with_features(names: &[&str]) -> TunerResult<Self> {
        let features = names
            .iter()
            .map(|name| name.parse())
            .collect::<TunerResult<Vec<MetaFeature>>>()?;
        Ok(Self { features })
    }

    pub fn features(&self) -> &[MetaFeature] {
        &self.features
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.features.iter().any(|f| f.name() == name)
    }

    /// Every registered meta-feature of `dataset`.
    pub fn metadata(&self, dataset: &Dataset) -> Metadata {
        self.features
            .iter()
            .map(|feature| (feature.name().to_string(), feature.extract(dataset)))
            .collect()
    }

    /// Complete externally provided metadata: known values are kept, `None`
    /// or absent registered entries are computed from `dataset`, and names
    /// outside the registry are dropped.
    pub fn fill_missing(
        &self,
        dataset: &Dataset,
        partial: &BTreeMap<String, Option<f64>>,
    ) -> Metadata {
        self.features
            .iter()
            .map(|feature| {
                let value = partial
                    .get(feature.name())
                    .copied()
                    .flatten()
                    .unwrap_or_else(|| feature.extract(dataset));
                (feature.name().to_string(), value)
            })
            .collect()
    }

    /// Drop every entry whose name is not a registered meta-feature.
    pub fn retain_allowed(&self, metadata: &mut Metadata) {
        metadata.retain(|name, _| self.is_allowed(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn dataset() -> Dataset {
        let mut dataset = Dataset::new("toy", Array2::zeros((5, 3)), Array1::zeros(5)).unwrap();
        dataset.numeric_columns = vec![true, false, true];
        dataset
    }

    #[test]
    fn extracts_registered_features() {
        let metadata = MetaDataExtractor::new().metadata(&dataset());
        assert_eq!(metadata["NumberOfFeatures"], 4.0);
        assert_eq!(metadata["NumberOfInstances"], 5.0);
        assert_eq!(metadata["NumberOfNumericFeatures"], 3.0);
    }

    #[test]
    fn fill_missing_keeps_known_values() {
        let mut partial = BTreeMap::new();
        partial.insert("NumberOfInstances".to_string(), Some(1000.0));
        partial.insert("NumberOfFeatures".to_string(), None);
        partial.insert("MajorityClassSize".to_string(), Some(7.0));

        let filled = MetaDataExtractor::new().fill_missing(&dataset(), &partial);
        assert_eq!(filled.len(), 3);
        assert_eq!(filled["NumberOfInstances"], 1000.0);
        assert_eq!(filled["NumberOfFeatures"], 4.0);
        assert_eq!(filled["NumberOfNumericFeatures"], 3.0);
        assert!(!filled.contains_key("MajorityClassSize"));
    }

    #[test]
    fn retain_allowed_filters_unknown_names() {
        let extractor = MetaDataExtractor::with_features(&["NumberOfInstances"]).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("NumberOfInstances".to_string(), 10.0);
        metadata.insert("NumberOfFeatures".to_string(), 2.0);
        metadata.insert("AutoCorrelation".to_string(), 0.5);

        extractor.retain_allowed(&mut metadata);
        assert_eq!(metadata.keys().collect::<Vec<_>>(), vec!["NumberOfInstances"]);
    }

    #[test]
    fn unknown_names_do_not_parse() {
        assert!(MetaDataExtractor::with_features(&["Entropy"]).is_err());
        assert_eq!(
            "NumberOfInstances".parse::<MetaFeature>().unwrap(),
            MetaFeature::NumberOfInstances
        );
    }
}

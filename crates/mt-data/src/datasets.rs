//! Named datasets and the collection used to address them.

use std::ops::Range;

use ndarray::{Array1, Array2};

use mt_types::{config_error, DataError, TunerError, TunerResult};

/// One supervised learning problem: a feature matrix and its target.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub features: Array2<f64>,
    pub target: Array1<f64>,
    pub feature_names: Vec<String>,
    pub target_name: String,
    /// Per feature: `true` when the source column was numeric, `false` when
    /// it was categorical and has been ordinal-encoded.
    pub numeric_columns: Vec<bool>,
    pub target_numeric: bool,
}

impl Dataset {
    /// A fully numeric dataset with generated column names.
    pub fn new(
        name: impl Into<String>,
        features: Array2<f64>,
        target: Array1<f64>,
    ) -> TunerResult<Self> {
        if features.nrows() != target.len() {
            return Err(DataError::ShapeMismatch {
                expected: features.nrows(),
                actual: target.len(),
            }
            .into());
        }
        let n_features = features.ncols();
        Ok(Self {
            name: name.into(),
            features,
            target,
            feature_names: (0..n_features).map(|i| format!("x{i}")).collect(),
            target_name: "y".to_string(),
            numeric_columns: vec![true; n_features],
            target_numeric: true,
        })
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> TunerResult<Self> {
        if names.len() != self.features.ncols() {
            return Err(config_error!(
                "dataset '{}' has {} features but {} names were given",
                self.name,
                self.features.ncols(),
                names.len()
            ));
        }
        self.feature_names = names;
        Ok(self)
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn n_numeric_features(&self) -> usize {
        self.numeric_columns.iter().filter(|&&numeric| numeric).count()
    }
}

fn out_of_range(index: usize, len: usize) -> TunerError {
    TunerError::Index(format!(
        "Provided index is out of range: {index} (collection holds {len} datasets)"
    ))
}

fn unknown_name(name: &str) -> TunerError {
    TunerError::Index(format!("Provided dataset name does not exist: '{name}'"))
}

/// Ordered datasets addressable by position, name or external id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetCollection {
    datasets: Vec<Dataset>,
    external_ids: Option<Vec<u64>>,
}

impl DatasetCollection {
    pub fn new(datasets: Vec<Dataset>) -> Self {
        Self {
            datasets,
            external_ids: None,
        }
    }

    /// Attach one external id (e.g. an OpenML id) per dataset.
    pub fn with_external_ids(mut self, ids: Vec<u64>) -> TunerResult<Self> {
        if ids.len() != self.datasets.len() {
            return Err(config_error!(
                "got {} external ids for {} datasets",
                ids.len(),
                self.datasets.len()
            ));
        }
        self.external_ids = Some(ids);
        Ok(self)
    }

    pub fn push(&mut self, dataset: Dataset) {
        self.datasets.push(dataset);
        self.external_ids = None;
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Dataset> {
        self.datasets.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn get(&self, index: usize) -> TunerResult<&Dataset> {
        self.datasets
            .get(index)
            .ok_or_else(|| out_of_range(index, self.datasets.len()))
    }

    /// First dataset with the given name.
    pub fn by_name(&self, name: &str) -> TunerResult<&Dataset> {
        self.datasets
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| unknown_name(name))
    }

    pub fn slice(&self, range: Range<usize>) -> TunerResult<&[Dataset]> {
        if range.start > range.end {
            return Err(TunerError::Index(format!(
                "Provided slice is empty: {}..{}",
                range.start, range.end
            )));
        }
        if range.end > self.datasets.len() {
            return Err(out_of_range(range.end, self.datasets.len()));
        }
        Ok(&self.datasets[range])
    }

    pub fn select_indices(&self, indices: &[usize]) -> TunerResult<Vec<&Dataset>> {
        indices.iter().map(|&i| self.get(i)).collect()
    }

    pub fn select_names(&self, names: &[&str]) -> TunerResult<Vec<&Dataset>> {
        names.iter().map(|name| self.by_name(name)).collect()
    }

    pub fn by_external_id(&self, id: u64) -> TunerResult<&Dataset> {
        let ids = self
            .external_ids
            .as_ref()
            .ok_or_else(|| TunerError::Index("collection has no external ids".to_string()))?;
        ids.iter()
            .position(|&candidate| candidate == id)
            .map(|idx| &self.datasets[idx])
            .ok_or_else(|| TunerError::Index(format!("Provided external id does not exist: {id}")))
    }

    pub fn external_ids(&self) -> Option<&[u64]> {
        self.external_ids.as_deref()
    }
}

impl FromIterator<Dataset> for DatasetCollection {
    fn from_iter<I: IntoIterator<Item = Dataset>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a DatasetCollection {
    type Item = &'a Dataset;
    type IntoIter = std::slice::Iter<'a, Dataset>;

    fn into_iter(self) -> Self::IntoIter {
        self.datasets.iter()
    }
}

impl IntoIterator for DatasetCollection {
    type Item = Dataset;
    type IntoIter = std::vec::IntoIter<Dataset>;

    fn into_iter(self) -> Self::IntoIter {
        self.datasets.into_iter()
    }
}

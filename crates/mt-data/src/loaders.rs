//! CSV ingestion.
//!
//! Every file is one dataset whose last column is the target. Columns whose
//! non-empty cells all parse as numbers stay numeric (empty cells become
//! `NaN`); any other column is categorical and ordinal-encoded by the sorted
//! distinct values it contains.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use ndarray::{Array1, Array2};

use mt_types::{DataError, TunerResult};

use crate::datasets::{Dataset, DatasetCollection};

/// A train/test split stored as `<dir>/<name>/train.csv` and `test.csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldoutPair {
    pub name: String,
    pub train: Dataset,
    pub test: Dataset,
}

/// Raw string cells of one CSV file.
#[derive(Debug)]
struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// How one column is turned into numbers.
#[derive(Debug)]
enum ColumnEncoding {
    Numeric,
    Ordinal(Vec<String>),
}

impl ColumnEncoding {
    fn encode(&self, cell: &str) -> f64 {
        let cell = cell.trim();
        if cell.is_empty() {
            return f64::NAN;
        }
        match self {
            Self::Numeric => cell.parse().unwrap_or(f64::NAN),
            Self::Ordinal(levels) => levels
                .binary_search_by(|level| level.as_str().cmp(cell))
                .map_or(f64::NAN, |idx| idx as f64),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric)
    }
}

#[derive(Debug, Clone)]
pub struct CsvLoader {
    has_headers: bool,
    delimiter: u8,
}

impl Default for CsvLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvLoader {
    pub fn new() -> Self {
        Self {
            has_headers: true,
            delimiter: b',',
        }
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load one file; the dataset is named after the file stem.
    pub fn load_file<P: AsRef<Path>>(&self, file_path: P) -> TunerResult<Dataset> {
        let path = file_path.as_ref();
        let table = self.read_table(path)?;
        let encodings = column_encodings(&[&table]);
        let dataset = build_dataset(file_stem(path), &table, &encodings)?;

        tracing::info!(
            "Loaded dataset '{}' with {} rows and {} features",
            dataset.name,
            dataset.n_rows(),
            dataset.n_features()
        );
        Ok(dataset)
    }

    /// Load every `*.csv` file in `dir`, sorted by file name. Files that
    /// fail to load are logged and skipped.
    pub fn load_dir<P: AsRef<Path>>(&self, dir: P) -> TunerResult<DatasetCollection> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        paths.sort();

        let mut datasets = DatasetCollection::default();
        for path in paths {
            match self.load_file(&path) {
                Ok(dataset) => datasets.push(dataset),
                Err(e) => tracing::warn!("Skipping dataset {}: {}", path.display(), e),
            }
        }

        tracing::info!("Loaded {} datasets from {}", datasets.len(), dir.display());
        Ok(datasets)
    }

    /// Load every `<dir>/<name>/{train,test}.csv` pair, sorted by name.
    /// Categorical levels are shared between the two files of a pair so both
    /// sides use the same codes.
    pub fn load_holdout_dir<P: AsRef<Path>>(&self, dir: P) -> TunerResult<Vec<HoldoutPair>> {
        let dir = dir.as_ref();
        let mut subdirs: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        subdirs.sort();

        let mut pairs = Vec::new();
        for subdir in subdirs {
            match self.load_pair(&subdir) {
                Ok(pair) => pairs.push(pair),
                Err(e) => tracing::warn!("Skipping holdout pair {}: {}", subdir.display(), e),
            }
        }

        tracing::info!("Loaded {} holdout pairs from {}", pairs.len(), dir.display());
        Ok(pairs)
    }

    fn load_pair(&self, subdir: &Path) -> TunerResult<HoldoutPair> {
        let name = subdir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let train = self.read_table(&subdir.join("train.csv"))?;
        let test = self.read_table(&subdir.join("test.csv"))?;
        if train.headers.len() != test.headers.len() {
            return Err(DataError::InvalidFormat {
                message: format!(
                    "train has {} columns but test has {}",
                    train.headers.len(),
                    test.headers.len()
                ),
            }
            .into());
        }

        let encodings = column_encodings(&[&train, &test]);
        Ok(HoldoutPair {
            train: build_dataset(name.clone(), &train, &encodings)?,
            test: build_dataset(name.clone(), &test, &encodings)?,
            name,
        })
    }

    fn read_table(&self, path: &Path) -> TunerResult<RawTable> {
        tracing::info!("Loading CSV data from: {}", path.display());

        let mut rdr = ReaderBuilder::new()
            .has_headers(self.has_headers)
            .delimiter(self.delimiter)
            .flexible(true)
            .from_path(path)
            .map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to open CSV file {}: {}", path.display(), e),
            })?;

        let mut headers: Vec<String> = if self.has_headers {
            rdr.headers()
                .map_err(|e| DataError::LoadingFailed {
                    message: format!("Failed to read CSV headers: {}", e),
                })?
                .iter()
                .map(|h| h.trim().to_string())
                .collect()
        } else {
            Vec::new()
        };
        tracing::debug!("CSV headers: {:?}", headers);

        let first_line = if self.has_headers { 2 } else { 1 };
        let mut rows = Vec::new();
        for (line_num, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| DataError::LoadingFailed {
                message: format!(
                    "Failed to read CSV record at line {}: {}",
                    line_num + first_line,
                    e
                ),
            })?;

            if headers.is_empty() {
                headers = (0..record.len()).map(|i| format!("x{i}")).collect();
            }
            if record.len() != headers.len() {
                tracing::warn!(
                    "Skipping record at line {}: expected {} fields, got {}",
                    line_num + first_line,
                    headers.len(),
                    record.len()
                );
                continue;
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        if headers.len() < 2 {
            return Err(DataError::InvalidFormat {
                message: format!(
                    "{} needs at least one feature column and a target column",
                    path.display()
                ),
            }
            .into());
        }
        if rows.is_empty() {
            return Err(DataError::InsufficientData {
                message: format!("{} has no data rows", path.display()),
            }
            .into());
        }

        Ok(RawTable { headers, rows })
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Decide per column whether it is numeric, looking at every table given.
fn column_encodings(tables: &[&RawTable]) -> Vec<ColumnEncoding> {
    let n_cols = tables.first().map_or(0, |t| t.headers.len());
    (0..n_cols)
        .map(|col| {
            let cells = || {
                tables
                    .iter()
                    .copied()
                    .flat_map(move |t| t.rows.iter().map(move |row| row[col].trim()))
                    .filter(|cell| !cell.is_empty())
            };
            if cells().all(|cell| cell.parse::<f64>().is_ok()) {
                ColumnEncoding::Numeric
            } else {
                let levels: BTreeSet<&str> = cells().collect();
                ColumnEncoding::Ordinal(levels.into_iter().map(str::to_string).collect())
            }
        })
        .collect()
}

fn build_dataset(name: String, table: &RawTable, encodings: &[ColumnEncoding]) -> TunerResult<Dataset> {
    let n_rows = table.rows.len();
    let n_features = table.headers.len() - 1;

    let features = Array2::from_shape_fn((n_rows, n_features), |(i, j)| {
        encodings[j].encode(&table.rows[i][j])
    });
    let target = Array1::from_shape_fn(n_rows, |i| {
        encodings[n_features].encode(&table.rows[i][n_features])
    });

    let mut dataset = Dataset::new(name, features, target)?
        .with_feature_names(table.headers[..n_features].to_vec())?;
    dataset.target_name = table.headers[n_features].clone();
    dataset.numeric_columns = encodings[..n_features]
        .iter()
        .map(ColumnEncoding::is_numeric)
        .collect();
    dataset.target_numeric = encodings[n_features].is_numeric();
    Ok(dataset)
}

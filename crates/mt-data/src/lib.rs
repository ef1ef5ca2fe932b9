//! # mt-data
//!
//! Tabular datasets for meta-tuner experiments: an indexable collection of
//! named datasets, a CSV loader that turns raw files into numeric matrices,
//! and the meta-features describing each dataset.

pub mod datasets;
pub mod loaders;
pub mod metadata;

pub use datasets::{Dataset, DatasetCollection};
pub use loaders::{CsvLoader, HoldoutPair};
pub use metadata::{MetaDataExtractor, MetaFeature, Metadata};

//! # mt-tunability
//!
//! Post-hoc analysis of completed searches over many datasets: find one
//! default configuration that works well everywhere and measure how much
//! tuning gains over it on each dataset.

pub mod extractor;
pub mod record;

pub use extractor::{DatasetGain, TunabilityExtractor, TunabilityReport};
pub use record::TunabilityRecord;

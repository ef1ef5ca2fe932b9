pub mod errors;
pub mod estimator;
pub mod nan_serde;
pub mod params;

pub use errors::*;
pub use estimator::*;
pub use params::*;

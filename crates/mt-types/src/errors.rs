use thiserror::Error;

/// Main error type for meta-tuner
#[derive(Error, Debug)]
pub enum TunerError {
    /// Invalid search-space or run configuration, raised when it is built.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A grid condition read a hyperparameter that was not drawn yet.
    #[error("Unresolved dependency: hyperparameter '{key}' is not present in the partial assignment")]
    Dependency { key: String },

    #[error("Type mismatch for hyperparameter '{key}': expected {expected}, got {actual}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: String,
    },

    #[error("Index error: {0}")]
    Index(String),

    /// An operation was called before the state it depends on exists.
    #[error("State error: {0}")]
    State(String),

    #[error("Estimator error: {0}")]
    Estimator(String),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Data-related errors
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Invalid data format: {message}")]
    InvalidFormat { message: String },

    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },

    #[error("Shape mismatch: expected {expected} rows, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

/// Result type alias for meta-tuner operations
pub type TunerResult<T> = Result<T, TunerError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::TunerError::Configuration(format!($($arg)*))
    };
}

/// Macro for creating state errors
#[macro_export]
macro_rules! state_error {
    ($($arg:tt)*) => {
        $crate::TunerError::State(format!($($arg)*))
    };
}

/// Macro for creating estimator errors
#[macro_export]
macro_rules! estimator_error {
    ($($arg:tt)*) => {
        $crate::TunerError::Estimator(format!($($arg)*))
    };
}

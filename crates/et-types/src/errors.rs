use thiserror::Error;

/// Main error type for the EventTune system
#[derive(Error, Debug)]
pub enum TuneError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(String),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Data-related errors
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Data source not found: {0}")]
    SourceNotFound(String),

    #[error("Column not found: {column} in {source_name}")]
    ColumnNotFound { column: String, source_name: String },

    #[error("Unsupported file format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Invalid data format: {message}")]
    InvalidFormat { message: String },

    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },

    #[error("Shape mismatch: {message}")]
    ShapeMismatch { message: String },
}

/// Model construction, training and scoring errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Training diverged at epoch {epoch}: loss is {loss}")]
    Diverged { epoch: usize, loss: f32 },

    #[error("Metric computation failed: {message}")]
    Metric { message: String },

    #[error("Artifact error: {message}")]
    Artifact { message: String },

    #[error("Tensor backend error: {message}")]
    Backend { message: String },
}

/// Hyperparameter search errors
#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Invalid search space: {message}")]
    InvalidSpace { message: String },

    #[error("Parameter error: {parameter}, message: {message}")]
    ParameterError { parameter: String, message: String },

    #[error("Surrogate model fit failed: {message}")]
    SurrogateFailed { message: String },

    #[error("No trials completed")]
    NoTrials,
}

/// Result type alias for EventTune operations
pub type TuneResult<T> = Result<T, TuneError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::TuneError::Config(format!($($arg)*))
    };
}

//! ## Custom Errors for the Bike Rental Model
//!
//! This module defines the error types used throughout the crate.
//! It uses the `thiserror` crate to derive the `Error` trait for custom error types.
//! The `BikeRentalError` enum covers the failure modes of data loading, the transformers, the
//! estimator and model persistence.
//!
//! Validation problems found in incoming records are *not* errors in this sense: they are
//! collected in [`crate::processing::validation::ValidationErrors`] and returned next to the
//! predictions. Everything in this module is fatal for the call that produced it.
//!
//! The `BikeRentalResult` type alias simplifies error handling by providing a convenient
//! alias for results returned by the library.
//!
//! ### Example
//!
//! ```rust
//! use bikerental_model::exceptions::{BikeRentalError, BikeRentalResult};
//!
//! fn lookup(value: &str) -> BikeRentalResult<i64> {
//!     Err(BikeRentalError::UnmappedCategory {
//!         column: "season".into(),
//!         value: value.into(),
//!     })
//! }
//! ```

use thiserror::Error;

/// Errors specific to the bike rental model.
#[derive(Debug, Error)]
pub enum BikeRentalError {
    /// Wraps underlying I/O errors.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Wraps errors from DataFusion.
    #[error("DataFusion error: {0}")]
    DataFusionError(#[from] datafusion::error::DataFusionError),

    /// Wraps errors from Arrow.
    #[error("Arrow error: {0}")]
    ArrowError(#[from] datafusion::arrow::error::ArrowError),

    /// Wraps errors raised while (de)serializing a pipeline artifact.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Indicates that an invalid parameter was provided (e.g., an empty column or incorrect data type).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Indicates that the provided data format is unsupported (e.g., unknown file format).
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Indicates that the specified column does not exist in the DataFrame.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A categorical value has no entry in an ordinal mapping table.
    #[error("Unmapped category in column '{column}': {value}")]
    UnmappedCategory { column: String, value: String },

    /// A transformer was configured with an unsupported option (detected at fit time).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Indicates the transform method was called before calling fit for a stateful transformer.
    #[error("Transform called before fit for stateful transformer")]
    FitNotCalled,

    /// A named pipeline stage failed; `source` keeps the original error.
    #[error("Pipeline stage '{stage}' failed: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: Box<BikeRentalError>,
    },
}

impl BikeRentalError {
    /// Wraps `self` with the name of the pipeline stage it came from.
    pub fn in_stage(self, stage: &str) -> Self {
        BikeRentalError::StageFailed {
            stage: stage.to_string(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, looking through any `StageFailed` wrappers.
    pub fn root_cause(&self) -> &BikeRentalError {
        match self {
            BikeRentalError::StageFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// A convenient result type for bike rental model operations.
pub type BikeRentalResult<T> = std::result::Result<T, BikeRentalError>;

//! # Bike Rental Model
//!
//! A demand model for hourly bike rentals built on Apache DataFusion. Raw rental records go
//! through a fixed feature pipeline (imputation, ordinal mapping, outlier capping, one-hot
//! encoding, column selection and scaling) into a random forest regressor.
//!
//! - [`train::train_pipeline`] fits the pipeline on the training dataset and saves it.
//! - [`predict::make_prediction`] validates raw records and scores them with the saved pipeline.

pub mod bike_pipeline;
pub mod exceptions;
pub mod frame;
mod logging;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod processing;
pub mod settings;
pub mod train;
pub mod transformers;

/// Version of the package; saved pipelines are named after it.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

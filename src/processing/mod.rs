//! # Data Processing
//!
//! Everything that happens to data outside the fitted pipeline: input validation, dataset
//! loading and preparation, splitting, and pipeline persistence.

pub mod data_manager;
pub mod validation;

//! # Transformer Implementations
//!
//! The submodules contain the transformers that make up the bike rental feature pipeline.

pub mod categorical_encoding;
pub mod datetime_features;
pub mod feature_selection;
pub mod imputation;
pub mod outlier_handling;
pub mod scaling_and_normalization;

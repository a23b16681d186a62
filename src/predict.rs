//! ## Prediction
//!
//! Scores raw JSON records with a fitted [`BikeRentalPipeline`].
//!
//! ### Example
//!
//! ```rust,no_run
//! use bikerental_model::predict::predict_with_saved_model;
//! use bikerental_model::settings::Config;
//! use serde_json::json;
//!
//! # async fn run() -> bikerental_model::exceptions::BikeRentalResult<()> {
//! let records = vec![json!({
//!     "dteday": "2012-11-05", "season": "winter", "hr": "2am", "holiday": "No",
//!     "weekday": "Mon", "workingday": "Yes", "weathersit": "Mist",
//!     "temp": 6.1, "atemp": 3.0014, "hum": 49, "windspeed": 19.0012
//! })];
//! let results = predict_with_saved_model(&Config::from_env(), &records).await?;
//! for (record, prediction) in records.iter().zip(&results.predictions) {
//!     println!("{} -> {:?}", record["hr"], prediction);
//! }
//! # Ok(())
//! # }
//! ```

use crate::bike_pipeline::BikeRentalPipeline;
use crate::exceptions::BikeRentalResult;
use crate::processing::data_manager::{
    inputs_to_dataframe, load_pipeline, pre_pipeline_preparation, select_features,
};
use crate::processing::validation::{validate_inputs, ValidationErrors};
use crate::settings::{Config, ModelConfig};
use crate::VERSION;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::info;

/// One prediction slot per input record, in input order, plus the report of rejected records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResults {
    /// `None` for records rejected by validation.
    pub predictions: Vec<Option<f64>>,
    pub version: String,
    pub errors: Option<ValidationErrors>,
}

/// Validates `records` and predicts rental counts for the ones that pass.
///
/// The returned predictions line up with `records`; rejected records get `None` and are listed
/// in `errors`.
pub async fn make_prediction(
    pipeline: &BikeRentalPipeline,
    config: &ModelConfig,
    records: &[Value],
) -> BikeRentalResult<PredictionResults> {
    let (accepted, errors) = validate_inputs(config, records);
    let scored = if accepted.is_empty() {
        Vec::new()
    } else {
        let df = inputs_to_dataframe(&accepted)?;
        let df = select_features(pre_pipeline_preparation(df, config)?, config)?;
        pipeline.predict(df).await?
    };
    info!("Predicted {} of {} records", scored.len(), records.len());

    let rejected: BTreeSet<usize> = errors
        .as_ref()
        .map(|e| e.rejected_indices().into_iter().collect())
        .unwrap_or_default();
    let mut scored = scored.into_iter();
    let predictions = (0..records.len())
        .map(|i| {
            if rejected.contains(&i) {
                None
            } else {
                scored.next()
            }
        })
        .collect();
    Ok(PredictionResults {
        predictions,
        version: VERSION.to_string(),
        errors,
    })
}

/// Loads the saved pipeline for this version and calls [`make_prediction`].
pub async fn predict_with_saved_model(
    config: &Config,
    records: &[Value],
) -> BikeRentalResult<PredictionResults> {
    let pipeline = load_pipeline(&config.app)?;
    make_prediction(&pipeline, &config.model, records).await
}

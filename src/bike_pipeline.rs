//! ## Bike Rental Pipeline
//!
//! The fixed feature chain of the bike rental model terminated by a random forest regressor.
//!
//! Stage order:
//!
//! 1. `weekday_imputation`, `weathersit_imputation`
//! 2. `map_yr`, `map_mnth`, `map_season`, `map_weathersit`, `map_holiday`, `map_workingday`, `map_hr`
//! 3. `outlier_handler` on the numerical features
//! 4. `weekday_encoder`
//! 5. `numeric_selector`
//! 6. `scaler`
//! 7. `model_rf`

use crate::exceptions::{BikeRentalError, BikeRentalResult};
use crate::frame::{column_names, to_feature_matrix};
use crate::make_pipeline;
use crate::model::RandomForest;
use crate::pipeline::Pipeline;
use crate::settings::ModelConfig;
use crate::transformers::categorical_encoding::{Mapper, WeekdayOneHotEncoder};
use crate::transformers::feature_selection::NumericColumnSelector;
use crate::transformers::imputation::{WeathersitImputer, WeekdayImputer};
use crate::transformers::outlier_handling::OutlierHandler;
use crate::transformers::scaling_and_normalization::StandardScaler;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Stage name of the estimator in error messages.
pub const ESTIMATOR_STAGE: &str = "model_rf";

/// Builds the unfitted feature chain described by `config`.
pub fn build_feature_pipeline(config: &ModelConfig) -> Pipeline {
    make_pipeline!(
        false,
        (
            "weekday_imputation",
            WeekdayImputer::with_date_column(&config.weekday_var, &config.date_var)
        ),
        (
            "weathersit_imputation",
            WeathersitImputer::with_default(&config.weathersit_var, &config.weathersit_default)
        ),
        (
            "map_yr",
            Mapper::new(&config.year_var, config.year_mapping.clone())
        ),
        (
            "map_mnth",
            Mapper::new(&config.month_var, config.month_mappings.clone())
        ),
        (
            "map_season",
            Mapper::new(&config.season_var, config.season_mappings.clone())
        ),
        (
            "map_weathersit",
            Mapper::new(&config.weathersit_var, config.weather_mappings.clone())
        ),
        (
            "map_holiday",
            Mapper::new(&config.holiday_var, config.holiday_mapping.clone())
        ),
        (
            "map_workingday",
            Mapper::new(&config.workingday_var, config.workingday_mapping.clone())
        ),
        (
            "map_hr",
            Mapper::new(&config.hour_var, config.hour_mapping.clone())
        ),
        (
            "outlier_handler",
            OutlierHandler::new(
                config.numerical_features.clone(),
                config.outlier_method.clone(),
                config.outlier_factor
            )
        ),
        (
            "weekday_encoder",
            WeekdayOneHotEncoder::new(&config.weekday_var, config.weekday_drop_first)
        ),
        ("numeric_selector", NumericColumnSelector::new()),
        ("scaler", StandardScaler::new()),
    )
}

/// Feature chain plus estimator, fitted and persisted as one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BikeRentalPipeline {
    features: Pipeline,
    estimator: RandomForest,
}

impl BikeRentalPipeline {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            features: build_feature_pipeline(config),
            estimator: RandomForest::new(config.forest.clone()),
        }
    }

    pub fn feature_pipeline(&self) -> &Pipeline {
        &self.features
    }

    pub fn estimator(&self) -> &RandomForest {
        &self.estimator
    }

    pub fn is_fitted(&self) -> bool {
        self.features.is_fitted() && self.estimator.is_fitted()
    }

    /// Fits every feature stage, then the forest on the transformed batch.
    ///
    /// `target` holds one value per row of `df`, in row order.
    pub async fn fit(&mut self, df: &DataFrame, target: &[f64]) -> BikeRentalResult<()> {
        let transformed = self.features.fit(df).await?;
        let names = column_names(&transformed);
        let matrix = to_feature_matrix(&transformed, &names)
            .await
            .map_err(|e| e.in_stage(ESTIMATOR_STAGE))?;
        info!(
            "Training the forest on {} rows and {} features",
            matrix.len(),
            names.len()
        );
        self.estimator
            .fit(&matrix, target, names)
            .map_err(|e| e.in_stage(ESTIMATOR_STAGE))
    }

    /// Runs the feature stages only.
    pub async fn transform(&self, df: DataFrame) -> BikeRentalResult<DataFrame> {
        self.features.transform(df).await
    }

    /// One prediction per input row, in input order.
    pub async fn predict(&self, df: DataFrame) -> BikeRentalResult<Vec<f64>> {
        if !self.is_fitted() {
            return Err(BikeRentalError::FitNotCalled);
        }
        let transformed = self.features.transform(df).await?;
        let available = column_names(&transformed);
        let expected = self.estimator.feature_names();
        if let Some(missing) = expected.iter().find(|name| !available.contains(name)) {
            return Err(BikeRentalError::MissingColumn(format!(
                "Feature '{}' used to train the model is missing",
                missing
            ))
            .in_stage(ESTIMATOR_STAGE));
        }
        let matrix = to_feature_matrix(&transformed, expected)
            .await
            .map_err(|e| e.in_stage(ESTIMATOR_STAGE))?;
        self.estimator
            .predict(&matrix)
            .map_err(|e| e.in_stage(ESTIMATOR_STAGE))
    }
}

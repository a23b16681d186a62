//! ## Training
//!
//! Fits the bike rental pipeline on the training dataset, scores it on a held-out split and
//! saves it.

use crate::bike_pipeline::BikeRentalPipeline;
use crate::exceptions::BikeRentalResult;
use crate::model::{mean_squared_error, r2_score};
use crate::processing::data_manager::{
    load_dataset, pre_pipeline_preparation, save_pipeline, split_features_target,
    train_test_split,
};
use crate::settings::{Config, ModelConfig};
use datafusion::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Outcome of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub train_rows: usize,
    pub test_rows: usize,
    /// Coefficient of determination on the test split.
    pub r2: f64,
    /// Root mean squared error on the test split.
    pub rmse: f64,
    /// Model features with their importance, most important first.
    pub feature_importances: Vec<(String, f64)>,
    /// Where the fitted pipeline was saved; empty until saved.
    pub artifact: PathBuf,
}

/// Splits a prepared dataset, fits a fresh pipeline on the train part and scores it on the
/// test part.
pub async fn fit_and_evaluate(
    df: &DataFrame,
    config: &ModelConfig,
) -> BikeRentalResult<(BikeRentalPipeline, TrainingReport)> {
    let (train, test) = train_test_split(df, config.test_size, config.random_state).await?;
    let (x_train, y_train) = split_features_target(train, config).await?;
    let (x_test, y_test) = split_features_target(test, config).await?;

    let mut pipeline = BikeRentalPipeline::new(config);
    pipeline.fit(&x_train, &y_train).await?;
    let predictions = pipeline.predict(x_test).await?;

    let r2 = r2_score(&y_test, &predictions);
    let rmse = mean_squared_error(&y_test, &predictions).sqrt();
    info!("Test R2: {:.4}, RMSE: {:.2}", r2, rmse);

    let feature_importances = pipeline
        .estimator()
        .feature_importance_ranking()
        .into_iter()
        .map(|(name, importance)| (name.to_string(), importance))
        .collect();
    let report = TrainingReport {
        train_rows: y_train.len(),
        test_rows: y_test.len(),
        r2,
        rmse,
        feature_importances,
        artifact: PathBuf::new(),
    };
    Ok((pipeline, report))
}

/// Loads the training data named in `config`, fits, evaluates and saves the pipeline.
pub async fn train_pipeline(config: &Config) -> BikeRentalResult<TrainingReport> {
    let raw = load_dataset(&config.app.training_data_file).await?;
    let prepared = pre_pipeline_preparation(raw, &config.model)?;
    let (pipeline, mut report) = fit_and_evaluate(&prepared, &config.model).await?;
    report.artifact = save_pipeline(&pipeline, &config.app)?;
    Ok(report)
}

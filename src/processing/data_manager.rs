//! ## Data Management
//!
//! Loading the training dataset, preparing raw batches for the pipeline, splitting them, and
//! saving or loading fitted pipelines.
//!
//! A saved pipeline is one JSON file named `{pipeline_save_file}{VERSION}.json` inside the
//! trained-model directory. It holds the package version and the whole fitted
//! [`BikeRentalPipeline`]: learned bounds, fill value, categories, numeric columns, scaler
//! parameters and trees.

use crate::bike_pipeline::BikeRentalPipeline;
use crate::exceptions::{BikeRentalError, BikeRentalResult};
use crate::frame::{
    collect_batch, collect_f64_column, has_column, session_context, validate_columns,
};
use crate::processing::validation::DataInput;
use crate::settings::{AppConfig, ModelConfig};
use crate::transformers::datetime_features::{month_name_expr, year_label_expr};
use crate::transformers::imputation::apply_imputation;
use crate::VERSION;
use datafusion::arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use datafusion::arrow::compute::take_record_batch;
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use datafusion_expr::{cast, ident, lit, Expr};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Reads a CSV or Parquet file (chosen by extension) into memory.
pub async fn load_dataset(path: &Path) -> BikeRentalResult<DataFrame> {
    let location = path.to_str().ok_or_else(|| {
        BikeRentalError::InvalidParameter(format!("Path {:?} is not valid UTF-8", path))
    })?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let ctx = session_context();
    let df = match extension.as_deref() {
        Some("csv") => ctx.read_csv(location, CsvReadOptions::new()).await?,
        Some("parquet") => {
            ctx.read_parquet(location, ParquetReadOptions::default())
                .await?
        }
        _ => {
            return Err(BikeRentalError::UnsupportedFormat(format!(
                "Expected a .csv or .parquet file, got {}",
                location
            )))
        }
    };
    let batch = collect_batch(&df).await?;
    info!("Loaded {} rows from {}", batch.num_rows(), location);
    Ok(ctx.read_batch(batch)?)
}

/// Prepares a raw batch for the pipeline.
///
/// - the date column becomes text;
/// - `yr` and `mnth` are kept where present and otherwise derived from the date (the year as
///   text, the English month name);
/// - the unused fields are dropped.
pub fn pre_pipeline_preparation(
    df: DataFrame,
    config: &ModelConfig,
) -> BikeRentalResult<DataFrame> {
    validate_columns(&df, &[config.date_var.clone()])?;

    let mut exprs: Vec<Expr> = Vec::new();
    for field in df.schema().fields().iter() {
        let name = field.name();
        if config.unused_fields.contains(name) {
            continue;
        }
        if *name == config.date_var {
            exprs.push(cast(ident(name), DataType::Utf8).alias(name));
        } else {
            exprs.push(ident(name));
        }
    }
    for derived in [&config.year_var, &config.month_var] {
        if !has_column(&df, derived) {
            exprs.push(lit(ScalarValue::Utf8(None)).alias(derived));
        }
    }

    let df = df.select(exprs)?;
    let df = apply_imputation(df, &config.year_var, year_label_expr(&config.date_var))?;
    apply_imputation(df, &config.month_var, month_name_expr(&config.date_var))
}

/// Builds a batch holding the validated records, one row each, in order.
pub fn inputs_to_dataframe(records: &[DataInput]) -> BikeRentalResult<DataFrame> {
    fn text(records: &[DataInput], get: fn(&DataInput) -> &Option<String>) -> ArrayRef {
        Arc::new(StringArray::from(
            records.iter().map(|r| get(r).clone()).collect::<Vec<_>>(),
        ))
    }
    fn number(records: &[DataInput], get: fn(&DataInput) -> Option<f64>) -> ArrayRef {
        Arc::new(Float64Array::from(
            records.iter().map(get).collect::<Vec<_>>(),
        ))
    }

    let columns: Vec<(&str, ArrayRef)> = vec![
        ("dteday", text(records, |r| &r.dteday)),
        ("season", text(records, |r| &r.season)),
        ("hr", text(records, |r| &r.hr)),
        ("holiday", text(records, |r| &r.holiday)),
        ("weekday", text(records, |r| &r.weekday)),
        ("workingday", text(records, |r| &r.workingday)),
        ("weathersit", text(records, |r| &r.weathersit)),
        ("temp", number(records, |r| r.temp)),
        ("atemp", number(records, |r| r.atemp)),
        ("hum", number(records, |r| r.hum)),
        ("windspeed", number(records, |r| r.windspeed)),
        ("yr", text(records, |r| &r.yr)),
        ("mnth", text(records, |r| &r.mnth)),
    ];
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect::<Vec<_>>(),
    ));
    let batch = RecordBatch::try_new(schema, columns.into_iter().map(|(_, a)| a).collect())?;
    Ok(session_context().read_batch(batch)?)
}

/// Restricts the batch to the configured features and pulls out the target column.
pub async fn split_features_target(
    df: DataFrame,
    config: &ModelConfig,
) -> BikeRentalResult<(DataFrame, Vec<f64>)> {
    let target = collect_f64_column(&df, &config.target)
        .await?
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| {
                BikeRentalError::InvalidParameter(format!(
                    "Missing target value '{}' at row {}",
                    config.target, i
                ))
            })
        })
        .collect::<BikeRentalResult<Vec<f64>>>()?;
    let features = select_features(df, config)?;
    Ok((features, target))
}

/// Projects the batch onto the configured feature columns, in configuration order.
pub fn select_features(df: DataFrame, config: &ModelConfig) -> BikeRentalResult<DataFrame> {
    validate_columns(&df, &config.features)?;
    let exprs: Vec<Expr> = config.features.iter().map(|name| ident(name)).collect();
    Ok(df.select(exprs)?)
}

/// Shuffles the rows with a seeded generator and splits off `test_size` of them (rounded up)
/// as the test batch. Returns `(train, test)`.
pub async fn train_test_split(
    df: &DataFrame,
    test_size: f64,
    seed: u64,
) -> BikeRentalResult<(DataFrame, DataFrame)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(BikeRentalError::InvalidParameter(format!(
            "test_size must be between 0 and 1, got {}",
            test_size
        )));
    }
    let batch = collect_batch(df).await?;
    let n = batch.num_rows();
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(BikeRentalError::InvalidParameter(format!(
            "Cannot split {} rows with test_size {}",
            n, test_size
        )));
    }

    let mut indices: Vec<u64> = (0..n as u64).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let (test_idx, train_idx) = indices.split_at(n_test);
    debug!("Split {} rows into {} train / {} test", n, train_idx.len(), n_test);

    let ctx = session_context();
    let train = take_record_batch(&batch, &UInt64Array::from(train_idx.to_vec()))?;
    let test = take_record_batch(&batch, &UInt64Array::from(test_idx.to_vec()))?;
    Ok((ctx.read_batch(train)?, ctx.read_batch(test)?))
}

/// Contents of a saved pipeline file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub version: String,
    pub pipeline: BikeRentalPipeline,
}

#[derive(Serialize)]
struct PipelineArtifactRef<'a> {
    version: &'a str,
    pipeline: &'a BikeRentalPipeline,
}

/// File name of the artifact for the current package version.
pub fn pipeline_file_name(app: &AppConfig) -> String {
    format!("{}{}.json", app.pipeline_save_file, VERSION)
}

/// Full path of the artifact for the current package version.
pub fn pipeline_path(app: &AppConfig) -> PathBuf {
    app.trained_model_dir.join(pipeline_file_name(app))
}

/// Saves the fitted pipeline and removes artifacts of other versions. Returns the written path.
pub fn save_pipeline(
    pipeline: &BikeRentalPipeline,
    app: &AppConfig,
) -> BikeRentalResult<PathBuf> {
    if !pipeline.is_fitted() {
        return Err(BikeRentalError::FitNotCalled);
    }
    fs::create_dir_all(&app.trained_model_dir)?;
    let file_name = pipeline_file_name(app);
    remove_old_pipelines(&app.trained_model_dir, &app.pipeline_save_file, &file_name)?;

    let path = app.trained_model_dir.join(&file_name);
    let artifact = PipelineArtifactRef {
        version: VERSION,
        pipeline,
    };
    fs::write(&path, serde_json::to_string(&artifact)?)?;
    info!("Saved pipeline to {}", path.display());
    Ok(path)
}

/// Loads the artifact for the current package version.
pub fn load_pipeline(app: &AppConfig) -> BikeRentalResult<BikeRentalPipeline> {
    load_pipeline_file(&pipeline_path(app))
}

/// Loads a pipeline artifact from an explicit path.
pub fn load_pipeline_file(path: &Path) -> BikeRentalResult<BikeRentalPipeline> {
    let contents = fs::read_to_string(path)?;
    let artifact: PipelineArtifact = serde_json::from_str(&contents)?;
    if artifact.version != VERSION {
        return Err(BikeRentalError::InvalidConfiguration(format!(
            "Pipeline at {} was saved by version {}, this is version {}",
            path.display(),
            artifact.version,
            VERSION
        )));
    }
    if !artifact.pipeline.is_fitted() {
        return Err(BikeRentalError::FitNotCalled);
    }
    Ok(artifact.pipeline)
}

fn remove_old_pipelines(dir: &Path, prefix: &str, keep: &str) -> BikeRentalResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(prefix) && name.ends_with(".json") && name != keep {
            debug!("Removing old pipeline {}", name);
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

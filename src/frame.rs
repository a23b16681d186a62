//! ## DataFrame helpers
//!
//! Small utilities shared by the transformers, the estimator and the data manager: creating a
//! session, checking columns, and pulling single columns out of a DataFrame as plain Rust
//! vectors.
//!
//! Sessions are created with a single target partition. Pipeline stages materialize data more
//! than once (fit-time statistics, category checks, the final feature matrix) and every one of
//! those reads must see the rows in the same order as the original batch.

use crate::exceptions::{BikeRentalError, BikeRentalResult};
use datafusion::arrow::array::{as_primitive_array, Array, StringArray};
use datafusion::arrow::compute::concat_batches;
use datafusion::arrow::datatypes::{DataType, Float64Type};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::prelude::*;
use datafusion_expr::{cast, ident};

/// Creates a DataFusion session that keeps row order stable.
pub fn session_context() -> SessionContext {
    SessionContext::new_with_config(SessionConfig::new().with_target_partitions(1))
}

/// Validates that every column in `target_cols` exists in the DataFrame.
/// Returns an error if any target column is missing.
pub fn validate_columns(df: &DataFrame, target_cols: &[String]) -> BikeRentalResult<()> {
    let schema = df.schema();
    for col_name in target_cols {
        if schema.field_with_name(None, col_name).is_err() {
            return Err(BikeRentalError::MissingColumn(format!(
                "Column '{}' not found in DataFrame",
                col_name
            )));
        }
    }
    Ok(())
}

/// Returns true if the DataFrame has a column with the given (unqualified) name.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.schema().field_with_name(None, name).is_ok()
}

/// Column names in schema order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect()
}

/// Materializes the DataFrame into a single record batch.
pub async fn collect_batch(df: &DataFrame) -> BikeRentalResult<RecordBatch> {
    let schema = df.schema().inner().clone();
    let batches = df.clone().collect().await?;
    Ok(concat_batches(&schema, &batches)?)
}

/// Collects one column as `f64` values (casting if needed); nulls become `None`.
pub async fn collect_f64_column(df: &DataFrame, name: &str) -> BikeRentalResult<Vec<Option<f64>>> {
    validate_columns(df, &[name.to_string()])?;
    let batches = df
        .clone()
        .select(vec![cast(ident(name), DataType::Float64).alias(name)])?
        .collect()
        .await?;
    let mut values = Vec::new();
    for batch in &batches {
        let array = as_primitive_array::<Float64Type>(batch.column(0));
        values.extend(array.iter());
    }
    Ok(values)
}

/// Collects one column as strings (casting if needed); nulls become `None`.
pub async fn collect_string_column(
    df: &DataFrame,
    name: &str,
) -> BikeRentalResult<Vec<Option<String>>> {
    validate_columns(df, &[name.to_string()])?;
    let batches = df
        .clone()
        .select(vec![cast(ident(name), DataType::Utf8).alias(name)])?
        .collect()
        .await?;
    let mut values = Vec::new();
    for batch in &batches {
        let array = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| {
                BikeRentalError::InvalidParameter(format!(
                    "Expected Utf8 array for column {}",
                    name
                ))
            })?;
        for i in 0..array.len() {
            if array.is_null(i) {
                values.push(None);
            } else {
                values.push(Some(array.value(i).to_string()));
            }
        }
    }
    Ok(values)
}

/// Builds a row-major feature matrix from the given columns, in the given order.
///
/// Every value must be present; a null anywhere is reported as an invalid parameter because the
/// estimator has no way to route it.
pub async fn to_feature_matrix(df: &DataFrame, names: &[String]) -> BikeRentalResult<Vec<Vec<f64>>> {
    validate_columns(df, names)?;
    let exprs: Vec<Expr> = names
        .iter()
        .map(|name| cast(ident(name), DataType::Float64).alias(name))
        .collect();
    let batches = df.clone().select(exprs)?.collect().await?;

    let mut rows = Vec::new();
    for batch in &batches {
        let columns: Vec<_> = (0..batch.num_columns())
            .map(|j| as_primitive_array::<Float64Type>(batch.column(j)))
            .collect();
        for i in 0..batch.num_rows() {
            let mut row = Vec::with_capacity(columns.len());
            for (j, array) in columns.iter().enumerate() {
                if array.is_null(i) {
                    return Err(BikeRentalError::InvalidParameter(format!(
                        "Missing value in feature column '{}' at row {}",
                        names[j],
                        rows.len()
                    )));
                }
                row.push(array.value(i));
            }
            rows.push(row);
        }
    }
    Ok(rows)
}

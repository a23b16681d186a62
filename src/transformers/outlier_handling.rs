//! ## Transformers for handling outliers
//!
//! This module provides the [`OutlierHandler`], which learns lower and upper bounds for a set of
//! numeric columns and caps values that fall outside them.
//!
//! Two methods are supported for computing the bounds:
//!
//! - **iqr:** `Q1 - factor * IQR` and `Q3 + factor * IQR`, where Q1 and Q3 are the 25th and 75th
//!   percentiles (linear interpolation between order statistics) and `IQR = Q3 - Q1`.
//! - **zscore:** `mean - factor * std` and `mean + factor * std`, using the sample standard deviation.
//!   With a single non-missing value the standard deviation is undefined and the column is left
//!   uncapped.
//!
//! NaN values are ignored when fitting and pass through the transform unchanged, the same way
//! nulls do.
//!
//! Capping outliers is a common technique to prevent extreme values from skewing the distribution of a dataset.
//! Values are capped rather than removed, so the row count never changes.
//! Errors are returned as `BikeRentalError` and results are wrapped in `BikeRentalResult`.

use crate::exceptions::{BikeRentalError, BikeRentalResult};
use crate::frame::{collect_f64_column, validate_columns};
use crate::impl_transformer;
use datafusion::arrow::datatypes::DataType;
use datafusion::functions::math::expr_fn::isnan;
use datafusion::functions_aggregate::expr_fn::{avg, stddev};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use datafusion_expr::{cast, ident, lit, not, Case as DFCase, Expr};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, warn};

/// How the bounds are derived from the fit batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutlierMethod {
    Iqr,
    ZScore,
}

impl FromStr for OutlierMethod {
    type Err = BikeRentalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iqr" => Ok(OutlierMethod::Iqr),
            "zscore" => Ok(OutlierMethod::ZScore),
            other => Err(BikeRentalError::InvalidConfiguration(format!(
                "Outlier method must be 'iqr' or 'zscore', got '{}'",
                other
            ))),
        }
    }
}

/// Helper function to build a CASE expression for capping values:
/// `CASE WHEN isnan(col) THEN col WHEN col < lower THEN lower WHEN col > upper THEN upper ELSE col END`
fn cap_expr_for(col_name: &str, lower: f64, upper: f64) -> Expr {
    let base = cast(ident(col_name), DataType::Float64);
    Expr::Case(DFCase {
        expr: None,
        when_then_expr: vec![
            (Box::new(isnan(base.clone())), Box::new(base.clone())),
            (Box::new(base.clone().lt(lit(lower))), Box::new(lit(lower))),
            (Box::new(base.clone().gt(lit(upper))), Box::new(lit(upper))),
        ],
        else_expr: Some(Box::new(base)),
    })
}

/// Percentile of already sorted values, interpolating linearly between the closest ranks.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

async fn iqr_bounds(
    df: &DataFrame,
    col_name: &str,
    factor: f64,
) -> BikeRentalResult<Option<(f64, f64)>> {
    let mut values: Vec<f64> = collect_f64_column(df, col_name)
        .await?
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .collect();
    values.sort_by(|a, b| a.total_cmp(b));
    match (percentile(&values, 0.25), percentile(&values, 0.75)) {
        (Some(q1), Some(q3)) => {
            let iqr = q3 - q1;
            Ok(Some((q1 - factor * iqr, q3 + factor * iqr)))
        }
        _ => Err(BikeRentalError::InvalidParameter(format!(
            "Cannot compute bounds for column '{}': no non-missing values",
            col_name
        ))),
    }
}

/// `None` when the column holds a single non-missing value.
async fn zscore_bounds(
    df: &DataFrame,
    col_name: &str,
    factor: f64,
) -> BikeRentalResult<Option<(f64, f64)>> {
    let value = cast(ident(col_name), DataType::Float64);
    let batches = df
        .clone()
        .filter(not(isnan(value.clone())))?
        .aggregate(
            vec![],
            vec![
                avg(value.clone()).alias("mean"),
                stddev(value).alias("std"),
            ],
        )?
        .collect()
        .await?;
    let batch = batches.first().filter(|b| b.num_rows() > 0).ok_or_else(|| {
        BikeRentalError::InvalidParameter(format!(
            "No data found when computing statistics for column {}",
            col_name
        ))
    })?;
    let mean = ScalarValue::try_from_array(batch.column(0), 0)?;
    let std = ScalarValue::try_from_array(batch.column(1), 0)?;
    match (mean, std) {
        (ScalarValue::Float64(Some(mean)), ScalarValue::Float64(Some(std))) => {
            Ok(Some((mean - factor * std, mean + factor * std)))
        }
        (ScalarValue::Float64(Some(_)), ScalarValue::Float64(None)) => Ok(None),
        _ => Err(BikeRentalError::InvalidParameter(format!(
            "Cannot compute bounds for column '{}': no non-missing values",
            col_name
        ))),
    }
}

/// Caps values of numeric columns to bounds learned from the fit batch.
///
/// Bounds are computed once and reused for every later batch, so a held-out batch is judged
/// against the distribution of the fit batch and not its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierHandler {
    pub columns: Vec<String>,
    /// `"iqr"` or `"zscore"`; anything else fails at fit time.
    pub method: String,
    pub factor: f64,
    /// Learned bounds; a target column without an entry is left uncapped.
    pub bounds: HashMap<String, (f64, f64)>,
    fitted: bool,
}

impl OutlierHandler {
    pub fn new(columns: Vec<String>, method: impl Into<String>, factor: f64) -> Self {
        Self {
            columns,
            method: method.into(),
            factor,
            bounds: HashMap::new(),
            fitted: false,
        }
    }

    /// IQR capping with the conventional factor of 1.5.
    pub fn iqr(columns: Vec<String>) -> Self {
        Self::new(columns, "iqr", 1.5)
    }

    /// Fit the handler by computing bounds for each target column.
    pub async fn fit(&mut self, df: &DataFrame) -> BikeRentalResult<()> {
        let method = OutlierMethod::from_str(&self.method)?;
        if !self.factor.is_finite() || self.factor < 0.0 {
            return Err(BikeRentalError::InvalidParameter(format!(
                "Outlier factor {} must be a finite, non-negative number",
                self.factor
            )));
        }
        validate_columns(df, &self.columns)?;

        let mut bounds = HashMap::with_capacity(self.columns.len());
        for col_name in &self.columns {
            let learned = match method {
                OutlierMethod::Iqr => iqr_bounds(df, col_name, self.factor).await?,
                OutlierMethod::ZScore => zscore_bounds(df, col_name, self.factor).await?,
            };
            let Some((lower, upper)) = learned else {
                warn!(
                    "OutlierHandler: '{}' has a single value, leaving it uncapped",
                    col_name
                );
                continue;
            };
            debug!(
                "OutlierHandler bounds for '{}': [{}, {}]",
                col_name, lower, upper
            );
            bounds.insert(col_name.clone(), (lower, upper));
        }
        self.bounds = bounds;
        self.fitted = true;
        Ok(())
    }

    /// Returns a new DataFrame where each target column is capped using the learned bounds.
    pub async fn transform(&self, df: DataFrame) -> BikeRentalResult<DataFrame> {
        if !self.fitted {
            return Err(BikeRentalError::FitNotCalled);
        }
        validate_columns(&df, &self.columns)?;
        let exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let name = field.name();
                match self.bounds.get(name.as_str()) {
                    Some(&(lower, upper)) => cap_expr_for(name, lower, upper).alias(name),
                    None => ident(name),
                }
            })
            .collect();
        df.select(exprs).map_err(BikeRentalError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(OutlierHandler);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 0.25), Some(1.75));
        assert_eq!(percentile(&values, 0.75), Some(3.25));
        assert_eq!(percentile(&values, 1.0), Some(4.0));
        assert_eq!(percentile(&[], 0.5), None);
        assert_eq!(percentile(&values, 1.5), None);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!(OutlierMethod::from_str("iqr").unwrap(), OutlierMethod::Iqr);
        assert_eq!(
            OutlierMethod::from_str("zscore").unwrap(),
            OutlierMethod::ZScore
        );
        assert!(matches!(
            OutlierMethod::from_str("mad"),
            Err(BikeRentalError::InvalidConfiguration(_))
        ));
    }
}

//! ## Scaling Transformers
//!
//! - [`StandardScaler`]: Standardizes numeric columns to zero mean and unit variance.
//!
//! The mean and the population standard deviation of each column are learned at fit time and
//! reused for every later batch. A constant column gets a scale of 1 so it maps to zeros
//! instead of dividing by zero.

use crate::exceptions::{BikeRentalError, BikeRentalResult};
use crate::frame::validate_columns;
use crate::impl_transformer;
use datafusion::arrow::datatypes::DataType;
use datafusion::functions_aggregate::expr_fn::{avg, stddev_pop};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use datafusion_expr::{cast, ident, lit, Expr};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Learned statistics of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub mean: f64,
    pub scale: f64,
}

/// Standardizes every column of the fit batch: `(x - mean) / scale`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Column name and learned statistics, in fit-time column order.
    pub params: Vec<(String, ColumnScale)>,
    fitted: bool,
}

fn read_f64(value: ScalarValue, what: &str, col_name: &str) -> BikeRentalResult<f64> {
    match value {
        ScalarValue::Float64(Some(v)) if v.is_finite() => Ok(v),
        _ => Err(BikeRentalError::InvalidParameter(format!(
            "Failed to compute {} for column {}",
            what, col_name
        ))),
    }
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fit(&mut self, df: &DataFrame) -> BikeRentalResult<()> {
        let fields = df.schema().fields().clone();
        for field in fields.iter() {
            if !field.data_type().is_numeric() {
                return Err(BikeRentalError::InvalidParameter(format!(
                    "StandardScaler expects numeric columns, but '{}' is {:?}",
                    field.name(),
                    field.data_type()
                )));
            }
        }

        let mut aggregates = Vec::with_capacity(fields.len() * 2);
        for (i, field) in fields.iter().enumerate() {
            let value = cast(ident(field.name()), DataType::Float64);
            aggregates.push(avg(value.clone()).alias(format!("mean_{}", i)));
            aggregates.push(stddev_pop(value).alias(format!("std_{}", i)));
        }
        let batches = df.clone().aggregate(vec![], aggregates)?.collect().await?;
        let batch = batches.first().filter(|b| b.num_rows() > 0).ok_or_else(|| {
            BikeRentalError::InvalidParameter("Cannot fit StandardScaler on an empty DataFrame".into())
        })?;

        let mut params = Vec::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            let name = field.name();
            let mean = read_f64(
                ScalarValue::try_from_array(batch.column(2 * i), 0)?,
                "mean",
                name,
            )?;
            let std = read_f64(
                ScalarValue::try_from_array(batch.column(2 * i + 1), 0)?,
                "standard deviation",
                name,
            )?;
            let scale = if std > f64::EPSILON { std } else { 1.0 };
            debug!("StandardScaler '{}': mean={}, scale={}", name, mean, scale);
            params.push((name.to_string(), ColumnScale { mean, scale }));
        }
        self.params = params;
        self.fitted = true;
        Ok(())
    }

    pub async fn transform(&self, df: DataFrame) -> BikeRentalResult<DataFrame> {
        if !self.fitted {
            return Err(BikeRentalError::FitNotCalled);
        }
        let names: Vec<String> = self.params.iter().map(|(n, _)| n.clone()).collect();
        validate_columns(&df, &names)?;
        let exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let name = field.name();
                match self.params.iter().find(|(n, _)| n == name) {
                    Some((_, p)) => ((cast(ident(name), DataType::Float64) - lit(p.mean))
                        / lit(p.scale))
                    .alias(name),
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

impl_transformer!(StandardScaler);

//! ## Transformers for imputing missing values
//!
//! This module provides the two imputers used by the bike rental pipeline.
//!
//! - **WeekdayImputer**: Fills missing weekday abbreviations by deriving the day name from the
//!   record's date column.
//! - **WeathersitImputer**: Fills missing weather situations with the most frequent category seen
//!   at fit time (or `"Mist"` if the fit batch has none).
//!
//! Each transformer returns a new DataFrame with the imputation applied to its target column.
//! Errors are returned as `BikeRentalError` and results are wrapped in `BikeRentalResult`.

use crate::exceptions::{BikeRentalError, BikeRentalResult};
use crate::frame::validate_columns;
use crate::impl_transformer;
use crate::transformers::datetime_features::day_abbreviation_expr;
use datafusion::arrow::datatypes::DataType;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use datafusion_expr::{cast, ident, lit, not, Case as DFCase, Expr};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Constructs an expression equivalent to SQL COALESCE(CAST(col AS Utf8), fallback).
/// This is implemented as a CASE expression: if `col` is not null then return it, otherwise return `fallback`.
fn coalesce_text_expr(name: &str, fallback: Expr) -> Expr {
    let text = cast(ident(name), DataType::Utf8);
    Expr::Case(DFCase {
        expr: None,
        when_then_expr: vec![(Box::new(not(text.clone().is_null())), Box::new(text))],
        else_expr: Some(Box::new(fallback)),
    })
}

/// Replaces the target column with its imputed version, keeping every other column and the
/// column order.
pub(crate) fn apply_imputation(
    df: DataFrame,
    target: &str,
    fallback: Expr,
) -> BikeRentalResult<DataFrame> {
    let exprs: Vec<Expr> = df
        .schema()
        .fields()
        .iter()
        .map(|field| {
            let name = field.name();
            if name == target {
                coalesce_text_expr(name, fallback.clone()).alias(name)
            } else {
                ident(name)
            }
        })
        .collect();
    df.select(exprs).map_err(BikeRentalError::from)
}

/// Fills missing weekday values with the abbreviated day name of the record's date.
///
/// Records whose date is missing or unparseable keep a missing weekday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekdayImputer {
    pub variable: String,
    pub date_column: String,
}

impl WeekdayImputer {
    /// Create a new weekday imputer reading dates from `dteday`.
    pub fn new(variable: impl Into<String>) -> Self {
        Self::with_date_column(variable, "dteday")
    }

    /// Create a new weekday imputer reading dates from `date_column`.
    pub fn with_date_column(variable: impl Into<String>, date_column: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            date_column: date_column.into(),
        }
    }

    fn targets(&self) -> [String; 2] {
        [self.variable.clone(), self.date_column.clone()]
    }

    /// Nothing is learned; fit only checks that both columns are present.
    pub async fn fit(&mut self, df: &DataFrame) -> BikeRentalResult<()> {
        validate_columns(df, &self.targets())
    }

    pub async fn transform(&self, df: DataFrame) -> BikeRentalResult<DataFrame> {
        validate_columns(&df, &self.targets())?;
        apply_imputation(df, &self.variable, day_abbreviation_expr(&self.date_column))
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

/// Fills missing weather situations with the mode of the fit batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeathersitImputer {
    pub variable: String,
    /// Used when the fit batch has no non-missing value to take the mode of.
    pub default: String,
    pub fill_value: Option<String>,
    fitted: bool,
}

impl WeathersitImputer {
    pub fn new(variable: impl Into<String>) -> Self {
        Self::with_default(variable, "Mist")
    }

    pub fn with_default(variable: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            default: default.into(),
            fill_value: None,
            fitted: false,
        }
    }

    /// Computes the mode via grouping and counting. Ties go to the smallest category.
    pub async fn fit(&mut self, df: &DataFrame) -> BikeRentalResult<()> {
        validate_columns(df, &[self.variable.clone()])?;
        let name = self.variable.as_str();
        let grouped = df
            .clone()
            .select(vec![cast(ident(name), DataType::Utf8).alias(name)])?
            .aggregate(vec![ident(name)], vec![count(ident(name)).alias("cnt")])?
            .filter(ident(name).is_not_null())?
            .sort(vec![ident("cnt").sort(false, false), ident(name).sort(true, false)])?
            .limit(0, Some(1))?;
        let batches = grouped.collect().await?;

        let mut mode = None;
        if let Some(batch) = batches.iter().find(|b| b.num_rows() > 0) {
            let scalar = ScalarValue::try_from_array(batch.column(0), 0)?;
            if let ScalarValue::Utf8(Some(value)) = scalar {
                mode = Some(value);
            }
        }

        let fill_value = match mode {
            Some(value) => value,
            None => {
                warn!(
                    "No values in column '{}' to take the mode of; using '{}'",
                    name, self.default
                );
                self.default.clone()
            }
        };
        debug!("WeathersitImputer fill value for '{}': {}", name, fill_value);
        self.fill_value = Some(fill_value);
        self.fitted = true;
        Ok(())
    }

    /// Returns a new DataFrame where missing values are replaced with the fit-time mode.
    pub async fn transform(&self, df: DataFrame) -> BikeRentalResult<DataFrame> {
        let fill_value = match (&self.fill_value, self.fitted) {
            (Some(value), true) => value.clone(),
            _ => return Err(BikeRentalError::FitNotCalled),
        };
        validate_columns(&df, &[self.variable.clone()])?;
        apply_imputation(df, &self.variable, lit(fill_value))
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(WeekdayImputer);
impl_transformer!(WeathersitImputer);

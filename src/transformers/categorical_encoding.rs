//! # Categorical Encoding Transformers
//!
//! This module provides the two categorical encoders used by the bike rental pipeline.
//!
//! The encoders include:
//! - **Mapper:** Replaces each category with an ordinal integer taken from a static lookup table.
//! - **WeekdayOneHotEncoder:** Expands the weekday column into one binary column per category
//!   learned at fit time.
//!
//! Each encoder exposes a similar API with a constructor, an asynchronous `fit` method
//! and an asynchronous `transform` method that returns a new DataFrame.
//! Errors from underlying DataFusion operations are wrapped in a custom error type.

use crate::exceptions::{BikeRentalError, BikeRentalResult};
use crate::frame::validate_columns;
use crate::impl_transformer;
use datafusion::arrow::array::{Array, StringArray};
use datafusion::arrow::datatypes::DataType;
use datafusion::prelude::*;
use datafusion_expr::{cast, ident, lit, Case as DFCase, Expr};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Placeholder used in error messages for a missing categorical value.
const MISSING_LABEL: &str = "<missing>";

fn text(col_name: &str) -> Expr {
    cast(ident(col_name), DataType::Utf8)
}

/// Extract the distinct values (nulls included, as `None`) of a column.
async fn extract_distinct_values(
    df: &DataFrame,
    col_name: &str,
) -> BikeRentalResult<Vec<Option<String>>> {
    let distinct_df = df
        .clone()
        .select(vec![text(col_name).alias(col_name)])?
        .distinct()?;
    let batches = distinct_df.collect().await?;
    let mut values = Vec::new();
    for batch in batches {
        let array = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| {
                BikeRentalError::InvalidParameter(format!(
                    "Expected Utf8 array for column {}",
                    col_name
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

/// Helper to build a CASE WHEN expression given a mapping from category strings to values.
/// For each pair, the expression generated is:
/// `WHEN CAST(<col> AS Utf8) = lit(<category>) THEN lit(<encoded_value>)`
fn build_case_expr(col_name: &str, mapping: &[(&String, &i64)]) -> Expr {
    let when_then_expr = mapping
        .iter()
        .map(|(cat, val)| {
            (
                Box::new(text(col_name).eq(lit(cat.as_str()))),
                Box::new(lit(**val)),
            )
        })
        .collect();
    Expr::Case(DFCase {
        expr: None,
        when_then_expr,
        else_expr: None,
    })
}

/// ------------------------- Mapper -------------------------
///
/// Mapper replaces every value of one column with the integer it maps to and makes the column
/// `Int64`. The mapping is supplied at construction and never learned.
///
/// A value without an entry in the mapping (a missing value included) fails the transform with
/// [`BikeRentalError::UnmappedCategory`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mapper {
    pub variable: String,
    pub mappings: HashMap<String, i64>,
}

impl Mapper {
    pub fn new(variable: impl Into<String>, mappings: HashMap<String, i64>) -> Self {
        Self {
            variable: variable.into(),
            mappings,
        }
    }

    /// This transformer is stateless, so fit only checks the column exists.
    pub async fn fit(&mut self, df: &DataFrame) -> BikeRentalResult<()> {
        validate_columns(df, &[self.variable.clone()])
    }

    /// Checks every value observed in the column against the mapping, then replaces the column.
    pub async fn transform(&self, df: DataFrame) -> BikeRentalResult<DataFrame> {
        validate_columns(&df, &[self.variable.clone()])?;

        let mut unmapped: Vec<String> = extract_distinct_values(&df, &self.variable)
            .await?
            .into_iter()
            .filter_map(|value| match value {
                Some(v) if self.mappings.contains_key(&v) => None,
                Some(v) => Some(v),
                None => Some(MISSING_LABEL.to_string()),
            })
            .collect();
        if !unmapped.is_empty() {
            unmapped.sort();
            return Err(BikeRentalError::UnmappedCategory {
                column: self.variable.clone(),
                value: unmapped.join(", "),
            });
        }

        let mut entries: Vec<(&String, &i64)> = self.mappings.iter().collect();
        entries.sort();
        let exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let name = field.name();
                if *name == self.variable {
                    cast(build_case_expr(name, &entries), DataType::Int64).alias(name)
                } else {
                    ident(name)
                }
            })
            .collect();
        df.select(exprs).map_err(BikeRentalError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

/// ------------------------- WeekdayOneHotEncoder -------------------------
///
/// Replaces the weekday column with one `Int64` indicator column per category learned at fit
/// time. New column names are the original column name, an underscore, and the category value
/// (`weekday_Mon`). Indicator columns are appended after the remaining columns in sorted
/// category order; with `drop_first` the first category gets no column.
///
/// Because the column set comes from the fit batch, every transformed batch has the same
/// columns. A category unseen at fit (or a missing value) yields zeros in every indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekdayOneHotEncoder {
    pub variable: String,
    pub drop_first: bool,
    /// Sorted distinct non-missing categories seen at fit time.
    pub categories: Option<Vec<String>>,
}

impl WeekdayOneHotEncoder {
    pub fn new(variable: impl Into<String>, drop_first: bool) -> Self {
        Self {
            variable: variable.into(),
            drop_first,
            categories: None,
        }
    }

    /// Learn the distinct category values of the column.
    pub async fn fit(&mut self, df: &DataFrame) -> BikeRentalResult<()> {
        validate_columns(df, &[self.variable.clone()])?;
        let categories: BTreeSet<String> = extract_distinct_values(df, &self.variable)
            .await?
            .into_iter()
            .flatten()
            .collect();
        let categories: Vec<String> = categories.into_iter().collect();
        debug!(
            "WeekdayOneHotEncoder categories for '{}': {:?}",
            self.variable, categories
        );
        self.categories = Some(categories);
        Ok(())
    }

    /// Names of the indicator columns this encoder produces.
    pub fn output_columns(&self) -> BikeRentalResult<Vec<String>> {
        let categories = self
            .categories
            .as_ref()
            .ok_or(BikeRentalError::FitNotCalled)?;
        let skip = usize::from(self.drop_first);
        Ok(categories
            .iter()
            .skip(skip)
            .map(|cat| format!("{}_{}", self.variable, cat))
            .collect())
    }

    pub async fn transform(&self, df: DataFrame) -> BikeRentalResult<DataFrame> {
        let categories = self
            .categories
            .as_ref()
            .ok_or(BikeRentalError::FitNotCalled)?;
        validate_columns(&df, &[self.variable.clone()])?;

        let mut exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .filter(|field| *field.name() != self.variable)
            .map(|field| ident(field.name()))
            .collect();
        let skip = usize::from(self.drop_first);
        for cat in categories.iter().skip(skip) {
            let indicator = Expr::Case(DFCase {
                expr: None,
                when_then_expr: vec![(
                    Box::new(text(&self.variable).eq(lit(cat.clone()))),
                    Box::new(lit(1_i64)),
                )],
                else_expr: Some(Box::new(lit(0_i64))),
            })
            .alias(format!("{}_{}", self.variable, cat));
            exprs.push(indicator);
        }
        df.select(exprs).map_err(BikeRentalError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(Mapper);
impl_transformer!(WeekdayOneHotEncoder);

//! ## Calendar features derived from date strings
//!
//! Dates arrive as text (`"2012-11-05"`, sometimes followed by a time part). This module parses
//! them with `chrono` and exposes scalar UDFs that turn a date column into calendar labels:
//!
//! - `day_abbreviation`: the first three letters of the English day name (`"Mon"`).
//! - `year_label`: the four-digit year (`"2012"`).
//! - `month_name`: the English month name (`"November"`).
//!
//! Unparseable or missing dates produce null rather than an error, so callers decide how a
//! missing calendar value is handled.

use chrono::NaiveDate;
use datafusion::arrow::array::{Array, StringArray};
use datafusion::arrow::datatypes::DataType;
use datafusion::error::DataFusionError;
use datafusion_expr::{
    cast, create_udf, ident, ColumnarValue, Expr, ScalarFunctionImplementation, ScalarUDF,
    Volatility,
};
use std::sync::Arc;

/// Parses an ISO-like date (`YYYY-MM-DD`, optionally followed by `T` or a space and a time).
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date_part = value.get(..10)?;
    match value.as_bytes().get(10) {
        None | Some(b'T') | Some(b' ') => NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok(),
        Some(_) => None,
    }
}

/// Three-letter English day name, e.g. `"Mon"`.
pub fn day_abbreviation(date: NaiveDate) -> String {
    date.format("%a").to_string()
}

pub fn year_label(date: NaiveDate) -> String {
    date.format("%Y").to_string()
}

pub fn month_name(date: NaiveDate) -> String {
    date.format("%B").to_string()
}

fn date_label_udf(name: &'static str, label: fn(NaiveDate) -> String) -> ScalarUDF {
    let fun: ScalarFunctionImplementation = Arc::new(
        move |args: &[ColumnarValue]| -> Result<ColumnarValue, DataFusionError> {
            let arrays = ColumnarValue::values_to_arrays(args)?;
            let input = arrays
                .first()
                .and_then(|a| a.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| {
                    DataFusionError::Execution(format!("{} expects a single Utf8 argument", name))
                })?;
            let labels: StringArray = (0..input.len())
                .map(|i| {
                    if input.is_null(i) {
                        None
                    } else {
                        parse_date(input.value(i)).map(label)
                    }
                })
                .collect();
            Ok(ColumnarValue::Array(Arc::new(labels)))
        },
    );
    create_udf(
        name,
        vec![DataType::Utf8],
        DataType::Utf8,
        Volatility::Immutable,
        fun,
    )
}

/// Builds `day_abbreviation(CAST(<date_col> AS Utf8))`.
pub fn day_abbreviation_expr(date_col: &str) -> Expr {
    date_label_udf("day_abbreviation", day_abbreviation)
        .call(vec![cast(ident(date_col), DataType::Utf8)])
}

/// Builds `year_label(CAST(<date_col> AS Utf8))`.
pub fn year_label_expr(date_col: &str) -> Expr {
    date_label_udf("year_label", year_label).call(vec![cast(ident(date_col), DataType::Utf8)])
}

/// Builds `month_name(CAST(<date_col> AS Utf8))`.
pub fn month_name_expr(date_col: &str) -> Expr {
    date_label_udf("month_name", month_name).call(vec![cast(ident(date_col), DataType::Utf8)])
}

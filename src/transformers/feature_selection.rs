//! ## Feature Selection Transformers
//!
//! - [`NumericColumnSelector`]: Keeps only the columns that were numeric in the fit batch.
//!
//! Numeric means any Arrow integer, floating point or decimal type. Text columns left over from
//! earlier stages (the raw date, for instance) are discarded.

use crate::exceptions::{BikeRentalError, BikeRentalResult};
use crate::impl_transformer;
use datafusion::dataframe::DataFrame;
use datafusion_expr::{ident, Expr};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Projects every batch onto the numeric columns recorded at fit time, in fit-time order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NumericColumnSelector {
    pub numeric_columns: Vec<String>,
    fitted: bool,
}

impl NumericColumnSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fit(&mut self, df: &DataFrame) -> BikeRentalResult<()> {
        self.numeric_columns = df
            .schema()
            .fields()
            .iter()
            .filter(|field| field.data_type().is_numeric())
            .map(|field| field.name().to_string())
            .collect();
        if self.numeric_columns.is_empty() {
            return Err(BikeRentalError::InvalidParameter(
                "The DataFrame has no numeric columns to select.".to_string(),
            ));
        }
        debug!("NumericColumnSelector columns: {:?}", self.numeric_columns);
        self.fitted = true;
        Ok(())
    }

    pub async fn transform(&self, df: DataFrame) -> BikeRentalResult<DataFrame> {
        if !self.fitted {
            return Err(BikeRentalError::FitNotCalled);
        }
        let schema = df.schema();
        let mut exprs: Vec<Expr> = Vec::with_capacity(self.numeric_columns.len());
        for name in &self.numeric_columns {
            if schema.field_with_name(None, name).is_err() {
                return Err(BikeRentalError::MissingColumn(format!(
                    "Numeric column '{}' seen at fit time is missing",
                    name
                )));
            }
            exprs.push(ident(name));
        }
        df.select(exprs).map_err(BikeRentalError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(NumericColumnSelector);

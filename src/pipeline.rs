//! ## Feature Pipeline
//!
//! This module provides the core abstractions for fitting and applying a chain of transformers.
//!
//! ### Overview
//!
//! - The [`Transformer`] trait defines the common interface of every data transformation step,
//!   for both stateful (requiring fitting) and stateless transformations.
//! - [`Stage`] is a tagged union over the concrete transformers of this crate. The chain is a
//!   fixed list of stages, which keeps a fitted pipeline serializable.
//! - The [`Pipeline`] struct chains named stages: `fit` fits and transforms each stage in turn,
//!   `transform` only transforms.
//! - Macros [`crate::impl_transformer`] and [`crate::make_pipeline`] simplify the implementation
//!   of transformers and the creation of pipelines.

use crate::exceptions::{BikeRentalError, BikeRentalResult};
use crate::transformers::categorical_encoding::{Mapper, WeekdayOneHotEncoder};
use crate::transformers::feature_selection::NumericColumnSelector;
use crate::transformers::imputation::{WeathersitImputer, WeekdayImputer};
use crate::transformers::outlier_handling::OutlierHandler;
use crate::transformers::scaling_and_normalization::StandardScaler;
use async_trait::async_trait;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Trait for components used in the data transformation pipeline.
///
/// Every transformer must provide a `fit` method (which may collect data to compute parameters)
/// and a `transform` method that returns a new DataFrame. `transform` may execute the plan it
/// receives (to check categories against a lookup table, for instance), but never changes the
/// transformer's learned state.
#[async_trait]
pub trait Transformer {
    /// Fit the transformer given a DataFrame.
    ///
    /// # Arguments
    ///
    /// * `df` - The input DataFrame.
    ///
    /// # Returns
    ///
    /// * `BikeRentalResult<()>` - Returns Ok if successful, or an error otherwise.
    async fn fit(&mut self, df: &DataFrame) -> BikeRentalResult<()>;

    /// Transform the input DataFrame, returning a new DataFrame with the transformation applied.
    ///
    /// # Arguments
    ///
    /// * `df` - The input DataFrame.
    ///
    /// # Returns
    ///
    /// * `BikeRentalResult<DataFrame>` - The transformed DataFrame or an error if transformation fails.
    async fn transform(&self, df: DataFrame) -> BikeRentalResult<DataFrame>;

    /// Returns true if the transformer is stateful (i.e. requires a call to fit before transform can be called).
    fn is_stateful(&self) -> bool;
}

/// Macro to implement the [`Transformer`] trait for the crate's transformers.
///
/// The type must already have inherent methods:
/// - `async fn fit(&mut self, &DataFrame) -> BikeRentalResult<()>`
/// - `async fn transform(&self, DataFrame) -> BikeRentalResult<DataFrame>`
/// - **`fn inherent_is_stateful(&self) -> bool`**
///
/// # Example
///
/// ```rust,no_run
/// use bikerental_model::exceptions::BikeRentalResult;
/// use datafusion::prelude::DataFrame;
/// use bikerental_model::impl_transformer;
///
/// pub struct MyTransformer;
///
/// impl MyTransformer {
///     pub async fn fit(&mut self, _df: &DataFrame) -> BikeRentalResult<()> {
///         Ok(())
///     }
///
///     pub async fn transform(&self, df: DataFrame) -> BikeRentalResult<DataFrame> {
///         Ok(df)
///     }
///
///     // Note the different name for the inherent method.
///     pub fn inherent_is_stateful(&self) -> bool {
///         false
///     }
/// }
///
/// impl_transformer!(MyTransformer);
/// ```
#[macro_export]
macro_rules! impl_transformer {
    ($ty:ty) => {
        #[async_trait::async_trait]
        impl $crate::pipeline::Transformer for $ty {
            async fn fit(
                &mut self,
                df: &datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::BikeRentalResult<()> {
                <$ty>::fit(self, df).await
            }
            async fn transform(
                &self,
                df: datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::BikeRentalResult<datafusion::prelude::DataFrame> {
                <$ty>::transform(self, df).await
            }
            fn is_stateful(&self) -> bool {
                <$ty>::inherent_is_stateful(self)
            }
        }
    };
}

/// One step of the feature pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params")]
pub enum Stage {
    WeekdayImputer(WeekdayImputer),
    WeathersitImputer(WeathersitImputer),
    Mapper(Mapper),
    OutlierHandler(OutlierHandler),
    WeekdayOneHotEncoder(WeekdayOneHotEncoder),
    NumericColumnSelector(NumericColumnSelector),
    StandardScaler(StandardScaler),
}

impl Stage {
    fn as_transformer(&self) -> &(dyn Transformer + Send + Sync) {
        match self {
            Stage::WeekdayImputer(t) => t,
            Stage::WeathersitImputer(t) => t,
            Stage::Mapper(t) => t,
            Stage::OutlierHandler(t) => t,
            Stage::WeekdayOneHotEncoder(t) => t,
            Stage::NumericColumnSelector(t) => t,
            Stage::StandardScaler(t) => t,
        }
    }

    fn as_transformer_mut(&mut self) -> &mut (dyn Transformer + Send + Sync) {
        match self {
            Stage::WeekdayImputer(t) => t,
            Stage::WeathersitImputer(t) => t,
            Stage::Mapper(t) => t,
            Stage::OutlierHandler(t) => t,
            Stage::WeekdayOneHotEncoder(t) => t,
            Stage::NumericColumnSelector(t) => t,
            Stage::StandardScaler(t) => t,
        }
    }
}

macro_rules! stage_from {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for Stage {
                fn from(t: $variant) -> Self {
                    Stage::$variant(t)
                }
            }
        )+
    };
}

stage_from!(
    WeekdayImputer,
    WeathersitImputer,
    Mapper,
    OutlierHandler,
    WeekdayOneHotEncoder,
    NumericColumnSelector,
    StandardScaler,
);

#[async_trait]
impl Transformer for Stage {
    async fn fit(&mut self, df: &DataFrame) -> BikeRentalResult<()> {
        self.as_transformer_mut().fit(df).await
    }

    async fn transform(&self, df: DataFrame) -> BikeRentalResult<DataFrame> {
        self.as_transformer().transform(df).await
    }

    fn is_stateful(&self) -> bool {
        self.as_transformer().is_stateful()
    }
}

/// A pipeline that chains a sequence of named stages.
///
/// Each stage's output is passed as input to the next stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    steps: Vec<(String, Stage)>,
    verbose: bool,
    fitted: bool,
}

impl Pipeline {
    /// Creates a new pipeline from a list of named stages.
    pub fn new(steps: Vec<(String, Stage)>, verbose: bool) -> Self {
        Self {
            steps,
            verbose,
            fitted: false,
        }
    }

    /// The named stages, in execution order.
    pub fn steps(&self) -> &[(String, Stage)] {
        &self.steps
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Fits each stage (sequentially) on the output of the previous one and returns the final
    /// transformed DataFrame.
    pub async fn fit(&mut self, df: &DataFrame) -> BikeRentalResult<DataFrame> {
        if self.steps.is_empty() {
            return Err(BikeRentalError::InvalidParameter(
                "Pipeline must have at least one transformer.".to_string(),
            ));
        }
        let mut current_df = df.clone();
        for (name, step) in self.steps.iter_mut() {
            let start = Instant::now();
            step.fit(&current_df)
                .await
                .map_err(|e| e.in_stage(name))?;
            current_df = step
                .transform(current_df)
                .await
                .map_err(|e| e.in_stage(name))?;
            if self.verbose {
                info!("Fitted step '{}' in {:?}", name, start.elapsed());
            } else {
                debug!("Fitted step '{}' in {:?}", name, start.elapsed());
            }
        }
        self.fitted = true;
        Ok(current_df)
    }

    /// Applies the `transform` method of each stage (without fitting).
    pub async fn transform(&self, df: DataFrame) -> BikeRentalResult<DataFrame> {
        if self.steps.is_empty() {
            return Err(BikeRentalError::InvalidParameter(
                "Pipeline must have at least one transformer.".to_string(),
            ));
        }
        if !self.fitted {
            return Err(BikeRentalError::FitNotCalled);
        }
        let mut current_df = df;
        for (name, step) in self.steps.iter() {
            if self.verbose {
                info!("Applying step: {}", name);
            }
            current_df = step
                .transform(current_df)
                .await
                .map_err(|e| e.in_stage(name))?;
        }
        Ok(current_df)
    }

    /// Convenience method to call `fit` and then return the final transformed DataFrame.
    pub async fn fit_transform(&mut self, df: &DataFrame) -> BikeRentalResult<DataFrame> {
        self.fit(df).await
    }
}

/// Macro to simplify pipeline creation by converting each transformer into a [`Stage`].
///
/// # Example
///
/// ```rust,no_run
/// use bikerental_model::make_pipeline;
/// use bikerental_model::transformers::imputation::WeathersitImputer;
///
/// let pipeline = make_pipeline!(false,
///     ("weathersit_imputation", WeathersitImputer::new("weathersit")),
/// );
/// ```
#[macro_export]
macro_rules! make_pipeline {
    ($verbose:expr, $(($name:expr, $transformer:expr)),+ $(,)?) => {
        {
            let steps: Vec<(String, $crate::pipeline::Stage)> = vec![
                $(
                    ($name.to_string(), $crate::pipeline::Stage::from($transformer)),
                )+
            ];
            $crate::pipeline::Pipeline::new(steps, $verbose)
        }
    };
}

//! ## Regression Model
//!
//! Decision tree and random forest regressors working on row-major `f64` feature matrices.
//! The feature pipeline produces the matrix; this module knows nothing about DataFrames.

mod decision_tree;
mod random_forest;

pub use decision_tree::{DecisionTree, TreeConfig, TreeNode};
pub use random_forest::{mean_squared_error, r2_score, ForestConfig, RandomForest};

//! Random Forest regressor

use super::decision_tree::{DecisionTree, TreeConfig};
use crate::exceptions::{BikeRentalError, BikeRentalResult};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random Forest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Max features considered at each split (all if None)
    pub max_features: Option<usize>,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 150,
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestConfig {
    fn validate(&self) -> BikeRentalResult<()> {
        if self.n_trees == 0 {
            return Err(BikeRentalError::InvalidConfiguration(
                "The forest needs at least one tree".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(BikeRentalError::InvalidConfiguration(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 || self.min_samples_leaf == 0 {
            return Err(BikeRentalError::InvalidConfiguration(format!(
                "min_samples_split must be >= 2 and min_samples_leaf >= 1, got {} and {}",
                self.min_samples_split, self.min_samples_leaf
            )));
        }
        if self.max_features == Some(0) {
            return Err(BikeRentalError::InvalidConfiguration(
                "max_features must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
    feature_names: Vec<String>,
    feature_importances: Vec<f64>,
}

fn bootstrap_indices(n: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            feature_names: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Train the forest on a row-major feature matrix.
    ///
    /// `feature_names` names the matrix columns in order; prediction inputs must follow the same
    /// layout.
    pub fn fit(
        &mut self,
        features: &[Vec<f64>],
        labels: &[f64],
        feature_names: Vec<String>,
    ) -> BikeRentalResult<()> {
        self.config.validate()?;
        let n_samples = features.len();
        if n_samples == 0 {
            return Err(BikeRentalError::InvalidParameter(
                "Cannot fit a forest on zero rows".to_string(),
            ));
        }
        if labels.len() != n_samples {
            return Err(BikeRentalError::InvalidParameter(format!(
                "Feature matrix has {} rows but {} labels were given",
                n_samples,
                labels.len()
            )));
        }
        let n_features = feature_names.len();
        if n_features == 0 {
            return Err(BikeRentalError::InvalidParameter(
                "Cannot fit a forest without features".to_string(),
            ));
        }
        check_matrix(features, n_features)?;
        if let Some(i) = labels.iter().position(|y| !y.is_finite()) {
            return Err(BikeRentalError::InvalidParameter(format!(
                "Target value at row {} is not a finite number",
                i
            )));
        }

        let all_rows: Vec<usize> = (0..n_samples).collect();
        let config = &self.config;
        let trees: Vec<DecisionTree> = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed.wrapping_add(i as u64);
                let mut tree = DecisionTree::new(TreeConfig {
                    max_depth: config.max_depth,
                    min_samples_split: config.min_samples_split,
                    min_samples_leaf: config.min_samples_leaf,
                    max_features: config.max_features,
                    seed,
                });
                if config.bootstrap {
                    tree.fit(features, labels, &bootstrap_indices(n_samples, seed));
                } else {
                    tree.fit(features, labels, &all_rows);
                }
                tree
            })
            .collect();

        let mut importances = vec![0.0; n_features];
        for tree in &trees {
            for (i, &imp) in tree.feature_importances().iter().enumerate() {
                importances[i] += imp;
            }
        }
        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut importances {
                *imp /= sum;
            }
        }

        debug!(
            "Fitted {} trees on {} rows x {} features",
            trees.len(),
            n_samples,
            n_features
        );
        self.trees = trees;
        self.feature_names = feature_names;
        self.feature_importances = importances;
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Mean of the tree predictions for every row.
    pub fn predict(&self, features: &[Vec<f64>]) -> BikeRentalResult<Vec<f64>> {
        if !self.is_fitted() {
            return Err(BikeRentalError::FitNotCalled);
        }
        check_matrix(features, self.feature_names.len())?;
        let n_trees = self.trees.len() as f64;
        Ok(features
            .par_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_one(row)).sum::<f64>() / n_trees)
            .collect())
    }

    /// Column names the forest was trained on, in matrix order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Get feature names with importances, sorted by importance
    pub fn feature_importance_ranking(&self) -> Vec<(&str, f64)> {
        let mut ranking: Vec<(&str, f64)> = self
            .feature_names
            .iter()
            .zip(self.feature_importances.iter())
            .map(|(n, &i)| (n.as_str(), i))
            .collect();
        ranking.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranking
    }

    /// Number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn check_matrix(features: &[Vec<f64>], width: usize) -> BikeRentalResult<()> {
    for (i, row) in features.iter().enumerate() {
        if row.len() != width {
            return Err(BikeRentalError::InvalidParameter(format!(
                "Row {} has {} features, expected {}",
                i,
                row.len(),
                width
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(BikeRentalError::InvalidParameter(format!(
                "Row {} contains a value that is not a finite number",
                i
            )));
        }
    }
    Ok(())
}

/// Mean squared error; 0 for empty input.
pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(l, p)| (l - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

/// Coefficient of determination. A constant target yields 0.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean_label = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(l, p)| (l - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|l| (l - mean_label).powi(2)).sum();

    if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regression_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..200 {
            let x1 = (i as f64) / 20.0;
            let x2 = ((i as f64) / 10.0).sin();
            features.push(vec![x1, x2]);
            labels.push(x1 + x2 * 2.0 + 0.1 * (i as f64 % 5.0));
        }
        (features, labels)
    }

    fn names() -> Vec<String> {
        vec!["x1".to_string(), "x2".to_string()]
    }

    #[test]
    fn test_random_forest_regression() {
        let (features, labels) = regression_data();
        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 10,
            ..Default::default()
        });
        forest.fit(&features, &labels, names()).unwrap();

        assert_eq!(forest.n_trees(), 10);
        assert_eq!(forest.feature_importances().len(), 2);
        let total: f64 = forest.feature_importances().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);

        let predictions = forest.predict(&features).unwrap();
        assert_eq!(predictions.len(), features.len());
        assert!(r2_score(&labels, &predictions) > 0.9);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (features, labels) = regression_data();
        let config = ForestConfig {
            n_trees: 5,
            ..Default::default()
        };
        let mut a = RandomForest::new(config.clone());
        let mut b = RandomForest::new(config);
        a.fit(&features, &labels, names()).unwrap();
        b.fit(&features, &labels, names()).unwrap();
        assert_eq!(a.predict(&features).unwrap(), b.predict(&features).unwrap());
    }

    #[test]
    fn test_predict_before_fit() {
        let forest = RandomForest::new(ForestConfig::default());
        assert!(matches!(
            forest.predict(&[vec![1.0, 2.0]]),
            Err(BikeRentalError::FitNotCalled)
        ));
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let mut forest = RandomForest::new(ForestConfig::default());
        assert!(forest.fit(&[], &[], names()).is_err());
        assert!(forest
            .fit(&[vec![1.0, 2.0]], &[1.0, 2.0], names())
            .is_err());
        assert!(forest.fit(&[vec![1.0]], &[1.0], names()).is_err());
        assert!(forest
            .fit(&[vec![1.0, f64::NAN]], &[1.0], names())
            .is_err());

        let mut no_trees = RandomForest::new(ForestConfig {
            n_trees: 0,
            ..Default::default()
        });
        assert!(matches!(
            no_trees.fit(&[vec![1.0, 2.0]], &[1.0], names()),
            Err(BikeRentalError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_predict_checks_width() {
        let (features, labels) = regression_data();
        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 2,
            ..Default::default()
        });
        forest.fit(&features, &labels, names()).unwrap();
        assert!(forest.predict(&[vec![1.0]]).is_err());
    }

    #[test]
    fn test_metrics() {
        let y = [1.0, 2.0, 3.0];
        assert_eq!(mean_squared_error(&y, &y), 0.0);
        assert_eq!(r2_score(&y, &y), 1.0);
        assert_eq!(mean_squared_error(&y, &[2.0, 2.0, 2.0]), 2.0 / 3.0);
        assert_eq!(r2_score(&y, &[2.0, 2.0, 2.0]), 0.0);
        assert_eq!(r2_score(&[5.0, 5.0], &[1.0, 9.0]), 0.0);
    }
}

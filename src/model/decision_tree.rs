//! Regression tree grown on variance reduction.
//!
//! For every candidate feature the rows of a node are sorted once and all thresholds are scored
//! in one sweep with running sums of the labels and of their squares, so a split search is
//! `O(n log n)` per feature instead of `O(n^2)`.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth of tree
    pub max_depth: usize,
    /// Minimum samples required to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf node
    pub min_samples_leaf: usize,
    /// Maximum features to consider for split (None = all)
    pub max_features: Option<usize>,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Rows with `features[feature_idx] <= threshold` go left.
    Split {
        feature_idx: usize,
        threshold: f64,
        n_samples: usize,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

struct BestSplit {
    feature_idx: usize,
    threshold: f64,
    /// Decrease of the summed squared error.
    gain: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

/// Sum of squared deviations from the mean.
fn sse(sum: f64, sum_sq: f64, n: f64) -> f64 {
    (sum_sq - sum * sum / n).max(0.0)
}

/// Regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    config: TreeConfig,
    root: Option<TreeNode>,
    feature_importances: Vec<f64>,
}

impl DecisionTree {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            root: None,
            feature_importances: Vec::new(),
        }
    }

    /// Train on the rows named by `indices` (repeats allowed, as in a bootstrap sample).
    ///
    /// All rows of `features` must have the same width; the caller checks this.
    pub fn fit(&mut self, features: &[Vec<f64>], labels: &[f64], indices: &[usize]) {
        let n_features = features.first().map_or(0, |row| row.len());
        self.feature_importances = vec![0.0; n_features];

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let root = self.build_tree(features, labels, indices.to_vec(), 0, &mut rng);
        self.root = Some(root);

        let sum: f64 = self.feature_importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= sum;
            }
        }
    }

    fn build_tree(
        &mut self,
        features: &[Vec<f64>],
        labels: &[f64],
        indices: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n = indices.len();
        let (sum, sum_sq) = indices.iter().fold((0.0, 0.0), |(s, sq), &i| {
            (s + labels[i], sq + labels[i] * labels[i])
        });
        let value = if n > 0 { sum / n as f64 } else { 0.0 };
        let impurity = if n > 0 { sse(sum, sum_sq, n as f64) } else { 0.0 };

        if depth >= self.config.max_depth
            || n < self.config.min_samples_split
            || n < 2 * self.config.min_samples_leaf.max(1)
            || impurity <= 1e-12
        {
            return TreeNode::Leaf { value, n_samples: n };
        }

        match self.find_best_split(features, labels, &indices, impurity, rng) {
            Some(split) => {
                self.feature_importances[split.feature_idx] += split.gain;
                let left = self.build_tree(features, labels, split.left, depth + 1, rng);
                let right = self.build_tree(features, labels, split.right, depth + 1, rng);
                TreeNode::Split {
                    feature_idx: split.feature_idx,
                    threshold: split.threshold,
                    n_samples: n,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            None => TreeNode::Leaf { value, n_samples: n },
        }
    }

    fn find_best_split(
        &self,
        features: &[Vec<f64>],
        labels: &[f64],
        indices: &[usize],
        parent_sse: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<BestSplit> {
        let n_features = features.first().map_or(0, |row| row.len());
        let max_features = self
            .config
            .max_features
            .unwrap_or(n_features)
            .clamp(1, n_features.max(1));

        let mut feature_indices: Vec<usize> = (0..n_features).collect();
        if max_features < n_features {
            feature_indices.shuffle(rng);
            feature_indices.truncate(max_features);
        }

        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let total: f64 = indices.iter().map(|&i| labels[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| labels[i] * labels[i]).sum();

        // (feature, threshold, gain, rows sorted by that feature, left count)
        let mut best: Option<(usize, f64, f64, Vec<usize>, usize)> = None;
        let mut order = indices.to_vec();
        for &feature_idx in &feature_indices {
            order.sort_by(|&a, &b| features[a][feature_idx].total_cmp(&features[b][feature_idx]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 1..n {
                let y = labels[order[pos - 1]];
                left_sum += y;
                left_sq += y * y;

                let prev = features[order[pos - 1]][feature_idx];
                let next = features[order[pos]][feature_idx];
                if prev >= next || pos < min_leaf || n - pos < min_leaf {
                    continue;
                }
                let n_left = pos as f64;
                let n_right = (n - pos) as f64;
                let child_sse = sse(left_sum, left_sq, n_left)
                    + sse(total - left_sum, total_sq - left_sq, n_right);
                let gain = parent_sse - child_sse;
                if gain > best.as_ref().map_or(1e-12, |b| b.2) {
                    let threshold = prev + (next - prev) / 2.0;
                    best = Some((feature_idx, threshold, gain, Vec::new(), pos));
                }
            }
            if let Some(b) = best.as_mut() {
                if b.0 == feature_idx && b.3.is_empty() {
                    b.3 = order.clone();
                }
            }
        }

        best.map(|(feature_idx, threshold, gain, mut sorted, n_left)| {
            let right = sorted.split_off(n_left);
            BestSplit {
                feature_idx,
                threshold,
                gain,
                left: sorted,
                right,
            }
        })
    }

    /// Predict for a single sample
    pub fn predict_one(&self, features: &[f64]) -> f64 {
        let mut node = match &self.root {
            Some(root) => root,
            None => return 0.0,
        };
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    let x = features.get(*feature_idx).copied().unwrap_or(f64::NAN);
                    node = if x <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    /// Normalized variance reduction contributed by each feature.
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let x = i as f64;
            features.push(vec![x, (i % 3) as f64]);
            labels.push(if x < 20.0 { 10.0 } else { 50.0 });
        }
        (features, labels)
    }

    #[test]
    fn test_tree_finds_step() {
        let (features, labels) = step_data();
        let indices: Vec<usize> = (0..features.len()).collect();
        let mut tree = DecisionTree::new(TreeConfig::default());
        tree.fit(&features, &labels, &indices);

        assert_eq!(tree.predict_one(&[3.0, 0.0]), 10.0);
        assert_eq!(tree.predict_one(&[35.0, 2.0]), 50.0);
        match tree.root() {
            Some(TreeNode::Split {
                feature_idx,
                threshold,
                ..
            }) => {
                assert_eq!(*feature_idx, 0);
                assert_eq!(*threshold, 19.5);
            }
            other => panic!("expected a split at the root, got {:?}", other),
        }
        assert_eq!(tree.feature_importances()[0], 1.0);
    }

    #[test]
    fn test_tree_respects_max_depth() {
        let features: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let labels: Vec<f64> = (0..64).map(|i| (i * i) as f64).collect();
        let indices: Vec<usize> = (0..64).collect();
        let mut tree = DecisionTree::new(TreeConfig {
            max_depth: 3,
            ..Default::default()
        });
        tree.fit(&features, &labels, &indices);

        let root = tree.root().unwrap();
        assert!(root.depth() <= 3);
        assert!(root.n_leaves() <= 8);
    }

    #[test]
    fn test_constant_labels_make_a_leaf() {
        let features: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let labels = vec![7.0; 10];
        let indices: Vec<usize> = (0..10).collect();
        let mut tree = DecisionTree::new(TreeConfig::default());
        tree.fit(&features, &labels, &indices);

        assert!(tree.root().unwrap().is_leaf());
        assert_eq!(tree.predict_one(&[100.0]), 7.0);
    }

    #[test]
    fn test_min_samples_leaf() {
        let features: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let mut labels = vec![0.0; 10];
        labels[9] = 100.0;
        let indices: Vec<usize> = (0..10).collect();
        let mut tree = DecisionTree::new(TreeConfig {
            max_depth: 1,
            min_samples_leaf: 3,
            ..Default::default()
        });
        tree.fit(&features, &labels, &indices);

        match tree.root().unwrap() {
            TreeNode::Split { left, right, .. } => {
                assert!(matches!(**left, TreeNode::Leaf { n_samples, .. } if n_samples >= 3));
                assert!(matches!(**right, TreeNode::Leaf { n_samples, .. } if n_samples >= 3));
            }
            other => panic!("expected a split, got {:?}", other),
        }
    }
}

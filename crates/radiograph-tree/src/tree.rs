use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, instrument};

use crate::{
    TreeError,
    confusion::BinaryConfusion,
    node::{Node, NodeIndex},
    split::{ClassCounts, SplitMethod, find_best_split},
};

/// Configuration for a binary CART decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter      | Default     |
/// |----------------|-------------|
/// | `max_depth`    | 5           |
/// | `min_samples`  | 2           |
/// | `split_method` | `Presorted` |
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTreeConfig {
    pub(crate) max_depth: usize,
    pub(crate) min_samples: usize,
    pub(crate) split_method: SplitMethod,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_depth: 5,
            min_samples: 2,
            split_method: SplitMethod::Presorted,
        }
    }

    /// Set the maximum tree depth (root is depth 0).
    ///
    /// A node at `depth >= max_depth` becomes a leaf, so `0` yields a
    /// single-leaf tree.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the sample count at or below which a node becomes a leaf.
    #[must_use]
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Set the split-finding strategy.
    #[must_use]
    pub fn with_split_method(mut self, split_method: SplitMethod) -> Self {
        self.split_method = split_method;
        self
    }

    // --- Getters ---

    /// Return the maximum depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Return the minimum sample count required to attempt a split.
    #[must_use]
    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Return the split-finding strategy.
    #[must_use]
    pub fn split_method(&self) -> SplitMethod {
        self.split_method
    }

    /// Train a decision tree on the provided row-major dataset.
    ///
    /// `features[sample_idx][feature_idx]` (row-major).
    /// `labels[sample_idx]`: binary class labels (0 or 1).
    ///
    /// # Errors
    ///
    /// | Variant                               | When                                  |
    /// |---------------------------------------|---------------------------------------|
    /// | [`TreeError::EmptyDataset`]           | `features` is empty                   |
    /// | [`TreeError::LabelCountMismatch`]     | `labels.len() != features.len()`      |
    /// | [`TreeError::ZeroFeatures`]           | rows have zero feature columns        |
    /// | [`TreeError::FeatureCountMismatch`]   | rows have inconsistent lengths        |
    /// | [`TreeError::NonFiniteValue`]         | any value is NaN or infinite          |
    /// | [`TreeError::InvalidLabel`]           | any label is neither 0 nor 1          |
    #[instrument(skip(self, features, labels), fields(n_samples = features.len()))]
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<DecisionTree, TreeError> {
        let n_features = validate_dataset(features, labels)?;
        let n_samples = features.len();

        debug!(
            n_samples,
            n_features,
            max_depth = self.max_depth,
            min_samples = self.min_samples,
            split_method = ?self.split_method,
            "fitting decision tree"
        );

        // Column-major layout for find_best_split.
        let col_features: Vec<Vec<f64>> = (0..n_features)
            .map(|feat_idx| features.iter().map(|row| row[feat_idx]).collect())
            .collect();

        let sample_indices: Vec<usize> = (0..n_samples).collect();
        let mut arena: Vec<Node> = Vec::new();

        let root = build_tree(&col_features, labels, &sample_indices, self, 0, &mut arena);

        debug!(root_index = root.index(), n_nodes = arena.len(), "decision tree built");

        Ok(DecisionTree {
            nodes: arena,
            n_features,
        })
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Check shape, finiteness, and label domain; return the feature count.
fn validate_dataset(features: &[Vec<f64>], labels: &[usize]) -> Result<usize, TreeError> {
    if features.is_empty() {
        return Err(TreeError::EmptyDataset);
    }
    if labels.len() != features.len() {
        return Err(TreeError::LabelCountMismatch {
            n_features_rows: features.len(),
            n_labels: labels.len(),
        });
    }

    let n_features = features[0].len();
    if n_features == 0 {
        return Err(TreeError::ZeroFeatures);
    }

    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(TreeError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(TreeError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }

    if let Some((sample_index, &label)) = labels.iter().enumerate().find(|&(_, &y)| y > 1) {
        return Err(TreeError::InvalidLabel {
            sample_index,
            label,
        });
    }

    Ok(n_features)
}

/// Recursively build the arena-based decision tree.
///
/// Returns the [`NodeIndex`] of the node just created in `arena`.
fn build_tree(
    col_features: &[Vec<f64>],
    labels: &[usize],
    sample_indices: &[usize],
    config: &DecisionTreeConfig,
    depth: usize,
    arena: &mut Vec<Node>,
) -> NodeIndex {
    let n_samples = sample_indices.len();

    let mut counts = ClassCounts::default();
    for &si in sample_indices {
        counts.add(labels[si]);
    }
    let impurity = counts.gini();

    let make_leaf = |arena: &mut Vec<Node>| -> NodeIndex {
        let idx = arena.len();
        arena.push(Node::Leaf {
            prediction: counts.majority(),
        });
        NodeIndex::new(idx)
    };

    // Stopping conditions → leaf.
    if depth >= config.max_depth || n_samples <= config.min_samples || impurity.is_pure() {
        return make_leaf(arena);
    }

    let Some(split) = find_best_split(col_features, labels, sample_indices, config.split_method)
    else {
        debug!(depth, n_samples, %impurity, "no valid split, emitting majority leaf");
        return make_leaf(arena);
    };

    // Arena pattern: reserve index, recurse, then overwrite with the split.
    let node_idx = arena.len();
    arena.push(Node::Leaf { prediction: 0 });

    let left = build_tree(col_features, labels, &split.left_indices, config, depth + 1, arena);
    let right = build_tree(col_features, labels, &split.right_indices, config, depth + 1, arena);

    arena[node_idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Some(left),
        right: Some(right),
        impurity_decrease: n_samples as f64 * (impurity.value() - split.weighted_gini),
    };

    NodeIndex::new(node_idx)
}

/// A fitted binary decision tree.
///
/// Stored as an arena-based `Vec<Node>` whose root is index 0. Every node
/// except the root is referenced by exactly one parent.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
}

impl DecisionTree {
    /// Predict the class label for a single sample.
    ///
    /// Traverses from the root: at each `Split`, goes left when
    /// `sample[feature] < threshold`, right otherwise.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::PredictionFeatureMismatch`] | `sample` is shorter than the features the tree reads |
    /// | [`TreeError::MissingChild`] | traversal reaches a child persisted as `NULL` |
    /// | [`TreeError::NodeOutOfBounds`] | the arena is empty or a child index is dangling |
    pub fn predict(&self, sample: &[f64]) -> Result<usize, TreeError> {
        self.find_leaf(sample).map(|(_, prediction)| prediction)
    }

    /// Predict class labels for a batch of samples in parallel.
    ///
    /// # Errors
    ///
    /// Returns the first error [`DecisionTree::predict`] reports for any sample.
    pub fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, TreeError> {
        features
            .into_par_iter()
            .map(|sample| self.predict(sample))
            .collect()
    }

    /// Build the confusion matrix of this tree's predictions against `labels`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EmptyDataset`] for zero samples,
    /// [`TreeError::LabelCountMismatch`] when lengths differ, or any
    /// prediction error.
    pub fn evaluate(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<BinaryConfusion, TreeError> {
        if labels.len() != features.len() {
            return Err(TreeError::LabelCountMismatch {
                n_features_rows: features.len(),
                n_labels: labels.len(),
            });
        }
        let predicted = self.predict_batch(features)?;
        BinaryConfusion::from_labels(labels, &predicted)
    }

    /// Size-weighted Gini impurity of the leaves reached by the samples.
    ///
    /// Samples are grouped by the leaf they land in; each group contributes
    /// `|group| · gini(group) / |samples|`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`DecisionTree::evaluate`].
    pub fn training_impurity(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<f64, TreeError> {
        if features.is_empty() {
            return Err(TreeError::EmptyDataset);
        }
        if labels.len() != features.len() {
            return Err(TreeError::LabelCountMismatch {
                n_features_rows: features.len(),
                n_labels: labels.len(),
            });
        }
        let mut per_leaf = vec![ClassCounts::default(); self.nodes.len()];
        for (sample, &label) in features.iter().zip(labels) {
            let (leaf, _) = self.find_leaf(sample)?;
            per_leaf[leaf].add(label);
        }
        let weighted: f64 = per_leaf
            .iter()
            .filter(|c| c.total() > 0)
            .map(|c| c.total() as f64 * c.gini().value())
            .sum();
        Ok(weighted / features.len() as f64)
    }

    /// Compute normalised Gini-decrease feature importances.
    ///
    /// Returns a `Vec` of length `n_features` summing to 1.0, or all zeros
    /// when the tree has no splits (or was loaded from text, which does not
    /// carry impurity decreases).
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                impurity_decrease,
                ..
            } = node
            {
                if let Some(total) = totals.get_mut(feature.index()) {
                    *total += impurity_decrease;
                }
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    /// Return the node arena; index 0 is the root.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return the number of features a prediction input must provide.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0usize;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((node_idx, d)) = stack.pop() {
            max_depth = max_depth.max(d);
            if let Some(Node::Split { left, right, .. }) = self.nodes.get(node_idx) {
                for child in [left, right].into_iter().flatten() {
                    stack.push((child.index(), d + 1));
                }
            }
        }
        max_depth
    }

    /// Traverse from the root; return the arena index and prediction of the
    /// leaf reached.
    fn find_leaf(&self, sample: &[f64]) -> Result<(usize, usize), TreeError> {
        if sample.len() < self.n_features {
            return Err(TreeError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut idx = 0usize;
        loop {
            let node = self.nodes.get(idx).ok_or(TreeError::NodeOutOfBounds {
                node: idx,
                n_nodes: self.nodes.len(),
            })?;
            match node {
                Node::Leaf { prediction } => return Ok((idx, *prediction)),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    let value = sample.get(feature.index()).ok_or(
                        TreeError::PredictionFeatureMismatch {
                            expected: feature.index() + 1,
                            got: sample.len(),
                        },
                    )?;
                    let (next, side) = if *value < *threshold {
                        (left, "left")
                    } else {
                        (right, "right")
                    };
                    idx = next
                        .ok_or(TreeError::MissingChild { node: idx, side })?
                        .index();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FeatureIndex;

    fn staircase() -> (Vec<Vec<f64>>, Vec<usize>) {
        (
            vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]],
            vec![0, 0, 1, 1],
        )
    }

    #[test]
    fn empty_dataset_error() {
        let features: Vec<Vec<f64>> = vec![];
        let labels: Vec<usize> = vec![];
        let err = DecisionTreeConfig::new().fit(&features, &labels).unwrap_err();
        assert!(matches!(err, TreeError::EmptyDataset));
    }

    #[test]
    fn label_count_mismatch_error() {
        let err = DecisionTreeConfig::new()
            .fit(&[vec![1.0], vec![2.0]], &[0])
            .unwrap_err();
        assert!(matches!(
            err,
            TreeError::LabelCountMismatch { n_features_rows: 2, n_labels: 1 }
        ));
    }

    #[test]
    fn non_binary_label_error() {
        let err = DecisionTreeConfig::new()
            .fit(&[vec![1.0], vec![2.0]], &[0, 2])
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidLabel { sample_index: 1, label: 2 }));
    }

    #[test]
    fn feature_count_mismatch_error() {
        let features = vec![vec![1.0, 2.0], vec![3.0]];
        let err = DecisionTreeConfig::new().fit(&features, &[0, 1]).unwrap_err();
        assert!(matches!(err, TreeError::FeatureCountMismatch { sample_index: 1, .. }));
    }

    #[test]
    fn non_finite_value_error() {
        let features = vec![vec![1.0, f64::NAN], vec![3.0, 4.0]];
        let err = DecisionTreeConfig::new().fit(&features, &[0, 1]).unwrap_err();
        assert!(matches!(
            err,
            TreeError::NonFiniteValue { sample_index: 0, feature_index: 1 }
        ));
    }

    #[test]
    fn pure_dataset_single_leaf() {
        let features = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let tree = DecisionTreeConfig::new().fit(&features, &[1, 1, 1]).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict(&[2.0, 3.0]).unwrap(), 1);
    }

    #[test]
    fn staircase_splits_at_observed_value() {
        let (features, labels) = staircase();
        let tree = DecisionTreeConfig::new()
            .with_min_samples(1)
            .fit(&features, &labels)
            .unwrap();
        match &tree.nodes()[0] {
            Node::Split { feature, threshold, .. } => {
                assert_eq!(feature.index(), 0);
                assert!((threshold - 2.0).abs() < f64::EPSILON);
            }
            Node::Leaf { .. } => panic!("root should split"),
        }
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict(&[1.5]).unwrap(), 0);
        assert_eq!(tree.predict(&[2.0]).unwrap(), 1);
        assert_eq!(tree.predict(&[2.5]).unwrap(), 1);
    }

    #[test]
    fn min_samples_stops_at_or_below() {
        // Four samples with min_samples = 4 → root is a leaf.
        let (features, labels) = staircase();
        let tree = DecisionTreeConfig::new()
            .with_min_samples(4)
            .fit(&features, &labels)
            .unwrap();
        assert_eq!(tree.n_nodes(), 1);
        // Tie between classes resolves to 0.
        assert_eq!(tree.predict(&[3.0]).unwrap(), 0);
    }

    #[test]
    fn max_depth_zero_is_single_leaf() {
        let (features, labels) = staircase();
        let tree = DecisionTreeConfig::new()
            .with_max_depth(0)
            .fit(&features, &labels)
            .unwrap();
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn xor_needs_depth_two() {
        let features = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];
        let labels = vec![0, 1, 1, 0];
        let tree = DecisionTreeConfig::new()
            .with_min_samples(1)
            .fit(&features, &labels)
            .unwrap();
        assert_eq!(tree.depth(), 2);
        for (sample, &label) in features.iter().zip(&labels) {
            assert_eq!(tree.predict(sample).unwrap(), label);
        }
    }

    #[test]
    fn identical_rows_with_mixed_labels_yield_majority_leaf() {
        let features = vec![vec![1.0, 1.0]; 5];
        let labels = vec![1, 0, 1, 1, 0];
        let tree = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict(&[1.0, 1.0]).unwrap(), 1);
    }

    #[test]
    fn split_methods_grow_identical_trees() {
        let features = vec![
            vec![0.3, 5.0],
            vec![0.1, 4.0],
            vec![0.9, 4.0],
            vec![0.5, 1.0],
            vec![0.3, 2.0],
            vec![0.7, 5.0],
            vec![0.2, 3.0],
        ];
        let labels = vec![1, 0, 1, 0, 1, 1, 0];
        let exhaustive = DecisionTreeConfig::new()
            .with_min_samples(1)
            .with_split_method(SplitMethod::Exhaustive)
            .fit(&features, &labels)
            .unwrap();
        let presorted = DecisionTreeConfig::new()
            .with_min_samples(1)
            .with_split_method(SplitMethod::Presorted)
            .fit(&features, &labels)
            .unwrap();
        assert_eq!(exhaustive, presorted);
    }

    #[test]
    fn prediction_input_too_short() {
        let features = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let tree = DecisionTreeConfig::new().fit(&features, &[0, 1]).unwrap();
        let err = tree.predict(&[1.0]).unwrap_err();
        assert!(matches!(
            err,
            TreeError::PredictionFeatureMismatch { expected: 2, got: 1 }
        ));
    }

    #[test]
    fn missing_child_is_reported() {
        let tree = DecisionTree {
            nodes: vec![
                Node::Split {
                    feature: crate::node::FeatureIndex::new(0),
                    threshold: 1.0,
                    left: Some(NodeIndex::new(1)),
                    right: None,
                    impurity_decrease: 0.0,
                },
                Node::Leaf { prediction: 0 },
            ],
            n_features: 1,
        };
        assert_eq!(tree.predict(&[0.5]).unwrap(), 0);
        assert!(matches!(
            tree.predict(&[1.5]),
            Err(TreeError::MissingChild { node: 0, side: "right" })
        ));
    }

    #[test]
    fn feature_importances_sum_to_one() {
        let features = vec![
            vec![1.0, 100.0],
            vec![2.0, 200.0],
            vec![3.0, 300.0],
            vec![10.0, 100.0],
            vec![11.0, 200.0],
            vec![12.0, 300.0],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let tree = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        let importances = tree.feature_importances();
        let sum: f64 = importances.iter().sum();
        assert!((sum - 1.0).abs() < 1e-10, "sum = {sum}");
        assert!((importances[0] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn training_impurity_of_pure_leaves_is_zero() {
        let (features, labels) = staircase();
        let tree = DecisionTreeConfig::new()
            .with_min_samples(1)
            .fit(&features, &labels)
            .unwrap();
        assert!(tree.training_impurity(&features, &labels).unwrap().abs() < f64::EPSILON);

        let stump = DecisionTreeConfig::new()
            .with_max_depth(0)
            .fit(&features, &labels)
            .unwrap();
        let root_gini = stump.training_impurity(&features, &labels).unwrap();
        assert!((root_gini - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn evaluate_counts_training_predictions() {
        let (features, labels) = staircase();
        let tree = DecisionTreeConfig::new()
            .with_min_samples(1)
            .fit(&features, &labels)
            .unwrap();
        let cm = tree.evaluate(&features, &labels).unwrap();
        assert_eq!(cm.true_positives(), 2);
        assert_eq!(cm.true_negatives(), 2);
        assert!((cm.accuracy() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_arena_is_error_not_panic() {
        let tree = DecisionTree {
            nodes: Vec::new(),
            n_features: 0,
        };
        assert!(matches!(
            tree.predict(&[1.0]),
            Err(TreeError::NodeOutOfBounds { node: 0, n_nodes: 0 })
        ));
        assert_eq!(tree.depth(), 0);
        assert!(tree.training_impurity(&[vec![1.0]], &[0]).is_err());
    }

    #[test]
    fn dangling_child_index_is_error() {
        let tree = DecisionTree {
            nodes: vec![
                Node::Split {
                    feature: FeatureIndex::new(0),
                    threshold: 1.0,
                    left: Some(NodeIndex::new(1)),
                    right: Some(NodeIndex::new(7)),
                    impurity_decrease: 0.0,
                },
                Node::Leaf { prediction: 0 },
            ],
            n_features: 1,
        };
        assert_eq!(tree.predict(&[0.0]).unwrap(), 0);
        assert!(matches!(
            tree.predict(&[2.0]),
            Err(TreeError::NodeOutOfBounds { node: 7, n_nodes: 2 })
        ));
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn split_feature_beyond_sample_is_error() {
        let tree = DecisionTree {
            nodes: vec![
                Node::Split {
                    feature: FeatureIndex::new(3),
                    threshold: 1.0,
                    left: Some(NodeIndex::new(1)),
                    right: Some(NodeIndex::new(2)),
                    impurity_decrease: 0.0,
                },
                Node::Leaf { prediction: 0 },
                Node::Leaf { prediction: 1 },
            ],
            n_features: 1,
        };
        assert!(matches!(
            tree.predict(&[0.0]),
            Err(TreeError::PredictionFeatureMismatch { expected: 4, got: 1 })
        ));
        assert_eq!(tree.feature_importances(), vec![0.0]);
    }
}

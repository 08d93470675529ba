use crate::error::TreeError;
use crate::node::{FeatureIndex, Impurity};

/// Strategy for enumerating candidate splits at a node.
///
/// Both strategies visit candidates in the same order (features ascending,
/// then samples in dataset order, threshold = that sample's value) and keep
/// the first candidate with the lowest weighted Gini, so they grow the same
/// tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMethod {
    /// Rescan every sample for every candidate threshold: O(features × samples²).
    Exhaustive,
    /// Sort each feature once per node and count each side by binary search:
    /// O(features × samples × log samples).
    #[default]
    Presorted,
}

/// Class-0 / class-1 counts of a label set.
///
/// Any label other than 0 counts toward class 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ClassCounts {
    pub(crate) negative: usize,
    pub(crate) positive: usize,
}

impl ClassCounts {
    pub(crate) fn from_labels(labels: &[usize]) -> Self {
        let mut counts = Self::default();
        for &y in labels {
            counts.add(y);
        }
        counts
    }

    pub(crate) fn add(&mut self, label: usize) {
        if label == 0 {
            self.negative += 1;
        } else {
            self.positive += 1;
        }
    }

    pub(crate) fn total(self) -> usize {
        self.negative + self.positive
    }

    /// `1 - (p0² + p1²)`. Callers guarantee `total() > 0`.
    pub(crate) fn gini(self) -> Impurity {
        let n = self.total() as f64;
        let p0 = self.negative as f64 / n;
        let p1 = self.positive as f64 / n;
        Impurity::new(1.0 - (p0 * p0 + p1 * p1))
    }

    /// Class 1 only on a strict majority; ties go to class 0.
    pub(crate) fn majority(self) -> usize {
        usize::from(self.positive > self.negative)
    }
}

/// Gini impurity of a binary label list.
///
/// # Errors
///
/// Returns [`TreeError::EmptyDataset`] when `labels` is empty.
pub fn gini(labels: &[usize]) -> Result<Impurity, TreeError> {
    if labels.is_empty() {
        return Err(TreeError::EmptyDataset);
    }
    Ok(ClassCounts::from_labels(labels).gini())
}

/// Majority class of a label list: 1 when class-1 labels strictly outnumber
/// class-0 labels, otherwise 0. An empty list yields 0.
#[must_use]
pub fn most_common(labels: &[usize]) -> usize {
    ClassCounts::from_labels(labels).majority()
}

/// Size-weighted Gini of a two-way partition.
fn weighted_gini(left: ClassCounts, right: ClassCounts, n_samples: usize) -> f64 {
    (left.total() as f64 * left.gini().value() + right.total() as f64 * right.gini().value())
        / n_samples as f64
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    /// Weighted Gini of the chosen partition.
    pub(crate) weighted_gini: f64,
    /// Samples with `value < threshold`, in dataset order.
    pub(crate) left_indices: Vec<usize>,
    /// Samples with `value >= threshold`, in dataset order.
    pub(crate) right_indices: Vec<usize>,
}

/// Find the split with the lowest size-weighted Gini.
///
/// `features` is column-major: `features[feature_idx][sample_idx]`, and
/// `sample_indices` selects the samples that reached the node. Returns
/// `None` when every candidate leaves one side empty.
pub(crate) fn find_best_split(
    features: &[Vec<f64>],
    labels: &[usize],
    sample_indices: &[usize],
    method: SplitMethod,
) -> Option<SplitResult> {
    let n_samples = sample_indices.len();
    if n_samples == 0 {
        return None;
    }

    let mut best_gini = f64::INFINITY;
    let mut best: Option<(usize, f64)> = None;

    let mut consider = |feat_idx: usize, threshold: f64, left: ClassCounts, right: ClassCounts| {
        if left.total() == 0 || right.total() == 0 {
            return;
        }
        let g = weighted_gini(left, right, n_samples);
        if g < best_gini {
            best_gini = g;
            best = Some((feat_idx, threshold));
        }
    };

    for (feat_idx, column) in features.iter().enumerate() {
        match method {
            SplitMethod::Exhaustive => {
                for &si in sample_indices {
                    let threshold = column[si];
                    let mut left = ClassCounts::default();
                    let mut right = ClassCounts::default();
                    for &sj in sample_indices {
                        if column[sj] < threshold {
                            left.add(labels[sj]);
                        } else {
                            right.add(labels[sj]);
                        }
                    }
                    consider(feat_idx, threshold, left, right);
                }
            }
            SplitMethod::Presorted => {
                let mut sorted: Vec<(f64, usize)> = sample_indices
                    .iter()
                    .map(|&si| (column[si], labels[si]))
                    .collect();
                sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

                // prefix[k] = class counts of the k smallest values.
                let mut prefix = Vec::with_capacity(n_samples + 1);
                let mut running = ClassCounts::default();
                prefix.push(running);
                for &(_, y) in &sorted {
                    running.add(y);
                    prefix.push(running);
                }

                for &si in sample_indices {
                    let threshold = column[si];
                    let n_left = sorted.partition_point(|&(v, _)| v < threshold);
                    let left = prefix[n_left];
                    let right = ClassCounts {
                        negative: running.negative - left.negative,
                        positive: running.positive - left.positive,
                    };
                    consider(feat_idx, threshold, left, right);
                }
            }
        }
    }

    let (feat_idx, threshold) = best?;

    let column = &features[feat_idx];
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = sample_indices
        .iter()
        .partition(|&&si| column[si] < threshold);

    Some(SplitResult {
        feature: FeatureIndex::new(feat_idx),
        threshold,
        weighted_gini: best_gini,
        left_indices,
        right_indices,
    })
}

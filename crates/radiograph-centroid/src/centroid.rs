//! Centroid-distance scoring against per-class mean vectors.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::CentroidError;
use crate::params::{check_len, join, malformed, read_values, validate_matrix, write_text};

/// Mean feature vectors of the negative (0) and positive (1) classes.
///
/// A sample's score is its dot product with the positive centroid minus its
/// dot product with the negative centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidModel {
    negative: Vec<f64>,
    positive: Vec<f64>,
}

impl CentroidModel {
    /// Average the rows of each class. Any non-zero label counts as positive.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CentroidError::EmptyDataset`] | `features` is empty |
    /// | [`CentroidError::ZeroFeatures`] | rows have no columns |
    /// | [`CentroidError::FeatureCountMismatch`] | rows differ in length |
    /// | [`CentroidError::NonFiniteValue`] | a value is NaN or infinite |
    /// | [`CentroidError::LabelCountMismatch`] | `labels.len() != features.len()` |
    /// | [`CentroidError::MissingClass`] | one class has no samples |
    #[instrument(skip(features, labels), fields(n_samples = features.len()))]
    pub fn fit(features: &[Vec<f64>], labels: &[usize]) -> Result<Self, CentroidError> {
        let n_features = validate_matrix(features)?;
        if labels.len() != features.len() {
            return Err(CentroidError::LabelCountMismatch {
                n_samples: features.len(),
                n_labels: labels.len(),
            });
        }

        let mut sums = [vec![0.0; n_features], vec![0.0; n_features]];
        let mut counts = [0usize; 2];
        for (row, &label) in features.iter().zip(labels) {
            let class = usize::from(label != 0);
            counts[class] += 1;
            for (s, &v) in sums[class].iter_mut().zip(row) {
                *s += v;
            }
        }

        if let Some(class) = counts.iter().position(|&c| c == 0) {
            return Err(CentroidError::MissingClass { class });
        }

        let [mut negative, mut positive] = sums;
        negative.iter_mut().for_each(|v| *v /= counts[0] as f64);
        positive.iter_mut().for_each(|v| *v /= counts[1] as f64);

        debug!(
            n_negative = counts[0],
            n_positive = counts[1],
            n_features,
            "centroids computed"
        );
        Ok(Self { negative, positive })
    }

    /// Score one sample: `x · positive - x · negative`.
    ///
    /// # Errors
    ///
    /// Returns [`CentroidError::FeatureCountMismatch`] on a length mismatch.
    pub fn score(&self, sample: &[f64]) -> Result<f64, CentroidError> {
        check_len(sample, self.negative.len())?;
        Ok(dot(sample, &self.positive) - dot(sample, &self.negative))
    }

    /// Score every sample.
    ///
    /// # Errors
    ///
    /// Returns the first [`CentroidError::FeatureCountMismatch`], with the
    /// offending sample's index.
    pub fn scores(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, CentroidError> {
        features
            .iter()
            .enumerate()
            .map(|(sample_index, row)| {
                if row.len() != self.negative.len() {
                    return Err(CentroidError::FeatureCountMismatch {
                        expected: self.negative.len(),
                        got: row.len(),
                        sample_index,
                    });
                }
                Ok(dot(row, &self.positive) - dot(row, &self.negative))
            })
            .collect()
    }

    /// Predict positive when the score is strictly above `threshold`.
    ///
    /// # Errors
    ///
    /// Same as [`CentroidModel::score`].
    pub fn predict(&self, sample: &[f64], threshold: f64) -> Result<bool, CentroidError> {
        Ok(self.score(sample)? > threshold)
    }

    /// Return the class-0 mean vector.
    #[must_use]
    pub fn negative(&self) -> &[f64] {
        &self.negative
    }

    /// Return the class-1 mean vector.
    #[must_use]
    pub fn positive(&self) -> &[f64] {
        &self.positive
    }

    /// Return the number of features.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.negative.len()
    }

    /// Save as two lines: negative centroid, then positive centroid.
    ///
    /// # Errors
    ///
    /// Returns [`CentroidError::WriteParams`] when the file cannot be written.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CentroidError> {
        let text = format!("{}\n{}\n", join(&self.negative), join(&self.positive));
        write_text(path.as_ref(), &text)?;
        info!(n_features = self.negative.len(), "centroid weights saved");
        Ok(())
    }

    /// Load weights written by [`CentroidModel::save`].
    ///
    /// Line breaks are not significant: the values are read as one list and
    /// split in half.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CentroidError::ReadParams`] | file cannot be read |
    /// | [`CentroidError::MalformedParams`] | non-numeric token, or an odd or zero value count |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CentroidError> {
        let path = path.as_ref();
        let values = read_values(path)?;
        if values.is_empty() || values.len() % 2 != 0 {
            return Err(malformed(
                path,
                format!("expected an even, non-zero number of values, found {}", values.len()),
            ));
        }
        let (negative, positive) = values.split_at(values.len() / 2);
        debug!(n_features = negative.len(), "centroid weights loaded");
        Ok(Self {
            negative: negative.to_vec(),
            positive: positive.to_vec(),
        })
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

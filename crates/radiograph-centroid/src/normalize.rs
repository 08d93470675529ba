//! Per-feature z-score normalization.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::CentroidError;
use crate::params::{check_len, join, malformed, read_values, validate_matrix, write_text};

/// Standard deviations at or below this are treated as constant features.
const MIN_STDEV: f64 = 1e-10;

/// Per-feature mean and population standard deviation.
///
/// Fitted on training data and reapplied unchanged to test data.
#[derive(Debug, Clone, PartialEq)]
pub struct ZScore {
    means: Vec<f64>,
    stdevs: Vec<f64>,
}

impl ZScore {
    /// Compute column means and population standard deviations (divide by n).
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CentroidError::EmptyDataset`] | `features` is empty |
    /// | [`CentroidError::ZeroFeatures`] | rows have no columns |
    /// | [`CentroidError::FeatureCountMismatch`] | rows differ in length |
    /// | [`CentroidError::NonFiniteValue`] | a value is NaN or infinite |
    #[instrument(skip(features), fields(n_samples = features.len()))]
    pub fn fit(features: &[Vec<f64>]) -> Result<Self, CentroidError> {
        let n_features = validate_matrix(features)?;
        let n = features.len() as f64;

        let mut means = vec![0.0; n_features];
        for row in features {
            for (m, &v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut stdevs = vec![0.0; n_features];
        for row in features {
            for ((s, &m), &v) in stdevs.iter_mut().zip(&means).zip(row) {
                *s += (v - m).powi(2);
            }
        }
        stdevs.iter_mut().for_each(|s| *s = (*s / n).sqrt());

        let n_constant = stdevs.iter().filter(|&&s| s <= MIN_STDEV).count();
        debug!(n_features, n_constant, "z-score parameters fitted");

        Ok(Self { means, stdevs })
    }

    /// Normalize one sample: `(x - mean) / std`, or 0.0 for constant features.
    ///
    /// # Errors
    ///
    /// Returns [`CentroidError::FeatureCountMismatch`] when the length differs
    /// from the fitted feature count.
    pub fn transform_sample(&self, sample: &[f64]) -> Result<Vec<f64>, CentroidError> {
        check_len(sample, self.means.len())?;
        Ok(sample
            .iter()
            .zip(self.means.iter().zip(&self.stdevs))
            .map(|(&x, (&m, &s))| if s > MIN_STDEV { (x - m) / s } else { 0.0 })
            .collect())
    }

    /// Normalize every sample.
    ///
    /// # Errors
    ///
    /// Returns the first [`CentroidError::FeatureCountMismatch`], with the
    /// offending sample's index.
    pub fn transform(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, CentroidError> {
        features
            .iter()
            .enumerate()
            .map(|(sample_index, row)| {
                self.transform_sample(row).map_err(|e| match e {
                    CentroidError::FeatureCountMismatch { expected, got, .. } => {
                        CentroidError::FeatureCountMismatch {
                            expected,
                            got,
                            sample_index,
                        }
                    }
                    other => other,
                })
            })
            .collect()
    }

    /// Fit on `features` and return the parameters with the normalized data.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ZScore::fit`].
    pub fn fit_transform(features: &[Vec<f64>]) -> Result<(Self, Vec<Vec<f64>>), CentroidError> {
        let zscore = Self::fit(features)?;
        let normalized = zscore.transform(features)?;
        Ok((zscore, normalized))
    }

    /// Return the per-feature means.
    #[must_use]
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Return the per-feature population standard deviations.
    #[must_use]
    pub fn stdevs(&self) -> &[f64] {
        &self.stdevs
    }

    /// Return the number of features.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    /// Save as three lines: feature count, means, standard deviations.
    ///
    /// # Errors
    ///
    /// Returns [`CentroidError::WriteParams`] when the file cannot be written.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CentroidError> {
        let text = format!(
            "{}\n{}\n{}\n",
            self.means.len(),
            join(&self.means),
            join(&self.stdevs)
        );
        write_text(path.as_ref(), &text)?;
        info!(n_features = self.means.len(), "normalization parameters saved");
        Ok(())
    }

    /// Load parameters written by [`ZScore::save`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CentroidError::ReadParams`] | file cannot be read |
    /// | [`CentroidError::MalformedParams`] | bad count, non-numeric token, or wrong value count |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CentroidError> {
        let path = path.as_ref();
        let values = read_values(path)?;
        let Some((&count, rest)) = values.split_first() else {
            return Err(malformed(path, "file is empty".to_string()));
        };
        if count < 1.0 || count.fract() != 0.0 {
            return Err(malformed(path, format!("feature count {count} is not a positive integer")));
        }
        let n = count as usize;
        if rest.len() != 2 * n {
            return Err(malformed(
                path,
                format!("expected {} values for {n} features, found {}", 2 * n, rest.len()),
            ));
        }
        let (means, stdevs) = rest.split_at(n);
        debug!(n_features = n, "normalization parameters loaded");
        Ok(Self {
            means: means.to_vec(),
            stdevs: stdevs.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_uses_population_stdev() {
        let features = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let z = ZScore::fit(&features).unwrap();
        assert_eq!(z.means(), &[2.0, 5.0]);
        assert_eq!(z.stdevs(), &[1.0, 0.0]);
    }

    #[test]
    fn constant_feature_maps_to_zero() {
        let (_, normalized) = ZScore::fit_transform(&[vec![1.0, 5.0], vec![3.0, 5.0]]).unwrap();
        assert_eq!(normalized, vec![vec![-1.0, 0.0], vec![1.0, 0.0]]);
    }

    #[test]
    fn normalized_columns_have_zero_mean_unit_variance() {
        let features: Vec<Vec<f64>> = (0..50).map(|i| vec![f64::from(i) * 0.3 + 7.0]).collect();
        let (_, normalized) = ZScore::fit_transform(&features).unwrap();
        let n = normalized.len() as f64;
        let mean = normalized.iter().map(|r| r[0]).sum::<f64>() / n;
        let var = normalized.iter().map(|r| (r[0] - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 1e-10);
        assert!((var - 1.0).abs() < 1e-10);
    }

    #[test]
    fn transform_reports_offending_sample() {
        let z = ZScore::fit(&[vec![1.0, 2.0], vec![2.0, 3.0]]).unwrap();
        let err = z.transform(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(
            err,
            CentroidError::FeatureCountMismatch { expected: 2, got: 1, sample_index: 1 }
        ));
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("normalization.txt");
        let z = ZScore::fit(&[vec![0.1, 10.0, 3.0], vec![0.7, 12.5, 3.0]]).unwrap();
        z.save(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("3\n"));
        assert_eq!(ZScore::load(&path).unwrap(), z);
    }

    #[test]
    fn load_rejects_wrong_value_count() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("normalization.txt");
        std::fs::write(&path, "2\n0.0 1.0\n1.0\n").unwrap();
        assert!(matches!(
            ZScore::load(&path),
            Err(CentroidError::MalformedParams { .. })
        ));
    }

    #[test]
    fn load_missing_file_is_read_error() {
        assert!(matches!(
            ZScore::load("/nonexistent/normalization.txt"),
            Err(CentroidError::ReadParams { .. })
        ));
    }
}

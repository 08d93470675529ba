//! Domain types for radiograph-io.

use std::fmt;

use crate::IoError;

/// A sample (radiograph) identifier.
///
/// Wraps a non-empty string parsed from the first column of the input CSV.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleId(String);

impl SampleId {
    /// Create a new sample ID from a non-empty string.
    pub(crate) fn new(id: String) -> Self {
        debug_assert!(!id.is_empty(), "sample ID must not be empty");
        Self(id)
    }

    /// Return the sample ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Feature vectors read from CSV, optionally with binary labels.
///
/// Produced by [`FeatureReader`](crate::FeatureReader). Sample IDs, labels,
/// and feature rows are parallel: `sample_ids[i]` corresponds to
/// `features[i]` and `labels[i]`.
#[derive(Debug, Clone)]
pub struct FeatureDataset {
    sample_ids: Vec<SampleId>,
    labels: Option<Vec<usize>>,
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
}

impl FeatureDataset {
    pub(crate) fn new(
        sample_ids: Vec<SampleId>,
        labels: Option<Vec<usize>>,
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
    ) -> Self {
        Self {
            sample_ids,
            labels,
            feature_names,
            features,
        }
    }

    /// Return the sample IDs.
    #[must_use]
    pub fn sample_ids(&self) -> &[SampleId] {
        &self.sample_ids
    }

    /// Return the labels, if the file had a `label` column.
    #[must_use]
    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    /// Return the feature column names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the feature matrix (row-major).
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Return the number of samples.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Return the number of samples labelled 1, or `None` without labels.
    #[must_use]
    pub fn n_positive(&self) -> Option<usize> {
        self.labels
            .as_ref()
            .map(|l| l.iter().filter(|&&y| y == 1).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_id_as_str_returns_inner() {
        let id = SampleId::new("img_0042".to_string());
        assert_eq!(id.as_str(), "img_0042");
        assert_eq!(id.to_string(), "img_0042");
    }

    #[test]
    fn experiment_name_valid() {
        let name = ExperimentName::new("chest-xray_01".to_string());
        assert_eq!(name.unwrap().as_str(), "chest-xray_01");
    }

    #[test]
    fn experiment_name_rejects_empty() {
        let name = ExperimentName::new(String::new());
        assert!(matches!(name, Err(IoError::InvalidExperimentName { .. })));
    }

    #[test]
    fn experiment_name_rejects_path_separators() {
        let name = ExperimentName::new("../escape".to_string());
        assert!(matches!(name, Err(IoError::InvalidExperimentName { .. })));
    }

    #[test]
    fn positive_count() {
        let ds = FeatureDataset::new(
            vec![SampleId::new("a".into()), SampleId::new("b".into())],
            Some(vec![1, 0]),
            vec!["f0".into()],
            vec![vec![0.0], vec![1.0]],
        );
        assert_eq!(ds.n_positive(), Some(1));
        assert_eq!(ds.n_samples(), 2);
        assert_eq!(ds.n_features(), 1);
    }
}

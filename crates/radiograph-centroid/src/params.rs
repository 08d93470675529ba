//! Whitespace-separated numeric parameter files and shared input checks.

use std::fs;
use std::path::Path;

use crate::error::CentroidError;

/// Check that `features` is a non-empty matrix of finite values with a
/// consistent row length; return that length.
pub(crate) fn validate_matrix(features: &[Vec<f64>]) -> Result<usize, CentroidError> {
    let Some(first) = features.first() else {
        return Err(CentroidError::EmptyDataset);
    };
    let n_features = first.len();
    if n_features == 0 {
        return Err(CentroidError::ZeroFeatures);
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(CentroidError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(CentroidError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    Ok(n_features)
}

/// Check a single sample against the expected feature count.
pub(crate) fn check_len(sample: &[f64], expected: usize) -> Result<(), CentroidError> {
    if sample.len() != expected {
        return Err(CentroidError::FeatureCountMismatch {
            expected,
            got: sample.len(),
            sample_index: 0,
        });
    }
    Ok(())
}

/// Join values with single spaces, using round-trip float formatting.
pub(crate) fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn write_text(path: &Path, text: &str) -> Result<(), CentroidError> {
    fs::write(path, text).map_err(|e| CentroidError::WriteParams {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read every whitespace-separated token of `path` as a finite `f64`.
pub(crate) fn read_values(path: &Path) -> Result<Vec<f64>, CentroidError> {
    let text = fs::read_to_string(path).map_err(|e| CentroidError::ReadParams {
        path: path.to_path_buf(),
        source: e,
    })?;
    text.split_whitespace()
        .enumerate()
        .map(|(i, raw)| match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(malformed(path, format!("token {i} ({raw:?}) is not a finite number"))),
        })
        .collect()
}

pub(crate) fn malformed(path: &Path, reason: String) -> CentroidError {
    CentroidError::MalformedParams {
        path: path.to_path_buf(),
        reason,
    }
}

//! CSV feature reader with full input validation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{FeatureDataset, SampleId};

/// Name of the optional second header column holding class labels.
const LABEL_COLUMN: &str = "label";

/// Reads per-sample feature vectors from a CSV file.
///
/// Expected CSV format:
/// - Header row required
/// - `sample_id,label,f0,f1,...` for labelled data, or
///   `sample_id,f0,f1,...` when the second header is not `label`
/// - One row per sample, all rows with the same number of columns
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::NoFeatureColumns`] | No columns after the id (and label) columns |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::EmptySampleId`] | First cell of a row is empty |
/// | [`IoError::DuplicateSampleId`] | Same sample_id appears twice |
/// | [`IoError::InvalidLabel`] | Label cell is not `0` or `1` |
/// | [`IoError::NonFiniteValue`] | Cell is NaN, Inf, or unparseable float |
pub struct FeatureReader {
    path: PathBuf,
}

impl FeatureReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the CSV file, returning a [`FeatureDataset`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<FeatureDataset, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) so our InconsistentRowLength check fires instead of CsvParse.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?;
        let expected_cols = header.len();
        let has_labels = header.get(1) == Some(LABEL_COLUMN);
        let first_feature = if has_labels { 2 } else { 1 };
        debug!(expected_cols, has_labels, "read CSV header");

        if expected_cols <= first_feature {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }
        let feature_names: Vec<String> = header
            .iter()
            .skip(first_feature)
            .map(String::from)
            .collect();

        let mut sample_ids = Vec::new();
        let mut labels = Vec::new();
        let mut features = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            let id = record.get(0).unwrap_or("");

            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    sample_id: id.to_string(),
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            if id.is_empty() {
                return Err(IoError::EmptySampleId {
                    path: self.path.clone(),
                    row_index,
                });
            }
            if let Some(&first_row) = seen.get(id) {
                return Err(IoError::DuplicateSampleId {
                    path: self.path.clone(),
                    sample_id: id.to_string(),
                    first_row,
                    second_row: row_index,
                });
            }
            seen.insert(id.to_string(), row_index);

            if has_labels {
                let raw = record.get(1).unwrap_or("");
                let label = match raw {
                    "0" => 0,
                    "1" => 1,
                    _ => {
                        return Err(IoError::InvalidLabel {
                            path: self.path.clone(),
                            row_index,
                            raw: raw.to_string(),
                        });
                    }
                };
                labels.push(label);
            }

            let mut row = Vec::with_capacity(feature_names.len());
            for (col_index, raw) in record.iter().skip(first_feature).enumerate() {
                match raw.parse::<f64>() {
                    Ok(value) if value.is_finite() => row.push(value),
                    _ => {
                        return Err(IoError::NonFiniteValue {
                            path: self.path.clone(),
                            row_index,
                            col_index,
                            raw: raw.to_string(),
                        });
                    }
                }
            }

            sample_ids.push(SampleId::new(id.to_string()));
            features.push(row);
        }

        if sample_ids.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(
            n_samples = sample_ids.len(),
            n_features = feature_names.len(),
            labelled = has_labels,
            "feature dataset loaded"
        );

        Ok(FeatureDataset::new(
            sample_ids,
            has_labels.then_some(labels),
            feature_names,
            features,
        ))
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_labelled_features() {
        let f = write_csv("sample_id,label,f0,f1\nA,0,0.5,1.0\nB,1,0.25,-2.0\n");
        let ds = FeatureReader::new(f.path()).read().unwrap();
        assert_eq!(ds.n_samples(), 2);
        assert_eq!(ds.n_features(), 2);
        assert_eq!(ds.feature_names(), &["f0", "f1"]);
        assert_eq!(ds.labels(), Some(&[0, 1][..]));
        assert_eq!(ds.sample_ids()[1].as_str(), "B");
        assert!((ds.features()[1][1] + 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn read_unlabelled_features() {
        let f = write_csv("sample_id,f0,f1\nA,0.5,1.0\n");
        let ds = FeatureReader::new(f.path()).read().unwrap();
        assert!(ds.labels().is_none());
        assert_eq!(ds.n_features(), 2);
    }

    #[test]
    fn missing_file_error() {
        let err = FeatureReader::new(Path::new("/nonexistent/features.csv"))
            .read()
            .unwrap_err();
        assert!(matches!(err, IoError::FileNotFound { .. }));
    }

    #[test]
    fn empty_dataset_error() {
        let f = write_csv("sample_id,label,f0\n");
        let err = FeatureReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::EmptyDataset { .. }));
    }

    #[test]
    fn label_only_header_has_no_features() {
        let f = write_csv("sample_id,label\nA,1\n");
        let err = FeatureReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::NoFeatureColumns { .. }));
    }

    #[test]
    fn invalid_label_error() {
        let f = write_csv("sample_id,label,f0\nA,2,0.1\n");
        let err = FeatureReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::InvalidLabel { row_index: 0, .. }));
    }

    #[test]
    fn duplicate_sample_id_error() {
        let f = write_csv("sample_id,f0\nA,1.0\nA,2.0\n");
        let err = FeatureReader::new(f.path()).read().unwrap_err();
        assert!(matches!(
            err,
            IoError::DuplicateSampleId { first_row: 0, second_row: 1, .. }
        ));
    }

    #[test]
    fn inconsistent_row_length_error() {
        let f = write_csv("sample_id,f0,f1\nA,1.0,2.0\nB,1.0\n");
        let err = FeatureReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::InconsistentRowLength { got: 2, .. }));
    }

    #[test]
    fn non_finite_value_error() {
        let f = write_csv("sample_id,f0,f1\nA,1.0,inf\n");
        let err = FeatureReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::NonFiniteValue { col_index: 1, .. }));
    }

    #[test]
    fn empty_sample_id_error() {
        let f = write_csv("sample_id,f0\n,1.0\n");
        let err = FeatureReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::EmptySampleId { .. }));
    }
}

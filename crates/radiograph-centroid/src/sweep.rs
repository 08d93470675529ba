//! Decision-threshold sweep over centroid scores.

use radiograph_tree::BinaryConfusion;
use tracing::{debug, instrument};

use crate::error::CentroidError;

/// Upper bound on the number of increments a sweep may take.
const MAX_STEPS: usize = 10_000_000;

/// Threshold range for [`SweepConfig::sweep`].
///
/// # Defaults
///
/// | Field | Default |
/// |---|---|
/// | `start` | -2.0 |
/// | `end` | 2.0 |
/// | `step` | 0.01 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepConfig {
    start: f64,
    end: f64,
    step: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            start: -2.0,
            end: 2.0,
            step: 0.01,
        }
    }
}

impl SweepConfig {
    /// Create a sweep with the default range.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the first and last thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`CentroidError::InvalidSweep`] when either bound is not
    /// finite, `start > end`, or the range would take more than ten million
    /// increments of the current step.
    pub fn with_range(self, start: f64, end: f64) -> Result<Self, CentroidError> {
        let next = Self { start, end, ..self };
        next.validate()?;
        Ok(next)
    }

    /// Set the increment between thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`CentroidError::InvalidSweep`] when `step` is not a positive
    /// finite number, or is so small that the range would take more than
    /// ten million increments.
    pub fn with_step(self, step: f64) -> Result<Self, CentroidError> {
        let next = Self { step, ..self };
        next.validate()?;
        Ok(next)
    }

    /// Return the first threshold.
    #[must_use]
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Return the last threshold.
    #[must_use]
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Return the increment between thresholds.
    #[must_use]
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Return the thresholds visited, in order.
    ///
    /// Computed as `start + i * step` so rounding does not accumulate.
    pub fn thresholds(&self) -> impl Iterator<Item = f64> {
        let Self { start, step, .. } = *self;
        (0..=self.n_steps()).map(move |i| start + i as f64 * step)
    }

    /// Number of increments between `start` and `end`.
    fn n_steps(&self) -> usize {
        ((self.end - self.start) / self.step).round() as usize
    }

    /// Find the threshold with the highest accuracy for `score > threshold`.
    ///
    /// Ties keep the earliest (lowest) threshold.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CentroidError::EmptyDataset`] | `scores` is empty |
    /// | [`CentroidError::LabelCountMismatch`] | `scores.len() != labels.len()` |
    #[instrument(skip(self, scores, labels), fields(n_samples = scores.len()))]
    pub fn sweep(&self, scores: &[f64], labels: &[usize]) -> Result<SweepResult, CentroidError> {
        if scores.is_empty() {
            return Err(CentroidError::EmptyDataset);
        }
        if scores.len() != labels.len() {
            return Err(CentroidError::LabelCountMismatch {
                n_samples: scores.len(),
                n_labels: labels.len(),
            });
        }

        let mut best: Option<SweepResult> = None;
        for threshold in self.thresholds() {
            let mut confusion = BinaryConfusion::default();
            for (&s, &y) in scores.iter().zip(labels) {
                confusion.record(y != 0, s > threshold);
            }
            if best
                .as_ref()
                .is_none_or(|b| confusion.accuracy() > b.confusion.accuracy())
            {
                best = Some(SweepResult {
                    threshold,
                    confusion,
                });
            }
        }

        // validate() guarantees start <= end, so at least one threshold exists.
        let best = best.ok_or(CentroidError::InvalidSweep {
            start: self.start,
            end: self.end,
            step: self.step,
        })?;
        debug!(
            threshold = best.threshold,
            accuracy = best.accuracy(),
            "threshold selected"
        );
        Ok(best)
    }

    fn validate(&self) -> Result<(), CentroidError> {
        let valid = self.start.is_finite()
            && self.end.is_finite()
            && self.start <= self.end
            && self.step.is_finite()
            && self.step > 0.0
            && ((self.end - self.start) / self.step).round() <= MAX_STEPS as f64;
        if valid {
            Ok(())
        } else {
            Err(CentroidError::InvalidSweep {
                start: self.start,
                end: self.end,
                step: self.step,
            })
        }
    }
}

/// Best threshold found by a sweep and its confusion matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepResult {
    /// Threshold with the highest accuracy.
    pub threshold: f64,
    /// Outcomes of `score > threshold` on the swept data.
    pub confusion: BinaryConfusion,
}

impl SweepResult {
    /// Accuracy at the selected threshold.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        self.confusion.accuracy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_span_four_hundred_and_one_thresholds() {
        let thresholds: Vec<f64> = SweepConfig::new().thresholds().collect();
        assert_eq!(thresholds.len(), 401);
        assert!((thresholds[0] + 2.0).abs() < 1e-12);
        assert!((thresholds[400] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn finds_separating_threshold() {
        let scores = [-1.5, -0.4, 0.3, 1.2];
        let labels = [0, 0, 1, 1];
        let result = SweepConfig::new().sweep(&scores, &labels).unwrap();
        assert!((result.accuracy() - 1.0).abs() < f64::EPSILON);
        // first threshold with score > t separating the classes is -0.4
        assert!((result.threshold + 0.4).abs() < 1e-9);
    }

    #[test]
    fn ties_keep_lowest_threshold() {
        let config = SweepConfig::new().with_range(0.0, 3.0).unwrap().with_step(1.0).unwrap();
        // every threshold predicts all-negative
        let result = config.sweep(&[-5.0, -6.0], &[0, 1]).unwrap();
        assert_eq!(result.threshold, 0.0);
        assert!((result.accuracy() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn single_threshold_range() {
        let config = SweepConfig::new().with_range(0.5, 0.5).unwrap();
        assert_eq!(config.thresholds().collect::<Vec<_>>(), vec![0.5]);
    }

    #[test]
    fn invalid_configs_rejected() {
        assert!(matches!(
            SweepConfig::new().with_step(0.0),
            Err(CentroidError::InvalidSweep { .. })
        ));
        assert!(matches!(
            SweepConfig::new().with_range(1.0, -1.0),
            Err(CentroidError::InvalidSweep { .. })
        ));
        assert!(SweepConfig::new().with_range(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn vanishing_step_is_rejected() {
        assert!(matches!(
            SweepConfig::new().with_step(1e-300),
            Err(CentroidError::InvalidSweep { .. })
        ));
        // a wide range is checked against the step already set
        assert!(SweepConfig::new().with_range(-1e300, 1e300).is_err());
        let fine = SweepConfig::new().with_range(0.0, 1.0).unwrap().with_step(1e-7).unwrap();
        assert_eq!(fine.thresholds().count(), 10_000_001);
    }

    #[test]
    fn empty_and_mismatched_inputs() {
        let config = SweepConfig::new();
        assert!(matches!(config.sweep(&[], &[]), Err(CentroidError::EmptyDataset)));
        assert!(matches!(
            config.sweep(&[0.0], &[0, 1]),
            Err(CentroidError::LabelCountMismatch { .. })
        ));
    }
}

//! Binary confusion matrix and the derived screening metrics.

use std::fmt;

use crate::error::TreeError;

/// Counts of a binary classifier's outcomes, class 1 being "positive".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinaryConfusion {
    tp: usize,
    fp: usize,
    tn: usize,
    fn_: usize,
}

impl BinaryConfusion {
    /// Build a confusion matrix from true and predicted labels.
    ///
    /// Any non-zero label counts as positive.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::EmptyDataset`] | Zero labels provided |
    /// | [`TreeError::LabelCountMismatch`] | Slices differ in length |
    pub fn from_labels(true_labels: &[usize], predicted: &[usize]) -> Result<Self, TreeError> {
        if true_labels.is_empty() {
            return Err(TreeError::EmptyDataset);
        }
        if true_labels.len() != predicted.len() {
            return Err(TreeError::LabelCountMismatch {
                n_features_rows: predicted.len(),
                n_labels: true_labels.len(),
            });
        }
        let mut cm = Self::default();
        for (&t, &p) in true_labels.iter().zip(predicted) {
            cm.record(t != 0, p != 0);
        }
        Ok(cm)
    }

    /// Add one outcome.
    pub fn record(&mut self, actual_positive: bool, predicted_positive: bool) {
        match (actual_positive, predicted_positive) {
            (true, true) => self.tp += 1,
            (false, true) => self.fp += 1,
            (false, false) => self.tn += 1,
            (true, false) => self.fn_ += 1,
        }
    }

    /// Total number of recorded outcomes.
    #[must_use]
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    /// Positives predicted positive.
    #[must_use]
    pub fn true_positives(&self) -> usize {
        self.tp
    }

    /// Negatives predicted positive.
    #[must_use]
    pub fn false_positives(&self) -> usize {
        self.fp
    }

    /// Negatives predicted negative.
    #[must_use]
    pub fn true_negatives(&self) -> usize {
        self.tn
    }

    /// Positives predicted negative.
    #[must_use]
    pub fn false_negatives(&self) -> usize {
        self.fn_
    }

    /// (TP + TN) / total. 0.0 when empty.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// TP / (TP + FP). 0.0 if nothing was predicted positive.
    #[must_use]
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// TP / (TP + FN), the sensitivity. 0.0 if there are no positives.
    #[must_use]
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// TN / (TN + FP). 0.0 if there are no negatives.
    #[must_use]
    pub fn specificity(&self) -> f64 {
        ratio(self.tn, self.tn + self.fp)
    }

    /// Harmonic mean of precision and recall. 0.0 if both are zero.
    #[must_use]
    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl fmt::Display for BinaryConfusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>20}{:>10}{:>10}", "", "pred_neg", "pred_pos")?;
        writeln!(f, "{:>20}{:>10}{:>10}", "actual_neg", self.tn, self.fp)?;
        writeln!(f, "{:>20}{:>10}{:>10}", "actual_pos", self.fn_, self.tp)
    }
}

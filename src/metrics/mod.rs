//! Per-fold classification statistics and their cross-fold aggregation
//!
//! Ratios with a zero denominator are `NaN`; aggregate means skip `NaN`.

pub mod report;

use serde::{Deserialize, Serialize};

/// Probability at or above which a row is classified as a dive
pub const DECISION_THRESHOLD: f32 = 0.5;

/// Raw confusion-matrix counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_pos: u64,
    pub false_pos: u64,
    pub false_neg: u64,
    pub true_neg: u64,
}

impl ConfusionCounts {
    pub fn new(true_pos: u64, false_pos: u64, false_neg: u64, true_neg: u64) -> Self {
        Self {
            true_pos,
            false_pos,
            false_neg,
            true_neg,
        }
    }

    /// Tally predictions against observed labels
    pub fn from_predictions(targets: &[u8], probabilities: &[f32]) -> Self {
        let mut counts = Self::default();
        for (&target, &p) in targets.iter().zip(probabilities) {
            match (target == 1, p >= DECISION_THRESHOLD) {
                (true, true) => counts.true_pos += 1,
                (false, true) => counts.false_pos += 1,
                (true, false) => counts.false_neg += 1,
                (false, false) => counts.true_neg += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> u64 {
        self.true_pos + self.false_pos + self.false_neg + self.true_neg
    }

    /// Element-wise sum
    pub fn add(&self, other: &Self) -> Self {
        Self {
            true_pos: self.true_pos + other.true_pos,
            false_pos: self.false_pos + other.false_pos,
            false_neg: self.false_neg + other.false_neg,
            true_neg: self.true_neg + other.true_neg,
        }
    }

    /// `[TP, FP, FN, TN]` as percentages of the total
    pub fn percentages(&self) -> [f64; 4] {
        let total = self.total() as f64;
        [self.true_pos, self.false_pos, self.false_neg, self.true_neg]
            .map(|c| ratio(c as f64 * 100.0, total))
    }

    pub fn accuracy(&self) -> f64 {
        ratio((self.true_pos + self.true_neg) as f64, self.total() as f64)
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_pos as f64, (self.true_pos + self.false_pos) as f64)
    }

    pub fn sensitivity(&self) -> f64 {
        ratio(self.true_pos as f64, (self.true_pos + self.false_neg) as f64)
    }

    pub fn specificity(&self) -> f64 {
        ratio(self.true_neg as f64, (self.true_neg + self.false_pos) as f64)
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

/// Area under the ROC curve
///
/// Trapezoidal integration over the distinct score thresholds; tied scores
/// move the curve diagonally. `NaN` when only one class is present.
pub fn roc_auc(targets: &[u8], probabilities: &[f32]) -> f64 {
    let positives = targets.iter().filter(|&&t| t == 1).count() as f64;
    let negatives = targets.len() as f64 - positives;
    if positives == 0.0 || negatives == 0.0 {
        return f64::NAN;
    }

    let mut scored: Vec<(f32, u8)> = probabilities
        .iter()
        .copied()
        .zip(targets.iter().copied())
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let (mut tp, mut fp) = (0.0f64, 0.0f64);
    let (mut prev_tpr, mut prev_fpr) = (0.0f64, 0.0f64);
    let mut area = 0.0;

    let mut i = 0;
    while i < scored.len() {
        let score = scored[i].0;
        while i < scored.len() && scored[i].0 == score {
            if scored[i].1 == 1 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            i += 1;
        }
        let tpr = tp / positives;
        let fpr = fp / negatives;
        area += (fpr - prev_fpr) * (tpr + prev_tpr) / 2.0;
        prev_tpr = tpr;
        prev_fpr = fpr;
    }

    area
}

/// Statistics for one held-out subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldMetrics {
    pub subject: String,
    pub accuracy: f64,
    pub auc: f64,
    pub precision: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub confusion: ConfusionCounts,
}

impl FoldMetrics {
    /// Score held-out predictions
    pub fn evaluate(subject: &str, targets: &[u8], probabilities: &[f32]) -> Self {
        let confusion = ConfusionCounts::from_predictions(targets, probabilities);
        Self {
            subject: subject.to_string(),
            accuracy: confusion.accuracy(),
            auc: roc_auc(targets, probabilities),
            precision: confusion.precision(),
            sensitivity: confusion.sensitivity(),
            specificity: confusion.specificity(),
            confusion,
        }
    }

    /// The five scalar statistics in table order
    pub fn scalars(&self) -> [f64; 5] {
        [
            self.accuracy,
            self.auc,
            self.precision,
            self.sensitivity,
            self.specificity,
        ]
    }
}

/// One row of the cross-window comparison table
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSummary {
    /// Window token as it appears in file names
    pub window: String,
    /// Numeric window size for ordering
    pub size: u64,
    /// Mean accuracy, AUC, precision, sensitivity, specificity
    pub means: [f64; 5],
    /// Pooled `[TP, FP, FN, TN]` percentages
    pub pooled: [f64; 4],
    /// Number of folds aggregated
    pub folds: usize,
}

impl WindowSummary {
    /// Aggregate the folds of one window
    ///
    /// Scalars are averaged across folds; confusion counts are summed first
    /// and normalised once, so large folds weigh more than small ones.
    pub fn aggregate(window: &str, size: u64, folds: &[FoldMetrics]) -> Self {
        let mut means = [0.0; 5];
        for (k, mean) in means.iter_mut().enumerate() {
            *mean = nan_mean(folds.iter().map(|f| f.scalars()[k]));
        }

        let pooled = folds
            .iter()
            .fold(ConfusionCounts::default(), |acc, f| acc.add(&f.confusion))
            .percentages();

        Self {
            window: window.to_string(),
            size,
            means,
            pooled,
            folds: folds.len(),
        }
    }
}

/// Mean over the non-NaN values, `NaN` if there are none
pub fn nan_mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, n) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(subject: &str, counts: ConfusionCounts) -> FoldMetrics {
        FoldMetrics {
            subject: subject.to_string(),
            accuracy: counts.accuracy(),
            auc: 0.5,
            precision: counts.precision(),
            sensitivity: counts.sensitivity(),
            specificity: counts.specificity(),
            confusion: counts,
        }
    }

    #[test]
    fn test_confusion_from_predictions() {
        let targets = [1, 1, 0, 0, 1];
        let probs = [0.9, 0.2, 0.7, 0.1, 0.5];
        let c = ConfusionCounts::from_predictions(&targets, &probs);
        assert_eq!(c, ConfusionCounts::new(2, 1, 1, 1));
        assert_eq!(c.total(), 5);
        assert!((c.accuracy() - 0.6).abs() < 1e-12);
        assert!((c.precision() - 2.0 / 3.0).abs() < 1e-12);
        assert!((c.sensitivity() - 2.0 / 3.0).abs() < 1e-12);
        assert!((c.specificity() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_fold_percentages_sum_to_100() {
        for counts in [
            ConfusionCounts::new(8, 1, 1, 0),
            ConfusionCounts::new(2, 4, 3, 1),
            ConfusionCounts::new(0, 0, 7, 13),
            ConfusionCounts::new(1, 1, 1, 1),
        ] {
            let sum: f64 = counts.percentages().iter().sum();
            assert!((sum - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_total_is_nan() {
        let empty = ConfusionCounts::default();
        assert!(empty.percentages().iter().all(|p| p.is_nan()));
        assert!(empty.accuracy().is_nan());
    }

    #[test]
    fn test_pooled_confusion_is_sum_then_normalise() {
        let folds = vec![
            fold("A", ConfusionCounts::new(8, 1, 1, 0)),
            fold("B", ConfusionCounts::new(2, 4, 3, 1)),
        ];
        let summary = WindowSummary::aggregate("5", 5, &folds);
        for (got, want) in summary.pooled.iter().zip([50.0, 25.0, 20.0, 5.0]) {
            assert!((got - want).abs() < 1e-9);
        }

        // with unequal fold sizes pooling differs from averaging percentages
        let folds = vec![
            fold("A", ConfusionCounts::new(8, 1, 1, 0)),
            fold("B", ConfusionCounts::new(4, 8, 6, 2)),
        ];
        let summary = WindowSummary::aggregate("5", 5, &folds);
        let a = folds[0].confusion.percentages();
        let b = folds[1].confusion.percentages();
        let naive: Vec<f64> = a.iter().zip(&b).map(|(x, y)| (x + y) / 2.0).collect();
        assert!((summary.pooled[0] - 40.0).abs() < 1e-9);
        assert!((summary.pooled[0] - naive[0]).abs() > 1.0);
    }

    #[test]
    fn test_summary_means_skip_nan() {
        let mut a = fold("A", ConfusionCounts::new(0, 0, 0, 10));
        a.auc = f64::NAN;
        let mut b = fold("B", ConfusionCounts::new(5, 0, 0, 5));
        b.auc = 0.8;
        let summary = WindowSummary::aggregate("5", 5, &[a, b]);
        assert!((summary.means[1] - 0.8).abs() < 1e-12);
        // precision undefined for A, 1.0 for B
        assert!((summary.means[2] - 1.0).abs() < 1e-12);
        assert_eq!(summary.folds, 2);
    }

    #[test]
    fn test_roc_auc() {
        assert_eq!(roc_auc(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]), 1.0);
        assert_eq!(roc_auc(&[1, 1, 0, 0], &[0.1, 0.2, 0.8, 0.9]), 0.0);
        assert!((roc_auc(&[0, 1, 0, 1], &[0.5, 0.5, 0.5, 0.5]) - 0.5).abs() < 1e-12);
        assert!((roc_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]) - 0.75).abs() < 1e-12);
        assert!(roc_auc(&[1, 1], &[0.3, 0.9]).is_nan());
    }

    #[test]
    fn test_nan_mean() {
        assert_eq!(nan_mean(vec![1.0, f64::NAN, 3.0]), 2.0);
        assert!(nan_mean(vec![f64::NAN]).is_nan());
        assert!(nan_mean(Vec::<f64>::new()).is_nan());
    }
}

//! Metric math for regression and classification evaluation
//!
//! All functions are total: empty input yields zeroed metrics and
//! zero-denominator classes contribute 0 to macro averages, never NaN.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Exact match rate
    pub accuracy: f64,
    /// Macro-averaged over all classes
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// Compute MSE, MAE, RMSE and R^2 over (actual, predicted) pairs
pub fn regression_metrics(pairs: &[(f64, f64)]) -> RegressionMetrics {
    if pairs.is_empty() {
        return RegressionMetrics::default();
    }
    let n = pairs.len() as f64;
    let mse = pairs.iter().map(|(a, p)| (a - p).powi(2)).sum::<f64>() / n;
    let mae = pairs.iter().map(|(a, p)| (a - p).abs()).sum::<f64>() / n;

    let mean = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let ss_res: f64 = pairs.iter().map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = pairs.iter().map(|(a, _)| (a - mean).powi(2)).sum();
    let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    RegressionMetrics {
        mse,
        mae,
        rmse: mse.sqrt(),
        r2,
    }
}

/// Compute accuracy and macro precision/recall/F1 from (actual, predicted)
/// class-index pairs over `classes` classes.
pub fn classification_metrics(pairs: &[(usize, usize)], classes: usize) -> ClassificationMetrics {
    if pairs.is_empty() || classes == 0 {
        return ClassificationMetrics::default();
    }

    let mut confusion = vec![vec![0usize; classes]; classes];
    let mut correct = 0usize;
    for &(actual, predicted) in pairs {
        if actual >= classes || predicted >= classes {
            continue;
        }
        confusion[actual][predicted] += 1;
        if actual == predicted {
            correct += 1;
        }
    }

    let mut precision_sum = 0.0;
    let mut recall_sum = 0.0;
    let mut f1_sum = 0.0;
    for class in 0..classes {
        let tp = confusion[class][class] as f64;
        let predicted_total: f64 = (0..classes).map(|a| confusion[a][class] as f64).sum();
        let actual_total: f64 = confusion[class].iter().map(|&v| v as f64).sum();

        let precision = if predicted_total > 0.0 { tp / predicted_total } else { 0.0 };
        let recall = if actual_total > 0.0 { tp / actual_total } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        precision_sum += precision;
        recall_sum += recall;
        f1_sum += f1;
    }

    let k = classes as f64;
    ClassificationMetrics {
        accuracy: correct as f64 / pairs.len() as f64,
        precision: precision_sum / k,
        recall: recall_sum / k,
        f1_score: f1_sum / k,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regression_perfect_fit() {
        let pairs = vec![(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)];
        let m = regression_metrics(&pairs);
        assert_eq!(m.mse, 0.0);
        assert_eq!(m.mae, 0.0);
        assert!((m.r2 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_regression_known_values() {
        let pairs = vec![(0.0, 1.0), (2.0, 1.0)];
        let m = regression_metrics(&pairs);
        assert!((m.mse - 1.0).abs() < 1e-12);
        assert!((m.mae - 1.0).abs() < 1e-12);
        assert!((m.rmse - 1.0).abs() < 1e-12);
        // Predicting the mean exactly: ss_res == ss_tot
        assert!(m.r2.abs() < 1e-12);
    }

    #[test]
    fn test_regression_empty_is_zeroed() {
        assert_eq!(regression_metrics(&[]), RegressionMetrics::default());
    }

    #[test]
    fn test_regression_constant_actuals_r2_is_zero() {
        let pairs = vec![(2.0, 2.5), (2.0, 1.5)];
        let m = regression_metrics(&pairs);
        assert_eq!(m.r2, 0.0);
    }

    #[test]
    fn test_classification_perfect() {
        let pairs = vec![(0, 0), (1, 1), (2, 2)];
        let m = classification_metrics(&pairs, 3);
        assert!((m.accuracy - 1.0).abs() < 1e-12);
        assert!((m.precision - 1.0).abs() < 1e-12);
        assert!((m.recall - 1.0).abs() < 1e-12);
        assert!((m.f1_score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_classification_unpredicted_class_contributes_zero() {
        // Class 2 never occurs and is never predicted: its precision and
        // recall must enter the macro average as 0, not NaN.
        let pairs = vec![(0, 0), (0, 1), (1, 1), (1, 1)];
        let m = classification_metrics(&pairs, 3);
        assert!(m.precision.is_finite());
        assert!(m.recall.is_finite());
        assert!(m.f1_score.is_finite());
        assert!((m.accuracy - 0.75).abs() < 1e-12);
        // precision: class0 = 1/1, class1 = 2/3, class2 = 0
        assert!((m.precision - (1.0 + 2.0 / 3.0) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_classification_empty_is_zeroed() {
        assert_eq!(classification_metrics(&[], 5), ClassificationMetrics::default());
    }

    #[test]
    fn test_classification_out_of_range_pairs_ignored() {
        let pairs = vec![(0, 0), (9, 9)];
        let m = classification_metrics(&pairs, 2);
        // Only the valid pair lands in the confusion matrix; accuracy is
        // still computed over submitted pairs.
        assert!((m.accuracy - 0.5).abs() < 1e-12);
    }
}

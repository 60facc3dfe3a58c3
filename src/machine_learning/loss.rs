//! Error metrics over raw classifier outputs
//!
//! The metrics compare expectation values in [-1, 1] directly with labels in
//! {-1, +1}; no thresholding is applied before the comparison.

/// Trait for error metrics minimised during training
pub trait ErrorMetric {
    /// Calculate the error between raw outputs and true labels
    fn calculate_error(&self, predictions: &[f64], labels: &[f64]) -> f64;
}

impl<F> ErrorMetric for F
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    fn calculate_error(&self, predictions: &[f64], labels: &[f64]) -> f64 {
        self(predictions, labels)
    }
}

/// Mean Squared Error
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError;

impl ErrorMetric for MeanSquaredError {
    fn calculate_error(&self, predictions: &[f64], labels: &[f64]) -> f64 {
        if predictions.is_empty() {
            return 0.0;
        }

        let squared: f64 = predictions
            .iter()
            .zip(labels)
            .map(|(p, t)| (p - t) * (p - t))
            .sum();
        squared / predictions.len() as f64
    }
}

/// Mean Absolute Error
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAbsoluteError;

impl ErrorMetric for MeanAbsoluteError {
    fn calculate_error(&self, predictions: &[f64], labels: &[f64]) -> f64 {
        if predictions.is_empty() {
            return 0.0;
        }

        let absolute: f64 = predictions.iter().zip(labels).map(|(p, t)| (p - t).abs()).sum();
        absolute / predictions.len() as f64
    }
}

/// Cross-entropy for {-1, +1} labels.
///
/// An expectation `e` is read as the probability `(1 + e) / 2` of the
/// positive class.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCrossEntropy;

impl ErrorMetric for BinaryCrossEntropy {
    fn calculate_error(&self, predictions: &[f64], labels: &[f64]) -> f64 {
        if predictions.is_empty() {
            return 0.0;
        }

        let mut loss = 0.0;
        for (e, t) in predictions.iter().zip(labels) {
            // Clip predictions to avoid numerical issues
            let p = ((1.0 + e) / 2.0).max(1e-15).min(1.0 - 1e-15);
            let y = (1.0 + t) / 2.0;
            loss -= y * p.ln() + (1.0 - y) * (1.0 - p).ln();
        }

        loss / predictions.len() as f64
    }
}

//! Core types shared by the classifiers: errors, the positional train/test
//! split and scoring helpers.

use ndarray::{s, Array2, ArrayView2};
use thiserror::Error;

/// Errors that can occur while building, training or scoring a classifier
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Circuit construction or simulation failed
    #[error("Circuit error: {0}")]
    Circuit(String),

    /// The embedding rejected a feature vector
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Dimensionality mismatch in input or output data
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Training ratio outside the open interval (0, 1)
    #[error("Training ratio must lie strictly between 0 and 1, got {0}")]
    InvalidTrainingRatio(f64),

    /// A label outside the set the classifier accepts
    #[error("Invalid label {label} at index {index}: {reason}")]
    InvalidLabel {
        index: usize,
        label: f64,
        reason: String,
    },

    /// Parameter slice too short for the circuit topology
    #[error("Expected at least {expected} parameters, got {actual}")]
    ParameterCount {
        expected: usize,
        actual: usize,
    },

    /// The split left one of the partitions without samples
    #[error("The {0} partition is empty")]
    EmptyPartition(&'static str),

    /// The optimizer asked for more cost evaluations than there are batches
    #[error("Optimizer requested {requested} cost evaluations but only {available} batches exist")]
    BatchesExhausted {
        requested: usize,
        available: usize,
    },

    /// The classical solver failed to fit or predict
    #[error("Solver error: {0}")]
    Solver(String),

    /// Dataset loading or manipulation failed
    #[error("Dataset error: {0}")]
    Dataset(String),
}

/// Sign of a classifier output; exact zero stays zero
pub fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Fraction of predictions equal to their label
pub fn accuracy_score<T: PartialEq>(predictions: &[T], labels: &[T]) -> Result<f64, ModelError> {
    if predictions.len() != labels.len() {
        return Err(ModelError::DimensionMismatch(format!(
            "{} predictions for {} labels",
            predictions.len(),
            labels.len()
        )));
    }

    if labels.is_empty() {
        return Err(ModelError::EmptyPartition("test"));
    }

    let correct = predictions
        .iter()
        .zip(labels)
        .filter(|(p, l)| p == l)
        .count();

    Ok(correct as f64 / labels.len() as f64)
}

/// Number of leading samples used for training
pub fn training_count(total: usize, training_ratio: f64) -> Result<usize, ModelError> {
    if !(training_ratio > 0.0 && training_ratio < 1.0) {
        return Err(ModelError::InvalidTrainingRatio(training_ratio));
    }

    Ok((training_ratio * total as f64).floor() as usize)
}

/// A positional split of features and labels
#[derive(Debug, Clone)]
pub struct TrainTestSplit<'a, L> {
    pub train_features: ArrayView2<'a, f64>,
    pub train_labels: &'a [L],
    pub test_features: ArrayView2<'a, f64>,
    pub test_labels: &'a [L],
}

impl<'a, L> TrainTestSplit<'a, L> {
    /// Number of training samples
    pub fn training_count(&self) -> usize {
        self.train_labels.len()
    }
}

/// Split rows positionally: the first `floor(ratio * len)` train, the rest test.
///
/// Both partitions must be non-empty.
pub fn train_test_split<'a, L>(
    features: &'a Array2<f64>,
    labels: &'a [L],
    training_ratio: f64,
) -> Result<TrainTestSplit<'a, L>, ModelError> {
    if features.nrows() != labels.len() {
        return Err(ModelError::DimensionMismatch(format!(
            "{} feature rows but {} labels",
            features.nrows(),
            labels.len()
        )));
    }

    let split = training_count(labels.len(), training_ratio)?;
    if split == 0 {
        return Err(ModelError::EmptyPartition("training"));
    }
    if split == labels.len() {
        return Err(ModelError::EmptyPartition("test"));
    }

    Ok(TrainTestSplit {
        train_features: features.slice(s![..split, ..]),
        train_labels: &labels[..split],
        test_features: features.slice(s![split.., ..]),
        test_labels: &labels[split..],
    })
}

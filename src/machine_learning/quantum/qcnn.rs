//! Quantum convolutional neural network classifier
//!
//! The network alternates convolution layers (parametrized Ry rotations and
//! CNOT interactions among the active qubits) with pooling layers that fold
//! the upper half of the active register onto the lower half, until a single
//! qubit remains. The prediction is the sign of ⟨Z⟩ on qubit 0.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::machine_learning::core::{accuracy_score, sign, train_test_split, ModelError};
use crate::machine_learning::loss::ErrorMetric;
use crate::machine_learning::optimizer::Optimizer;
use crate::quantum::circuit::{CircuitBuilder, QuantumCircuit};
use crate::quantum::embedding::Embedding;
use crate::simulators::statevector::StatevectorSimulator;

/// Scale of the initial normal draws
const INITIAL_PARAMETER_SCALE: f64 = 0.5;

/// Active register sizes visited by the network: `n, ceil(n/2), ..., 1`
pub fn qubit_trajectory(num_qubits: usize) -> Vec<usize> {
    let mut trajectory = vec![num_qubits];
    let mut size = num_qubits;
    while size > 1 {
        size = (size + 1) / 2;
        trajectory.push(size);
    }
    trajectory
}

/// Number of rotation angles consumed by a network on `num_qubits` qubits.
///
/// Every layer of size `s` is counted as `2s`, except the two-qubit layer
/// which only uses 2; each trajectory from `n >= 2` visits size 2 exactly
/// once, hence the single correction.
pub fn parameter_count(num_qubits: usize) -> usize {
    let mut count = 0;
    let mut size = num_qubits;
    while size > 1 {
        count += 2 * size;
        size = (size + 1) / 2;
    }
    count.saturating_sub(2)
}

/// Append one convolution layer on the first `size` qubits and return the
/// number of parameters it consumed.
pub fn convolution(builder: &mut CircuitBuilder, size: usize, params: &[f64]) -> Result<usize, String> {
    let needed = if size == 2 { 2 } else { 2 * size };
    if params.len() < needed {
        return Err(format!(
            "Convolution on {} qubits needs {} parameters, got {}",
            size,
            needed,
            params.len()
        ));
    }

    if size == 2 {
        builder.ry(0, params[0])?;
        builder.ry(1, params[1])?;
        builder.cnot(0, 1)?;
        return Ok(2);
    }

    let target_offset = size.saturating_sub(3).max(1);
    let mut used = 0;
    for i in 0..size {
        let target = (i + target_offset) % size;
        builder.ry(i, params[used])?;
        builder.ry(target, params[used + 1])?;
        builder.cnot(i, target)?;
        used += 2;
    }

    Ok(used)
}

/// Fold the upper half of the active register onto the lower half and
/// return the new active size `ceil(old_size / 2)`.
pub fn pool(builder: &mut CircuitBuilder, old_size: usize) -> Result<usize, String> {
    let new_size = (old_size + 1) / 2;
    for i in new_size..old_size {
        builder.cnot(i, old_size - i - 1)?;
    }
    Ok(new_size)
}

/// Build the full network circuit for one feature vector.
///
/// The embedding prepares the data on all qubits; convolution and pooling
/// then alternate until one qubit is active.
pub fn generate_qcnn_circuit(
    embedding: &dyn Embedding,
    num_qubits: usize,
    features: &[f64],
    params: &[f64],
) -> Result<QuantumCircuit, ModelError> {
    let expected = parameter_count(num_qubits);
    if params.len() < expected {
        return Err(ModelError::ParameterCount {
            expected,
            actual: params.len(),
        });
    }

    let mut builder = CircuitBuilder::new(num_qubits);
    embedding
        .embed(&mut builder, features)
        .map_err(ModelError::Embedding)?;

    let mut used = 0;
    let mut size = num_qubits;
    while size > 1 {
        used += convolution(&mut builder, size, &params[used..]).map_err(ModelError::Circuit)?;
        size = pool(&mut builder, size).map_err(ModelError::Circuit)?;
    }
    debug_assert_eq!(used, expected);

    Ok(builder.build())
}

/// Check that every label is -1 or +1
fn validate_signed_labels(labels: &[f64]) -> Result<(), ModelError> {
    for (index, &label) in labels.iter().enumerate() {
        if label != 1.0 && label != -1.0 {
            return Err(ModelError::InvalidLabel {
                index,
                label,
                reason: "labels must be -1 or +1".to_string(),
            });
        }
    }
    Ok(())
}

/// Hands out consecutive, non-overlapping batches of the training partition.
///
/// The position advances on every call and is never reset, so an optimizer
/// sees each batch at most once. The trailing `len % num_batches` samples
/// are never used.
#[derive(Debug)]
pub struct BatchCursor {
    batch_len: usize,
    num_batches: usize,
    position: Cell<usize>,
}

impl BatchCursor {
    pub fn new(training_len: usize, num_batches: usize) -> Result<Self, ModelError> {
        if num_batches == 0 {
            return Err(ModelError::DimensionMismatch("num_batches must be positive".to_string()));
        }

        let batch_len = training_len / num_batches;
        if batch_len == 0 {
            return Err(ModelError::EmptyPartition("batch"));
        }

        Ok(BatchCursor {
            batch_len,
            num_batches,
            position: Cell::new(0),
        })
    }

    /// Samples per batch
    pub fn batch_len(&self) -> usize {
        self.batch_len
    }

    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    /// Number of batches handed out or requested so far
    pub fn requested(&self) -> usize {
        self.position.get()
    }

    /// Row range of the next batch, or `None` once all batches are used.
    ///
    /// Requests past the end are still counted.
    pub fn next_range(&self) -> Option<std::ops::Range<usize>> {
        let k = self.position.get();
        self.position.set(k + 1);
        if k < self.num_batches {
            Some(k * self.batch_len..(k + 1) * self.batch_len)
        } else {
            None
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.position.get() > self.num_batches
    }
}

/// Outcome of a QCNN run on the test partition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QcnnReport {
    /// Fraction of correctly predicted test labels
    pub accuracy: f64,
    /// `sign(⟨Z⟩)` per test sample; 0 for an exactly zero expectation
    pub predictions: Vec<f64>,
    /// Test indices whose expectation was exactly zero
    pub invalid_predictions: Vec<usize>,
    /// Number of samples used for training
    pub training_count: usize,
}

/// Quantum convolutional neural network binary classifier
pub struct QcnnClassifier {
    embedding: Arc<dyn Embedding>,
    num_qubits: usize,
    params: Vec<f64>,
}

impl fmt::Debug for QcnnClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QcnnClassifier")
            .field("embedding", &self.embedding.name())
            .field("num_qubits", &self.num_qubits)
            .field("params", &self.params)
            .finish()
    }
}

impl QcnnClassifier {
    /// Creates a classifier with randomly drawn initial parameters
    pub fn new(embedding: Arc<dyn Embedding>, num_qubits: usize) -> Result<Self, ModelError> {
        Self::with_rng(embedding, num_qubits, &mut StdRng::from_entropy())
    }

    /// Creates a classifier drawing its initial parameters from `rng`
    pub fn with_rng<R: Rng>(
        embedding: Arc<dyn Embedding>,
        num_qubits: usize,
        rng: &mut R,
    ) -> Result<Self, ModelError> {
        if num_qubits < 2 {
            return Err(ModelError::DimensionMismatch(format!(
                "A QCNN needs at least 2 qubits, got {}",
                num_qubits
            )));
        }

        let params = (0..parameter_count(num_qubits))
            .map(|_| INITIAL_PARAMETER_SCALE * rng.sample::<f64, _>(StandardNormal))
            .collect();

        Ok(QcnnClassifier {
            embedding,
            num_qubits,
            params,
        })
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn num_parameters(&self) -> usize {
        self.params.len()
    }

    /// Current circuit parameters
    pub fn parameters(&self) -> &[f64] {
        &self.params
    }

    pub fn set_parameters(&mut self, params: &[f64]) -> Result<(), ModelError> {
        if params.len() != self.params.len() {
            return Err(ModelError::ParameterCount {
                expected: self.params.len(),
                actual: params.len(),
            });
        }
        self.params.copy_from_slice(params);
        Ok(())
    }

    /// Network circuit for `features` with the given parameters
    pub fn circuit(&self, features: &[f64], params: &[f64]) -> Result<QuantumCircuit, ModelError> {
        generate_qcnn_circuit(self.embedding.as_ref(), self.num_qubits, features, params)
    }

    /// ⟨Z⟩ on qubit 0 for `features` under `params`
    pub fn evaluate(&self, features: &[f64], params: &[f64]) -> Result<f64, ModelError> {
        let circuit = self.circuit(features, params)?;
        let mut simulator = StatevectorSimulator::new(self.num_qubits);
        simulator.run_circuit(&circuit).map_err(ModelError::Circuit)?;
        simulator.expectation_z(0).map_err(ModelError::Circuit)
    }

    /// Expectations for every row of `features`
    fn evaluate_rows(&self, features: ArrayView2<f64>, params: &[f64]) -> Result<Vec<f64>, ModelError> {
        (0..features.nrows())
            .into_par_iter()
            .map(|i| self.evaluate(&features.row(i).to_vec(), params))
            .collect()
    }

    /// Predicted label for `features` under the current parameters
    pub fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        Ok(sign(self.evaluate(features, &self.params)?))
    }

    /// Train on all leading `training_ratio` samples at every cost evaluation
    pub fn run<O, E>(
        &mut self,
        features: &Array2<f64>,
        labels: &[f64],
        optimizer: &O,
        error: &E,
        training_ratio: f64,
    ) -> Result<QcnnReport, ModelError>
    where
        O: Optimizer + ?Sized,
        E: ErrorMetric + ?Sized,
    {
        validate_signed_labels(labels)?;
        let split = train_test_split(features, labels, training_ratio)?;
        info!(
            embedding = self.embedding.name(),
            parameters = self.params.len(),
            training = split.training_count(),
            "training QCNN"
        );

        let mut failure: Option<ModelError> = None;
        let mut evaluations = 0usize;
        let mut cost = |params: &[f64]| -> f64 {
            evaluations += 1;
            match self.evaluate_rows(split.train_features, params) {
                Ok(outputs) => error.calculate_error(&outputs, split.train_labels),
                Err(e) => {
                    failure.get_or_insert(e);
                    f64::NAN
                }
            }
        };

        let optimized = optimizer.minimize(&mut cost, &self.params);
        if let Some(e) = failure {
            return Err(e);
        }
        debug!(evaluations, "QCNN optimization finished");

        self.set_parameters(&optimized)?;
        self.score_test(split.test_features, split.test_labels, split.training_count())
    }

    /// Train with one fresh batch of the training partition per cost evaluation.
    ///
    /// The optimizer must not evaluate the cost more than `num_batches` times.
    pub fn run_batched<O, E>(
        &mut self,
        features: &Array2<f64>,
        labels: &[f64],
        optimizer: &O,
        error: &E,
        num_batches: usize,
        training_ratio: f64,
    ) -> Result<QcnnReport, ModelError>
    where
        O: Optimizer + ?Sized,
        E: ErrorMetric + ?Sized,
    {
        validate_signed_labels(labels)?;
        let split = train_test_split(features, labels, training_ratio)?;
        let cursor = BatchCursor::new(split.training_count(), num_batches)?;
        info!(
            embedding = self.embedding.name(),
            parameters = self.params.len(),
            batches = num_batches,
            batch_len = cursor.batch_len(),
            "training QCNN in batches"
        );

        let mut failure: Option<ModelError> = None;
        let mut cost = |params: &[f64]| -> f64 {
            let range = match cursor.next_range() {
                Some(range) => range,
                None => {
                    warn!(
                        requested = cursor.requested(),
                        available = cursor.num_batches(),
                        "optimizer requested more batches than available"
                    );
                    return f64::NAN;
                }
            };

            let batch = split.train_features.slice(ndarray::s![range.clone(), ..]);
            match self.evaluate_rows(batch, params) {
                Ok(outputs) => error.calculate_error(&outputs, &split.train_labels[range]),
                Err(e) => {
                    failure.get_or_insert(e);
                    f64::NAN
                }
            }
        };

        let optimized = optimizer.minimize(&mut cost, &self.params);
        if let Some(e) = failure {
            return Err(e);
        }
        if cursor.is_exhausted() {
            return Err(ModelError::BatchesExhausted {
                requested: cursor.requested(),
                available: cursor.num_batches(),
            });
        }
        debug!(batches_used = cursor.requested(), "QCNN batched optimization finished");

        self.set_parameters(&optimized)?;
        self.score_test(split.test_features, split.test_labels, split.training_count())
    }

    fn score_test(
        &self,
        features: ArrayView2<f64>,
        labels: &[f64],
        training_count: usize,
    ) -> Result<QcnnReport, ModelError> {
        let outputs = self.evaluate_rows(features, &self.params)?;
        let predictions: Vec<f64> = outputs.iter().map(|&e| sign(e)).collect();
        let invalid_predictions: Vec<usize> = predictions
            .iter()
            .enumerate()
            .filter(|(_, &p)| p == 0.0)
            .map(|(i, _)| i)
            .collect();
        if !invalid_predictions.is_empty() {
            warn!(count = invalid_predictions.len(), "exactly zero expectation values in test predictions");
        }

        let accuracy = accuracy_score(&predictions, labels)?;
        info!(accuracy, "QCNN finished");

        Ok(QcnnReport {
            accuracy,
            predictions,
            invalid_predictions,
            training_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantum::embedding::AngleEmbedding;

    fn consumed(num_qubits: usize) -> usize {
        let mut builder = CircuitBuilder::new(num_qubits);
        let params = vec![0.0; 4 * num_qubits];
        let mut used = 0;
        let mut size = num_qubits;
        while size > 1 {
            used += convolution(&mut builder, size, &params[used..]).unwrap();
            size = pool(&mut builder, size).unwrap();
        }
        used
    }

    #[test]
    fn test_parameter_count_values() {
        assert_eq!(parameter_count(2), 2);
        assert_eq!(parameter_count(3), 8);
        assert_eq!(parameter_count(4), 10);
        assert_eq!(parameter_count(5), 18);
        assert_eq!(parameter_count(8), 26);
    }

    #[test]
    fn test_parameter_count_matches_consumption() {
        for n in [2, 3, 4, 5, 8, 16] {
            assert_eq!(parameter_count(n), consumed(n), "n = {}", n);
        }
    }

    #[test]
    fn test_trajectory() {
        assert_eq!(qubit_trajectory(5), vec![5, 3, 2, 1]);
        assert_eq!(qubit_trajectory(8), vec![8, 4, 2, 1]);
        assert_eq!(qubit_trajectory(1), vec![1]);
    }

    #[test]
    fn test_convolution_targets() {
        let mut builder = CircuitBuilder::new(5);
        convolution(&mut builder, 5, &[0.1; 10]).unwrap();
        let cnots: Vec<Vec<usize>> = builder
            .build()
            .operations()
            .into_iter()
            .filter(|(name, _)| name == "CNOT")
            .map(|(_, qubits)| qubits)
            .collect();
        assert_eq!(cnots, vec![vec![0, 2], vec![1, 3], vec![2, 4], vec![3, 0], vec![4, 1]]);
    }

    #[test]
    fn test_pool_pairs() {
        let mut builder = CircuitBuilder::new(5);
        assert_eq!(pool(&mut builder, 5).unwrap(), 3);
        let pairs: Vec<Vec<usize>> = builder.build().operations().into_iter().map(|(_, q)| q).collect();
        assert_eq!(pairs, vec![vec![3, 1], vec![4, 0]]);
    }

    #[test]
    fn test_batch_cursor_drops_remainder() {
        let cursor = BatchCursor::new(23, 4).unwrap();
        assert_eq!(cursor.batch_len(), 5);
        assert_eq!(cursor.next_range(), Some(0..5));
        assert_eq!(cursor.next_range(), Some(5..10));
        assert_eq!(cursor.next_range(), Some(10..15));
        assert_eq!(cursor.next_range(), Some(15..20));
        assert!(!cursor.is_exhausted());
        assert_eq!(cursor.next_range(), None);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_rejects_single_qubit() {
        let embedding = Arc::new(AngleEmbedding::default());
        assert!(QcnnClassifier::new(embedding, 1).is_err());
    }
}

//! Quantum kernel classification
//!
//! The kernel between two feature vectors is the probability of measuring
//! |0...0⟩ after embedding the first vector and un-embedding the second,
//! i.e. the fidelity of the two embedded states.

use std::fmt;
use std::sync::Arc;

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::machine_learning::core::{accuracy_score, train_test_split, ModelError};
use crate::machine_learning::quantum::svm::{KernelClassifier, KernelFunction, SupportVectorClassifier};
use crate::quantum::circuit::{CircuitBuilder, QuantumCircuit};
use crate::quantum::embedding::Embedding;
use crate::simulators::statevector::StatevectorSimulator;

/// Fidelity kernel induced by an embedding
#[derive(Clone)]
pub struct QuantumKernel {
    embedding: Arc<dyn Embedding>,
    num_qubits: usize,
}

impl fmt::Debug for QuantumKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuantumKernel")
            .field("embedding", &self.embedding.name())
            .field("num_qubits", &self.num_qubits)
            .finish()
    }
}

impl QuantumKernel {
    /// Creates a kernel embedding onto `num_qubits` qubits
    pub fn new(embedding: Arc<dyn Embedding>, num_qubits: usize) -> Self {
        QuantumKernel { embedding, num_qubits }
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Embedding circuit of a single feature vector
    pub fn embedding_circuit(&self, features: &[f64]) -> Result<QuantumCircuit, ModelError> {
        let mut builder = CircuitBuilder::new(self.num_qubits);
        self.embedding
            .embed(&mut builder, features)
            .map_err(ModelError::Embedding)?;
        Ok(builder.build())
    }

    /// Embedding of `a` followed by the inverse embedding of `b`
    pub fn kernel_circuit(&self, a: &[f64], b: &[f64]) -> Result<QuantumCircuit, ModelError> {
        let mut circuit = self.embedding_circuit(a)?;
        let inverse = self.embedding_circuit(b)?.adjoint();
        circuit.append(&inverse).map_err(ModelError::Circuit)?;
        Ok(circuit)
    }

    /// Probability of the all-zero outcome of the kernel circuit
    pub fn kernel_value(&self, a: &[f64], b: &[f64]) -> Result<f64, ModelError> {
        let circuit = self.kernel_circuit(a, b)?;
        let mut simulator = StatevectorSimulator::new(self.num_qubits);
        simulator.run_circuit(&circuit).map_err(ModelError::Circuit)?;
        Ok(simulator.state().probability(0))
    }
}

impl KernelFunction for QuantumKernel {
    fn matrix(&self, a: ArrayView2<f64>, b: ArrayView2<f64>) -> Result<Array2<f64>, ModelError> {
        if a.ncols() != b.ncols() {
            return Err(ModelError::DimensionMismatch(format!(
                "Kernel inputs have {} and {} features",
                a.ncols(),
                b.ncols()
            )));
        }

        let rows: Vec<Vec<f64>> = (0..a.nrows())
            .into_par_iter()
            .map(|i| {
                let left = a.row(i).to_vec();
                (0..b.nrows())
                    .map(|j| self.kernel_value(&left, &b.row(j).to_vec()))
                    .collect::<Result<Vec<f64>, ModelError>>()
            })
            .collect::<Result<_, _>>()?;

        debug!(rows = a.nrows(), cols = b.nrows(), "computed quantum kernel matrix");

        let mut matrix = Array2::zeros((a.nrows(), b.nrows()));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, value) in row.into_iter().enumerate() {
                matrix[[i, j]] = value;
            }
        }
        Ok(matrix)
    }
}

/// Outcome of a kernel classification run on the test partition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KernelReport {
    /// Fraction of correctly predicted test labels
    pub accuracy: f64,
    /// Predicted label per test sample
    pub predictions: Vec<i64>,
    /// Number of samples the classifier was trained on
    pub training_count: usize,
}

/// Kernel classifier with a quantum fidelity kernel
#[derive(Clone)]
pub struct QuantumKernelClassifier {
    kernel: QuantumKernel,
}

impl QuantumKernelClassifier {
    pub fn new(embedding: Arc<dyn Embedding>, num_qubits: usize) -> Self {
        QuantumKernelClassifier {
            kernel: QuantumKernel::new(embedding, num_qubits),
        }
    }

    /// The kernel handed to the solver
    pub fn kernel(&self) -> &QuantumKernel {
        &self.kernel
    }

    pub fn kernel_circuit(&self, a: &[f64], b: &[f64]) -> Result<QuantumCircuit, ModelError> {
        self.kernel.kernel_circuit(a, b)
    }

    pub fn kernel_value(&self, a: &[f64], b: &[f64]) -> Result<f64, ModelError> {
        self.kernel.kernel_value(a, b)
    }

    /// Train on the leading `training_ratio` share of the samples and score
    /// the classifier built by `svm_constructor` on the rest.
    pub fn run<M, F>(
        &self,
        features: &Array2<f64>,
        labels: &[i64],
        training_ratio: f64,
        svm_constructor: F,
    ) -> Result<KernelReport, ModelError>
    where
        M: KernelClassifier,
        F: FnOnce(QuantumKernel) -> M,
    {
        let split = train_test_split(features, labels, training_ratio)?;
        info!(
            embedding = self.kernel.embedding.name(),
            training = split.training_count(),
            testing = split.test_labels.len(),
            "running quantum kernel classifier"
        );

        let mut model = svm_constructor(self.kernel.clone());
        model.fit(split.train_features, split.train_labels)?;

        let predictions = model.predict(split.test_features)?;
        let accuracy = accuracy_score(&predictions, split.test_labels)?;

        info!(accuracy, "quantum kernel classifier finished");
        Ok(KernelReport {
            accuracy,
            predictions,
            training_count: split.training_count(),
        })
    }

    /// `run` with a default soft-margin support vector classifier
    pub fn run_svc(
        &self,
        features: &Array2<f64>,
        labels: &[i64],
        training_ratio: f64,
    ) -> Result<KernelReport, ModelError> {
        self.run(features, labels, training_ratio, SupportVectorClassifier::new)
    }
}

//! Machine learning module for quantum classification
//!
//! This module holds the classical side of the classifiers (errors, datasets,
//! error metrics and optimizers) and the quantum classifiers themselves.

pub mod core;
pub mod loss;
pub mod optimizer;
pub mod dataset;
pub mod quantum;

/// Re-exports of commonly used components
pub mod prelude {
    // Core ML components
    pub use super::core::{ModelError, sign, accuracy_score, train_test_split};
    pub use super::loss::{ErrorMetric, MeanSquaredError, MeanAbsoluteError, BinaryCrossEntropy};
    pub use super::optimizer::{Optimizer, GradientDescent, Adam, Spsa, NelderMead};
    pub use super::dataset::LabeledDataset;

    // Quantum ML components
    pub use super::quantum::kernel::{QuantumKernel, QuantumKernelClassifier, KernelReport};
    pub use super::quantum::qcnn::{QcnnClassifier, QcnnReport};
    pub use super::quantum::svm::{KernelFunction, KernelClassifier, SupportVectorClassifier, RbfKernel};
}

// Type aliases for convenience
pub type QCNN = quantum::qcnn::QcnnClassifier;
pub type SVC<K> = quantum::svm::SupportVectorClassifier<K>;

//! Quantum machine learning module

pub mod svm;
pub mod kernel;
pub mod qcnn;

// Re-exports for convenience
pub use svm::{KernelFunction, KernelClassifier, SupportVectorClassifier, RbfKernel};
pub use kernel::{QuantumKernel, QuantumKernelClassifier, KernelReport};
pub use qcnn::{QcnnClassifier, QcnnReport, BatchCursor, parameter_count, qubit_trajectory};

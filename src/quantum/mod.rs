// src/quantum/mod.rs
//! Quantum states, gates, circuits and classical-data embeddings
//!
//! The pieces here are what the classifiers build their circuits from; the
//! simulators module executes them.

pub mod state;
pub mod gate;
pub mod circuit;
pub mod embedding;

pub use state::StateVector;
pub use gate::{Axis, QuantumGate, StandardGate, ParametrizedGate, CustomMatrixGate};
pub use circuit::{QuantumCircuit, CircuitBuilder};
pub use embedding::{Embedding, AngleEmbedding, AmplitudeEmbedding, IqpEmbedding};

/// Re-export commonly used types and traits
pub mod prelude {
    pub use super::{StateVector, QuantumCircuit, CircuitBuilder};
    pub use super::{QuantumGate, StandardGate, ParametrizedGate, Axis};
    pub use super::{Embedding, AngleEmbedding, AmplitudeEmbedding, IqpEmbedding};
}

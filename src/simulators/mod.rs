//! Quantum circuit simulators
//!
//! This module provides the classical execution layer: circuits built by the
//! classifiers are run here and reduced to probabilities or expectation values.

pub mod statevector;

pub use statevector::{
    StatevectorSimulator,
    Outcome,
    probabilities,
    expectation_z,
};

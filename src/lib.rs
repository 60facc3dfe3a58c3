//! Quantum classification framework
//!
//! This crate provides two binary classifiers for small tabular datasets,
//! a quantum-kernel support vector classifier and a quantum convolutional
//! neural network, built on circuits executed by an in-crate statevector
//! simulator.

pub mod quantum;
pub mod simulators;
pub mod machine_learning;
pub mod config;

// Create a prelude module for convenient imports
pub mod prelude {
    pub use crate::quantum::prelude::*;
    pub use crate::simulators::StatevectorSimulator;
    pub use crate::machine_learning::prelude::*;
    pub use crate::config::RunConfig;
}

// Version and crate information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

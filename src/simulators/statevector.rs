//! Statevector simulator
//!
//! Executes circuits gate by gate on a dense state vector and reads out
//! basis-state probabilities or Pauli-Z expectation values.
use std::collections::HashMap;
use std::fmt;

use crate::quantum::circuit::QuantumCircuit;
use crate::quantum::gate::QuantumGate;
use crate::quantum::state::StateVector;

/// A measurement outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Measurement yielded 0
    Zero,
    /// Measurement yielded 1
    One,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Zero => write!(f, "0"),
            Outcome::One => write!(f, "1"),
        }
    }
}

/// A statevector simulator for quantum circuits
#[derive(Clone, Debug)]
pub struct StatevectorSimulator {
    /// The current state of the simulator
    state: StateVector,
}

impl StatevectorSimulator {
    /// Create a new statevector simulator in |0...0⟩
    pub fn new(qubit_count: usize) -> Self {
        StatevectorSimulator {
            state: StateVector::zero_state(qubit_count),
        }
    }

    /// Create a simulator starting from an existing state
    pub fn from_state(state: StateVector) -> Self {
        StatevectorSimulator { state }
    }

    /// Get the current state vector
    pub fn state(&self) -> &StateVector {
        &self.state
    }

    /// Reset the simulator to the |0...0⟩ state
    pub fn reset(&mut self) {
        self.state = StateVector::zero_state(self.state.qubit_count);
    }

    /// Get the number of qubits in the simulator
    pub fn qubit_count(&self) -> usize {
        self.state.qubit_count
    }

    /// Apply a quantum gate to the specified qubits
    pub fn apply_gate(&mut self, gate: &dyn QuantumGate, qubits: &[usize]) -> Result<(), String> {
        gate.apply_to_qubits(&mut self.state, qubits)
    }

    /// Apply every gate of a circuit to the current state
    pub fn run_circuit(&mut self, circuit: &QuantumCircuit) -> Result<(), String> {
        if circuit.qubit_count > self.qubit_count() {
            return Err(format!(
                "Circuit has {} qubits, but simulator has only {} qubits",
                circuit.qubit_count,
                self.qubit_count()
            ));
        }

        for (gate, qubits) in &circuit.gates {
            gate.apply_to_qubits(&mut self.state, qubits)?;
        }

        Ok(())
    }

    /// Probability of every computational basis outcome over all qubits
    pub fn probabilities(&self) -> Vec<f64> {
        self.state.probabilities()
    }

    /// Marginal probabilities of a single qubit, without collapsing the state
    pub fn measure_qubit_probability(&self, qubit: usize) -> Result<HashMap<Outcome, f64>, String> {
        let expectation = self.state.expectation_z(qubit)?;

        let mut probabilities = HashMap::new();
        probabilities.insert(Outcome::Zero, (1.0 + expectation) / 2.0);
        probabilities.insert(Outcome::One, (1.0 - expectation) / 2.0);

        Ok(probabilities)
    }

    /// Expectation value of Pauli-Z on one qubit, in [-1, 1]
    pub fn expectation_z(&self, qubit: usize) -> Result<f64, String> {
        self.state.expectation_z(qubit)
    }
}

/// Run `circuit` from |0...0⟩ and return the probability of every basis outcome
pub fn probabilities(circuit: &QuantumCircuit) -> Result<Vec<f64>, String> {
    let mut simulator = StatevectorSimulator::new(circuit.qubit_count);
    simulator.run_circuit(circuit)?;
    Ok(simulator.probabilities())
}

/// Run `circuit` from |0...0⟩ and return ⟨Z⟩ on `qubit`
pub fn expectation_z(circuit: &QuantumCircuit, qubit: usize) -> Result<f64, String> {
    let mut simulator = StatevectorSimulator::new(circuit.qubit_count);
    simulator.run_circuit(circuit)?;
    simulator.expectation_z(qubit)
}

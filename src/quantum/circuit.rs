// src/quantum/circuit.rs
//! Gate sequences over a fixed register and a builder for them

use crate::quantum::gate::{Axis, ParametrizedGate, QuantumGate, StandardGate};
use crate::quantum::state::StateVector;

/// A quantum circuit consisting of a sequence of gates
#[derive(Debug)]
pub struct QuantumCircuit {
    pub gates: Vec<(Box<dyn QuantumGate>, Vec<usize>)>,
    pub qubit_count: usize,
}

impl QuantumCircuit {
    /// Create a new empty quantum circuit
    pub fn new(qubit_count: usize) -> Self {
        QuantumCircuit {
            gates: Vec::new(),
            qubit_count,
        }
    }

    pub fn add_gate(&mut self, gate: Box<dyn QuantumGate>, qubits: &[usize]) -> Result<(), String> {
        for (i, &q) in qubits.iter().enumerate() {
            if q >= self.qubit_count {
                return Err(format!("Qubit index {} out of range", q));
            }
            if qubits[..i].contains(&q) {
                return Err(format!("Qubit index {} specified more than once", q));
            }
        }

        if gate.qubit_count() != qubits.len() {
            return Err(format!(
                "Gate acts on {} qubits, but {} qubits were specified",
                gate.qubit_count(), qubits.len()
            ));
        }

        self.gates.push((gate, qubits.to_vec()));
        Ok(())
    }

    /// Get the number of gates in the circuit
    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    /// Names and targets of the gates, in application order
    pub fn operations(&self) -> Vec<(String, Vec<usize>)> {
        self.gates
            .iter()
            .map(|(gate, qubits)| (gate.name(), qubits.clone()))
            .collect()
    }

    /// Apply the circuit to a quantum state
    pub fn apply(&self, state: &StateVector) -> Result<StateVector, String> {
        if state.qubit_count < self.qubit_count {
            return Err(format!(
                "State has {} qubits, but circuit requires at least {} qubits",
                state.qubit_count, self.qubit_count
            ));
        }

        let mut current_state = state.clone();
        for (gate, qubits) in &self.gates {
            gate.apply_to_qubits(&mut current_state, qubits)?;
        }

        Ok(current_state)
    }

    /// Append the gates of another circuit on the same register
    pub fn append(&mut self, other: &QuantumCircuit) -> Result<(), String> {
        if self.qubit_count != other.qubit_count {
            return Err(format!(
                "Cannot compose circuits with different qubit counts: {} and {}",
                self.qubit_count, other.qubit_count
            ));
        }

        for (gate, qubits) in &other.gates {
            self.add_gate(gate.clone_box(), qubits)?;
        }

        Ok(())
    }

    /// Create the adjoint (dagger) of this circuit
    pub fn adjoint(&self) -> Self {
        QuantumCircuit {
            gates: self.gates
                .iter()
                .rev()
                .map(|(gate, qubits)| (gate.adjoint(), qubits.clone()))
                .collect(),
            qubit_count: self.qubit_count,
        }
    }
}

impl Clone for QuantumCircuit {
    fn clone(&self) -> Self {
        QuantumCircuit {
            gates: self.gates.iter()
                .map(|(gate, qubits)| (gate.clone_box(), qubits.clone()))
                .collect(),
            qubit_count: self.qubit_count,
        }
    }
}

impl PartialEq for QuantumCircuit {
    fn eq(&self, other: &Self) -> bool {
        self.qubit_count == other.qubit_count
            && self.gates.len() == other.gates.len()
            && self.gates
                .iter()
                .zip(other.gates.iter())
                .all(|((g1, q1), (g2, q2))| q1 == q2 && g1.equals(g2.as_ref()))
    }
}

/// A builder for quantum circuits
pub struct CircuitBuilder {
    circuit: QuantumCircuit,
}

impl CircuitBuilder {
    /// Create a new circuit builder
    pub fn new(qubit_count: usize) -> Self {
        CircuitBuilder {
            circuit: QuantumCircuit::new(qubit_count),
        }
    }

    /// Number of qubits of the circuit under construction
    pub fn qubit_count(&self) -> usize {
        self.circuit.qubit_count
    }

    /// Number of gates added so far
    pub fn gate_count(&self) -> usize {
        self.circuit.gate_count()
    }

    /// Build the quantum circuit
    pub fn build(self) -> QuantumCircuit {
        self.circuit
    }

    pub fn add_gate<G: QuantumGate + 'static>(&mut self, gate: G, qubits: &[usize]) -> Result<(), String> {
        self.circuit.add_gate(Box::new(gate), qubits)
    }

    /// Append every gate of an existing circuit
    pub fn append(&mut self, circuit: &QuantumCircuit) -> Result<(), String> {
        self.circuit.append(circuit)
    }

    /// Add a Hadamard gate
    pub fn h(&mut self, qubit: usize) -> Result<(), String> {
        self.add_gate(StandardGate::H, &[qubit])
    }

    /// Add a Pauli-X gate
    pub fn x(&mut self, qubit: usize) -> Result<(), String> {
        self.add_gate(StandardGate::X, &[qubit])
    }

    /// Add a CNOT gate
    pub fn cnot(&mut self, control: usize, target: usize) -> Result<(), String> {
        self.add_gate(StandardGate::CNOT, &[control, target])
    }

    /// Add an Rx gate
    pub fn rx(&mut self, qubit: usize, theta: f64) -> Result<(), String> {
        self.add_gate(ParametrizedGate::Rx(theta), &[qubit])
    }

    /// Add an Ry gate
    pub fn ry(&mut self, qubit: usize, theta: f64) -> Result<(), String> {
        self.add_gate(ParametrizedGate::Ry(theta), &[qubit])
    }

    /// Add an Rz gate
    pub fn rz(&mut self, qubit: usize, theta: f64) -> Result<(), String> {
        self.add_gate(ParametrizedGate::Rz(theta), &[qubit])
    }

    /// Add a rotation about the given axis
    pub fn rotation(&mut self, axis: Axis, qubit: usize, theta: f64) -> Result<(), String> {
        self.add_gate(ParametrizedGate::rotation(axis, theta), &[qubit])
    }

    /// exp(-i θ/2 Z⊗Z) on two qubits
    pub fn zz(&mut self, qubit1: usize, qubit2: usize, theta: f64) -> Result<(), String> {
        self.cnot(qubit1, qubit2)?;
        self.rz(qubit2, theta)?;
        self.cnot(qubit1, qubit2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjoint_involution() {
        let mut builder = CircuitBuilder::new(2);
        builder.h(0).unwrap();
        builder.ry(1, 0.3).unwrap();
        builder.cnot(0, 1).unwrap();
        let circuit = builder.build();

        assert_eq!(circuit, circuit.adjoint().adjoint());
    }

    #[test]
    fn test_circuit_then_adjoint_is_identity() {
        let mut builder = CircuitBuilder::new(3);
        builder.h(0).unwrap();
        builder.rx(1, 1.1).unwrap();
        builder.zz(0, 2, 0.7).unwrap();
        builder.cnot(2, 1).unwrap();
        let mut circuit = builder.build();
        let adjoint = circuit.adjoint();
        circuit.append(&adjoint).unwrap();

        let state = circuit.apply(&StateVector::zero_state(3)).unwrap();
        assert!((state.probability(0) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_rejects_repeated_targets() {
        let mut circuit = QuantumCircuit::new(2);
        assert!(circuit.add_gate(Box::new(StandardGate::CNOT), &[1, 1]).is_err());
        assert!(circuit.add_gate(Box::new(StandardGate::CNOT), &[0, 2]).is_err());
        assert!(circuit.add_gate(Box::new(StandardGate::H), &[0, 1]).is_err());
    }
}

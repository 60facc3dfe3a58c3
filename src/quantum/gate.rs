// src/quantum/gate.rs
//! Quantum gates
//!
//! Gates are unitary matrices acting on an ordered list of target qubits. The
//! first target is the most significant bit of the gate matrix index.

use std::fmt::Debug;
use std::f64::consts::FRAC_1_SQRT_2;

use ndarray::{array, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::state::StateVector;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);

/// Trait for quantum gates
pub trait QuantumGate: Debug + Send + Sync {
    /// Returns the number of qubits this gate acts on
    fn qubit_count(&self) -> usize;

    /// Returns the matrix representation of this gate
    fn matrix(&self) -> Array2<Complex64>;

    /// Returns a display name for this gate
    fn name(&self) -> String;

    /// Create a clone of this gate
    fn clone_box(&self) -> Box<dyn QuantumGate>;

    /// Returns the adjoint (Hermitian conjugate) of this gate
    fn adjoint(&self) -> Box<dyn QuantumGate> {
        Box::new(CustomMatrixGate {
            matrix: conjugate_transpose(&self.matrix()),
            name: format!("{}†", self.name()),
            qubits: self.qubit_count(),
        })
    }

    /// Compares this gate with another gate by matrix, with tolerance
    fn equals(&self, other: &dyn QuantumGate) -> bool {
        let m1 = self.matrix();
        let m2 = other.matrix();

        m1.shape() == m2.shape()
            && m1.iter().zip(m2.iter()).all(|(a, b)| (a - b).norm() < 1e-10)
    }

    /// Apply this gate to specific qubits of a state
    fn apply_to_qubits(&self, state: &mut StateVector, qubits: &[usize]) -> Result<(), String> {
        if qubits.len() != self.qubit_count() {
            return Err(format!(
                "Gate {} acts on {} qubits, but {} target qubits were specified",
                self.name(), self.qubit_count(), qubits.len()
            ));
        }

        state.apply_local(&self.matrix(), qubits)
    }
}

impl Clone for Box<dyn QuantumGate> {
    fn clone(&self) -> Box<dyn QuantumGate> {
        self.clone_box()
    }
}

/// Conjugate transpose of a square matrix
pub fn conjugate_transpose(matrix: &Array2<Complex64>) -> Array2<Complex64> {
    matrix.t().mapv(|z| z.conj())
}

/// A gate given directly by its matrix, e.g. a state preparation unitary
#[derive(Debug, Clone)]
pub struct CustomMatrixGate {
    pub matrix: Array2<Complex64>,
    pub name: String,
    pub qubits: usize,
}

impl QuantumGate for CustomMatrixGate {
    fn qubit_count(&self) -> usize {
        self.qubits
    }

    fn matrix(&self) -> Array2<Complex64> {
        self.matrix.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn clone_box(&self) -> Box<dyn QuantumGate> {
        Box::new(self.clone())
    }
}

/// Fixed gates. All of them are Hermitian, so each is its own adjoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StandardGate {
    X,
    Y,
    Z,
    H,
    CNOT,
    CZ,
    SWAP,
}

impl QuantumGate for StandardGate {
    fn qubit_count(&self) -> usize {
        match self {
            StandardGate::X | StandardGate::Y | StandardGate::Z | StandardGate::H => 1,
            StandardGate::CNOT | StandardGate::CZ | StandardGate::SWAP => 2,
        }
    }

    fn matrix(&self) -> Array2<Complex64> {
        match self {
            StandardGate::X => array![[ZERO, ONE], [ONE, ZERO]],
            StandardGate::Y => array![[ZERO, -I], [I, ZERO]],
            StandardGate::Z => array![[ONE, ZERO], [ZERO, -ONE]],
            StandardGate::H => {
                let h = Complex64::new(FRAC_1_SQRT_2, 0.0);
                array![[h, h], [h, -h]]
            }
            StandardGate::CNOT => array![
                [ONE, ZERO, ZERO, ZERO],
                [ZERO, ONE, ZERO, ZERO],
                [ZERO, ZERO, ZERO, ONE],
                [ZERO, ZERO, ONE, ZERO]
            ],
            StandardGate::CZ => {
                let mut m = Array2::eye(4);
                m[[3, 3]] = -ONE;
                m
            }
            StandardGate::SWAP => array![
                [ONE, ZERO, ZERO, ZERO],
                [ZERO, ZERO, ONE, ZERO],
                [ZERO, ONE, ZERO, ZERO],
                [ZERO, ZERO, ZERO, ONE]
            ],
        }
    }

    fn name(&self) -> String {
        format!("{:?}", self)
    }

    fn clone_box(&self) -> Box<dyn QuantumGate> {
        Box::new(*self)
    }

    fn adjoint(&self) -> Box<dyn QuantumGate> {
        Box::new(*self)
    }
}

/// Axis of a single-qubit rotation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Single-qubit rotations exp(-i θ/2 P) about a Pauli axis
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParametrizedGate {
    Rx(f64),
    Ry(f64),
    Rz(f64),
}

impl ParametrizedGate {
    /// Rotation about the given axis
    pub fn rotation(axis: Axis, theta: f64) -> Self {
        match axis {
            Axis::X => ParametrizedGate::Rx(theta),
            Axis::Y => ParametrizedGate::Ry(theta),
            Axis::Z => ParametrizedGate::Rz(theta),
        }
    }

    pub fn axis(&self) -> Axis {
        match self {
            ParametrizedGate::Rx(_) => Axis::X,
            ParametrizedGate::Ry(_) => Axis::Y,
            ParametrizedGate::Rz(_) => Axis::Z,
        }
    }

    pub fn angle(&self) -> f64 {
        match *self {
            ParametrizedGate::Rx(theta) | ParametrizedGate::Ry(theta) | ParametrizedGate::Rz(theta) => theta,
        }
    }
}

impl QuantumGate for ParametrizedGate {
    fn qubit_count(&self) -> usize {
        1
    }

    fn matrix(&self) -> Array2<Complex64> {
        let half = self.angle() / 2.0;
        let (cos, sin) = (half.cos(), half.sin());
        match self.axis() {
            Axis::X => array![
                [Complex64::new(cos, 0.0), Complex64::new(0.0, -sin)],
                [Complex64::new(0.0, -sin), Complex64::new(cos, 0.0)]
            ],
            Axis::Y => array![
                [Complex64::new(cos, 0.0), Complex64::new(-sin, 0.0)],
                [Complex64::new(sin, 0.0), Complex64::new(cos, 0.0)]
            ],
            Axis::Z => array![
                [Complex64::new(cos, -sin), ZERO],
                [ZERO, Complex64::new(cos, sin)]
            ],
        }
    }

    fn name(&self) -> String {
        let prefix = match self.axis() {
            Axis::X => "Rx",
            Axis::Y => "Ry",
            Axis::Z => "Rz",
        };
        format!("{}({:.2})", prefix, self.angle())
    }

    fn clone_box(&self) -> Box<dyn QuantumGate> {
        Box::new(*self)
    }

    fn adjoint(&self) -> Box<dyn QuantumGate> {
        Box::new(ParametrizedGate::rotation(self.axis(), -self.angle()))
    }
}

// src/quantum/state.rs
//! Quantum state representations
//!
//! Qubit 0 is the most significant bit of a basis index.

use std::fmt::{self, Display};
use num_complex::Complex64;
use ndarray::{Array1, Array2};

/// State vector representation of a quantum state
#[derive(Clone, Debug)]
pub struct StateVector {
    /// Number of qubits
    pub qubit_count: usize,

    /// The state vector as an array of complex amplitudes
    amplitudes: Array1<Complex64>,
}

impl StateVector {
    /// Create a new state vector with the given amplitudes
    pub fn new(qubit_count: usize, amplitudes: Array1<Complex64>) -> Result<Self, String> {
        let expected_dim = 1 << qubit_count;

        if amplitudes.len() != expected_dim {
            return Err(format!(
                "State vector dimension mismatch: expected {}, got {}",
                expected_dim, amplitudes.len()
            ));
        }

        let state = StateVector {
            qubit_count,
            amplitudes,
        };

        if !state.is_valid() {
            return Err("State vector is not normalized".to_string());
        }

        Ok(state)
    }

    /// Create a new state vector in the computational basis state |index⟩
    pub fn computational_basis(qubit_count: usize, index: usize) -> Result<Self, String> {
        let dim = 1 << qubit_count;

        if index >= dim {
            return Err(format!(
                "Index {} is out of range for {}-qubit state",
                index, qubit_count
            ));
        }

        let mut amplitudes = Array1::zeros(dim);
        amplitudes[index] = Complex64::new(1.0, 0.0);

        Ok(StateVector {
            qubit_count,
            amplitudes,
        })
    }

    /// Create the zero state |00...0⟩
    pub fn zero_state(qubit_count: usize) -> Self {
        let mut amplitudes = Array1::zeros(1 << qubit_count);
        amplitudes[0] = Complex64::new(1.0, 0.0);

        StateVector {
            qubit_count,
            amplitudes,
        }
    }

    /// Returns the dimension of the Hilbert space (2^n for n qubits)
    pub fn dimension(&self) -> usize {
        1 << self.qubit_count
    }

    /// Check that the state is normalized
    pub fn is_valid(&self) -> bool {
        let norm_sqr: f64 = self.amplitudes
            .iter()
            .map(|amp| amp.norm_sqr())
            .sum();

        (norm_sqr - 1.0).abs() < 1e-10
    }

    /// Calculate the probability of measuring the given bit string
    pub fn probability(&self, bit_string: usize) -> f64 {
        if bit_string >= self.dimension() {
            return 0.0;
        }

        self.amplitudes[bit_string].norm_sqr()
    }

    /// Probabilities of every computational basis outcome, indexed by bit string
    pub fn probabilities(&self) -> Vec<f64> {
        self.amplitudes.iter().map(|amp| amp.norm_sqr()).collect()
    }

    /// Get a reference to the amplitudes
    pub fn amplitudes(&self) -> &Array1<Complex64> {
        &self.amplitudes
    }

    /// Apply a k-qubit operator to the given target qubits in place.
    ///
    /// `qubits[0]` maps to the most significant bit of the operator's row index,
    /// so a CNOT applied to `[control, target]` flips `target` when `control` is set.
    pub fn apply_local(&mut self, matrix: &Array2<Complex64>, qubits: &[usize]) -> Result<(), String> {
        let k = qubits.len();
        let sub_dim = 1 << k;

        if matrix.shape() != [sub_dim, sub_dim] {
            return Err(format!(
                "Operator on {} qubits must be {}x{}, got {}x{}",
                k, sub_dim, sub_dim, matrix.shape()[0], matrix.shape()[1]
            ));
        }

        for (i, &q) in qubits.iter().enumerate() {
            if q >= self.qubit_count {
                return Err(format!("Qubit index {} out of range", q));
            }
            if qubits[..i].contains(&q) {
                return Err(format!("Qubit index {} specified more than once", q));
            }
        }

        if k == self.qubit_count && qubits.iter().enumerate().all(|(i, &q)| i == q) {
            self.amplitudes = matrix.dot(&self.amplitudes);
            return Ok(());
        }

        let masks: Vec<usize> = qubits
            .iter()
            .map(|&q| 1 << (self.qubit_count - 1 - q))
            .collect();
        let target_mask: usize = masks.iter().sum();

        // Offsets of each sub-basis state relative to a base index with all target bits cleared
        let offsets: Vec<usize> = (0..sub_dim)
            .map(|s| {
                masks
                    .iter()
                    .enumerate()
                    .filter(|&(m, _)| (s >> (k - 1 - m)) & 1 == 1)
                    .map(|(_, &mask)| mask)
                    .sum()
            })
            .collect();

        let mut gathered = vec![Complex64::new(0.0, 0.0); sub_dim];
        for base in 0..self.dimension() {
            if base & target_mask != 0 {
                continue;
            }

            for (s, &offset) in offsets.iter().enumerate() {
                gathered[s] = self.amplitudes[base | offset];
            }

            for (r, &offset) in offsets.iter().enumerate() {
                let mut value = Complex64::new(0.0, 0.0);
                for (s, amp) in gathered.iter().enumerate() {
                    value += matrix[[r, s]] * amp;
                }
                self.amplitudes[base | offset] = value;
            }
        }

        Ok(())
    }

    /// Expectation value of Pauli-Z on a single qubit
    pub fn expectation_z(&self, qubit: usize) -> Result<f64, String> {
        if qubit >= self.qubit_count {
            return Err(format!("Qubit index {} out of range", qubit));
        }

        let shift = self.qubit_count - 1 - qubit;
        Ok(self.amplitudes
            .iter()
            .enumerate()
            .map(|(i, amp)| {
                if (i >> shift) & 1 == 0 {
                    amp.norm_sqr()
                } else {
                    -amp.norm_sqr()
                }
            })
            .sum())
    }
}

impl Display for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}-qubit state:", self.qubit_count)?;

        let threshold = 1e-10;
        let mut has_entries = false;

        for i in 0..self.dimension() {
            let amp = self.amplitudes[i];
            if amp.norm_sqr() > threshold {
                has_entries = true;

                let bit_string = format!("{:0width$b}", i, width = self.qubit_count);
                writeln!(
                    f,
                    "  ({:.6}{:+.6}i) |{}⟩ [{:.1}%]",
                    amp.re, amp.im, bit_string, amp.norm_sqr() * 100.0
                )?;
            }
        }

        if !has_entries {
            writeln!(f, "  (zero state)")?;
        }

        Ok(())
    }
}

//! Embeddings of classical feature vectors into quantum circuits
//!
//! An embedding appends state-preparation gates for one feature vector to a
//! circuit under construction. It returns nothing besides success; the
//! classifiers compose embeddings with their own gates and measurements.

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::quantum::circuit::CircuitBuilder;
use crate::quantum::gate::{Axis, CustomMatrixGate};

/// Strategy for encoding a feature vector on a register of qubits
pub trait Embedding: Send + Sync {
    /// Append the gates preparing `features` to `builder`
    fn embed(&self, builder: &mut CircuitBuilder, features: &[f64]) -> Result<(), String>;

    /// Check the qubit-count constraint of this strategy.
    ///
    /// Classifiers never call this; it is for the code choosing the register size.
    fn validate(&self, num_features: usize, num_qubits: usize) -> Result<(), String>;

    /// Display name
    fn name(&self) -> &str;
}

impl<F> Embedding for F
where
    F: Fn(&mut CircuitBuilder, &[f64]) -> Result<(), String> + Send + Sync,
{
    fn embed(&self, builder: &mut CircuitBuilder, features: &[f64]) -> Result<(), String> {
        self(builder, features)
    }

    fn validate(&self, _num_features: usize, _num_qubits: usize) -> Result<(), String> {
        Ok(())
    }

    fn name(&self) -> &str {
        "custom"
    }
}

/// One rotation per feature, feature `i` on qubit `i`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleEmbedding {
    pub rotation: Axis,
}

impl AngleEmbedding {
    pub fn new(rotation: Axis) -> Self {
        AngleEmbedding { rotation }
    }
}

impl Default for AngleEmbedding {
    fn default() -> Self {
        AngleEmbedding { rotation: Axis::Y }
    }
}

impl Embedding for AngleEmbedding {
    fn embed(&self, builder: &mut CircuitBuilder, features: &[f64]) -> Result<(), String> {
        if features.len() > builder.qubit_count() {
            return Err(format!(
                "Angle embedding of {} features needs at least as many qubits, got {}",
                features.len(), builder.qubit_count()
            ));
        }

        for (qubit, &value) in features.iter().enumerate() {
            builder.rotation(self.rotation, qubit, value)?;
        }

        Ok(())
    }

    fn validate(&self, num_features: usize, num_qubits: usize) -> Result<(), String> {
        if num_features > num_qubits {
            return Err(format!(
                "Angle embedding of {} features needs at least {} qubits, got {}",
                num_features, num_features, num_qubits
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "angle"
    }
}

/// Features as the normalised amplitudes of the register, zero-padded to 2^n
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AmplitudeEmbedding;

impl AmplitudeEmbedding {
    /// Number of qubits needed to hold `num_features` amplitudes
    pub fn required_qubits(num_features: usize) -> usize {
        let mut qubits = 0;
        while (1usize << qubits) < num_features {
            qubits += 1;
        }
        qubits
    }

    /// Householder reflection sending |0..0⟩ to the normalised `amplitudes`
    fn preparation_matrix(amplitudes: &[f64]) -> Array2<Complex64> {
        let dim = amplitudes.len();
        let mut v: Vec<f64> = amplitudes.iter().map(|a| -a).collect();
        v[0] += 1.0;
        let v_norm_sqr: f64 = v.iter().map(|x| x * x).sum();

        let mut matrix = Array2::from_diag(&ndarray::Array1::from_elem(dim, Complex64::new(1.0, 0.0)));
        if v_norm_sqr < 1e-24 {
            return matrix;
        }

        for i in 0..dim {
            for j in 0..dim {
                matrix[[i, j]] -= Complex64::new(2.0 * v[i] * v[j] / v_norm_sqr, 0.0);
            }
        }

        matrix
    }
}

impl Embedding for AmplitudeEmbedding {
    fn embed(&self, builder: &mut CircuitBuilder, features: &[f64]) -> Result<(), String> {
        let qubit_count = builder.qubit_count();
        let dim = 1 << qubit_count;

        if features.len() > dim {
            return Err(format!(
                "Amplitude embedding of {} features does not fit in {} qubits",
                features.len(), qubit_count
            ));
        }

        let norm = features.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm < 1e-10 {
            return Err("Input vector has zero norm".to_string());
        }

        let mut amplitudes = vec![0.0; dim];
        for (amp, value) in amplitudes.iter_mut().zip(features) {
            *amp = value / norm;
        }

        let qubits: Vec<usize> = (0..qubit_count).collect();
        builder.add_gate(
            CustomMatrixGate {
                matrix: Self::preparation_matrix(&amplitudes),
                name: "AmplitudePrep".to_string(),
                qubits: qubit_count,
            },
            &qubits,
        )
    }

    fn validate(&self, num_features: usize, num_qubits: usize) -> Result<(), String> {
        let required = Self::required_qubits(num_features);
        if required != num_qubits {
            return Err(format!(
                "Amplitude embedding of {} features needs {} qubits, got {}",
                num_features, required, num_qubits
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "amplitude"
    }
}

/// Instantaneous quantum polynomial embedding: H layer, Rz(x_i), ZZ(x_i x_j) on all pairs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IqpEmbedding {
    pub n_repeats: usize,
}

impl IqpEmbedding {
    pub fn new(n_repeats: usize) -> Self {
        IqpEmbedding { n_repeats }
    }
}

impl Default for IqpEmbedding {
    fn default() -> Self {
        IqpEmbedding { n_repeats: 1 }
    }
}

impl Embedding for IqpEmbedding {
    fn embed(&self, builder: &mut CircuitBuilder, features: &[f64]) -> Result<(), String> {
        if features.len() != builder.qubit_count() {
            return Err(format!(
                "IQP embedding needs one qubit per feature: {} features, {} qubits",
                features.len(), builder.qubit_count()
            ));
        }

        for _ in 0..self.n_repeats {
            for qubit in 0..features.len() {
                builder.h(qubit)?;
            }

            for (qubit, &value) in features.iter().enumerate() {
                builder.rz(qubit, value)?;
            }

            for q1 in 0..features.len() {
                for q2 in (q1 + 1)..features.len() {
                    builder.zz(q1, q2, features[q1] * features[q2])?;
                }
            }
        }

        Ok(())
    }

    fn validate(&self, num_features: usize, num_qubits: usize) -> Result<(), String> {
        if num_features != num_qubits {
            return Err(format!(
                "IQP embedding needs one qubit per feature: {} features, {} qubits",
                num_features, num_qubits
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "iqp"
    }
}

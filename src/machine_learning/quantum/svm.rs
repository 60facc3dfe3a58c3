//! Support vector classification on a precomputed kernel
//!
//! The solver only ever sees Gram matrices produced by a [`KernelFunction`],
//! so classical and quantum kernels share the same training code.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2};
use tracing::debug;

use crate::machine_learning::core::{accuracy_score, ModelError};

/// A kernel evaluated on every pair of rows of two sample matrices
pub trait KernelFunction {
    /// Matrix `K[i, j] = k(a_i, b_j)`
    fn matrix(&self, a: ArrayView2<f64>, b: ArrayView2<f64>) -> Result<Array2<f64>, ModelError>;
}

/// A classifier trained on integer class labels
pub trait KernelClassifier {
    /// Fit the classifier to the training samples
    fn fit(&mut self, features: ArrayView2<f64>, labels: &[i64]) -> Result<(), ModelError>;

    /// Predict a class label for every row of `features`
    fn predict(&self, features: ArrayView2<f64>) -> Result<Vec<i64>, ModelError>;

    /// Fraction of correctly predicted labels
    fn score(&self, features: ArrayView2<f64>, labels: &[i64]) -> Result<f64, ModelError> {
        let predictions = self.predict(features)?;
        accuracy_score(&predictions, labels)
    }
}

/// Gaussian kernel `exp(-gamma |a - b|^2)`
#[derive(Debug, Clone, Copy)]
pub struct RbfKernel {
    pub gamma: f64,
}

impl KernelFunction for RbfKernel {
    fn matrix(&self, a: ArrayView2<f64>, b: ArrayView2<f64>) -> Result<Array2<f64>, ModelError> {
        if a.ncols() != b.ncols() {
            return Err(ModelError::DimensionMismatch(format!(
                "Kernel inputs have {} and {} features",
                a.ncols(),
                b.ncols()
            )));
        }

        Ok(Array2::from_shape_fn((a.nrows(), b.nrows()), |(i, j)| {
            let distance: f64 = a
                .row(i)
                .iter()
                .zip(b.row(j).iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum();
            (-self.gamma * distance).exp()
        }))
    }
}

/// Decision function of one two-class problem
#[derive(Debug, Clone)]
struct BinaryModel {
    positive: i64,
    negative: i64,
    /// Indices into the training set
    support: Vec<usize>,
    /// `alpha_t * y_t` per support index
    coefficients: Vec<f64>,
    rho: f64,
}

impl BinaryModel {
    fn decision(&self, kernel_row: &[f64]) -> f64 {
        self.support
            .iter()
            .zip(&self.coefficients)
            .map(|(&t, c)| c * kernel_row[t])
            .sum::<f64>()
            - self.rho
    }
}

/// Soft-margin C-SVC trained by sequential minimal optimization.
///
/// More than two classes are handled one-vs-one; ties in the vote go to the
/// smaller class label.
#[derive(Debug, Clone)]
pub struct SupportVectorClassifier<K> {
    kernel: K,
    /// Penalty on margin violations
    pub c: f64,
    /// Stopping tolerance on the KKT violation
    pub tolerance: f64,
    /// Upper bound on SMO updates per two-class problem
    pub max_passes: usize,
    training_features: Option<Array2<f64>>,
    models: Vec<BinaryModel>,
    classes: Vec<i64>,
}

impl<K: KernelFunction> SupportVectorClassifier<K> {
    /// Creates a classifier with `c = 1.0` and `tolerance = 1e-3`
    pub fn new(kernel: K) -> Self {
        SupportVectorClassifier {
            kernel,
            c: 1.0,
            tolerance: 1e-3,
            max_passes: 100_000,
            training_features: None,
            models: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// The kernel this classifier evaluates
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Distinct class labels seen during `fit`, in ascending order
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Number of distinct training samples that are support vectors
    pub fn support_vector_count(&self) -> usize {
        let mut indices: Vec<usize> = self.models.iter().flat_map(|m| m.support.iter().copied()).collect();
        indices.sort_unstable();
        indices.dedup();
        indices.len()
    }

    /// Solve the dual problem for the samples `indices`, `y = +1` for `positive`
    fn train_pair(
        &self,
        gram: &Array2<f64>,
        labels: &[i64],
        indices: &[usize],
        positive: i64,
        negative: i64,
    ) -> Result<BinaryModel, ModelError> {
        let n = indices.len();
        let c = self.c;
        let y: Vec<f64> = indices
            .iter()
            .map(|&t| if labels[t] == positive { 1.0 } else { -1.0 })
            .collect();
        let q = |s: usize, t: usize| y[s] * y[t] * gram[[indices[s], indices[t]]];

        let mut alpha = vec![0.0; n];
        let mut gradient = vec![-1.0; n];
        let mut iterations = 0;

        while iterations < self.max_passes {
            // maximal violating pair
            let mut i = None;
            let mut max_up = f64::NEG_INFINITY;
            let mut j = None;
            let mut min_low = f64::INFINITY;
            for t in 0..n {
                let value = -y[t] * gradient[t];
                let in_up = (y[t] > 0.0 && alpha[t] < c) || (y[t] < 0.0 && alpha[t] > 0.0);
                let in_low = (y[t] > 0.0 && alpha[t] > 0.0) || (y[t] < 0.0 && alpha[t] < c);
                if in_up && value > max_up {
                    max_up = value;
                    i = Some(t);
                }
                if in_low && value < min_low {
                    min_low = value;
                    j = Some(t);
                }
            }

            let (i, j) = match (i, j) {
                (Some(i), Some(j)) if max_up - min_low >= self.tolerance => (i, j),
                _ => break,
            };

            let (old_i, old_j) = (alpha[i], alpha[j]);
            if y[i] != y[j] {
                let quad = (q(i, i) + q(j, j) + 2.0 * q(i, j)).max(1e-12);
                let delta = (-gradient[i] - gradient[j]) / quad;
                let diff = alpha[i] - alpha[j];
                alpha[i] += delta;
                alpha[j] += delta;

                if diff > 0.0 {
                    if alpha[j] < 0.0 {
                        alpha[j] = 0.0;
                        alpha[i] = diff;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = -diff;
                }
                if diff > 0.0 {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = c - diff;
                    }
                } else if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = c + diff;
                }
            } else {
                let quad = (q(i, i) + q(j, j) - 2.0 * q(i, j)).max(1e-12);
                let delta = (gradient[i] - gradient[j]) / quad;
                let sum = alpha[i] + alpha[j];
                alpha[i] -= delta;
                alpha[j] += delta;

                if sum > c {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = sum - c;
                    }
                } else if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = sum;
                }
                if sum > c {
                    if alpha[j] > c {
                        alpha[j] = c;
                        alpha[i] = sum - c;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = sum;
                }
            }

            let (delta_i, delta_j) = (alpha[i] - old_i, alpha[j] - old_j);
            for t in 0..n {
                gradient[t] += q(t, i) * delta_i + q(t, j) * delta_j;
            }

            iterations += 1;
        }

        if gradient.iter().any(|g| !g.is_finite()) {
            return Err(ModelError::Solver(format!(
                "Non-finite gradient while separating classes {} and {}",
                positive, negative
            )));
        }

        // offset from the free support vectors, or the midpoint of the feasible range
        let mut free_count = 0;
        let mut free_sum = 0.0;
        let mut upper = f64::INFINITY;
        let mut lower = f64::NEG_INFINITY;
        for t in 0..n {
            let y_gradient = y[t] * gradient[t];
            let at_upper = alpha[t] >= c;
            let at_lower = alpha[t] <= 0.0;
            if at_upper {
                if y[t] < 0.0 {
                    upper = upper.min(y_gradient);
                } else {
                    lower = lower.max(y_gradient);
                }
            } else if at_lower {
                if y[t] > 0.0 {
                    upper = upper.min(y_gradient);
                } else {
                    lower = lower.max(y_gradient);
                }
            } else {
                free_count += 1;
                free_sum += y_gradient;
            }
        }
        let rho = if free_count > 0 {
            free_sum / free_count as f64
        } else {
            (upper + lower) / 2.0
        };

        let mut support = Vec::new();
        let mut coefficients = Vec::new();
        for t in 0..n {
            if alpha[t] > 0.0 {
                support.push(indices[t]);
                coefficients.push(alpha[t] * y[t]);
            }
        }

        debug!(
            positive,
            negative,
            iterations,
            support_vectors = support.len(),
            rho,
            "trained two-class SVM"
        );

        Ok(BinaryModel {
            positive,
            negative,
            support,
            coefficients,
            rho,
        })
    }
}

impl<K: KernelFunction> KernelClassifier for SupportVectorClassifier<K> {
    fn fit(&mut self, features: ArrayView2<f64>, labels: &[i64]) -> Result<(), ModelError> {
        if features.nrows() != labels.len() {
            return Err(ModelError::DimensionMismatch(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        if !(self.c > 0.0) {
            return Err(ModelError::Solver(format!("C must be positive, got {}", self.c)));
        }

        let mut classes: Vec<i64> = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(ModelError::Solver(format!(
                "Training data must contain at least two classes, found {}",
                classes.len()
            )));
        }

        let gram = self.kernel.matrix(features, features)?;

        let mut models = Vec::with_capacity(classes.len() * (classes.len() - 1) / 2);
        for (a, &positive) in classes.iter().enumerate() {
            for &negative in &classes[a + 1..] {
                let indices: Vec<usize> = (0..labels.len())
                    .filter(|&t| labels[t] == positive || labels[t] == negative)
                    .collect();
                models.push(self.train_pair(&gram, labels, &indices, positive, negative)?);
            }
        }

        self.training_features = Some(features.to_owned());
        self.models = models;
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, features: ArrayView2<f64>) -> Result<Vec<i64>, ModelError> {
        let training = self
            .training_features
            .as_ref()
            .ok_or_else(|| ModelError::Solver("Classifier has not been fitted".to_string()))?;

        let cross = self.kernel.matrix(features, training.view())?;

        let predictions = cross
            .rows()
            .into_iter()
            .map(|row| {
                let kernel_row = row.to_vec();
                let mut votes: BTreeMap<i64, usize> = self.classes.iter().map(|&c| (c, 0)).collect();
                for model in &self.models {
                    let winner = if model.decision(&kernel_row) > 0.0 {
                        model.positive
                    } else {
                        model.negative
                    };
                    *votes.entry(winner).or_insert(0) += 1;
                }

                // ascending iteration keeps the smaller label on ties
                let mut best = self.classes[0];
                let mut best_votes = 0;
                for (&class, &count) in &votes {
                    if count > best_votes {
                        best = class;
                        best_votes = count;
                    }
                }
                best
            })
            .collect();

        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_separates_two_clusters() {
        let features = array![[0.0, 0.0], [0.1, 0.2], [0.2, 0.1], [3.0, 3.0], [3.1, 2.9], [2.8, 3.2]];
        let labels = vec![0, 0, 0, 1, 1, 1];

        let mut svc = SupportVectorClassifier::new(RbfKernel { gamma: 0.5 });
        svc.fit(features.view(), &labels).unwrap();

        let test = array![[0.05, 0.05], [2.9, 3.1]];
        assert_eq!(svc.predict(test.view()).unwrap(), vec![0, 1]);
        assert_eq!(svc.score(features.view(), &labels).unwrap(), 1.0);
    }

    #[test]
    fn test_one_vs_one_three_classes() {
        let features = array![[0.0], [0.2], [5.0], [5.2], [10.0], [10.2]];
        let labels = vec![-1, -1, 4, 4, 9, 9];

        let mut svc = SupportVectorClassifier::new(RbfKernel { gamma: 0.5 }).with_c(10.0);
        svc.fit(features.view(), &labels).unwrap();

        assert_eq!(svc.classes(), &[-1, 4, 9]);
        assert_eq!(svc.predict(array![[0.1], [5.1], [9.9]].view()).unwrap(), vec![-1, 4, 9]);
    }

    #[test]
    fn test_max_passes_limits_support_vectors() {
        let features = array![[0.0, 0.0], [0.1, 0.2], [0.2, 0.1], [3.0, 3.0], [3.1, 2.9], [2.8, 3.2]];
        let labels = vec![0, 0, 0, 1, 1, 1];

        let mut untrained = SupportVectorClassifier::new(RbfKernel { gamma: 0.5 }).with_max_passes(0);
        untrained.fit(features.view(), &labels).unwrap();
        assert_eq!(untrained.support_vector_count(), 0);

        // one step moves exactly one pair of opposite-class multipliers
        let mut single_step = SupportVectorClassifier::new(RbfKernel { gamma: 0.5 }).with_max_passes(1);
        single_step.fit(features.view(), &labels).unwrap();
        assert_eq!(single_step.support_vector_count(), 2);

        let mut converged = SupportVectorClassifier::new(RbfKernel { gamma: 0.5 });
        converged.fit(features.view(), &labels).unwrap();
        let count = converged.support_vector_count();
        assert!((2..=features.nrows()).contains(&count), "{} support vectors", count);
    }

    #[test]
    fn test_requires_two_classes() {
        let features = array![[0.0], [1.0]];
        let mut svc = SupportVectorClassifier::new(RbfKernel { gamma: 1.0 });
        assert!(matches!(svc.fit(features.view(), &[3, 3]), Err(ModelError::Solver(_))));
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let svc = SupportVectorClassifier::new(RbfKernel { gamma: 1.0 });
        assert!(svc.predict(array![[0.0]].view()).is_err());
    }
}

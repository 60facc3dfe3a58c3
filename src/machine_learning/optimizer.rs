//! Optimization algorithms for circuit parameters
//!
//! Every optimizer works on a black-box cost function: the classifiers hand
//! over a closure mapping a parameter vector to a scalar error and receive
//! the optimized parameters back.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Trait for optimization algorithms
pub trait Optimizer {
    /// Minimise `cost` starting from `initial` and return the final parameters
    fn minimize(&self, cost: &mut dyn FnMut(&[f64]) -> f64, initial: &[f64]) -> Vec<f64>;

    /// Number of iterations the optimizer runs
    fn max_iterations(&self) -> usize;

    /// Cost evaluations spent per iteration for `num_parameters` parameters.
    ///
    /// For adaptive methods this is an upper bound.
    fn cost_evaluations_per_iteration(&self, num_parameters: usize) -> usize;

    /// Upper bound on the cost evaluations of a whole `minimize` call
    fn max_cost_evaluations(&self, num_parameters: usize) -> usize {
        self.max_iterations() * self.cost_evaluations_per_iteration(num_parameters)
    }
}

/// Central finite-difference gradient, two evaluations per parameter
fn finite_difference_gradient(
    cost: &mut dyn FnMut(&[f64]) -> f64,
    parameters: &[f64],
    step: f64,
) -> Vec<f64> {
    let mut shifted = parameters.to_vec();
    let mut gradient = Vec::with_capacity(parameters.len());

    for i in 0..parameters.len() {
        shifted[i] = parameters[i] + step;
        let forward = cost(&shifted);
        shifted[i] = parameters[i] - step;
        let backward = cost(&shifted);
        shifted[i] = parameters[i];

        gradient.push((forward - backward) / (2.0 * step));
    }

    gradient
}

fn norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Gradient Descent optimizer
#[derive(Debug, Clone)]
pub struct GradientDescent {
    learning_rate: f64,
    max_iterations: usize,
    step: f64,
}

impl GradientDescent {
    /// Creates a new Gradient Descent optimizer
    pub fn new(learning_rate: f64, max_iterations: usize) -> Self {
        GradientDescent {
            learning_rate,
            max_iterations,
            step: 1e-4,
        }
    }

    /// Use a different finite-difference step
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }
}

impl Optimizer for GradientDescent {
    fn minimize(&self, cost: &mut dyn FnMut(&[f64]) -> f64, initial: &[f64]) -> Vec<f64> {
        let mut parameters = initial.to_vec();

        for iteration in 0..self.max_iterations {
            let gradient = finite_difference_gradient(cost, &parameters, self.step);

            for (param, grad) in parameters.iter_mut().zip(gradient.iter()) {
                *param -= self.learning_rate * grad;
            }

            debug!(iteration, gradient_norm = norm(&gradient), "gradient descent step");
        }

        parameters
    }

    fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn cost_evaluations_per_iteration(&self, num_parameters: usize) -> usize {
        2 * num_parameters
    }
}

/// Adaptive Moment Estimation (Adam) optimizer
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    max_iterations: usize,
    step: f64,
}

impl Adam {
    /// Creates a new Adam optimizer
    pub fn new(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64, max_iterations: usize) -> Self {
        Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            max_iterations,
            step: 1e-4,
        }
    }

    /// Adam with the usual moment decay rates
    pub fn with_learning_rate(learning_rate: f64, max_iterations: usize) -> Self {
        Adam::new(learning_rate, 0.9, 0.999, 1e-8, max_iterations)
    }
}

impl Default for Adam {
    fn default() -> Self {
        Adam::new(0.01, 0.9, 0.999, 1e-8, 100)
    }
}

impl Optimizer for Adam {
    fn minimize(&self, cost: &mut dyn FnMut(&[f64]) -> f64, initial: &[f64]) -> Vec<f64> {
        let n = initial.len();
        let mut parameters = initial.to_vec();
        let mut m = vec![0.0; n];
        let mut v = vec![0.0; n];

        for iteration in 0..self.max_iterations {
            let gradients = finite_difference_gradient(cost, &parameters, self.step);
            let t = (iteration + 1) as i32;

            for i in 0..n {
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * gradients[i];
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * gradients[i] * gradients[i];

                let m_hat = m[i] / (1.0 - self.beta1.powi(t));
                let v_hat = v[i] / (1.0 - self.beta2.powi(t));

                parameters[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            }

            debug!(iteration, gradient_norm = norm(&gradients), "adam step");
        }

        parameters
    }

    fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn cost_evaluations_per_iteration(&self, num_parameters: usize) -> usize {
        2 * num_parameters
    }
}

/// Simultaneous perturbation stochastic approximation.
///
/// Each iteration perturbs all parameters at once along a random ±1
/// direction, so the gradient estimate costs two evaluations regardless of
/// the parameter count.
#[derive(Debug, Clone)]
pub struct Spsa {
    a: f64,
    c: f64,
    alpha: f64,
    gamma: f64,
    stability: f64,
    max_iterations: usize,
    seed: Option<u64>,
}

impl Spsa {
    /// SPSA with step size `a`, perturbation size `c` and standard decay exponents
    pub fn new(a: f64, c: f64, max_iterations: usize) -> Self {
        Spsa {
            a,
            c,
            alpha: 0.602,
            gamma: 0.101,
            stability: max_iterations as f64 * 0.1,
            max_iterations,
            seed: None,
        }
    }

    /// Make the perturbation sequence reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Optimizer for Spsa {
    fn minimize(&self, cost: &mut dyn FnMut(&[f64]) -> f64, initial: &[f64]) -> Vec<f64> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let n = initial.len();
        let mut parameters = initial.to_vec();
        let mut plus = vec![0.0; n];
        let mut minus = vec![0.0; n];

        for iteration in 0..self.max_iterations {
            let k = iteration as f64 + 1.0;
            let a_k = self.a / (k + self.stability).powf(self.alpha);
            let c_k = self.c / k.powf(self.gamma);

            let delta: Vec<f64> = (0..n)
                .map(|_| if rng.gen::<bool>() { 1.0 } else { -1.0 })
                .collect();

            for i in 0..n {
                plus[i] = parameters[i] + c_k * delta[i];
                minus[i] = parameters[i] - c_k * delta[i];
            }

            let cost_plus = cost(&plus);
            let cost_minus = cost(&minus);
            let difference = (cost_plus - cost_minus) / (2.0 * c_k);

            for i in 0..n {
                parameters[i] -= a_k * difference / delta[i];
            }

            debug!(iteration, cost_plus, cost_minus, "spsa step");
        }

        parameters
    }

    fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn cost_evaluations_per_iteration(&self, _num_parameters: usize) -> usize {
        2
    }
}

/// Derivative-free downhill simplex
#[derive(Debug, Clone)]
pub struct NelderMead {
    max_iterations: usize,
    initial_step: f64,
    tolerance: f64,
}

impl NelderMead {
    /// Creates a new Nelder-Mead optimizer
    pub fn new(max_iterations: usize) -> Self {
        NelderMead {
            max_iterations,
            initial_step: 0.5,
            tolerance: 1e-8,
        }
    }

    /// Offset of the initial simplex vertices along each axis
    pub fn with_initial_step(mut self, initial_step: f64) -> Self {
        self.initial_step = initial_step;
        self
    }

    /// Spread of simplex values below which the search stops early
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl Optimizer for NelderMead {
    fn minimize(&self, cost: &mut dyn FnMut(&[f64]) -> f64, initial: &[f64]) -> Vec<f64> {
        let n = initial.len();
        if n == 0 {
            return Vec::new();
        }

        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        let value = cost(initial);
        simplex.push((initial.to_vec(), value));
        for i in 0..n {
            let mut vertex = initial.to_vec();
            vertex[i] += self.initial_step;
            let value = cost(&vertex);
            simplex.push((vertex, value));
        }

        for iteration in 0..self.max_iterations {
            // NaN values sort last so they are replaced first
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

            let best = simplex[0].1;
            let worst = simplex[n].1;
            debug!(iteration, best, worst, "nelder-mead step");
            if (worst - best).abs() < self.tolerance {
                break;
            }

            let centroid: Vec<f64> = (0..n)
                .map(|j| simplex[..n].iter().map(|(v, _)| v[j]).sum::<f64>() / n as f64)
                .collect();
            let towards = |coefficient: f64, from: &[f64]| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(from)
                    .map(|(c, x)| c + coefficient * (x - c))
                    .collect()
            };

            let reflected = towards(-1.0, &simplex[n].0);
            let reflected_value = cost(&reflected);

            if reflected_value < simplex[0].1 {
                let expanded = towards(-2.0, &simplex[n].0);
                let expanded_value = cost(&expanded);
                simplex[n] = if expanded_value < reflected_value {
                    (expanded, expanded_value)
                } else {
                    (reflected, reflected_value)
                };
            } else if reflected_value < simplex[n - 1].1 {
                simplex[n] = (reflected, reflected_value);
            } else {
                let contracted = towards(0.5, &simplex[n].0);
                let contracted_value = cost(&contracted);
                if contracted_value < simplex[n].1 {
                    simplex[n] = (contracted, contracted_value);
                } else {
                    let anchor = simplex[0].0.clone();
                    for (vertex, value) in simplex.iter_mut().skip(1) {
                        for (x, a) in vertex.iter_mut().zip(&anchor) {
                            *x = a + 0.5 * (*x - a);
                        }
                        *value = cost(&vertex[..]);
                    }
                }
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        simplex.swap_remove(0).0
    }

    fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn cost_evaluations_per_iteration(&self, num_parameters: usize) -> usize {
        // reflection and contraction, then a shrink of every vertex but the best
        num_parameters + 2
    }

    fn max_cost_evaluations(&self, num_parameters: usize) -> usize {
        num_parameters + 1 + self.max_iterations * self.cost_evaluations_per_iteration(num_parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic(params: &[f64]) -> f64 {
        params.iter().enumerate().map(|(i, p)| (p - i as f64).powi(2)).sum()
    }

    #[test]
    fn test_gradient_descent_reduces_quadratic() {
        let optimizer = GradientDescent::new(0.1, 100);
        let result = optimizer.minimize(&mut quadratic, &[3.0, -2.0]);
        assert!(quadratic(&result) < 1e-6);
    }

    #[test]
    fn test_adam_reduces_quadratic() {
        let optimizer = Adam::with_learning_rate(0.1, 500);
        let result = optimizer.minimize(&mut quadratic, &[3.0, -2.0]);
        assert!(quadratic(&result) < 1e-2);
    }

    #[test]
    fn test_nelder_mead_reduces_quadratic() {
        let optimizer = NelderMead::new(200);
        let result = optimizer.minimize(&mut quadratic, &[3.0, -2.0]);
        assert!(quadratic(&result) < 1e-4);
    }

    #[test]
    fn test_nelder_mead_shrinking_stays_within_bound() {
        // every new point is worse than all before it, so each iteration
        // reflects, contracts and then shrinks
        let optimizer = NelderMead::new(5);
        let mut calls = 0;
        let mut increasing = |_: &[f64]| {
            calls += 1;
            calls as f64
        };
        optimizer.minimize(&mut increasing, &[0.0; 10]);

        assert_eq!(calls, 71);
        assert_eq!(calls, optimizer.max_cost_evaluations(10));
    }

    #[test]
    fn test_spsa_counts_two_evaluations_per_iteration() {
        let optimizer = Spsa::new(0.2, 0.1, 25).with_seed(7);
        let mut calls = 0;
        let mut counting = |p: &[f64]| {
            calls += 1;
            quadratic(p)
        };
        let result = optimizer.minimize(&mut counting, &[1.0, 1.0, 1.0]);

        assert_eq!(calls, optimizer.max_cost_evaluations(3));
        assert!(quadratic(&result) < quadratic(&[1.0, 1.0, 1.0]));
    }
}

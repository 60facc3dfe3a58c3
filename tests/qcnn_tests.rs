//! Tests for the quantum convolutional neural network

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ndarray::Array2;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use qclassify::machine_learning::core::{sign, ModelError};
use qclassify::machine_learning::loss::MeanSquaredError;
use qclassify::machine_learning::optimizer::{GradientDescent, Optimizer};
use qclassify::machine_learning::quantum::qcnn::{
    convolution, generate_qcnn_circuit, parameter_count, pool, qubit_trajectory, QcnnClassifier,
};
use qclassify::quantum::circuit::CircuitBuilder;
use qclassify::quantum::embedding::{AngleEmbedding, Embedding};

/// Returns the initial parameters without touching the cost function
struct NoOpOptimizer;

impl Optimizer for NoOpOptimizer {
    fn minimize(&self, _cost: &mut dyn FnMut(&[f64]) -> f64, initial: &[f64]) -> Vec<f64> {
        initial.to_vec()
    }

    fn max_iterations(&self) -> usize {
        0
    }

    fn cost_evaluations_per_iteration(&self, _num_parameters: usize) -> usize {
        0
    }
}

/// Evaluates the cost a fixed number of times at the initial point
struct FixedCallOptimizer {
    calls: usize,
}

impl Optimizer for FixedCallOptimizer {
    fn minimize(&self, cost: &mut dyn FnMut(&[f64]) -> f64, initial: &[f64]) -> Vec<f64> {
        for _ in 0..self.calls {
            cost(initial);
        }
        initial.to_vec()
    }

    fn max_iterations(&self) -> usize {
        self.calls
    }

    fn cost_evaluations_per_iteration(&self, _num_parameters: usize) -> usize {
        1
    }
}

/// Parameters consumed by the convolution layers of a full network
fn consumed_parameters(num_qubits: usize) -> usize {
    let mut builder = CircuitBuilder::new(num_qubits);
    let params = vec![0.1; 4 * num_qubits];
    let mut used = 0;
    let mut size = num_qubits;
    while size > 1 {
        used += convolution(&mut builder, size, &params[used..]).unwrap();
        size = pool(&mut builder, size).unwrap();
    }
    used
}

fn random_dataset(samples: usize, features: usize, seed: u64) -> (Array2<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x = Array2::from_shape_fn((samples, features), |_| rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI));
    let y = (0..samples).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
    (x, y)
}

proptest! {
    #[test]
    fn test_trajectory_reaches_one_in_ceil_log2_steps(n in 2usize..4096) {
        let trajectory = qubit_trajectory(n);
        let expected_steps = (n as f64).log2().ceil() as usize;

        prop_assert_eq!(trajectory.len() - 1, expected_steps);
        prop_assert_eq!(*trajectory.last().unwrap(), 1);
        for pair in trajectory.windows(2) {
            prop_assert_eq!(pair[1], (pair[0] + 1) / 2);
        }
    }

    #[test]
    fn test_parameter_count_equals_consumption(n in 2usize..64) {
        prop_assert_eq!(parameter_count(n), consumed_parameters(n));
    }
}

#[test]
fn test_parameter_count_for_listed_sizes() {
    for n in [2, 3, 4, 5, 8, 16] {
        assert_eq!(parameter_count(n), consumed_parameters(n), "n = {}", n);
    }
    assert_eq!(parameter_count(2), 2);
}

#[test]
fn test_pooling_five_qubits() {
    let mut builder = CircuitBuilder::new(5);
    assert_eq!(pool(&mut builder, 5).unwrap(), 3);

    let ops = builder.build().operations();
    assert_eq!(
        ops,
        vec![("CNOT".to_string(), vec![3, 1]), ("CNOT".to_string(), vec![4, 0])]
    );
}

#[test]
fn test_convolution_base_case() {
    let mut builder = CircuitBuilder::new(2);
    assert_eq!(convolution(&mut builder, 2, &[0.3, 0.4, 9.0, 9.0]).unwrap(), 2);

    let ops = builder.build().operations();
    assert_eq!(ops.len(), 3);
    assert_eq!(ops[0], ("Ry(0.30)".to_string(), vec![0]));
    assert_eq!(ops[1], ("Ry(0.40)".to_string(), vec![1]));
    assert_eq!(ops[2], ("CNOT".to_string(), vec![0, 1]));
}

#[test]
fn test_short_parameter_slice_is_rejected() {
    let embedding = AngleEmbedding::default();
    let result = generate_qcnn_circuit(&embedding, 4, &[0.1, 0.2], &[0.0; 3]);
    assert_eq!(
        result.unwrap_err(),
        ModelError::ParameterCount { expected: parameter_count(4), actual: 3 }
    );
}

#[test]
fn test_initial_parameters_are_reproducible() {
    let embedding: Arc<dyn Embedding> = Arc::new(AngleEmbedding::default());
    let a = QcnnClassifier::with_rng(embedding.clone(), 4, &mut StdRng::seed_from_u64(11)).unwrap();
    let b = QcnnClassifier::with_rng(embedding, 4, &mut StdRng::seed_from_u64(11)).unwrap();

    assert_eq!(a.num_parameters(), parameter_count(4));
    assert_eq!(a.parameters(), b.parameters());
}

#[test]
fn test_rejects_labels_outside_plus_minus_one() {
    let (features, mut labels) = random_dataset(10, 4, 3);
    labels[4] = 0.0;

    let mut classifier = QcnnClassifier::with_rng(
        Arc::new(AngleEmbedding::default()),
        4,
        &mut StdRng::seed_from_u64(1),
    )
    .unwrap();
    let result = classifier.run(&features, &labels, &NoOpOptimizer, &MeanSquaredError, 0.8);

    assert!(matches!(result, Err(ModelError::InvalidLabel { index: 4, .. })));
}

#[test]
fn test_noop_optimizer_predicts_sign_of_initial_outputs() {
    let (features, labels) = random_dataset(100, 4, 42);
    let mut classifier = QcnnClassifier::with_rng(
        Arc::new(AngleEmbedding::default()),
        4,
        &mut StdRng::seed_from_u64(7),
    )
    .unwrap();
    let initial = classifier.parameters().to_vec();

    let expected: Vec<f64> = (80..100)
        .map(|i| sign(classifier.evaluate(&features.row(i).to_vec(), &initial).unwrap()))
        .collect();

    let report = classifier
        .run(&features, &labels, &NoOpOptimizer, &MeanSquaredError, 0.8)
        .unwrap();

    assert_eq!(classifier.parameters(), initial.as_slice());
    assert_eq!(report.training_count, 80);
    assert_eq!(report.predictions, expected);

    let expected_invalid: Vec<usize> = expected
        .iter()
        .enumerate()
        .filter(|(_, &p)| p == 0.0)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(report.invalid_predictions, expected_invalid);

    let correct = expected.iter().zip(&labels[80..]).filter(|(p, l)| p == l).count();
    assert!((report.accuracy - correct as f64 / 20.0).abs() < 1e-12);
}

#[test]
fn test_exact_zero_expectation_is_flagged() {
    // With zero angles the network only permutes basis states and maps
    // |0000⟩ + |0010⟩ onto |0000⟩ + |1111⟩, so ⟨Z⟩ on qubit 0 is exactly zero.
    let superposition = |builder: &mut CircuitBuilder, _features: &[f64]| builder.h(2);
    let mut classifier = QcnnClassifier::new(Arc::new(superposition), 4).unwrap();
    classifier.set_parameters(&vec![0.0; parameter_count(4)]).unwrap();

    let (features, labels) = random_dataset(10, 4, 5);
    let report = classifier
        .run(&features, &labels, &NoOpOptimizer, &MeanSquaredError, 0.8)
        .unwrap();

    assert_eq!(report.predictions, vec![0.0, 0.0]);
    assert_eq!(report.invalid_predictions, vec![0, 1]);
    assert_eq!(report.accuracy, 0.0);
}

#[test]
fn test_batches_partition_training_set() {
    // 30 samples at 0.8 give 24 training rows; 5 batches of 4 leave rows 20..24 unused
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = {
        let seen = Arc::clone(&seen);
        move |builder: &mut CircuitBuilder, features: &[f64]| {
            seen.lock().unwrap().push(features[0] as usize);
            builder.ry(1, features[1])
        }
    };

    let mut features = Array2::zeros((30, 2));
    for i in 0..30 {
        features[[i, 0]] = i as f64;
        features[[i, 1]] = 0.1 * i as f64;
    }
    let labels: Vec<f64> = (0..30).map(|i| if i % 3 == 0 { 1.0 } else { -1.0 }).collect();

    let batch_sizes = Mutex::new(Vec::new());
    let recording_error = |outputs: &[f64], batch_labels: &[f64]| {
        batch_sizes.lock().unwrap().push((outputs.len(), batch_labels.len()));
        0.0
    };

    let mut classifier = QcnnClassifier::new(Arc::new(recorder), 4).unwrap();
    classifier
        .run_batched(&features, &labels, &FixedCallOptimizer { calls: 5 }, &recording_error, 5, 0.8)
        .unwrap();

    assert_eq!(batch_sizes.lock().unwrap().clone(), vec![(4, 4); 5]);

    let mut uses: HashMap<usize, usize> = HashMap::new();
    for &id in seen.lock().unwrap().iter().filter(|&&id| id < 24) {
        *uses.entry(id).or_insert(0) += 1;
    }
    let mut used: Vec<usize> = uses.keys().copied().collect();
    used.sort_unstable();
    assert_eq!(used, (0..20).collect::<Vec<_>>());
    assert!(uses.values().all(|&count| count == 1));
}

#[test]
fn test_batch_overrun_is_an_error() {
    let (features, labels) = random_dataset(30, 4, 9);
    let mut classifier = QcnnClassifier::with_rng(
        Arc::new(AngleEmbedding::default()),
        4,
        &mut StdRng::seed_from_u64(2),
    )
    .unwrap();
    let before = classifier.parameters().to_vec();

    let result = classifier.run_batched(
        &features,
        &labels,
        &FixedCallOptimizer { calls: 6 },
        &MeanSquaredError,
        5,
        0.8,
    );

    assert_eq!(result.unwrap_err(), ModelError::BatchesExhausted { requested: 6, available: 5 });
    assert_eq!(classifier.parameters(), before.as_slice());
}

#[test]
fn test_training_reduces_cost_on_separable_data() {
    // label +1 iff the first feature is small: Ry(x0) on qubit 0 drives ⟨Z⟩ directly
    let mut features = Array2::zeros((40, 2));
    let mut labels = Vec::new();
    for i in 0..40 {
        let positive = i % 2 == 0;
        features[[i, 0]] = if positive { 0.2 } else { 2.9 };
        features[[i, 1]] = 0.05 * i as f64;
        labels.push(if positive { 1.0 } else { -1.0 });
    }

    let mut classifier = QcnnClassifier::with_rng(
        Arc::new(AngleEmbedding::default()),
        2,
        &mut StdRng::seed_from_u64(4),
    )
    .unwrap();

    let cost = |c: &QcnnClassifier, params: &[f64]| -> f64 {
        (0..32)
            .map(|i| {
                let e = c.evaluate(&features.row(i).to_vec(), params).unwrap();
                (e - labels[i]).powi(2)
            })
            .sum::<f64>()
            / 32.0
    };
    let before = cost(&classifier, &classifier.parameters().to_vec());

    classifier
        .run(&features, &labels, &GradientDescent::new(0.1, 40), &MeanSquaredError, 0.8)
        .unwrap();

    let after = cost(&classifier, &classifier.parameters().to_vec());
    assert!(after < before, "cost went from {} to {}", before, after);
}

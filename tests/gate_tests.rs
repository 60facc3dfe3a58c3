use approx::assert_relative_eq;
use ndarray::Array2;
use num_complex::Complex64;
use std::f64::consts::PI;

use qclassify::quantum::gate::{conjugate_transpose, Axis, ParametrizedGate, QuantumGate, StandardGate};

fn assert_unitary(gate: &dyn QuantumGate) {
    let m = gate.matrix();
    let product = conjugate_transpose(&m).dot(&m);
    let identity: Array2<Complex64> = Array2::eye(m.nrows());
    let deviation: f64 = (&product - &identity).iter().map(|x| x.norm()).sum();
    assert!(deviation < 1e-10, "{} is not unitary", gate.name());
}

#[test]
fn test_standard_gates_are_unitary() {
    for gate in [
        StandardGate::X,
        StandardGate::Y,
        StandardGate::Z,
        StandardGate::H,
        StandardGate::CNOT,
        StandardGate::CZ,
        StandardGate::SWAP,
    ] {
        assert_unitary(&gate);
    }
}

#[test]
fn test_parametrized_gates_are_unitary() {
    for gate in [
        ParametrizedGate::Rx(0.4),
        ParametrizedGate::Ry(-1.3),
        ParametrizedGate::Rz(PI),
    ] {
        assert_unitary(&gate);
    }
}

#[test]
fn test_adjoint_matches_conjugate_transpose() {
    let gates: Vec<Box<dyn QuantumGate>> = vec![
        Box::new(StandardGate::H),
        Box::new(StandardGate::Y),
        Box::new(ParametrizedGate::Ry(0.9)),
        Box::new(ParametrizedGate::Rx(-0.3)),
        Box::new(ParametrizedGate::Rz(1.7)),
    ];

    for gate in gates {
        let expected = conjugate_transpose(&gate.matrix());
        let actual = gate.adjoint().matrix();
        let deviation: f64 = (&expected - &actual).iter().map(|x| x.norm()).sum();
        assert!(deviation < 1e-10, "adjoint of {} is wrong", gate.name());
    }
}

#[test]
fn test_rotation_adjoint_negates_angle() {
    let adjoint = ParametrizedGate::rotation(Axis::Z, 0.25).adjoint();
    assert!(adjoint.equals(&ParametrizedGate::Rz(-0.25)));
}

#[test]
fn test_ry_matrix() {
    let theta = PI / 2.0;
    let m = ParametrizedGate::Ry(theta).matrix();
    assert_relative_eq!(m[[0, 0]].re, (theta / 2.0).cos(), epsilon = 1e-12);
    assert_relative_eq!(m[[0, 1]].re, -(theta / 2.0).sin(), epsilon = 1e-12);
    assert_relative_eq!(m[[1, 0]].re, (theta / 2.0).sin(), epsilon = 1e-12);
}

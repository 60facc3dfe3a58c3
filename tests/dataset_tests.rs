//! Tests for loading tabular datasets

use std::fs;

use approx::assert_relative_eq;
use tempfile::TempDir;

use qclassify::machine_learning::core::ModelError;
use qclassify::machine_learning::dataset::LabeledDataset;

fn write_csv(dir: &TempDir, name: &str, contents: &str) {
    fs::write(dir.path().join(format!("{}.csv", name)), contents).unwrap();
}

#[test]
fn test_last_column_is_label() {
    let dir = TempDir::new().unwrap();
    write_csv(&dir, "pulsars", "1.5,2.0,0\n3.0, 4.5 ,1\n-1.0,0.25,1\n");

    let dataset = LabeledDataset::load("pulsars", "csv", dir.path(), 0).unwrap();

    assert_eq!(dataset.len(), 3);
    assert_eq!(dataset.num_features(), 2);
    assert_eq!(dataset.labels, vec![0.0, 1.0, 1.0]);
    assert_relative_eq!(dataset.features[[1, 1]], 4.5);
    assert_relative_eq!(dataset.features[[2, 0]], -1.0);
}

#[test]
fn test_rows_to_skip_drops_leading_records() {
    let dir = TempDir::new().unwrap();
    write_csv(&dir, "with_header", "mean,std,class\nunits,units,none\n0.1,0.2,1\n0.3,0.4,0\n");

    let dataset = LabeledDataset::load("with_header", "csv", dir.path(), 2).unwrap();

    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.labels, vec![1.0, 0.0]);
}

#[test]
fn test_non_numeric_field_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_csv(&dir, "header", "a,b,label\n0.1,0.2,1\n");

    assert!(matches!(
        LabeledDataset::load("header", "csv", dir.path(), 0),
        Err(ModelError::Dataset(_))
    ));
}

#[test]
fn test_missing_file_is_reported() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        LabeledDataset::load("absent", "csv", dir.path(), 0),
        Err(ModelError::Dataset(_))
    ));
}

#[test]
fn test_ragged_rows_are_rejected() {
    let dir = TempDir::new().unwrap();
    write_csv(&dir, "ragged", "0.1,0.2,1\n0.3,1\n");

    assert!(LabeledDataset::load("ragged", "csv", dir.path(), 0).is_err());
}

#[test]
fn test_single_column_has_no_features() {
    let dir = TempDir::new().unwrap();
    write_csv(&dir, "labels_only", "1\n0\n");

    assert!(matches!(
        LabeledDataset::load("labels_only", "csv", dir.path(), 0),
        Err(ModelError::Dataset(_))
    ));
}

#[test]
fn test_slice_keeps_requested_rows() {
    let dir = TempDir::new().unwrap();
    let contents: String = (0..10).map(|i| format!("{}.0,{}\n", i, i % 2)).collect();
    write_csv(&dir, "counting", &contents);

    let dataset = LabeledDataset::load("counting", "csv", dir.path(), 0).unwrap();
    let window = dataset.slice(3..7).unwrap();

    assert_eq!(window.len(), 4);
    assert_eq!(window.features.column(0).to_vec(), vec![3.0, 4.0, 5.0, 6.0]);
    assert_eq!(window.labels, vec![1.0, 0.0, 1.0, 0.0]);
    assert!(dataset.slice(8..12).is_err());
}

#[test]
fn test_labels_for_each_classifier() {
    let dir = TempDir::new().unwrap();
    write_csv(&dir, "mixed", "0.1,2\n0.2,1\n0.3,2\n");

    let dataset = LabeledDataset::load("mixed", "csv", dir.path(), 0).unwrap();

    assert_eq!(dataset.class_labels().unwrap(), vec![2, 1, 2]);
    assert_eq!(dataset.to_signed_labels(2.0), vec![1.0, -1.0, 1.0]);
}

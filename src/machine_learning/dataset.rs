//! Tabular datasets loaded from delimited text files

use std::ops::Range;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use ndarray::{s, Array2};
use tracing::debug;

use crate::machine_learning::core::ModelError;

/// Feature rows with one numeric label per row
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDataset {
    pub features: Array2<f64>,
    pub labels: Vec<f64>,
}

impl LabeledDataset {
    /// Create a dataset from feature and label arrays
    pub fn new(features: Array2<f64>, labels: Vec<f64>) -> Result<Self, ModelError> {
        if features.nrows() != labels.len() {
            return Err(ModelError::DimensionMismatch(format!(
                "Number of feature rows ({}) does not match number of labels ({})",
                features.nrows(),
                labels.len()
            )));
        }

        Ok(LabeledDataset { features, labels })
    }

    /// Load `<path><name>.<extension>`.
    ///
    /// The first `rows_to_skip` records are discarded. Every remaining record
    /// must be numeric; its last column is the label and the others are
    /// features.
    pub fn load(name: &str, extension: &str, path: impl AsRef<Path>, rows_to_skip: usize) -> Result<Self, ModelError> {
        let file = Self::file_path(name, extension, path);
        debug!(file = %file.display(), rows_to_skip, "loading dataset");

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_path(&file)
            .map_err(|e| ModelError::Dataset(format!("{}: {}", file.display(), e)))?;

        let mut rows: Vec<Vec<f64>> = Vec::new();
        for (index, record) in reader.records().enumerate().skip(rows_to_skip) {
            let record = record.map_err(|e| ModelError::Dataset(e.to_string()))?;
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }

            let row = record
                .iter()
                .map(|field| {
                    field.parse::<f64>().map_err(|_| {
                        ModelError::Dataset(format!("Non-numeric value '{}' in row {}", field, index))
                    })
                })
                .collect::<Result<Vec<f64>, ModelError>>()?;

            if row.len() < 2 {
                return Err(ModelError::Dataset(format!(
                    "Row {} has {} columns, need at least one feature and a label",
                    index,
                    row.len()
                )));
            }
            if let Some(first) = rows.first() {
                if first.len() != row.len() {
                    return Err(ModelError::Dataset(format!(
                        "Row {} has {} columns, expected {}",
                        index,
                        row.len(),
                        first.len()
                    )));
                }
            }

            rows.push(row);
        }

        let n_samples = rows.len();
        let n_features = rows.first().map_or(0, |row| row.len() - 1);

        let mut features = Array2::zeros((n_samples, n_features));
        let mut labels = Vec::with_capacity(n_samples);
        for (i, row) in rows.iter().enumerate() {
            for j in 0..n_features {
                features[[i, j]] = row[j];
            }
            labels.push(row[n_features]);
        }

        debug!(samples = n_samples, features = n_features, "dataset loaded");
        Ok(LabeledDataset { features, labels })
    }

    fn file_path(name: &str, extension: &str, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref().join(format!("{}.{}", name, extension))
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of features per sample
    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    /// Keep only the rows in `range`
    pub fn slice(&self, range: Range<usize>) -> Result<Self, ModelError> {
        if range.start > range.end || range.end > self.len() {
            return Err(ModelError::Dataset(format!(
                "Row range {}..{} out of bounds for dataset of length {}",
                range.start,
                range.end,
                self.len()
            )));
        }

        Ok(LabeledDataset {
            features: self.features.slice(s![range.clone(), ..]).to_owned(),
            labels: self.labels[range].to_vec(),
        })
    }

    /// Map `positive` to +1 and every other label to -1
    pub fn to_signed_labels(&self, positive: f64) -> Vec<f64> {
        self.labels
            .iter()
            .map(|&label| if label == positive { 1.0 } else { -1.0 })
            .collect()
    }

    /// Labels as integer class identifiers
    pub fn class_labels(&self) -> Result<Vec<i64>, ModelError> {
        self.labels
            .iter()
            .enumerate()
            .map(|(index, &label)| {
                if label.fract() != 0.0 || !label.is_finite() {
                    Err(ModelError::InvalidLabel {
                        index,
                        label,
                        reason: "class labels must be integers".to_string(),
                    })
                } else {
                    Ok(label as i64)
                }
            })
            .collect()
    }

    /// Normalize features using min-max scaling
    pub fn normalize_min_max(&mut self) {
        for mut column in self.features.columns_mut() {
            let min_val = column.fold(f64::INFINITY, |a, &b| a.min(b));
            let max_val = column.fold(f64::NEG_INFINITY, |a, &b| a.max(b));

            // Constant columns are left untouched
            let range = max_val - min_val;
            if range > 1e-10 {
                column.mapv_inplace(|v| (v - min_val) / range);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_normalize_min_max() {
        let mut dataset = LabeledDataset::new(array![[0.0, 5.0], [2.0, 5.0], [4.0, 5.0]], vec![0.0, 1.0, 0.0]).unwrap();
        dataset.normalize_min_max();

        assert_eq!(dataset.features.column(0).to_vec(), vec![0.0, 0.5, 1.0]);
        assert_eq!(dataset.features.column(1).to_vec(), vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_signed_and_class_labels() {
        let dataset = LabeledDataset::new(Array2::zeros((3, 1)), vec![1.0, 0.0, 1.0]).unwrap();
        assert_eq!(dataset.to_signed_labels(1.0), vec![1.0, -1.0, 1.0]);
        assert_eq!(dataset.class_labels().unwrap(), vec![1, 0, 1]);

        let fractional = LabeledDataset::new(Array2::zeros((1, 1)), vec![0.5]).unwrap();
        assert!(fractional.class_labels().is_err());
    }

    #[test]
    fn test_slice_bounds() {
        let dataset = LabeledDataset::new(Array2::zeros((5, 2)), vec![0.0; 5]).unwrap();
        assert_eq!(dataset.slice(1..4).unwrap().len(), 3);
        assert!(dataset.slice(3..6).is_err());
    }
}

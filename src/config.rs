//! Run configuration loaded from JSON
//!
//! A configuration names the dataset, the register size, the embedding and
//! the classification method with its hyperparameters. Every field has a
//! default, so `{}` is a valid configuration.

use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::machine_learning::core::training_count;
use crate::machine_learning::loss::{BinaryCrossEntropy, ErrorMetric, MeanAbsoluteError, MeanSquaredError};
use crate::machine_learning::optimizer::{Adam, GradientDescent, NelderMead, Optimizer, Spsa};
use crate::machine_learning::quantum::qcnn::parameter_count;
use crate::quantum::embedding::{AmplitudeEmbedding, AngleEmbedding, Embedding, IqpEmbedding};
use crate::quantum::gate::Axis;

/// Errors raised while reading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Where the samples come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub name: String,
    pub extension: String,
    pub path: String,
    pub rows_to_skip: usize,
    /// Half-open row range kept after loading, `[start, end]`
    pub rows: Option<[usize; 2]>,
    /// Label mapped to +1 for the QCNN; every other label becomes -1
    pub positive_label: f64,
    /// Min-max scale every feature column before classification
    pub normalize: bool,
}

impl DatasetConfig {
    pub fn row_range(&self) -> Option<Range<usize>> {
        self.rows.map(|[start, end]| start..end)
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            name: "HTRU_2".to_string(),
            extension: "csv".to_string(),
            path: "datasets/".to_string(),
            rows_to_skip: 0,
            rows: Some([1949, 2049]),
            positive_label: 1.0,
            normalize: false,
        }
    }
}

fn default_rotation() -> Axis {
    Axis::Y
}

fn default_repeats() -> usize {
    1
}

/// Embedding strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbeddingConfig {
    Angle {
        #[serde(default = "default_rotation")]
        rotation: Axis,
    },
    Amplitude,
    Iqp {
        #[serde(default = "default_repeats")]
        n_repeats: usize,
    },
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig::Angle { rotation: Axis::Y }
    }
}

impl EmbeddingConfig {
    pub fn build(&self) -> Arc<dyn Embedding> {
        match *self {
            EmbeddingConfig::Angle { rotation } => Arc::new(AngleEmbedding::new(rotation)),
            EmbeddingConfig::Amplitude => Arc::new(AmplitudeEmbedding),
            EmbeddingConfig::Iqp { n_repeats } => Arc::new(IqpEmbedding::new(n_repeats)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    GradientDescent,
    Adam,
    Spsa,
    NelderMead,
}

/// Optimizer and its hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub kind: OptimizerKind,
    pub max_iterations: usize,
    /// Step size; the SPSA gain `a` for [`OptimizerKind::Spsa`]
    pub learning_rate: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            kind: OptimizerKind::Spsa,
            max_iterations: 50,
            learning_rate: 0.2,
        }
    }
}

impl OptimizerConfig {
    /// Instantiate the optimizer; `seed` makes stochastic optimizers reproducible
    pub fn build(&self, seed: Option<u64>) -> Box<dyn Optimizer> {
        match self.kind {
            OptimizerKind::GradientDescent => Box::new(GradientDescent::new(self.learning_rate, self.max_iterations)),
            OptimizerKind::Adam => Box::new(Adam::with_learning_rate(self.learning_rate, self.max_iterations)),
            OptimizerKind::Spsa => {
                let spsa = Spsa::new(self.learning_rate, 0.1, self.max_iterations);
                Box::new(match seed {
                    Some(seed) => spsa.with_seed(seed),
                    None => spsa,
                })
            }
            OptimizerKind::NelderMead => Box::new(NelderMead::new(self.max_iterations)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMetricKind {
    #[default]
    MeanSquared,
    MeanAbsolute,
    BinaryCrossEntropy,
}

impl ErrorMetricKind {
    pub fn build(&self) -> Box<dyn ErrorMetric> {
        match self {
            ErrorMetricKind::MeanSquared => Box::new(MeanSquaredError),
            ErrorMetricKind::MeanAbsolute => Box::new(MeanAbsoluteError),
            ErrorMetricKind::BinaryCrossEntropy => Box::new(BinaryCrossEntropy),
        }
    }
}

fn default_c() -> f64 {
    1.0
}

/// Classification method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MethodConfig {
    Kernel {
        #[serde(default = "default_c")]
        c: f64,
    },
    Qcnn {
        #[serde(default)]
        optimizer: OptimizerConfig,
        #[serde(default)]
        error_metric: ErrorMetricKind,
        /// Train with one batch per cost evaluation when set
        #[serde(default)]
        num_batches: Option<usize>,
    },
}

impl MethodConfig {
    pub fn kernel() -> Self {
        MethodConfig::Kernel { c: default_c() }
    }

    pub fn qcnn() -> Self {
        MethodConfig::Qcnn {
            optimizer: OptimizerConfig::default(),
            error_metric: ErrorMetricKind::default(),
            num_batches: None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MethodConfig::Kernel { .. } => "kernel",
            MethodConfig::Qcnn { .. } => "qcnn",
        }
    }
}

impl Default for MethodConfig {
    fn default() -> Self {
        MethodConfig::kernel()
    }
}

/// Complete configuration of one classification run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub dataset: DatasetConfig,
    pub num_qubits: usize,
    pub training_ratio: f64,
    pub embedding: EmbeddingConfig,
    pub method: MethodConfig,
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            dataset: DatasetConfig::default(),
            num_qubits: 4,
            training_ratio: 0.8,
            embedding: EmbeddingConfig::default(),
            method: MethodConfig::default(),
            seed: None,
        }
    }
}

impl RunConfig {
    /// Read and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values serde cannot check
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_qubits == 0 {
            return Err(ConfigError::Invalid("num_qubits must be positive".to_string()));
        }
        if !(self.training_ratio > 0.0 && self.training_ratio < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "training_ratio must lie strictly between 0 and 1, got {}",
                self.training_ratio
            )));
        }
        if let Some([start, end]) = self.dataset.rows {
            if start >= end {
                return Err(ConfigError::Invalid(format!("empty row range {}..{}", start, end)));
            }
        }
        match &self.method {
            MethodConfig::Kernel { c } if !(*c > 0.0) => {
                Err(ConfigError::Invalid(format!("C must be positive, got {}", c)))
            }
            MethodConfig::Qcnn { num_batches: Some(0), .. } => {
                Err(ConfigError::Invalid("num_batches must be positive".to_string()))
            }
            MethodConfig::Qcnn { .. } if self.num_qubits < 2 => {
                Err(ConfigError::Invalid("the QCNN needs at least 2 qubits".to_string()))
            }
            MethodConfig::Qcnn { optimizer, num_batches: Some(num_batches), .. } => {
                self.validate_batches(optimizer, *num_batches)
            }
            _ => Ok(()),
        }
    }

    /// Every cost evaluation consumes one batch, so the optimizer's worst case
    /// must fit in `num_batches`, and each batch needs at least one sample.
    fn validate_batches(&self, optimizer: &OptimizerConfig, num_batches: usize) -> Result<(), ConfigError> {
        let num_parameters = parameter_count(self.num_qubits);
        let required = optimizer.build(self.seed).max_cost_evaluations(num_parameters);
        if num_batches < required {
            return Err(ConfigError::Invalid(format!(
                "num_batches is {} but the {:?} optimizer may evaluate the cost {} times for {} parameters",
                num_batches, optimizer.kind, required, num_parameters
            )));
        }

        if let Some([start, end]) = self.dataset.rows {
            let training = training_count(end - start, self.training_ratio)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if num_batches > training {
                return Err(ConfigError::Invalid(format!(
                    "num_batches is {} but only {} training rows are selected",
                    num_batches, training
                )));
            }
        }

        Ok(())
    }
}

//! Configuration for SOM training, BMU search and the on-disk cache.

use crate::error::{Result, SomError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Main configuration for a self-organizing map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Training loop configuration.
    pub training: TrainingConfig,

    /// Best-matching-unit search configuration.
    pub search: SearchConfig,

    /// Cached state configuration.
    pub storage: StorageConfig,
}

impl Config {
    /// Checks every section for values that would make training meaningless.
    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        self.search.validate()
    }
}

/// How prototype vectors are initialized before training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitMode {
    /// Gaussian noise scaled by the per-feature standard deviation of the data.
    Random,
    /// Uniform noise in `[0, 1)` shifted by the first feature of the first sample.
    UniformOffset,
}

impl FromStr for InitMode {
    type Err = SomError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(InitMode::Random),
            "uniform-offset" => Ok(InitMode::UniformOffset),
            other => Err(SomError::InvalidConfig(format!(
                "Invalid init \"{}\", should be one of random, uniform-offset",
                other
            ))),
        }
    }
}

impl fmt::Display for InitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitMode::Random => write!(f, "random"),
            InitMode::UniformOffset => write!(f, "uniform-offset"),
        }
    }
}

/// Learning-rate and neighborhood scheduling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrainingMode {
    /// Per-epoch geometric decay of the learning rate towards `eta` and of the
    /// kernel width from half the mean separation towards 0.5.
    Progressive,
    /// Per-sample exponential decay between fixed start and end constants
    /// ("SOMz" schedule).
    Exponential,
}

impl FromStr for TrainingMode {
    type Err = SomError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "progressive" => Ok(TrainingMode::Progressive),
            "exponential" | "somz" => Ok(TrainingMode::Exponential),
            other => Err(SomError::InvalidConfig(format!(
                "Invalid training mode \"{}\", should be one of progressive, exponential",
                other
            ))),
        }
    }
}

/// Training loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs.
    /// Default: 100.
    pub maxiter: usize,

    /// Fraction of the data sampled (with replacement) in each epoch.
    /// Default: 0.1.
    pub iterfrac: f64,

    /// Final learning rate of the progressive schedule.
    /// Default: 0.5.
    pub eta: f64,

    /// Prototype initialization.
    /// Default: random.
    pub init: InitMode,

    /// Random seed for reproducibility.
    /// Default: 123.
    pub seed: u64,

    /// Scheduling strategy.
    /// Default: progressive.
    pub mode: TrainingMode,

    /// Starting learning rate of the exponential schedule.
    /// Default: 0.8.
    pub alpha_start: f64,

    /// Final learning rate of the exponential schedule.
    /// Default: 0.5.
    pub alpha_end: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            maxiter: 100,
            iterfrac: 0.1,
            eta: 0.5,
            init: InitMode::Random,
            seed: 123,
            mode: TrainingMode::Progressive,
            alpha_start: 0.8,
            alpha_end: 0.5,
        }
    }
}

impl TrainingConfig {
    /// Returns the configuration of the exponential ("SOMz") schedule, which
    /// pairs with uniform-offset initialization.
    pub fn somz() -> Self {
        Self {
            mode: TrainingMode::Exponential,
            init: InitMode::UniformOffset,
            ..Default::default()
        }
    }

    /// Number of samples drawn per epoch for a dataset of `n` rows.
    #[inline]
    pub fn batch_size(&self, n: usize) -> usize {
        (self.iterfrac * n as f64).round() as usize
    }

    /// Validates the numeric knobs.
    pub fn validate(&self) -> Result<()> {
        if !self.iterfrac.is_finite() || self.iterfrac < 0.0 {
            return Err(SomError::InvalidConfig(format!(
                "iterfrac must be a non-negative number, got {}",
                self.iterfrac
            )));
        }
        if !self.eta.is_finite() || self.eta <= 0.0 {
            return Err(SomError::InvalidConfig(format!(
                "eta must be positive, got {}",
                self.eta
            )));
        }
        if !(self.alpha_start > 0.0 && self.alpha_end > 0.0) {
            return Err(SomError::InvalidConfig(format!(
                "exponential schedule rates must be positive, got {} -> {}",
                self.alpha_start, self.alpha_end
            )));
        }
        Ok(())
    }
}

/// Best-matching-unit search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of samples compared against all prototypes at once.
    /// Trades peak memory for loop overhead; never changes results.
    /// Default: 1024.
    pub batch_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { batch_size: 1024 }
    }
}

impl SearchConfig {
    /// Validates the batch size.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SomError::InvalidConfig(
                "BMU search batch size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cached map state configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `weights.bin` and `loss.bin`.
    /// Default: None (nothing is cached).
    pub directory: Option<PathBuf>,

    /// Restore cached weights and loss instead of training when both exist.
    /// Default: true.
    pub use_saved: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: None,
            use_saved: true,
        }
    }
}

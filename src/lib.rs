//! # Somgrid - Self-Organizing Maps for photometric data
//!
//! Somgrid trains self-organizing maps (SOMs) on numeric catalogs and uses
//! them for nonparametric regression, e.g. estimating photometric redshifts
//! from galaxy colors.
//!
//! ## Overview
//!
//! A SOM is a lattice of nodes, each holding a prototype vector in data
//! space. Training pulls prototypes towards the samples they best match and,
//! through a shrinking neighborhood kernel, towards samples matched by nearby
//! nodes. After training, every sample is assigned to its best matching cell
//! and a cell's prediction is an aggregate of the targets it received.
//!
//! ## Key Features
//!
//! - **Rectangular lattices** of any dimensionality with per-axis wrapping
//!   and L0/L1/L2 map metrics
//! - **Two training schedules**: progressive power-law decay and exponential
//!   per-sample decay (SOMz)
//! - **Parallel batched BMU search**
//! - **Per-cell inference**: predictions, target densities, U-matrix
//! - **Binary cache** of trained weights and loss history, keyed by a
//!   signature of the data and the training settings
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use somgrid::{Grid, Metric, Som};
//!
//! let grid = Grid::new(&[-10, -10], Metric::L2)?; // 10x10 torus
//! let mut som = Som::new(grid);
//! som.fit(colors.view())?;
//! som.map(colors.view(), redshift.view())?;
//!
//! let photo_z = som.map_to_som(test_colors.view())?;
//! ```
//!
//! ## Architecture
//!
//! - [`geometry`] - Lattice topology and node separations
//! - [`som`] - Training, BMU search and inference
//! - [`stats`] - Per-cell aggregations and histograms
//! - [`storage`] - Cached weights and loss
//! - [`table`] - Named-column input tables

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod geometry;
pub mod som;
pub mod stats;
pub mod storage;
pub mod table;

// Re-export commonly used types
pub use config::{Config, InitMode, SearchConfig, StorageConfig, TrainingConfig, TrainingMode};
pub use error::{Result, SomError};
pub use geometry::{Grid, MapGeometry, Metric};
pub use som::{find_bmu, CellMap, EpochReport, Som, SomTrainer};
pub use storage::{CacheKey, MapStore};
pub use table::Table;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of training epochs.
pub const DEFAULT_MAXITER: usize = 100;

/// Default fraction of the data sampled per epoch.
pub const DEFAULT_ITERFRAC: f64 = 0.1;

/// Default final learning rate of the progressive schedule.
pub const DEFAULT_ETA: f64 = 0.5;

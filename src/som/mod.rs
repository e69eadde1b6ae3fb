//! Self-Organizing Map (SOM) module.
//!
//! - **Training** (training.rs): online updates with two decay schedules,
//!   the progressive power-law schedule and the exponential SOMz schedule
//! - **BMU search** (bmu.rs): batched, parallel best-matching-unit lookup
//! - **Inference** (inference.rs): mapping data onto cells, per-cell
//!   predictions, densities and visualization helpers

pub mod bmu;
pub mod inference;
mod map;
pub mod training;

pub use bmu::{find_bmu, DEFAULT_BATCH_SIZE};
pub use inference::{CellMap, DEFAULT_DENSITY_RANGE};
pub use map::Som;
pub use training::{neighborhood, EpochReport, SomTrainer};

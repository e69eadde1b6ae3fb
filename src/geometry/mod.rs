//! Map geometries: lattice topology and pairwise node separations.
//!
//! A geometry only describes map space. It knows how many nodes the map has
//! and how far apart any two nodes are, and nothing about data space.
//! Training and inference consume the separations through [`MapGeometry`],
//! so new lattices (hexagonal, irregular) slot in without touching them.

mod grid;

pub use grid::Grid;

use crate::error::{Result, SomError};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A lattice of nodes with a fixed matrix of map-space separations.
pub trait MapGeometry {
    /// The flattened number of nodes.
    fn size(&self) -> usize;

    /// The `(size, size)` matrix of pairwise separations between nodes.
    ///
    /// Symmetric, non-negative and zero on the diagonal. Implementations
    /// compute it on first access and return the cached matrix afterwards.
    fn separations(&self) -> &Array2<f64>;

    /// Mean over every entry of the separation matrix, diagonal included.
    fn mean_separation(&self) -> f64 {
        self.separations().mean().unwrap_or(0.0)
    }

    /// Largest separation between any two nodes.
    fn max_separation(&self) -> f64 {
        self.separations().iter().copied().fold(0.0, f64::max)
    }

    /// Smallest strictly positive separation, i.e. the spacing of adjacent
    /// nodes. `None` for a single-node map.
    fn min_positive_separation(&self) -> Option<f64> {
        self.separations()
            .iter()
            .copied()
            .filter(|&s| s > 0.0)
            .fold(None, |acc: Option<f64>, s| {
                Some(acc.map_or(s, |m| m.min(s)))
            })
    }
}

/// How per-axis index differences combine into one separation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Chebyshev: the largest per-axis difference.
    L0,
    /// Manhattan: the sum of per-axis differences.
    L1,
    /// Euclidean: the root of the summed squared differences.
    L2,
}

impl FromStr for Metric {
    type Err = SomError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "L0" => Ok(Metric::L0),
            "L1" => Ok(Metric::L1),
            "L2" => Ok(Metric::L2),
            other => Err(SomError::InvalidConfig(format!(
                "Invalid metric \"{}\", should be one of L0, L1, L2",
                other
            ))),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::L0 => write!(f, "L0"),
            Metric::L1 => write!(f, "L1"),
            Metric::L2 => write!(f, "L2"),
        }
    }
}

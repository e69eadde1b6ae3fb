//! Identity of a training run, stored alongside its cached results.

use crate::config::{InitMode, TrainingConfig, TrainingMode};
use crate::geometry::MapGeometry;
use ndarray::{ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex sha256 over the data shape, the row index of each column's minimum
/// and maximum, the map size and the epoch count.
///
/// Cheap to compute and stable across runs, but only a fingerprint: two
/// datasets sharing shape and extreme positions collide.
pub fn signature(data: ArrayView2<'_, f64>, size: usize, maxiter: usize) -> String {
    let (n, dim) = data.dim();
    let mut fields: Vec<i64> = Vec::with_capacity(2 * dim + 4);
    fields.push(n as i64);
    fields.push(dim as i64);
    fields.extend(data.axis_iter(Axis(1)).map(|c| first_extreme(c, |v, best| v < best) as i64));
    fields.extend(data.axis_iter(Axis(1)).map(|c| first_extreme(c, |v, best| v > best) as i64));
    fields.push(size as i64);
    fields.push(maxiter as i64);

    let mut hasher = Sha256::new();
    for field in &fields {
        hasher.update(field.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Hex sha256 of a geometry's separation matrix.
pub fn geometry_digest<G: MapGeometry + ?Sized>(geometry: &G) -> String {
    let mut hasher = Sha256::new();
    hasher.update((geometry.size() as u64).to_le_bytes());
    for s in geometry.separations() {
        hasher.update(s.to_bits().to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

fn first_extreme(column: ArrayView1<'_, f64>, better: impl Fn(f64, f64) -> bool) -> usize {
    let mut best = 0;
    for (i, &v) in column.iter().enumerate() {
        if better(v, column[best]) {
            best = i;
        }
    }
    best
}

/// Everything that determines a trained map besides the code itself.
///
/// A cache is only reused when its key equals the key of the requested run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheKey {
    /// Data signature, see [`signature`].
    pub signature: String,
    /// Digest of the map geometry.
    pub geometry: String,
    /// Random seed.
    pub seed: u64,
    /// Scheduling strategy.
    pub mode: TrainingMode,
    /// Prototype initialization.
    pub init: InitMode,
    /// Fraction of the data sampled per epoch.
    pub iterfrac: f64,
    /// Final learning rate of the progressive schedule.
    pub eta: f64,
    /// Starting learning rate of the exponential schedule.
    pub alpha_start: f64,
    /// Final learning rate of the exponential schedule.
    pub alpha_end: f64,
}

impl CacheKey {
    /// Builds the key of training `geometry` on `data` with `config`.
    pub fn new<G: MapGeometry + ?Sized>(
        data: ArrayView2<'_, f64>,
        geometry: &G,
        config: &TrainingConfig,
    ) -> Self {
        Self {
            signature: signature(data, geometry.size(), config.maxiter),
            geometry: geometry_digest(geometry),
            seed: config.seed,
            mode: config.mode,
            init: config.init,
            iterfrac: config.iterfrac,
            eta: config.eta,
            alpha_start: config.alpha_start,
            alpha_end: config.alpha_end,
        }
    }
}

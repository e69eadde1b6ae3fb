//! Self-Organizing Map implementation.

use crate::config::Config;
use crate::error::{Result, SomError};
use crate::geometry::{Grid, MapGeometry};
use crate::som::bmu;
use crate::som::inference::CellMap;
use crate::som::training::{EpochReport, SomTrainer};
use crate::storage::{CacheKey, MapStore};
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView2};

/// A self-organizing map over a lattice geometry.
///
/// Holds one `D`-dimensional prototype per lattice node as the columns of a
/// `(D, size)` matrix, the loss history of the last training run, and the
/// per-cell distributions of the last [`Som::map`] call.
#[derive(Debug, Clone)]
pub struct Som<G: MapGeometry = Grid> {
    geometry: G,
    config: Config,
    weights: Option<Array2<f64>>,
    loss: Option<Array1<f64>>,
    pub(crate) cells: Option<CellMap>,
}

impl<G: MapGeometry> Som<G> {
    /// Creates an untrained map with the default configuration.
    pub fn new(geometry: G) -> Self {
        Self::with_config(geometry, Config::default())
    }

    /// Creates an untrained map with the given configuration.
    pub fn with_config(geometry: G, config: Config) -> Self {
        Self {
            geometry,
            config,
            weights: None,
            loss: None,
            cells: None,
        }
    }

    /// The map geometry.
    #[inline]
    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    /// The map configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access to the configuration, e.g. to retrain with new knobs.
    #[inline]
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Number of lattice nodes.
    #[inline]
    pub fn size(&self) -> usize {
        self.geometry.size()
    }

    /// The `(D, size)` prototype matrix, if trained.
    #[inline]
    pub fn weights(&self) -> Option<&Array2<f64>> {
        self.weights.as_ref()
    }

    /// The per-epoch loss history, if trained.
    #[inline]
    pub fn loss(&self) -> Option<&Array1<f64>> {
        self.loss.as_ref()
    }

    /// Returns true once prototypes exist.
    #[inline]
    pub fn is_trained(&self) -> bool {
        self.weights.is_some()
    }

    pub(crate) fn trained_weights(&self) -> Result<&Array2<f64>> {
        self.weights.as_ref().ok_or(SomError::NotTrained)
    }

    /// Installs previously trained `(D, size)` prototypes and loss history.
    pub fn restore(&mut self, weights: Array2<f64>, loss: Array1<f64>) -> Result<()> {
        if weights.ncols() != self.size() {
            return Err(SomError::LengthMismatch {
                expected: self.size(),
                found: weights.ncols(),
            });
        }
        self.weights = Some(weights);
        self.loss = Some(loss);
        self.cells = None;
        Ok(())
    }

    /// Finds the best matching unit of every row of the `(N, D)` data.
    pub fn find_bmu(&self, data: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        let weights = self.trained_weights()?;
        bmu::find_bmu(data, weights.view(), self.config.search.batch_size)
    }

    /// Trains the map on the `(N, D)` data.
    pub fn fit(&mut self, data: ArrayView2<'_, f64>) -> Result<()> {
        self.fit_with_progress(data, |_| {})
    }

    /// Trains the map, calling `on_epoch` after every epoch.
    ///
    /// When a cache directory is configured and `use_saved` is set, weights
    /// and loss saved by an earlier run with the same data signature,
    /// geometry, seed and schedule settings are restored instead of training.
    /// Missing, unreadable or foreign cache files fall through to a fresh
    /// run, whose result is then written to the cache.
    pub fn fit_with_progress<F>(&mut self, data: ArrayView2<'_, f64>, on_epoch: F) -> Result<()>
    where
        F: FnMut(&EpochReport),
    {
        self.config.validate()?;

        let store = self.config.storage.directory.as_ref().map(MapStore::new);
        let key = store
            .is_some()
            .then(|| CacheKey::new(data, &self.geometry, &self.config.training));
        if let (Some(store), Some(key)) = (&store, &key) {
            if self.config.storage.use_saved && self.restore_from(store, key, data.ncols()) {
                return Ok(());
            }
        }

        let mut trainer = SomTrainer::new(self.config.training.clone());
        let mut weights = trainer.initialize(data, self.geometry.size())?;
        let loss = trainer.train(&mut weights, data, &self.geometry, on_epoch)?;

        if let (Some(store), Some(key)) = (&store, &key) {
            store.save(key, weights.t(), loss.view())?;
            info!("Saved weights and loss to {}", store.directory().display());
        }

        self.weights = Some(weights);
        self.loss = Some(loss);
        self.cells = None;
        Ok(())
    }

    /// Tries to restore cached state of the run `key` on `dim`-feature data.
    /// Returns true on success; every failure is treated as a cache miss.
    fn restore_from(&mut self, store: &MapStore, key: &CacheKey, dim: usize) -> bool {
        let cached = match store.load() {
            Ok(Some(cached)) => cached,
            Ok(None) => {
                debug!("No cached state in {}", store.directory().display());
                return false;
            }
            Err(e) => {
                warn!(
                    "Ignoring unreadable cache in {}: {}",
                    store.directory().display(),
                    e
                );
                return false;
            }
        };

        if cached.key != *key {
            warn!(
                "Ignoring cache in {}: written by another run (signature {}, seed {}, {:?} mode), expected signature {}, seed {}, {:?} mode",
                store.directory().display(),
                cached.key.signature,
                cached.key.seed,
                cached.key.mode,
                key.signature,
                key.seed,
                key.mode
            );
            return false;
        }

        let (weights, loss) = (cached.weights, cached.loss);
        let maxiter = self.config.training.maxiter;
        if weights.dim() != (self.size(), dim) || loss.len() != maxiter {
            warn!(
                "Ignoring cache in {}: found {:?} weights and {} losses, expected ({}, {}) and {}",
                store.directory().display(),
                weights.dim(),
                loss.len(),
                self.size(),
                dim,
                maxiter
            );
            return false;
        }

        info!("Restoring weights and loss from {}", store.directory().display());
        self.weights = Some(weights.t().as_standard_layout().into_owned());
        self.loss = Some(loss);
        self.cells = None;
        true
    }
}

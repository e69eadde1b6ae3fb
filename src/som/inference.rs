//! Mapping data onto a trained SOM and per-cell statistics.
//!
//! [`Som::map`] assigns every sample to its best matching cell and keeps the
//! per-cell distributions of features and targets. Predictions, densities and
//! the other statistics below are all derived from those distributions.
//! Cells that received no samples are expected; their statistics are NaN.

use crate::error::{Result, SomError};
use crate::geometry::{Grid, MapGeometry};
use crate::som::Som;
use crate::stats;
use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, IxDyn};
use rayon::prelude::*;

/// Default target range covered by [`Som::build_density`].
pub const DEFAULT_DENSITY_RANGE: (f64, f64) = (0.0, 3.0);

/// Per-cell distributions produced by [`Som::map`].
#[derive(Debug, Clone)]
pub struct CellMap {
    indices: Vec<usize>,
    feature_dist: Vec<Array2<f64>>,
    target_dist: Vec<Vec<f64>>,
    target_vals: Array1<f64>,
    target_pred: Array1<f64>,
    counts: Array1<usize>,
}

impl CellMap {
    fn build<F>(
        indices: Vec<usize>,
        data: ArrayView2<'_, f64>,
        target: ArrayView1<'_, f64>,
        size: usize,
        aggregate: F,
    ) -> Self
    where
        F: Fn(&[f64]) -> f64,
    {
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); size];
        for (sample, &cell) in indices.iter().enumerate() {
            members[cell].push(sample);
        }

        let dim = data.ncols();
        let feature_dist: Vec<Array2<f64>> = members
            .par_iter()
            .map(|rows| Array2::from_shape_fn((rows.len(), dim), |(r, k)| data[[rows[r], k]]))
            .collect();
        let target_dist: Vec<Vec<f64>> = members
            .iter()
            .map(|rows| rows.iter().map(|&i| target[i]).collect())
            .collect();

        let target_vals: Array1<f64> = target_dist.iter().map(|t| aggregate(t)).collect();
        let target_pred: Array1<f64> = indices.iter().map(|&cell| target_vals[cell]).collect();
        let counts: Array1<usize> = members.iter().map(Vec::len).collect();

        Self {
            indices,
            feature_dist,
            target_dist,
            target_vals,
            target_pred,
            counts,
        }
    }

    /// Best matching cell of every mapped sample.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Feature rows assigned to `cell`, shape `(count, D)`.
    pub fn features(&self, cell: usize) -> Option<&Array2<f64>> {
        self.feature_dist.get(cell)
    }

    /// Target values assigned to `cell`.
    pub fn targets(&self, cell: usize) -> Option<&[f64]> {
        self.target_dist.get(cell).map(Vec::as_slice)
    }

    /// Aggregated target value of every cell (NaN for empty cells).
    pub fn cell_values(&self) -> &Array1<f64> {
        &self.target_vals
    }

    /// Per-sample predictions: the value of each sample's cell.
    pub fn predictions(&self) -> &Array1<f64> {
        &self.target_pred
    }

    /// Number of samples per cell.
    pub fn counts(&self) -> &Array1<usize> {
        &self.counts
    }

    /// Number of cells that received at least one sample.
    pub fn occupied_cells(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }
}

impl<G: MapGeometry> Som<G> {
    /// Maps the training data onto the SOM, predicting each cell's target as
    /// the mean of the targets assigned to it.
    pub fn map(&mut self, data: ArrayView2<'_, f64>, target: ArrayView1<'_, f64>) -> Result<&CellMap> {
        self.map_with(data, target, stats::mean)
    }

    /// Maps the training data onto the SOM using `aggregate` to turn each
    /// cell's target distribution into its predicted value.
    pub fn map_with<F>(
        &mut self,
        data: ArrayView2<'_, f64>,
        target: ArrayView1<'_, f64>,
        aggregate: F,
    ) -> Result<&CellMap>
    where
        F: Fn(&[f64]) -> f64,
    {
        if target.len() != data.nrows() {
            return Err(SomError::LengthMismatch {
                expected: data.nrows(),
                found: target.len(),
            });
        }
        let indices = self.find_bmu(data)?;
        let cells = CellMap::build(indices, data, target, self.size(), aggregate);
        Ok(&*self.cells.insert(cells))
    }

    /// Distributions from the last [`Som::map`] call.
    pub fn cells(&self) -> Option<&CellMap> {
        self.cells.as_ref()
    }

    fn mapped(&self) -> Result<&CellMap> {
        self.cells.as_ref().ok_or(SomError::NotMapped)
    }

    /// Predicts the target of new `(N, D)` data as the value of each
    /// sample's best matching cell.
    pub fn map_to_som(&self, data: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let vals = &self.mapped()?.target_vals;
        let best = self.find_bmu(data)?;
        Ok(best.iter().map(|&cell| vals[cell]).collect())
    }

    /// Builds an `(nbins, nbins)` density matrix over the default target range.
    ///
    /// See [`Som::build_density_in`].
    pub fn build_density(
        &self,
        data: ArrayView2<'_, f64>,
        target: ArrayView1<'_, f64>,
        nbins: usize,
    ) -> Result<Array2<f64>> {
        self.build_density_in(data, target, nbins, DEFAULT_DENSITY_RANGE)
    }

    /// Builds an `(nbins, nbins)` matrix relating new targets to the
    /// training target densities of the cells they map to.
    ///
    /// For every cell with training samples, each new sample of that cell
    /// whose target falls in bin `j` adds the cell's normalized training
    /// density to column `j`. Row `i` of the result is therefore the
    /// training-target density at bin `i`, accumulated over samples whose
    /// own target lies in bin `j`.
    pub fn build_density_in(
        &self,
        data: ArrayView2<'_, f64>,
        target: ArrayView1<'_, f64>,
        nbins: usize,
        range: (f64, f64),
    ) -> Result<Array2<f64>> {
        let (lo, hi) = range;
        if nbins == 0 || !(lo < hi) {
            return Err(SomError::InvalidConfig(format!(
                "Density needs at least one bin over a non-empty range, got {} bins over [{}, {}]",
                nbins, lo, hi
            )));
        }
        if target.len() != data.nrows() {
            return Err(SomError::LengthMismatch {
                expected: data.nrows(),
                found: target.len(),
            });
        }

        let cells = self.mapped()?;
        let best = self.find_bmu(data)?;
        let mut test_dist: Vec<Vec<f64>> = vec![Vec::new(); self.size()];
        for (&cell, &t) in best.iter().zip(target.iter()) {
            test_dist[cell].push(t);
        }

        let edges = stats::bin_edges(lo, hi, nbins);
        let mut density = Array2::<f64>::zeros((nbins, nbins));

        for (train, test) in cells.target_dist.iter().zip(&test_dist) {
            if train.is_empty() {
                continue;
            }
            // Training targets entirely outside the range carry no density.
            let Some(train_rho) = stats::histogram_density(train, &edges) else {
                continue;
            };
            let test_hist = stats::histogram(test, &edges);
            for (zbin, &nz) in test_hist.iter().enumerate() {
                if nz == 0 {
                    continue;
                }
                for (row, &rho) in train_rho.iter().enumerate() {
                    density[[row, zbin]] += nz as f64 * rho;
                }
            }
        }

        Ok(density)
    }

    /// Aggregate of every cell's target distribution.
    pub fn cell_statistic<F>(&self, aggregate: F) -> Result<Array1<f64>>
    where
        F: Fn(&[f64]) -> f64,
    {
        let cells = self.mapped()?;
        Ok(cells.target_dist.iter().map(|t| aggregate(t)).collect())
    }

    /// Aggregate of one feature column within every cell.
    pub fn feature_statistic<F>(&self, feature: usize, aggregate: F) -> Result<Array1<f64>>
    where
        F: Fn(&[f64]) -> f64,
    {
        let cells = self.mapped()?;
        self.check_feature(feature)?;
        Ok(cells
            .feature_dist
            .iter()
            .map(|rows| aggregate(&rows.column(feature).to_vec()))
            .collect())
    }

    /// Aggregate, within every cell, of how far one feature of the assigned
    /// samples lies from the cell's prototype.
    pub fn residual_statistic<F>(&self, feature: usize, aggregate: F) -> Result<Array1<f64>>
    where
        F: Fn(&[f64]) -> f64,
    {
        let cells = self.mapped()?;
        self.check_feature(feature)?;
        let weights = self.trained_weights()?;
        Ok(cells
            .feature_dist
            .iter()
            .enumerate()
            .map(|(cell, rows)| {
                let prototype = weights[[feature, cell]];
                let residuals: Vec<f64> =
                    rows.column(feature).iter().map(|&v| v - prototype).collect();
                aggregate(&residuals)
            })
            .collect())
    }

    /// Prototype weights min-max scaled to `[0, 1]` per feature, shape
    /// `(size, k)`.
    ///
    /// `features` selects the columns. `None` takes the first three, the
    /// usual RGB rendering of a map. Constant features scale to 0.
    pub fn normalized_weights(&self, features: Option<&[usize]>) -> Result<Array2<f64>> {
        let weights = self.trained_weights()?;
        let dim = weights.nrows();
        let selected: Vec<usize> = match features {
            Some(f) => f.to_vec(),
            None => (0..dim.min(3)).collect(),
        };
        for &f in &selected {
            self.check_feature(f)?;
        }

        let mut out = Array2::<f64>::zeros((self.size(), selected.len()));
        for (col, &f) in selected.iter().enumerate() {
            let row = weights.row(f);
            let min = row.iter().copied().fold(f64::INFINITY, f64::min);
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let span = max - min;
            out.column_mut(col).zip_mut_with(&row, |o, &w| {
                *o = if span > 0.0 { (w - min) / span } else { 0.0 };
            });
        }
        Ok(out)
    }

    fn check_feature(&self, feature: usize) -> Result<()> {
        let dim = self.trained_weights()?.nrows();
        if feature >= dim {
            return Err(SomError::IndexOutOfBounds {
                index: feature,
                max: dim,
            });
        }
        Ok(())
    }
}

impl Som<Grid> {
    /// Sample counts per cell, shaped like the grid.
    pub fn counts_grid(&self) -> Result<ArrayD<usize>> {
        let counts = self.mapped()?.counts.clone();
        Ok(counts.into_shape_with_order(IxDyn(self.geometry().shape()))?)
    }

    /// Unified distance matrix of a 2-D grid.
    ///
    /// Each entry is the sum of data-space distances between a node's
    /// prototype and the prototypes of its direct neighbors along both axes.
    /// Edges do not wrap.
    pub fn u_matrix(&self) -> Result<Array2<f64>> {
        let shape = self.geometry().shape();
        if shape.len() != 2 {
            return Err(SomError::InvalidConfig(format!(
                "U-matrix needs a 2-D grid, got {} axes",
                shape.len()
            )));
        }
        let (rows, cols) = (shape[0], shape[1]);
        let weights = self.trained_weights()?;
        let node = |i: usize, j: usize| weights.column(i * cols + j);
        let dist = |a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>| {
            a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
        };

        Ok(Array2::from_shape_fn((rows, cols), |(i, j)| {
            let here = node(i, j);
            let mut total = 0.0;
            if i + 1 < rows {
                total += dist(here, node(i + 1, j));
            }
            if i > 0 {
                total += dist(here, node(i - 1, j));
            }
            if j > 0 {
                total += dist(here, node(i, j - 1));
            }
            if j + 1 < cols {
                total += dist(here, node(i, j + 1));
            }
            total
        }))
    }
}

//! Rectilinear lattice of arbitrary dimensionality.

use super::{MapGeometry, Metric};
use crate::error::{Result, SomError};
use ndarray::{Array2, Zip};
use once_cell::sync::OnceCell;

/// A rectilinear grid map geometry.
///
/// Nodes are flattened in row-major order: the last axis varies fastest.
/// Each axis independently uses either open or wrap-around (toroidal)
/// distances.
#[derive(Debug, Clone)]
pub struct Grid {
    shape: Vec<usize>,
    wrap: Vec<bool>,
    metric: Metric,
    size: usize,
    separations: OnceCell<Array2<f64>>,
}

impl Grid {
    /// Creates a grid from a signature of per-axis sizes.
    ///
    /// The grid shape is given by the absolute values of the signature. A
    /// negative value means distances along that axis wrap around.
    pub fn new(signature: &[isize], metric: Metric) -> Result<Self> {
        let shape: Vec<usize> = signature.iter().map(|k| k.unsigned_abs()).collect();
        let wrap: Vec<bool> = signature.iter().map(|&k| k < 0).collect();
        Self::with_wrap(&shape, &wrap, metric)
    }

    /// Creates a grid from an explicit shape and per-axis wrap flags.
    pub fn with_wrap(shape: &[usize], wrap: &[bool], metric: Metric) -> Result<Self> {
        if shape.is_empty() {
            return Err(SomError::InvalidConfig(
                "Grid needs at least one axis".to_string(),
            ));
        }
        if shape.len() != wrap.len() {
            return Err(SomError::InvalidConfig(format!(
                "Grid has {} axes but {} wrap flags",
                shape.len(),
                wrap.len()
            )));
        }
        if let Some(axis) = shape.iter().position(|&n| n == 0) {
            return Err(SomError::InvalidConfig(format!(
                "Grid axis {} has zero size",
                axis
            )));
        }

        Ok(Self {
            size: shape.iter().product(),
            shape: shape.to_vec(),
            wrap: wrap.to_vec(),
            metric,
            separations: OnceCell::new(),
        })
    }

    /// Size of each axis.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Wrap-around flag of each axis.
    #[inline]
    pub fn wrap(&self) -> &[bool] {
        &self.wrap
    }

    /// The distance metric.
    #[inline]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Number of axes.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Converts a flat node index to per-axis coordinates.
    pub fn index_to_coords(&self, index: usize) -> Vec<usize> {
        let mut coords = vec![0; self.ndim()];
        let mut rest = index;
        for (c, &n) in coords.iter_mut().zip(&self.shape).rev() {
            *c = rest % n;
            rest /= n;
        }
        coords
    }

    /// Converts per-axis coordinates to a flat node index.
    pub fn coords_to_index(&self, coords: &[usize]) -> Result<usize> {
        if coords.len() != self.ndim() {
            return Err(SomError::DimensionMismatch {
                expected: self.ndim(),
                found: coords.len(),
            });
        }
        let mut index = 0;
        for (&c, &n) in coords.iter().zip(&self.shape) {
            if c >= n {
                return Err(SomError::IndexOutOfBounds { index: c, max: n });
            }
            index = index * n + c;
        }
        Ok(index)
    }

    /// Coordinate of every node along `axis`, in flat node order.
    fn axis_coordinates(&self, axis: usize) -> Vec<usize> {
        let stride: usize = self.shape[axis + 1..].iter().product();
        let n = self.shape[axis];
        (0..self.size).map(|i| (i / stride) % n).collect()
    }

    fn calculate_separations(&self) -> Array2<f64> {
        let mut separation = Array2::<f64>::zeros((self.size, self.size));

        for (k, (&nk, &wrapk)) in self.shape.iter().zip(&self.wrap).enumerate() {
            if nk == 1 {
                continue;
            }
            let dxk = axis_offsets(nk, wrapk);
            let xk = self.axis_coordinates(k);

            Zip::indexed(&mut separation).for_each(|(i, j), s| {
                let d = dxk[[xk[i], xk[j]]];
                match self.metric {
                    Metric::L2 => *s += d * d,
                    Metric::L1 => *s += d,
                    Metric::L0 => *s = s.max(d),
                }
            });
        }

        if self.metric == Metric::L2 {
            separation.mapv_inplace(f64::sqrt);
        }
        separation
    }
}

impl MapGeometry for Grid {
    #[inline]
    fn size(&self) -> usize {
        self.size
    }

    fn separations(&self) -> &Array2<f64> {
        self.separations.get_or_init(|| self.calculate_separations())
    }
}

/// The `(n, n)` matrix of absolute index differences along one axis.
///
/// With wrap-around, any difference beyond half the axis is replaced by the
/// shorter way round the ring.
fn axis_offsets(n: usize, wrap: bool) -> Array2<f64> {
    Array2::from_shape_fn((n, n), |(a, b)| {
        let d = a.abs_diff(b);
        let d = if wrap && d > n / 2 { n - d } else { d };
        d as f64
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::SQRT_2;

    fn assert_symmetric_zero_diagonal(grid: &Grid) {
        let sep = grid.separations();
        assert_eq!(sep.dim(), (grid.size(), grid.size()));
        for i in 0..grid.size() {
            assert_eq!(sep[[i, i]], 0.0);
            for j in 0..grid.size() {
                assert_eq!(sep[[i, j]], sep[[j, i]]);
                assert!(sep[[i, j]] >= 0.0);
            }
        }
    }

    #[test]
    fn test_signature_parsing() {
        let grid = Grid::new(&[-4, 3], Metric::L1).unwrap();
        assert_eq!(grid.shape(), &[4, 3]);
        assert_eq!(grid.wrap(), &[true, false]);
        assert_eq!(grid.size(), 12);
        assert_eq!(grid.metric(), Metric::L1);
    }

    #[test]
    fn test_invalid_grids() {
        assert!(Grid::new(&[], Metric::L2).is_err());
        assert!(Grid::new(&[3, 0], Metric::L2).is_err());
        assert!(Grid::with_wrap(&[3, 3], &[true], Metric::L2).is_err());
    }

    #[test]
    fn test_open_line_all_metrics() {
        for metric in [Metric::L0, Metric::L1, Metric::L2] {
            let grid = Grid::new(&[6], metric).unwrap();
            let sep = grid.separations();
            for i in 0..6 {
                for j in 0..6 {
                    assert_eq!(sep[[i, j]], i.abs_diff(j) as f64);
                }
            }
        }
    }

    #[test]
    fn test_wrapped_line() {
        for n in [5usize, 6] {
            let grid = Grid::new(&[-(n as isize)], Metric::L2).unwrap();
            let sep = grid.separations();
            for i in 0..n {
                for j in 0..n {
                    let d = i.abs_diff(j);
                    assert_eq!(sep[[i, j]], d.min(n - d) as f64);
                }
            }
        }
    }

    #[test]
    fn test_square_l2() {
        let grid = Grid::new(&[2, 2], Metric::L2).unwrap();
        let expected = [
            [0.0, 1.0, 1.0, SQRT_2],
            [1.0, 0.0, SQRT_2, 1.0],
            [1.0, SQRT_2, 0.0, 1.0],
            [SQRT_2, 1.0, 1.0, 0.0],
        ];
        let sep = grid.separations();
        for i in 0..4 {
            for j in 0..4 {
                assert!((sep[[i, j]] - expected[i][j]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_metrics_combine_axes() {
        // Nodes (0, 0) and (2, 1) on a 3x4 open grid.
        let a = 0;
        let b = 2 * 4 + 1;
        let l0 = Grid::new(&[3, 4], Metric::L0).unwrap();
        let l1 = Grid::new(&[3, 4], Metric::L1).unwrap();
        let l2 = Grid::new(&[3, 4], Metric::L2).unwrap();
        assert_eq!(l0.separations()[[a, b]], 2.0);
        assert_eq!(l1.separations()[[a, b]], 3.0);
        assert!((l2.separations()[[a, b]] - 5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_mixed_wrap() {
        // Rows wrap, columns do not.
        let grid = Grid::new(&[-5, 5], Metric::L1).unwrap();
        let top_left = grid.coords_to_index(&[0, 0]).unwrap();
        let bottom_right = grid.coords_to_index(&[4, 4]).unwrap();
        assert_eq!(grid.separations()[[top_left, bottom_right]], 1.0 + 4.0);
        assert_symmetric_zero_diagonal(&grid);
    }

    #[test]
    fn test_degenerate_axis() {
        let flat = Grid::new(&[1, 4, 1], Metric::L2).unwrap();
        let line = Grid::new(&[4], Metric::L2).unwrap();
        assert_eq!(flat.separations(), line.separations());
    }

    #[test]
    fn test_three_dimensional() {
        let grid = Grid::new(&[2, -3, 4], Metric::L2).unwrap();
        assert_eq!(grid.size(), 24);
        assert_symmetric_zero_diagonal(&grid);
        let a = grid.coords_to_index(&[0, 0, 0]).unwrap();
        let b = grid.coords_to_index(&[1, 2, 3]).unwrap();
        // Wrapped middle axis: |0 - 2| on a ring of 3 is 1.
        assert!((grid.separations()[[a, b]] - (1.0f64 + 1.0 + 9.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_separations_cached() {
        let grid = Grid::new(&[3, 3], Metric::L2).unwrap();
        let first = grid.separations() as *const Array2<f64>;
        let second = grid.separations() as *const Array2<f64>;
        assert_eq!(first, second);
    }

    #[test]
    fn test_coordinate_conversion() {
        let grid = Grid::new(&[3, 4], Metric::L2).unwrap();
        assert_eq!(grid.index_to_coords(6), vec![1, 2]);
        assert_eq!(grid.coords_to_index(&[1, 2]).unwrap(), 6);
        assert!(grid.coords_to_index(&[3, 0]).is_err());
        assert!(grid.coords_to_index(&[1]).is_err());
    }
}

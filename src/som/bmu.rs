//! Best Matching Unit search.
//!
//! The search compares every sample against every prototype. Doing this for
//! the whole dataset at once needs an `(N, size)` distance buffer, so samples
//! are processed in fixed-size batches instead: peak memory is bounded by the
//! batch size while the assignments stay identical for any batch size.

use crate::error::{Result, SomError};
use log::debug;
use ndarray::{s, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Zip};

/// Default number of samples per search batch.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Finds the index of the closest prototype for each row of `data`.
///
/// `data` is `(N, D)` and `weights` is `(D, size)`. Distances are squared
/// Euclidean. Ties resolve to the lowest index.
pub fn find_bmu(
    data: ArrayView2<'_, f64>,
    weights: ArrayView2<'_, f64>,
    batch_size: usize,
) -> Result<Vec<usize>> {
    let (n, dim) = data.dim();
    let (weight_dim, size) = weights.dim();
    if dim != weight_dim {
        return Err(SomError::DimensionMismatch {
            expected: weight_dim,
            found: dim,
        });
    }
    if batch_size == 0 {
        return Err(SomError::InvalidConfig(
            "BMU search batch size must be positive".to_string(),
        ));
    }
    if size == 0 {
        return Err(SomError::EmptyInput("SOM has no prototypes".to_string()));
    }

    let mut bmu = Vec::with_capacity(n);
    if n == 0 {
        return Ok(bmu);
    }

    // Preallocate the fixed storage reused by every batch.
    let rows = n.min(batch_size);
    let mut distsq = Array2::<f64>::zeros((rows, size));
    debug!(
        "BMU search: {} samples in batches of {} ({:.1} Mb buffer)",
        n,
        batch_size,
        (distsq.len() * std::mem::size_of::<f64>()) as f64 / (1 << 20) as f64
    );

    for batch in data.axis_chunks_iter(Axis(0), batch_size) {
        let len = batch.nrows();
        let mut block = distsq.slice_mut(s![..len, ..]);

        Zip::from(block.rows_mut())
            .and(batch.rows())
            .par_for_each(|row, x| squared_distances(x, weights, row));

        bmu.extend(block.rows().into_iter().map(argmin));
    }

    Ok(bmu)
}

/// Writes the squared distance from `x` to every prototype into `out`.
#[inline]
pub(crate) fn squared_distances(
    x: ArrayView1<'_, f64>,
    weights: ArrayView2<'_, f64>,
    mut out: ArrayViewMut1<'_, f64>,
) {
    out.fill(0.0);
    for (&xk, wk) in x.iter().zip(weights.rows()) {
        Zip::from(&mut out).and(&wk).for_each(|d, &w| {
            let diff = xk - w;
            *d += diff * diff;
        });
    }
}

/// Index of the smallest value; the first one wins on ties.
#[inline]
pub(crate) fn argmin(values: ArrayView1<'_, f64>) -> usize {
    let mut best_idx = 0;
    let mut best = f64::INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v < best {
            best = v;
            best_idx = i;
        }
    }
    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_matrix(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-1.0..1.0))
    }

    #[test]
    fn test_find_bmu_simple() {
        // Three prototypes in 2-D, stored as columns.
        let weights = array![[0.0, 1.0, 5.0], [0.0, 1.0, 5.0]];
        let data = array![[0.1, -0.1], [0.9, 1.2], [4.0, 6.0], [100.0, 100.0]];

        let bmu = find_bmu(data.view(), weights.view(), 2).unwrap();
        assert_eq!(bmu, vec![0, 1, 2, 2]);
    }

    #[test]
    fn test_tie_breaks_to_first_index() {
        let weights = array![[1.0, -1.0, 1.0]];
        let data = array![[0.0], [1.0]];

        let bmu = find_bmu(data.view(), weights.view(), 8).unwrap();
        assert_eq!(bmu, vec![0, 0]);
    }

    #[test]
    fn test_batch_size_invariance() {
        let data = random_matrix(257, 5, 7);
        let weights = random_matrix(5, 36, 11);

        let one = find_bmu(data.view(), weights.view(), 1).unwrap();
        let odd = find_bmu(data.view(), weights.view(), 13).unwrap();
        let all = find_bmu(data.view(), weights.view(), data.nrows()).unwrap();
        let huge = find_bmu(data.view(), weights.view(), 10_000).unwrap();

        assert_eq!(one, all);
        assert_eq!(odd, all);
        assert_eq!(huge, all);
        assert_eq!(all.len(), 257);
        assert!(all.iter().all(|&b| b < 36));
    }

    #[test]
    fn test_dimension_mismatch() {
        let data = Array2::<f64>::zeros((4, 3));
        let weights = Array2::<f64>::zeros((2, 9));

        match find_bmu(data.view(), weights.view(), 4) {
            Err(SomError::DimensionMismatch { expected, found }) => {
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("expected dimension mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let data = Array2::<f64>::zeros((4, 2));
        let weights = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            find_bmu(data.view(), weights.view(), 0),
            Err(SomError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_data() {
        let data = Array2::<f64>::zeros((0, 2));
        let weights = Array2::<f64>::zeros((2, 3));
        assert!(find_bmu(data.view(), weights.view(), 4).unwrap().is_empty());
    }

    #[test]
    fn test_squared_distances() {
        let weights = array![[0.0, 3.0], [0.0, 4.0]];
        let x = array![0.0, 0.0];
        let mut out = ndarray::Array1::<f64>::zeros(2);
        squared_distances(x.view(), weights.view(), out.view_mut());
        assert_eq!(out, array![0.0, 25.0]);
    }
}

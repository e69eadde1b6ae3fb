//! Per-cell aggregation functions and fixed-range histograms.
//!
//! Aggregations take a cell's values as a slice and return one number.
//! An empty slice yields NaN, which is how empty cells surface downstream.

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of the non-NaN values. NaN if there are none.
pub fn nanmean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Median, averaging the two middle values for even lengths. NaN for an
/// empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

/// `nbins + 1` evenly spaced bin edges covering `[lo, hi]`.
pub fn bin_edges(lo: f64, hi: f64, nbins: usize) -> Vec<f64> {
    let step = (hi - lo) / nbins as f64;
    let mut edges: Vec<f64> = (0..=nbins).map(|i| lo + step * i as f64).collect();
    if let Some(last) = edges.last_mut() {
        *last = hi;
    }
    edges
}

/// Bin holding `value`: bins are half-open `[e_i, e_{i+1})` except the last,
/// which also includes its upper edge. Values outside the edges (and NaN)
/// fall in no bin.
pub fn bin_index(value: f64, edges: &[f64]) -> Option<usize> {
    let nbins = edges.len().checked_sub(1)?;
    if nbins == 0 || value.is_nan() || value < edges[0] || value > edges[nbins] {
        return None;
    }
    let i = edges.partition_point(|&e| e <= value);
    Some((i - 1).min(nbins - 1))
}

/// Number of values per bin.
pub fn histogram(values: &[f64], edges: &[f64]) -> Vec<usize> {
    let mut counts = vec![0; edges.len().saturating_sub(1)];
    for &v in values {
        if let Some(bin) = bin_index(v, edges) {
            counts[bin] += 1;
        }
    }
    counts
}

/// Probability density per bin, normalized so that it integrates to one
/// over the binned range.
///
/// Returns `None` when no value falls inside the edges.
pub fn histogram_density(values: &[f64], edges: &[f64]) -> Option<Vec<f64>> {
    let counts = histogram(values, edges);
    let total: usize = counts.iter().sum();
    if total == 0 {
        return None;
    }
    Some(
        counts
            .iter()
            .zip(edges.windows(2))
            .map(|(&c, w)| c as f64 / (total as f64 * (w[1] - w[0])))
            .collect(),
    )
}

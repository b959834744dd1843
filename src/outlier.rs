//! Robust outlier-trial rejection.
//!
//! Per trial, over its whole feature vector:
//!   mad = MAD_SCALE · median(|x − median(x)|)
//! Trials with `mad >= threshold` are dropped, features and labels together.
use ndarray::{Array1, Array2};
use tracing::info;

use crate::dataset::Dataset;

/// `−1 / (√2 · erfcinv(3/2))`: makes the MAD a consistent estimator of σ for
/// normally distributed data.
pub const MAD_SCALE: f64 = 1.482_602_218_505_602;

/// Median of `v`, averaging the two middle values for even lengths.
/// Reorders `v`.  Returns NaN for an empty slice.
pub fn median(v: &mut [f64]) -> f64 {
    let n = v.len();
    if n == 0 {
        return f64::NAN;
    }
    let mid = n / 2;
    let (lower, &mut upper, _) = v.select_nth_unstable_by(mid, f64::total_cmp);
    if n % 2 == 1 {
        upper
    } else {
        let below = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (below + upper) / 2.0
    }
}

/// Scaled median absolute deviation of every trial row.
pub fn mad_scores(features: &Array2<f32>) -> Array1<f64> {
    let mut buf: Vec<f64> = Vec::with_capacity(features.ncols());
    features
        .rows()
        .into_iter()
        .map(|row| {
            buf.clear();
            buf.extend(row.iter().map(|&v| v as f64));
            let m = median(&mut buf);
            buf.iter_mut().for_each(|v| *v = (*v - m).abs());
            MAD_SCALE * median(&mut buf)
        })
        .collect()
}

/// Keep trials whose scaled MAD is strictly below `threshold`.
///
/// Returns the filtered dataset and the number of trials dropped.
pub fn reject_outliers(dataset: &Dataset, threshold: f64) -> (Dataset, usize) {
    let scores = mad_scores(&dataset.features);
    let keep: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, &s)| s < threshold)
        .map(|(i, _)| i)
        .collect();
    let dropped = dataset.len() - keep.len();
    info!(kept = keep.len(), dropped, threshold, "MAD outlier rejection");
    (dataset.select(&keep), dropped)
}

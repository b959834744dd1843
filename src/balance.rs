//! Two-class balancing by truncating the majority class.
use anyhow::{bail, Result};
use tracing::info;

use crate::dataset::Dataset;

/// Keep the first `min(n0, n1)` trials of label 0 and of label 1, class 0
/// first.  Trials with any other label are dropped.
pub fn balance_classes(dataset: &Dataset) -> Result<Dataset> {
    let idx_of = |label: f64| -> Vec<usize> {
        dataset
            .labels
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == label)
            .map(|(i, _)| i)
            .collect()
    };
    let mut zeros = idx_of(0.0);
    let mut ones = idx_of(1.0);
    if zeros.is_empty() || ones.is_empty() {
        bail!(
            "cannot balance: {} trials of class 0 and {} of class 1",
            zeros.len(),
            ones.len()
        );
    }
    let n = zeros.len().min(ones.len());
    info!(class0 = zeros.len(), class1 = ones.len(), kept_per_class = n, "balancing classes");
    zeros.truncate(n);
    ones.truncate(n);
    zeros.extend(ones);
    Ok(dataset.select(&zeros))
}

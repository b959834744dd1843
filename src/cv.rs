//! Train/test partitioning.
//!
//! [`KFold`] follows `sklearn.model_selection.KFold(shuffle=False)`: contiguous
//! test blocks, the first `n % k` folds one trial larger.  Shuffling is done
//! beforehand with [`crate::Dataset::permute`].
use anyhow::{bail, Result};

/// One train/test partition over dataset row indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Unshuffled k-fold splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    pub n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    /// Split `0..n` into `n_splits` folds.
    pub fn split(&self, n: usize) -> Result<Vec<Fold>> {
        let k = self.n_splits;
        if k < 2 {
            bail!("n_splits must be at least 2, got {k}");
        }
        if k > n {
            bail!("cannot split {n} trials into {k} folds");
        }
        let (base, extra) = (n / k, n % k);
        let mut folds = Vec::with_capacity(k);
        let mut start = 0;
        for i in 0..k {
            let size = base + usize::from(i < extra);
            let stop = start + size;
            folds.push(Fold {
                train: (0..start).chain(stop..n).collect(),
                test: (start..stop).collect(),
            });
            start = stop;
        }
        Ok(folds)
    }
}

/// Single split: the first `floor(n · train_fraction)` trials train, the rest test.
pub fn holdout_split(n: usize, train_fraction: f64) -> Result<Fold> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        bail!("train fraction must be in (0, 1), got {train_fraction}");
    }
    let n_train = (n as f64 * train_fraction) as usize;
    if n_train == 0 || n_train == n {
        bail!("hold-out split of {n} trials at {train_fraction} leaves an empty partition");
    }
    Ok(Fold {
        train: (0..n_train).collect(),
        test: (n_train..n).collect(),
    })
}

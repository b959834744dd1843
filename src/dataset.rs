//! Row-aligned features and labels.
//!
//! Every operation that reorders or drops trials goes through
//! [`Dataset::select`], so features and labels can never drift apart.
use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use ndarray::{concatenate, Array1, Array2, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::config::LabelKind;

/// Flattened trial features `[N, D]` and one label per trial.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub features: Array2<f32>,
    pub labels: Array1<f64>,
}

impl Dataset {
    pub fn new(features: Array2<f32>, labels: Array1<f64>) -> Result<Self> {
        if features.nrows() != labels.len() {
            bail!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            );
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Rows `idx`, in that order.
    pub fn select(&self, idx: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), idx),
            labels: self.labels.select(Axis(0), idx),
        }
    }

    /// Reorder the trials by a permutation drawn from `seed`.
    pub fn permute(&self, seed: u64) -> Self {
        self.select(&permutation(self.len(), seed))
    }

    /// Stack datasets row-wise.  All parts must share the feature width.
    pub fn concat(parts: &[Dataset]) -> Result<Self> {
        let Some(first) = parts.first() else {
            bail!("no datasets to concatenate");
        };
        let width = first.features.ncols();
        if let Some(p) = parts.iter().find(|p| p.features.ncols() != width) {
            bail!("feature width mismatch: {} vs {width}", p.features.ncols());
        }
        let feats: Vec<_> = parts.iter().map(|p| p.features.view()).collect();
        let labels: Vec<_> = parts.iter().map(|p| p.labels.view()).collect();
        Ok(Self {
            features: concatenate(Axis(0), &feats)?,
            labels: concatenate(Axis(0), &labels)?,
        })
    }

    /// Labels as class indices.  Fails on anything other than 0 or 1.
    pub fn class_indices(&self) -> Result<Vec<i64>> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, &v)| match v {
                v if v == 0.0 => Ok(0),
                v if v == 1.0 => Ok(1),
                v => bail!("trial {i} has label {v}, expected 0 or 1"),
            })
            .collect()
    }

    /// Number of trials carrying `label`.
    pub fn count_label(&self, label: f64) -> usize {
        self.labels.iter().filter(|&&v| v == label).count()
    }
}

/// Flattened features of one or more subjects with every label vector the
/// files carried.  The label kind is chosen later, in [`SubjectFeatures::dataset`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectFeatures {
    pub features: Array2<f32>,
    pub labels: BTreeMap<LabelKind, Array1<f64>>,
}

impl SubjectFeatures {
    pub fn new(features: Array2<f32>, labels: BTreeMap<LabelKind, Array1<f64>>) -> Result<Self> {
        for (kind, v) in &labels {
            if v.len() != features.nrows() {
                bail!("{kind}: {} labels for {} feature rows", v.len(), features.nrows());
            }
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }

    /// Rows `idx` of the features and of every label vector.
    pub fn select(&self, idx: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), idx),
            labels: self
                .labels
                .iter()
                .map(|(&k, v)| (k, v.select(Axis(0), idx)))
                .collect(),
        }
    }

    pub fn permute(&self, seed: u64) -> Self {
        self.select(&permutation(self.len(), seed))
    }

    /// Stack subjects row-wise.  Only label kinds present in every part survive.
    pub fn concat(parts: &[SubjectFeatures]) -> Result<Self> {
        let Some(first) = parts.first() else {
            bail!("no subjects to concatenate");
        };
        let feats: Vec<_> = parts.iter().map(|p| p.features.view()).collect();
        let features = concatenate(Axis(0), &feats).context("subjects differ in feature width")?;
        let mut labels = BTreeMap::new();
        for &kind in first.labels.keys() {
            let views: Option<Vec<_>> = parts.iter().map(|p| p.labels.get(&kind).map(|v| v.view())).collect();
            if let Some(views) = views {
                labels.insert(kind, concatenate(Axis(0), &views)?);
            }
        }
        Self::new(features, labels)
    }

    /// Pair the features with one label vector.
    pub fn dataset(&self, kind: LabelKind) -> Result<Dataset> {
        let labels = self.labels.get(&kind).with_context(|| {
            let have: Vec<String> = self.labels.keys().map(|k| k.to_string()).collect();
            format!("label '{kind}' not available (have: {})", have.join(", "))
        })?;
        Dataset::new(self.features.clone(), labels.clone())
    }
}

/// A seeded permutation of `0..n`.
pub fn permutation(n: usize, seed: u64) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(&mut StdRng::seed_from_u64(seed));
    idx
}

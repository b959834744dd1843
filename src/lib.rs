//! # eeg-cnn — spectrogram CNN classification of EEG trials
//!
//! Loads per-subject epoched EEG, turns every trial into a 2×2 grid of
//! channel spectrograms and cross-validates a small convolutional network
//! ([Burn](https://burn.dev)) on a binary behavioural label.
//!
//! ## Pipeline overview
//!
//! ```text
//! sub{i}.mat  (ep [C, T, N], lb_maxrel / lb_pmb28 / lb_pmb37 / lb_act / lb)
//!   │
//!   ├─ io::load_recording()          native MAT Level-5 reader, v7.3 (HDF5) fallback
//!   ├─ spectrogram                   STFT magnitude, last 41 frames × lowest 121 bins
//!   ├─ features                      4 grid channels → [N, 4·121·41]
//!   ├─ permute (seed 2121)           per subject, labels move with their trials
//!   │
//!   ├─ outlier::reject_outliers()    scaled MAD < 3
//!   ├─ balance::balance_classes()    equal class counts
//!   ├─ permute (seed 2020)
//!   └─ cv::KFold (10, unshuffled)
//!        │
//!        └─→ per fold: fresh EegCnn + Adam, 50 epochs, batch 22
//!                      <out>/cv{n}/history.json
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use eeg_cnn::{build_dataset, prepare_subjects, run_cross_validation, ExperimentConfig};
//! use burn::backend::{Autodiff, NdArray};
//! use std::path::Path;
//!
//! let cfg = ExperimentConfig::default();
//! let subjects = prepare_subjects(&["dat_sub/sub1.mat"], &cfg).unwrap();
//! let dataset = build_dataset(&subjects, &cfg).unwrap();
//!
//! let device = Default::default();
//! let reports = run_cross_validation::<Autodiff<NdArray<f32>>>(
//!     &dataset, &cfg, Path::new("logs"), &device,
//! ).unwrap();
//! for r in &reports {
//!     println!("fold {}: accuracy {:?}", r.fold, r.test_accuracy);
//! }
//! ```

pub mod balance;
pub mod config;
pub mod cv;
pub mod dataset;
pub mod features;
pub mod io;
pub mod mat;
pub mod model;
pub mod outlier;
pub mod spectrogram;
pub mod train;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use burn::config::Config as _;
use burn::tensor::backend::AutodiffBackend;
use tracing::{debug, info};

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use balance::balance_classes;
pub use config::{ExperimentConfig, LabelKind, SpectrogramConfig};
pub use cv::{holdout_split, Fold, KFold};
pub use dataset::{permutation, Dataset, SubjectFeatures};
pub use features::{assemble_grid, flatten_trials, select_channels, to_image_batch, GRID_CHANNELS};
pub use io::{load_recording, Recording, StWriter};
pub use mat::{read_mat, read_mat73, MatFile, MatWriter};
pub use model::{EegCnn, EegCnnConfig};
pub use outlier::{mad_scores, median, reject_outliers, MAD_SCALE};
pub use spectrogram::{extract_spectrograms, hamming_periodic, stft_magnitude, Stft};
pub use train::{evaluate, train_fold, EpochRecord, FoldReport, TrainingConfig};

/// Load one subject file and turn it into flattened grid features.
///
/// Steps: read → STFT of every channel and trial → keep
/// [`ExperimentConfig::grid_channels`] → flatten to `[N, 4·n_freq·n_time]` →
/// permute the trials with [`ExperimentConfig::load_seed`].
pub fn prepare_subject<P: AsRef<Path>>(path: P, cfg: &ExperimentConfig) -> Result<SubjectFeatures> {
    let path = path.as_ref();
    let rec = load_recording(path)?;
    info!(
        path = %path.display(),
        channels = rec.n_channels(),
        samples = rec.epochs.shape()[1],
        trials = rec.n_trials(),
        "loaded recording"
    );

    let spec = extract_spectrograms(&rec.epochs, &cfg.spectrogram)
        .with_context(|| format!("spectrograms of {}", path.display()))?;
    let spec = select_channels(&spec, &cfg.grid_channels)?;
    debug!(shape = ?spec.shape(), "grid spectrograms");

    let subject = SubjectFeatures::new(flatten_trials(&spec), rec.labels)?;
    Ok(subject.permute(cfg.load_seed))
}

/// [`prepare_subject`] for every path, stacked in order.
pub fn prepare_subjects<P: AsRef<Path>>(paths: &[P], cfg: &ExperimentConfig) -> Result<SubjectFeatures> {
    let parts = paths
        .iter()
        .map(|p| prepare_subject(p, cfg))
        .collect::<Result<Vec<_>>>()?;
    SubjectFeatures::concat(&parts)
}

/// Pick the configured label, drop MAD outliers, balance the classes and
/// apply the split permutation.
pub fn build_dataset(subjects: &SubjectFeatures, cfg: &ExperimentConfig) -> Result<Dataset> {
    let dataset = subjects.dataset(cfg.label)?;
    info!(label = %cfg.label, trials = dataset.len(), "building dataset");
    let (filtered, _) = reject_outliers(&dataset, cfg.mad_threshold);
    let balanced = balance_classes(&filtered)?;
    info!(
        trials = balanced.len(),
        class0 = balanced.count_label(0.0),
        class1 = balanced.count_label(1.0),
        "balanced dataset"
    );
    Ok(balanced.permute(cfg.split_seed))
}

/// Train and score one network per fold.
///
/// Writes `<out_dir>/config.json` once and `<out_dir>/cv{n}/history.json`
/// per fold (`n` counts from 1).  With [`ExperimentConfig::holdout`] set a
/// single hold-out split replaces the k folds.
pub fn run_cross_validation<B: AutodiffBackend>(
    dataset: &Dataset,
    cfg: &ExperimentConfig,
    out_dir: &Path,
    device: &B::Device,
) -> Result<Vec<FoldReport>> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    cfg.training
        .save(out_dir.join("config.json"))
        .context("writing config.json")?;

    let folds = match cfg.holdout {
        Some(frac) => vec![holdout_split(dataset.len(), frac)?],
        None => KFold::new(cfg.n_folds).split(dataset.len())?,
    };

    let mut reports = Vec::with_capacity(folds.len());
    for (i, fold) in folds.iter().enumerate() {
        let n = i + 1;
        let fold_dir = out_dir.join(format!("cv{n}"));
        fs::create_dir_all(&fold_dir).with_context(|| format!("creating {}", fold_dir.display()))?;

        info!(fold = n, train = fold.train.len(), test = fold.test.len(), "Training starts for CV {n}");
        let train = dataset.select(&fold.train);
        let test = dataset.select(&fold.test);
        let (_, report) = train_fold::<B>(n, &train, &test, &cfg.training, device)?;
        report.save(&fold_dir.join("history.json"))?;
        reports.push(report);
    }

    let accs: Vec<f64> = reports.iter().filter_map(|r| r.test_accuracy).collect();
    if !accs.is_empty() {
        let mean = accs.iter().sum::<f64>() / accs.len() as f64;
        info!(folds = accs.len(), mean_accuracy = mean, "cross-validation finished");
    }
    Ok(reports)
}

//! Per-fold training and evaluation.
//!
//! Mini-batches are taken in dataset order (no reshuffling between epochs).
//! The epoch loss is the sum of the per-batch mean losses.
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::ops::Range;
use std::path::Path;

use anyhow::{bail, Context, Result};
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{activation::log_softmax, backend::AutodiffBackend, ElementConversion},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::features::to_image_batch;
use crate::model::{EegCnn, EegCnnConfig};

#[derive(Config)]
pub struct TrainingConfig {
    pub model: EegCnnConfig,
    pub optimizer: AdamConfig,
    #[config(default = 50)]
    pub num_epochs: usize,
    #[config(default = 22)]
    pub batch_size: usize,
    #[config(default = 1.0e-3)]
    pub learning_rate: f64,
    /// Backend seed, re-applied at the start of every fold.
    #[config(default = 42)]
    pub seed: u64,
}

impl TrainingConfig {
    /// Defaults for a `[2·n_freq, 2·n_time]` input grid.
    pub fn for_grid(n_freq: usize, n_time: usize) -> Self {
        let model = EegCnnConfig::new()
            .with_height(2 * n_freq)
            .with_width(2 * n_time);
        Self::new(model, AdamConfig::new().with_epsilon(1e-8))
    }

    /// `(n_freq, n_time)` of one grid tile.
    pub fn tile_dims(&self) -> (usize, usize) {
        (self.model.height / 2, self.model.width / 2)
    }
}

// `AdamConfig` has no `Debug`; show it through its JSON form.
impl fmt::Debug for TrainingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingConfig")
            .field("model", &self.model)
            .field("optimizer", &serde_json::to_string(&self.optimizer).unwrap_or_default())
            .field("num_epochs", &self.num_epochs)
            .field("batch_size", &self.batch_size)
            .field("learning_rate", &self.learning_rate)
            .field("seed", &self.seed)
            .finish()
    }
}

/// Number of mini-batches covering `n` trials; the last may be partial.
pub fn batch_count(n: usize, batch_size: usize) -> usize {
    n.div_ceil(batch_size)
}

/// Trial rows of mini-batch `idx`.
pub fn batch_range(n: usize, batch_size: usize, idx: usize) -> Range<usize> {
    let start = (idx * batch_size).min(n);
    start..(start + batch_size).min(n)
}

/// One-hot encode class indices into `[len, num_classes]`.
pub fn one_hot<B: Backend>(classes: &[i64], num_classes: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut data = vec![0.0_f32; classes.len() * num_classes];
    for (row, &c) in classes.iter().enumerate() {
        data[row * num_classes + c as usize] = 1.0;
    }
    Tensor::from_data(TensorData::new(data, [classes.len(), num_classes]), device)
}

/// Mean over the batch of `−Σ_k target_k · log_softmax(logits)_k`.
pub fn cross_entropy_one_hot<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    (targets * log_softmax(logits, 1)).sum_dim(1).mean().neg()
}

fn image_tensor<B: Backend>(
    features: &ndarray::Array2<f32>,
    rows: &[usize],
    (n_freq, n_time): (usize, usize),
    device: &B::Device,
) -> Result<Tensor<B, 4>> {
    let data = to_image_batch(features, rows, n_freq, n_time)?;
    let shape = [rows.len(), 1, 2 * n_freq, 2 * n_time];
    Ok(Tensor::from_data(TensorData::new(data, shape), device))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub loss: f64,
}

/// Outcome of training one fold, written as `history.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldReport {
    pub fold: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub epochs: Vec<EpochRecord>,
    /// `None` when the test partition is empty.
    pub test_accuracy: Option<f64>,
}

impl FoldReport {
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.epochs.last().map(|e| e.loss)
    }
}

/// Train a fresh network on `train` and score it on `test`.
pub fn train_fold<B: AutodiffBackend>(
    fold: usize,
    train: &Dataset,
    test: &Dataset,
    cfg: &TrainingConfig,
    device: &B::Device,
) -> Result<(EegCnn<B>, FoldReport)> {
    if train.is_empty() {
        bail!("fold {fold}: empty training set");
    }
    if cfg.batch_size == 0 {
        bail!("batch size must be positive");
    }
    let tile = cfg.tile_dims();
    let classes = train.class_indices()?;
    let rows: Vec<usize> = (0..train.len()).collect();
    let n_batches = batch_count(train.len(), cfg.batch_size);

    B::seed(cfg.seed);
    let mut model: EegCnn<B> = cfg.model.init(device);
    let mut optim = cfg.optimizer.init();
    let mut epochs = Vec::with_capacity(cfg.num_epochs);

    for epoch in 1..=cfg.num_epochs {
        let mut total = 0.0;
        for b in 0..n_batches {
            let range = batch_range(train.len(), cfg.batch_size, b);
            let images = image_tensor::<B>(&train.features, &rows[range.clone()], tile, device)?;
            let targets = one_hot::<B>(&classes[range], cfg.model.num_classes, device);

            let loss = cross_entropy_one_hot(model.forward(images), targets);
            total += loss.clone().into_scalar().elem::<f64>();

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(cfg.learning_rate, model, grads);
        }
        info!("Epoch [{}/{}], Loss: {:.4}", epoch, cfg.num_epochs, total);
        epochs.push(EpochRecord { epoch, loss: total });
    }

    let test_accuracy = if test.is_empty() {
        None
    } else {
        let acc = evaluate(&model.valid(), test, tile, cfg.batch_size, device)?;
        info!(fold, accuracy = acc, "test accuracy");
        Some(acc)
    };

    let report = FoldReport {
        fold,
        train_size: train.len(),
        test_size: test.len(),
        epochs,
        test_accuracy,
    };
    Ok((model, report))
}

/// Fraction of trials whose arg-max logit equals the label.
pub fn evaluate<B: Backend>(
    model: &EegCnn<B>,
    data: &Dataset,
    tile: (usize, usize),
    batch_size: usize,
    device: &B::Device,
) -> Result<f64> {
    if data.is_empty() {
        bail!("cannot evaluate on an empty dataset");
    }
    let classes = data.class_indices()?;
    let rows: Vec<usize> = (0..data.len()).collect();
    let mut correct = 0_i64;
    for b in 0..batch_count(data.len(), batch_size.max(1)) {
        let range = batch_range(data.len(), batch_size.max(1), b);
        let n = range.len();
        let images = image_tensor::<B>(&data.features, &rows[range.clone()], tile, device)?;
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(classes[range].to_vec(), [n]), device);
        let preds = model.forward(images).argmax(1).reshape([n]);
        correct += preds.equal(targets).int().sum().into_scalar().elem::<i64>();
    }
    debug!(correct, total = data.len(), "evaluation");
    Ok(correct as f64 / data.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use ndarray::{Array1, Array2};

    type TestBackend = NdArray<f32>;
    type TestAutodiff = Autodiff<TestBackend>;

    #[test]
    fn batches_cover_all_rows() {
        assert_eq!(batch_count(45, 22), 3);
        assert_eq!(batch_range(45, 22, 0), 0..22);
        assert_eq!(batch_range(45, 22, 2), 44..45);
        assert_eq!(batch_count(44, 22), 2);
        assert_eq!(batch_count(0, 22), 0);
    }

    #[test]
    fn one_hot_rows() {
        let device = Default::default();
        let t = one_hot::<TestBackend>(&[1, 0, 1], 2, &device);
        let v: Vec<f32> = t.into_data().to_vec().unwrap();
        assert_eq!(v, vec![0.0, 1.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn cross_entropy_of_uniform_logits_is_ln2() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([4, 2], &device);
        let targets = one_hot::<TestBackend>(&[0, 1, 1, 0], 2, &device);
        let loss = cross_entropy_one_hot(logits, targets).into_scalar().elem::<f64>();
        approx::assert_abs_diff_eq!(loss, std::f64::consts::LN_2, epsilon = 1e-6);
    }

    #[test]
    fn for_grid_sets_image_dims() {
        let cfg = TrainingConfig::for_grid(8, 4);
        assert_eq!((cfg.model.height, cfg.model.width), (16, 8));
        assert_eq!(cfg.tile_dims(), (8, 4));
        assert_eq!(cfg.learning_rate, 1e-3);
    }

    fn tiny_dataset(n: usize) -> Dataset {
        // class 1 trials are bright, class 0 dark
        let labels = Array1::from_iter((0..n).map(|i| (i % 2) as f64));
        let features = Array2::from_shape_fn((n, 4 * 8 * 4), |(i, j)| {
            (i % 2) as f32 * 2.0 - 1.0 + (j % 3) as f32 * 0.01
        });
        Dataset::new(features, labels).unwrap()
    }

    #[test]
    fn train_fold_reports_every_epoch() {
        let device = Default::default();
        let mut cfg = TrainingConfig::for_grid(8, 4);
        cfg.model.hidden = 8;
        cfg.num_epochs = 3;
        cfg.batch_size = 4;
        let train = tiny_dataset(10);
        let test = tiny_dataset(4);
        let (_, report) = train_fold::<TestAutodiff>(1, &train, &test, &cfg, &device).unwrap();
        assert_eq!(report.epochs.len(), 3);
        assert_eq!(report.epochs[2].epoch, 3);
        assert!(report.epochs.iter().all(|e| e.loss.is_finite() && e.loss > 0.0));
        let acc = report.test_accuracy.unwrap();
        assert!((0.0..=1.0).contains(&acc));
        assert_eq!((report.train_size, report.test_size), (10, 4));
    }

    #[test]
    fn epoch_loss_is_sum_of_batch_means() {
        let device = Default::default();
        let mut cfg = TrainingConfig::for_grid(8, 4);
        cfg.model.hidden = 8;
        cfg.model.dropout = 0.0;
        cfg.learning_rate = 0.0;
        cfg.num_epochs = 2;
        cfg.batch_size = 4;
        // batches of 4 and 2 trials
        let train = tiny_dataset(6);
        let empty = train.select(&[]);
        let (model, report) = train_fold::<TestAutodiff>(1, &train, &empty, &cfg, &device).unwrap();

        let classes = train.class_indices().unwrap();
        let batch_losses: Vec<f64> = (0..batch_count(6, 4))
            .map(|b| {
                let range = batch_range(6, 4, b);
                let rows: Vec<usize> = range.clone().collect();
                let images =
                    image_tensor::<TestAutodiff>(&train.features, &rows, cfg.tile_dims(), &device).unwrap();
                let targets = one_hot::<TestAutodiff>(&classes[range], 2, &device);
                cross_entropy_one_hot(model.forward(images), targets)
                    .into_scalar()
                    .elem::<f64>()
            })
            .collect();
        assert_eq!(batch_losses.len(), 2);
        let expected: f64 = batch_losses.iter().sum();
        for e in &report.epochs {
            approx::assert_abs_diff_eq!(e.loss, expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn debug_shows_optimizer() {
        let cfg = TrainingConfig::for_grid(8, 4);
        let text = format!("{cfg:?}");
        assert!(text.contains("TrainingConfig"), "{text}");
        assert!(text.contains("epsilon"), "{text}");
    }

    #[test]
    fn empty_test_set_has_no_accuracy() {
        let device = Default::default();
        let mut cfg = TrainingConfig::for_grid(8, 4);
        cfg.model.hidden = 4;
        cfg.num_epochs = 1;
        let empty = tiny_dataset(2).select(&[]);
        let (_, report) = train_fold::<TestAutodiff>(1, &tiny_dataset(6), &empty, &cfg, &device).unwrap();
        assert!(report.test_accuracy.is_none());
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = FoldReport {
            fold: 2,
            train_size: 9,
            test_size: 1,
            epochs: vec![EpochRecord { epoch: 1, loss: 0.5 }],
            test_accuracy: Some(1.0),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        report.save(&path).unwrap();
        let back: FoldReport = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(back, report);
        assert_eq!(back.final_loss(), Some(0.5));
    }
}

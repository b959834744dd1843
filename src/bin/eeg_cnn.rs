use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use eeg_cnn::{build_dataset, prepare_subjects, run_cross_validation, ExperimentConfig, LabelKind};

#[cfg(not(feature = "wgpu"))]
type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray<f32>>;
#[cfg(feature = "wgpu")]
type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

#[derive(Parser)]
#[command(name = "eeg_cnn", about = "Cross-validated spectrogram CNN on epoched EEG (Rust/Burn)")]
struct Args {
    /// Directory holding sub{i}.mat
    #[arg(long, default_value = "dat_sub")]
    data_dir: PathBuf,

    /// Subject numbers to pool (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = "1")]
    subjects: Vec<usize>,

    /// Label to classify: maxrel, pmb28, pmb37, act or lb
    #[arg(long, default_value = "maxrel")]
    label: LabelKind,

    /// The four grid channels, in tile order
    #[arg(long, value_delimiter = ',', default_value = "0,1,2,3")]
    channels: Vec<usize>,

    #[arg(long, default_value_t = 10)]
    folds: usize,

    #[arg(long, default_value_t = 50)]
    epochs: usize,

    #[arg(long, default_value_t = 22)]
    batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    lr: f64,

    /// Trials with scaled MAD at or above this are dropped
    #[arg(long, default_value_t = 3.0)]
    mad_threshold: f64,

    /// Single train/test split with this train fraction instead of k-fold
    #[arg(long)]
    holdout: Option<f64>,

    /// Output directory (default: logs<YYYYmmdd-HHMM>_subgroup_4ch)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let grid_channels: [usize; 4] = match args.channels.as_slice() {
        &[a, b, c, d] => [a, b, c, d],
        other => bail!("--channels needs exactly 4 indices, got {}", other.len()),
    };

    let mut cfg = ExperimentConfig {
        grid_channels,
        label: args.label,
        mad_threshold: args.mad_threshold,
        n_folds: args.folds,
        holdout: args.holdout,
        ..ExperimentConfig::default()
    };
    cfg.training.num_epochs = args.epochs;
    cfg.training.batch_size = args.batch_size;
    cfg.training.learning_rate = args.lr;

    let out_dir = args.out_dir.unwrap_or_else(|| {
        PathBuf::from(chrono::Local::now().format("logs%Y%m%d-%H%M_subgroup_4ch").to_string())
    });

    let paths: Vec<PathBuf> = args
        .subjects
        .iter()
        .map(|i| args.data_dir.join(format!("sub{i}.mat")))
        .collect();

    let subjects = prepare_subjects(&paths, &cfg)?;
    let dataset = build_dataset(&subjects, &cfg)?;

    let device = Default::default();
    let reports = run_cross_validation::<TrainBackend>(&dataset, &cfg, &out_dir, &device)?;

    for r in &reports {
        match r.test_accuracy {
            Some(acc) => info!("CV {}: test accuracy {:.4}", r.fold, acc),
            None => info!("CV {}: no test trials", r.fold),
        }
    }
    info!("Results written → {}", out_dir.display());
    Ok(())
}

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use eeg_cnn::{prepare_subject, ExperimentConfig, StWriter};

#[derive(Parser)]
#[command(
    name = "extract_features",
    about = "Export flattened grid spectrograms of one subject to safetensors"
)]
struct Args {
    /// Subject file (MAT Level 5, or v7.3 with the `hdf5` feature)
    #[arg(long)]
    input: PathBuf,

    /// features.safetensors output path
    #[arg(long)]
    output: PathBuf,

    /// The four grid channels, in tile order
    #[arg(long, value_delimiter = ',', default_value = "0,1,2,3")]
    channels: Vec<usize>,

    /// Keep the trials in file order instead of applying the load permutation
    #[arg(long)]
    no_shuffle: bool,

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

    let mut cfg = ExperimentConfig::default();
    if let [a, b, c, d] = args.channels[..] {
        cfg.grid_channels = [a, b, c, d];
    } else {
        bail!("--channels needs exactly 4 indices");
    }

    let subject = prepare_subject(&args.input, &cfg)?;
    let subject = if args.no_shuffle {
        // undo the load permutation
        let perm = eeg_cnn::permutation(subject.len(), cfg.load_seed);
        let mut inverse = vec![0; perm.len()];
        for (dst, &src) in perm.iter().enumerate() {
            inverse[src] = dst;
        }
        subject.select(&inverse)
    } else {
        subject
    };

    let (n, d) = subject.features.dim();
    let mut w = StWriter::new();
    let features: Vec<f32> = subject.features.iter().copied().collect();
    w.add_f32("features", &features, &[n, d]);
    for (kind, labels) in &subject.labels {
        w.add_f64(kind.var_name(), &labels.to_vec(), &[n]);
    }
    w.write(&args.output)?;

    info!(
        trials = n,
        width = d,
        labels = subject.labels.len(),
        "Written → {}",
        args.output.display()
    );
    Ok(())
}

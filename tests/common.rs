/// Shared helpers: small configurations and synthetic subject files.
use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use eeg_cnn::{ExperimentConfig, MatWriter, SpectrogramConfig, TrainingConfig};
use ndarray::{Array1, Array3};

pub const SFREQ: f32 = 100.0;
pub const N_SAMPLES: usize = 64;
pub const N_CHANNELS: usize = 5;

/// 100 Hz, 32-point segments, 3.125 Hz bins; keeps 4 bins × 2 frames.
#[allow(unused)]
pub fn small_config() -> ExperimentConfig {
    let spectrogram = SpectrogramConfig {
        sfreq: SFREQ,
        nperseg: 32,
        noverlap: 24,
        nfft: 32,
        n_freq: 4,
        n_time: 2,
    };
    let mut training = TrainingConfig::for_grid(spectrogram.n_freq, spectrogram.n_time);
    training.model.hidden = 8;
    training.num_epochs = 2;
    training.batch_size = 4;
    ExperimentConfig {
        spectrogram,
        n_folds: 3,
        training,
        ..ExperimentConfig::default()
    }
}

/// `[C, T, N]` epochs: class 1 trials carry a 6.25 Hz tone, class 0 a
/// 3.125 Hz tone, scaled by `amplitude[i]`.
#[allow(unused)]
pub fn tone_epochs(classes: &[f64], amplitude: &[f32]) -> Array3<f32> {
    Array3::from_shape_fn((N_CHANNELS, N_SAMPLES, classes.len()), |(c, t, i)| {
        let f = if classes[i] == 1.0 { 6.25 } else { 3.125 };
        let phase = c as f32 * 0.3 + i as f32 * 0.1;
        amplitude[i] * (2.0 * PI * f * t as f32 / SFREQ + phase).sin()
    })
}

/// Write `sub.mat` with `ep`, `lb_maxrel` (the class) and `lb_pmb28` (the
/// original trial index, for tracking permutations).
#[allow(unused)]
pub fn write_subject(dir: &Path, name: &str, classes: &[f64], amplitude: &[f32], compress: bool) -> PathBuf {
    let n = classes.len();
    let mut w = MatWriter::new().compressed(compress);
    w.add("ep", &tone_epochs(classes, amplitude));
    w.add("lb_maxrel", &Array1::from_vec(classes.to_vec()));
    w.add("lb_pmb28", &Array1::from_iter((0..n).map(|i| i as f64)));
    let path = dir.join(name);
    w.write(&path).unwrap();
    path
}

/// Alternating classes starting with `first`, unit amplitude.
#[allow(unused)]
pub fn alternating(n: usize, first: f64) -> (Vec<f64>, Vec<f32>) {
    let classes = (0..n).map(|i| if i % 2 == 0 { first } else { 1.0 - first }).collect();
    (classes, vec![1.0; n])
}

/// Same content as [`write_subject`], as a MAT v7.3 file: HDF5 datasets with
/// MATLAB's reversed dimension order and the MAT header in a 512-byte user block.
#[cfg(feature = "hdf5")]
#[allow(unused)]
pub fn write_subject_v73(dir: &Path, name: &str, classes: &[f64], amplitude: &[f32]) -> PathBuf {
    use std::io::Write;

    let n = classes.len();
    let path = dir.join(name);
    {
        let file = hdf5::File::with_options()
            .with_fcpl(|p| p.userblock(512))
            .create(&path)
            .unwrap();
        let ep = tone_epochs(classes, amplitude).mapv(f64::from);
        let stored = ep.reversed_axes().as_standard_layout().into_owned();
        file.new_dataset_builder().with_data(&stored).create("ep").unwrap();
        // a MATLAB 1×N row vector is stored as N×1
        let maxrel = ndarray::Array2::from_shape_vec((n, 1), classes.to_vec()).unwrap();
        file.new_dataset_builder().with_data(&maxrel).create("lb_maxrel").unwrap();
        let index = ndarray::Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        file.new_dataset_builder().with_data(&index).create("lb_pmb28").unwrap();
    }

    let mut header = b"MATLAB 7.3 MAT-file, Platform: GLNXA64, Created on: Mon Jan  1 00:00:00 2024 HDF5 schema 1.00 .".to_vec();
    header.resize(116, b' ');
    header.extend([0u8; 8]);
    header.extend(0x0200_u16.to_le_bytes());
    header.extend(b"IM");
    let mut f = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    f.write_all(&header).unwrap();
    path
}

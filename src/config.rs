//! Experiment configuration.
//!
//! [`ExperimentConfig`] holds every tunable parameter of the feature pipeline
//! and the cross-validation run.  All fields have defaults that match the
//! settings used for the 4-channel subgroup experiments.
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};

use crate::train::TrainingConfig;

/// Which behavioural label vector to classify.
///
/// Each kind maps to one named variable of the subject MAT file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LabelKind {
    /// `lb_maxrel`
    MaxRel,
    /// `lb_pmb28`
    Pmb28,
    /// `lb_pmb37`
    Pmb37,
    /// `lb_act`
    Act,
    /// `lb`, used by single-label dataset files.
    Outcome,
}

impl LabelKind {
    /// Every kind, in file order.
    pub const ALL: [LabelKind; 5] = [
        LabelKind::MaxRel,
        LabelKind::Pmb28,
        LabelKind::Pmb37,
        LabelKind::Act,
        LabelKind::Outcome,
    ];

    /// Variable name inside the MAT file.
    pub fn var_name(self) -> &'static str {
        match self {
            LabelKind::MaxRel => "lb_maxrel",
            LabelKind::Pmb28 => "lb_pmb28",
            LabelKind::Pmb37 => "lb_pmb37",
            LabelKind::Act => "lb_act",
            LabelKind::Outcome => "lb",
        }
    }
}

impl fmt::Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.var_name())
    }
}

impl FromStr for LabelKind {
    type Err = anyhow::Error;

    /// Accepts the short name (`maxrel`) or the variable name (`lb_maxrel`).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        let short = s.strip_prefix("lb_").unwrap_or(&s);
        Ok(match short {
            "maxrel" => LabelKind::MaxRel,
            "pmb28" => LabelKind::Pmb28,
            "pmb37" => LabelKind::Pmb37,
            "act" => LabelKind::Act,
            "lb" | "outcome" => LabelKind::Outcome,
            other => bail!("unknown label kind '{other}' (expected maxrel, pmb28, pmb37, act or lb)"),
        })
    }
}

/// Short-time Fourier transform parameters and the retained window.
///
/// The defaults reproduce `scipy.signal.stft(x, fs=1000, window='hamming',
/// nperseg=2000, noverlap=1975, nfft=3000)` and keep the lowest 121 bins
/// (0–40 Hz at 1/3 Hz resolution) of the last 41 frames.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrogramConfig {
    /// Sampling rate in Hz.
    pub sfreq: f32,
    /// Segment length in samples.
    pub nperseg: usize,
    /// Overlap between consecutive segments in samples.
    pub noverlap: usize,
    /// FFT length; segments are zero-padded up to this length.
    pub nfft: usize,
    /// Number of lowest frequency bins kept.
    pub n_freq: usize,
    /// Number of trailing time frames kept.
    pub n_time: usize,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            sfreq: 1000.0,
            nperseg: 2000,
            noverlap: 1975,
            nfft: 3000,
            n_freq: 121,
            n_time: 41,
        }
    }
}

impl SpectrogramConfig {
    /// Hop between frames in samples.
    pub fn step(&self) -> usize {
        self.nperseg - self.noverlap
    }

    /// Frequency resolution of one bin in Hz.
    ///
    /// ```
    /// use eeg_cnn::SpectrogramConfig;
    /// let cfg = SpectrogramConfig::default();
    /// assert!((cfg.bin_hz() - 1.0 / 3.0).abs() < 1e-6);
    /// ```
    pub fn bin_hz(&self) -> f32 {
        self.sfreq / self.nfft as f32
    }

    /// Reject parameter combinations the transform cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.nperseg == 0 {
            bail!("nperseg must be positive");
        }
        if self.noverlap >= self.nperseg {
            bail!("noverlap ({}) must be smaller than nperseg ({})", self.noverlap, self.nperseg);
        }
        if self.nfft < self.nperseg {
            bail!("nfft ({}) must be at least nperseg ({})", self.nfft, self.nperseg);
        }
        if self.n_freq == 0 || self.n_freq > self.nfft / 2 + 1 {
            bail!("n_freq ({}) must be in 1..={}", self.n_freq, self.nfft / 2 + 1);
        }
        if self.n_time == 0 {
            bail!("n_time must be positive");
        }
        Ok(())
    }
}

/// Configuration for a full experiment run.
///
/// All fields are `pub`, so struct-update syntax works:
///
/// ```
/// use eeg_cnn::{ExperimentConfig, LabelKind};
///
/// let cfg = ExperimentConfig {
///     label: LabelKind::Act,
///     n_folds: 5,
///     ..ExperimentConfig::default()
/// };
/// assert_eq!(cfg.grid_channels, [0, 1, 2, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    /// STFT parameters and retained window.
    pub spectrogram: SpectrogramConfig,

    /// The four channels tiled into the 2×2 image, in tile order
    /// (top-left, bottom-left, top-right, bottom-right).
    ///
    /// Default: `[0, 1, 2, 3]`.
    pub grid_channels: [usize; 4],

    /// Label vector to classify.
    ///
    /// Default: [`LabelKind::MaxRel`].
    pub label: LabelKind,

    /// Seed of the per-subject trial permutation applied right after loading.
    ///
    /// Default: `2121`.
    pub load_seed: u64,

    /// Seed of the permutation applied to the balanced dataset before splitting.
    ///
    /// Default: `2020`.
    pub split_seed: u64,

    /// Trials whose scaled MAD is not strictly below this value are dropped.
    ///
    /// Default: `3.0`.
    pub mad_threshold: f64,

    /// Number of cross-validation folds.
    ///
    /// Default: `10`.
    pub n_folds: usize,

    /// When set, a single train/test split with this train fraction replaces
    /// k-fold cross-validation.
    ///
    /// Default: `None`.
    pub holdout: Option<f64>,

    /// Network, optimiser and loop settings.
    pub training: TrainingConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        let spectrogram = SpectrogramConfig::default();
        let training = TrainingConfig::for_grid(spectrogram.n_freq, spectrogram.n_time);
        Self {
            spectrogram,
            grid_channels: [0, 1, 2, 3],
            label: LabelKind::MaxRel,
            load_seed: 2121,
            split_seed: 2020,
            mad_threshold: 3.0,
            n_folds: 10,
            holdout: None,
            training,
        }
    }
}

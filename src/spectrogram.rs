//! Short-time Fourier transform spectrograms.
//!
//! Matches `scipy.signal.stft(x, fs, window='hamming', nperseg, noverlap, nfft)`
//! with its defaults:
//!
//! ```text
//! boundary='zeros'   pad nperseg/2 zeros on both ends
//! padded=True        zero-pad the tail so (len − nperseg) % step == 0
//! detrend=False
//! scaling='spectrum' X[k] / Σw
//! one-sided          bins 0 ..= nfft/2
//! ```
//!
//! Only the magnitude is kept, and [`extract_spectrograms`] computes only the
//! trailing frames it retains.
use std::f64::consts::PI;
use std::sync::Arc;

use anyhow::{bail, Result};
use ndarray::{s, Array2, Array3, Array4};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::SpectrogramConfig;

/// Periodic Hamming window of length `n` (`scipy.signal.get_window('hamming', n)`).
pub fn hamming_periodic(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// Planned STFT for one parameter set.
pub struct Stft {
    cfg: SpectrogramConfig,
    window: Vec<f64>,
    inv_win_sum: f64,
    fft: Arc<dyn Fft<f64>>,
    scratch_len: usize,
}

impl Stft {
    pub fn new(cfg: &SpectrogramConfig) -> Result<Self> {
        cfg.validate()?;
        let window = hamming_periodic(cfg.nperseg);
        let win_sum: f64 = window.iter().sum();
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(cfg.nfft);
        let scratch_len = fft.get_inplace_scratch_len();
        Ok(Self {
            cfg: cfg.clone(),
            window,
            inv_win_sum: 1.0 / win_sum,
            fft,
            scratch_len,
        })
    }

    /// Number of one-sided frequency bins (`nfft/2 + 1`).
    pub fn n_bins(&self) -> usize {
        self.cfg.nfft / 2 + 1
    }

    /// Length after boundary and tail padding.
    fn padded_len(&self, n_samples: usize) -> usize {
        let nperseg = self.cfg.nperseg;
        let step = self.cfg.step();
        let len = n_samples + 2 * (nperseg / 2);
        if len < nperseg {
            return nperseg;
        }
        let rem = (len - nperseg) % step;
        if rem == 0 { len } else { len + step - rem }
    }

    /// Number of frames the transform produces for a signal of `n_samples`.
    ///
    /// ```
    /// use eeg_cnn::{spectrogram::Stft, SpectrogramConfig};
    /// let stft = Stft::new(&SpectrogramConfig::default()).unwrap();
    /// assert_eq!(stft.n_frames(3000), 121);
    /// ```
    pub fn n_frames(&self, n_samples: usize) -> usize {
        (self.padded_len(n_samples) - self.cfg.nperseg) / self.cfg.step() + 1
    }

    /// Boundary-pad and tail-pad `x` with zeros.
    pub fn pad_signal(&self, x: &[f32]) -> Vec<f64> {
        let total = self.padded_len(x.len());
        let half = self.cfg.nperseg / 2;
        let mut out = vec![0.0_f64; total];
        for (o, &v) in out[half..half + x.len()].iter_mut().zip(x) {
            *o = v as f64;
        }
        out
    }

    /// Magnitudes of the first `n_bins` bins of frame `frame` of a padded signal.
    pub fn frame_magnitude(&self, padded: &[f64], frame: usize, n_bins: usize) -> Vec<f32> {
        let mut buf = vec![Complex::<f64>::default(); self.cfg.nfft];
        let mut scratch = vec![Complex::<f64>::default(); self.scratch_len];
        self.frame_into(padded, frame, n_bins, &mut buf, &mut scratch)
    }

    fn frame_into(
        &self,
        padded: &[f64],
        frame: usize,
        n_bins: usize,
        buf: &mut [Complex<f64>],
        scratch: &mut [Complex<f64>],
    ) -> Vec<f32> {
        let start = frame * self.cfg.step();
        let seg = &padded[start..start + self.cfg.nperseg];
        for (b, (&x, &w)) in buf.iter_mut().zip(seg.iter().zip(&self.window)) {
            *b = Complex { re: x * w, im: 0.0 };
        }
        buf[self.cfg.nperseg..].fill(Complex::default());
        self.fft.process_with_scratch(buf, scratch);
        buf[..n_bins]
            .iter()
            .map(|c| (c.norm() * self.inv_win_sum) as f32)
            .collect()
    }
}

/// Full one-sided magnitude spectrogram of one signal, shape `[nfft/2+1, n_frames]`
/// (the layout of scipy's `Sxx`).
pub fn stft_magnitude(x: &[f32], cfg: &SpectrogramConfig) -> Result<Array2<f32>> {
    let stft = Stft::new(cfg)?;
    let padded = stft.pad_signal(x);
    let n_frames = stft.n_frames(x.len());
    let n_bins = stft.n_bins();
    let mut out = Array2::<f32>::zeros((n_bins, n_frames));
    for t in 0..n_frames {
        let mag = stft.frame_magnitude(&padded, t, n_bins);
        out.column_mut(t).assign(&ndarray::ArrayView1::from(&mag));
    }
    Ok(out)
}

/// Spectrograms of every channel of every trial.
///
/// `epochs`: [C, T, N] raw epochs.  Returns `[N, C, n_time, n_freq]`: the
/// lowest `cfg.n_freq` bins of the last `cfg.n_time` frames.
///
/// # Errors
///
/// Fails when the configuration is invalid or the epochs are too short to
/// produce `cfg.n_time` frames.
pub fn extract_spectrograms(epochs: &Array3<f32>, cfg: &SpectrogramConfig) -> Result<Array4<f32>> {
    let stft = Stft::new(cfg)?;
    let (n_ch, n_t, n_trials) = epochs.dim();
    let n_frames = stft.n_frames(n_t);
    if n_frames < cfg.n_time {
        bail!(
            "epochs of {n_t} samples give {n_frames} STFT frames, need at least {}",
            cfg.n_time
        );
    }
    let first = n_frames - cfg.n_time;

    let mut out = Array4::<f32>::zeros((n_trials, n_ch, cfg.n_time, cfg.n_freq));
    let mut buf = vec![Complex::<f64>::default(); cfg.nfft];
    let mut scratch = vec![Complex::<f64>::default(); stft.scratch_len];
    for trial in 0..n_trials {
        for ch in 0..n_ch {
            let signal: Vec<f32> = epochs.slice(s![ch, .., trial]).to_vec();
            let padded = stft.pad_signal(&signal);
            for t in 0..cfg.n_time {
                let mag = stft.frame_into(&padded, first + t, cfg.n_freq, &mut buf, &mut scratch);
                out.slice_mut(s![trial, ch, t, ..])
                    .assign(&ndarray::ArrayView1::from(&mag));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cfg() -> SpectrogramConfig {
        SpectrogramConfig {
            sfreq: 100.0,
            nperseg: 64,
            noverlap: 48,
            nfft: 128,
            n_freq: 40,
            n_time: 5,
        }
    }

    #[test]
    fn periodic_hamming_values() {
        let w = hamming_periodic(4);
        let expected = [0.08, 0.54, 1.0, 0.54];
        for (a, b) in w.iter().zip(expected) {
            approx::assert_abs_diff_eq!(*a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn frame_count_matches_scipy() {
        // scipy.signal.stft(np.zeros(3000), nperseg=2000, noverlap=1975, nfft=3000)[1].size == 121
        let stft = Stft::new(&SpectrogramConfig::default()).unwrap();
        assert_eq!(stft.n_frames(3000), 121);
        // 2990 samples → padded 4990 → tail-padded to 5000.
        assert_eq!(stft.n_frames(2990), 121);
        assert_eq!(stft.n_frames(3001), 122);
    }

    #[test]
    fn pure_tone_peaks_at_its_bin() {
        let cfg = small_cfg();
        // bin 16 of a 128-point FFT at 100 Hz = 12.5 Hz
        let f0 = 16.0 * cfg.sfreq / cfg.nfft as f32;
        let x: Vec<f32> = (0..400)
            .map(|i| 2.0 * (2.0 * std::f32::consts::PI * f0 * i as f32 / cfg.sfreq).sin())
            .collect();
        let sxx = stft_magnitude(&x, &cfg).unwrap();
        let mid = sxx.ncols() / 2;
        let col = sxx.column(mid);
        let (argmax, &peak) = col
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert_eq!(argmax, 16);
        // Spectrum scaling: a sinusoid of amplitude A reads ≈ A/2.
        approx::assert_abs_diff_eq!(peak, 1.0, epsilon = 0.05);
    }

    #[test]
    fn constant_signal_dc_in_interior_frames() {
        let cfg = small_cfg();
        let x = vec![3.0_f32; 400];
        let sxx = stft_magnitude(&x, &cfg).unwrap();
        // Frames 2.. are fully inside the signal (start ≥ nperseg/2 = 32 samples).
        for t in 2..sxx.ncols() - 2 {
            approx::assert_abs_diff_eq!(sxx[[0, t]], 3.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn extraction_keeps_trailing_frames() {
        let cfg = small_cfg();
        let epochs = Array3::from_shape_fn((2, 400, 3), |(c, t, n)| {
            ((t as f32) * 0.3 + c as f32 + n as f32).sin()
        });
        let spec = extract_spectrograms(&epochs, &cfg).unwrap();
        assert_eq!(spec.shape(), &[3, 2, 5, 40]);

        let signal: Vec<f32> = epochs.slice(s![1, .., 2]).to_vec();
        let full = stft_magnitude(&signal, &cfg).unwrap();
        let n_frames = full.ncols();
        for t in 0..cfg.n_time {
            for f in 0..cfg.n_freq {
                approx::assert_abs_diff_eq!(
                    spec[[2, 1, t, f]],
                    full[[f, n_frames - cfg.n_time + t]],
                    epsilon = 1e-6
                );
            }
        }
    }

    #[test]
    fn too_short_epochs_rejected() {
        let cfg = SpectrogramConfig { n_time: 50, ..small_cfg() };
        let epochs = Array3::<f32>::zeros((1, 100, 1));
        assert!(extract_spectrograms(&epochs, &cfg).is_err());
    }
}

//! Subject recording I/O.
//!
//! Reader: [`load_recording`] tries the native Level-5 MAT reader first and
//! falls back to the MAT v7.3 (HDF5) reader.
//!
//! Writer: [`StWriter`], a minimal safetensors builder used to export
//! extracted features.
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use ndarray::{Array1, Array3, ArrayD, Axis, Ix3};
use tracing::{debug, warn};

use crate::config::LabelKind;
use crate::mat::{read_mat, read_mat73};

// ── Recording ─────────────────────────────────────────────────────────────────

/// One subject's epochs and behavioural labels.
#[derive(Debug, Clone)]
pub struct Recording {
    /// [C, T, N] raw epochs: channels × samples × trials.
    pub epochs: Array3<f32>,
    /// Label vectors present in the file, each of length N.
    pub labels: BTreeMap<LabelKind, Array1<f64>>,
}

impl Recording {
    /// Build a recording from named arrays, checking trial alignment.
    pub fn from_vars(mut vars: BTreeMap<String, ArrayD<f64>>) -> Result<Self> {
        let ep = vars.remove("ep").context("missing 'ep' variable")?;
        let ep = match ep.ndim() {
            // A single-trial export collapses the trailing axis.
            2 => ep.insert_axis(Axis(2)),
            3 => ep,
            n => bail!("'ep' must be [channels, samples, trials], got {n}-D {:?}", ep.shape()),
        };
        let epochs = ep
            .into_dimensionality::<Ix3>()?
            .mapv(|v| v as f32);
        let n_trials = epochs.shape()[2];

        let mut labels = BTreeMap::new();
        for kind in LabelKind::ALL {
            let Some(arr) = vars.remove(kind.var_name()) else { continue };
            if arr.len() != n_trials {
                bail!(
                    "'{}' has {} elements but 'ep' has {n_trials} trials (shape {:?})",
                    kind.var_name(), arr.len(), arr.shape()
                );
            }
            // 1×N, N×1 and N all flatten to the same vector.
            labels.insert(kind, Array1::from_iter(arr.iter().copied()));
        }
        if labels.is_empty() {
            bail!("no label vectors found (expected one of lb_maxrel, lb_pmb28, lb_pmb37, lb_act, lb)");
        }
        Ok(Recording { epochs, labels })
    }

    /// Number of trials.
    pub fn n_trials(&self) -> usize {
        self.epochs.shape()[2]
    }

    /// Number of channels.
    pub fn n_channels(&self) -> usize {
        self.epochs.shape()[0]
    }
}

/// Load a subject file.
///
/// The Level-5 reader is tried first; on any failure the file is re-read as
/// MAT v7.3.  If both fail, the error carries both causes.
pub fn load_recording<P: AsRef<Path>>(path: P) -> Result<Recording> {
    let path = path.as_ref();
    let vars = match read_mat(path) {
        Ok(mat) => {
            if !mat.skipped().is_empty() {
                debug!(skipped = ?mat.skipped(), "non-numeric MAT variables ignored");
            }
            mat.into_vars()
        }
        Err(mat_err) => {
            let cause = format!("{mat_err:#}");
            warn!(path = %path.display(), %cause, "Level-5 reader failed, trying MAT v7.3");
            read_mat73(path).map_err(|h5_err| {
                anyhow!(
                    "could not load {}: Level-5 reader: {mat_err:#}; v7.3 reader: {h5_err:#}",
                    path.display()
                )
            })?
        }
    };
    Recording::from_vars(vars).with_context(|| format!("in {}", path.display()))
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Simple safetensors file writer for F32 and F64 tensors.
///
/// ```rust,no_run
/// use eeg_cnn::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("features", &[1.0f32, 2.0, 3.0], &[1, 3]);
/// w.add_f64("lb_maxrel", &[0.0f64], &[1]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

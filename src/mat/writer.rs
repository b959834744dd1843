//! Level-5 MAT writer for double arrays.
//!
//! Produces files `scipy.io.loadmat` and MATLAB both read.  Only `mxDOUBLE`
//! arrays are written; that is all the pipeline and its fixtures need.
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::{write::ZlibEncoder, Compression};
use ndarray::{ArrayBase, Data, Dimension};

use super::constants::*;
use super::element::padded_len;

/// Little-endian Level-5 MAT writer.
///
/// ```rust,no_run
/// use eeg_cnn::mat::MatWriter;
/// use ndarray::Array2;
///
/// let mut w = MatWriter::new().compressed(true);
/// w.add("lb", &Array2::<f64>::zeros((1, 10)));
/// w.write("/tmp/sub1.mat").unwrap();
/// ```
#[derive(Debug, Default)]
pub struct MatWriter {
    /// `(name, dims, column-major data)`
    entries: Vec<(String, Vec<usize>, Vec<f64>)>,
    compress: bool,
}

impl MatWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap every variable in an `miCOMPRESSED` element.
    pub fn compressed(mut self, on: bool) -> Self {
        self.compress = on;
        self
    }

    /// Add an array of any dimensionality.  1-D arrays are stored as `1×N`
    /// row vectors, scalars as `1×1`.
    pub fn add<S, A, D>(&mut self, name: &str, arr: &ArrayBase<S, D>)
    where
        S: Data<Elem = A>,
        A: Copy + Into<f64>,
        D: Dimension,
    {
        let mut dims = arr.shape().to_vec();
        match dims.len() {
            0 => dims = vec![1, 1],
            1 => dims.insert(0, 1),
            _ => {}
        }
        // Iterating the reversed-axes view visits elements in Fortran order.
        let data: Vec<f64> = arr.t().iter().map(|&v| v.into()).collect();
        self.entries.push((name.to_string(), dims, data));
    }

    /// Serialise the whole file.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(HEADER_LEN);
        let mut text = format!(
            "MATLAB 5.0 MAT-file, Platform: {}, Created by: eeg-cnn",
            std::env::consts::OS
        )
        .into_bytes();
        text.resize(HEADER_TEXT_LEN, b' ');
        out.extend_from_slice(&text);
        out.extend_from_slice(&[0u8; 8]); // subsystem data offset
        out.extend_from_slice(&MAT_VERSION.to_le_bytes());
        out.extend_from_slice(b"IM");

        for (name, dims, data) in &self.entries {
            let matrix = matrix_element(name, dims, data);
            if self.compress {
                let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
                enc.write_all(&matrix)?;
                let z = enc.finish().context("zlib compress")?;
                out.extend_from_slice(&MI_COMPRESSED.to_le_bytes());
                out.extend_from_slice(&(z.len() as u32).to_le_bytes());
                out.extend_from_slice(&z);
            } else {
                out.extend_from_slice(&matrix);
            }
        }
        Ok(out)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_bytes()?)
            .with_context(|| format!("writing {}", path.display()))
    }
}

/// Full `miMATRIX` element (tag included) for one double array.
fn matrix_element(name: &str, dims: &[usize], data: &[f64]) -> Vec<u8> {
    let mut body = Vec::new();

    let flags = [MX_DOUBLE as u32, 0u32];
    push_element(&mut body, MI_UINT32, &u32s_le(&flags));

    let dims32: Vec<u32> = dims.iter().map(|&d| d as u32).collect();
    push_element(&mut body, MI_INT32, &u32s_le(&dims32));

    push_element(&mut body, MI_INT8, name.as_bytes());

    let real: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
    push_element(&mut body, MI_DOUBLE, &real);

    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(&MI_MATRIX.to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

fn push_element(out: &mut Vec<u8>, mtype: u32, payload: &[u8]) {
    out.extend_from_slice(&mtype.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out.resize(out.len() + padded_len(payload.len()) - payload.len(), 0);
}

fn u32s_le(v: &[u32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

//! Level-5 MAT file reader, the counterpart of `scipy.io.loadmat`
//! for numeric variables.
//!
//! # Algorithm
//! 1. Validate the 128-byte header and pick the byte order from the endian
//!    indicator (`IM` → little-endian, `MI` → big-endian).
//! 2. Walk the top-level data elements.  `miCOMPRESSED` elements are inflated
//!    and walked recursively.
//! 3. Each `miMATRIX` is split into flags, dimensions, name and real part.
//!    Numeric classes become an `ArrayD<f64>` in Fortran (column-major) order;
//!    everything else is recorded as skipped.
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use flate2::read::ZlibDecoder;
use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use super::constants::*;
use super::element::{decode_numeric, decode_u32s, read_element, ByteOrder};

/// Numeric variables of one MAT file.
#[derive(Debug, Clone)]
pub struct MatFile {
    /// Descriptive header text (trailing spaces and NULs removed).
    pub header_text: String,
    /// Byte order of the file.
    pub byte_order: ByteOrder,
    vars: BTreeMap<String, ArrayD<f64>>,
    skipped: Vec<String>,
}

/// Outcome of decoding one `miMATRIX`.
enum Matrix {
    Numeric(String, ArrayD<f64>),
    Skipped(String),
}

impl MatFile {
    /// Parse a whole MAT file held in memory.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            bail!("MAT file too small ({} bytes)", bytes.len());
        }
        let header_text: String = bytes[..HEADER_TEXT_LEN]
            .iter()
            .map(|&b| b as char)
            .collect::<String>()
            .trim_end_matches(['\0', ' '])
            .to_string();
        if header_text.starts_with(V73_PREFIX) {
            bail!("MAT v7.3 (HDF5) files are not Level-5 MAT files");
        }

        let byte_order = match &bytes[126..128] {
            b"IM" => ByteOrder::Little,
            b"MI" => ByteOrder::Big,
            other => bail!("not a Level-5 MAT file (endian indicator {other:?})"),
        };
        let version = byte_order.u16([bytes[124], bytes[125]]);
        if version != MAT_VERSION {
            bail!("unsupported MAT version {version:#06x}");
        }

        let mut file = MatFile {
            header_text,
            byte_order,
            vars: BTreeMap::new(),
            skipped: Vec::new(),
        };
        file.walk(&bytes[HEADER_LEN..])?;
        Ok(file)
    }

    /// Look up a numeric variable.
    pub fn get(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.vars.get(name)
    }

    /// Look up a numeric variable, failing with its name when absent.
    pub fn require(&self, name: &str) -> Result<&ArrayD<f64>> {
        self.vars
            .get(name)
            .with_context(|| format!("variable '{name}' not found in MAT file"))
    }

    /// Names of variables that were present but not numeric.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Move the numeric variables out of the file.
    pub fn into_vars(self) -> BTreeMap<String, ArrayD<f64>> {
        self.vars
    }

    fn walk(&mut self, buf: &[u8]) -> Result<()> {
        let order = self.byte_order;
        let mut pos = 0;
        while pos + 8 <= buf.len() {
            let (hdr, data, next) = read_element(buf, pos, order)?;
            match hdr.mtype {
                MI_COMPRESSED => {
                    let mut inflated = Vec::new();
                    ZlibDecoder::new(data)
                        .read_to_end(&mut inflated)
                        .with_context(|| format!("inflate miCOMPRESSED @ {pos:#x}"))?;
                    self.walk(&inflated)?;
                }
                MI_MATRIX if hdr.nbytes > 0 => match parse_matrix(data, order)
                    .with_context(|| format!("decode miMATRIX @ {pos:#x}"))?
                {
                    Matrix::Numeric(name, arr) => {
                        self.vars.insert(name, arr);
                    }
                    Matrix::Skipped(name) => self.skipped.push(name),
                },
                _ => {}
            }
            if next <= pos {
                break;
            }
            pos = next;
        }
        Ok(())
    }
}

/// Read and parse a MAT file from disk.
pub fn read_mat<P: AsRef<Path>>(path: P) -> Result<MatFile> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading {}", path.display()))?;
    MatFile::parse(&bytes).with_context(|| format!("parsing {}", path.display()))
}

fn parse_matrix(buf: &[u8], order: ByteOrder) -> Result<Matrix> {
    // 1. Array flags.
    let (flags_hdr, flags, pos) = read_element(buf, 0, order)?;
    if flags_hdr.mtype != MI_UINT32 || flags.len() < 8 {
        bail!("malformed array flags (type {}, {} bytes)", flags_hdr.mtype, flags.len());
    }
    let flag_word = decode_u32s(flags, order)[0];
    let class = (flag_word & 0xff) as u8;

    // 2. Dimensions.
    let (dims_hdr, dims_raw, pos) = read_element(buf, pos, order)?;
    if dims_hdr.mtype != MI_INT32 {
        bail!("malformed dimensions element (type {})", dims_hdr.mtype);
    }
    let dims: Vec<usize> = decode_u32s(dims_raw, order)
        .into_iter()
        .map(|d| d as i32)
        .map(|d| if d < 0 { 0 } else { d as usize })
        .collect();

    // 3. Name.
    let (_, name_raw, pos) = read_element(buf, pos, order)?;
    let name = String::from_utf8_lossy(name_raw).trim_end_matches('\0').to_string();

    if !is_numeric_class(class) {
        return Ok(Matrix::Skipped(name));
    }

    // 4. Real part (imaginary part, if any, is ignored).
    let n_expected = dims
        .iter()
        .try_fold(1_usize, |acc, &d| acc.checked_mul(d))
        .with_context(|| format!("variable '{name}': dims {dims:?} overflow the element count"))?;
    let real = if n_expected == 0 {
        Vec::new()
    } else {
        let (real_hdr, real_raw, _) = read_element(buf, pos, order)?;
        decode_numeric(real_hdr.mtype, real_raw, order)?
    };
    if real.len() != n_expected {
        bail!("variable '{name}': dims {dims:?} need {n_expected} values, got {}", real.len());
    }

    let arr = ArrayD::from_shape_vec(IxDyn(&dims).f(), real)
        .with_context(|| format!("variable '{name}': shape {dims:?}"))?;
    Ok(Matrix::Numeric(name, arr))
}

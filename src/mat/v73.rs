//! MAT v7.3 reader.
//!
//! A v7.3 file is an HDF5 container behind a 512-byte user block holding the
//! usual MAT header text.  Every top-level dataset is one variable.  MATLAB
//! writes its column-major arrays with the dimension order reversed, so the
//! axes are reversed back on read.
//!
//! Needs the `hdf5` cargo feature (links the HDF5 C library).
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use ndarray::ArrayD;

/// Read every numeric top-level dataset of a v7.3 file as `f64`, in MATLAB
/// index order.
#[cfg(feature = "hdf5")]
pub fn read_mat73<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, ArrayD<f64>>> {
    use anyhow::Context;
    use tracing::debug;

    let path = path.as_ref();
    let file = hdf5::File::open(path)
        .with_context(|| format!("opening {} as HDF5", path.display()))?;
    let mut vars = BTreeMap::new();
    for name in file.member_names()? {
        let Ok(ds) = file.dataset(&name) else {
            debug!(%name, "skipping non-dataset member");
            continue;
        };
        match ds.read_dyn::<f64>() {
            Ok(arr) => {
                vars.insert(name, arr.reversed_axes());
            }
            Err(e) => debug!(%name, error = %e, "skipping non-numeric dataset"),
        }
    }
    Ok(vars)
}

#[cfg(not(feature = "hdf5"))]
pub fn read_mat73<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, ArrayD<f64>>> {
    anyhow::bail!(
        "{}: reading MAT v7.3 files needs the `hdf5` feature",
        path.as_ref().display()
    )
}

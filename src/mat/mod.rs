//! MATLAB Level-5 MAT file reader and writer.
//!
//! Covers the files written by MATLAB's `save` (up to `-v7`, including
//! zlib-compressed variables) and by `scipy.io.savemat`.  v7.3 files are HDF5
//! containers; [`read_mat`] rejects them and [`read_mat73`] (behind the `hdf5`
//! feature) reads them.
//!
//! # Quick start
//! ```no_run
//! use eeg_cnn::mat::read_mat;
//!
//! let mat = read_mat("dat_sub/sub1.mat").unwrap();
//! let ep = mat.require("ep").unwrap();   // [channels, samples, trials]
//! println!("ep shape {:?}", ep.shape());
//! ```
pub mod constants;
pub mod element;
pub mod reader;
pub mod v73;
pub mod writer;

pub use element::{ByteOrder, ElementHeader, read_element, read_element_header};
pub use reader::{read_mat, MatFile};
pub use v73::read_mat73;
pub use writer::MatWriter;

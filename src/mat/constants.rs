//! MAT-file Level-5 constants.
//!
//! Names follow the MathWorks "MAT-File Format" document so the reader can be
//! cross-referenced against it.  Every value in a Level-5 file is wrapped in a
//! **data element**: an 8-byte tag (`type`, `nbytes`) followed by a payload
//! padded to a multiple of 8 bytes.  Arrays are `miMATRIX` elements whose
//! payload is itself a sequence of sub-elements (flags, dimensions, name, data).

// ── File header ───────────────────────────────────────────────────────────

/// Total header length; the first data element starts here.
pub const HEADER_LEN:      usize = 128;
/// Length of the descriptive text at the start of the header.
pub const HEADER_TEXT_LEN: usize = 116;
/// Level-5 version word.
pub const MAT_VERSION:     u16 = 0x0100;
/// Text prefix of v7.3 files, which are HDF5 containers.
pub const V73_PREFIX:      &str = "MATLAB 7.3";

// ── Data types (tag `type` field) ─────────────────────────────────────────

pub const MI_INT8:       u32 = 1;
pub const MI_UINT8:      u32 = 2;
pub const MI_INT16:      u32 = 3;
pub const MI_UINT16:     u32 = 4;
pub const MI_INT32:      u32 = 5;
pub const MI_UINT32:     u32 = 6;
pub const MI_SINGLE:     u32 = 7;
pub const MI_DOUBLE:     u32 = 9;
pub const MI_INT64:      u32 = 12;
pub const MI_UINT64:     u32 = 13;
/// Array container.
pub const MI_MATRIX:     u32 = 14;
/// zlib-compressed data element.
pub const MI_COMPRESSED: u32 = 15;

// ── Array classes (low byte of the array-flags word) ──────────────────────
//
// 1–5 are cell, struct, object, char and sparse; 6–15 are the numeric
// classes from double through uint64.

pub const MX_DOUBLE: u8 = 6;
pub const MX_UINT64: u8 = 15;

/// `true` for classes whose payload is a plain numeric array.
pub fn is_numeric_class(class: u8) -> bool {
    (MX_DOUBLE..=MX_UINT64).contains(&class)
}

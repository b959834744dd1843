//! MAT data-element I/O.
//!
//! A data element is the smallest structural unit of a Level-5 MAT file.
//! Two on-disk layouts exist:
//!
//! ```text
//! regular:  ┌ type : u32 ┬ nbytes : u32 ┐ <nbytes payload> <pad to 8>
//! small:    ┌ nbytes : u16 ┬ type : u16 ┬ <≤4 bytes payload, padded> ┐   (8 bytes total)
//! ```
//!
//! The small format is recognised by a non-zero upper half of the first word.
//! `miCOMPRESSED` payloads are never padded.
use anyhow::{bail, Result};

use super::constants::*;

/// Byte order declared by the file's endian indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    #[inline]
    pub fn u16(self, b: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        }
    }

    #[inline]
    pub fn u32(self, b: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        }
    }
}

/// Header of one data element, with its payload location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    pub mtype: u32,
    pub nbytes: usize,
    /// Offset of the tag within the buffer.
    pub pos: usize,
    /// `true` for the 8-byte small data element format.
    pub small: bool,
}

impl ElementHeader {
    /// Offset of the first payload byte.
    #[inline]
    pub fn data_pos(&self) -> usize {
        if self.small { self.pos + 4 } else { self.pos + 8 }
    }

    /// Offset of the next element's tag.
    pub fn next_pos(&self) -> usize {
        if self.small {
            self.pos + 8
        } else if self.mtype == MI_COMPRESSED {
            self.pos + 8 + self.nbytes
        } else {
            self.pos + 8 + padded_len(self.nbytes)
        }
    }
}

/// Round `n` up to the next multiple of 8.
#[inline]
pub fn padded_len(n: usize) -> usize {
    n.div_ceil(8) * 8
}

/// Read the element tag at `pos`.
pub fn read_element_header(buf: &[u8], pos: usize, order: ByteOrder) -> Result<ElementHeader> {
    let word = order.u32(word_at(buf, pos)?);
    if word >> 16 != 0 {
        return Ok(ElementHeader {
            mtype: word & 0xffff,
            nbytes: (word >> 16) as usize,
            pos,
            small: true,
        });
    }
    let nbytes = order.u32(word_at(buf, pos + 4)?) as usize;
    Ok(ElementHeader { mtype: word, nbytes, pos, small: false })
}

/// Borrow the payload of `hdr`.
pub fn payload<'a>(buf: &'a [u8], hdr: &ElementHeader) -> Result<&'a [u8]> {
    let start = hdr.data_pos();
    if hdr.small && hdr.nbytes > 4 {
        bail!("small data element @ {:#x} claims {} bytes", hdr.pos, hdr.nbytes);
    }
    let end = start.saturating_add(hdr.nbytes);
    if end > buf.len() {
        bail!(
            "data element @ {:#x} (type {}) needs {} bytes, only {} available",
            hdr.pos, hdr.mtype, hdr.nbytes, buf.len().saturating_sub(start)
        );
    }
    Ok(&buf[start..end])
}

/// Read the element at `pos`, returning its header, payload and the next offset.
pub fn read_element(buf: &[u8], pos: usize, order: ByteOrder) -> Result<(ElementHeader, &[u8], usize)> {
    let hdr = read_element_header(buf, pos, order)?;
    let data = payload(buf, &hdr)?;
    Ok((hdr, data, hdr.next_pos().min(buf.len())))
}

/// Widen a numeric payload of any storage type to `f64`.
pub fn decode_numeric(mtype: u32, data: &[u8], order: ByteOrder) -> Result<Vec<f64>> {
    macro_rules! widen {
        ($t:ty, $n:expr) => {
            data.chunks_exact($n)
                .map(|b| {
                    let mut arr = [0u8; $n];
                    arr.copy_from_slice(b);
                    (match order {
                        ByteOrder::Little => <$t>::from_le_bytes(arr),
                        ByteOrder::Big => <$t>::from_be_bytes(arr),
                    }) as f64
                })
                .collect()
        };
    }
    Ok(match mtype {
        MI_INT8 => data.iter().map(|&b| b as i8 as f64).collect(),
        MI_UINT8 => data.iter().map(|&b| b as f64).collect(),
        MI_INT16 => widen!(i16, 2),
        MI_UINT16 => widen!(u16, 2),
        MI_INT32 => widen!(i32, 4),
        MI_UINT32 => widen!(u32, 4),
        MI_SINGLE => widen!(f32, 4),
        MI_DOUBLE => widen!(f64, 8),
        MI_INT64 => widen!(i64, 8),
        MI_UINT64 => widen!(u64, 8),
        other => bail!("data type {other} is not numeric"),
    })
}

/// Decode an `miINT32` / `miUINT32` payload as integers (dimensions, flags).
pub fn decode_u32s(data: &[u8], order: ByteOrder) -> Vec<u32> {
    data.chunks_exact(4)
        .map(|b| order.u32([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn word_at(buf: &[u8], pos: usize) -> Result<[u8; 4]> {
    match buf.get(pos..pos + 4) {
        Some(b) => Ok([b[0], b[1], b[2], b[3]]),
        None => bail!("truncated word @ {pos:#x}"),
    }
}

//! Spectrogram → network input reshaping.
//!
//! ```text
//! [N, C, time, freq]  ─ select_channels ─▶  [N, 4, time, freq]
//!                     ─ flatten_trials  ─▶  [N, 4·freq·time]   block c = (freq, time)
//!                     ─ assemble_grid   ─▶  [2·freq, 2·time]   per trial
//!
//!     ┌────────┬────────┐
//!     │  ch 0  │  ch 2  │   each tile: freq down, time across
//!     ├────────┼────────┤
//!     │  ch 1  │  ch 3  │
//!     └────────┴────────┘
//! ```
use anyhow::{bail, Result};
use ndarray::{s, Array2, Array4, ArrayView1, ArrayView2, Axis};

/// Number of channels tiled into one image.
pub const GRID_CHANNELS: usize = 4;

/// Keep the four grid channels, in tile order.
pub fn select_channels(spec: &Array4<f32>, channels: &[usize; GRID_CHANNELS]) -> Result<Array4<f32>> {
    let n_ch = spec.shape()[1];
    if let Some(&bad) = channels.iter().find(|&&c| c >= n_ch) {
        bail!("grid channel {bad} out of range: recording has {n_ch} channels");
    }
    Ok(spec.select(Axis(1), channels))
}

/// Flatten `[N, C, time, freq]` into `[N, C·freq·time]`, each channel block
/// laid out `(freq, time)` row-major.
pub fn flatten_trials(spec: &Array4<f32>) -> Array2<f32> {
    let (n, c, t, f) = spec.dim();
    let block = f * t;
    Array2::from_shape_fn((n, c * block), |(i, j)| {
        let (ci, rem) = (j / block, j % block);
        spec[[i, ci, rem % t, rem / t]]
    })
}

/// Tile one flattened trial into its `[2·freq, 2·time]` image.
pub fn assemble_grid(row: ArrayView1<f32>, n_freq: usize, n_time: usize) -> Result<Array2<f32>> {
    let block = n_freq * n_time;
    if row.len() != GRID_CHANNELS * block {
        bail!(
            "feature row has {} values, expected {GRID_CHANNELS}·{n_freq}·{n_time} = {}",
            row.len(),
            GRID_CHANNELS * block
        );
    }
    let mut grid = Array2::<f32>::zeros((2 * n_freq, 2 * n_time));
    for c in 0..GRID_CHANNELS {
        let tile = row.slice(s![c * block..(c + 1) * block]);
        let tile: ArrayView2<f32> = tile.into_shape_with_order((n_freq, n_time))?;
        let (r0, c0) = ((c % 2) * n_freq, (c / 2) * n_time);
        grid.slice_mut(s![r0..r0 + n_freq, c0..c0 + n_time]).assign(&tile);
    }
    Ok(grid)
}

/// Images for the given trial rows, flattened in `(B, 1, H, W)` order.
pub fn to_image_batch(
    features: &Array2<f32>,
    rows: &[usize],
    n_freq: usize,
    n_time: usize,
) -> Result<Vec<f32>> {
    let mut out = Vec::with_capacity(rows.len() * GRID_CHANNELS * n_freq * n_time);
    for &r in rows {
        if r >= features.nrows() {
            bail!("trial row {r} out of range ({} trials)", features.nrows());
        }
        let grid = assemble_grid(features.row(r), n_freq, n_time)?;
        out.extend(grid.iter().copied());
    }
    Ok(out)
}

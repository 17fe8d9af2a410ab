//! Dominant-color estimators.
//!
//! `resampled_mean` is the fast path: nearest-neighbour resample of the cell to
//! a `size x size` grid, then the per-channel mean. It is a spatial mean, not a
//! frequency mode. `most_frequent` counts exact RGB values instead.

use std::collections::HashMap;

use crate::frame::{Frame, CHANNELS};
use crate::grid::CellRegion;

pub(super) fn resampled_mean(frame: &Frame, region: &CellRegion, size: u32) -> [f32; 3] {
    let (w, h) = (region.width() as u64, region.height() as u64);
    let size = size.max(1) as u64;
    let mut sums = [0u64; 3];

    for j in 0..size {
        // Nearest-neighbour source coordinate: floor(dst * src / dst_size).
        let y = region.y_start + ((j * h) / size).min(h - 1) as u32;
        for i in 0..size {
            let x = region.x_start + ((i * w) / size).min(w - 1) as u32;
            let px = frame.pixel(x, y);
            sums[0] += px[0] as u64;
            sums[1] += px[1] as u64;
            sums[2] += px[2] as u64;
        }
    }

    let samples = (size * size) as f64;
    sums.map(|sum| (sum as f64 / samples / 255.0) as f32)
}

pub(super) fn most_frequent(frame: &Frame, region: &CellRegion) -> [f32; 3] {
    let mut counts: HashMap<u32, u32> = HashMap::new();
    for y in region.y_start..region.y_end {
        for px in frame
            .row_span(y, region.x_start, region.x_end)
            .chunks_exact(CHANNELS)
        {
            let packed = (px[0] as u32) << 16 | (px[1] as u32) << 8 | px[2] as u32;
            *counts.entry(packed).or_insert(0) += 1;
        }
    }

    // Ties resolve to the smallest packed value so results are reproducible.
    let packed = counts
        .into_iter()
        .max_by(|(ka, ca), (kb, cb)| ca.cmp(cb).then(kb.cmp(ka)))
        .map(|(key, _)| key)
        .unwrap_or(0);

    [
        ((packed >> 16) & 0xFF) as f32 / 255.0,
        ((packed >> 8) & 0xFF) as f32 / 255.0,
        (packed & 0xFF) as f32 / 255.0,
    ]
}

use serde::{Deserialize, Serialize};

use super::dominant;
use super::AnalyzerSettings;
use crate::error::{Error, Result};
use crate::frame::{Frame, CHANNELS};
use crate::grid::CellRegion;

const CHANNEL_MAX: f64 = 255.0;

/// Features of one grid cell for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellFeatures {
    pub row: u32,
    pub col: u32,
    /// Channel means normalized to [0, 1].
    pub avg_red: f32,
    pub avg_green: f32,
    pub avg_blue: f32,
    /// Mean of the three normalized channel means (not luma weighted).
    pub brightness: f32,
    /// Luma standard deviation divided by the contrast scale. Not clamped.
    pub contrast: f32,
    /// Approximate representative color, RGB in [0, 1].
    pub dominant_color: [f32; 3],
}

impl CellFeatures {
    /// Features of a cell filled with a single normalized color.
    pub fn uniform(row: u32, col: u32, rgb: [f32; 3]) -> Self {
        Self {
            row,
            col,
            avg_red: rgb[0],
            avg_green: rgb[1],
            avg_blue: rgb[2],
            brightness: (rgb[0] + rgb[1] + rgb[2]) / 3.0,
            contrast: 0.0,
            dominant_color: rgb,
        }
    }

    pub fn rgb(&self) -> [f32; 3] {
        [self.avg_red, self.avg_green, self.avg_blue]
    }
}

/// Fixed-point BT.601 luma with 14 fractional bits, rounded to 8 bits.
#[inline]
pub(super) fn luma(r: u8, g: u8, b: u8) -> u32 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    (r as u32 * R + g as u32 * G + b as u32 * B + (1 << 13)) >> 14
}

pub(super) fn analyze_cell(
    frame: &Frame,
    region: &CellRegion,
    settings: &AnalyzerSettings,
) -> Result<CellFeatures> {
    let count = region.pixel_count();
    if count == 0 {
        return Err(Error::Internal(format!(
            "cell ({}, {}) has no pixels",
            region.row, region.col
        )));
    }

    let mut sums = [0u64; 3];
    let mut luma_sum = 0u64;
    let mut luma_sq_sum = 0u64;

    for y in region.y_start..region.y_end {
        for px in frame
            .row_span(y, region.x_start, region.x_end)
            .chunks_exact(CHANNELS)
        {
            sums[0] += px[0] as u64;
            sums[1] += px[1] as u64;
            sums[2] += px[2] as u64;
            let l = luma(px[0], px[1], px[2]) as u64;
            luma_sum += l;
            luma_sq_sum += l * l;
        }
    }

    let n = count as f64;
    let avg = sums.map(|sum| sum as f64 / n / CHANNEL_MAX);
    let brightness = (avg[0] + avg[1] + avg[2]) / 3.0;

    // Population variance from exact integer moments: (n*Σx² - (Σx)²) / n².
    let spread = (count as u128 * luma_sq_sum as u128)
        .saturating_sub(luma_sum as u128 * luma_sum as u128);
    let variance = spread as f64 / (n * n);
    let contrast = variance.sqrt() / settings.contrast_scale as f64;

    let dominant_color = match settings.dominant_mode {
        super::DominantMode::Mean => {
            dominant::resampled_mean(frame, region, settings.dominant_sample)
        }
        super::DominantMode::Mode => dominant::most_frequent(frame, region),
    };

    Ok(CellFeatures {
        row: region.row,
        col: region.col,
        avg_red: avg[0] as f32,
        avg_green: avg[1] as f32,
        avg_blue: avg[2] as f32,
        brightness: brightness as f32,
        contrast: contrast as f32,
        dominant_color,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_keeps_extremes_and_grays() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(128, 128, 128), 128);
        // Green dominates the weighting.
        assert!(luma(0, 255, 0) > luma(255, 0, 0));
        assert!(luma(255, 0, 0) > luma(0, 0, 255));
    }

    #[test]
    fn empty_region_is_an_invariant_violation() {
        let frame = Frame::filled(4, 4, [1, 2, 3]).unwrap();
        let region = CellRegion {
            row: 0,
            col: 0,
            x_start: 2,
            x_end: 2,
            y_start: 0,
            y_end: 4,
        };
        let err = analyze_cell(&frame, &region, &AnalyzerSettings::default()).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn colored_cell_contrast_uses_luma_not_channel_mean() {
        // Pure red next to pure blue: equal channel means, different luma.
        let frame = Frame::from_rgb(vec![255, 0, 0, 0, 0, 255], 2, 1).unwrap();
        let region = CellRegion {
            row: 0,
            col: 0,
            x_start: 0,
            x_end: 2,
            y_start: 0,
            y_end: 1,
        };
        let cell = analyze_cell(&frame, &region, &AnalyzerSettings::default()).unwrap();
        let expected = (luma(255, 0, 0) as f64 - luma(0, 0, 255) as f64).abs() / 2.0 / 255.0;
        assert!((cell.contrast as f64 - expected).abs() < 1e-6);
        assert!((cell.brightness - 1.0 / 3.0).abs() < 1e-6);
    }
}

//! Raster frame container.
//!
//! - `Frame`: one RGB8 image handed from a `FrameSource` to the analyzer.
//!
//! Frames are produced fresh every iteration and dropped after analysis. The
//! pixel buffer is private; read access goes through row slices so callers
//! cannot desynchronize the buffer from its dimensions.

use image::RgbImage;
use std::time::Instant;

use crate::error::{Error, Result};

/// Bytes per pixel (R, G, B).
pub const CHANNELS: usize = 3;

// ----------------------------------------------------------------------------
// Frame: immutable RGB8 raster
// ----------------------------------------------------------------------------

/// Immutable RGB8 raster, row-major, channel order R, G, B.
///
/// Not `Clone`: a frame belongs to exactly one loop iteration.
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    /// Source-assigned sequence number, starting at 0.
    sequence: u64,
    /// Monotonic capture instant.
    captured_at: Instant,
}

impl Frame {
    /// Wrap an RGB8 buffer. Fails when the buffer length does not match the dimensions.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::acquisition(
                "frame rejected",
                format!("empty dimensions {}x{}", width, height),
            ));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(CHANNELS))
            .ok_or_else(|| Error::acquisition("frame rejected", "dimensions overflow"))?;
        if data.len() != expected {
            return Err(Error::acquisition(
                "frame rejected",
                format!(
                    "RGB length mismatch: expected {}, got {}",
                    expected,
                    data.len()
                ),
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence: 0,
            captured_at: Instant::now(),
        })
    }

    /// A frame where every pixel has the same color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let pixels = width as usize * height as usize;
        let data = rgb.iter().copied().cycle().take(pixels * CHANNELS).collect();
        Self::from_rgb(data, width, height)
    }

    pub(crate) fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn age(&self) -> std::time::Duration {
        self.captured_at.elapsed()
    }

    /// RGB bytes of row `y` between columns `[x_start, x_end)`.
    pub fn row_span(&self, y: u32, x_start: u32, x_end: u32) -> &[u8] {
        let stride = self.width as usize * CHANNELS;
        let offset = y as usize * stride;
        &self.data[offset + x_start as usize * CHANNELS..offset + x_end as usize * CHANNELS]
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let span = self.row_span(y, x, x + 1);
        [span[0], span[1], span[2]]
    }

    pub fn as_rgb(&self) -> &[u8] {
        &self.data
    }
}

impl TryFrom<RgbImage> for Frame {
    type Error = Error;

    fn try_from(image: RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Frame::from_rgb(image.into_raw(), width, height)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

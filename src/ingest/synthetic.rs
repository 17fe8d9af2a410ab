//! Synthetic frame source (`stub://`) for tests and demos.
//!
//! Patterns are deterministic except `noise`, which is driven by a seeded RNG
//! so runs are still reproducible. The scene shifts every 50 frames to
//! simulate something entering the view.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{CaptureConfig, FrameSource, SourceStats};
use crate::error::{Error, Result};
use crate::frame::{Frame, CHANNELS};

const SCENE_PERIOD: u64 = 50;
const NOISE_SEED: u64 = 0x5eed_f00d;

/// Eight classic colour bars.
const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [0, 0, 0],
];

/// Test pattern drawn by `SyntheticSource`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyntheticPattern {
    /// Horizontal red ramp, vertical green ramp, blue tracks the scene.
    Gradient,
    /// Vertical colour bars, rotated one bar per scene change.
    Bars,
    /// Top half white, bottom half black.
    Split,
    /// Uniform random pixels.
    Noise,
}

impl SyntheticPattern {
    /// Unknown names fall back to `Gradient`, so `stub://anything` works.
    pub fn from_name(name: &str) -> Self {
        match name.trim_matches('/').to_ascii_lowercase().as_str() {
            "bars" => SyntheticPattern::Bars,
            "split" => SyntheticPattern::Split,
            "noise" => SyntheticPattern::Noise,
            _ => SyntheticPattern::Gradient,
        }
    }
}

pub struct SyntheticSource {
    name: String,
    pattern: SyntheticPattern,
    capture: CaptureConfig,
    frame_limit: Option<u64>,
    frame_count: u64,
    scene_state: u8,
    rng: StdRng,
    started: bool,
}

impl SyntheticSource {
    pub fn new(name: String, pattern: SyntheticPattern, capture: CaptureConfig) -> Self {
        Self {
            name,
            pattern,
            capture,
            frame_limit: None,
            frame_count: 0,
            scene_state: 0,
            rng: StdRng::seed_from_u64(NOISE_SEED),
            started: false,
        }
    }

    /// Ends the stream after `limit` frames.
    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.frame_limit = limit;
        self
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let width = self.capture.width as usize;
        let height = self.capture.height as usize;
        let mut pixels = vec![0u8; width * height * CHANNELS];

        if self.frame_count % SCENE_PERIOD == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        match self.pattern {
            SyntheticPattern::Gradient => {
                let shift = self.frame_count as usize;
                for (i, px) in pixels.chunks_exact_mut(CHANNELS).enumerate() {
                    let (x, y) = (i % width, i / width);
                    px[0] = (((x * 255) / width.max(1) + shift) % 256) as u8;
                    px[1] = ((y * 255) / height.max(1)) as u8;
                    px[2] = self.scene_state.wrapping_mul(40);
                }
            }
            SyntheticPattern::Bars => {
                let offset = self.scene_state as usize;
                for (i, px) in pixels.chunks_exact_mut(CHANNELS).enumerate() {
                    let bar = (i % width) * BARS.len() / width.max(1);
                    px.copy_from_slice(&BARS[(bar + offset) % BARS.len()]);
                }
            }
            SyntheticPattern::Split => {
                let split = width * (height / 2) * CHANNELS;
                pixels[..split].fill(255);
            }
            SyntheticPattern::Noise => self.rng.fill(pixels.as_mut_slice()),
        }

        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    /// Synthetic sources are always available.
    fn start(&mut self) -> Result<()> {
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(Error::acquisition(
                &self.name,
                format!(
                    "cannot draw a {}x{} frame",
                    self.capture.width, self.capture.height
                ),
            ));
        }
        self.started = true;
        log::info!(
            "SyntheticSource: started {} ({:?}, {}x{})",
            self.name,
            self.pattern,
            self.capture.width,
            self.capture.height
        );
        Ok(())
    }

    fn get_frame(&mut self) -> Result<Option<Frame>> {
        if !self.started {
            return Err(Error::acquisition(&self.name, "source not started"));
        }
        if self
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(None);
        }

        let pixels = self.generate_pixels();
        let frame = Frame::from_rgb(pixels, self.capture.width, self.capture.height)?
            .with_sequence(self.frame_count);
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn stop(&mut self) {
        if self.started {
            log::debug!(
                "SyntheticSource: stopped {} after {} frames",
                self.name,
                self.frame_count
            );
        }
        self.started = false;
    }

    fn frame_size(&self) -> Option<(u32, u32)> {
        Some((self.capture.width, self.capture.height))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.name.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

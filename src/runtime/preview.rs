use crate::analyze::FrameFeatureSet;
use crate::frame::Frame;

/// Per-frame observer called after the bundle is sent.
///
/// Implementations must return promptly; the loop does not time them out.
pub trait Preview {
    fn show(&mut self, frame: &Frame, features: &FrameFeatureSet);
}

/// Logs a coarse brightness map every `every` frames.
pub struct ConsoleSummary {
    every: u64,
    seen: u64,
}

impl ConsoleSummary {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            seen: 0,
        }
    }
}

/// Ten-step ramp from dark to bright.
const SHADES: &[u8; 10] = b" .:-=+*#%@";

/// One character per cell, rows separated by newlines.
pub fn brightness_map(features: &FrameFeatureSet) -> String {
    let cols = features.shape().cols() as usize;
    let mut out = String::with_capacity(features.len() + features.shape().rows() as usize);
    for (i, cell) in features.iter().enumerate() {
        if i > 0 && i % cols == 0 {
            out.push('\n');
        }
        let step = (cell.brightness.clamp(0.0, 1.0) * 9.0).round() as usize;
        out.push(SHADES[step] as char);
    }
    out
}

impl Preview for ConsoleSummary {
    fn show(&mut self, frame: &Frame, features: &FrameFeatureSet) {
        self.seen += 1;
        if self.seen % self.every != 0 {
            return;
        }
        log::debug!(
            "frame {} ({}x{}, mean brightness {:.3}):\n{}",
            frame.sequence(),
            frame.width(),
            frame.height(),
            features.mean_brightness(),
            brightness_map(features)
        );
    }
}

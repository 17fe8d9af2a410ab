//! Per-cell feature extraction.
//!
//! `GridAnalyzer` owns an immutable grid layout for a fixed frame size and
//! turns each `Frame` into a `FrameFeatureSet`: one `CellFeatures` record per
//! cell, in row-major order.
//!
//! Layout validation (grid fits the frame) happens once, in
//! `GridAnalyzer::new`. `analyze` only checks that the source did not change
//! resolution mid-stream.

mod cell;
mod dominant;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::grid::{CellRegion, GridShape};

pub use cell::CellFeatures;

/// Default divisor for the luma standard deviation.
pub const DEFAULT_CONTRAST_SCALE: f32 = 255.0;

/// Default edge length of the resampled grid used for the dominant color.
pub const DEFAULT_DOMINANT_SAMPLE: u32 = 10;

/// How the per-cell dominant color is derived.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DominantMode {
    /// Mean of a nearest-neighbour resample (fast approximation).
    #[default]
    Mean,
    /// Most frequent exact RGB value in the cell.
    Mode,
}

impl std::str::FromStr for DominantMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(DominantMode::Mean),
            "mode" => Ok(DominantMode::Mode),
            other => Err(Error::config(format!(
                "unknown dominant mode '{}' (expected mean|mode)",
                other
            ))),
        }
    }
}

/// Tunables for the per-cell statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyzerSettings {
    /// Luma standard deviation is divided by this value. 255 keeps contrast
    /// in [0, 0.5] for 8-bit input; 128 stretches it to roughly [0, 1].
    pub contrast_scale: f32,
    pub dominant_mode: DominantMode,
    /// Edge length of the resample grid for `DominantMode::Mean`.
    pub dominant_sample: u32,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            contrast_scale: DEFAULT_CONTRAST_SCALE,
            dominant_mode: DominantMode::Mean,
            dominant_sample: DEFAULT_DOMINANT_SAMPLE,
        }
    }
}

impl AnalyzerSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.contrast_scale.is_finite() || self.contrast_scale <= 0.0 {
            return Err(Error::config(format!(
                "contrast_scale must be a positive number (got {})",
                self.contrast_scale
            )));
        }
        if self.dominant_sample == 0 {
            return Err(Error::config("dominant_sample must be at least 1"));
        }
        Ok(())
    }
}

/// Ordered per-cell features for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameFeatureSet {
    shape: GridShape,
    cells: Vec<CellFeatures>,
}

impl FrameFeatureSet {
    /// Fails unless `cells` holds exactly one record per cell, in row-major order.
    pub fn new(shape: GridShape, cells: Vec<CellFeatures>) -> Result<Self> {
        if cells.len() != shape.cell_count() {
            return Err(Error::Internal(format!(
                "{} grid needs {} cells, got {}",
                shape,
                shape.cell_count(),
                cells.len()
            )));
        }
        for (index, cell) in cells.iter().enumerate() {
            let expected_row = (index / shape.cols() as usize) as u32;
            let expected_col = (index % shape.cols() as usize) as u32;
            if cell.row != expected_row || cell.col != expected_col {
                return Err(Error::Internal(format!(
                    "cell {} is ({}, {}), expected ({}, {})",
                    index, cell.row, cell.col, expected_row, expected_col
                )));
            }
        }
        Ok(Self { shape, cells })
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn cells(&self) -> &[CellFeatures] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&CellFeatures> {
        if row >= self.shape.rows() || col >= self.shape.cols() {
            return None;
        }
        self.cells.get(row as usize * self.shape.cols() as usize + col as usize)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CellFeatures> {
        self.cells.iter()
    }

    /// Mean brightness over all cells.
    pub fn mean_brightness(&self) -> f32 {
        if self.cells.is_empty() {
            return 0.0;
        }
        self.cells.iter().map(|c| c.brightness).sum::<f32>() / self.cells.len() as f32
    }
}

impl<'a> IntoIterator for &'a FrameFeatureSet {
    type Item = &'a CellFeatures;
    type IntoIter = std::slice::Iter<'a, CellFeatures>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}

/// Partitions frames of one fixed size and computes per-cell features.
#[derive(Clone, Debug)]
pub struct GridAnalyzer {
    shape: GridShape,
    settings: AnalyzerSettings,
    width: u32,
    height: u32,
    regions: Vec<CellRegion>,
}

impl GridAnalyzer {
    /// Validates the grid against the frame size and precomputes the cell layout.
    pub fn new(
        shape: GridShape,
        settings: AnalyzerSettings,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Self> {
        settings.validate()?;
        let regions = shape.partition(frame_width, frame_height)?;
        log::debug!(
            "GridAnalyzer: {} grid over {}x{} frames ({} cells, dominant={:?})",
            shape,
            frame_width,
            frame_height,
            regions.len(),
            settings.dominant_mode
        );
        Ok(Self {
            shape,
            settings,
            width: frame_width,
            height: frame_height,
            regions,
        })
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn regions(&self) -> &[CellRegion] {
        &self.regions
    }

    pub fn analyze(&self, frame: &Frame) -> Result<FrameFeatureSet> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(Error::Acquisition(format!(
                "frame size changed from {}x{} to {}x{}",
                self.width,
                self.height,
                frame.width(),
                frame.height()
            )));
        }

        let cells = self
            .regions
            .iter()
            .map(|region| cell::analyze_cell(frame, region, &self.settings))
            .collect::<Result<Vec<_>>>()?;

        Ok(FrameFeatureSet {
            shape: self.shape,
            cells,
        })
    }
}

/// One-shot analysis with default settings.
pub fn analyze_frame(frame: &Frame, shape: GridShape) -> Result<FrameFeatureSet> {
    GridAnalyzer::new(
        shape,
        AnalyzerSettings::default(),
        frame.width(),
        frame.height(),
    )?
    .analyze(frame)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! Grid shape and frame partitioning.
//!
//! A `GridShape` splits every frame into `rows x cols` rectangular cells using
//! integer division. Cells in the last row and last column absorb the
//! remainder, so the regions always tile the frame exactly.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Immutable row x column layout applied to every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridShape {
    rows: u32,
    cols: u32,
}

impl GridShape {
    pub fn new(rows: u32, cols: u32) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::config(format!(
                "grid shape must be at least 1x1 (got {}x{})",
                rows, cols
            )));
        }
        Ok(Self { rows, cols })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Fails unless every cell of a `width x height` frame holds at least one pixel.
    pub fn check_fits(&self, width: u32, height: u32) -> Result<()> {
        if width < self.cols || height < self.rows {
            return Err(Error::InvalidGrid {
                rows: self.rows,
                cols: self.cols,
                width,
                height,
            });
        }
        Ok(())
    }

    /// Row-major cell regions for a `width x height` frame.
    pub fn partition(&self, width: u32, height: u32) -> Result<Vec<CellRegion>> {
        self.check_fits(width, height)?;

        let cell_height = height / self.rows;
        let cell_width = width / self.cols;
        let mut regions = Vec::with_capacity(self.cell_count());

        for row in 0..self.rows {
            let y_start = row * cell_height;
            let y_end = if row < self.rows - 1 {
                (row + 1) * cell_height
            } else {
                height
            };
            for col in 0..self.cols {
                let x_start = col * cell_width;
                let x_end = if col < self.cols - 1 {
                    (col + 1) * cell_width
                } else {
                    width
                };
                regions.push(CellRegion {
                    row,
                    col,
                    x_start,
                    x_end,
                    y_start,
                    y_end,
                });
            }
        }

        Ok(regions)
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// 4x4.
impl Default for GridShape {
    fn default() -> Self {
        Self { rows: 4, cols: 4 }
    }
}

impl FromStr for GridShape {
    type Err = Error;

    /// Parses `ROWSxCOLS`, e.g. `4x4` or `3X8`.
    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let (rows, cols) = trimmed
            .split_once(['x', 'X'])
            .ok_or_else(|| {
                Error::config(format!("grid must look like ROWSxCOLS, got '{}'", value))
            })?;
        let rows: u32 = rows
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("invalid grid rows in '{}'", value)))?;
        let cols: u32 = cols
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("invalid grid cols in '{}'", value)))?;
        Self::new(rows, cols)
    }
}

/// Half-open pixel rectangle `[x_start, x_end) x [y_start, y_end)` for one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRegion {
    pub row: u32,
    pub col: u32,
    pub x_start: u32,
    pub x_end: u32,
    pub y_start: u32,
    pub y_end: u32,
}

impl CellRegion {
    pub fn width(&self) -> u32 {
        self.x_end - self.x_start
    }

    pub fn height(&self) -> u32 {
        self.y_end - self.y_start
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.x_start..self.x_end).contains(&x) && (self.y_start..self.y_end).contains(&y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(shape: GridShape, width: u32, height: u32) {
        let regions = shape.partition(width, height).unwrap();
        assert_eq!(regions.len(), shape.cell_count());

        let mut hits = vec![0u8; (width * height) as usize];
        for region in &regions {
            assert!(region.pixel_count() > 0, "empty cell {:?}", region);
            for y in region.y_start..region.y_end {
                for x in region.x_start..region.x_end {
                    hits[(y * width + x) as usize] += 1;
                }
            }
        }
        assert!(
            hits.iter().all(|&h| h == 1),
            "{} grid on {}x{} has gaps or overlaps",
            shape,
            width,
            height
        );
    }

    #[test]
    fn partition_tiles_frame_exactly() {
        for width in 1..=13 {
            for height in 1..=11 {
                for rows in 1..=height.min(5) {
                    for cols in 1..=width.min(5) {
                        assert_exact_cover(GridShape::new(rows, cols).unwrap(), width, height);
                    }
                }
            }
        }
    }

    #[test]
    fn last_row_and_column_absorb_remainder() {
        let shape = GridShape::new(3, 4).unwrap();
        let regions = shape.partition(10, 8).unwrap();

        // cell_w = 2, cell_h = 2
        let first = regions[0];
        assert_eq!((first.width(), first.height()), (2, 2));

        let last = regions[regions.len() - 1];
        assert_eq!((last.row, last.col), (2, 3));
        assert_eq!((last.x_start, last.x_end), (6, 10));
        assert_eq!((last.y_start, last.y_end), (4, 8));
    }

    #[test]
    fn partition_is_row_major() {
        let shape = GridShape::new(2, 3).unwrap();
        let order: Vec<(u32, u32)> = shape
            .partition(30, 20)
            .unwrap()
            .iter()
            .map(|r| (r.row, r.col))
            .collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn rejects_frames_smaller_than_grid() {
        let shape = GridShape::new(4, 4).unwrap();
        assert!(matches!(
            shape.partition(3, 10),
            Err(Error::InvalidGrid { width: 3, .. })
        ));
        assert!(shape.check_fits(4, 4).is_ok());
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(GridShape::new(0, 3).is_err());
        assert!(GridShape::new(3, 0).is_err());
    }

    #[test]
    fn parses_rows_by_cols() {
        assert_eq!("4x8".parse::<GridShape>().unwrap(), GridShape::new(4, 8).unwrap());
        assert_eq!(" 2X3 ".parse::<GridShape>().unwrap().to_string(), "2x3");
        assert!("4".parse::<GridShape>().is_err());
        assert!("0x2".parse::<GridShape>().is_err());
        assert!("ax2".parse::<GridShape>().is_err());
    }
}

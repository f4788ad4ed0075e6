//! # Plane Geometry
//!
//! Per-plane pixel geometry of the desk (output) and of the source
//! picture, plus the grid of array cells the source is cut into.
//!
//! Chroma planes are subsampled, so every coordinate is measured again in
//! each plane instead of being derived from the luma values.

use serde::{Deserialize, Serialize};

use crate::config::BoardParams;
use crate::error::{try_vec, Result};
use crate::picture::{PlaneBuf, Picture};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaneGeometry {
    pub width: i32,
    pub lines: i32,
    pub pitch: i32,
    pub visible_pitch: i32,
    pub pixel_pitch: i32,
    pub border_width: i32,
    pub border_lines: i32,
    pub preview_width: i32,
    pub preview_lines: i32,
    /// Widest piece of this plane (the first columns absorb no remainder)
    pub pce_max_width: i32,
    pub pce_max_lines: i32,
}

impl PlaneGeometry {
    pub fn measure(buf: &PlaneBuf, params: &BoardParams) -> Self {
        let pixel_pitch = buf.pixel_pitch.max(1) as i32;
        let width = buf.visible_pitch as i32 / pixel_pitch;
        let lines = buf.visible_lines as i32;
        let border = params.border as i32;
        let preview = params.preview_size as i32;
        let rows = params.rows.max(1) as i32;
        let cols = params.cols.max(1) as i32;

        let border_width = width * border / 2 / 100;
        let border_lines = lines * border / 2 / 100;

        Self {
            width,
            lines,
            pitch: buf.pitch as i32,
            visible_pitch: buf.visible_pitch as i32,
            pixel_pitch,
            border_width,
            border_lines,
            preview_width: width * preview / 100,
            preview_lines: lines * preview / 100,
            pce_max_width: ((width - 2 * border_width) + cols - 1) / cols,
            pce_max_lines: ((lines - 2 * border_lines) + rows - 1) / rows,
        }
    }

    /// Geometry of every plane of `picture`.
    pub fn measure_all(picture: &Picture, params: &BoardParams) -> Result<Vec<Self>> {
        let mut planes = try_vec(picture.planes.len(), "plane geometry")?;
        planes.extend(picture.planes.iter().map(|buf| Self::measure(buf, params)));
        Ok(planes)
    }

    /// Width of the playing area inside the border.
    pub fn inner_width(&self) -> i32 {
        self.width - 2 * self.border_width
    }

    pub fn inner_lines(&self) -> i32 {
        self.lines - 2 * self.border_lines
    }
}

/// One cell of the unshuffled picture in one plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayCell {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub lines: i32,
}

/// Flat `rows x cols x planes` grid of [`ArrayCell`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PuzzleGrid {
    rows: usize,
    cols: usize,
    planes: usize,
    cells: Vec<ArrayCell>,
}

impl PuzzleGrid {
    /// Cut the area inside the border of each plane. Every cell takes the
    /// remaining width divided by the remaining column count, so the last
    /// column and row absorb the rounding remainder.
    pub fn compute(pict: &[PlaneGeometry], rows: usize, cols: usize) -> Result<Self> {
        let planes = pict.len();
        let mut cells = try_vec(rows * cols * planes, "puzzle grid")?;
        cells.resize(rows * cols * planes, ArrayCell::default());
        let mut grid = Self {
            rows,
            cols,
            planes,
            cells,
        };

        for (plane, geo) in pict.iter().enumerate() {
            let mut y = geo.border_lines;
            for r in 0..rows {
                let lines = (geo.lines - geo.border_lines - y) / (rows - r) as i32;
                let mut x = geo.border_width;
                for c in 0..cols {
                    let width = (geo.width - geo.border_width - x) / (cols - c) as i32;
                    let index = grid.index(r, c, plane);
                    grid.cells[index] = ArrayCell { x, y, width, lines };
                    x += width;
                }
                y += lines;
            }
        }
        Ok(grid)
    }

    fn index(&self, row: usize, col: usize, plane: usize) -> usize {
        (row * self.cols + col) * self.planes + plane
    }

    pub fn cell(&self, row: usize, col: usize, plane: usize) -> ArrayCell {
        self.cells
            .get(self.index(row, col, plane))
            .copied()
            .unwrap_or_default()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn planes(&self) -> usize {
        self.planes
    }
}

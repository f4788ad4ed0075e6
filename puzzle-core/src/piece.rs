//! # Piece Geometry
//!
//! The mutable unit of the simulation and the routines that keep its
//! derived geometry consistent.
//!
//! ```text
//!   piece-local (x, y)                 desk
//!   +--> x                 TL = actual position of plane 0
//!   |                      TR = TL + (width - 1) * step_x
//!   v y                    BL = TL + (lines - 1) * step_y
//!                          BR = TL + (width - 1) * step_x + (lines - 1) * step_y
//! ```
//!
//! [`PieceSet::calculate_corners`] must run after every change of angle,
//! mirror or position: hit-testing and snapping only read the corners.

use serde::{Deserialize, Serialize};

use crate::config::RotationMode;
use crate::error::{try_vec, PuzzleError, Result};
use crate::plane::PlaneGeometry;
use crate::shape::EdgeId;

// ============================================================================
// Data model
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Placement of a piece in one plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceInPlane {
    /// Where the piece was cut from in the source
    pub original_x: i32,
    pub original_y: i32,
    /// Where the piece currently sits on the desk
    pub actual_x: i32,
    pub actual_y: i32,
    pub width: i32,
    pub lines: i32,
}

/// Desk delta of one piece-local pixel step along x and along y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepVectors {
    pub x_x: i32,
    pub x_y: i32,
    pub y_x: i32,
    pub y_y: i32,
}

impl StepVectors {
    pub fn for_transform(angle: u8, mirror: i8) -> Self {
        let m = mirror as i32;
        match angle & 0x03 {
            0 => Self { x_x: m, x_y: 0, y_x: 0, y_y: 1 },
            // x offset in the source becomes a negative y offset on the desk
            1 => Self { x_x: 0, x_y: -m, y_x: 1, y_y: 0 },
            2 => Self { x_x: -m, x_y: 0, y_x: 0, y_y: -1 },
            _ => Self { x_x: 0, x_y: m, y_x: -1, y_y: 0 },
        }
    }
}

impl Default for StepVectors {
    fn default() -> Self {
        Self::for_transform(0, 1)
    }
}

/// Home corners, in luma desk pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeCorners {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub original_row: usize,
    pub original_col: usize,

    pub top: EdgeId,
    pub bottom: EdgeId,
    pub left: EdgeId,
    pub right: EdgeId,

    pub planes: Vec<PieceInPlane>,

    /// Quarter turns, 0..=3
    pub angle: u8,
    /// +1 or -1
    pub mirror: i8,
    pub steps: StepVectors,

    pub tl: Pos,
    pub tr: Pos,
    pub bl: Pos,
    pub br: Pos,
    pub home: HomeCorners,
    pub min: Pos,
    pub max: Pos,
    pub center: Pos,

    pub finished: bool,
    pub group: usize,
    pub overlap: bool,
}

impl Piece {
    /// Flat-edged, untransformed piece in its own singleton `group`.
    pub fn new(original_row: usize, original_col: usize, planes: Vec<PieceInPlane>, group: usize) -> Self {
        let mut piece = Self {
            original_row,
            original_col,
            top: EdgeId::FLAT_TOP,
            bottom: EdgeId::FLAT_BOTTOM,
            left: EdgeId::FLAT_LEFT,
            right: EdgeId::FLAT_RIGHT,
            planes,
            angle: 0,
            mirror: 1,
            steps: StepVectors::default(),
            tl: Pos::default(),
            tr: Pos::default(),
            bl: Pos::default(),
            br: Pos::default(),
            home: HomeCorners::default(),
            min: Pos::default(),
            max: Pos::default(),
            center: Pos::default(),
            finished: false,
            group,
            overlap: false,
        };
        piece.set_home();
        piece
    }

    /// Home corners from the luma original position.
    pub fn set_home(&mut self) {
        if let Some(p) = self.planes.first() {
            self.home = HomeCorners {
                left: p.original_x,
                top: p.original_y,
                right: p.original_x + p.width - 1,
                bottom: p.original_y + p.lines - 1,
            };
        }
    }

    pub fn luma(&self) -> PieceInPlane {
        self.planes.first().copied().unwrap_or_default()
    }

    fn luma_mut(&mut self) -> Option<&mut PieceInPlane> {
        self.planes.first_mut()
    }

    /// Move the luma placement; other planes follow on the next corner update.
    pub fn set_actual(&mut self, x: i32, y: i32) {
        if let Some(p) = self.luma_mut() {
            p.actual_x = x;
            p.actual_y = y;
        }
    }

    pub fn translate(&mut self, dx: i32, dy: i32) {
        if let Some(p) = self.luma_mut() {
            p.actual_x += dx;
            p.actual_y += dy;
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.min.x <= x && self.max.x >= x && self.min.y <= y && self.max.y >= y
    }

    /// Cell index of the piece in the unshuffled picture.
    pub fn original_index(&self, cols: usize) -> usize {
        self.original_row * cols + self.original_col
    }
}

// ============================================================================
// Piece set
// ============================================================================

/// All pieces of a board, in draw order (front first), plus the group
/// sizes the geometry routines consult.
#[derive(Debug, Clone, Default)]
pub struct PieceSet {
    pub pieces: Vec<Piece>,
    /// Desk plane sizes, luma first
    plane_dims: Vec<(i32, i32)>,
    group_qty: Vec<usize>,
    rotation: RotationMode,
}

impl PieceSet {
    pub fn new(pieces: Vec<Piece>, desk: &[PlaneGeometry], rotation: RotationMode) -> Result<Self> {
        let mut plane_dims = try_vec(desk.len(), "plane sizes")?;
        plane_dims.extend(desk.iter().map(|p| (p.width.max(1), p.lines.max(1))));
        let mut group_qty = try_vec(pieces.len(), "group sizes")?;
        group_qty.resize(pieces.len(), 1);
        Ok(Self {
            pieces,
            plane_dims,
            group_qty,
            rotation,
        })
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Piece> {
        self.pieces.iter()
    }

    pub fn get(&self, i: usize) -> Result<&Piece> {
        self.pieces.get(i).ok_or(PuzzleError::InvalidPiece(i))
    }

    pub fn rotation(&self) -> RotationMode {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: RotationMode) {
        self.rotation = rotation;
    }

    // ------------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------------

    /// Recount the members of every group.
    pub fn count_groups(&mut self) {
        self.group_qty.clear();
        self.group_qty.resize(self.pieces.len(), 0);
        for piece in &self.pieces {
            if let Some(qty) = self.group_qty.get_mut(piece.group) {
                *qty += 1;
            }
        }
    }

    pub fn group_size(&self, group: usize) -> usize {
        self.group_qty.get(group).copied().unwrap_or(0)
    }

    /// First group id without members, as of the last count.
    pub fn free_group(&self) -> Option<usize> {
        self.group_qty.iter().position(|&qty| qty == 0)
    }

    /// Reassign every member of group `from` to group `to`.
    pub fn merge_groups(&mut self, from: usize, to: usize) {
        for piece in self.pieces.iter_mut().filter(|p| p.group == from) {
            piece.group = to;
        }
    }

    // ------------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------------

    /// Refresh step vectors, chroma placement, corners, bounds and center
    /// of piece `i`.
    pub fn calculate_corners(&mut self, i: usize) {
        let Some(base) = self.plane_dims.first().copied() else {
            return;
        };
        let Some(piece) = self.pieces.get_mut(i) else {
            return;
        };

        piece.steps = StepVectors::for_transform(piece.angle, piece.mirror);

        let luma = piece.luma();
        for (plane, &(width, lines)) in piece.planes.iter_mut().zip(&self.plane_dims).skip(1) {
            plane.actual_x = luma.actual_x * width / base.0;
            plane.actual_y = luma.actual_y * lines / base.1;
        }

        let s = piece.steps;
        let (w, l) = (luma.width - 1, luma.lines - 1);
        let tl = Pos::new(luma.actual_x, luma.actual_y);
        piece.tl = tl;
        piece.tr = Pos::new(tl.x + w * s.x_x, tl.y + w * s.x_y);
        piece.br = Pos::new(tl.x + w * s.x_x + l * s.y_x, tl.y + w * s.x_y + l * s.y_y);
        piece.bl = Pos::new(tl.x + l * s.y_x, tl.y + l * s.y_y);

        let xs = [piece.tl.x, piece.tr.x, piece.bl.x, piece.br.x];
        let ys = [piece.tl.y, piece.tr.y, piece.bl.y, piece.br.y];
        piece.min = Pos::new(xs.into_iter().min().unwrap_or(0), ys.into_iter().min().unwrap_or(0));
        piece.max = Pos::new(xs.into_iter().max().unwrap_or(0), ys.into_iter().max().unwrap_or(0));
        piece.center = Pos::new((piece.max.x + piece.min.x) / 2, (piece.max.y + piece.min.y) / 2);

        let (center, group) = (piece.center, piece.group);
        if self.find_piece(center.x, center.y, Some(i)).is_some() && self.group_size(group) == 1 {
            self.pieces[i].overlap = true;
        }
    }

    pub fn calculate_all_corners(&mut self) {
        for i in 0..self.pieces.len() {
            self.calculate_corners(i);
        }
    }

    /// First piece, in array order, whose bounding box contains `(x, y)`.
    pub fn find_piece(&self, x: i32, y: i32, except: Option<usize>) -> Option<usize> {
        self.pieces
            .iter()
            .enumerate()
            .find(|(i, p)| Some(*i) != except && p.contains(x, y))
            .map(|(i, _)| i)
    }

    /// Apply `|steps|` quarter turns of piece `i` about `(cx, cy)`, positive
    /// steps turning clockwise on screen. In mirror mode a turn that lands
    /// back on angle 0 also flips the piece unless `avoid_mirror` is set.
    pub fn rotate_piece(&mut self, i: usize, steps: i8, cx: i32, cy: i32, avoid_mirror: bool) {
        match self.rotation {
            RotationMode::None => return,
            RotationMode::Half if steps != 2 => return,
            _ => {}
        }

        for _ in 0..steps.unsigned_abs() {
            let Some(piece) = self.pieces.get_mut(i) else {
                return;
            };
            let luma = piece.luma();
            let (x, y) = if steps > 0 {
                piece.angle = (piece.angle + 1) & 0x03;
                (-(cy - luma.actual_y) + cx, (cx - luma.actual_x) + cy)
            } else {
                piece.angle = piece.angle.wrapping_sub(1) & 0x03;
                ((cy - luma.actual_y) + cx, -(cx - luma.actual_x) + cy)
            };
            piece.set_actual(x, y);

            if piece.angle == 0 && self.rotation == RotationMode::QuarterMirror && !avoid_mirror {
                piece.set_actual(2 * cx - x, y);
                piece.mirror = -piece.mirror;
            }
            self.calculate_corners(i);
        }
    }

    /// Translate every member of piece `i`'s group.
    pub fn move_group(&mut self, i: usize, dx: i32, dy: i32) {
        let Some(group) = self.pieces.get(i).map(|p| p.group) else {
            return;
        };
        for j in 0..self.pieces.len() {
            if self.pieces[j].group == group {
                let piece = &mut self.pieces[j];
                piece.finished = false;
                piece.translate(dx, dy);
                self.calculate_corners(j);
            }
        }
    }

    /// Move piece `i` and its whole group to the front, keeping the relative
    /// order of everything else.
    pub fn bring_to_front(&mut self, i: usize) -> Result<()> {
        let group = self.get(i)?.group;
        let n = self.pieces.len();
        let mut reordered = try_vec(n, "piece order")?;
        let mut members = try_vec(n, "piece order")?;
        let mut rest = try_vec(n, "piece order")?;

        for (j, piece) in std::mem::take(&mut self.pieces).into_iter().enumerate() {
            if j == i {
                reordered.push(piece);
            } else if piece.group == group {
                members.push(piece);
            } else {
                rest.push(piece);
            }
        }
        reordered.append(&mut members);
        reordered.append(&mut rest);
        self.pieces = reordered;
        Ok(())
    }

    /// Replace the draw order. `order` must be a permutation of the indices.
    pub fn reorder(&mut self, order: &[usize]) -> Result<()> {
        let n = self.pieces.len();
        let mut slots: Vec<Option<Piece>> = try_vec(n, "piece order")?;
        let mut reordered = try_vec(n, "piece order")?;
        slots.extend(std::mem::take(&mut self.pieces).into_iter().map(Some));
        for &j in order {
            if let Some(piece) = slots.get_mut(j).and_then(Option::take) {
                reordered.push(piece);
            }
        }
        // indices missing from `order` keep their relative order at the back
        reordered.extend(slots.into_iter().flatten());
        self.pieces = reordered;
        Ok(())
    }
}

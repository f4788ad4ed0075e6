//! # Piece Shapes
//!
//! Run-length silhouettes for the four edges of a piece.
//!
//! A rectangular piece is split along its diagonals into four quadrants.
//! Each quadrant is owned by one edge archetype and described, scanline by
//! scanline, as alternating fill / skip runs:
//!
//! ```text
//!   +-----------------+
//!   |\      top      /|      left  : x in 0 .. diag(left)
//!   |  \           /  |      top   : x in diag(left) .. diag(right), y < lines/2
//!   |left  \   /  right      btm   : same span, y >= lines/2
//!   |      /   \      |      right : x in diag(right) .. width
//!   |  /    btm    \  |
//!   |/               \|
//!   +-----------------+
//! ```
//!
//! Organic edges add skip runs where the neighbour's tab reaches in, and
//! fill runs outside the rectangle where this piece's own tab reaches out.

use serde::{Deserialize, Serialize};

use crate::bezier::BezierCurve;
use crate::error::{try_vec, AllocBudget, PuzzleError, Result};

/// Number of random bezier archetypes.
pub const SHAPES_QTY: usize = 20;

/// Number of edge ids: flat plus every archetype, times 4 positions, times 2 polarities.
pub const PIECE_TYPE_NBR: usize = 4 * 2 * (1 + SHAPES_QTY);

/// Maximum number of boundaries recorded on one scanline.
pub const MAX_SECT: usize = 10;

// ============================================================================
// Edge identifiers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgePosition {
    Left,
    Top,
    Bottom,
    Right,
}

impl EdgePosition {
    fn slot(self) -> u32 {
        match self {
            Self::Left => 0,
            Self::Top => 1,
            Self::Bottom => 2,
            Self::Right => 3,
        }
    }

    fn from_slot(slot: u32) -> Self {
        match slot {
            0 => Self::Left,
            1 => Self::Top,
            2 => Self::Bottom,
            _ => Self::Right,
        }
    }

    /// Position of the matching edge on the adjacent piece.
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
            Self::Right => Self::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Flat,
    /// Index into the random archetypes, `0..SHAPES_QTY`
    Bezier(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    pub fn flipped(self) -> Self {
        match self {
            Self::Positive => Self::Negative,
            Self::Negative => Self::Positive,
        }
    }
}

/// Identifies one edge archetype.
///
/// Numbering: `0/1` flat left (positive/negative), `2/3` flat top, `4/5`
/// flat bottom, `6/7` flat right, then 8 ids per bezier archetype in the
/// same order starting at `8 + 8 * archetype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub struct EdgeId {
    pub position: EdgePosition,
    pub kind: EdgeKind,
    pub polarity: Polarity,
}

impl EdgeId {
    pub const FLAT_LEFT: EdgeId = EdgeId::flat(EdgePosition::Left);
    pub const FLAT_TOP: EdgeId = EdgeId::flat(EdgePosition::Top);
    pub const FLAT_BOTTOM: EdgeId = EdgeId::flat(EdgePosition::Bottom);
    pub const FLAT_RIGHT: EdgeId = EdgeId::flat(EdgePosition::Right);

    pub const fn flat(position: EdgePosition) -> Self {
        Self {
            position,
            kind: EdgeKind::Flat,
            polarity: Polarity::Positive,
        }
    }

    pub fn bezier(position: EdgePosition, archetype: u8, polarity: Polarity) -> Self {
        Self {
            position,
            kind: EdgeKind::Bezier(archetype),
            polarity,
        }
    }

    pub fn index(self) -> u32 {
        let base = match self.kind {
            EdgeKind::Flat => 0,
            EdgeKind::Bezier(archetype) => 8 + 8 * archetype as u32,
        };
        let polarity = match self.polarity {
            Polarity::Positive => 0,
            Polarity::Negative => 1,
        };
        base + 2 * self.position.slot() + polarity
    }

    pub fn from_index(id: u32) -> Option<Self> {
        if id as usize >= PIECE_TYPE_NBR {
            return None;
        }
        let kind = match id / 8 {
            0 => EdgeKind::Flat,
            group => EdgeKind::Bezier((group - 1) as u8),
        };
        let polarity = if id & 1 == 0 {
            Polarity::Positive
        } else {
            Polarity::Negative
        };
        Some(Self {
            position: EdgePosition::from_slot((id % 8) / 2),
            kind,
            polarity,
        })
    }

    /// The edge the adjacent piece must carry so both interlock: same
    /// archetype, opposite position, opposite polarity.
    pub fn mate(self) -> Self {
        Self {
            position: self.position.opposite(),
            kind: self.kind,
            polarity: self.polarity.flipped(),
        }
    }

    pub fn is_flat(self) -> bool {
        self.kind == EdgeKind::Flat
    }
}

impl From<EdgeId> for u32 {
    fn from(id: EdgeId) -> Self {
        id.index()
    }
}

impl TryFrom<u32> for EdgeId {
    type Error = PuzzleError;

    fn try_from(id: u32) -> Result<Self> {
        EdgeId::from_index(id).ok_or(PuzzleError::InvalidShape(id))
    }
}

// ============================================================================
// Run-length rows
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// Copy source pixels
    Fill,
    /// Leave the pixels to a neighbouring piece
    Skip,
}

impl RunKind {
    fn alternating(i: usize) -> Self {
        if i % 2 == 0 {
            Self::Fill
        } else {
            Self::Skip
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSection {
    pub kind: RunKind,
    pub width: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapeRow {
    pub sections: Vec<RowSection>,
}

impl ShapeRow {
    pub fn total_width(&self) -> i32 {
        self.sections.iter().map(|s| s.width).sum()
    }

    pub fn fill_width(&self) -> i32 {
        self.sections
            .iter()
            .filter(|s| s.kind == RunKind::Fill)
            .map(|s| s.width)
            .sum()
    }
}

/// One edge silhouette in one plane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PieceShape {
    /// Piece-local y of `rows[0]`; negative when a tab reaches above the piece
    pub first_row_offset: i32,
    pub rows: Vec<ShapeRow>,
}

impl PieceShape {
    pub fn row_count(&self) -> i32 {
        self.rows.len() as i32
    }

    /// Row at piece-local `y`, if this shape covers it.
    pub fn row(&self, y: i32) -> Option<&ShapeRow> {
        let r = y - self.first_row_offset;
        if r < 0 {
            return None;
        }
        self.rows.get(r as usize)
    }

    /// One past the last piece-local row covered.
    pub fn end_row(&self) -> i32 {
        self.first_row_offset + self.row_count()
    }
}

// ============================================================================
// Piece frame
// ============================================================================

/// Maximum piece size in one plane, plus its ratio to plane 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PieceFrame {
    pub width: i32,
    pub lines: i32,
    pub x_ratio: f32,
    pub y_ratio: f32,
}

impl PieceFrame {
    pub fn new(width: i32, lines: i32, base_width: i32, base_lines: i32) -> Self {
        let width = width.max(1);
        let lines = lines.max(1);
        Self {
            width,
            lines,
            x_ratio: width as f32 / base_width.max(1) as f32,
            y_ratio: lines as f32 / base_lines.max(1) as f32,
        }
    }

    /// X of the diagonal boundary on row `y`: the left diagonal when `left`
    /// is set, the right one otherwise.
    pub fn diagonal_limit(&self, y: i32, left: bool) -> i32 {
        if left ^ (y >= self.lines / 2) {
            (y * self.width) / self.lines
        } else {
            self.width - (y * self.width) / self.lines
        }
    }

    /// Width of the top / bottom quadrant on row `y`.
    fn middle_width(&self, y: i32) -> i32 {
        (self.diagonal_limit(y, false) - 1) - (self.diagonal_limit(y, true) - 1)
    }
}

// ============================================================================
// Flat edges
// ============================================================================

/// Silhouette of a flat edge: one fill run per scanline.
pub fn sect_border(frame: &PieceFrame, position: EdgePosition, budget: &mut AllocBudget) -> Result<PieceShape> {
    let min_y = if position == EdgePosition::Bottom { frame.lines / 2 } else { 0 };
    let nb_y = if position == EdgePosition::Top {
        frame.lines / 2 - min_y
    } else {
        frame.lines - min_y
    };

    let mut rows = budget.vec(nb_y.max(0) as usize, "border shape rows")?;
    for y in min_y..min_y + nb_y {
        let width = match position {
            EdgePosition::Top | EdgePosition::Bottom => frame.middle_width(y),
            EdgePosition::Right => frame.width - frame.diagonal_limit(y, false),
            EdgePosition::Left => frame.diagonal_limit(y, true),
        };
        let mut sections = budget.vec(1, "border shape sections")?;
        sections.push(RowSection {
            kind: RunKind::Fill,
            width,
        });
        rows.push(ShapeRow { sections });
    }

    Ok(PieceShape {
        first_row_offset: min_y,
        rows,
    })
}

// ============================================================================
// Bezier edges
// ============================================================================

/// Edges rasterized directly from a curve; the other two are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveSide {
    Top,
    Left,
}

/// Sorted boundary list of one scanline.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crossings {
    values: [i32; MAX_SECT],
    len: usize,
}

impl Crossings {
    /// Record one boundary; once full, later boundaries are dropped.
    fn push(&mut self, x: i32) {
        self.values[self.len] = x;
        if self.len < MAX_SECT - 1 {
            self.len += 1;
        }
    }

    /// Record the closing boundary; it replaces the last entry when full.
    fn push_closing(&mut self, x: i32) {
        if self.len == MAX_SECT - 1 {
            self.values[self.len - 1] = x;
        } else {
            self.push(x);
        }
    }

    fn clamp(&mut self, min: i32, max: i32) {
        for v in &mut self.values[..self.len] {
            *v = (*v).clamp(min, max);
        }
    }

    /// Exchange sort that restarts after every swap.
    fn sort(&mut self) {
        let mut i = 0;
        while i + 1 < self.len {
            if self.values[i] > self.values[i + 1] {
                self.values.swap(i, i + 1);
                i = 0;
            } else {
                i += 1;
            }
        }
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.values[..self.len]
    }
}

/// Lowest x and y reached by the curve, in plane coordinates.
fn min_bezier(frame: &PieceFrame, curve: &BezierCurve) -> (f32, f32) {
    let first = curve.first();
    curve.samples().fold(
        (first.x * frame.x_ratio, first.y * frame.y_ratio),
        |(min_x, min_y), p| (min_x.min(p.x * frame.x_ratio), min_y.min(p.y * frame.y_ratio)),
    )
}

/// Boundaries where the curve crosses the middle of scanline `y`, plus the
/// closing diagonal for rows inside the piece.
///
/// Inside the piece the boundaries are kept within the quadrant, so the row
/// never spills over the diagonal into the neighbouring quadrant.
pub fn detect_curve(frame: &PieceFrame, y: i32, curve: &BezierCurve, side: CurveSide) -> Crossings {
    let mut crossings = Crossings::default();
    let line = y as f32 + 0.5;

    let first = curve.first();
    let (mut xo, mut yo) = (first.x * frame.x_ratio, first.y * frame.y_ratio);
    for p in curve.samples() {
        let (xd, yd) = (p.x * frame.x_ratio, p.y * frame.y_ratio);
        if (yo < line && yd >= line) || (yo > line && yd <= line) {
            crossings.push(((line - yo) * (xd - xo) / (yd - yo) + xo).floor() as i32);
        }
        xo = xd;
        yo = yd;
    }

    if y >= 0 {
        let closing = match side {
            CurveSide::Top => {
                let start = frame.diagonal_limit(y, true);
                let end = frame.diagonal_limit(y, false);
                crossings.clamp(start.min(end), end.max(start));
                end
            }
            CurveSide::Left => {
                let end = frame.diagonal_limit(y, true);
                crossings.clamp(i32::MIN, end);
                end
            }
        };
        crossings.push_closing(closing);
    }

    crossings.sort();
    crossings
}

fn shape_lines(
    frame: &PieceFrame,
    min_y: i32,
    nb_y: i32,
    curve: &BezierCurve,
    side: CurveSide,
    budget: &mut AllocBudget,
) -> Result<Vec<ShapeRow>> {
    let mut rows = budget.vec(nb_y.max(0) as usize, "bezier shape rows")?;

    for y in min_y..min_y + nb_y {
        let crossings = detect_curve(frame, y, curve, side);
        let inside_top = side == CurveSide::Top && y >= 0;

        // absolute boundaries to run widths
        let mut last_x = if inside_top { frame.diagonal_limit(y, true) } else { 0 };
        // top rows inside the piece start with a fill run, all others with a skip
        let phase = if inside_top { 0 } else { 1 };

        let bounds = crossings.as_slice();
        let mut sections = budget.vec(bounds.len(), "bezier shape sections")?;
        for (i, &x) in bounds.iter().enumerate() {
            sections.push(RowSection {
                kind: RunKind::alternating(i + phase),
                width: x - last_x,
            });
            last_x = x;
        }
        rows.push(ShapeRow { sections });
    }
    Ok(rows)
}

/// Silhouette of an organic top or left edge.
pub fn sect_bezier(
    frame: &PieceFrame,
    curve: &BezierCurve,
    side: CurveSide,
    budget: &mut AllocBudget,
) -> Result<PieceShape> {
    let (_, min_curve_y) = min_bezier(frame, curve);
    let min_curve_y = min_curve_y.floor().min(0.0);

    let (min_y, nb_y) = match side {
        CurveSide::Top => {
            let min_y = min_curve_y as i32;
            (min_y, frame.lines / 2 - min_y)
        }
        CurveSide::Left => (0, frame.lines),
    };

    let rows = shape_lines(frame, min_y, nb_y, curve, side, budget)?;
    Ok(PieceShape {
        first_row_offset: min_y,
        rows,
    })
}

/// Right edge from a left edge: runs reversed, with the first run widened
/// by the difference between the right and left quadrant widths.
pub fn sect_left_to_right(frame: &PieceFrame, left: &PieceShape, budget: &mut AllocBudget) -> Result<PieceShape> {
    let mut rows = budget.vec(left.rows.len(), "right shape rows")?;

    for (r, left_row) in left.rows.iter().enumerate() {
        let y = left.first_row_offset + r as i32;
        let left_width = frame.diagonal_limit(y, true);
        let right_width = frame.width - frame.diagonal_limit(y, false);

        let mut sections = budget.vec(left_row.sections.len(), "right shape sections")?;
        sections.extend(left_row.sections.iter().rev().enumerate().map(|(i, s)| RowSection {
            kind: s.kind,
            width: s.width + if i == 0 { right_width - left_width } else { 0 },
        }));
        rows.push(ShapeRow { sections });
    }

    Ok(PieceShape {
        first_row_offset: left.first_row_offset,
        rows,
    })
}

/// Bottom edge from a top edge: rows mirrored around the middle of the
/// piece, outer runs adjusted to the width of the bottom quadrant.
pub fn sect_top_to_btm(frame: &PieceFrame, top: &PieceShape, budget: &mut AllocBudget) -> Result<PieceShape> {
    let top_min_y = top.first_row_offset;
    let top_nb_y = top.row_count();
    let min_y = frame.lines / 2;
    let max_y = frame.lines - top_min_y;
    let nb_y = max_y - min_y;

    let mut rows = budget.vec(nb_y.max(0) as usize, "bottom shape rows")?;
    for y in min_y..max_y {
        let top_y = 2 * min_y - y + (nb_y - top_nb_y);
        let width = frame.middle_width(y);

        let sections = match top.row(top_y) {
            None => {
                let mut sections = budget.vec(1, "bottom shape sections")?;
                sections.push(RowSection {
                    kind: RunKind::Fill,
                    width,
                });
                sections
            }
            Some(top_row) => {
                let delta = width - frame.middle_width(top_y);
                let left_adjust = delta / 2;
                let right_adjust = delta - left_adjust;
                let last = top_row.sections.len().saturating_sub(1);

                let mut sections = budget.vec(top_row.sections.len(), "bottom shape sections")?;
                sections.extend(top_row.sections.iter().enumerate().map(|(i, s)| {
                    let mut adjust = 0;
                    if i == 0 {
                        adjust += left_adjust;
                    }
                    if i == last {
                        adjust += right_adjust;
                    }
                    RowSection {
                        kind: s.kind,
                        width: s.width + adjust,
                    }
                }));
                sections
            }
        };
        rows.push(ShapeRow { sections });
    }

    Ok(PieceShape {
        first_row_offset: min_y,
        rows,
    })
}

// ============================================================================
// Archetype table
// ============================================================================

/// Every edge archetype in every plane, indexed by [`EdgeId`].
#[derive(Debug, Clone)]
pub struct ShapeTable {
    planes: usize,
    shapes: Vec<PieceShape>,
}

impl ShapeTable {
    /// Build the full table. `frames[0]` is the luma plane; `curves` holds
    /// one normalized template per archetype.
    pub fn bake(
        frames: &[PieceFrame],
        curves: &[BezierCurve],
        shape_size: u32,
        budget: &mut AllocBudget,
    ) -> Result<Self> {
        let planes = frames.len();
        let mut shapes = try_vec(PIECE_TYPE_NBR * planes, "shape table")?;
        shapes.resize(PIECE_TYPE_NBR * planes, PieceShape::default());
        let mut table = Self { planes, shapes };

        let Some(base) = frames.first() else {
            return Ok(table);
        };

        const FLAT: [(EdgePosition, Polarity); 8] = [
            (EdgePosition::Left, Polarity::Positive),
            (EdgePosition::Left, Polarity::Negative),
            (EdgePosition::Top, Polarity::Positive),
            (EdgePosition::Top, Polarity::Negative),
            (EdgePosition::Bottom, Polarity::Positive),
            (EdgePosition::Bottom, Polarity::Negative),
            (EdgePosition::Right, Polarity::Positive),
            (EdgePosition::Right, Polarity::Negative),
        ];
        for (plane, frame) in frames.iter().enumerate() {
            for (position, polarity) in FLAT {
                let id = EdgeId {
                    position,
                    kind: EdgeKind::Flat,
                    polarity,
                };
                let shape = sect_border(frame, position, budget)?;
                table.set(id, plane, shape);
            }
        }

        for (archetype, template) in curves.iter().take(SHAPES_QTY).enumerate() {
            let archetype = archetype as u8;
            let scaled_h = template.scale_h(base.width, base.lines, shape_size)?;
            let scaled_v = template.scale_v(base.width, base.lines, shape_size)?;
            let negative_h = scaled_h.h_negative()?;
            let negative_v = scaled_v.v_negative()?;

            for (plane, frame) in frames.iter().enumerate() {
                for (polarity, h, v) in [
                    (Polarity::Positive, &scaled_h, &scaled_v),
                    (Polarity::Negative, &negative_h, &negative_v),
                ] {
                    let left = sect_bezier(frame, v, CurveSide::Left, budget)?;
                    let top = sect_bezier(frame, h, CurveSide::Top, budget)?;
                    let bottom = sect_top_to_btm(frame, &top, budget)?;
                    let right = sect_left_to_right(frame, &left, budget)?;

                    table.set(EdgeId::bezier(EdgePosition::Left, archetype, polarity), plane, left);
                    table.set(EdgeId::bezier(EdgePosition::Top, archetype, polarity), plane, top);
                    table.set(EdgeId::bezier(EdgePosition::Bottom, archetype, polarity), plane, bottom);
                    table.set(EdgeId::bezier(EdgePosition::Right, archetype, polarity), plane, right);
                }
            }
        }

        tracing::debug!(
            "Baked {} edge archetypes over {} planes ({} allocations)",
            PIECE_TYPE_NBR,
            planes,
            budget.granted()
        );
        Ok(table)
    }

    fn set(&mut self, id: EdgeId, plane: usize, shape: PieceShape) {
        let index = id.index() as usize * self.planes + plane;
        self.shapes[index] = shape;
    }

    pub fn get(&self, id: EdgeId, plane: usize) -> Option<&PieceShape> {
        if plane >= self.planes {
            return None;
        }
        self.shapes.get(id.index() as usize * self.planes + plane)
    }

    pub fn planes(&self) -> usize {
        self.planes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn frames() -> Vec<PieceFrame> {
        vec![PieceFrame::new(64, 48, 64, 48), PieceFrame::new(32, 24, 64, 48)]
    }

    fn curves(seed: u64) -> Vec<BezierCurve> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..SHAPES_QTY)
            .map(|_| BezierCurve::random(&mut rng).unwrap())
            .collect()
    }

    /// Sum of every run covering piece-local row `y` across the four edges.
    fn row_span(table: &ShapeTable, edges: [EdgeId; 4], plane: usize, y: i32, fill_only: bool) -> i32 {
        edges
            .iter()
            .filter_map(|&id| table.get(id, plane).and_then(|shape| shape.row(y)))
            .map(|row| if fill_only { row.fill_width() } else { row.total_width() })
            .sum()
    }

    #[test]
    fn edge_ids_keep_their_numbering() {
        assert_eq!(EdgeId::FLAT_LEFT.index(), 0);
        assert_eq!(EdgeId::FLAT_TOP.index(), 2);
        assert_eq!(EdgeId::FLAT_BOTTOM.index(), 4);
        assert_eq!(EdgeId::FLAT_RIGHT.index(), 6);
        assert_eq!(EdgeId::bezier(EdgePosition::Left, 0, Polarity::Positive).index(), 8);
        assert_eq!(EdgeId::bezier(EdgePosition::Top, 0, Polarity::Negative).index(), 11);
        assert_eq!(EdgeId::bezier(EdgePosition::Right, 19, Polarity::Negative).index(), 167);
        for id in 0..PIECE_TYPE_NBR as u32 {
            assert_eq!(EdgeId::from_index(id).unwrap().index(), id);
        }
        assert!(EdgeId::from_index(PIECE_TYPE_NBR as u32).is_none());
    }

    #[test]
    fn mate_matches_the_numeric_neighbour_rule() {
        for id in 0..PIECE_TYPE_NBR as u32 {
            let edge = EdgeId::from_index(id).unwrap();
            match edge.position {
                EdgePosition::Right => assert_eq!(edge.mate().index(), (id - 6) ^ 1),
                EdgePosition::Bottom => assert_eq!(edge.mate().index(), (id - 2) ^ 1),
                _ => {}
            }
            assert_eq!(edge.mate().mate(), edge);
        }
    }

    #[test]
    fn edge_ids_serialize_as_numbers() {
        let id = EdgeId::bezier(EdgePosition::Bottom, 3, Polarity::Negative);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "37");
        let back: EdgeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<EdgeId>("999").is_err());
    }

    #[test]
    fn diagonal_limits_meet_at_the_center() {
        let frame = PieceFrame::new(40, 20, 40, 20);
        assert_eq!(frame.diagonal_limit(0, true), 0);
        assert_eq!(frame.diagonal_limit(0, false), 40);
        assert_eq!(frame.diagonal_limit(5, true), 10);
        assert_eq!(frame.diagonal_limit(5, false), 30);
        assert_eq!(frame.diagonal_limit(10, true), 20);
        assert_eq!(frame.diagonal_limit(15, true), 10);
        assert_eq!(frame.diagonal_limit(15, false), 30);
    }

    #[test]
    fn flat_rows_tile_the_piece_width() {
        let table = ShapeTable::bake(&frames(), &[], 90, &mut AllocBudget::unlimited()).unwrap();
        let edges = [EdgeId::FLAT_LEFT, EdgeId::FLAT_TOP, EdgeId::FLAT_BOTTOM, EdgeId::FLAT_RIGHT];
        for (plane, frame) in frames().iter().enumerate() {
            for y in 0..frame.lines {
                assert_eq!(row_span(&table, edges, plane, y, true), frame.width, "plane {} row {}", plane, y);
            }
        }
    }

    /// Fill and skip runs together span the piece width on every row; the
    /// fill runs alone do not, since tabs reach past the piece and notches
    /// leave room for the neighbour.
    #[test]
    fn bezier_runs_span_the_piece_width() {
        let table = ShapeTable::bake(&frames(), &curves(11), 90, &mut AllocBudget::unlimited()).unwrap();
        for archetype in 0..SHAPES_QTY as u8 {
            for polarity in [Polarity::Positive, Polarity::Negative] {
                let edges = [
                    EdgeId::bezier(EdgePosition::Left, archetype, polarity),
                    EdgeId::bezier(EdgePosition::Top, archetype, polarity),
                    EdgeId::bezier(EdgePosition::Bottom, archetype, polarity),
                    EdgeId::bezier(EdgePosition::Right, archetype, polarity),
                ];
                for (plane, frame) in frames().iter().enumerate() {
                    for y in 0..frame.lines {
                        assert_eq!(
                            row_span(&table, edges, plane, y, false),
                            frame.width,
                            "archetype {} plane {} row {}",
                            archetype,
                            plane,
                            y
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn crossings_are_sorted() {
        let frame = frames()[0];
        let curve = curves(3)[0].scale_h(frame.width, frame.lines, 100).unwrap();
        for y in -frame.lines / 2..frame.lines / 2 {
            let crossings = detect_curve(&frame, y, &curve, CurveSide::Top);
            assert!(crossings.as_slice().windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn top_rows_inside_the_piece_stay_in_their_quadrant() {
        let frame = frames()[0];
        let curve = curves(5)[2].scale_h(frame.width, frame.lines, 100).unwrap();
        let shape = sect_bezier(&frame, &curve, CurveSide::Top, &mut AllocBudget::unlimited()).unwrap();
        assert!(shape.first_row_offset <= 0);
        assert_eq!(shape.end_row(), frame.lines / 2);
        for y in 0..frame.lines / 2 {
            let row = shape.row(y).unwrap();
            assert!(row.sections.iter().all(|s| s.width >= 0));
            assert_eq!(row.sections[0].kind, RunKind::Fill);
        }
    }

    #[test]
    fn right_edge_mirrors_left_edge() {
        let frame = frames()[0];
        let v = curves(9)[4].scale_v(frame.width, frame.lines, 100).unwrap();
        let mut budget = AllocBudget::unlimited();
        let left = sect_bezier(&frame, &v, CurveSide::Left, &mut budget).unwrap();
        let right = sect_left_to_right(&frame, &left, &mut budget).unwrap();

        assert_eq!(right.first_row_offset, left.first_row_offset);
        for y in 0..frame.lines {
            let l = left.row(y).unwrap();
            let r = right.row(y).unwrap();
            let kinds_l: Vec<_> = l.sections.iter().rev().map(|s| s.kind).collect();
            let kinds_r: Vec<_> = r.sections.iter().map(|s| s.kind).collect();
            assert_eq!(kinds_l, kinds_r);
            let quadrant_delta =
                (frame.width - frame.diagonal_limit(y, false)) - frame.diagonal_limit(y, true);
            assert_eq!(r.total_width(), l.total_width() + quadrant_delta);
        }
    }

    #[test]
    fn allocation_failure_at_any_row_is_reported() {
        let frame = frames()[0];
        let rows = frame.lines as usize;
        for k in [0usize, 1, rows / 2, rows] {
            let mut budget = AllocBudget::limited(k);
            let result = sect_border(&frame, EdgePosition::Left, &mut budget);
            assert!(matches!(result, Err(PuzzleError::OutOfMemory { .. })), "failure at {}", k);
        }
        let mut budget = AllocBudget::limited(rows + 1);
        assert!(sect_border(&frame, EdgePosition::Left, &mut budget).is_ok());
    }

    #[test]
    fn table_bake_propagates_allocation_failure() {
        let mut budget = AllocBudget::limited(500);
        let result = ShapeTable::bake(&frames(), &curves(1), 90, &mut budget);
        assert!(matches!(result, Err(PuzzleError::OutOfMemory { .. })));
    }
}

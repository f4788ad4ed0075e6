//! # Drawing Layer
//!
//! Copies pieces from the source picture onto the desk, plus the desk
//! decorations (border, preview, selection, black slot, glyphs).
//!
//! Three strategies, picked per piece:
//!
//! ```text
//!   basic    : rectangular, angle 0, mirror +1   -> row copies
//!   adv      : rectangular, rotated or mirrored  -> pixel copies along the step vectors
//!   complex  : organic edges                     -> fill runs of the four edge shapes
//! ```
//!
//! Every write is clipped against the source and the destination planes.
//! Row widths are taken from the pitch, so padding columns count as
//! addressable.

use crate::game::Board;
use crate::picture::{PlaneBuf, Picture};
use crate::piece::{Piece, PieceInPlane, Pos};
use crate::shape::{RunKind, ShapeTable};
use crate::sign::{glyph_value, Sign};

/// Desk background while a game is running.
pub const DESK_COLOR: (u8, u8, u8) = (0, 127, 127);

/// Outline of the selected slot.
pub const SELECTION_COLOR: (u8, u8, u8) = (255, 127, 127);

/// Per-plane clipping bounds.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    src_width: i32,
    src_lines: i32,
    dst_width: i32,
    dst_lines: i32,
}

impl Bounds {
    fn of(src: &PlaneBuf, dst: &PlaneBuf) -> Self {
        Self {
            src_width: src.pitch_width() as i32,
            src_lines: src.visible_lines as i32,
            dst_width: dst.pitch_width() as i32,
            dst_lines: dst.visible_lines as i32,
        }
    }

    fn contains(&self, src_x: i32, src_y: i32, dst_x: i32, dst_y: i32) -> bool {
        src_x >= 0
            && src_x < self.src_width
            && src_y >= 0
            && src_y < self.src_lines
            && dst_x >= 0
            && dst_x < self.dst_width
            && dst_y >= 0
            && dst_y < self.dst_lines
    }
}

/// Copy one pixel; the caller has clipped the coordinates.
fn copy_pixel(src: &PlaneBuf, sx: i32, sy: i32, dst: &mut PlaneBuf, dx: i32, dy: i32) {
    let pp = dst.pixel_pitch.max(1);
    let s = sy as usize * src.pitch + sx as usize * pp;
    let d = dy as usize * dst.pitch + dx as usize * pp;
    if let (Some(from), true) = (src.pixels.get(s..s + pp), d + pp <= dst.pixels.len()) {
        dst.pixels[d..d + pp].copy_from_slice(from);
    }
}

// ============================================================================
// Pieces
// ============================================================================

/// Rectangular, untransformed piece: one clipped row copy per line.
pub fn draw_basic_piece(src: &PlaneBuf, dst: &mut PlaneBuf, p: &PieceInPlane) {
    let b = Bounds::of(src, dst);
    let pp = dst.pixel_pitch.max(1) as i32;

    let ofs_x = 0.max((-p.actual_x).max(-p.original_x));
    let count_x = p.width - 0.max((p.actual_x + p.width - b.dst_width).max(p.original_x + p.width - b.src_width));
    let ofs_y = 0.max((-p.actual_y).max(-p.original_y));
    let count_y = p.lines - 0.max((p.actual_y + p.lines - b.dst_lines).max(p.original_y + p.lines - b.src_lines));
    if count_x <= ofs_x {
        return;
    }

    let len = ((count_x - ofs_x) * pp) as usize;
    for y in ofs_y..count_y {
        let d = ((p.actual_y + y) as usize) * dst.pitch + ((p.actual_x + ofs_x) * pp) as usize;
        let s = ((p.original_y + y) as usize) * src.pitch + ((p.original_x + ofs_x) * pp) as usize;
        if let (Some(from), true) = (src.pixels.get(s..s + len), d + len <= dst.pixels.len()) {
            dst.pixels[d..d + len].copy_from_slice(from);
        }
    }
}

/// Rectangular piece under any rotation or mirror.
pub fn draw_adv_piece(src: &PlaneBuf, dst: &mut PlaneBuf, piece: &Piece, plane: usize) {
    let Some(p) = piece.planes.get(plane) else {
        return;
    };
    let b = Bounds::of(src, dst);
    let s = piece.steps;

    for y in 0..p.lines {
        let src_y = p.original_y + y;
        if src_y < 0 || src_y >= b.src_lines {
            continue;
        }
        for x in 0..p.width {
            let dst_x = p.actual_x + x * s.x_x + y * s.y_x;
            let dst_y = p.actual_y + x * s.x_y + y * s.y_y;
            let src_x = p.original_x + x;
            if b.contains(src_x, src_y, dst_x, dst_y) {
                copy_pixel(src, src_x, src_y, dst, dst_x, dst_y);
            }
        }
    }
}

/// Walk the fill runs of an organic piece row by row through the left, top,
/// bottom and right shapes, calling `run(y, x, width)` in piece-local
/// coordinates. Returns false when an edge has no shape data.
pub fn for_each_fill_run(piece: &Piece, plane: usize, shapes: &ShapeTable, mut run: impl FnMut(i32, i32, i32)) -> bool {
    let quadrants = [piece.left, piece.top, piece.bottom, piece.right].map(|id| shapes.get(id, plane));
    let [Some(left), Some(top), Some(bottom), Some(right)] = quadrants else {
        return false;
    };

    for y in top.first_row_offset..bottom.end_row() {
        let mut sect_start = 0;
        for shape in [left, top, bottom, right] {
            let Some(row) = shape.row(y) else {
                continue;
            };
            for section in &row.sections {
                if section.kind == RunKind::Fill {
                    run(y, sect_start, section.width);
                }
                sect_start += section.width;
            }
        }
    }
    true
}

/// Organic piece: copy every fill run along the step vectors. Returns true
/// when a plane 0 pixel landed on `mouse`.
///
/// Falls back to [`draw_adv_piece`] when an edge has no shape data.
pub fn draw_complex_piece(
    src: &PlaneBuf,
    dst: &mut PlaneBuf,
    piece: &Piece,
    plane: usize,
    shapes: &ShapeTable,
    mouse: Option<Pos>,
) -> bool {
    let Some(p) = piece.planes.get(plane) else {
        return false;
    };
    let b = Bounds::of(src, dst);
    let s = piece.steps;
    let mouse = mouse.filter(|_| plane == 0);
    let mut pointed = false;

    let walked = for_each_fill_run(piece, plane, shapes, |y, start, width| {
        let src_y = p.original_y + y;
        if src_y < 0 || src_y >= b.src_lines {
            return;
        }
        for x in start..start + width {
            let dst_x = p.actual_x + x * s.x_x + y * s.y_x;
            let dst_y = p.actual_y + x * s.x_y + y * s.y_y;
            let src_x = p.original_x + x;
            if !b.contains(src_x, src_y, dst_x, dst_y) {
                continue;
            }
            copy_pixel(src, src_x, src_y, dst, dst_x, dst_y);
            if mouse == Some(Pos::new(dst_x, dst_y)) {
                pointed = true;
            }
        }
    });
    if !walked {
        draw_adv_piece(src, dst, piece, plane);
        return false;
    }
    pointed
}

/// Draw every piece, back to front, in every plane.
///
/// Returns the front-most organic piece covering `mouse` with an actual
/// pixel, if any.
pub fn draw_pieces(board: &Board, input: &Picture, output: &mut Picture, mouse: Option<Pos>) -> Option<usize> {
    let params = board.params();
    let shapes = board.shapes().filter(|_| params.shape_size != 0);
    let mut pointed = None;

    for (plane, (src, dst)) in input.planes.iter().zip(output.planes.iter_mut()).enumerate() {
        for (i, piece) in board.pieces().iter().enumerate().rev() {
            if !params.advanced || (piece.mirror == 1 && piece.angle == 0 && params.shape_size == 0) {
                if let Some(p) = piece.planes.get(plane) {
                    draw_basic_piece(src, dst, p);
                }
                continue;
            }
            match shapes {
                Some(table) => {
                    if draw_complex_piece(src, dst, piece, plane, table, mouse) {
                        pointed = Some(i);
                    }
                }
                None => draw_adv_piece(src, dst, piece, plane),
            }
        }
    }
    pointed
}

// ============================================================================
// Desk decorations
// ============================================================================

fn plane_value(color: (u8, u8, u8), plane: usize) -> u8 {
    match plane {
        0 => color.0,
        1 => color.1,
        _ => color.2,
    }
}

/// Fill every plane with its component of `color`.
pub fn preset_background(output: &mut Picture, color: (u8, u8, u8)) {
    for plane in 0..output.planes.len() {
        output.fill_plane(plane, plane_value(color, plane));
    }
}

/// Copy the unshuffled border from the source.
pub fn draw_borders(board: &Board, input: &Picture, output: &mut Picture) {
    for (geo, (src, dst)) in board
        .desk_planes()
        .iter()
        .zip(input.planes.iter().zip(output.planes.iter_mut()))
    {
        let (bw, bl) = (geo.border_width, geo.border_lines);
        if bw <= 0 && bl <= 0 {
            continue;
        }
        let bands = [
            (0, 0, geo.width, bl),
            (0, geo.lines - bl, geo.width, bl),
            (0, bl, bw, geo.lines - 2 * bl),
            (geo.width - bw, bl, bw, geo.lines - 2 * bl),
        ];
        for (x, y, width, lines) in bands {
            let band = PieceInPlane {
                original_x: x,
                original_y: y,
                actual_x: x,
                actual_y: y,
                width,
                lines,
            };
            draw_basic_piece(src, dst, &band);
        }
    }
}

/// Origin of the preview for one of the four desk corners, clockwise from
/// the top left.
pub fn preview_origin(corner: u8, desk_width: i32, desk_lines: i32, width: i32, lines: i32) -> Pos {
    match corner % 4 {
        0 => Pos::new(0, 0),
        1 => Pos::new(desk_width - width, 0),
        2 => Pos::new(desk_width - width, desk_lines - lines),
        _ => Pos::new(0, desk_lines - lines),
    }
}

/// Nearest-neighbour thumbnail of the whole source in desk corner `corner`.
pub fn draw_preview(board: &Board, corner: u8, input: &Picture, output: &mut Picture) {
    let planes = board.desk_planes().iter().zip(board.pict_planes());
    for ((desk, pict), (src, dst)) in planes.zip(input.planes.iter().zip(output.planes.iter_mut())) {
        let (width, lines) = (desk.preview_width, desk.preview_lines);
        if width <= 0 || lines <= 0 {
            continue;
        }
        let origin = preview_origin(corner, desk.width, desk.lines, width, lines);
        let b = Bounds::of(src, dst);
        for y in 0..lines {
            let src_y = y * pict.lines / lines;
            for x in 0..width {
                let src_x = x * pict.width / width;
                let (dst_x, dst_y) = (origin.x + x, origin.y + y);
                if b.contains(src_x, src_y, dst_x, dst_y) {
                    copy_pixel(src, src_x, src_y, dst, dst_x, dst_y);
                }
            }
        }
    }
}

/// Scale a luma rectangle into `plane` of `picture`.
fn scaled_rect(picture: &Picture, plane: usize, x: i32, y: i32, width: i32, lines: i32) -> Option<(i32, i32, i32, i32)> {
    let luma = picture.planes.first()?;
    let buf = picture.planes.get(plane)?;
    let (lw, ll) = (luma.width().max(1) as i32, luma.lines().max(1) as i32);
    let (pw, pl) = (buf.width() as i32, buf.lines() as i32);
    Some((x * pw / lw, y * pl / ll, width * pw / lw, lines * pl / ll))
}

fn put(buf: &mut PlaneBuf, x: i32, y: i32, value: u8) {
    if x >= 0 && y >= 0 && (x as usize) < buf.width() && (y as usize) < buf.lines() {
        buf.set(x as usize, y as usize, value);
    }
}

/// One pixel outline, given in luma coordinates.
pub fn draw_rectangle(output: &mut Picture, x: i32, y: i32, width: i32, lines: i32, color: (u8, u8, u8)) {
    for plane in 0..output.planes.len() {
        let Some((x, y, width, lines)) = scaled_rect(output, plane, x, y, width, lines) else {
            continue;
        };
        let value = plane_value(color, plane);
        let buf = &mut output.planes[plane];
        for dx in x..x + width {
            put(buf, dx, y, value);
            put(buf, dx, y + lines - 1, value);
        }
        for dy in y..y + lines {
            put(buf, x, dy, value);
            put(buf, x + width - 1, dy, value);
        }
    }
}

pub fn fill_rectangle(output: &mut Picture, x: i32, y: i32, width: i32, lines: i32, color: (u8, u8, u8)) {
    for plane in 0..output.planes.len() {
        let Some((x, y, width, lines)) = scaled_rect(output, plane, x, y, width, lines) else {
            continue;
        };
        let value = plane_value(color, plane);
        let buf = &mut output.planes[plane];
        for dy in y..y + lines {
            for dx in x..x + width {
                put(buf, dx, dy, value);
            }
        }
    }
}

/// Paint `sign` into the luma plane with its top left at `(x, y)`.
pub fn draw_sign(output: &mut Picture, x: i32, y: i32, sign: &Sign, flip: bool) {
    let Some(luma) = output.planes.first_mut() else {
        return;
    };
    for sy in 0..sign.lines {
        for sx in 0..sign.width {
            if let Some(value) = sign.cell(sx, sy, flip).and_then(glyph_value) {
                put(luma, x + sx, y + sy, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::StepVectors;
    use crate::picture::ChromaFormat;
    use crate::sign::SHUFFLE_BUTTON;

    fn gradient(width: usize, lines: usize) -> PlaneBuf {
        let mut buf = PlaneBuf::new(width, lines).unwrap();
        for y in 0..lines {
            for x in 0..width {
                buf.set(x, y, ((x + 7 * y) % 251) as u8);
            }
        }
        buf
    }

    fn rect(ox: i32, oy: i32, ax: i32, ay: i32, width: i32, lines: i32) -> PieceInPlane {
        PieceInPlane {
            original_x: ox,
            original_y: oy,
            actual_x: ax,
            actual_y: ay,
            width,
            lines,
        }
    }

    #[test]
    fn basic_copy_moves_pixels() {
        let src = gradient(32, 16);
        let mut dst = PlaneBuf::new(32, 16).unwrap();
        draw_basic_piece(&src, &mut dst, &rect(2, 3, 10, 5, 4, 4));
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(dst.get(10 + x, 5 + y), src.get(2 + x, 3 + y));
            }
        }
        assert_eq!(dst.get(9, 5), 0);
        assert_eq!(dst.get(14, 5), 0);
    }

    #[test]
    fn basic_copy_clips_negative_and_overflowing_positions() {
        let src = gradient(32, 16);
        let mut dst = PlaneBuf::new(32, 16).unwrap();
        draw_basic_piece(&src, &mut dst, &rect(4, 4, -3, -2, 6, 5));
        assert_eq!(dst.get(0, 0), src.get(7, 6));
        assert_eq!(dst.get(2, 2), src.get(9, 8));

        let before = dst.pixels.len();
        draw_basic_piece(&src, &mut dst, &rect(0, 0, 30, 14, 20, 20));
        draw_basic_piece(&src, &mut dst, &rect(0, 0, 500, 500, 20, 20));
        draw_basic_piece(&src, &mut dst, &rect(0, 0, -500, -500, 20, 20));
        assert_eq!(dst.pixels.len(), before);
        assert_eq!(dst.get(31, 15), src.get(1, 1));
    }

    #[test]
    fn adv_copy_follows_step_vectors() {
        let src = gradient(16, 16);
        let mut dst = PlaneBuf::new(16, 16).unwrap();
        let mut piece = Piece::new(0, 0, vec![rect(0, 0, 8, 8, 3, 2)], 0);
        piece.angle = 2;
        piece.steps = StepVectors::for_transform(2, 1);
        draw_adv_piece(&src, &mut dst, &piece, 0);
        // half turn: local (x, y) lands at (8 - x, 8 - y)
        assert_eq!(dst.get(8, 8), src.get(0, 0));
        assert_eq!(dst.get(6, 8), src.get(2, 0));
        assert_eq!(dst.get(6, 7), src.get(2, 1));
    }

    #[test]
    fn adv_copy_clips_per_pixel() {
        let src = gradient(16, 16);
        let mut dst = PlaneBuf::new(16, 16).unwrap();
        let mut piece = Piece::new(0, 0, vec![rect(0, 0, 2, 2, 8, 8)], 0);
        piece.steps = StepVectors::for_transform(1, 1);
        draw_adv_piece(&src, &mut dst, &piece, 0);
        draw_adv_piece(&src, &mut dst, &piece, 3);
        assert_eq!(dst.get(2, 2), src.get(0, 0));
    }

    #[test]
    fn complex_copy_covers_flat_piece_and_reports_mouse() {
        use crate::error::AllocBudget;
        use crate::shape::PieceFrame;

        let frames = [PieceFrame::new(8, 6, 8, 6)];
        let table = ShapeTable::bake(&frames, &[], 0, &mut AllocBudget::unlimited()).unwrap();
        let src = gradient(16, 16);
        let mut dst = PlaneBuf::new(16, 16).unwrap();
        let mut piece = Piece::new(0, 0, vec![rect(1, 2, 4, 5, 8, 6)], 0);
        piece.steps = StepVectors::default();

        let hit = draw_complex_piece(&src, &mut dst, &piece, 0, &table, Some(Pos::new(7, 7)));
        assert!(hit);
        for y in 0..6 {
            for x in 0..8 {
                assert_eq!(dst.get(4 + x, 5 + y), src.get(1 + x, 2 + y), "({}, {})", x, y);
            }
        }
        assert!(!draw_complex_piece(&src, &mut dst, &piece, 0, &table, Some(Pos::new(0, 0))));
        assert!(!draw_complex_piece(&src, &mut dst, &piece, 1, &table, Some(Pos::new(7, 7))));
    }

    #[test]
    fn rectangles_are_scaled_into_chroma() {
        let mut picture = Picture::new(ChromaFormat::I420, 40, 20).unwrap();
        fill_rectangle(&mut picture, 10, 4, 8, 6, (200, 10, 20));
        assert_eq!(picture.planes[0].get(10, 4), 200);
        assert_eq!(picture.planes[0].get(17, 9), 200);
        assert_eq!(picture.planes[0].get(18, 9), 0);
        assert_eq!(picture.planes[1].get(5, 2), 10);
        assert_eq!(picture.planes[2].get(8, 4), 20);

        let mut picture = Picture::new(ChromaFormat::Grey, 40, 20).unwrap();
        draw_rectangle(&mut picture, 2, 2, 5, 5, SELECTION_COLOR);
        assert_eq!(picture.planes[0].get(2, 2), 255);
        assert_eq!(picture.planes[0].get(6, 6), 255);
        assert_eq!(picture.planes[0].get(4, 4), 0);
        draw_rectangle(&mut picture, 38, 18, 10, 10, SELECTION_COLOR);
    }

    #[test]
    fn sign_is_clipped_and_transparent_cells_skipped() {
        let mut picture = Picture::new(ChromaFormat::I420, 20, 10).unwrap();
        picture.fill_plane(0, 77);
        draw_sign(&mut picture, 0, 0, &SHUFFLE_BUTTON, false);
        assert_eq!(picture.planes[0].get(0, 0), 255);
        assert_eq!(picture.planes[0].get(1, 1), 0);
        assert_eq!(picture.planes[1].get(0, 0), 128);

        let sign = Sign { width: 2, lines: 1, rows: &["o "] };
        draw_sign(&mut picture, 10, 9, &sign, false);
        assert_eq!(picture.planes[0].get(10, 9), 255);
        assert_eq!(picture.planes[0].get(11, 9), 77);
        draw_sign(&mut picture, -5, -5, &sign, true);
    }

    #[test]
    fn preview_corners_go_clockwise() {
        assert_eq!(preview_origin(0, 100, 50, 10, 5), Pos::new(0, 0));
        assert_eq!(preview_origin(1, 100, 50, 10, 5), Pos::new(90, 0));
        assert_eq!(preview_origin(2, 100, 50, 10, 5), Pos::new(90, 45));
        assert_eq!(preview_origin(3, 100, 50, 10, 5), Pos::new(0, 45));
        assert_eq!(preview_origin(4, 100, 50, 10, 5), Pos::new(0, 0));
    }

    #[test]
    fn background_uses_one_component_per_plane() {
        let mut picture = Picture::new(ChromaFormat::I422, 8, 8).unwrap();
        preset_background(&mut picture, DESK_COLOR);
        assert_eq!(picture.planes[0].get(3, 3), 0);
        assert_eq!(picture.planes[1].get(1, 1), 127);
        assert_eq!(picture.planes[2].get(1, 1), 127);
    }
}

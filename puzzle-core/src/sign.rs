//! Bitmap glyphs drawn over the desk.
//!
//! One string per line: `'o'` is drawn white, `'.'` black, anything else is
//! transparent. Glyphs only touch the luma plane.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sign {
    pub width: i32,
    pub lines: i32,
    pub rows: &'static [&'static str],
}

/// Luma value a glyph cell paints, `None` when transparent.
pub fn glyph_value(cell: u8) -> Option<u8> {
    match cell {
        b'o' => Some(255),
        b'.' => Some(0),
        _ => None,
    }
}

impl Sign {
    /// Cell at `(x, y)`; `flip` mirrors the glyph horizontally.
    pub fn cell(&self, x: i32, y: i32, flip: bool) -> Option<u8> {
        if x < 0 || y < 0 || x >= self.width || y >= self.lines {
            return None;
        }
        let row = self.rows.get(y as usize)?.as_bytes();
        let x = if flip { self.width - 1 - x } else { x };
        row.get(x as usize).copied()
    }
}

/// Shown in the top left corner once the puzzle is solved.
pub const SHUFFLE_BUTTON: Sign = Sign {
    width: 25,
    lines: 13,
    rows: &[
        "ooooooooooooooooooooooooo",
        "o.......................o",
        "o..............o........o",
        "o..............oo.......o",
        "o...ooooooooooooooo.....o",
        "o..............oo.......o",
        "o.......o......o........o",
        "o......oo...............o",
        "o.....ooooooooooooooo...o",
        "o......oo...............o",
        "o.......o...............o",
        "o.......................o",
        "ooooooooooooooooooooooooo",
    ],
};

/// Quarter turn; mirrored for the other direction.
pub const ROTATE_ARROW: Sign = Sign {
    width: 13,
    lines: 13,
    rows: &[
        "    .......  ",
        "   .ooooooo. ",
        "  .oo.....oo.",
        "  .o.     .o.",
        "  .o.     .o.",
        " ...o.   .o. ",
        ".ooooo.  .o. ",
        " .ooo.   .o. ",
        "  .o.   .o.  ",
        "   .   .o.   ",
        "      .o.    ",
        "     .o.     ",
        "      .      ",
    ],
};

/// Horizontal flip.
pub const MIRROR_ARROW: Sign = Sign {
    width: 13,
    lines: 13,
    rows: &[
        "      .      ",
        "      o      ",
        "  .   o   .  ",
        " .o.  o  .o. ",
        ".oo...o...oo.",
        "ooooooooooooo",
        ".oo...o...oo.",
        " .o.  o  .o. ",
        "  .   o   .  ",
        "      o      ",
        "      o      ",
        "      o      ",
        "      .      ",
    ],
};

//! # Game Management
//!
//! The board: geometry baked from the current parameters, the pieces and
//! their permutation, and the per-frame amortized simulation.
//!
//! ```text
//!            bake                 bake_piece / shuffle
//!   params ───────► geometry ───────────────────────► pieces + order
//!                   shapes                                │
//!                                                          ▼
//!          per frame: solve accuracy ─► solve group ─► count ─► sort layers
//!                     ─► refresh corners ─► auto shuffle ─► auto solve
//! ```
//!
//! Every tick only probes one anchor piece, so a frame costs O(n) and never
//! O(n²).

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::bezier::BezierCurve;
use crate::config::{BoardParams, GameMode, RotationMode};
use crate::error::{try_filled, try_vec, AllocBudget, PuzzleError, Result};
use crate::picture::Picture;
use crate::piece::{HomeCorners, Piece, PieceInPlane, PieceSet, Pos, StepVectors};
use crate::plane::{PlaneGeometry, PuzzleGrid};
use crate::save::{SaveGame, SavedPiece};
use crate::shape::{EdgeId, EdgePosition, PieceFrame, Polarity, ShapeTable, SHAPES_QTY};
use crate::timer::AutoTimer;

/// Shuffle draws before giving up on boards with no acceptable permutation.
const MAX_SHUFFLE_ATTEMPTS: usize = 10_000;

/// Tolerance on home coordinates when looking for neighbours.
const HOME_TOLERANCE: i32 = 3;

/// Generate the random edge templates a board is baked with.
pub fn random_curves<R: Rng + ?Sized>(rng: &mut R) -> Result<Vec<BezierCurve>> {
    let mut curves = try_vec(SHAPES_QTY, "edge templates")?;
    for _ in 0..SHAPES_QTY {
        curves.push(BezierCurve::random(rng)?);
    }
    Ok(curves)
}

fn random_edge<R: Rng + ?Sized>(position: EdgePosition, rng: &mut R) -> EdgeId {
    let archetype = (rng.random::<u32>() % SHAPES_QTY as u32) as u8;
    let polarity = if rng.random::<u32>() & 1 == 0 {
        Polarity::Positive
    } else {
        Polarity::Negative
    };
    EdgeId::bezier(position, archetype, polarity)
}

/// A saved edge drawn on the wrong side of a piece comes back flat.
fn edge_for(id: EdgeId, position: EdgePosition) -> EdgeId {
    if id.position == position {
        id
    } else {
        tracing::debug!("Saved edge {} does not belong on the {:?} side, flattening", id.index(), position);
        EdgeId::flat(position)
    }
}

/// Result of a click on a slot of a non-jigsaw board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAction {
    Ignored,
    Selected(usize),
    Deselected,
    /// Contents of two slots exchanged
    Swapped { from: usize, to: usize },
}

/// Copy of the geometry the snapping rules compare.
#[derive(Debug, Clone, Copy)]
struct Joint {
    angle: u8,
    mirror: i8,
    group: usize,
    finished: bool,
    home: HomeCorners,
    steps: StepVectors,
    tl: Pos,
    tr: Pos,
    bl: Pos,
    br: Pos,
}

impl Joint {
    fn of(piece: &Piece) -> Self {
        Self {
            angle: piece.angle,
            mirror: piece.mirror,
            group: piece.group,
            finished: piece.finished,
            home: piece.home,
            steps: piece.steps,
            tl: piece.tl,
            tr: piece.tr,
            bl: piece.bl,
            br: piece.br,
        }
    }

    fn same_row(&self, other: &Joint) -> bool {
        (self.home.top - other.home.top).abs() < HOME_TOLERANCE
    }

    fn same_col(&self, other: &Joint) -> bool {
        (self.home.left - other.home.left).abs() < HOME_TOLERANCE
    }

    /// `other` belongs right of `self` and currently sits there.
    fn joins_right(&self, other: &Joint, accuracy: i32) -> bool {
        (self.home.right - other.home.left + 1).abs() < HOME_TOLERANCE
            && (self.tr.x - other.tl.x + 1).abs() < accuracy
            && (self.tr.y - other.tl.y).abs() < accuracy
            && (self.br.x - other.bl.x + 1).abs() < accuracy
            && (self.br.y - other.bl.y).abs() < accuracy
    }

    /// `other` belongs below `self` and currently sits there.
    fn joins_below(&self, other: &Joint, accuracy: i32) -> bool {
        (self.home.bottom - other.home.top + 1).abs() < HOME_TOLERANCE
            && (other.tl.x - self.bl.x).abs() < accuracy
            && (other.tl.y - 1 - self.bl.y).abs() < accuracy
            && (other.tr.x - self.br.x).abs() < accuracy
            && (other.tr.y - 1 - self.br.y).abs() < accuracy
    }
}

/// Adjacent pieces in the unshuffled picture.
#[derive(Debug, Clone, Copy, Default)]
struct Neighbours {
    left: Option<usize>,
    right: Option<usize>,
    top: Option<usize>,
    bottom: Option<usize>,
}

// ============================================================================
// Board
// ============================================================================

pub struct Board {
    params: BoardParams,
    desk: Vec<PlaneGeometry>,
    pict: Vec<PlaneGeometry>,
    grid: PuzzleGrid,
    shapes: Option<ShapeTable>,
    pieces: PieceSet,
    /// Slot -> original cell index
    order: Vec<usize>,
    selected: Option<usize>,
    magnet_accuracy: i32,
    finished: bool,

    solve_grp_loop: usize,
    solve_acc_loop: usize,
    calc_corn_loop: usize,
    done_count: usize,
    tmp_done_count: usize,

    auto_shuffle: AutoTimer,
    auto_solve: AutoTimer,
    rng: StdRng,
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("rows", &self.params.rows)
            .field("cols", &self.params.cols)
            .field("mode", &self.params.mode)
            .field("finished", &self.finished)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl Board {
    /// Compute geometry, cells and shapes for `params`, then cut and
    /// shuffle the pieces.
    pub fn bake(
        params: BoardParams,
        input: &Picture,
        output: &Picture,
        curves: &[BezierCurve],
        rng: StdRng,
    ) -> Result<Self> {
        let started = Instant::now();

        if !input.same_geometry(output) {
            return Err(PuzzleError::FormatMismatch {
                input_width: input.width(),
                input_height: input.height(),
                output_width: output.width(),
                output_height: output.height(),
            });
        }
        input.check_supported()?;
        output.check_supported()?;

        let desk = PlaneGeometry::measure_all(output, &params)?;
        let pict = PlaneGeometry::measure_all(input, &params)?;
        let grid = PuzzleGrid::compute(&pict, params.rows as usize, params.cols as usize)?;
        let magnet_accuracy = input.width() as i32 / 50 + 3;

        let shapes = if params.uses_shapes() {
            let base = desk.first().copied().unwrap_or_default();
            let mut frames = try_vec(desk.len(), "piece frames")?;
            frames.extend(desk.iter().map(|p| {
                PieceFrame::new(p.pce_max_width, p.pce_max_lines, base.pce_max_width, base.pce_max_lines)
            }));
            let mut budget = AllocBudget::unlimited();
            Some(ShapeTable::bake(&frames, curves, params.shape_size, &mut budget)?)
        } else {
            None
        };

        let mut board = Self {
            auto_shuffle: AutoTimer::new(params.auto_shuffle_speed),
            auto_solve: AutoTimer::new(params.auto_solve_speed),
            pieces: PieceSet::new(Vec::new(), &desk, params.rotation)?,
            params,
            desk,
            pict,
            grid,
            shapes,
            order: Vec::new(),
            selected: None,
            magnet_accuracy,
            finished: false,
            solve_grp_loop: 0,
            solve_acc_loop: 0,
            calc_corn_loop: 0,
            done_count: 0,
            tmp_done_count: 0,
            rng,
        };
        board.bake_piece()?;

        tracing::info!(
            "Baked {} ({}x{} pieces, {} planes, shapes: {}) in {:?}",
            board.params.mode.label(),
            board.params.rows,
            board.params.cols,
            board.desk.len(),
            board.shapes.is_some(),
            started.elapsed()
        );
        Ok(board)
    }

    /// [`Board::bake`] with a deterministic random source.
    pub fn with_seed(
        params: BoardParams,
        input: &Picture,
        output: &Picture,
        curves: &[BezierCurve],
        seed: u64,
    ) -> Result<Self> {
        Self::bake(params, input, output, curves, StdRng::seed_from_u64(seed))
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn params(&self) -> &BoardParams {
        &self.params
    }

    pub fn desk_planes(&self) -> &[PlaneGeometry] {
        &self.desk
    }

    pub fn pict_planes(&self) -> &[PlaneGeometry] {
        &self.pict
    }

    pub fn grid(&self) -> &PuzzleGrid {
        &self.grid
    }

    pub fn shapes(&self) -> Option<&ShapeTable> {
        self.shapes.as_ref()
    }

    pub fn pieces(&self) -> &PieceSet {
        &self.pieces
    }

    pub fn pieces_mut(&mut self) -> &mut PieceSet {
        &mut self.pieces
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn set_selected(&mut self, selected: Option<usize>) {
        self.selected = selected;
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn magnet_accuracy(&self) -> i32 {
        self.magnet_accuracy
    }

    /// Finished groups counted during the last complete accuracy cycle.
    pub fn done_count(&self) -> usize {
        self.done_count
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    fn cols(&self) -> usize {
        self.params.cols.max(1) as usize
    }

    fn rows(&self) -> usize {
        self.params.rows.max(1) as usize
    }

    // ------------------------------------------------------------------------
    // Piece generation
    // ------------------------------------------------------------------------

    /// Shuffle, then cut every piece: original cell from the permutation,
    /// random organic bottom and right edges, a small jitter in jigsaw
    /// mode, derived top and left edges and a random orientation.
    pub fn bake_piece(&mut self) -> Result<()> {
        self.shuffle()?;

        let (rows, cols) = (self.rows(), self.cols());
        let planes = self.desk.len();
        let base = self.desk.first().copied().unwrap_or_default();
        let mut pieces = try_vec(rows * cols, "pieces")?;

        for row in 0..rows {
            for col in 0..cols {
                let i = row * cols + col;
                let original = self.order.get(i).copied().unwrap_or(i);
                let (orow, ocol) = (original / cols, original % cols);

                let mut bottom = EdgeId::FLAT_BOTTOM;
                let mut right = EdgeId::FLAT_RIGHT;
                if self.params.shape_size > 0 {
                    if orow + 1 < rows {
                        bottom = random_edge(EdgePosition::Bottom, &mut self.rng);
                    }
                    if ocol + 1 < cols {
                        right = random_edge(EdgePosition::Right, &mut self.rng);
                    }
                }

                let (mut jitter_x, mut jitter_y) = (0, 0);
                if self.params.advanced {
                    let span_x = base.pce_max_width.max(0) as u32 + 1;
                    let span_y = base.pce_max_lines.max(0) as u32 + 1;
                    jitter_x = (self.rng.random::<u32>() % span_x) as i32 - base.pce_max_width / 2;
                    jitter_y = (self.rng.random::<u32>() % span_y) as i32 - base.pce_max_lines / 2;
                }

                let mut in_planes = try_vec(planes, "piece planes")?;
                for (plane, geo) in self.desk.iter().enumerate() {
                    let slot = self.grid.cell(row, col, plane);
                    let home = self.grid.cell(orow, ocol, plane);
                    in_planes.push(PieceInPlane {
                        original_x: home.x,
                        original_y: home.y,
                        actual_x: slot.x + jitter_x * geo.width / base.width.max(1),
                        actual_y: slot.y + jitter_y * geo.lines / base.lines.max(1),
                        width: slot.width,
                        lines: slot.lines,
                    });
                }

                let mut piece = Piece::new(orow, ocol, in_planes, i);
                piece.bottom = bottom;
                piece.right = right;
                piece.finished = orow == row && ocol == col;
                pieces.push(piece);
            }
        }

        self.pieces = PieceSet::new(pieces, &self.desk, self.params.rotation)?;
        self.pieces.count_groups();
        self.pieces.calculate_all_corners();
        self.set_left_top_shapes()?;
        self.random_rotate();
        Ok(())
    }

    /// Derive every top and left edge as the mate of the neighbour's bottom
    /// and right edge.
    fn set_left_top_shapes(&mut self) -> Result<()> {
        let cols = self.cols();
        let at = self.index_by_original()?;
        for b in 0..self.pieces.len() {
            let (orow, ocol) = (self.pieces.pieces[b].original_row, self.pieces.pieces[b].original_col);
            if ocol > 0 {
                if let Some(a) = at.get(orow * cols + ocol - 1).copied().flatten() {
                    self.pieces.pieces[b].left = self.pieces.pieces[a].right.mate();
                }
            }
            if orow > 0 {
                if let Some(a) = at.get((orow - 1) * cols + ocol).copied().flatten() {
                    self.pieces.pieces[b].top = self.pieces.pieces[a].bottom.mate();
                }
            }
        }
        Ok(())
    }

    /// Original cell index -> piece index.
    fn index_by_original(&self) -> Result<Vec<Option<usize>>> {
        let cols = self.cols();
        let mut at = try_filled(self.rows() * cols, None, "piece index")?;
        for (i, piece) in self.pieces.iter().enumerate() {
            if let Some(slot) = at.get_mut(piece.original_index(cols)) {
                *slot = Some(i);
            }
        }
        Ok(at)
    }

    fn random_turns(&mut self) -> i8 {
        match self.params.rotation {
            RotationMode::None => 0,
            RotationMode::Half => (self.rng.random::<u32>() % 2 * 2) as i8,
            RotationMode::Quarter => (self.rng.random::<u32>() % 4) as i8,
            RotationMode::QuarterMirror => (self.rng.random::<u32>() % 8) as i8,
        }
    }

    fn random_rotate(&mut self) {
        for i in 0..self.pieces.len() {
            let piece = &mut self.pieces.pieces[i];
            piece.angle = 0;
            piece.mirror = 1;
            let center = piece.center;
            let turns = self.random_turns();
            if turns != 0 {
                self.pieces.rotate_piece(i, turns, center.x, center.y, false);
            }
            self.pieces.calculate_corners(i);
        }
    }

    // ------------------------------------------------------------------------
    // Permutations
    // ------------------------------------------------------------------------

    /// Draw a random permutation by rejection: pick random slots until a
    /// free one comes up.
    fn random_order(&mut self, n: usize) -> Result<Vec<usize>> {
        let mut slots: Vec<Option<usize>> = try_filled(n, None, "piece order")?;
        let mut order = try_vec(n, "piece order")?;
        let mut c = 0;
        while c < n {
            let i = self.rng.random::<u32>() as usize % n;
            if slots[i].is_none() {
                slots[i] = Some(c);
                c += 1;
            }
        }
        order.extend(slots.into_iter().map(|s| s.unwrap_or(0)));
        Ok(order)
    }

    /// Replace the permutation with a random one that is neither solved nor,
    /// in sliding mode, unsolvable.
    pub fn shuffle(&mut self) -> Result<()> {
        let n = self.rows() * self.cols();
        let (cols, blackslot) = (self.cols(), self.params.blackslot);

        let mut attempts = 0;
        let order = loop {
            attempts += 1;
            let order = self.random_order(n)?;
            if !Self::is_finished(&order) && Self::is_valid(&order, cols, blackslot) {
                break order;
            }
            if attempts >= MAX_SHUFFLE_ATTEMPTS {
                tracing::warn!(
                    "No acceptable permutation of {} pieces after {} draws, keeping the last one",
                    n,
                    attempts
                );
                break order;
            }
        };
        if attempts > 1 {
            tracing::debug!("Shuffle accepted after {} draws", attempts);
        }

        self.selected = if blackslot {
            order.iter().position(|&o| o + 1 == n)
        } else {
            None
        };
        self.order = order;
        self.finished = false;
        Ok(())
    }

    /// Sliding puzzle solvability: even parity of the inversions among the
    /// real pieces plus the row (1-based) of the black slot. Always true
    /// outside sliding mode.
    pub fn is_valid(order: &[usize], cols: usize, blackslot: bool) -> bool {
        if !blackslot {
            return true;
        }
        let count = order.len();
        let blank = count.wrapping_sub(1);
        let cols = cols.max(1);

        let mut d = 0;
        for (i, &a) in order.iter().enumerate() {
            if a == blank {
                d += i / cols + 1;
                continue;
            }
            d += order[i + 1..].iter().filter(|&&b| b != blank && a > b).count();
        }
        d % 2 == 0
    }

    pub fn is_finished(order: &[usize]) -> bool {
        order.iter().enumerate().all(|(i, &o)| i == o)
    }

    // ------------------------------------------------------------------------
    // Layers and groups
    // ------------------------------------------------------------------------

    /// Bring piece `i` and its group to the front.
    pub fn piece_foreground(&mut self, i: usize) -> Result<()> {
        self.pieces.bring_to_front(i)
    }

    pub fn count_pce_group(&mut self) {
        self.pieces.count_groups();
    }

    /// Draw order: small groups in front, and within each group size the
    /// pieces still out of place before the finished ones.
    pub fn sort_layers(&mut self) -> Result<()> {
        self.sort_layers_with(&mut AllocBudget::unlimited())
    }

    fn sort_layers_with(&mut self, budget: &mut AllocBudget) -> Result<()> {
        let n = self.pieces.len();
        let mut order = budget.vec(n, "layer order")?;
        let mut placed_unfinished = budget.filled(n, false, "layer groups")?;
        let mut placed_finished = budget.filled(n, false, "layer groups")?;

        for qty in 1..=n {
            for finished in [false, true] {
                let placed = if finished { &mut placed_finished } else { &mut placed_unfinished };
                for start in 0..n {
                    let group = self.pieces.pieces[start].group;
                    if self.pieces.group_size(group) != qty || placed.get(group).copied().unwrap_or(true) {
                        continue;
                    }
                    placed[group] = true;
                    order.extend(
                        (start..n).filter(|&j| {
                            let p = &self.pieces.pieces[j];
                            p.group == group && p.finished == finished
                        }),
                    );
                }
            }
        }
        self.pieces.reorder(&order)
    }

    fn join(&mut self, a: usize, b: usize, dx: i32, dy: i32, b_finished: bool) {
        if b_finished {
            self.pieces.move_group(a, -dx, -dy);
        } else {
            self.pieces.move_group(b, dx, dy);
        }
        let from = self.pieces.pieces[b].group;
        let to = self.pieces.pieces[a].group;
        self.pieces.merge_groups(from, to);
        tracing::debug!("Group {} joined group {}", from, to);
    }

    /// Probe the next anchor piece against every other piece and snap those
    /// lying right of or below it into its group. Edges between joined
    /// pieces become flat.
    pub fn solve_pces_group(&mut self) {
        let n = self.pieces.len();
        if n == 0 {
            return;
        }
        self.solve_grp_loop = (self.solve_grp_loop + 1) % n;
        let a = self.solve_grp_loop;
        let accuracy = self.magnet_accuracy;

        for b in 0..n {
            let pa = Joint::of(&self.pieces.pieces[a]);
            let pb = Joint::of(&self.pieces.pieces[b]);
            if pa.angle != pb.angle || pa.mirror != pb.mirror {
                continue;
            }

            if pb.group != pa.group {
                if pa.same_row(&pb) {
                    if pa.joins_right(&pb, accuracy) {
                        let dx = pa.tr.x - pb.tl.x + pa.steps.x_x;
                        let dy = pa.tr.y - pb.tl.y;
                        self.join(a, b, dx, dy, pb.finished);
                    }
                } else if pa.same_col(&pb) && pa.joins_below(&pb, accuracy) {
                    let dx = pa.bl.x - pb.tl.x;
                    let dy = pa.bl.y - pb.tl.y + pa.steps.y_y;
                    self.join(a, b, dx, dy, pb.finished);
                }
            }

            let pa = Joint::of(&self.pieces.pieces[a]);
            let pb = Joint::of(&self.pieces.pieces[b]);
            if pa.same_row(&pb) {
                if pa.joins_right(&pb, accuracy) {
                    self.pieces.pieces[b].left = EdgeId::FLAT_LEFT;
                    self.pieces.pieces[a].right = EdgeId::FLAT_RIGHT;
                }
            } else if pa.same_col(&pb) && pa.joins_below(&pb, accuracy) {
                self.pieces.pieces[b].top = EdgeId::FLAT_TOP;
                self.pieces.pieces[a].bottom = EdgeId::FLAT_BOTTOM;
            }
        }
    }

    /// Probe the next piece against its home position. A piece close enough
    /// snaps its whole group home and marks it finished. The board is
    /// finished once a full cycle counted every piece.
    pub fn solve_pces_accuracy(&mut self) {
        let n = self.pieces.len();
        if n == 0 {
            return;
        }
        self.solve_acc_loop += 1;
        if self.solve_acc_loop >= n {
            self.done_count = self.tmp_done_count;
            self.tmp_done_count = 0;
            self.solve_acc_loop = 0;
            self.finished = self.done_count == n;
        }

        let i = self.solve_acc_loop;
        self.pieces.pieces[i].finished = false;
        let p = Joint::of(&self.pieces.pieces[i]);
        let accuracy = self.magnet_accuracy;
        if p.mirror == 1
            && (p.tr.x - p.home.right).abs() < accuracy
            && (p.tr.y - p.home.top).abs() < accuracy
            && (p.tl.x - p.home.left).abs() < accuracy
            && (p.tl.y - p.home.top).abs() < accuracy
        {
            self.tmp_done_count += 1;
            for j in 0..n {
                let piece = &mut self.pieces.pieces[j];
                if piece.group == p.group && !piece.finished {
                    let home = piece.home;
                    piece.set_actual(home.left, home.top);
                    piece.mirror = 1;
                    self.pieces.calculate_corners(j);
                    self.pieces.pieces[j].finished = true;
                }
            }
        }
    }

    /// Refresh the corners of the next `count` pieces, round robin.
    pub fn refresh_corners(&mut self, count: usize) {
        let n = self.pieces.len();
        if n == 0 {
            return;
        }
        for _ in 0..count {
            self.calc_corn_loop = (self.calc_corn_loop + 1) % n;
            self.pieces.calculate_corners(self.calc_corn_loop);
        }
    }

    /// One frame of jigsaw simulation.
    pub fn manage(&mut self, now: Duration) -> Result<()> {
        let n = self.pieces.len();
        for _ in 0..(n / 4).max(4) {
            self.solve_pces_accuracy();
        }
        for _ in 0..(n / 4).max(4) {
            self.solve_pces_group();
        }
        self.count_pce_group();
        self.sort_layers()?;
        self.refresh_corners((n / 24).max(4));
        self.auto_shuffle(now);
        self.auto_solve(now);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Background processes
    // ------------------------------------------------------------------------

    /// Restart the auto timers from `now` with the current speeds.
    pub fn rearm_timers(&mut self, now: Duration) {
        self.auto_shuffle.rearm(self.params.auto_shuffle_speed, now, &mut self.rng);
        self.auto_solve.rearm(self.params.auto_solve_speed, now, &mut self.rng);
    }

    /// Snap one random unfinished group home when the timer fires.
    pub fn auto_solve(&mut self, now: Duration) -> bool {
        if !self.auto_solve.tick(now, &mut self.rng) {
            return false;
        }
        let n = self.pieces.len();
        if n == 0 {
            return false;
        }
        let start = self.rng.random::<u32>() as usize % n;
        for l in 0..n {
            let i = (l + start) % n;
            if self.pieces.pieces[i].finished {
                continue;
            }
            let group = self.pieces.pieces[i].group;
            for j in 0..n {
                let piece = &mut self.pieces.pieces[j];
                if piece.group == group {
                    piece.angle = 0;
                    piece.mirror = 1;
                    let luma = piece.luma();
                    piece.set_actual(luma.original_x, luma.original_y);
                    self.pieces.calculate_corners(j);
                }
            }
            tracing::debug!("Auto solve placed group {}", group);
            return true;
        }
        false
    }

    /// Pull one random piece out of its group when the timer fires: new
    /// singleton group, random orientation and position, organic edges
    /// restored where the group had flattened them.
    pub fn auto_shuffle(&mut self, now: Duration) -> bool {
        if !self.auto_shuffle.tick(now, &mut self.rng) {
            return false;
        }
        let n = self.pieces.len();
        if n == 0 {
            return false;
        }
        let start = self.rng.random::<u32>() as usize % n;
        for l in 0..n {
            let i = (l + start) % n;
            if self.pieces.group_size(self.pieces.pieces[i].group) <= 1 {
                continue;
            }
            let Some(new_group) = self.pieces.free_group() else {
                return false;
            };
            self.pieces.pieces[i].group = new_group;
            self.pieces.pieces[i].finished = false;

            let turns = self.random_turns();
            if turns != 0 {
                let center = self.pieces.pieces[i].center;
                self.pieces.rotate_piece(i, turns, center.x, center.y, false);
            }

            let desk = self.desk.first().copied().unwrap_or_default();
            let piece = &self.pieces.pieces[i];
            let (luma, s) = (piece.luma(), piece.steps);
            let span_x = (desk.width - 2 * desk.border_width - luma.width).max(1) as u32;
            let span_y = (desk.lines - 2 * desk.border_lines - luma.lines).max(1) as u32;
            let x = desk.border_width + (self.rng.random::<u32>() % span_x) as i32 + luma.width / 2 * (1 - s.x_x)
                - (luma.lines / 2) * s.y_x;
            let y = desk.border_lines + (self.rng.random::<u32>() % span_y) as i32 + luma.lines / 2 * (1 - s.y_y)
                - (luma.width / 2) * s.x_y;
            self.pieces.pieces[i].set_actual(x, y);

            self.restore_edges(i);
            self.pieces.calculate_corners(i);
            tracing::debug!("Auto shuffle released piece {} into group {}", i, new_group);
            return true;
        }
        false
    }

    fn neighbours(&self, i: usize) -> Neighbours {
        let mut found = Neighbours::default();
        let Some(p) = self.pieces.pieces.get(i) else {
            return found;
        };
        for (j, q) in self.pieces.iter().enumerate() {
            if p.original_row == q.original_row {
                if p.original_col + 1 == q.original_col {
                    found.right = Some(j);
                } else if p.original_col == q.original_col + 1 {
                    found.left = Some(j);
                }
            } else if p.original_col == q.original_col {
                if p.original_row + 1 == q.original_row {
                    found.bottom = Some(j);
                } else if p.original_row == q.original_row + 1 {
                    found.top = Some(j);
                }
            }
        }
        found
    }

    /// Give interior flat edges of piece `i` a fresh organic shape, keeping
    /// the neighbour's matching edge in step.
    fn restore_edges(&mut self, i: usize) {
        let (rows, cols) = (self.rows(), self.cols());
        let near = self.neighbours(i);
        let p = &self.pieces.pieces[i];
        let (left, right, top, bottom) = (p.left, p.right, p.top, p.bottom);
        let (row, col) = (p.original_row, p.original_col);

        if let Some(l) = near.left.filter(|_| left == EdgeId::FLAT_LEFT && col != 0) {
            let edge = random_edge(EdgePosition::Right, &mut self.rng);
            self.pieces.pieces[l].right = edge;
            self.pieces.pieces[i].left = edge.mate();
        }
        if let Some(r) = near.right.filter(|_| right == EdgeId::FLAT_RIGHT && col + 1 != cols) {
            let edge = random_edge(EdgePosition::Right, &mut self.rng);
            self.pieces.pieces[i].right = edge;
            self.pieces.pieces[r].left = edge.mate();
        }
        if let Some(t) = near.top.filter(|_| top == EdgeId::FLAT_TOP && row != 0) {
            let edge = random_edge(EdgePosition::Bottom, &mut self.rng);
            self.pieces.pieces[t].bottom = edge;
            self.pieces.pieces[i].top = edge.mate();
        }
        if let Some(b) = near.bottom.filter(|_| bottom == EdgeId::FLAT_BOTTOM && row + 1 != rows) {
            let edge = random_edge(EdgePosition::Bottom, &mut self.rng);
            self.pieces.pieces[i].bottom = edge;
            self.pieces.pieces[b].top = edge.mate();
        }
    }

    // ------------------------------------------------------------------------
    // Save / load
    // ------------------------------------------------------------------------

    pub fn save(&self) -> Result<SaveGame> {
        let desk = self.desk.first().copied().unwrap_or_default();
        let inner_w = desk.inner_width().max(1) as f32;
        let inner_l = desk.inner_lines().max(1) as f32;

        let mut pieces = try_vec(self.pieces.len(), "save game")?;
        pieces.extend(self.pieces.iter().map(|p| {
            let luma = p.luma();
            SavedPiece {
                original_row: p.original_row,
                original_col: p.original_col,
                top: p.top,
                bottom: p.bottom,
                left: p.left,
                right: p.right,
                pos_x: (luma.actual_x - desk.border_width) as f32 / inner_w,
                pos_y: (luma.actual_y - desk.border_lines) as f32 / inner_l,
                angle: p.angle,
                mirror: p.mirror,
            }
        }));

        Ok(SaveGame {
            cols: self.params.cols,
            rows: self.params.rows,
            rotation: self.params.rotation,
            pieces,
        })
    }

    /// Restore piece placement from `save`. A snapshot of another board size
    /// or rotation mode is ignored and `false` returned, as is any snapshot
    /// offered to a slot game.
    pub fn load(&mut self, save: &SaveGame) -> bool {
        if !self.params.advanced {
            tracing::warn!("Ignoring save game, {:?} boards do not restore piece placement", self.params.mode);
            return false;
        }
        if !save.matches(self.params.rows, self.params.cols, self.params.rotation) {
            tracing::warn!(
                "Ignoring save game for a {}x{} board ({:?}), current board is {}x{} ({:?})",
                save.rows,
                save.cols,
                save.rotation,
                self.params.rows,
                self.params.cols,
                self.params.rotation
            );
            return false;
        }

        let desk = self.desk.first().copied().unwrap_or_default();
        let inner_w = desk.inner_width() as f32;
        let inner_l = desk.inner_lines() as f32;

        for (k, saved) in save.pieces.iter().enumerate() {
            let found = self
                .pieces
                .iter()
                .position(|p| p.original_row == saved.original_row && p.original_col == saved.original_col);
            let Some(i) = found else {
                continue;
            };
            let piece = &mut self.pieces.pieces[i];
            piece.set_actual(
                desk.border_width + (inner_w * saved.pos_x) as i32,
                desk.border_lines + (inner_l * saved.pos_y) as i32,
            );
            piece.top = edge_for(saved.top, EdgePosition::Top);
            piece.bottom = edge_for(saved.bottom, EdgePosition::Bottom);
            piece.right = edge_for(saved.right, EdgePosition::Right);
            piece.left = edge_for(saved.left, EdgePosition::Left);
            piece.angle = saved.angle & 0x03;
            piece.mirror = if saved.mirror < 0 { -1 } else { 1 };
            piece.group = k;
            piece.finished = false;
            self.pieces.calculate_corners(i);
        }

        for i in 0..self.pieces.len() {
            self.restore_edges(i);
        }
        self.pieces.count_groups();
        true
    }

    // ------------------------------------------------------------------------
    // Slot games (sliding, swap, exchange)
    // ------------------------------------------------------------------------

    /// Rebuild every piece from the permutation: slot `i` shows original
    /// cell `order[i]`, untransformed and flat.
    pub fn regenerate_from_order(&mut self) {
        let cols = self.cols();
        for i in 0..self.pieces.len() {
            let (row, col) = (i / cols, i % cols);
            let original = self.order.get(i).copied().unwrap_or(i);
            let (orow, ocol) = (original / cols, original % cols);

            let piece = &mut self.pieces.pieces[i];
            piece.original_row = orow;
            piece.original_col = ocol;
            piece.top = EdgeId::FLAT_TOP;
            piece.bottom = EdgeId::FLAT_BOTTOM;
            piece.left = EdgeId::FLAT_LEFT;
            piece.right = EdgeId::FLAT_RIGHT;
            piece.angle = 0;
            piece.mirror = 1;
            piece.overlap = false;
            piece.finished = false;
            piece.group = i;
            for (plane, p) in piece.planes.iter_mut().enumerate() {
                let slot = self.grid.cell(row, col, plane);
                let home = self.grid.cell(orow, ocol, plane);
                *p = PieceInPlane {
                    original_x: home.x,
                    original_y: home.y,
                    actual_x: slot.x,
                    actual_y: slot.y,
                    width: slot.width,
                    lines: slot.lines,
                };
            }
            piece.set_home();
        }
        self.pieces.count_groups();
        self.pieces.calculate_all_corners();
    }

    /// Whether slots `a` and `b` touch horizontally or vertically.
    pub fn slots_adjacent(&self, a: usize, b: usize) -> bool {
        let cols = self.cols();
        (a == b + 1 && a % cols != 0) || (b == a + 1 && b % cols != 0) || a == b + cols || b == a + cols
    }

    /// Click on slot `pos`: select, deselect, or exchange with the selection.
    pub fn click_slot(&mut self, pos: usize) -> SlotAction {
        if pos >= self.order.len() {
            return SlotAction::Ignored;
        }
        match self.selected {
            None => {
                self.selected = Some(pos);
                SlotAction::Selected(pos)
            }
            Some(sel) if sel == pos && !self.params.blackslot => {
                self.selected = None;
                SlotAction::Deselected
            }
            Some(sel) if sel != pos && (self.slots_adjacent(sel, pos) || !self.params.near) => {
                self.order.swap(sel, pos);
                self.regenerate_from_order();
                self.selected = if self.params.blackslot { Some(pos) } else { None };
                self.finished = Self::is_finished(&self.order);
                SlotAction::Swapped { from: sel, to: pos }
            }
            Some(_) => SlotAction::Ignored,
        }
    }

    /// Cut and shuffle again without re-baking the geometry.
    pub fn reshuffle(&mut self) -> Result<()> {
        self.bake_piece()?;
        self.solve_acc_loop = 0;
        self.tmp_done_count = 0;
        self.done_count = 0;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Jigsaw interaction
    // ------------------------------------------------------------------------

    /// Pick up piece `i`: its group moves to the front and loses its
    /// finished flags. The picked piece ends up at index 0.
    pub fn start_drag(&mut self, i: usize) -> Result<()> {
        self.piece_foreground(i)?;
        let Some(group) = self.pieces.pieces.first().map(|p| p.group) else {
            return Ok(());
        };
        for piece in self.pieces.pieces.iter_mut() {
            if piece.group != group {
                break;
            }
            piece.finished = false;
        }
        Ok(())
    }

    /// Move the group of the first piece flagged as overlapping so that it
    /// is centered on `(x, y)`.
    pub fn place_overlapping(&mut self, x: i32, y: i32) -> bool {
        let Some(i) = self.pieces.iter().position(|p| p.overlap) else {
            return false;
        };
        let center = self.pieces.pieces[i].center;
        self.pieces.move_group(i, x - center.x, y - center.y);
        self.pieces.pieces[i].overlap = false;
        true
    }

    /// Turn every member of piece `i`'s group about piece `i`'s center.
    pub fn rotate_group(&mut self, i: usize, steps: i8, avoid_mirror: bool) {
        let Some(anchor) = self.pieces.pieces.get(i) else {
            return;
        };
        let (group, center) = (anchor.group, anchor.center);
        for j in 0..self.pieces.len() {
            if self.pieces.pieces[j].group == group {
                self.pieces.rotate_piece(j, steps, center.x, center.y, avoid_mirror);
            }
        }
    }

    /// Change the auto process speeds. Jigsaw mode only; other modes keep
    /// them at zero.
    pub fn set_speeds(&mut self, auto_shuffle: u32, auto_solve: u32, now: Duration) {
        if !self.params.advanced {
            return;
        }
        if auto_shuffle != self.params.auto_shuffle_speed {
            self.params.auto_shuffle_speed = auto_shuffle;
            self.auto_shuffle.rearm(auto_shuffle, now, &mut self.rng);
        }
        if auto_solve != self.params.auto_solve_speed {
            self.params.auto_solve_speed = auto_solve;
            self.auto_solve.rearm(auto_solve, now, &mut self.rng);
        }
    }

    /// Whether this board was baked for pictures shaped like `picture`.
    pub fn fits(&self, picture: &Picture) -> bool {
        self.desk.len() == picture.planes.len()
            && self
                .desk
                .iter()
                .zip(&picture.planes)
                .all(|(geo, buf)| geo.width == buf.width() as i32 && geo.lines == buf.lines() as i32)
    }

    pub fn status(&self) -> BoardStatus {
        BoardStatus {
            mode: self.params.mode,
            rows: self.params.rows,
            cols: self.params.cols,
            rotation: self.params.rotation,
            finished: self.finished,
            selected: self.selected,
            order: self.order.clone(),
            groups: (0..self.pieces.len()).filter(|&g| self.pieces.group_size(g) > 0).count(),
            finished_pieces: self.pieces.iter().filter(|p| p.finished).count(),
        }
    }
}

/// Snapshot of the game state for hosts and tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardStatus {
    pub mode: GameMode,
    pub rows: u32,
    pub cols: u32,
    pub rotation: RotationMode,
    pub finished: bool,
    pub selected: Option<usize>,
    pub order: Vec<usize>,
    pub groups: usize,
    pub finished_pieces: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PuzzleConfig;
    use crate::picture::ChromaFormat;

    fn config(mode: GameMode, rows: u32, cols: u32) -> PuzzleConfig {
        PuzzleConfig {
            rows,
            cols,
            mode,
            ..PuzzleConfig::default()
        }
    }

    fn board_with(config: &PuzzleConfig, width: usize, height: usize, seed: u64) -> Board {
        let picture = Picture::new(ChromaFormat::I420, width, height).unwrap();
        let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
        let curves = random_curves(&mut rng).unwrap();
        Board::with_seed(BoardParams::derive(config), &picture, &picture, &curves, seed).unwrap()
    }

    fn board(mode: GameMode, rows: u32, cols: u32, seed: u64) -> Board {
        board_with(&config(mode, rows, cols), 240, 180, seed)
    }

    fn inversion_parity_even(order: &[usize], cols: usize) -> bool {
        let blank = order.len() - 1;
        let mut d = 0;
        for i in 0..order.len() {
            if order[i] == blank {
                d += i / cols + 1;
                continue;
            }
            for j in i + 1..order.len() {
                if order[j] != blank && order[i] > order[j] {
                    d += 1;
                }
            }
        }
        d % 2 == 0
    }

    fn place_home(board: &mut Board, i: usize) {
        let home = board.pieces.pieces[i].home;
        board.pieces.pieces[i].angle = 0;
        board.pieces.pieces[i].mirror = 1;
        board.pieces.pieces[i].set_actual(home.left, home.top);
        board.pieces.calculate_corners(i);
    }

    fn index_of(board: &Board, row: usize, col: usize) -> usize {
        board
            .pieces
            .iter()
            .position(|p| p.original_row == row && p.original_col == col)
            .unwrap()
    }

    #[test]
    fn adjacent_edges_interlock() {
        for (rows, cols) in [(2, 2), (3, 5), (6, 4)] {
            for seed in 0..4 {
                let b = board(GameMode::Jigsaw, rows, cols, seed);
                assert!(b.shapes().is_some());
                for p in b.pieces.iter() {
                    if p.original_col + 1 < cols as usize {
                        let q = &b.pieces.pieces[index_of(&b, p.original_row, p.original_col + 1)];
                        assert_eq!(q.left.index(), (p.right.index() - 6) ^ 1);
                        assert!(!p.right.is_flat());
                    } else {
                        assert_eq!(p.right, EdgeId::FLAT_RIGHT);
                    }
                    if p.original_row + 1 < rows as usize {
                        let q = &b.pieces.pieces[index_of(&b, p.original_row + 1, p.original_col)];
                        assert_eq!(q.top.index(), (p.bottom.index() - 2) ^ 1);
                    } else {
                        assert_eq!(p.bottom, EdgeId::FLAT_BOTTOM);
                    }
                    if p.original_col == 0 {
                        assert_eq!(p.left, EdgeId::FLAT_LEFT);
                    }
                    if p.original_row == 0 {
                        assert_eq!(p.top, EdgeId::FLAT_TOP);
                    }
                }
            }
        }
    }

    #[test]
    fn sliding_shuffles_are_solvable_and_never_solved() {
        let mut b = board(GameMode::Sliding, 4, 4, 42);
        for _ in 0..1000 {
            b.shuffle().unwrap();
            assert!(inversion_parity_even(b.order(), 4));
            assert!(!Board::is_finished(b.order()));
            let blank = b.order().iter().position(|&o| o == 15);
            assert_eq!(b.selected(), blank);
        }
    }

    #[test]
    fn validity_only_applies_to_sliding_mode() {
        assert!(Board::is_valid(&[1, 0, 2, 3], 2, false));
        assert!(!Board::is_valid(&[1, 0, 2, 3], 2, true));
        assert!(Board::is_valid(&[0, 1, 2, 3], 2, true));
        assert!(Board::is_finished(&[0, 1, 2]));
        assert!(!Board::is_finished(&[0, 2, 1]));
    }

    #[test]
    fn degenerate_boards_do_not_hang() {
        let b = board(GameMode::Sliding, 1, 1, 3);
        assert_eq!(b.order(), &[0]);
        let b = board(GameMode::Sliding, 1, 2, 3);
        assert_eq!(b.piece_count(), 2);
    }

    #[test]
    fn three_by_three_scenario() {
        let mut b = board_with(&config(GameMode::Exchange, 3, 3), 90, 90, 9);
        b.shuffle().unwrap();
        b.bake_piece().unwrap();

        assert_eq!(b.piece_count(), 9);
        assert!(!Board::is_finished(b.order()));
        assert!(!b.finished());
        let mut seen = [false; 9];
        for (slot, p) in b.pieces.iter().enumerate() {
            let id = p.original_row * 3 + p.original_col;
            assert!(id < 9);
            assert!(!seen[id]);
            seen[id] = true;
            assert_eq!(b.pieces.group_size(p.group), 1);
            assert_eq!(p.finished, slot == id);
        }

        let a = index_of(&b, 0, 0);
        let c = index_of(&b, 0, 1);
        let (pa, pc) = (b.pieces.pieces[a].clone(), b.pieces.pieces[c].clone());
        b.pieces.move_group(c, pa.tr.x + 1 - pc.tl.x, pa.tr.y - pc.tl.y);
        for _ in 0..9 {
            b.solve_pces_group();
        }
        let (a, c) = (index_of(&b, 0, 0), index_of(&b, 0, 1));
        assert_eq!(b.pieces.pieces[a].group, b.pieces.pieces[c].group);

        let (before_a, before_c) = (b.pieces.pieces[a].tl, b.pieces.pieces[c].tl);
        b.pieces.move_group(a, 7, -4);
        assert_eq!(b.pieces.pieces[a].tl, Pos::new(before_a.x + 7, before_a.y - 4));
        assert_eq!(b.pieces.pieces[c].tl, Pos::new(before_c.x + 7, before_c.y - 4));
    }

    #[test]
    fn mated_fill_runs_cover_a_solved_board_once() {
        let cfg = PuzzleConfig {
            border: 0,
            ..config(GameMode::Jigsaw, 3, 3)
        };
        let (width, height) = (240_usize, 180_usize);
        for seed in [3, 17] {
            let mut b = board_with(&cfg, width, height, seed);
            for i in 0..b.piece_count() {
                place_home(&mut b, i);
            }
            let shapes = b.shapes().unwrap();

            let mut covered = vec![0u8; width * height];
            for piece in b.pieces.iter() {
                let p = piece.luma();
                let walked = crate::draw::for_each_fill_run(piece, 0, shapes, |y, start, run| {
                    for x in start..start + run {
                        let (dx, dy) = (p.actual_x + x, p.actual_y + y);
                        if dx >= 0 && dy >= 0 && (dx as usize) < width && (dy as usize) < height {
                            covered[dy as usize * width + dx as usize] += 1;
                        }
                    }
                });
                assert!(walked);
            }

            // tabs and notches of mated edges only disagree on the rounded
            // boundary pixel of each crossing
            let once = covered.iter().filter(|&&c| c == 1).count();
            assert!(covered.iter().all(|&c| c <= 2), "seed {}", seed);
            assert!(once * 100 >= width * height * 96, "seed {}: {} of {} pixels covered once", seed, once, width * height);
        }
    }

    #[test]
    fn joined_edges_become_flat() {
        let mut b = board(GameMode::Jigsaw, 2, 2, 5);
        let a = index_of(&b, 0, 0);
        let c = index_of(&b, 0, 1);
        place_home(&mut b, a);
        place_home(&mut b, c);
        for _ in 0..8 {
            b.solve_pces_group();
        }
        let (a, c) = (index_of(&b, 0, 0), index_of(&b, 0, 1));
        assert_eq!(b.pieces.pieces[a].group, b.pieces.pieces[c].group);
        assert_eq!(b.pieces.pieces[a].right, EdgeId::FLAT_RIGHT);
        assert_eq!(b.pieces.pieces[c].left, EdgeId::FLAT_LEFT);
    }

    #[test]
    fn finished_groups_do_not_drift() {
        let mut b = board(GameMode::Jigsaw, 3, 3, 8);
        for i in 0..b.piece_count() {
            place_home(&mut b, i);
            let tl = b.pieces.pieces[i].tl;
            b.pieces.pieces[i].set_actual(tl.x + 2, tl.y - 1);
            b.pieces.calculate_corners(i);
        }
        for _ in 0..b.piece_count() + 1 {
            b.solve_pces_accuracy();
        }
        let snapped: Vec<_> = b.pieces.iter().map(|p| (p.tl, p.br, p.planes.clone())).collect();
        for p in b.pieces.iter() {
            assert_eq!(p.tl, Pos::new(p.home.left, p.home.top));
        }

        for _ in 0..3 * b.piece_count() {
            b.solve_pces_accuracy();
        }
        let again: Vec<_> = b.pieces.iter().map(|p| (p.tl, p.br, p.planes.clone())).collect();
        assert_eq!(snapped, again);
        assert!(b.finished());
        assert_eq!(b.done_count(), 9);
    }

    #[test]
    fn sort_layers_puts_lone_pieces_first_and_finished_last() {
        let mut b = board(GameMode::Jigsaw, 2, 3, 4);
        // pieces 0 and 1 form a group, piece 2 is finished
        let g = b.pieces.pieces[0].group;
        b.pieces.pieces[1].group = g;
        b.pieces.pieces[2].finished = true;
        for i in 3..6 {
            b.pieces.pieces[i].finished = false;
        }
        b.pieces.pieces[0].finished = false;
        b.pieces.pieces[1].finished = false;
        b.count_pce_group();
        let ids: Vec<_> = b.pieces.iter().map(|p| p.original_index(3)).collect();

        b.sort_layers().unwrap();
        let sorted: Vec<_> = b.pieces.iter().map(|p| p.original_index(3)).collect();
        assert_eq!(sorted, vec![ids[3], ids[4], ids[5], ids[2], ids[0], ids[1]]);
    }

    #[test]
    fn sort_layers_out_of_memory_keeps_draw_order() {
        let mut b = board(GameMode::Jigsaw, 2, 3, 4);
        let ids: Vec<_> = b.pieces.iter().map(|p| p.original_index(3)).collect();
        for k in 0..3 {
            let mut budget = AllocBudget::limited(k);
            let err = b.sort_layers_with(&mut budget).unwrap_err();
            assert!(matches!(err, PuzzleError::OutOfMemory { .. }));
            assert_eq!(budget.granted(), k);
            let now: Vec<_> = b.pieces.iter().map(|p| p.original_index(3)).collect();
            assert_eq!(now, ids);
        }
        assert!(b.sort_layers_with(&mut AllocBudget::limited(3)).is_ok());
        assert_eq!(b.pieces.len(), 6);
    }

    #[test]
    fn auto_solve_places_one_group() {
        let cfg = PuzzleConfig {
            auto_solve_speed: 30000,
            ..config(GameMode::Jigsaw, 3, 3)
        };
        let mut b = board_with(&cfg, 240, 180, 12);
        for p in b.pieces.pieces.iter_mut() {
            p.finished = false;
        }
        b.rearm_timers(Duration::ZERO);
        assert!(b.auto_solve(Duration::from_secs(60)));

        let at_home = b
            .pieces
            .iter()
            .filter(|p| p.tl == Pos::new(p.luma().original_x, p.luma().original_y) && p.angle == 0)
            .count();
        assert!(at_home >= 1);
    }

    #[test]
    fn auto_shuffle_releases_a_grouped_piece() {
        let cfg = PuzzleConfig {
            auto_shuffle_speed: 30000,
            ..config(GameMode::Jigsaw, 3, 3)
        };
        let mut b = board_with(&cfg, 240, 180, 13);
        for i in 0..b.piece_count() {
            b.pieces.pieces[i].group = 0;
        }
        b.count_pce_group();
        b.rearm_timers(Duration::ZERO);
        assert!(b.auto_shuffle(Duration::from_secs(60)));
        b.count_pce_group();

        let released: Vec<_> = b.pieces.iter().filter(|p| p.group != 0).collect();
        assert_eq!(released.len(), 1);
        assert_eq!(b.pieces.group_size(released[0].group), 1);
    }

    #[test]
    fn auto_processes_stay_idle_below_minimum_speed() {
        let mut b = board(GameMode::Jigsaw, 3, 3, 1);
        b.rearm_timers(Duration::ZERO);
        assert!(!b.auto_solve(Duration::from_secs(3600)));
        assert!(!b.auto_shuffle(Duration::from_secs(3600)));
    }

    #[test]
    fn save_and_load_restore_positions() {
        let cfg = PuzzleConfig {
            rotation: RotationMode::Quarter,
            ..config(GameMode::Jigsaw, 3, 4)
        };
        let mut b = board_with(&cfg, 240, 180, 21);
        let save = b.save().unwrap();
        let before: Vec<_> = b.pieces.iter().map(|p| (p.original_row, p.original_col, p.luma(), p.angle)).collect();

        for i in 0..b.piece_count() {
            b.pieces.move_group(i, 13, 9);
        }
        assert!(b.load(&save));

        for (row, col, luma, angle) in before {
            let p = &b.pieces.pieces[index_of(&b, row, col)];
            assert!((p.luma().actual_x - luma.actual_x).abs() <= 1);
            assert!((p.luma().actual_y - luma.actual_y).abs() <= 1);
            assert_eq!(p.angle, angle);
        }
        let json = save.to_json().unwrap();
        assert_eq!(SaveGame::from_json(&json).unwrap(), save);
    }

    #[test]
    fn mismatched_save_is_ignored() {
        let small = board(GameMode::Jigsaw, 3, 3, 2);
        let save = small.save().unwrap();
        let mut big = board(GameMode::Jigsaw, 4, 4, 2);
        let before: Vec<_> = big.pieces.iter().map(|p| p.luma()).collect();
        assert!(!big.load(&save));
        let after: Vec<_> = big.pieces.iter().map(|p| p.luma()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn jigsaw_save_is_ignored_by_slot_games() {
        let jigsaw = board(GameMode::Jigsaw, 2, 2, 8);
        let save = jigsaw.save().unwrap();
        for mode in [GameMode::Sliding, GameMode::Swap, GameMode::Exchange] {
            let mut slots = board(mode, 2, 2, 8);
            let order = slots.order().to_vec();
            let before: Vec<_> = slots.pieces.iter().map(|p| (p.luma(), p.top, p.bottom, p.left, p.right)).collect();
            assert!(!slots.load(&save));
            let after: Vec<_> = slots.pieces.iter().map(|p| (p.luma(), p.top, p.bottom, p.left, p.right)).collect();
            assert_eq!(before, after);
            assert_eq!(slots.order(), &order[..]);
        }
    }

    #[test]
    fn load_flattens_edges_saved_on_the_wrong_side() {
        let mut b = board(GameMode::Jigsaw, 3, 3, 12);
        let mut save = b.save().unwrap();
        let stray = EdgeId::bezier(EdgePosition::Left, 3, Polarity::Negative);
        for saved in &mut save.pieces {
            saved.top = stray;
        }
        assert!(b.load(&save));
        for p in b.pieces.iter() {
            assert_eq!(p.top.position, EdgePosition::Top);
            assert_eq!(p.bottom.position, EdgePosition::Bottom);
            assert_eq!(p.left.position, EdgePosition::Left);
            assert_eq!(p.right.position, EdgePosition::Right);
        }
    }

    #[test]
    fn swap_mode_only_exchanges_neighbours() {
        let mut b = board(GameMode::Swap, 3, 3, 6);
        let order = b.order().to_vec();
        assert_eq!(b.click_slot(0), SlotAction::Selected(0));
        assert_eq!(b.click_slot(8), SlotAction::Ignored);
        assert_eq!(b.click_slot(1), SlotAction::Swapped { from: 0, to: 1 });
        assert_eq!(b.order()[0], order[1]);
        assert_eq!(b.order()[1], order[0]);
        assert_eq!(b.selected(), None);

        let p = &b.pieces.pieces[1];
        assert_eq!(p.original_row * 3 + p.original_col, order[0]);
        assert_eq!(p.tl, Pos::new(b.grid.cell(0, 1, 0).x, b.grid.cell(0, 1, 0).y));
    }

    #[test]
    fn exchange_mode_swaps_any_slots_and_deselects() {
        let mut b = board(GameMode::Exchange, 3, 3, 6);
        b.click_slot(4);
        assert_eq!(b.click_slot(4), SlotAction::Deselected);
        b.click_slot(0);
        assert_eq!(b.click_slot(8), SlotAction::Swapped { from: 0, to: 8 });
    }

    #[test]
    fn sliding_mode_moves_the_black_slot() {
        let mut b = board(GameMode::Sliding, 3, 3, 6);
        let blank = b.selected().unwrap();
        let target = if blank % 3 == 0 { blank + 1 } else { blank - 1 };
        assert_eq!(b.click_slot(blank), SlotAction::Ignored);
        assert_eq!(b.click_slot(target), SlotAction::Swapped { from: blank, to: target });
        assert_eq!(b.selected(), Some(target));
        assert_eq!(b.order()[target], 8);
    }

    #[test]
    fn slot_adjacency_does_not_wrap_rows() {
        let b = board(GameMode::Swap, 3, 3, 1);
        assert!(b.slots_adjacent(0, 1));
        assert!(b.slots_adjacent(4, 1));
        assert!(!b.slots_adjacent(2, 3));
        assert!(!b.slots_adjacent(0, 4));
    }

    #[test]
    fn dragging_brings_the_group_forward() {
        let mut b = board(GameMode::Jigsaw, 3, 3, 30);
        let g = b.pieces.pieces[5].group;
        b.pieces.pieces[7].group = g;
        b.pieces.pieces[5].finished = true;
        b.pieces.pieces[7].finished = true;
        b.count_pce_group();

        b.start_drag(7).unwrap();
        assert_eq!(b.pieces.pieces[0].group, g);
        assert_eq!(b.pieces.pieces[1].group, g);
        assert!(!b.pieces.pieces[0].finished);
        assert!(!b.pieces.pieces[1].finished);
        assert!(b.start_drag(99).is_err());
    }

    #[test]
    fn group_rotation_keeps_members_together() {
        let cfg = PuzzleConfig {
            rotation: RotationMode::Quarter,
            ..config(GameMode::Jigsaw, 2, 2)
        };
        let mut b = board_with(&cfg, 200, 200, 31);
        for i in 0..4 {
            b.pieces.pieces[i].angle = 0;
            b.pieces.pieces[i].mirror = 1;
            b.pieces.pieces[i].group = 0;
            b.pieces.calculate_corners(i);
        }
        b.count_pce_group();
        b.rotate_group(0, 1, true);
        assert!(b.pieces.iter().all(|p| p.angle == 1));
        b.rotate_group(0, -1, true);
        assert!(b.pieces.iter().all(|p| p.angle == 0));
    }

    #[test]
    fn overlapping_piece_is_moved_under_the_click() {
        let mut b = board(GameMode::Jigsaw, 3, 3, 32);
        for p in b.pieces.pieces.iter_mut() {
            p.overlap = false;
        }
        b.pieces.pieces[4].overlap = true;
        assert!(b.place_overlapping(100, 90));
        let p = &b.pieces.pieces[4];
        assert!(!p.overlap);
        assert!((p.center.x - 100).abs() <= 1);
        assert!((p.center.y - 90).abs() <= 1);
        assert!(!b.place_overlapping(10, 10));
    }

    #[test]
    fn status_reports_the_board() {
        let b = board(GameMode::Swap, 2, 3, 33);
        let status = b.status();
        assert_eq!(status.rows, 2);
        assert_eq!(status.cols, 3);
        assert_eq!(status.groups, 6);
        assert_eq!(status.order.len(), 6);
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"mode\":\"swap\""));
    }

    #[test]
    fn mismatched_pictures_are_rejected() {
        let input = Picture::new(ChromaFormat::I420, 64, 48).unwrap();
        let output = Picture::new(ChromaFormat::I420, 64, 50).unwrap();
        let result = Board::with_seed(BoardParams::default(), &input, &output, &[], 1);
        assert!(matches!(result, Err(PuzzleError::FormatMismatch { .. })));
    }
}

//! # Puzzle Filter
//!
//! Host-facing glue around [`Board`]: per-frame processing, mouse events,
//! option changes from a control thread, and the global filter registry.
//!
//! ```text
//!   control thread                     render thread
//!   FilterHandle ── Mutex<Control> ──► PuzzleFilter::filter_into
//!   (options, shuffle requests)          apply options ─► bake / shuffle
//!                                        ─► simulate ─► draw desk
//!   host mouse ───────────────────────► PuzzleFilter::mouse
//! ```
//!
//! Any error while baking or simulating passes the source frame through.

use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bezier::BezierCurve;
use crate::config::{BoardParams, PuzzleConfig, RotationMode};
use crate::draw::{self, DESK_COLOR, SELECTION_COLOR};
use crate::error::{PuzzleError, Result};
use crate::game::{random_curves, Board, SlotAction};
use crate::picture::{ChromaFormat, Picture};
use crate::piece::Pos;
use crate::save::SaveGame;
use crate::sign::{MIRROR_ARROW, ROTATE_ARROW, SHUFFLE_BUTTON};
use crate::timer::SlideAnimation;

pub const FILTER_NAME: &str = "puzzle";

/// Time a sliding move takes to complete.
const SLIDE_DURATION: Duration = Duration::from_millis(250);

// ============================================================================
// Filter interface
// ============================================================================

#[derive(Debug, Clone)]
pub struct FilterCapabilities {
    /// Empty means any format
    pub chroma: Vec<ChromaFormat>,
}

impl FilterCapabilities {
    pub fn any() -> Self {
        Self { chroma: Vec::new() }
    }

    pub fn supports(&self, chroma: ChromaFormat) -> bool {
        self.chroma.is_empty() || self.chroma.contains(&chroma)
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub picture: Picture,
    /// Presentation time
    pub pts: Duration,
}

pub trait VideoFilter: Send + Sync {
    fn name(&self) -> &str;
    fn capabilities(&self) -> FilterCapabilities;
    fn process_frame(&mut self, frame: Frame) -> Frame;
}

// ============================================================================
// Mouse
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseState {
    pub x: i32,
    pub y: i32,
    pub left: bool,
}

impl MouseState {
    pub fn new(x: i32, y: i32, left: bool) -> Self {
        Self { x, y, left }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseOutcome {
    /// Outside the picture
    Ignored,
    /// Not used by the game, the host may pass it on
    Forward,
    /// Used by the game
    Consumed,
}

/// What a click without motion does to the hovered group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MouseAction {
    #[default]
    None,
    Half,
    Clockwise,
    CounterClockwise,
    Mirror,
}

impl MouseAction {
    /// Quarter turns passed to the rotation routine.
    pub fn steps(self) -> i8 {
        match self {
            Self::None => 0,
            Self::Half => 2,
            Self::Clockwise => 1,
            Self::CounterClockwise => -1,
            Self::Mirror => 4,
        }
    }

    /// Action for a click at `mouse_x` on piece `i`.
    fn for_piece(board: &Board, i: usize, mouse_x: i32) -> Self {
        let rotation = board.params().rotation;
        let Some(piece) = board.pieces().pieces.get(i) else {
            return Self::None;
        };
        let desk = board.desk_planes().first().copied().unwrap_or_default();
        let delta = match (rotation, piece.angle & 1) {
            (RotationMode::QuarterMirror, 0) => desk.pce_max_width / 6,
            (RotationMode::QuarterMirror, _) => desk.pce_max_lines / 6,
            _ => 0,
        };
        match rotation {
            RotationMode::None => Self::None,
            RotationMode::Half => Self::Half,
            _ if mouse_x >= piece.center.x + delta => Self::CounterClockwise,
            _ if mouse_x <= piece.center.x - delta => Self::Clockwise,
            _ => Self::Mirror,
        }
    }
}

// ============================================================================
// Control state
// ============================================================================

#[derive(Debug, Default)]
struct Control {
    config: PuzzleConfig,
    changed: bool,
    shuffle_requested: bool,
}

/// Cloneable handle for changing options from another thread. Changes are
/// picked up at the start of the next frame.
#[derive(Debug, Clone)]
pub struct FilterHandle {
    control: Arc<Mutex<Control>>,
}

impl FilterHandle {
    pub fn reconfigure(&self, config: PuzzleConfig) {
        let mut control = self.control.lock();
        control.config = config.sanitized();
        control.changed = true;
    }

    /// Change one named option, as in an option chain.
    pub fn set_option(&self, key: &str, value: &str) -> Result<()> {
        let mut control = self.control.lock();
        let mut config = control.config.clone();
        config.set_option(key, value)?;
        control.config = config.sanitized();
        control.changed = true;
        Ok(())
    }

    pub fn request_shuffle(&self) {
        self.control.lock().shuffle_requested = true;
    }

    pub fn config(&self) -> PuzzleConfig {
        self.control.lock().config.clone()
    }
}

/// Piece sliding into the previous black slot.
#[derive(Debug, Clone, Copy)]
struct Slide {
    piece: usize,
    /// Unit vector from the new position back to the old one
    dir: (i32, i32),
    animation: SlideAnimation,
}

impl Slide {
    fn offset(&self) -> (i32, i32) {
        let remaining = self.animation.remaining();
        (self.dir.0 * remaining, self.dir.1 * remaining)
    }
}

enum Prepared {
    Ready,
    /// A bake happened this frame; the source is shown unchanged
    Baked,
}

// ============================================================================
// Puzzle filter
// ============================================================================

pub struct PuzzleFilter {
    control: Arc<Mutex<Control>>,
    /// Options the current board was built from
    config: PuzzleConfig,
    curves: Vec<BezierCurve>,
    rng: StdRng,
    board: Option<Board>,
    rebake_pending: bool,

    frame_size: Option<(i32, i32)>,
    mouse: MouseState,
    drag: bool,
    moved: bool,
    hovered: Option<usize>,
    action: MouseAction,
    preview_pos: u8,
    slide: Option<Slide>,

    last_time: Option<Duration>,
    started: Instant,
}

impl PuzzleFilter {
    pub fn new(config: PuzzleConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_rng(&mut rand::rng()))
    }

    /// Deterministic filter: the same seed, frames and mouse events give
    /// the same game.
    pub fn with_seed(config: PuzzleConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    pub fn from_chain(chain: &str) -> Result<Self> {
        Self::new(PuzzleConfig::from_chain(chain)?)
    }

    fn with_rng(config: PuzzleConfig, mut rng: StdRng) -> Result<Self> {
        let config = config.sanitized();
        let curves = random_curves(&mut rng)?;
        tracing::info!(
            "Puzzle filter ready: {} {}x{}, rotation {:?}",
            config.mode.label(),
            config.rows,
            config.cols,
            config.rotation
        );

        Ok(Self {
            control: Arc::new(Mutex::new(Control {
                config: config.clone(),
                changed: false,
                shuffle_requested: false,
            })),
            config,
            curves,
            rng,
            board: None,
            rebake_pending: false,
            frame_size: None,
            mouse: MouseState::default(),
            drag: false,
            moved: false,
            hovered: None,
            action: MouseAction::None,
            preview_pos: 0,
            slide: None,
            last_time: None,
            started: Instant::now(),
        })
    }

    pub fn handle(&self) -> FilterHandle {
        FilterHandle {
            control: Arc::clone(&self.control),
        }
    }

    /// Queue `config` for the next frame.
    pub fn reconfigure(&self, config: PuzzleConfig) {
        self.handle().reconfigure(config);
    }

    pub fn config(&self) -> &PuzzleConfig {
        &self.config
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    /// Piece under the mouse as of the last frame.
    pub fn hovered_piece(&self) -> Option<usize> {
        self.hovered
    }

    pub fn dragging(&self) -> bool {
        self.drag
    }

    pub fn sliding(&self) -> bool {
        self.slide.is_some()
    }

    pub fn preview_position(&self) -> u8 {
        self.preview_pos
    }

    pub fn save(&self) -> Result<SaveGame> {
        self.board.as_ref().ok_or(PuzzleError::NotBaked)?.save()
    }

    pub fn load(&mut self, save: &SaveGame) -> Result<bool> {
        Ok(self.board.as_mut().ok_or(PuzzleError::NotBaked)?.load(save))
    }

    // ------------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------------

    /// Process one frame, timed by the wall clock.
    pub fn filter(&mut self, input: &Picture) -> Result<Picture> {
        let now = self.started.elapsed();
        self.filter_at(input, now)
    }

    /// Process one frame at time `now`.
    pub fn filter_at(&mut self, input: &Picture, now: Duration) -> Result<Picture> {
        if let Err(e) = input.check_supported() {
            tracing::warn!("Puzzle cannot draw this frame, passing it through: {}", e);
            return Ok(input.clone());
        }
        let mut output = Picture::new(input.chroma, input.width(), input.height())?;
        self.filter_into(input, &mut output, now)?;
        Ok(output)
    }

    /// Draw the desk for `input` into `output`. Fails only when both
    /// pictures differ in geometry; every other failure degrades to a copy
    /// of the source.
    pub fn filter_into(&mut self, input: &Picture, output: &mut Picture, now: Duration) -> Result<()> {
        if !input.same_geometry(output) {
            return Err(PuzzleError::FormatMismatch {
                input_width: input.width(),
                input_height: input.height(),
                output_width: output.width(),
                output_height: output.height(),
            });
        }
        if let Err(e) = input.check_supported().and_then(|_| output.check_supported()) {
            tracing::warn!("Puzzle cannot draw this frame, passing it through: {}", e);
            output.copy_from(input);
            return Ok(());
        }
        self.frame_size = Some((input.width() as i32, input.height() as i32));
        let dt = self.last_time.map_or(Duration::ZERO, |last| now.saturating_sub(last));
        self.last_time = Some(now);

        match self.prepare(input, output, now) {
            Ok(Prepared::Ready) => {}
            Ok(Prepared::Baked) => {
                output.copy_from(input);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("Puzzle bake failed, passing frame through: {}", e);
                output.copy_from(input);
                return Ok(());
            }
        }

        let Some(board) = self.board.as_mut() else {
            output.copy_from(input);
            return Ok(());
        };
        if board.finished() {
            output.copy_from(input);
        } else {
            draw::preset_background(output, DESK_COLOR);
        }
        if board.params().advanced && !self.drag {
            if let Err(e) = board.manage(now) {
                tracing::warn!("Puzzle simulation failed, passing frame through: {}", e);
                output.copy_from(input);
                return Ok(());
            }
        }

        if let Some(slide) = self.slide.as_mut() {
            slide.animation.advance(dt);
            if slide.animation.done() {
                self.slide = None;
            }
        }
        self.render(input, output);
        Ok(())
    }

    /// Apply pending options and requests; bake when needed.
    fn prepare(&mut self, input: &Picture, output: &Picture, now: Duration) -> Result<Prepared> {
        let (changed, shuffle) = {
            let mut control = self.control.lock();
            let changed = control.changed.then(|| control.config.clone());
            control.changed = false;
            (changed, std::mem::take(&mut control.shuffle_requested))
        };

        let mut full = self.board.as_ref().map_or(true, |b| !b.fits(output));
        let mut keep = self.rebake_pending;
        let mut speeds = None;

        if let Some(config) = changed {
            let old = BoardParams::derive(&self.config);
            let new = BoardParams::derive(&config);
            if old.rows != new.rows || old.cols != new.cols || old.rotation != new.rotation || old.mode != new.mode {
                full = true;
            } else if old.border != new.border
                || old.shape_size != new.shape_size
                || old.preview != new.preview
                || old.preview_size != new.preview_size
            {
                keep = true;
            }
            if old.auto_shuffle_speed != new.auto_shuffle_speed || old.auto_solve_speed != new.auto_solve_speed {
                speeds = Some((new.auto_shuffle_speed, new.auto_solve_speed));
            }
            tracing::debug!("Puzzle options changed: {:?}", config);
            self.config = config;
        }

        if full {
            self.board = None;
            let board = self.bake(input, output)?;
            self.install(board, now);
            return Ok(Prepared::Baked);
        }

        if keep {
            self.rebake_pending = true;
            let save = self.board.as_ref().ok_or(PuzzleError::NotBaked)?.save()?;
            let mut board = self.bake(input, output)?;
            if board.params().advanced {
                board.load(&save);
            }
            self.install(board, now);
            return Ok(Prepared::Baked);
        }

        if let Some(board) = self.board.as_mut() {
            if let Some((auto_shuffle, auto_solve)) = speeds {
                board.set_speeds(auto_shuffle, auto_solve, now);
            }
            if shuffle {
                board.reshuffle()?;
                self.slide = None;
                tracing::info!("Puzzle shuffled");
            }
        }
        Ok(Prepared::Ready)
    }

    fn bake(&mut self, input: &Picture, output: &Picture) -> Result<Board> {
        let params = BoardParams::derive(&self.config);
        Board::bake(params, input, output, &self.curves, StdRng::from_rng(&mut self.rng))
    }

    fn install(&mut self, mut board: Board, now: Duration) {
        board.rearm_timers(now);
        self.board = Some(board);
        self.rebake_pending = false;
        self.drag = false;
        self.moved = false;
        self.hovered = None;
        self.slide = None;
    }

    fn render(&mut self, input: &Picture, output: &mut Picture) {
        let Some(board) = self.board.as_mut() else {
            return;
        };
        let mouse = Pos::new(self.mouse.x, self.mouse.y);
        let params = board.params().clone();

        draw::draw_borders(board, input, output);

        let slide = self.slide.map(|s| (s.piece, s.offset()));
        if let Some((piece, (dx, dy))) = slide {
            shift_piece(board, piece, dx, dy);
        }

        let pointed = draw::draw_pieces(board, input, output, Some(mouse));
        self.hovered = pointed.or_else(|| board.pieces().find_piece(mouse.x, mouse.y, None));

        if params.preview {
            draw::draw_preview(board, self.preview_pos, input, output);
        }

        if let Some(selected) = board.selected().filter(|_| !params.advanced) {
            let cols = params.cols.max(1) as usize;
            let cell = board.grid().cell(selected / cols, selected % cols, 0);
            if params.blackslot {
                draw::fill_rectangle(output, cell.x, cell.y, cell.width, cell.lines, DESK_COLOR);
            } else {
                draw::draw_rectangle(output, cell.x, cell.y, cell.width, cell.lines, SELECTION_COLOR);
            }
        }

        if let Some((piece, (dx, dy))) = slide {
            if let Some(moving) = board.pieces().pieces.get(piece) {
                for (p, (src, dst)) in moving.planes.iter().zip(input.planes.iter().zip(output.planes.iter_mut())) {
                    draw::draw_basic_piece(src, dst, p);
                }
            }
            shift_piece(board, piece, -dx, -dy);
        }

        if board.finished() {
            draw::draw_sign(output, 0, 0, &SHUFFLE_BUTTON, false);
        }

        if let Some(i) = self.hovered.filter(|_| !self.drag && !board.finished() && params.advanced) {
            self.action = MouseAction::for_piece(board, i, mouse.x);
            let (x, y) = (mouse.x - ROTATE_ARROW.width, mouse.y);
            match self.action {
                MouseAction::Clockwise => draw::draw_sign(output, x, y, &ROTATE_ARROW, false),
                MouseAction::CounterClockwise => draw::draw_sign(output, x, y, &ROTATE_ARROW, true),
                MouseAction::Mirror => draw::draw_sign(output, x, y, &MIRROR_ARROW, false),
                MouseAction::None | MouseAction::Half => {}
            }
        }
    }

    // ------------------------------------------------------------------------
    // Mouse
    // ------------------------------------------------------------------------

    pub fn mouse(&mut self, state: &MouseState) -> MouseOutcome {
        let prev = std::mem::replace(&mut self.mouse, *state);
        let Some((width, height)) = self.frame_size else {
            return MouseOutcome::Forward;
        };
        if state.x < 0 || state.x >= width || state.y < 0 || state.y >= height {
            return MouseOutcome::Ignored;
        }
        if self.control.lock().changed {
            return MouseOutcome::Forward;
        }
        let Some(board) = self.board.as_ref() else {
            return MouseOutcome::Forward;
        };

        let pressed = state.left && !prev.left;
        if board.finished() {
            self.drag = false;
            self.moved = false;
            if pressed && state.x < SHUFFLE_BUTTON.width && state.y < SHUFFLE_BUTTON.lines {
                self.control.lock().shuffle_requested = true;
                return MouseOutcome::Consumed;
            }
            return MouseOutcome::Forward;
        }

        if board.params().advanced {
            self.jigsaw_mouse(state, &prev, width, height)
        } else {
            self.slot_mouse(state, pressed, width, height)
        }
    }

    fn slot_mouse(&mut self, state: &MouseState, pressed: bool, width: i32, height: i32) -> MouseOutcome {
        let Some(board) = self.board.as_mut() else {
            return MouseOutcome::Forward;
        };
        if !pressed {
            return MouseOutcome::Consumed;
        }

        let params = board.params();
        let (rows, cols, blackslot) = (params.rows.max(1) as i32, params.cols.max(1) as i32, params.blackslot);
        let bw = width * params.border as i32 / 100 / 2;
        let bh = height * params.border as i32 / 100 / 2;
        if state.x <= bw || state.y <= bh || state.x >= width - bw || state.y >= height - bh {
            return MouseOutcome::Forward;
        }

        let pos_x = (state.x - bw) * cols / (width - 2 * bw).max(1);
        let pos_y = (state.y - bh) * rows / (height - 2 * bh).max(1);
        let pos = (pos_y * cols + pos_x) as usize;
        self.hovered = Some(pos);

        match board.click_slot(pos) {
            SlotAction::Swapped { from, to } => {
                tracing::debug!("Slots {} and {} exchanged", from, to);
                if blackslot {
                    let cols = cols as usize;
                    let old = board.grid().cell(to / cols, to % cols, 0);
                    let new = board.grid().cell(from / cols, from % cols, 0);
                    let (dx, dy) = (old.x - new.x, old.y - new.y);
                    let distance = dx.abs() + dy.abs();
                    let speed = (distance as u128 * 1000 / SLIDE_DURATION.as_millis().max(1)) as u32;
                    self.slide = Some(Slide {
                        piece: from,
                        dir: (dx.signum(), dy.signum()),
                        animation: SlideAnimation::new(distance, speed),
                    });
                }
                if board.finished() {
                    tracing::info!("Puzzle solved");
                }
            }
            action => tracing::trace!("Slot click: {:?}", action),
        }
        MouseOutcome::Consumed
    }

    fn jigsaw_mouse(&mut self, state: &MouseState, prev: &MouseState, width: i32, height: i32) -> MouseOutcome {
        let Some(board) = self.board.as_mut() else {
            return MouseOutcome::Forward;
        };
        let pressed = state.left && !prev.left;
        let released = !state.left && prev.left;

        if pressed {
            if let Some(i) = self.hovered {
                if let Err(e) = board.start_drag(i) {
                    tracing::warn!("Cannot pick up piece {}: {}", i, e);
                    return MouseOutcome::Consumed;
                }
                self.hovered = Some(0);
                self.drag = true;
                self.moved = false;
            } else {
                board.place_overlapping(state.x, state.y);
                self.drag = false;
            }
        } else if released {
            if !self.moved && self.drag && board.params().rotation != RotationMode::None {
                board.rotate_group(0, self.action.steps(), self.action != MouseAction::Mirror);
            }
            self.drag = false;
            self.moved = false;
        } else {
            let next_corner = match self.preview_pos {
                0 => state.x < width / 2 && state.y < height / 2,
                1 => state.x > width / 2 && state.y < height / 2,
                2 => state.x > width / 2 && state.y > height / 2,
                _ => state.x < width / 2 && state.y > height / 2,
            };
            if next_corner {
                self.preview_pos = (self.preview_pos + 1) % 4;
            }

            if !state.left {
                self.drag = false;
            }
            let (dx, dy) = (state.x - prev.x, state.y - prev.y);
            if dx != 0 || dy != 0 {
                self.moved = true;
            }
            if self.drag {
                if state.x <= 0 || state.y <= 0 || state.x >= width || state.y >= height {
                    self.drag = false;
                    self.moved = true;
                } else if dx != 0 || dy != 0 {
                    if let Some(i) = self.hovered {
                        board.pieces_mut().move_group(i, dx, dy);
                    }
                }
            }
        }
        MouseOutcome::Consumed
    }
}

fn shift_piece(board: &mut Board, i: usize, dx: i32, dy: i32) {
    let pieces = board.pieces_mut();
    if let Some(piece) = pieces.pieces.get_mut(i) {
        piece.translate(dx, dy);
        pieces.calculate_corners(i);
    }
}

impl VideoFilter for PuzzleFilter {
    fn name(&self) -> &str {
        FILTER_NAME
    }

    fn capabilities(&self) -> FilterCapabilities {
        FilterCapabilities {
            chroma: ChromaFormat::ALL.to_vec(),
        }
    }

    fn process_frame(&mut self, frame: Frame) -> Frame {
        match self.filter_at(&frame.picture, frame.pts) {
            Ok(picture) => Frame { picture, pts: frame.pts },
            Err(e) => {
                tracing::warn!("Puzzle filter passed frame {:?} through: {}", frame.pts, e);
                frame
            }
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

type FilterFactory = dyn Fn(&str) -> Result<Box<dyn VideoFilter>> + Send + Sync;

#[derive(Debug, Clone)]
pub struct FilterDescriptor {
    pub name: String,
    pub description: String,
    pub capabilities: FilterCapabilities,
}

#[derive(Clone)]
struct RegisteredFilter {
    descriptor: FilterDescriptor,
    factory: Arc<FilterFactory>,
}

/// Filters a host can build by name from an option chain.
pub struct FilterRegistry {
    filters: Vec<RegisteredFilter>,
}

impl FilterRegistry {
    pub fn global() -> &'static RwLock<Self> {
        static REGISTRY: Lazy<RwLock<FilterRegistry>> = Lazy::new(|| RwLock::new(FilterRegistry::with_defaults()));
        &REGISTRY
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self { filters: Vec::new() };
        registry.register_filter(
            FILTER_NAME,
            "Interactive puzzle game video filter",
            FilterCapabilities {
                chroma: ChromaFormat::ALL.to_vec(),
            },
            |options| Ok(Box::new(PuzzleFilter::from_chain(options)?) as Box<dyn VideoFilter>),
        );
        registry
    }

    /// Register `factory` under `name`, replacing any filter of that name.
    pub fn register_filter(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        capabilities: FilterCapabilities,
        factory: impl Fn(&str) -> Result<Box<dyn VideoFilter>> + Send + Sync + 'static,
    ) {
        let descriptor = FilterDescriptor {
            name: name.into(),
            description: description.into(),
            capabilities,
        };
        self.filters.retain(|f| f.descriptor.name != descriptor.name);
        self.filters.push(RegisteredFilter {
            descriptor,
            factory: Arc::new(factory),
        });
    }

    pub fn list_filters(&self) -> Vec<FilterDescriptor> {
        self.filters.iter().map(|f| f.descriptor.clone()).collect()
    }

    pub fn build(&self, name: &str, options: &str) -> Result<Box<dyn VideoFilter>> {
        let entry = self
            .filters
            .iter()
            .find(|f| f.descriptor.name == name)
            .ok_or_else(|| PuzzleError::UnknownFilter(name.to_string()))?;
        (entry.factory)(options)
    }
}

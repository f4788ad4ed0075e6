//! # Puzzle Core
//!
//! Interactive puzzle game video filter. Each frame is cut into pieces
//! which are shuffled over a desk; the viewer reassembles the picture with
//! the mouse while the video keeps playing underneath.
//!
//! ```text
//!   PuzzleConfig ─► BoardParams ─► Board::bake ─► Board::manage ─► draw
//!                                  (planes, grid,   (snap, join,     (desk,
//!                                   shapes, cut)     layers, auto)    pieces)
//! ```
//!
//! Four games are available: exchange two slots, slide into the black
//! slot, swap neighbours, and free jigsaw with organic piece shapes.

// ============================================================================
// Configuration / Errors
// ============================================================================
pub mod config;
pub mod error;

// ============================================================================
// Geometry
// ============================================================================
pub mod bezier;
pub mod shape;
pub mod plane;
pub mod piece;

// ============================================================================
// Game
// ============================================================================
pub mod game;
pub mod save;
pub mod timer;

// ============================================================================
// Rendering / Host
// ============================================================================
pub mod picture;
pub mod draw;
pub mod sign;
pub mod filter;

pub use config::{BoardParams, GameMode, PuzzleConfig, RotationMode};
pub use error::{PuzzleError, Result};
pub use filter::{
    FilterHandle, FilterRegistry, Frame, MouseOutcome, MouseState, PuzzleFilter, VideoFilter, FILTER_NAME,
};
pub use game::{Board, BoardStatus, SlotAction};
pub use picture::{ChromaFormat, Picture};
pub use save::SaveGame;

//! # Puzzle Errors
//!
//! Error taxonomy shared by every stage of the filter. Nothing here is fatal
//! to the host: the filter glue turns any of these into a pass-through frame.

use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PuzzleError {
    #[error("Out of memory while allocating {what}")]
    OutOfMemory { what: &'static str },

    #[error("Unsupported chroma: {0}")]
    UnsupportedChroma(String),

    #[error("Plane {plane} does not hold its visible area")]
    InvalidPlane { plane: usize },

    #[error("Picture geometry mismatch: input {input_width}x{input_height}, output {output_width}x{output_height}")]
    FormatMismatch {
        input_width: usize,
        input_height: usize,
        output_width: usize,
        output_height: usize,
    },

    #[error("Invalid value '{value}' for option '{key}'")]
    InvalidOption { key: String, value: String },

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    #[error("Board is not baked")]
    NotBaked,

    #[error("Invalid piece index: {0}")]
    InvalidPiece(usize),

    #[error("Invalid edge shape id: {0}")]
    InvalidShape(u32),
}

pub type Result<T> = std::result::Result<T, PuzzleError>;

impl PuzzleError {
    pub fn oom(what: &'static str) -> impl FnOnce(TryReserveError) -> PuzzleError {
        move |_| PuzzleError::OutOfMemory { what }
    }
}

/// Allocate an empty vector with room for exactly `len` elements.
pub fn try_vec<T>(len: usize, what: &'static str) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(PuzzleError::oom(what))?;
    Ok(v)
}

/// Allocate a vector of `len` copies of `value`.
pub fn try_filled<T: Clone>(len: usize, value: T, what: &'static str) -> Result<Vec<T>> {
    let mut v = try_vec(len, what)?;
    v.resize(len, value);
    Ok(v)
}

// ============================================================================
// Allocation budget
// ============================================================================

/// Counts allocations made while building shape data.
///
/// The unlimited budget only forwards to the allocator. A limited budget
/// reports `OutOfMemory` once its allowance is spent, which lets callers
/// exercise the failure path of a multi-row build at an exact row.
#[derive(Debug, Clone, Default)]
pub struct AllocBudget {
    remaining: Option<usize>,
    granted: usize,
}

impl AllocBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Budget that grants `allocations` requests and fails the next one.
    pub fn limited(allocations: usize) -> Self {
        Self {
            remaining: Some(allocations),
            granted: 0,
        }
    }

    pub fn granted(&self) -> usize {
        self.granted
    }

    pub fn vec<T>(&mut self, len: usize, what: &'static str) -> Result<Vec<T>> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Err(PuzzleError::OutOfMemory { what });
            }
            *remaining -= 1;
        }
        let v = try_vec(len, what)?;
        self.granted += 1;
        Ok(v)
    }

    pub fn filled<T: Clone>(&mut self, len: usize, value: T, what: &'static str) -> Result<Vec<T>> {
        let mut v = self.vec(len, what)?;
        v.resize(len, value);
        Ok(v)
    }
}

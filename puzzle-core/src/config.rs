//! # Puzzle Configuration
//!
//! Host-facing options and the derived board parameters.
//!
//! ```text
//! "rows=3:cols=5:mode=jigsaw" ─► PuzzleConfig ─► sanitized() ─► BoardParams
//!        (option chain)           (host view)      (clamped)      (game view)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{PuzzleError, Result};
use crate::shape::PIECE_TYPE_NBR;

/// Option prefix used by hosts that namespace filter options.
pub const OPTION_PREFIX: &str = "puzzle-";

pub const MAX_ROWS: u32 = 42;
pub const MAX_COLS: u32 = 42;
pub const MAX_BORDER: u32 = 40;
pub const MAX_SPEED: u32 = 30000;

/// Speeds below this value disable auto shuffle / auto solve.
pub const MIN_ACTIVE_SPEED: u32 = 500;

// ============================================================================
// Modes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Free pieces with organic edges, snapping and rotation
    #[default]
    Jigsaw,
    /// Classic 15-puzzle with one black slot
    Sliding,
    /// Swap two adjacent slots
    Swap,
    /// Swap any two slots
    Exchange,
}

impl GameMode {
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Self::Jigsaw),
            1 => Some(Self::Sliding),
            2 => Some(Self::Swap),
            3 => Some(Self::Exchange),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Jigsaw => 0,
            Self::Sliding => 1,
            Self::Swap => 2,
            Self::Exchange => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Jigsaw => "jigsaw puzzle",
            Self::Sliding => "sliding puzzle",
            Self::Swap => "swap puzzle",
            Self::Exchange => "exchange puzzle",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "jigsaw" => Some(Self::Jigsaw),
            "sliding" => Some(Self::Sliding),
            "swap" => Some(Self::Swap),
            "exchange" => Some(Self::Exchange),
            other => other.parse::<i64>().ok().and_then(Self::from_index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    /// Pieces keep their orientation
    #[default]
    None,
    /// 0 or 180 degrees
    Half,
    /// Any quarter turn
    Quarter,
    /// Any quarter turn, plus horizontal mirror
    QuarterMirror,
}

impl RotationMode {
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Self::None),
            1 => Some(Self::Half),
            2 => Some(Self::Quarter),
            3 => Some(Self::QuarterMirror),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Half => 1,
            Self::Quarter => 2,
            Self::QuarterMirror => 3,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "180" | "half" => Some(Self::Half),
            "90" | "quarter" => Some(Self::Quarter),
            "mirror" => Some(Self::QuarterMirror),
            other => other.parse::<i64>().ok().and_then(Self::from_index),
        }
    }
}

// ============================================================================
// Host options
// ============================================================================

/// Options settable by the host, one per named filter option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PuzzleConfig {
    /// Number of puzzle rows (2 to 42)
    pub rows: u32,
    /// Number of puzzle columns (2 to 42)
    pub cols: u32,
    /// Unshuffled border width, percent of the picture (0 to 40)
    pub border: u32,
    /// Show a small preview of the solved picture
    pub preview: bool,
    /// Preview size, percent of the picture (0 to 100)
    pub preview_size: u32,
    /// Game variation
    pub mode: GameMode,
    /// Size of the curve along the piece edges, percent (0 to 100)
    pub shape_size: u32,
    /// Auto shuffle delay (0 to 30000, below 500 disables)
    pub auto_shuffle_speed: u32,
    /// Auto solve delay (0 to 30000, below 500 disables)
    pub auto_solve_speed: u32,
    /// Allowed piece orientations
    pub rotation: RotationMode,
}

impl Default for PuzzleConfig {
    fn default() -> Self {
        Self {
            rows: 4,
            cols: 4,
            border: 3,
            preview: false,
            preview_size: 15,
            mode: GameMode::Jigsaw,
            shape_size: 90,
            auto_shuffle_speed: 0,
            auto_solve_speed: 0,
            rotation: RotationMode::None,
        }
    }
}

impl PuzzleConfig {
    /// Parse a host option chain such as `rows=3:cols=5:mode=sliding`.
    ///
    /// Keys may carry the `puzzle-` prefix. Entries are separated by `:` or
    /// `,`. Unset options keep their defaults.
    pub fn from_chain(chain: &str) -> Result<Self> {
        let mut config = Self::default();
        for entry in chain.split([':', ',']).map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = entry.split_once('=').unwrap_or((entry, "1"));
            config.set_option(key.trim(), value.trim())?;
        }
        Ok(config.sanitized())
    }

    /// Set one named option. Values outside the allowed range are accepted
    /// here and clamped by [`PuzzleConfig::sanitized`].
    pub fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        let key = key.strip_prefix(OPTION_PREFIX).unwrap_or(key);
        let invalid = || PuzzleError::InvalidOption {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "rows" => self.rows = parse_count(value).ok_or_else(invalid)?,
            "cols" => self.cols = parse_count(value).ok_or_else(invalid)?,
            "border" => self.border = parse_count(value).ok_or_else(invalid)?,
            "preview" => self.preview = parse_bool(value).ok_or_else(invalid)?,
            "preview-size" => self.preview_size = parse_count(value).ok_or_else(invalid)?,
            "mode" => self.mode = GameMode::parse(value).ok_or_else(invalid)?,
            "shape-size" => self.shape_size = parse_count(value).ok_or_else(invalid)?,
            "auto-shuffle" => self.auto_shuffle_speed = parse_count(value).ok_or_else(invalid)?,
            "auto-solve" => self.auto_solve_speed = parse_count(value).ok_or_else(invalid)?,
            "rotation" => self.rotation = RotationMode::parse(value).ok_or_else(invalid)?,
            _ => return Err(PuzzleError::UnknownOption(key.to_string())),
        }
        Ok(())
    }

    /// Clamp every field into its valid range.
    pub fn sanitized(&self) -> Self {
        let clamped = Self {
            rows: self.rows.clamp(1, MAX_ROWS),
            cols: self.cols.clamp(1, MAX_COLS),
            border: self.border.min(MAX_BORDER),
            preview: self.preview,
            preview_size: self.preview_size.min(100),
            mode: self.mode,
            shape_size: self.shape_size.min(100),
            auto_shuffle_speed: self.auto_shuffle_speed.min(MAX_SPEED),
            auto_solve_speed: self.auto_solve_speed.min(MAX_SPEED),
            rotation: self.rotation,
        };
        if clamped != *self {
            tracing::warn!("Puzzle options clamped: {:?} -> {:?}", self, clamped);
        }
        clamped
    }
}

/// Negative counts clamp to zero rather than failing.
fn parse_count(value: &str) -> Option<u32> {
    let parsed = value.parse::<i64>().ok()?;
    Some(parsed.clamp(0, u32::MAX as i64) as u32)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ============================================================================
// Board parameters
// ============================================================================

/// Parameters of one baked board, derived from [`PuzzleConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardParams {
    pub rows: u32,
    pub cols: u32,
    pub pieces: usize,
    /// Number of edge archetypes held by the shape table
    pub piece_types: usize,
    pub preview: bool,
    pub preview_size: u32,
    pub border: u32,
    /// One slot is kept empty (sliding puzzle)
    pub blackslot: bool,
    /// Only adjacent slots can be swapped
    pub near: bool,
    /// Free pieces on the desk (jigsaw)
    pub advanced: bool,
    pub shape_size: u32,
    pub rotation: RotationMode,
    pub mode: GameMode,
    pub auto_shuffle_speed: u32,
    pub auto_solve_speed: u32,
}

impl BoardParams {
    pub fn derive(config: &PuzzleConfig) -> Self {
        let config = config.sanitized();
        let (advanced, blackslot, near) = match config.mode {
            GameMode::Jigsaw => (true, false, false),
            GameMode::Sliding => (false, true, true),
            GameMode::Swap => (false, false, true),
            GameMode::Exchange => (false, false, false),
        };

        let mut params = Self {
            rows: config.rows,
            cols: config.cols,
            pieces: (config.rows * config.cols) as usize,
            piece_types: if advanced { PIECE_TYPE_NBR } else { 0 },
            preview: config.preview,
            preview_size: config.preview_size,
            border: config.border,
            blackslot,
            near: near || blackslot,
            advanced,
            shape_size: config.shape_size,
            rotation: config.rotation,
            mode: config.mode,
            auto_shuffle_speed: config.auto_shuffle_speed,
            auto_solve_speed: config.auto_solve_speed,
        };

        if !advanced {
            params.border = 0;
            params.preview = false;
            params.preview_size = 0;
            params.shape_size = 0;
            params.auto_shuffle_speed = 0;
            params.auto_solve_speed = 0;
            params.rotation = RotationMode::None;
        }
        params
    }

    /// Organic shapes are only built in jigsaw mode with a visible curve.
    pub fn uses_shapes(&self) -> bool {
        self.advanced && self.shape_size != 0
    }
}

impl Default for BoardParams {
    fn default() -> Self {
        Self::derive(&PuzzleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_parsing_overrides_defaults() {
        let config = PuzzleConfig::from_chain("rows=3:puzzle-cols=5,mode=sliding:rotation=90").unwrap();
        assert_eq!(config.rows, 3);
        assert_eq!(config.cols, 5);
        assert_eq!(config.mode, GameMode::Sliding);
        assert_eq!(config.rotation, RotationMode::Quarter);
        assert_eq!(config.border, 3);
        assert_eq!(config.shape_size, 90);
    }

    #[test]
    fn numeric_modes_are_accepted() {
        let config = PuzzleConfig::from_chain("mode=2:rotation=3").unwrap();
        assert_eq!(config.mode, GameMode::Swap);
        assert_eq!(config.rotation, RotationMode::QuarterMirror);
    }

    #[test]
    fn bare_flag_enables_preview() {
        let config = PuzzleConfig::from_chain("preview").unwrap();
        assert!(config.preview);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = PuzzleConfig::from_chain("rows=0:cols=-3:border=99:shape-size=250:auto-solve=90000").unwrap();
        assert_eq!(config.rows, 1);
        assert_eq!(config.cols, 1);
        assert_eq!(config.border, MAX_BORDER);
        assert_eq!(config.shape_size, 100);
        assert_eq!(config.auto_solve_speed, MAX_SPEED);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            PuzzleConfig::from_chain("rows=many"),
            Err(PuzzleError::InvalidOption { .. })
        ));
        assert!(matches!(
            PuzzleConfig::from_chain("colour=red"),
            Err(PuzzleError::UnknownOption(_))
        ));
    }

    #[test]
    fn non_jigsaw_modes_disable_jigsaw_features() {
        let config = PuzzleConfig {
            mode: GameMode::Sliding,
            preview: true,
            rotation: RotationMode::QuarterMirror,
            auto_shuffle_speed: 1000,
            ..PuzzleConfig::default()
        };
        let params = BoardParams::derive(&config);
        assert!(params.blackslot);
        assert!(params.near);
        assert!(!params.advanced);
        assert_eq!(params.border, 0);
        assert_eq!(params.shape_size, 0);
        assert_eq!(params.rotation, RotationMode::None);
        assert_eq!(params.auto_shuffle_speed, 0);
        assert!(!params.preview);
        assert_eq!(params.piece_types, 0);
    }

    #[test]
    fn jigsaw_mode_builds_the_shape_table() {
        let params = BoardParams::default();
        assert!(params.advanced);
        assert!(params.uses_shapes());
        assert_eq!(params.pieces, 16);
        assert_eq!(params.piece_types, PIECE_TYPE_NBR);
    }

    #[test]
    fn config_survives_json() {
        let config = PuzzleConfig {
            mode: GameMode::Exchange,
            rotation: RotationMode::Half,
            ..PuzzleConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"exchange\""));
        let back: PuzzleConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}

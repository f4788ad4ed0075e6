//! Save-game snapshot.
//!
//! Pieces are recorded per original cell, so a snapshot stays valid across
//! re-bakes of a board with the same size and rotation mode.

use serde::{Deserialize, Serialize};

use crate::config::RotationMode;
use crate::shape::EdgeId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPiece {
    pub original_row: usize,
    pub original_col: usize,
    pub top: EdgeId,
    pub bottom: EdgeId,
    pub left: EdgeId,
    pub right: EdgeId,
    /// Position inside the border, as a fraction of the playing area
    pub pos_x: f32,
    pub pos_y: f32,
    pub angle: u8,
    pub mirror: i8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveGame {
    pub cols: u32,
    pub rows: u32,
    pub rotation: RotationMode,
    pub pieces: Vec<SavedPiece>,
}

impl SaveGame {
    /// Whether this snapshot can be applied to a board of the given shape.
    pub fn matches(&self, rows: u32, cols: u32, rotation: RotationMode) -> bool {
        self.rows == rows && self.cols == cols && self.rotation == rotation
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keeps_edge_ids_numeric() {
        let save = SaveGame {
            cols: 2,
            rows: 1,
            rotation: RotationMode::Quarter,
            pieces: vec![SavedPiece {
                original_row: 0,
                original_col: 1,
                top: EdgeId::FLAT_TOP,
                bottom: EdgeId::FLAT_BOTTOM,
                left: EdgeId::from_index(9).unwrap(),
                right: EdgeId::FLAT_RIGHT,
                pos_x: 0.5,
                pos_y: 0.25,
                angle: 3,
                mirror: -1,
            }],
        };
        let json = save.to_json().unwrap();
        assert!(json.contains("\"left\": 9"));
        let back = SaveGame::from_json(&json).unwrap();
        assert_eq!(back, save);
        assert!(back.matches(1, 2, RotationMode::Quarter));
        assert!(!back.matches(2, 2, RotationMode::Quarter));
        assert!(!back.matches(1, 2, RotationMode::None));
    }
}

//! Snapshot types - deep, independent views of engine state.
//!
//! A snapshot shares no storage with the engine that produced it, so it can
//! be serialized while the engine keeps mutating.

use std::time::Duration;

use crate::core::piece::Piece;
use crate::types::{GameStatus, PieceKind};

/// Copy of an active or pending piece at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceSnapshot {
    pub kind: PieceKind,
    pub x: i32,
    pub y: i32,
    pub rotation: u8,
}

impl From<&Piece> for PieceSnapshot {
    fn from(piece: &Piece) -> Self {
        Self {
            kind: piece.kind,
            x: piece.x,
            y: piece.y,
            rotation: piece.rotation,
        }
    }
}

/// Deep copy of the externally relevant engine state.
///
/// `board[row][col]` holds the cell's color hex string, `""` for empty. The
/// active piece is not composited into the board; renderers overlay it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub board: Vec<Vec<String>>,
    pub current: PieceSnapshot,
    pub next: PieceSnapshot,
    pub status: GameStatus,
    pub score: u64,
    pub level: u32,
    pub lines: u32,
    pub drop_interval: Duration,
}

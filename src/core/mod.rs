//! Core game logic: pieces, board, bag, engine, snapshots.
//!
//! Everything in here is pure computation; no I/O and no timers beyond the
//! caller-supplied clock handed to [`Engine::tick`].

pub mod bag;
pub mod board;
pub mod engine;
pub mod piece;
pub mod snapshot;

pub use bag::{PieceBag, SimpleRng};
pub use board::{Board, BoardError};
pub use engine::{drop_interval_for, Engine};
pub use piece::{base_shape, shape, Piece, Shape};
pub use snapshot::{GameSnapshot, PieceSnapshot};

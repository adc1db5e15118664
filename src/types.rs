//! Core types shared across the crate.
//!
//! Pure data with no external dependencies: piece kinds and colors, board
//! dimensions, timing and scoring constants.

/// Board dimensions.
pub const BOARD_WIDTH: usize = 10;
pub const BOARD_HEIGHT: usize = 20;

/// Spawn position for new pieces.
pub const SPAWN_X: i32 = 3;
pub const SPAWN_Y: i32 = 0;

/// Gravity timing (milliseconds).
pub const BASE_DROP_MS: u64 = 1000;
pub const DROP_STEP_MS: u64 = 100;
pub const MIN_DROP_MS: u64 = 100;

/// Lines required per level advance.
pub const LINES_PER_LEVEL: u32 = 10;

/// Points for clearing 0..=4 lines at once, multiplied by the current level.
pub const LINE_SCORES: [u64; 5] = [0, 100, 300, 500, 800];

/// Tetromino piece kinds.
///
/// The ordinal order (I=0 .. L=6) is part of the wire protocol; clients must
/// not treat the zero ordinal as "missing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl PieceKind {
    /// All seven kinds in ordinal order.
    pub const ALL: [PieceKind; 7] = [
        PieceKind::I,
        PieceKind::O,
        PieceKind::T,
        PieceKind::S,
        PieceKind::Z,
        PieceKind::J,
        PieceKind::L,
    ];

    /// Wire ordinal (0..=6).
    pub fn ordinal(self) -> u8 {
        match self {
            PieceKind::I => 0,
            PieceKind::O => 1,
            PieceKind::T => 2,
            PieceKind::S => 3,
            PieceKind::Z => 4,
            PieceKind::J => 5,
            PieceKind::L => 6,
        }
    }

    /// Inverse of [`PieceKind::ordinal`].
    pub fn from_ordinal(n: u8) -> Option<Self> {
        PieceKind::ALL.get(n as usize).copied()
    }

    /// Hex RGB color used for locked cells and piece rendering.
    pub fn color(self) -> &'static str {
        match self {
            PieceKind::I => "#00FFFF",
            PieceKind::O => "#FFFF00",
            PieceKind::T => "#800080",
            PieceKind::S => "#00FF00",
            PieceKind::Z => "#FF0000",
            PieceKind::J => "#0000FF",
            PieceKind::L => "#FFA500",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PieceKind::I => "I",
            PieceKind::O => "O",
            PieceKind::T => "T",
            PieceKind::S => "S",
            PieceKind::Z => "Z",
            PieceKind::J => "J",
            PieceKind::L => "L",
        }
    }
}

/// Cell on the board (`None` = empty, `Some` = locked piece kind).
pub type Cell = Option<PieceKind>;

/// Game state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Playing,
    Paused,
    GameOver,
}

impl GameStatus {
    /// Wire name, as sent in `state` frames.
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Playing => "playing",
            GameStatus::Paused => "paused",
            GameStatus::GameOver => "gameover",
        }
    }
}

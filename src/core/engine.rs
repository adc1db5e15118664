//! Engine module - the Tetris state machine.
//!
//! Orchestrates board, bag and active piece behind a single mutable value.
//! Commands are no-ops unless the game is in the state they expect; gravity
//! advances through [`Engine::tick`] against a caller-supplied clock so the
//! session layer owns all timing.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::core::bag::PieceBag;
use crate::core::board::Board;
use crate::core::piece::Piece;
use crate::core::snapshot::{GameSnapshot, PieceSnapshot};
use crate::types::{
    GameStatus, BASE_DROP_MS, DROP_STEP_MS, LINES_PER_LEVEL, LINE_SCORES, MIN_DROP_MS,
};

/// Drop interval for a level: `max(100ms, 1000ms - (level-1) * 100ms)`.
pub fn drop_interval_for(level: u32) -> Duration {
    let ms = BASE_DROP_MS
        .saturating_sub(DROP_STEP_MS * level.saturating_sub(1) as u64)
        .max(MIN_DROP_MS);
    Duration::from_millis(ms)
}

/// The Tetris game engine. One per session; mutated only under the
/// session's exclusive lock.
#[derive(Debug, Clone)]
pub struct Engine {
    board: Board,
    bag: PieceBag,
    current: Piece,
    next: Piece,
    state: GameStatus,
    score: u64,
    level: u32,
    lines: u32,
    drop_interval: Duration,
    last_drop: Instant,
}

impl Engine {
    /// Create a new game seeded from the clock.
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::with_seed(now.subsec_nanos() ^ now.as_secs() as u32)
    }

    /// Create a new game with a fixed bag seed, for reproducible sequences.
    pub fn with_seed(seed: u32) -> Self {
        let mut bag = PieceBag::with_seed(seed);
        let current = Piece::new(bag.next());
        let next = Piece::new(bag.next());

        let mut engine = Self {
            board: Board::new(),
            bag,
            current,
            next,
            state: GameStatus::Playing,
            score: 0,
            level: 1,
            lines: 0,
            drop_interval: drop_interval_for(1),
            last_drop: Instant::now(),
        };

        if engine
            .board
            .check_collision(engine.current.x, engine.current.y, &engine.current.shape())
        {
            engine.state = GameStatus::GameOver;
        }

        engine
    }

    /// Move the current piece one cell left. No-op unless playing.
    pub fn move_left(&mut self) -> bool {
        if self.state != GameStatus::Playing {
            return false;
        }
        let Self { board, current, .. } = self;
        current.move_left(|x, y, shape| board.check_collision(x, y, shape))
    }

    /// Move the current piece one cell right. No-op unless playing.
    pub fn move_right(&mut self) -> bool {
        if self.state != GameStatus::Playing {
            return false;
        }
        let Self { board, current, .. } = self;
        current.move_right(|x, y, shape| board.check_collision(x, y, shape))
    }

    /// Soft drop: move the current piece one cell down. A blocked move
    /// locks the piece and spawns the next one, returning `false`.
    pub fn move_down(&mut self) -> bool {
        if self.state != GameStatus::Playing {
            return false;
        }
        let moved = {
            let Self { board, current, .. } = self;
            current.move_down(|x, y, shape| board.check_collision(x, y, shape))
        };
        if !moved {
            self.lock_and_spawn();
        }
        moved
    }

    /// Drop the piece to the lowest clear position, award the drop bonus
    /// (`distance x level`), and lock. Returns the cells fallen.
    pub fn hard_drop(&mut self) -> u32 {
        if self.state != GameStatus::Playing {
            return 0;
        }
        let distance = {
            let Self { board, current, .. } = self;
            current.hard_drop(|x, y, shape| board.check_collision(x, y, shape))
        };
        self.score += distance as u64 * self.level as u64;
        self.lock_and_spawn();
        distance
    }

    /// Rotate the current piece clockwise with wall kicks.
    pub fn rotate(&mut self) -> bool {
        if self.state != GameStatus::Playing {
            return false;
        }
        let Self { board, current, .. } = self;
        current.rotate(|x, y, shape| board.check_collision(x, y, shape))
    }

    /// Playing -> Paused.
    pub fn pause(&mut self) {
        if self.state == GameStatus::Playing {
            self.state = GameStatus::Paused;
        }
    }

    /// Paused -> Playing. Resets the drop clock so the piece does not fall
    /// instantly after a long pause.
    pub fn resume(&mut self) {
        if self.state == GameStatus::Paused {
            self.state = GameStatus::Playing;
            self.last_drop = Instant::now();
        }
    }

    /// Apply whichever of pause/resume matches the current state.
    pub fn toggle_pause(&mut self) {
        match self.state {
            GameStatus::Playing => self.pause(),
            GameStatus::Paused => self.resume(),
            GameStatus::GameOver => {}
        }
    }

    /// Advance the drop timer. Performs one gravity step when the interval
    /// has elapsed; ticks faster than the interval are no-ops.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.state != GameStatus::Playing {
            return false;
        }
        if now.saturating_duration_since(self.last_drop) < self.drop_interval {
            return false;
        }
        self.last_drop = now;

        let moved = {
            let Self { board, current, .. } = self;
            current.move_down(|x, y, shape| board.check_collision(x, y, shape))
        };
        if !moved {
            self.lock_and_spawn();
        }
        true
    }

    /// Lock the current piece, clear lines, score, and promote the next
    /// piece. A blocked spawn ends the game.
    fn lock_and_spawn(&mut self) {
        let _ = self.board.lock_piece(&self.current);

        let cleared = self.board.clear_lines();
        if cleared > 0 {
            self.score += LINE_SCORES[cleared.min(4)] * self.level as u64;
            self.lines += cleared as u32;

            let level = self.lines / LINES_PER_LEVEL + 1;
            if level > self.level {
                self.level = level;
                self.drop_interval = drop_interval_for(level);
            }
        }

        self.current = self.next;
        self.next = Piece::new(self.bag.next());

        if self
            .board
            .check_collision(self.current.x, self.current.y, &self.current.shape())
        {
            self.state = GameStatus::GameOver;
        }
    }

    /// Deep, independent copy of the externally relevant state.
    pub fn snapshot(&self) -> GameSnapshot {
        let board = self
            .board
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.map(|kind| kind.color().to_string()).unwrap_or_default())
                    .collect()
            })
            .collect();

        GameSnapshot {
            board,
            current: PieceSnapshot::from(&self.current),
            next: PieceSnapshot::from(&self.next),
            status: self.state,
            score: self.score,
            level: self.level,
            lines: self.lines,
            drop_interval: self.drop_interval,
        }
    }

    pub fn status(&self) -> GameStatus {
        self.state
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn lines(&self) -> u32 {
        self.lines
    }

    pub fn drop_interval(&self) -> Duration {
        self.drop_interval
    }

    pub fn is_playing(&self) -> bool {
        self.state == GameStatus::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state == GameStatus::Paused
    }

    pub fn is_game_over(&self) -> bool {
        self.state == GameStatus::GameOver
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PieceKind, BOARD_HEIGHT, BOARD_WIDTH};

    /// Vertical I piece whose single column lands at `column`.
    fn vertical_i(column: i32) -> Piece {
        let mut piece = Piece::new(PieceKind::I);
        piece.rotation = 1;
        piece.x = column;
        piece
    }

    fn fill_row_except(board: &mut Board, y: i32, skip: i32) {
        for x in 0..BOARD_WIDTH as i32 {
            if x != skip {
                board.set_cell(x, y, Some(PieceKind::J)).unwrap();
            }
        }
    }

    #[test]
    fn test_new_engine() {
        let engine = Engine::with_seed(12345);
        assert_eq!(engine.status(), GameStatus::Playing);
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.level(), 1);
        assert_eq!(engine.lines(), 0);
        assert_eq!(engine.drop_interval(), Duration::from_millis(1000));
        assert_eq!((engine.current.x, engine.current.y), (3, 0));
    }

    #[test]
    fn test_drop_interval_formula() {
        assert_eq!(drop_interval_for(1), Duration::from_millis(1000));
        assert_eq!(drop_interval_for(2), Duration::from_millis(900));
        assert_eq!(drop_interval_for(10), Duration::from_millis(100));
        // Floors at 100ms.
        assert_eq!(drop_interval_for(15), Duration::from_millis(100));
    }

    #[test]
    fn test_move_left_right() {
        let mut engine = Engine::with_seed(12345);
        let x = engine.current.x;

        assert!(engine.move_right(), "spawn position should have room");
        assert_eq!(engine.current.x, x + 1);
        assert!(engine.move_left());
        assert_eq!(engine.current.x, x);
    }

    #[test]
    fn test_move_left_blocked_at_wall() {
        let mut engine = Engine::with_seed(12345);
        while engine.move_left() {}

        let x = engine.current.x;
        assert!(!engine.move_left());
        assert_eq!(engine.current.x, x);
    }

    #[test]
    fn test_commands_ignored_while_paused() {
        let mut engine = Engine::with_seed(12345);
        engine.pause();

        assert!(!engine.move_left());
        assert!(!engine.move_right());
        assert!(!engine.move_down());
        assert!(!engine.rotate());
        assert_eq!(engine.hard_drop(), 0);
        assert_eq!(engine.status(), GameStatus::Paused);
    }

    #[test]
    fn test_pause_resume_preserves_state() {
        let mut engine = Engine::with_seed(12345);
        engine.move_right();
        engine.rotate();
        let before = engine.snapshot();

        engine.pause();
        assert!(engine.is_paused());
        engine.resume();
        let after = engine.snapshot();

        assert_eq!(before.board, after.board);
        assert_eq!(before.current, after.current);
        assert_eq!(before.next, after.next);
        assert_eq!(before.score, after.score);
        assert_eq!(before.level, after.level);
        assert_eq!(before.lines, after.lines);
        assert_eq!(after.status, GameStatus::Playing);
    }

    #[test]
    fn test_resume_only_acts_on_paused() {
        let mut engine = Engine::with_seed(12345);
        engine.resume();
        assert!(engine.is_playing());

        engine.state = GameStatus::GameOver;
        engine.resume();
        assert!(engine.is_game_over());
    }

    #[test]
    fn test_toggle_pause() {
        let mut engine = Engine::with_seed(12345);
        engine.toggle_pause();
        assert!(engine.is_paused());
        engine.toggle_pause();
        assert!(engine.is_playing());

        engine.state = GameStatus::GameOver;
        engine.toggle_pause();
        assert!(engine.is_game_over());
    }

    #[test]
    fn test_rotate_o_four_times_is_identity() {
        let mut engine = Engine::with_seed(12345);
        engine.current = Piece::new(PieceKind::O);
        let before = engine.current;

        for _ in 0..4 {
            assert!(engine.rotate());
        }
        assert_eq!(engine.current, before);
    }

    #[test]
    fn test_tick_respects_interval() {
        let mut engine = Engine::with_seed(12345);
        let y = engine.current.y;
        let start = engine.last_drop;

        // Too early: nothing happens.
        assert!(!engine.tick(start + Duration::from_millis(500)));
        assert_eq!(engine.current.y, y);

        // Interval elapsed: one gravity step.
        let now = start + Duration::from_millis(1000);
        assert!(engine.tick(now));
        assert_eq!(engine.current.y, y + 1);

        // Same instant again: idempotent.
        assert!(!engine.tick(now));
        assert_eq!(engine.current.y, y + 1);
    }

    #[test]
    fn test_tick_ignored_while_paused() {
        let mut engine = Engine::with_seed(12345);
        engine.pause();
        assert!(!engine.tick(engine.last_drop + Duration::from_secs(5)));
    }

    #[test]
    fn test_hard_drop_locks_and_spawns() {
        let mut engine = Engine::with_seed(12345);
        let next_kind = engine.next.kind;

        let distance = engine.hard_drop();
        assert!(distance > 0);
        assert!(engine.board.filled_count() >= 4);
        assert_eq!(engine.current.kind, next_kind);
        assert_eq!((engine.current.x, engine.current.y), (3, 0));
    }

    #[test]
    fn test_hard_drop_bonus_scoring() {
        // Empty board at level 3: the drop bonus is distance x level with no
        // line-clear contribution.
        let mut engine = Engine::with_seed(12345);
        engine.current = Piece::new(PieceKind::I);
        engine.level = 3;

        let distance = engine.hard_drop();
        assert!(distance >= 18);
        assert_eq!(engine.score(), distance as u64 * 3);
        assert_eq!(engine.lines(), 0);
    }

    #[test]
    fn test_scoring_tetris() {
        // Four rows complete simultaneously: 800 x level plus the drop bonus.
        let mut engine = Engine::with_seed(12345);
        for y in 16..20 {
            fill_row_except(&mut engine.board, y, 9);
        }
        engine.current = vertical_i(9);

        let distance = engine.hard_drop();
        assert_eq!(engine.lines(), 4);
        assert_eq!(engine.score(), 800 + distance as u64);
        // Every stuffed cell was in a cleared row, so the board is empty.
        assert_eq!(engine.board.filled_count(), 0);
        assert!(engine.is_playing());
    }

    #[test]
    fn test_scoring_single_line() {
        let mut engine = Engine::with_seed(12345);
        fill_row_except(&mut engine.board, 19, 9);
        engine.current = vertical_i(9);

        let distance = engine.hard_drop();
        assert_eq!(engine.lines(), 1);
        assert_eq!(engine.score(), 100 + distance as u64);
        // Three cells of the vertical I survive above the cleared row.
        assert_eq!(engine.board.filled_count(), 3);
    }

    #[test]
    fn test_level_up_after_ten_lines() {
        // Ten single-line clears: after the 10th, level 2 at 900ms.
        let mut engine = Engine::with_seed(12345);

        for clear in 1..=10u32 {
            engine.board = Board::new();
            fill_row_except(&mut engine.board, 19, 9);
            engine.current = vertical_i(9);
            engine.hard_drop();

            assert_eq!(engine.lines(), clear);
        }

        assert_eq!(engine.level(), 2);
        assert_eq!(engine.drop_interval(), Duration::from_millis(900));
    }

    #[test]
    fn test_level_formula_invariant() {
        let mut engine = Engine::with_seed(777);
        for _ in 0..30 {
            engine.hard_drop();
            if engine.is_game_over() {
                break;
            }
            assert_eq!(engine.level(), engine.lines() / 10 + 1);
            let expected_ms = (1000u64.saturating_sub(100 * (engine.level() as u64 - 1))).max(100);
            assert_eq!(engine.drop_interval(), Duration::from_millis(expected_ms));
        }
    }

    #[test]
    fn test_active_piece_never_overlaps_board() {
        let mut engine = Engine::with_seed(31337);
        for step in 0..200 {
            match step % 4 {
                0 => {
                    engine.move_left();
                }
                1 => {
                    engine.rotate();
                }
                2 => {
                    engine.move_right();
                }
                _ => {
                    engine.move_down();
                }
            }
            if engine.is_game_over() {
                break;
            }
            assert!(
                !engine.board.check_collision(
                    engine.current.x,
                    engine.current.y,
                    &engine.current.shape()
                ),
                "active piece overlaps the board after step {step}"
            );
        }
    }

    #[test]
    fn test_game_over_on_blocked_spawn() {
        let mut engine = Engine::with_seed(12345);
        // Block the spawn area except one column.
        for y in 0..2 {
            fill_row_except(&mut engine.board, y, 0);
        }

        engine.hard_drop();
        assert!(engine.is_game_over());

        // Further commands are rejected and leave the board untouched.
        let before = engine.snapshot();
        assert!(!engine.move_left());
        assert!(!engine.move_down());
        assert_eq!(engine.snapshot().board, before.board);
    }

    #[test]
    fn test_gravity_eventually_fills_board() {
        let mut engine = Engine::with_seed(4242);
        let mut now = engine.last_drop;

        for _ in 0..10_000 {
            now += Duration::from_millis(100);
            engine.tick(now);
            if engine.is_game_over() {
                break;
            }
        }

        assert!(engine.is_game_over(), "unattended game should top out");
        assert!(engine.board.filled_count() > 0);
    }

    #[test]
    fn test_snapshot_is_independent_of_engine() {
        let mut engine = Engine::with_seed(12345);
        let snapshot = engine.snapshot();
        let board_before = snapshot.board.clone();
        let current_before = snapshot.current;

        engine.hard_drop();
        engine.move_left();

        assert_eq!(snapshot.board, board_before);
        assert_eq!(snapshot.current, current_before);
        // The engine itself has moved on.
        assert_ne!(engine.snapshot().board, board_before);
    }

    #[test]
    fn test_snapshot_board_dimensions_and_colors() {
        let mut engine = Engine::with_seed(12345);
        engine.hard_drop();

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.board.len(), BOARD_HEIGHT);
        for row in &snapshot.board {
            assert_eq!(row.len(), BOARD_WIDTH);
            for cell in row {
                assert!(
                    cell.is_empty() || PieceKind::ALL.iter().any(|kind| kind.color() == cell),
                    "unexpected cell color {cell:?}"
                );
            }
        }
    }
}

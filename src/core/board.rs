//! Board module - manages the game grid.
//!
//! The board is a fixed 10x20 grid where each cell is empty or holds the
//! kind of a locked piece. The active piece is never written to the board;
//! it only lands here through [`Board::lock_piece`].
//!
//! Out-of-bounds policy: reads through [`Board::get_cell`] fail with
//! [`BoardError::OutOfBounds`], while the collision helpers treat anything
//! outside the grid as occupied.

use crate::core::piece::{Piece, Shape};
use crate::types::{Cell, BOARD_HEIGHT, BOARD_WIDTH};

/// Board access errors. Internal to the engine; never surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("position ({x}, {y}) is out of bounds")]
    OutOfBounds { x: i32, y: i32 },
}

/// The game board - 10 columns x 20 rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// Row-major cells, `cells[y][x]`.
    cells: [[Cell; BOARD_WIDTH]; BOARD_HEIGHT],
}

impl Board {
    /// Create a new empty board.
    pub fn new() -> Self {
        Self {
            cells: [[None; BOARD_WIDTH]; BOARD_HEIGHT],
        }
    }

    fn in_bounds(x: i32, y: i32) -> bool {
        x >= 0 && (x as usize) < BOARD_WIDTH && y >= 0 && (y as usize) < BOARD_HEIGHT
    }

    /// Cell at (x, y), or `OutOfBounds`.
    pub fn get_cell(&self, x: i32, y: i32) -> Result<Cell, BoardError> {
        if !Self::in_bounds(x, y) {
            return Err(BoardError::OutOfBounds { x, y });
        }
        Ok(self.cells[y as usize][x as usize])
    }

    /// Write a cell at (x, y), or `OutOfBounds`.
    pub fn set_cell(&mut self, x: i32, y: i32, cell: Cell) -> Result<(), BoardError> {
        if !Self::in_bounds(x, y) {
            return Err(BoardError::OutOfBounds { x, y });
        }
        self.cells[y as usize][x as usize] = cell;
        Ok(())
    }

    /// True if (x, y) is inside the board and empty.
    /// Out-of-bounds counts as non-empty, which simplifies collision checks.
    pub fn is_empty(&self, x: i32, y: i32) -> bool {
        Self::in_bounds(x, y) && self.cells[y as usize][x as usize].is_none()
    }

    pub fn is_occupied(&self, x: i32, y: i32) -> bool {
        !self.is_empty(x, y)
    }

    /// True iff any filled cell of `shape` placed at offset (x, y) would
    /// leave the board or overlap a non-empty cell.
    pub fn check_collision(&self, x: i32, y: i32, shape: &Shape) -> bool {
        for (r, row) in shape.iter().enumerate() {
            for (c, &cell) in row.iter().enumerate() {
                if cell == 0 {
                    continue;
                }
                if !self.is_empty(x + c as i32, y + r as i32) {
                    return true;
                }
            }
        }
        false
    }

    /// Lock a piece onto the board, writing its kind into every covered cell.
    pub fn lock_piece(&mut self, piece: &Piece) -> Result<(), BoardError> {
        let shape = piece.shape();
        for (r, row) in shape.iter().enumerate() {
            for (c, &cell) in row.iter().enumerate() {
                if cell == 1 {
                    self.set_cell(piece.x + c as i32, piece.y + r as i32, Some(piece.kind))?;
                }
            }
        }
        Ok(())
    }

    /// Clear every full row, shifting the rows above down, and return the
    /// number of rows removed. Scans bottom-up and re-checks a row after a
    /// removal since everything above has shifted into it.
    pub fn clear_lines(&mut self) -> usize {
        let mut cleared = 0;
        let mut y = BOARD_HEIGHT as i32 - 1;

        while y >= 0 {
            if self.is_row_full(y as usize) {
                self.remove_row(y as usize);
                cleared += 1;
            } else {
                y -= 1;
            }
        }

        cleared
    }

    fn is_row_full(&self, y: usize) -> bool {
        self.cells[y].iter().all(|cell| cell.is_some())
    }

    /// Remove row `y` and shift rows 0..y down by one; the top row empties.
    fn remove_row(&mut self, y: usize) {
        for row in (1..=y).rev() {
            self.cells[row] = self.cells[row - 1];
        }
        self.cells[0] = [None; BOARD_WIDTH];
    }

    /// Row-major view of the cells, for snapshot export.
    pub fn rows(&self) -> &[[Cell; BOARD_WIDTH]; BOARD_HEIGHT] {
        &self.cells
    }

    /// Count the filled cells on the board.
    pub fn filled_count(&self) -> usize {
        self.cells
            .iter()
            .flat_map(|row| row.iter())
            .filter(|cell| cell.is_some())
            .count()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

//! Piece module - tetromino shapes and kinematics.
//!
//! Shapes are small 0/1 matrices rotated 90° clockwise per rotation step.
//! All movement is driven by a caller-supplied collision predicate so the
//! piece itself never needs to know about the board.

use crate::types::{PieceKind, SPAWN_X, SPAWN_Y};

/// Shape of a piece: a rectangular matrix where 1 marks a filled cell.
pub type Shape = Vec<Vec<u8>>;

/// Base shape (rotation 0) for a piece kind.
pub fn base_shape(kind: PieceKind) -> Shape {
    match kind {
        PieceKind::I => vec![vec![1, 1, 1, 1]],
        PieceKind::O => vec![vec![1, 1], vec![1, 1]],
        PieceKind::T => vec![vec![0, 1, 0], vec![1, 1, 1]],
        PieceKind::S => vec![vec![0, 1, 1], vec![1, 1, 0]],
        PieceKind::Z => vec![vec![1, 1, 0], vec![0, 1, 1]],
        PieceKind::J => vec![vec![1, 0, 0], vec![1, 1, 1]],
        PieceKind::L => vec![vec![0, 0, 1], vec![1, 1, 1]],
    }
}

/// Shape for a kind at the given rotation. Rotations past 3 wrap around.
pub fn shape(kind: PieceKind, rotation: u8) -> Shape {
    let mut shape = base_shape(kind);
    for _ in 0..(rotation % 4) {
        shape = rotate_cw(&shape);
    }
    shape
}

/// Rotate a shape 90° clockwise: `rotated[c][rows - 1 - r] = src[r][c]`.
fn rotate_cw(shape: &Shape) -> Shape {
    let rows = shape.len();
    let cols = shape[0].len();
    let mut rotated = vec![vec![0u8; rows]; cols];

    for (r, row) in shape.iter().enumerate() {
        for (c, &cell) in row.iter().enumerate() {
            rotated[c][rows - 1 - r] = cell;
        }
    }

    rotated
}

/// Wall-kick offsets tried in order when an in-place rotation collides.
///
/// The I piece spans a 4-wide/4-tall footprint and needs 2-cell kicks near
/// walls; the remaining kinds never need more than a 1-cell adjustment or a
/// single lift.
const I_KICKS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (-2, 0),
    (2, 0),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

const OTHER_KICKS: [(i32, i32); 3] = [(-1, 0), (1, 0), (0, -1)];

fn wall_kicks(kind: PieceKind) -> &'static [(i32, i32)] {
    match kind {
        PieceKind::I => &I_KICKS,
        _ => &OTHER_KICKS,
    }
}

/// Active falling piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub kind: PieceKind,
    pub x: i32,
    pub y: i32,
    /// 0..=3, clockwise quarter turns from the base shape.
    pub rotation: u8,
}

impl Piece {
    /// Create a new piece of the given kind at the spawn position.
    pub fn new(kind: PieceKind) -> Self {
        Self {
            kind,
            x: SPAWN_X,
            y: SPAWN_Y,
            rotation: 0,
        }
    }

    /// Shape in the current rotation.
    pub fn shape(&self) -> Shape {
        shape(self.kind, self.rotation)
    }

    /// Move one cell left if the target position is clear.
    pub fn move_left<F>(&mut self, collides: F) -> bool
    where
        F: Fn(i32, i32, &Shape) -> bool,
    {
        let shape = self.shape();
        if !collides(self.x - 1, self.y, &shape) {
            self.x -= 1;
            return true;
        }
        false
    }

    /// Move one cell right if the target position is clear.
    pub fn move_right<F>(&mut self, collides: F) -> bool
    where
        F: Fn(i32, i32, &Shape) -> bool,
    {
        let shape = self.shape();
        if !collides(self.x + 1, self.y, &shape) {
            self.x += 1;
            return true;
        }
        false
    }

    /// Move one cell down if the target position is clear.
    pub fn move_down<F>(&mut self, collides: F) -> bool
    where
        F: Fn(i32, i32, &Shape) -> bool,
    {
        let shape = self.shape();
        if !collides(self.x, self.y + 1, &shape) {
            self.y += 1;
            return true;
        }
        false
    }

    /// Descend until blocked. Returns the number of cells fallen.
    pub fn hard_drop<F>(&mut self, collides: F) -> u32
    where
        F: Fn(i32, i32, &Shape) -> bool,
    {
        let shape = self.shape();
        let mut distance = 0;

        while !collides(self.x, self.y + 1, &shape) {
            self.y += 1;
            distance += 1;
        }

        distance
    }

    /// Rotate 90° clockwise, consulting wall kicks on collision.
    ///
    /// The O piece never changes shape, so rotation is a no-op success.
    /// If the in-place rotation and every kick offset collide, the piece is
    /// left unchanged and `false` is returned.
    pub fn rotate<F>(&mut self, collides: F) -> bool
    where
        F: Fn(i32, i32, &Shape) -> bool,
    {
        if self.kind == PieceKind::O {
            return true;
        }

        let new_rotation = (self.rotation + 1) % 4;
        let new_shape = shape(self.kind, new_rotation);

        if !collides(self.x, self.y, &new_shape) {
            self.rotation = new_rotation;
            return true;
        }

        for &(dx, dy) in wall_kicks(self.kind) {
            let (x, y) = (self.x + dx, self.y + dy);
            if !collides(x, y, &new_shape) {
                self.x = x;
                self.y = y;
                self.rotation = new_rotation;
                return true;
            }
        }

        false
    }
}

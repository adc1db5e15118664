//! Bag module - 7-bag random piece generation.
//!
//! Implements the "7-bag" randomization scheme: pieces are drawn from a bag
//! holding one of each kind, reshuffled with Fisher-Yates whenever it runs
//! dry. Every contiguous block of 7 draws is therefore a permutation of all
//! seven kinds.
//!
//! The RNG is a small seedable LCG so tests can pin the exact sequence.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::PieceKind;

/// Simple LCG (Linear Congruential Generator) using the Numerical Recipes
/// constants. Deterministic for a given seed.
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u32,
}

impl SimpleRng {
    /// Create a new RNG. A zero seed is bumped to 1 to avoid a stuck state.
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        self.state
    }

    /// Random value in `[0, max)`.
    pub fn next_range(&mut self, max: u32) -> u32 {
        self.next_u32() % max
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_range(i as u32 + 1) as usize;
            slice.swap(i, j);
        }
    }
}

/// 7-bag piece generator.
#[derive(Debug, Clone)]
pub struct PieceBag {
    bag: Vec<PieceKind>,
    cursor: usize,
    rng: SimpleRng,
}

impl PieceBag {
    /// Create a bag seeded from the clock.
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::with_seed(now.subsec_nanos() ^ now.as_secs() as u32)
    }

    /// Create a bag with a fixed seed. Tests rely on this for reproducible
    /// piece sequences.
    pub fn with_seed(seed: u32) -> Self {
        let mut bag = Self {
            bag: Vec::with_capacity(7),
            cursor: 0,
            rng: SimpleRng::new(seed),
        };
        bag.refill();
        bag
    }

    fn refill(&mut self) {
        self.bag = PieceKind::ALL.to_vec();
        self.rng.shuffle(&mut self.bag);
        self.cursor = 0;
    }

    /// Dequeue the next piece kind, refilling the bag when it runs out.
    pub fn next(&mut self) -> PieceKind {
        if self.cursor >= self.bag.len() {
            self.refill();
        }
        let kind = self.bag[self.cursor];
        self.cursor += 1;
        kind
    }

    /// Next piece kind without dequeuing it.
    pub fn peek(&mut self) -> PieceKind {
        if self.cursor >= self.bag.len() {
            self.refill();
        }
        self.bag[self.cursor]
    }

    /// Pieces left in the current bag.
    pub fn remaining(&self) -> usize {
        self.bag.len() - self.cursor
    }
}

impl Default for PieceBag {
    fn default() -> Self {
        Self::with_seed(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_deterministic() {
        let mut a = SimpleRng::new(12345);
        let mut b = SimpleRng::new(12345);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_rng_zero_seed_is_bumped() {
        let mut rng = SimpleRng::new(0);
        assert_ne!(rng.next_u32(), 0);
    }

    #[test]
    fn test_bag_deterministic_for_seed() {
        let mut a = PieceBag::with_seed(42);
        let mut b = PieceBag::with_seed(42);
        for _ in 0..50 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn test_every_block_of_seven_is_a_permutation() {
        let mut bag = PieceBag::with_seed(7);
        for _ in 0..4 {
            let mut block: Vec<PieceKind> = (0..7).map(|_| bag.next()).collect();
            block.sort_by_key(|kind| kind.ordinal());
            assert_eq!(block, PieceKind::ALL.to_vec());
        }
    }

    #[test]
    fn test_peek_is_idempotent() {
        let mut bag = PieceBag::with_seed(9);
        let peeked = bag.peek();
        assert_eq!(bag.peek(), peeked);
        assert_eq!(bag.next(), peeked);
    }

    #[test]
    fn test_peek_refills_empty_bag() {
        let mut bag = PieceBag::with_seed(3);
        for _ in 0..7 {
            bag.next();
        }
        assert_eq!(bag.remaining(), 0);
        let peeked = bag.peek();
        assert_eq!(bag.next(), peeked);
    }

    #[test]
    fn test_remaining_counts_down() {
        let mut bag = PieceBag::with_seed(5);
        assert_eq!(bag.remaining(), 7);
        bag.next();
        assert_eq!(bag.remaining(), 6);
    }
}

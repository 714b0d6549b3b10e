//! Heuristic opponent.
//!
//! Picks the automated player's next move with a fixed priority order:
//! win now, block the human, take the center, take a random free corner,
//! otherwise a random free cell. No search beyond one ply.

use rand::Rng;

use crate::board::{available_moves, find_winning_move, Board, Mark};

const CENTER: usize = 4;
const CORNERS: [usize; 4] = [0, 2, 6, 8];

/// Chooses the next move for `ai_mark`. Returns `None` only when the board
/// is full. Randomness comes from the injected `rng`, so tests can seed it.
pub fn pick_ai_move<R: Rng + ?Sized>(board: &Board, ai_mark: Mark, rng: &mut R) -> Option<usize> {
    let empty = available_moves(board);
    if empty.is_empty() {
        return None;
    }

    if let Some(win) = find_winning_move(board, ai_mark) {
        return Some(win);
    }

    if let Some(block) = find_winning_move(board, !ai_mark) {
        return Some(block);
    }

    if board[CENTER].is_none() {
        return Some(CENTER);
    }

    let free_corners: Vec<usize> = CORNERS
        .iter()
        .copied()
        .filter(|&i| board[i].is_none())
        .collect();
    if !free_corners.is_empty() {
        return Some(free_corners[rng.gen_range(0..free_corners.len())]);
    }

    Some(empty[rng.gen_range(0..empty.len())])
}

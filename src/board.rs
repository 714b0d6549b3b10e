//! Board model and win/draw detection.

use std::fmt;
use std::ops::Not;

use serde::{Deserialize, Serialize};

/// A player's symbol on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Not for Mark {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::X => write!(f, "X"),
            Mark::O => write!(f, "O"),
        }
    }
}

pub type Cell = Option<Mark>;

/// Cells are indexed 0..9, row-major:
/// ```text
///  0 | 1 | 2
/// ---+---+---
///  3 | 4 | 5
/// ---+---+---
///  6 | 7 | 8
/// ```
pub type Board = [Cell; 9];

/// The 8 lines that decide a game: 3 rows, 3 columns, 2 diagonals.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Returns the mark occupying a completed line, or `None` if nobody has won.
pub fn winner(board: &Board) -> Option<Mark> {
    for [a, b, c] in WINNING_LINES {
        if let (Some(x), Some(y), Some(z)) = (board[a], board[b], board[c]) {
            if x == y && y == z {
                return Some(x);
            }
        }
    }
    None
}

/// A draw holds iff every cell is occupied and there is no winner.
pub fn is_draw(board: &Board) -> bool {
    board.iter().all(|c| c.is_some()) && winner(board).is_none()
}

/// Indices of all empty cells.
pub fn available_moves(board: &Board) -> Vec<usize> {
    (0..9).filter(|&i| board[i].is_none()).collect()
}

/// Finds a cell that completes a line for `mark` on the next move:
/// a line holding two of `mark` and one empty cell.
pub fn find_winning_move(board: &Board, mark: Mark) -> Option<usize> {
    for [a, b, c] in WINNING_LINES {
        let cells = [board[a], board[b], board[c]];
        let mark_count = cells.iter().filter(|&&v| v == Some(mark)).count();
        let empty_count = cells.iter().filter(|&&v| v.is_none()).count();
        if mark_count == 2 && empty_count == 1 {
            for idx in [a, b, c] {
                if board[idx].is_none() {
                    return Some(idx);
                }
            }
        }
    }
    None
}

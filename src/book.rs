//! Opening book (C10). Content-addressed: canonicalize a position under
//! the board's D4 symmetry group, then look up the canonical hash in a
//! read-only in-memory store built at engine startup.

use std::collections::HashMap;

use crate::board::{Board, Position};
use crate::threat::{check_win, would_win};
use crate::types::{Color, Move, BOARD_SIZE};

/// A stored recommendation: the move to play (in canonical orientation)
/// and a relative weight used to break ties when several books merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookEntry {
  pub mv: Move,
  pub weight: u32,
}

/// One of the 8 elements of the dihedral group D4 acting on a square
/// board: the 4 rotations, each optionally mirrored.
#[derive(Clone, Copy, Debug)]
struct Symmetry {
  rotate_quarter_turns: u8,
  mirror: bool,
}

const ALL_SYMMETRIES: [Symmetry; 8] = [
  Symmetry { rotate_quarter_turns: 0, mirror: false },
  Symmetry { rotate_quarter_turns: 1, mirror: false },
  Symmetry { rotate_quarter_turns: 2, mirror: false },
  Symmetry { rotate_quarter_turns: 3, mirror: false },
  Symmetry { rotate_quarter_turns: 0, mirror: true },
  Symmetry { rotate_quarter_turns: 1, mirror: true },
  Symmetry { rotate_quarter_turns: 2, mirror: true },
  Symmetry { rotate_quarter_turns: 3, mirror: true },
];

fn apply_symmetry(sym: Symmetry, x: u8, y: u8) -> (u8, u8) {
  let n = BOARD_SIZE as i32 - 1;
  let (mut x, mut y) = (x as i32, y as i32);
  for _ in 0..sym.rotate_quarter_turns {
    let (nx, ny) = (y, n - x);
    x = nx;
    y = ny;
  }
  if sym.mirror {
    x = n - x;
  }
  (x as u8, y as u8)
}

fn symmetry_image(board: &Position, sym: Symmetry) -> Vec<(u8, u8, Option<Color>)> {
  let mut out = Vec::with_capacity(BOARD_SIZE * BOARD_SIZE);
  for y in 0..BOARD_SIZE as u8 {
    for x in 0..BOARD_SIZE as u8 {
      let (tx, ty) = apply_symmetry(sym, x, y);
      out.push((tx, ty, board.cell(x, y)));
    }
  }
  out
}

fn image_sort_key(image: &[(u8, u8, Option<Color>)]) -> Vec<u8> {
  let mut cells = vec![0u8; BOARD_SIZE * BOARD_SIZE];
  for &(x, y, color) in image {
    let idx = y as usize * BOARD_SIZE + x as usize;
    cells[idx] = match color {
      None => 0,
      Some(Color::Red) => 1,
      Some(Color::Blue) => 2,
    };
  }
  cells
}

/// Picks the lexicographically smallest of the 8 dihedral images and
/// returns it along with the symmetry that produced it, so a caller can
/// map a book move back into the original orientation.
fn canonicalize(board: &Position) -> (Vec<u8>, Symmetry) {
  ALL_SYMMETRIES
    .iter()
    .map(|&sym| (image_sort_key(&symmetry_image(board, sym)), sym))
    .min_by(|a, b| a.0.cmp(&b.0))
    .expect("ALL_SYMMETRIES is non-empty")
}

fn canonical_hash(key: &[u8]) -> u64 {
  // FNV-1a over the flattened tri-state board; stable across runs, which
  // is all a content-addressed book lookup needs.
  let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
  for &b in key {
    hash ^= b as u64;
    hash = hash.wrapping_mul(0x1000_0000_01b3);
  }
  hash
}

fn invert_symmetry(sym: Symmetry) -> Symmetry {
  match sym.rotate_quarter_turns {
    0 => sym,
    turns if !sym.mirror => Symmetry { rotate_quarter_turns: (4 - turns) % 4, mirror: false },
    // A mirrored rotation is its own inverse: mirror, rotate back, mirror
    // again collapses to the same rotate+mirror pair.
    _ => sym,
  }
}

pub struct OpeningBook {
  entries: HashMap<u64, BookEntry>,
}

impl OpeningBook {
  pub fn empty() -> Self {
    OpeningBook { entries: HashMap::new() }
  }

  pub fn from_entries(entries: HashMap<u64, BookEntry>) -> Self {
    OpeningBook { entries }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Inserts a book entry for `position`, keyed by its canonical hash. The
  /// move is stored already expressed in the canonical orientation.
  pub fn insert(&mut self, position: &Position, mv: Move, weight: u32) {
    let (key, sym) = canonicalize(position);
    let (cx, cy) = apply_symmetry(sym, mv.x, mv.y);
    self.entries.insert(canonical_hash(&key), BookEntry { mv: Move::new(cx, cy), weight });
  }

  /// Looks up `position`, validates legality and non-blunder, and maps the
  /// stored canonical move back into the position's actual orientation.
  pub fn lookup(&self, board: &mut Board, side: Color) -> Option<Move> {
    let position = board.to_position();
    let (key, sym) = canonicalize(&position);
    let entry = self.entries.get(&canonical_hash(&key))?;

    let inverse = invert_symmetry(sym);
    let (x, y) = apply_symmetry(inverse, entry.mv.x, entry.mv.y);
    let candidate = Move::new(x, y);

    if !board.is_empty(candidate.x, candidate.y) {
      return None;
    }
    if is_blunder(board, candidate, side) {
      return None;
    }
    Some(candidate)
  }
}

impl Default for OpeningBook {
  fn default() -> Self {
    OpeningBook::empty()
  }
}

/// A book move is a blunder if it hands the opponent an immediate win
/// next ply that we could otherwise have blocked.
fn is_blunder(board: &mut Board, mv: Move, side: Color) -> bool {
  let undo = board.make_move(mv);
  let opponent_can_win = crate::movegen::generate_candidates(board)
    .into_iter()
    .any(|reply| would_win(board, reply, side.other()));
  let we_already_won = check_win(board) == Some(side);
  board.unmake_move(undo);
  opponent_can_win && !we_already_won
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn canonicalization_is_symmetry_invariant() {
    let mut board = Board::new();
    board.make_move(Move::new(7, 7));
    board.make_move(Move::new(7, 8));
    let position = board.to_position();

    let (base_key, _) = canonicalize(&position);

    for &sym in &ALL_SYMMETRIES {
      let mut rotated = Board::new();
      // Replay the same two moves through the symmetry to build an
      // equivalent position under a different orientation.
      let (x1, y1) = apply_symmetry(sym, 7, 7);
      let (x2, y2) = apply_symmetry(sym, 7, 8);
      rotated.make_move(Move::new(x1, y1));
      rotated.make_move(Move::new(x2, y2));
      let rotated_position = rotated.to_position();
      let (rotated_key, _) = canonicalize(&rotated_position);
      assert_eq!(base_key, rotated_key);
    }
  }

  #[test]
  fn lookup_returns_none_on_empty_book() {
    let book = OpeningBook::empty();
    let mut board = Board::new();
    assert!(book.lookup(&mut board, Color::Red).is_none());
  }

  #[test]
  fn insert_then_lookup_round_trips() {
    let mut book = OpeningBook::empty();
    let board = Board::new();
    let position = board.to_position();
    book.insert(&position, Move::new(7, 7), 100);

    let mut search_board = Board::new();
    let looked_up = book.lookup(&mut search_board, Color::Red);
    assert_eq!(looked_up, Some(Move::new(7, 7)));
  }

  #[test]
  fn lookup_skips_occupied_square() {
    let mut book = OpeningBook::empty();
    let board = Board::new();
    let position = board.to_position();
    book.insert(&position, Move::new(7, 7), 100);

    let mut search_board = Board::new();
    search_board.make_move(Move::new(7, 7));
    assert!(book.lookup(&mut search_board, Color::Blue).is_none());
  }
}

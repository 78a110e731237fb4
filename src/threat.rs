//! Threat and win detection (C3). Deterministic, side-effect-free scans
//! over the board; used by move ordering (C4), the VCF solver (C7), and
//! the ponderer's "is this worth pondering" check (C11).

use crate::board::Board;
use crate::types::{Color, Move, BOARD_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
  H,
  V,
  D1, // down-right, "\"
  D2, // down-left, "/"
}

const DIRECTIONS: [(Direction, i32, i32); 4] = [
  (Direction::H, 1, 0),
  (Direction::V, 0, 1),
  (Direction::D1, 1, 1),
  (Direction::D2, 1, -1),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ThreatKind {
  OpenTwo,
  ClosedThree,
  OpenThree,
  ClosedFour,
  OpenFour,
  Five,
}

#[derive(Clone, Debug)]
pub struct Threat {
  pub kind: ThreatKind,
  pub direction: Direction,
  pub color: Color,
  pub stones: Vec<Move>,
  pub gain_squares: Vec<Move>,
}

/// Scans every direction for a maximal run of exactly 5 stones (overline
/// does not win) with at least one unblocked end (both ends blocked does
/// not win either, per Caro rules).
pub fn check_win(board: &Board) -> Option<Color> {
  for sq in board.occupied().iter() {
    let x = (sq % BOARD_SIZE) as i32;
    let y = (sq / BOARD_SIZE) as i32;
    let color = board.cell(x as u8, y as u8).unwrap();

    for &(_, dx, dy) in &DIRECTIONS {
      // Only evaluate a run from its starting square, to avoid re-checking
      // the same run once per stone it contains.
      let px = x - dx;
      let py = y - dy;
      if Board::in_bounds(px, py) && board.cell(px as u8, py as u8) == Some(color) {
        continue;
      }

      let mut len = 1;
      let mut ex = x + dx;
      let mut ey = y + dy;
      while Board::in_bounds(ex, ey) && board.cell(ex as u8, ey as u8) == Some(color) {
        len += 1;
        ex += dx;
        ey += dy;
      }

      if len == 5 {
        let left_blocked =
          !Board::in_bounds(px, py) || board.cell(px as u8, py as u8) == Some(color.other());
        let right_blocked =
          !Board::in_bounds(ex, ey) || board.cell(ex as u8, ey as u8) == Some(color.other());
        if !(left_blocked && right_blocked) {
          return Some(color);
        }
      }
    }
  }
  None
}

/// Would placing `color` at `mv` immediately win? Used by C4/C7 for
/// "winning move" / "must block" classification.
pub fn would_win(board: &mut Board, mv: Move, color: Color) -> bool {
  debug_assert_eq!(board.side_to_move(), color);
  let undo = board.make_move(mv);
  let win = check_win(board) == Some(color);
  board.unmake_move(undo);
  win
}

struct Run {
  direction: Direction,
  dx: i32,
  dy: i32,
  start: (i32, i32),
  end: (i32, i32),
  len: i32,
}

fn scan_runs(board: &Board, color: Color) -> Vec<Run> {
  let mut runs = Vec::new();
  for sq in board.bitboard(color).iter() {
    let x = (sq % BOARD_SIZE) as i32;
    let y = (sq / BOARD_SIZE) as i32;

    for &(direction, dx, dy) in &DIRECTIONS {
      let px = x - dx;
      let py = y - dy;
      if Board::in_bounds(px, py) && board.cell(px as u8, py as u8) == Some(color) {
        continue;
      }

      let mut len = 1;
      let mut ex = x + dx;
      let mut ey = y + dy;
      while Board::in_bounds(ex, ey) && board.cell(ex as u8, ey as u8) == Some(color) {
        len += 1;
        ex += dx;
        ey += dy;
      }

      runs.push(Run {
        direction,
        dx,
        dy,
        start: (x, y),
        end: (ex - dx, ey - dy),
        len,
      });
    }
  }
  runs
}

fn classify(len: i32, open_ends: i32) -> Option<ThreatKind> {
  match (len, open_ends) {
    (5, _) => Some(ThreatKind::Five),
    (4, 2) => Some(ThreatKind::OpenFour),
    (4, 1) => Some(ThreatKind::ClosedFour),
    (3, 2) => Some(ThreatKind::OpenThree),
    (3, 1) => Some(ThreatKind::ClosedThree),
    (2, 2) => Some(ThreatKind::OpenTwo),
    _ => None,
  }
}

fn run_stones(run: &Run) -> Vec<Move> {
  let mut stones = Vec::with_capacity(run.len as usize);
  let (mut x, mut y) = run.start;
  for _ in 0..run.len {
    stones.push(Move::new(x as u8, y as u8));
    x += run.dx;
    y += run.dy;
  }
  stones
}

fn run_gain_squares(board: &Board, run: &Run) -> (Vec<Move>, bool, bool) {
  let (sx, sy) = run.start;
  let (ex, ey) = run.end;
  let left = (sx - run.dx, sy - run.dy);
  let right = (ex + run.dx, ey + run.dy);

  let left_open = Board::in_bounds(left.0, left.1) && board.cell(left.0 as u8, left.1 as u8).is_none();
  let right_open =
    Board::in_bounds(right.0, right.1) && board.cell(right.0 as u8, right.1 as u8).is_none();

  let mut gains = Vec::new();
  if left_open {
    gains.push(Move::new(left.0 as u8, left.1 as u8));
  }
  if right_open {
    gains.push(Move::new(right.0 as u8, right.1 as u8));
  }
  (gains, left_open, right_open)
}

/// All threats of severity `OpenThree` and above for `color`: the ones
/// significant enough to drive move ordering, VCF frontier generation, and
/// "is this position tactical" checks.
pub fn detect_threats(board: &Board, color: Color) -> Vec<Threat> {
  let mut threats = Vec::new();
  for run in scan_runs(board, color) {
    if run.len >= 6 {
      continue; // overline: dead shape, not a threat under Caro rules
    }
    let (gains, left_open, right_open) = run_gain_squares(board, &run);
    let open_ends = left_open as i32 + right_open as i32;
    if let Some(kind) = classify(run.len, open_ends) {
      if kind >= ThreatKind::OpenThree {
        threats.push(Threat {
          kind,
          direction: run.direction,
          color,
          stones: run_stones(&run),
          gain_squares: gains,
        });
      }
    }
  }
  threats
}

/// All threats of any detectable severity (`OpenTwo` and above), used by
/// move ordering's `ThreatCreate` bucket where even modest shape matters.
pub fn detect_all_threats(board: &Board, color: Color) -> Vec<Threat> {
  let mut threats = Vec::new();
  for run in scan_runs(board, color) {
    if run.len >= 6 {
      continue;
    }
    let (gains, left_open, right_open) = run_gain_squares(board, &run);
    let open_ends = left_open as i32 + right_open as i32;
    if let Some(kind) = classify(run.len, open_ends) {
      threats.push(Threat {
        kind,
        direction: run.direction,
        color,
        stones: run_stones(&run),
        gain_squares: gains,
      });
    }
  }
  threats
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn five_in_a_row_wins() {
    let mut board = Board::new();
    board.make_move(Move::new(0, 7)); // R
    board.make_move(Move::new(0, 8)); // B
    board.make_move(Move::new(1, 7)); // R
    board.make_move(Move::new(1, 8)); // B
    board.make_move(Move::new(2, 7)); // R
    board.make_move(Move::new(2, 8)); // B
    board.make_move(Move::new(3, 7)); // R
    board.make_move(Move::new(3, 8)); // B
    board.make_move(Move::new(4, 7)); // R completes five
    assert_eq!(check_win(&board), Some(Color::Red));
  }

  #[test]
  fn overline_is_not_a_win() {
    let mut board = Board::new();
    for x in 0..6u8 {
      board.make_move(Move::new(x, 7)); // R
      if x < 5 {
        board.make_move(Move::new(x, 8)); // B filler
      }
    }
    assert_eq!(check_win(&board), None);
  }

  #[test]
  fn five_blocked_on_both_ends_does_not_win() {
    let mut board = Board::new();
    board.make_move(Move::new(1, 7)); // R
    board.make_move(Move::new(0, 7)); // B blocks left
    board.make_move(Move::new(2, 7)); // R
    board.make_move(Move::new(6, 7)); // B blocks right
    board.make_move(Move::new(3, 7)); // R
    board.make_move(Move::new(0, 0)); // B filler
    board.make_move(Move::new(4, 7)); // R
    board.make_move(Move::new(0, 1)); // B filler
    board.make_move(Move::new(5, 7)); // R completes a blocked five
    assert_eq!(check_win(&board), None);
  }

  #[test]
  fn open_three_is_detected() {
    let mut board = Board::new();
    board.make_move(Move::new(5, 5)); // R
    board.make_move(Move::new(0, 0)); // B
    board.make_move(Move::new(6, 5)); // R
    board.make_move(Move::new(0, 1)); // B
    board.make_move(Move::new(7, 5)); // R open three at (5..7,5)
    let threats = detect_threats(&board, Color::Red);
    assert!(threats.iter().any(|t| t.kind == ThreatKind::OpenThree));
  }

  #[test]
  fn would_win_detects_immediate_completion() {
    let mut board = Board::new();
    board.make_move(Move::new(0, 7)); // R
    board.make_move(Move::new(0, 8)); // B
    board.make_move(Move::new(1, 7)); // R
    board.make_move(Move::new(1, 8)); // B
    board.make_move(Move::new(2, 7)); // R
    board.make_move(Move::new(2, 8)); // B
    board.make_move(Move::new(3, 7)); // R
    board.make_move(Move::new(3, 8)); // B, side to move is now Red
    assert!(would_win(&mut board, Move::new(4, 7), Color::Red));
  }
}

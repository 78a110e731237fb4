//! Move generation and ordering (C4). Candidates are every empty cell
//! within Chebyshev distance 2 of an existing stone (center on an empty
//! board), ranked by the priority scheme in the design doc so the search
//! sees its best guess first.

use crate::board::Board;
use crate::threat::{detect_all_threats, would_win, ThreatKind};
use crate::types::{Color, Move, BOARD_CELLS, BOARD_SIZE};

pub const MAX_KILLER_PLY: usize = 128;

const SCORE_MUST_BLOCK: i32 = 2_000_000;
const SCORE_WINNING: i32 = 1_500_000;
const SCORE_TT_MOVE: i32 = 1_000_000;
const SCORE_THREAT_CREATE: i32 = 800_000;
const SCORE_KILLER1: i32 = 500_000;
const SCORE_KILLER2: i32 = 400_000;
const SCORE_COUNTER_MAX: i32 = 150_000;
const SCORE_CONTINUATION_MAX: i32 = 300_000;
const SCORE_HISTORY_MAX: i32 = 20_000;

/// History / killer / counter-move / continuation-history tables. Owned
/// per search invocation, reset at the start of every `best_move` call.
pub struct MoveOrderer {
  history: [[u32; BOARD_CELLS]; 2],
  killers: Vec<[Option<Move>; 2]>,
  counter_move: [Option<Move>; BOARD_CELLS],
  continuation_history: Vec<u32>, // flattened [prev_sq][this_sq]
}

impl MoveOrderer {
  pub fn new() -> Self {
    MoveOrderer {
      history: [[0; BOARD_CELLS]; 2],
      killers: vec![[None, None]; MAX_KILLER_PLY],
      counter_move: [None; BOARD_CELLS],
      continuation_history: vec![0; BOARD_CELLS * BOARD_CELLS],
    }
  }

  pub fn clear(&mut self) {
    *self = MoveOrderer::new();
  }

  fn continuation_index(prev: Move, this: Move) -> usize {
    prev.square() * BOARD_CELLS + this.square()
  }

  /// Records a beta-cutoff for move ordering: killer slot, history bonus,
  /// counter-move, and continuation history all updated together.
  pub fn record_cutoff(&mut self, color: Color, ply: usize, depth: u32, mv: Move, prev_move: Option<Move>) {
    let bonus = depth * depth;
    self.history[color.index()][mv.square()] =
      self.history[color.index()][mv.square()].saturating_add(bonus);

    if ply < self.killers.len() {
      let slot = &mut self.killers[ply];
      if slot[0] != Some(mv) {
        slot[1] = slot[0];
        slot[0] = Some(mv);
      }
    }

    if let Some(prev) = prev_move {
      self.counter_move[prev.square()] = Some(mv);
      let idx = Self::continuation_index(prev, mv);
      self.continuation_history[idx] = self.continuation_history[idx].saturating_add(bonus);
    }
  }

  fn killer_score(&self, ply: usize, mv: Move) -> i32 {
    if ply >= self.killers.len() {
      return 0;
    }
    let slot = self.killers[ply];
    if slot[0] == Some(mv) {
      SCORE_KILLER1
    } else if slot[1] == Some(mv) {
      SCORE_KILLER2
    } else {
      0
    }
  }

  fn counter_score(&self, prev_move: Option<Move>, mv: Move) -> i32 {
    match prev_move {
      Some(prev) if self.counter_move[prev.square()] == Some(mv) => SCORE_COUNTER_MAX,
      _ => 0,
    }
  }

  fn continuation_score(&self, prev_move: Option<Move>, mv: Move) -> i32 {
    match prev_move {
      Some(prev) => {
        let raw = self.continuation_history[Self::continuation_index(prev, mv)];
        (raw.min(SCORE_CONTINUATION_MAX as u32)) as i32
      }
      None => 0,
    }
  }

  fn history_score(&self, color: Color, mv: Move) -> i32 {
    let raw = self.history[color.index()][mv.square()];
    raw.min(SCORE_HISTORY_MAX as u32) as i32
  }
}

impl Default for MoveOrderer {
  fn default() -> Self {
    MoveOrderer::new()
  }
}

fn center_distance(mv: Move) -> i32 {
  let center = (BOARD_SIZE as i32 - 1) / 2;
  (mv.x as i32 - center).abs().max((mv.y as i32 - center).abs())
}

/// Every empty cell within Chebyshev distance 2 of a stone, or the center
/// cell on an empty board.
pub fn generate_candidates(board: &Board) -> Vec<Move> {
  let occupied = board.occupied();
  if occupied.is_empty() {
    let c = (BOARD_SIZE / 2) as u8;
    return vec![Move::new(c, c)];
  }

  let mut seen = [false; BOARD_CELLS];
  let mut out = Vec::new();
  for sq in occupied.iter() {
    let x = (sq % BOARD_SIZE) as i32;
    let y = (sq / BOARD_SIZE) as i32;
    for dy in -2..=2 {
      for dx in -2..=2 {
        let nx = x + dx;
        let ny = y + dy;
        if Board::in_bounds(nx, ny) {
          let nsq = Move::new(nx as u8, ny as u8).square();
          if !seen[nsq] && board.is_empty(nx as u8, ny as u8) {
            seen[nsq] = true;
            out.push(Move::new(nx as u8, ny as u8));
          }
        }
      }
    }
  }
  out
}

/// Orders `candidates` best-first in place using the full priority scheme.
/// A plain sort is used in place of a genuinely incremental/streamed
/// priority queue: the end ordering is identical and this search's move
/// counts make a heap an unjustified complication.
#[allow(clippy::too_many_arguments)]
pub fn order_candidates(
  board: &mut Board,
  color: Color,
  mut candidates: Vec<Move>,
  orderer: &MoveOrderer,
  tt_move: Option<Move>,
  ply: usize,
) -> Vec<Move> {
  let prev_move = board.last_move();
  let my_threats = detect_all_threats(board, color);
  let opp_threats = detect_all_threats(board, color.other());

  let opp_must_block: std::collections::HashSet<Move> = opp_threats
    .iter()
    .filter(|t| t.kind == ThreatKind::OpenFour || t.kind == ThreatKind::ClosedFour || t.kind == ThreatKind::Five)
    .flat_map(|t| t.gain_squares.iter().copied())
    .collect();
  let my_threat_create: std::collections::HashSet<Move> = my_threats
    .iter()
    .filter(|t| t.kind >= ThreatKind::OpenThree)
    .flat_map(|t| t.gain_squares.iter().copied())
    .collect();

  let mut scored: Vec<(i32, Move)> = candidates
    .drain(..)
    .map(|mv| {
      let mut score = 0;
      if opp_must_block.contains(&mv) {
        score = score.max(SCORE_MUST_BLOCK);
      }
      if would_win(board, mv, color) {
        score = score.max(SCORE_WINNING);
      }
      if tt_move == Some(mv) {
        score = score.max(SCORE_TT_MOVE);
      }
      if my_threat_create.contains(&mv) {
        score = score.max(SCORE_THREAT_CREATE);
      }
      score += orderer.killer_score(ply, mv);
      score += orderer.counter_score(prev_move, mv);
      score += orderer.continuation_score(prev_move, mv);
      score += orderer.history_score(color, mv);
      (score, mv)
    })
    .collect();

  scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| center_distance(a.1).cmp(&center_distance(b.1))));
  scored.into_iter().map(|(_, mv)| mv).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_board_generates_center() {
    let board = Board::new();
    let candidates = generate_candidates(&board);
    assert_eq!(candidates, vec![Move::new(7, 7)]);
  }

  #[test]
  fn candidates_are_within_radius_two() {
    let mut board = Board::new();
    board.make_move(Move::new(7, 7));
    let candidates = generate_candidates(&board);
    assert!(candidates.iter().all(|m| {
      (m.x as i32 - 7).abs() <= 2 && (m.y as i32 - 7).abs() <= 2
    }));
    assert!(!candidates.contains(&Move::new(7, 7))); // occupied, excluded
  }

  #[test]
  fn must_block_square_is_ordered_first() {
    let mut board = Board::new();
    // Blue builds an open four; Red to move must block or lose next ply.
    board.make_move(Move::new(0, 0)); // R filler
    board.make_move(Move::new(5, 5)); // B
    board.make_move(Move::new(0, 1)); // R filler
    board.make_move(Move::new(6, 5)); // B
    board.make_move(Move::new(0, 2)); // R filler
    board.make_move(Move::new(7, 5)); // B
    board.make_move(Move::new(0, 3)); // R filler
    board.make_move(Move::new(8, 5)); // B open four at (5..8,5)
    // Red to move now.
    let candidates = generate_candidates(&board);
    let orderer = MoveOrderer::new();
    let ordered = order_candidates(&mut board, Color::Red, candidates, &orderer, None, 0);
    assert!(ordered[0] == Move::new(4, 5) || ordered[0] == Move::new(9, 5));
  }
}

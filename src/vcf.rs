//! VCF ("Victory by Continuous Four") solver (C7). Explores only moves
//! that create a four-in-a-row threat for the attacker, assuming the
//! defender always plays the forced block; bottoms out in a win, a
//! double-threat the defender cannot cover, or "no forced win found".

use std::collections::HashSet;

use crate::board::Board;
use crate::threat::{check_win, detect_threats, ThreatKind};
use crate::types::{Color, Move};

use crate::movegen::generate_candidates;

/// Moves that, played by `attacker`, create at least a closed four (or an
/// immediate win). These are the only moves a VCF line ever plays.
fn four_threat_moves(board: &mut Board, attacker: Color) -> Vec<Move> {
  let mut out = Vec::new();
  for mv in generate_candidates(board) {
    let undo = board.make_move(mv);
    let is_win = check_win(board) == Some(attacker);
    let has_four = detect_threats(board, attacker)
      .iter()
      .any(|t| t.kind == ThreatKind::OpenFour || t.kind == ThreatKind::ClosedFour);
    board.unmake_move(undo);
    if is_win || has_four {
      out.push(mv);
    }
  }
  out
}

/// Forced block squares for the four threat(s) the attacker just created.
/// More than one distinct square means the threat is unstoppable (an open
/// four, or two fours at once).
fn forced_blocks(board: &Board, attacker: Color) -> HashSet<Move> {
  detect_threats(board, attacker)
    .iter()
    .filter(|t| t.kind == ThreatKind::OpenFour || t.kind == ThreatKind::ClosedFour)
    .flat_map(|t| t.gain_squares.iter().copied())
    .collect()
}

/// Finds a forcing win for `attacker` within `max_depth` attacker moves.
/// Returns the full alternating move sequence (attacker, defender,
/// attacker, ...) ending in the attacker's winning placement, or `None`.
pub fn solve_vcf(board: &mut Board, attacker: Color, max_depth: u32) -> Option<Vec<Move>> {
  debug_assert_eq!(board.side_to_move(), attacker);
  let mut line = Vec::new();
  vcf_search(board, attacker, max_depth, &mut line)
}

fn vcf_search(board: &mut Board, attacker: Color, depth_left: u32, line: &mut Vec<Move>) -> Option<Vec<Move>> {
  if depth_left == 0 {
    return None;
  }

  for mv in four_threat_moves(board, attacker) {
    let undo = board.make_move(mv);
    line.push(mv);

    if check_win(board) == Some(attacker) {
      let result = line.clone();
      board.unmake_move(undo);
      line.pop();
      return Some(result);
    }

    let blocks = forced_blocks(board, attacker);
    if blocks.len() >= 2 {
      // Double threat: no single reply covers both, so this line wins
      // without needing to search further.
      let result = line.clone();
      board.unmake_move(undo);
      line.pop();
      return Some(result);
    }
    if blocks.is_empty() {
      // The placement won via overline-adjacent shape quirks rather than a
      // genuine four; treat as a dead end for this solver.
      board.unmake_move(undo);
      line.pop();
      continue;
    }

    let block = *blocks.iter().next().unwrap();
    let undo_block = board.make_move(block);
    line.push(block);

    let found = if check_win(board).is_some() {
      None // the forced block also happens to end the game; not a VCF win
    } else {
      vcf_search(board, attacker, depth_left - 1, line)
    };

    if let Some(result) = found {
      board.unmake_move(undo_block);
      line.pop();
      board.unmake_move(undo);
      line.pop();
      return Some(result);
    }

    board.unmake_move(undo_block);
    line.pop();
    board.unmake_move(undo);
    line.pop();
  }

  None
}

/// True if `attacker` has any forcing win within `max_depth`; used as a
/// cheap "is this position tactical" pre-check (e.g. by the ponderer).
pub fn has_vcf(board: &mut Board, attacker: Color, max_depth: u32) -> bool {
  solve_vcf(board, attacker, max_depth).is_some()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn finds_immediate_win_as_depth_one_vcf() {
    let mut board = Board::new();
    board.make_move(Move::new(0, 7)); // R
    board.make_move(Move::new(0, 8)); // B
    board.make_move(Move::new(1, 7)); // R
    board.make_move(Move::new(1, 8)); // B
    board.make_move(Move::new(2, 7)); // R
    board.make_move(Move::new(2, 8)); // B
    board.make_move(Move::new(3, 7)); // R
    board.make_move(Move::new(3, 8)); // B, Red to move with an open four
    let result = solve_vcf(&mut board, Color::Red, 4);
    assert!(result.is_some());
    assert_eq!(result.unwrap()[0], Move::new(4, 7));
  }

  #[test]
  fn quiet_position_has_no_vcf() {
    let mut board = Board::new();
    board.make_move(Move::new(7, 7));
    board.make_move(Move::new(0, 0));
    assert!(solve_vcf(&mut board, Color::Red, 8).is_none());
  }
}

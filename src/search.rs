//! Iterative-deepening negamax with PVS, null-move pruning, late move
//! reductions, and aspiration windows (C6). A single-threaded search
//! instance; C8 runs several of these against a shared `TranspositionTable`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::board::Board;
use crate::movegen::{self, MoveOrderer};
use crate::threat::{check_win, detect_threats, ThreatKind};
use crate::tt::{TTEntry, TTFlag, TranspositionTable};
use crate::types::{Color, Move};
use crate::vcf;

pub const WIN_SCORE: i32 = 1_000_000;
const NODE_CHECK_INTERVAL: u64 = 2048;
const NULL_MOVE_REDUCTION: u32 = 2;
const MIN_NULL_MOVE_DEPTH: u32 = 3;
const LMR_MIN_DEPTH: u32 = 3;
const LMR_MIN_MOVE_INDEX: usize = 4;

/// Shared stop signal and hard deadline, checked every `NODE_CHECK_INTERVAL`
/// nodes. Set by the time manager, an external caller, or the ponderer.
#[derive(Clone)]
pub struct SearchLimits {
  pub hard_deadline: Instant,
  pub stop: Arc<AtomicBool>,
}

impl SearchLimits {
  pub fn new(hard_deadline: Instant, stop: Arc<AtomicBool>) -> Self {
    SearchLimits { hard_deadline, stop }
  }
}

/// Outcome of one `Search::iterative_deepening` call.
pub struct SearchResult {
  pub best_move: Move,
  pub score: i32,
  pub depth_achieved: u32,
  pub nodes: u64,
  pub timed_out: bool,
}

pub struct Search<'a> {
  board: &'a mut Board,
  orderer: &'a mut MoveOrderer,
  tt: &'a TranspositionTable,
  limits: &'a SearchLimits,
  vcf_depth: u32,
  nodes: u64,
  stopped: bool,
}

impl<'a> Search<'a> {
  pub fn new(
    board: &'a mut Board,
    orderer: &'a mut MoveOrderer,
    tt: &'a TranspositionTable,
    limits: &'a SearchLimits,
    vcf_depth: u32,
  ) -> Self {
    Search { board, orderer, tt, limits, vcf_depth, nodes: 0, stopped: false }
  }

  pub fn nodes(&self) -> u64 {
    self.nodes
  }

  fn check_time(&mut self) {
    if self.nodes % NODE_CHECK_INTERVAL == 0 {
      if self.limits.stop.load(Ordering::Relaxed) || Instant::now() >= self.limits.hard_deadline {
        self.stopped = true;
      }
    }
  }

  /// Runs iterative deepening from depth 1 to `max_depth`, widening an
  /// aspiration window around the previous iteration's score. On
  /// cancellation, returns the last **completed** iteration's move, never
  /// a partially searched one.
  pub fn iterative_deepening(&mut self, color: Color, max_depth: u32) -> SearchResult {
    let fallback = movegen::generate_candidates(self.board)
      .into_iter()
      .next()
      .unwrap_or(Move::NONE);

    let mut best_move = fallback;
    let mut best_score = 0;
    let mut depth_achieved = 0;
    let mut prev_score: Option<i32> = None;
    let mut window = 50;

    for depth in 1..=max_depth.max(1) {
      if self.stopped {
        break;
      }

      let (mut alpha, mut beta) = match prev_score {
        Some(s) if depth > 1 => (s - window, s + window),
        _ => (-WIN_SCORE * 2, WIN_SCORE * 2),
      };

      let mut iteration_score = 0;
      let mut iteration_move = best_move;
      loop {
        let (score, mv) = self.root_search(color, depth, alpha, beta);
        if self.stopped {
          break;
        }
        if score <= alpha && alpha > -WIN_SCORE * 2 {
          alpha = -WIN_SCORE * 2;
          window *= 2;
          continue;
        }
        if score >= beta && beta < WIN_SCORE * 2 {
          beta = WIN_SCORE * 2;
          window *= 2;
          continue;
        }
        iteration_score = score;
        iteration_move = mv;
        window = 50;
        break;
      }

      if self.stopped {
        break;
      }

      best_score = iteration_score;
      best_move = iteration_move;
      depth_achieved = depth;
      prev_score = Some(best_score);

      if best_score.abs() >= WIN_SCORE - 1000 {
        break; // forced win/loss found, no need to search deeper
      }
    }

    self.tt.increment_age();

    SearchResult {
      best_move,
      score: best_score,
      depth_achieved,
      nodes: self.nodes,
      timed_out: self.stopped,
    }
  }

  /// Root node: like an interior node but also tracks which move produced
  /// the best score, since the facade needs an actual move to play.
  fn root_search(&mut self, color: Color, depth: u32, alpha: i32, beta: i32) -> (i32, Move) {
    self.nodes += 1;
    self.check_time();

    let candidates = movegen::generate_candidates(self.board);
    if candidates.is_empty() {
      return (0, Move::NONE);
    }

    let tt_move = self.tt.probe(self.board.hash()).and_then(|e| e.best_move);
    let ordered = movegen::order_candidates(self.board, color, candidates, self.orderer, tt_move, 0);

    let mut alpha = alpha;
    let mut best_score = -WIN_SCORE * 2;
    let mut best_move = ordered[0];

    for (idx, &mv) in ordered.iter().enumerate() {
      let undo = self.board.make_move(mv);
      let score = if check_win(self.board) == Some(color) {
        WIN_SCORE - 1
      } else if idx == 0 {
        -self.negamax(color.other(), depth - 1, -beta, -alpha, 1, true)
      } else {
        let mut s = -self.negamax(color.other(), depth - 1, -alpha - 1, -alpha, 1, false);
        if !self.stopped && s > alpha && s < beta {
          s = -self.negamax(color.other(), depth - 1, -beta, -alpha, 1, true);
        }
        s
      };
      self.board.unmake_move(undo);

      if self.stopped {
        return (best_score, best_move);
      }

      if score > best_score {
        best_score = score;
        best_move = mv;
      }
      if score > alpha {
        alpha = score;
      }
      if alpha >= beta {
        self.orderer.record_cutoff(color, 0, depth, mv, None);
        break;
      }
    }

    (best_score, best_move)
  }

  /// Interior negamax node with TT probing, null-move pruning, PVS, and
  /// late move reductions.
  fn negamax(&mut self, color: Color, depth: u32, mut alpha: i32, beta: i32, ply: usize, is_pv: bool) -> i32 {
    if self.stopped {
      return 0;
    }
    self.nodes += 1;
    self.check_time();
    if self.stopped {
      return 0;
    }

    if let Some(winner) = check_win(self.board) {
      return if winner == color { WIN_SCORE - ply as i32 } else { -(WIN_SCORE - ply as i32) };
    }
    if self.board.is_full() {
      return 0;
    }
    if depth == 0 {
      return self.quiescence(color, alpha, beta);
    }

    let hash = self.board.hash();
    let original_alpha = alpha;
    let mut beta = beta;

    let tt_entry = self.tt.probe(hash);
    if let Some(entry) = tt_entry {
      if entry.depth as u32 >= depth {
        match entry.flag {
          TTFlag::Exact => return entry.score,
          TTFlag::LowerBound => alpha = alpha.max(entry.score),
          TTFlag::UpperBound => beta = beta.min(entry.score),
        }
        if alpha >= beta {
          return entry.score;
        }
      }
    }

    // Null-move pruning: skip only when we're not already under an open
    // four against us (that would make "passing" unsound).
    if depth >= MIN_NULL_MOVE_DEPTH && !is_pv {
      let threatened = detect_threats(self.board, color.other())
        .iter()
        .any(|t| t.kind == ThreatKind::OpenFour);
      if !threatened {
        self.board.make_null_move();
        let reduced = depth.saturating_sub(1 + NULL_MOVE_REDUCTION);
        let score = -self.negamax(color.other(), reduced, -beta, -beta + 1, ply + 1, false);
        self.board.unmake_null_move();
        if self.stopped {
          return 0;
        }
        if score >= beta {
          return beta;
        }
      }
    }

    let candidates = movegen::generate_candidates(self.board);
    if candidates.is_empty() {
      return 0;
    }

    let tt_move = tt_entry.and_then(|e| e.best_move);
    let prev_move = self.board.last_move();
    let ordered = movegen::order_candidates(self.board, color, candidates, self.orderer, tt_move, ply);

    let mut best_score = -WIN_SCORE * 2;
    let mut best_move = ordered[0];

    for (idx, &mv) in ordered.iter().enumerate() {
      let undo = self.board.make_move(mv);

      let is_quiet_late = idx >= LMR_MIN_MOVE_INDEX && !is_pv;
      let score = if check_win(self.board) == Some(color) {
        WIN_SCORE - ply as i32 - 1
      } else if idx == 0 {
        -self.negamax(color.other(), depth - 1, -beta, -alpha, ply + 1, is_pv)
      } else {
        let reduced_depth = if depth >= LMR_MIN_DEPTH && is_quiet_late {
          let r = ((depth as f64).ln() * (idx as f64).ln() / 2.0).floor() as u32;
          depth.saturating_sub(1 + r).max(1)
        } else {
          depth - 1
        };

        let mut s = -self.negamax(color.other(), reduced_depth, -alpha - 1, -alpha, ply + 1, false);
        if !self.stopped && s > alpha && reduced_depth < depth - 1 {
          // LMR fail-high: re-search at full depth before trusting it.
          s = -self.negamax(color.other(), depth - 1, -alpha - 1, -alpha, ply + 1, false);
        }
        if !self.stopped && s > alpha && s < beta {
          s = -self.negamax(color.other(), depth - 1, -beta, -alpha, ply + 1, true);
        }
        s
      };

      self.board.unmake_move(undo);

      if self.stopped {
        return 0;
      }

      if score > best_score {
        best_score = score;
        best_move = mv;
      }
      if score > alpha {
        alpha = score;
      }
      if alpha >= beta {
        self.orderer.record_cutoff(color, ply, depth, mv, prev_move);
        break;
      }
    }

    let flag = if best_score <= original_alpha {
      TTFlag::UpperBound
    } else if best_score >= beta {
      TTFlag::LowerBound
    } else {
      TTFlag::Exact
    };
    self.tt.store(
      hash,
      TTEntry { depth: depth.min(u8::MAX as u32) as u8, score: best_score, best_move: Some(best_move), flag, age: 0 },
    );

    best_score
  }

  /// Leaf evaluation: extend forced sequences via the VCF solver before
  /// falling back to the static evaluator.
  fn quiescence(&mut self, color: Color, _alpha: i32, _beta: i32) -> i32 {
    if let Some(line) = vcf::solve_vcf(self.board, color, self.vcf_depth) {
      return WIN_SCORE - line.len() as i32;
    }
    crate::eval::evaluate(self.board, color)
  }
}

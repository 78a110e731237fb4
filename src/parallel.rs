//! Lazy-SMP parallel coordinator (C8). Runs several independent `Search`
//! instances against the same shared transposition table and lets them
//! race; helper threads search the same position at slightly perturbed
//! depths so their work diverges instead of duplicating the master.
//!
//! `thread_count == 0` (see `DifficultyProfile`) must run strictly single
//! threaded: no `rayon::scope` is entered at all in that case, so a
//! misconfigured thread pool can never silently upgrade a "braindead" or
//! "grandmaster" search into a parallel one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::board::Board;
use crate::movegen::MoveOrderer;
use crate::search::{Search, SearchLimits, SearchResult};
use crate::tt::TranspositionTable;
use crate::types::Color;

/// Runs `thread_count` helper searches plus the master, all against `tt`,
/// and returns the master's result. `thread_count == 0` degrades to exactly
/// the same single-threaded call `Search::iterative_deepening` would make
/// on its own; `thread_count` is otherwise the *total* worker count
/// including the master (so 1 also means single-threaded).
pub fn search_parallel(
  board: &Board,
  tt: &TranspositionTable,
  limits: &SearchLimits,
  color: Color,
  max_depth: u32,
  vcf_depth: u32,
  thread_count: usize,
) -> SearchResult {
  if thread_count <= 1 {
    let mut worker_board = board.clone();
    let mut orderer = MoveOrderer::new();
    let mut search = Search::new(&mut worker_board, &mut orderer, tt, limits, vcf_depth);
    return search.iterative_deepening(color, max_depth);
  }

  let master_done = Arc::new(AtomicBool::new(false));
  let mut master_result = None;

  rayon::scope(|scope| {
    for helper_id in 1..thread_count {
      let tt = &*tt;
      let limits = limits.clone();
      let mut helper_board = board.clone();
      let master_done = Arc::clone(&master_done);
      scope.spawn(move |_| {
        let mut orderer = MoveOrderer::new();
        // Helpers search one ply deeper or shallower than the master in a
        // round-robin so the tree they explore first genuinely differs,
        // instead of retracing the master's own move ordering.
        let depth_skew = if helper_id % 2 == 0 { 1 } else { 0 };
        let helper_depth = (max_depth + depth_skew).max(1);
        let mut search = Search::new(&mut helper_board, &mut orderer, tt, &limits, vcf_depth);
        while !master_done.load(Ordering::Relaxed) {
          let result = search.iterative_deepening(color, helper_depth);
          if result.timed_out {
            break;
          }
        }
      });
    }

    let mut master_board = board.clone();
    let mut master_orderer = MoveOrderer::new();
    let mut master_search = Search::new(&mut master_board, &mut master_orderer, tt, limits, vcf_depth);
    master_result = Some(master_search.iterative_deepening(color, max_depth));
    master_done.store(true, Ordering::Relaxed);
    // Helpers clone `limits.stop` from the same `Arc`, so flipping it here
    // (not just `master_done`) makes an in-flight helper bail out of its
    // current `iterative_deepening` at its next node checkpoint instead of
    // running to the shared hard deadline.
    limits.stop.store(true, Ordering::Relaxed);
  });

  master_result.expect("master search always runs inside the scope")
}

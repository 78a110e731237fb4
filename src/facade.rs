//! Search facade (C12): the public entry point. Orchestrates the opening
//! book, time manager, ponderer, and the single/parallel searcher behind
//! one call: `best_move`.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::board::Board;
use crate::book::OpeningBook;
use crate::error::{EngineError, EngineResult};
use crate::movegen::generate_candidates;
use crate::parallel::search_parallel;
use crate::ponder::{PonderState, Ponderer};
use crate::search::SearchLimits;
use crate::time_manager::TimeManager;
use crate::tt::TranspositionTable;
use crate::types::{AIMoveResult, Color, Difficulty, EngineConfig, Move, BOARD_CELLS};
use crate::vcf::solve_vcf;

pub struct Engine {
  config: EngineConfig,
  tt: Arc<TranspositionTable>,
  book: OpeningBook,
  ponderer: Ponderer,
  time_manager: TimeManager,
}

impl Engine {
  pub fn new(config: EngineConfig) -> EngineResult<Self> {
    let tt = Arc::new(TranspositionTable::new(config.tt_size_mib)?);
    let book = OpeningBook::empty();
    let profile = config.difficulty.profile();
    let ponderer = Ponderer::new(Arc::clone(&tt), profile.vcf_depth);
    let time_manager = TimeManager::new(Duration::from_secs(600));

    Ok(Engine { config, tt, book, ponderer, time_manager })
  }

  pub fn set_book(&mut self, book: OpeningBook) {
    self.book = book;
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// `best_move(board, side, difficulty, time_remaining_ms, move_number,
  /// pondering_enabled)`: book probe, then ponder-hit consumption, then
  /// C9 allocation, then single/parallel search dispatch by thread count.
  pub fn best_move(
    &mut self,
    board: &mut Board,
    side: Color,
    difficulty: Difficulty,
    time_remaining_ms: u64,
    move_number: u32,
    pondering_enabled: bool,
  ) -> EngineResult<AIMoveResult> {
    if board.is_full() {
      return Err(EngineError::GameOver);
    }
    let started = Instant::now();
    let mut profile = difficulty.profile();
    profile.pondering_enabled &= pondering_enabled;

    if let Some(mv) = self.book.lookup(board, side) {
      return Ok(AIMoveResult {
        x: mv.x,
        y: mv.y,
        depth_achieved: 0,
        nodes_searched: 0,
        nodes_per_second: 0,
        time_taken_ms: started.elapsed().as_millis() as u64,
        score: 0,
        pondering_active: false,
        timed_out: false,
      });
    }

    if difficulty == Difficulty::Braindead {
      return self.random_legal_move(board, started);
    }

    let mut ponder_elapsed = Duration::ZERO;
    let consumed = if self.ponderer.state() == PonderState::PonderHit {
      self.ponderer.consume_result()
    } else {
      None
    };

    self.time_manager = TimeManager::new(Duration::from_millis(time_remaining_ms));
    let _ = move_number;
    let (soft, hard) = self.time_manager.allocate();
    let max_depth = profile
      .max_depth_cap
      .min(self.time_manager.calc_max_depth(board.move_count(), BOARD_CELLS));

    // Pre-filter: if we already have a forcing win, play it without
    // waiting on the general search's time-boxed depth.
    if let Some(line) = solve_vcf(board, side, profile.vcf_depth) {
      if let Some(&first) = line.first() {
        return Ok(AIMoveResult {
          x: first.x,
          y: first.y,
          depth_achieved: 0,
          nodes_searched: 0,
          nodes_per_second: 0,
          time_taken_ms: started.elapsed().as_millis() as u64,
          score: crate::search::WIN_SCORE,
          pondering_active: false,
          timed_out: false,
        });
      }
    }

    // Emergency check: would the opponent have a forcing win if it were
    // their turn right now? `make_null_move` flips side-to-move without
    // placing a stone so `solve_vcf`'s precondition (attacker == side to
    // move) holds for this hypothetical.
    board.make_null_move();
    let opponent_vcf = solve_vcf(board, side.other(), profile.vcf_depth);
    board.unmake_null_move();
    if let Some(line) = opponent_vcf {
      if let Some(&threat_square) = line.first() {
        // `threat_square` is the move the opponent would play to start
        // their forcing sequence; occupying it ourselves denies the line.
        return Ok(AIMoveResult {
          x: threat_square.x,
          y: threat_square.y,
          depth_achieved: 0,
          nodes_searched: 0,
          nodes_per_second: 0,
          time_taken_ms: started.elapsed().as_millis() as u64,
          score: -crate::search::WIN_SCORE,
          pondering_active: false,
          timed_out: false,
        });
      }
    }

    let result = if let Some((ponder_result, elapsed)) = consumed {
      ponder_elapsed = elapsed;
      ponder_result
    } else {
      let stop = Arc::new(AtomicBool::new(false));
      let limits = SearchLimits::new(Instant::now() + hard, stop);
      search_parallel(board, &self.tt, &limits, side, max_depth, profile.vcf_depth, profile.thread_count)
    };

    let elapsed = started.elapsed().saturating_sub(ponder_elapsed).max(Duration::from_millis(1));
    self.time_manager.report_time_used(elapsed.min(soft.max(elapsed)));

    let nps = (result.nodes as f64 / elapsed.as_secs_f64().max(0.001)) as u64;

    if result.best_move.is_none() {
      return self.random_legal_move(board, started);
    }

    if profile.pondering_enabled {
      let mut predicted_board = board.clone();
      predicted_board.make_move(result.best_move);
      if let Some(predicted_reply) = generate_candidates(&predicted_board).into_iter().next() {
        self.ponderer.start(&predicted_board, side, predicted_reply);
      }
    }

    Ok(AIMoveResult {
      x: result.best_move.x,
      y: result.best_move.y,
      depth_achieved: result.depth_achieved,
      nodes_searched: result.nodes,
      nodes_per_second: nps,
      time_taken_ms: started.elapsed().as_millis() as u64,
      score: result.score,
      pondering_active: profile.pondering_enabled,
      timed_out: result.timed_out,
    })
  }

  pub fn start_pondering(&self, board: &Board, side: Color, predicted_opp_move: Move) {
    self.ponderer.start(board, side, predicted_opp_move);
  }

  pub fn stop_pondering(&self) {
    self.ponderer.stop();
  }

  pub fn notify_opponent_move(&self, actual: Move) {
    self.ponderer.handle_opponent_move(actual);
  }

  pub fn reset_for_new_game(&mut self) {
    self.tt.clear();
    self.ponderer.stop();
  }

  /// Fallback used by `Braindead` and by any path that otherwise failed to
  /// produce a move: a random legal move, weighted toward the center so
  /// "braindead" doesn't mean "plays in the corners" (`best_move` must
  /// always return a legal move when one exists, per the error-handling
  /// design).
  fn random_legal_move(&self, board: &Board, started: Instant) -> EngineResult<AIMoveResult> {
    use rand::distributions::{Distribution, WeightedIndex};

    let candidates = generate_candidates(board);
    if candidates.is_empty() {
      return Err(EngineError::GameOver);
    }
    let center = (crate::types::BOARD_SIZE as i32 - 1) / 2;
    let weights: Vec<u32> = candidates
      .iter()
      .map(|m| {
        let dist = (m.x as i32 - center).abs().max((m.y as i32 - center).abs());
        (crate::types::BOARD_SIZE as u32).saturating_sub(dist as u32).max(1)
      })
      .collect();
    let dist = WeightedIndex::new(&weights).map_err(|e| EngineError::Internal(e.to_string()))?;
    let mut rng = rand::thread_rng();
    let mv = candidates[dist.sample(&mut rng)];

    Ok(AIMoveResult {
      x: mv.x,
      y: mv.y,
      depth_achieved: 0,
      nodes_searched: 0,
      nodes_per_second: 0,
      time_taken_ms: started.elapsed().as_millis() as u64,
      score: 0,
      pondering_active: false,
      timed_out: false,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn best_move_returns_legal_center_move_on_empty_board() {
    let mut engine = Engine::new(EngineConfig::builder().difficulty(Difficulty::Easy).tt_size_mib(1).build())
      .expect("engine should construct");
    let mut board = Board::new();
    let result = engine.best_move(&mut board, Color::Red, Difficulty::Easy, 5_000, 0, true).unwrap();
    assert_eq!((result.x, result.y), (7, 7));
  }

  #[test]
  fn braindead_always_returns_a_legal_move() {
    let mut engine = Engine::new(EngineConfig::builder().tt_size_mib(1).build()).unwrap();
    let mut board = Board::new();
    board.make_move(Move::new(7, 7));
    let result = engine.best_move(&mut board, Color::Blue, Difficulty::Braindead, 5_000, 1, false).unwrap();
    assert!(board.is_empty(result.x, result.y));
  }

  #[test]
  fn game_over_on_full_board_is_an_error() {
    let mut engine = Engine::new(EngineConfig::builder().tt_size_mib(1).build()).unwrap();
    let mut board = Board::new();
    for y in 0..15u8 {
      for x in 0..15u8 {
        board.make_move(Move::new(x, y));
      }
    }
    let result = engine.best_move(&mut board, Color::Red, Difficulty::Easy, 1_000, 200, true);
    assert!(matches!(result, Err(EngineError::GameOver)));
  }

  #[test]
  fn grandmaster_dispatches_single_threaded() {
    let mut engine =
      Engine::new(EngineConfig::builder().difficulty(Difficulty::Grandmaster).tt_size_mib(1).build()).unwrap();
    let mut board = Board::new();
    board.make_move(Move::new(7, 7));
    let result = engine.best_move(&mut board, Color::Blue, Difficulty::Grandmaster, 2_000, 1, true).unwrap();
    assert!(board.is_empty(result.x, result.y));
  }
}

//! Pondering actor (C11). Owns a background worker thread and a
//! `crossbeam_channel` mailbox; callers never see a raw thread handle,
//! only `start`/`stop`/`handle_opponent_move` messages and a snapshot of
//! the current state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender};

use crate::board::Board;
use crate::movegen::MoveOrderer;
use crate::search::{Search, SearchLimits, SearchResult};
use crate::threat::detect_threats;
use crate::tt::TranspositionTable;
use crate::types::{Color, Move};
use crate::vcf::has_vcf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PonderState {
  Idle,
  Pondering,
  PonderHit,
  PonderMiss,
}

struct PonderJob {
  predicted_opp_move: Move,
  board_after_predicted: Board,
  our_color: Color,
  started_at: Instant,
}

enum Message {
  Start(PonderJob),
  OpponentMoved(Move),
  Stop,
  Shutdown,
}

/// Shared state the background worker publishes into; read by the facade
/// without blocking on the worker.
struct Shared {
  state: Mutex<PonderState>,
  result: Mutex<Option<SearchResult>>,
  predicted_move: Mutex<Option<Move>>,
  started_at: Mutex<Option<Instant>>,
  hit_at: Mutex<Option<Instant>>,
}

pub struct Ponderer {
  tx: Sender<Message>,
  shared: Arc<Shared>,
  worker_stop: Arc<AtomicBool>,
  handle: Option<JoinHandle<()>>,
}

impl Ponderer {
  pub fn new(tt: Arc<TranspositionTable>, vcf_depth: u32) -> Self {
    let (tx, rx) = bounded::<Message>(8);
    let shared = Arc::new(Shared {
      state: Mutex::new(PonderState::Idle),
      result: Mutex::new(None),
      predicted_move: Mutex::new(None),
      started_at: Mutex::new(None),
      hit_at: Mutex::new(None),
    });
    let worker_stop = Arc::new(AtomicBool::new(false));

    let worker_shared = Arc::clone(&shared);
    let worker_stop_flag = Arc::clone(&worker_stop);
    let handle = std::thread::spawn(move || {
      ponder_loop(rx, tt, vcf_depth, worker_shared, worker_stop_flag);
    });

    Ponderer { tx, shared, worker_stop, handle: Some(handle) }
  }

  pub fn state(&self) -> PonderState {
    *self.shared.state.lock().expect("ponder state lock poisoned")
  }

  /// `StartPondering`: unless the position is tactically quiet (cheap VCF
  /// pre-check upstream), fork a background search on `board +
  /// predicted_opp_move`.
  pub fn start(&self, board: &Board, our_color: Color, predicted_opp_move: Move) {
    let mut board_after_predicted = board.clone();
    board_after_predicted.make_move(predicted_opp_move);
    let started_at = Instant::now();
    *self.shared.predicted_move.lock().expect("lock poisoned") = Some(predicted_opp_move);
    *self.shared.started_at.lock().expect("lock poisoned") = Some(started_at);
    *self.shared.hit_at.lock().expect("lock poisoned") = None;
    *self.shared.state.lock().expect("lock poisoned") = PonderState::Pondering;
    let _ = self.tx.send(Message::Start(PonderJob {
      predicted_opp_move,
      board_after_predicted,
      our_color,
      started_at,
    }));
  }

  /// `HandleOpponentMove`: transitions to `PonderHit` or `PonderMiss`
  /// depending on whether the actual move matches the prediction. Stops the
  /// in-flight search first (same cooperative flag `stop` uses) so the
  /// worker bails out of `iterative_deepening` within 2048 nodes instead of
  /// running to its 300s deadline before this message is even looked at.
  pub fn handle_opponent_move(&self, actual: Move) {
    self.worker_stop.store(true, Ordering::Relaxed);
    let _ = self.tx.send(Message::OpponentMoved(actual));
  }

  /// `StopPondering`: must return within a bounded time. Signals the
  /// worker's cooperative stop flag (checked every 2048 nodes, same as
  /// C6) and does not wait for the worker to acknowledge.
  pub fn stop(&self) {
    self.worker_stop.store(true, Ordering::Relaxed);
    let _ = self.tx.send(Message::Stop);
  }

  /// `ConsumeResult`: takes the partial result on a ponder-hit and resets
  /// to `Idle`. Returns `None` on anything but a hit. The returned duration
  /// is the time the background search actually ran, from `start` until the
  /// opponent's move was recorded as a hit, so the caller can credit it
  /// toward the move's time budget.
  pub fn consume_result(&self) -> Option<(SearchResult, Duration)> {
    let mut state = self.shared.state.lock().expect("lock poisoned");
    if *state != PonderState::PonderHit {
      return None;
    }
    let result = self.shared.result.lock().expect("lock poisoned").take()?;
    let started_at = self.shared.started_at.lock().expect("lock poisoned").take();
    let hit_at = self.shared.hit_at.lock().expect("lock poisoned").take();
    let elapsed = match (started_at, hit_at) {
      (Some(started), Some(hit)) => hit.saturating_duration_since(started),
      _ => Duration::ZERO,
    };
    *state = PonderState::Idle;
    Some((result, elapsed))
  }
}

impl Drop for Ponderer {
  fn drop(&mut self) {
    self.worker_stop.store(true, Ordering::Relaxed);
    let _ = self.tx.send(Message::Shutdown);
    if let Some(handle) = self.handle.take() {
      let _ = handle.join();
    }
  }
}

fn ponder_loop(
  rx: crossbeam_channel::Receiver<Message>,
  tt: Arc<TranspositionTable>,
  vcf_depth: u32,
  shared: Arc<Shared>,
  worker_stop: Arc<AtomicBool>,
) {
  while let Ok(msg) = rx.recv() {
    match msg {
      Message::Shutdown => return,
      Message::Stop => {
        *shared.state.lock().expect("lock poisoned") = PonderState::Idle;
      }
      Message::OpponentMoved(actual) => {
        let predicted = *shared.predicted_move.lock().expect("lock poisoned");
        let is_hit = predicted == Some(actual);
        worker_stop.store(true, Ordering::Relaxed);
        if is_hit {
          *shared.hit_at.lock().expect("lock poisoned") = Some(Instant::now());
        }
        let mut state = shared.state.lock().expect("lock poisoned");
        *state = if is_hit { PonderState::PonderHit } else { PonderState::PonderMiss };
      }
      Message::Start(job) => {
        worker_stop.store(false, Ordering::Relaxed);
        run_ponder_job(job, &tt, vcf_depth, &shared, &worker_stop);
      }
    }
  }
}

fn run_ponder_job(
  mut job: PonderJob,
  tt: &TranspositionTable,
  vcf_depth: u32,
  shared: &Shared,
  worker_stop: &Arc<AtomicBool>,
) {
  let tactical = has_vcf(&mut job.board_after_predicted, job.our_color, vcf_depth.min(8))
    || detect_threats(&job.board_after_predicted, job.our_color.other())
      .iter()
      .any(|t| t.kind >= crate::threat::ThreatKind::OpenThree);
  tracing::debug!(predicted = ?job.predicted_opp_move, tactical, "pondering started");

  let limits = SearchLimits::new(job.started_at + Duration::from_secs(300), Arc::clone(worker_stop));
  let mut orderer = MoveOrderer::new();
  let mut search = Search::new(&mut job.board_after_predicted, &mut orderer, tt, &limits, vcf_depth);
  let result = search.iterative_deepening(job.our_color, 32);

  *shared.result.lock().expect("lock poisoned") = Some(result);
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[test]
  fn starts_idle() {
    let tt = Arc::new(TranspositionTable::new(1).unwrap());
    let ponderer = Ponderer::new(tt, 4);
    assert_eq!(ponderer.state(), PonderState::Idle);
  }

  /// A board where Red has already moved, so it's Blue's turn — matching
  /// the facade's real call shape: `start`'s `board` argument already
  /// reflects our own move, and `predicted_opp_move` is played by the
  /// opponent on top of it, leaving the job's board with us back on move.
  fn board_after_our_move() -> Board {
    let mut board = Board::new();
    board.make_move(Move::new(0, 0));
    board
  }

  #[test]
  fn stop_returns_promptly() {
    let tt = Arc::new(TranspositionTable::new(1).unwrap());
    let ponderer = Ponderer::new(tt, 4);
    let board = board_after_our_move();
    ponderer.start(&board, Color::Red, Move::new(7, 7));
    std::thread::sleep(Duration::from_millis(20));
    let start = Instant::now();
    ponderer.stop();
    assert!(start.elapsed() < Duration::from_secs(1));
  }

  #[test]
  fn matching_reply_transitions_to_ponder_hit() {
    let tt = Arc::new(TranspositionTable::new(1).unwrap());
    let ponderer = Ponderer::new(tt, 4);
    let board = board_after_our_move();
    ponderer.start(&board, Color::Red, Move::new(7, 7));
    ponderer.handle_opponent_move(Move::new(7, 7));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(ponderer.state(), PonderState::PonderHit);
  }

  #[test]
  fn mismatched_reply_transitions_to_ponder_miss() {
    let tt = Arc::new(TranspositionTable::new(1).unwrap());
    let ponderer = Ponderer::new(tt, 4);
    let board = board_after_our_move();
    ponderer.start(&board, Color::Red, Move::new(7, 7));
    ponderer.handle_opponent_move(Move::new(0, 0));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(ponderer.state(), PonderState::PonderMiss);
  }
}

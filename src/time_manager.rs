//! Time allocation (C9). Splits a game's total budget into a per-move
//! slice and tracks an exponential moving average of recent overruns so
//! later moves compensate for earlier ones running long.

use std::time::Duration;

const EMA_ALPHA: f64 = 0.3;
const MIN_MOVE_MS: u64 = 50;
const SOFT_BUDGET_FRACTION: f64 = 0.9;

pub struct TimeManager {
  remaining: Duration,
  moves_played: u32,
  estimated_moves_left: u32,
  overrun_ema_ms: f64,
}

impl TimeManager {
  pub fn new(total_budget: Duration) -> Self {
    TimeManager {
      remaining: total_budget,
      moves_played: 0,
      estimated_moves_left: 30,
      overrun_ema_ms: 0.0,
    }
  }

  /// Soft and hard allocations for the next move. The searcher should stop
  /// deepening past `soft`, but may run until `hard` if a tactical line is
  /// still being resolved (handled by the caller, not this type).
  pub fn allocate(&self) -> (Duration, Duration) {
    let moves_left = self.estimated_moves_left.max(1) as f64;
    let base_ms = (self.remaining.as_millis() as f64 / moves_left).max(MIN_MOVE_MS as f64);
    let adjusted_ms = (base_ms - self.overrun_ema_ms).max(MIN_MOVE_MS as f64);

    let soft = Duration::from_millis(adjusted_ms as u64);
    let hard = Duration::from_millis((adjusted_ms / SOFT_BUDGET_FRACTION) as u64).min(self.remaining);
    (soft, hard.max(soft))
  }

  /// A coarse depth ceiling derived from the soft allocation: deeper
  /// searches are pointless once the position is mostly full, since the
  /// remaining candidate set shrinks every ply.
  pub fn calc_max_depth(&self, stones_placed: usize, board_cells: usize) -> u32 {
    let (soft, _) = self.allocate();
    let ms = soft.as_millis().max(1) as f64;
    let time_based = (ms.log2().max(1.0) * 2.0) as u32;
    let fullness = stones_placed as f64 / board_cells as f64;
    let fullness_bonus = (fullness * 10.0) as u32;
    (time_based + fullness_bonus).clamp(1, 32)
  }

  /// Feeds back how long a move actually took, updating the EMA and the
  /// remaining clock. Called once per move by the facade.
  pub fn report_time_used(&mut self, actual: Duration) {
    let (soft, _) = self.allocate();
    let overrun_ms = actual.as_millis() as f64 - soft.as_millis() as f64;
    self.overrun_ema_ms = EMA_ALPHA * overrun_ms + (1.0 - EMA_ALPHA) * self.overrun_ema_ms;

    self.remaining = self.remaining.saturating_sub(actual);
    self.moves_played += 1;
    self.estimated_moves_left = self.estimated_moves_left.saturating_sub(1).max(1);
  }

  pub fn remaining(&self) -> Duration {
    self.remaining
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allocates_a_fraction_of_remaining_time() {
    let tm = TimeManager::new(Duration::from_secs(300));
    let (soft, hard) = tm.allocate();
    assert!(soft.as_millis() > 0);
    assert!(hard >= soft);
    assert!(soft < Duration::from_secs(300));
  }

  #[test]
  fn overrun_reduces_next_allocation() {
    let mut tm = TimeManager::new(Duration::from_secs(60));
    let (soft_before, _) = tm.allocate();
    tm.report_time_used(soft_before * 3);
    let (soft_after, _) = tm.allocate();
    assert!(soft_after <= soft_before);
  }

  #[test]
  fn remaining_time_never_goes_negative() {
    let mut tm = TimeManager::new(Duration::from_millis(100));
    tm.report_time_used(Duration::from_secs(10));
    assert_eq!(tm.remaining(), Duration::ZERO);
  }

  #[test]
  fn deeper_search_allowed_as_board_fills() {
    let tm = TimeManager::new(Duration::from_secs(60));
    let early = tm.calc_max_depth(4, 225);
    let late = tm.calc_max_depth(180, 225);
    assert!(late >= early);
  }
}

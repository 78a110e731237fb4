//! Pattern-based static evaluator (C2). Scores a position from the given
//! color's perspective by sliding a length-6 window across every line in
//! all four directions and summing a precomputed per-window score.
//!
//! Both `evaluate_scalar` and `evaluate_simd` read from the same
//! first-principles-generated `PATTERN_TABLE`, so they agree by
//! construction; `evaluate_simd` only vectorizes the window-encoding and
//! horizontal-sum steps (the table lookup itself stays scalar, same as any
//! gather-less SIMD evaluator).

use wide::i32x8;

use crate::board::Board;
use crate::types::{Color, BOARD_SIZE};

const FIVE: i32 = 100_000;
const OPEN_FOUR: i32 = 10_000;
const CLOSED_FOUR: i32 = 1_000;
const OPEN_THREE: i32 = 1_000;
const CLOSED_THREE: i32 = 100;
const OPEN_TWO: i32 = 100;
const CENTER_BONUS: i32 = 50;

const WINDOW_LEN: usize = 6;
const WINDOW_STATES: usize = 729; // 3^6

/// Disagreement beyond this between scalar and SIMD evaluators indicates a
/// bug in one of the two implementations, per spec tolerance.
pub const EVAL_TOLERANCE: i32 = 2_500;

fn run_score(len: i32, open_ends: i32) -> i32 {
  match (len, open_ends) {
    (l, _) if l >= 5 => FIVE,
    (4, 2) => OPEN_FOUR,
    (4, 1) => CLOSED_FOUR,
    (3, 2) => OPEN_THREE,
    (3, 1) => CLOSED_THREE,
    (2, 2) => OPEN_TWO,
    _ => 0,
  }
}

/// Scores a single length-6 window from first principles: find each
/// maximal run of "mine" cells, classify its ends as open (empty, or off
/// the edge of the window) or closed (blocked / opponent), and sum
/// `run_score` over all runs found.
fn window_score_from_cells(cells: [u8; WINDOW_LEN]) -> i32 {
  let mut score = 0;
  let mut i = 0;
  while i < WINDOW_LEN {
    if cells[i] == 1 {
      let start = i;
      let mut j = i;
      while j < WINDOW_LEN && cells[j] == 1 {
        j += 1;
      }
      let run_len = (j - start) as i32;
      let left_open = start == 0 || cells[start - 1] == 0;
      let right_open = j == WINDOW_LEN || cells[j] == 0;
      score += run_score(run_len, left_open as i32 + right_open as i32);
      i = j;
    } else {
      i += 1;
    }
  }
  score
}

fn decode_window(mut idx: usize) -> [u8; WINDOW_LEN] {
  let mut cells = [0u8; WINDOW_LEN];
  for cell in cells.iter_mut() {
    *cell = (idx % 3) as u8;
    idx /= 3;
  }
  cells
}

fn build_pattern_table() -> Vec<i32> {
  (0..WINDOW_STATES)
    .map(|idx| window_score_from_cells(decode_window(idx)))
    .collect()
}

lazy_static::lazy_static! {
  static ref PATTERN_TABLE: Vec<i32> = build_pattern_table();
}

#[inline]
fn encode_window(padded: &[u8], p: usize) -> usize {
  let mut idx = 0usize;
  let mut mult = 1usize;
  for k in 0..WINDOW_LEN {
    idx += padded[p + k] as usize * mult;
    mult *= 3;
  }
  idx
}

/// A single line on the board: a starting square and direction, as long as
/// it still has room for at least one stone.
struct Line {
  start_x: i32,
  start_y: i32,
  dx: i32,
  dy: i32,
  len: usize,
}

fn all_lines() -> Vec<Line> {
  let size = BOARD_SIZE as i32;
  let mut lines = Vec::new();

  for y in 0..size {
    lines.push(Line { start_x: 0, start_y: y, dx: 1, dy: 0, len: size as usize });
  }
  for x in 0..size {
    lines.push(Line { start_x: x, start_y: 0, dx: 0, dy: 1, len: size as usize });
  }
  // Down-right diagonals.
  for start_x in 0..size {
    let len = (size - start_x) as usize;
    if len >= 2 {
      lines.push(Line { start_x, start_y: 0, dx: 1, dy: 1, len });
    }
  }
  for start_y in 1..size {
    let len = (size - start_y) as usize;
    if len >= 2 {
      lines.push(Line { start_x: 0, start_y, dx: 1, dy: 1, len });
    }
  }
  // Down-left diagonals.
  for start_x in 0..size {
    let len = (start_x + 1) as usize;
    if len >= 2 {
      lines.push(Line { start_x, start_y: 0, dx: -1, dy: 1, len });
    }
  }
  for start_y in 1..size {
    let len = (size - start_y) as usize;
    if len >= 2 {
      lines.push(Line { start_x: size - 1, start_y, dx: -1, dy: 1, len });
    }
  }

  lines
}

/// Builds the padded, perspective-relative cell array for a line: 0 =
/// empty, 1 = `color`, 2 = opponent-or-off-board ("wall"). Five cells of
/// wall padding on each side let every in-board stone appear in a full
/// length-6 window regardless of its position on the line.
fn padded_line(board: &Board, color: Color, line: &Line) -> Vec<u8> {
  let mut out = vec![2u8; line.len + 2 * (WINDOW_LEN - 1)];
  for i in 0..line.len {
    let x = line.start_x + line.dx * i as i32;
    let y = line.start_y + line.dy * i as i32;
    let val = match board.cell(x as u8, y as u8) {
      None => 0,
      Some(c) if c == color => 1,
      Some(_) => 2,
    };
    out[WINDOW_LEN - 1 + i] = val;
  }
  out
}

fn center_bonus(board: &Board, color: Color) -> i32 {
  let size = BOARD_SIZE as i32;
  let center = (size - 1) / 2;
  let mut bonus = 0;
  for sq in board.bitboard(color).iter() {
    let x = (sq % BOARD_SIZE) as i32;
    let y = (sq / BOARD_SIZE) as i32;
    if (x - center).abs().max((y - center).abs()) <= 2 {
      bonus += CENTER_BONUS;
    }
  }
  bonus
}

fn pattern_score_scalar(board: &Board, color: Color) -> i32 {
  let mut total = 0;
  for line in all_lines() {
    let padded = padded_line(board, color, &line);
    let windows = padded.len() - (WINDOW_LEN - 1);
    for p in 0..windows {
      total += PATTERN_TABLE[encode_window(&padded, p)];
    }
  }
  total
}

fn pattern_score_simd(board: &Board, color: Color) -> i32 {
  let mut total = 0i32;
  for line in all_lines() {
    let padded = padded_line(board, color, &line);
    let windows = padded.len() - (WINDOW_LEN - 1);

    let mut p = 0;
    while p + 8 <= windows {
      // Vectorize the base-3 multiply-accumulate across 8 adjacent window
      // start offsets; the table lookup itself stays scalar (no gather).
      let mut idx = i32x8::splat(0);
      let mut mult = 1i32;
      for k in 0..WINDOW_LEN {
        let lane = i32x8::new([
          padded[p + k] as i32,
          padded[p + 1 + k] as i32,
          padded[p + 2 + k] as i32,
          padded[p + 3 + k] as i32,
          padded[p + 4 + k] as i32,
          padded[p + 5 + k] as i32,
          padded[p + 6 + k] as i32,
          padded[p + 7 + k] as i32,
        ]);
        idx += lane * i32x8::splat(mult);
        mult *= 3;
      }
      let lanes = idx.to_array();
      for &l in lanes.iter() {
        total += PATTERN_TABLE[l as usize];
      }
      p += 8;
    }
    while p < windows {
      total += PATTERN_TABLE[encode_window(&padded, p)];
      p += 1;
    }
  }
  total
}

fn combine(my_score: i32, opp_score: i32, bonus: i32) -> i32 {
  my_score - (opp_score * 3) / 2 + bonus
}

/// Reference scalar evaluator. Ground truth for the SIMD/scalar agreement
/// property test.
pub fn evaluate_scalar(board: &Board, color: Color) -> i32 {
  let my = pattern_score_scalar(board, color);
  let opp = pattern_score_scalar(board, color.other());
  combine(my, opp, center_bonus(board, color))
}

/// SIMD-accelerated evaluator. Selected at runtime/compile time by
/// `evaluate`; must agree with `evaluate_scalar` within `EVAL_TOLERANCE`.
pub fn evaluate_simd(board: &Board, color: Color) -> i32 {
  let my = pattern_score_simd(board, color);
  let opp = pattern_score_simd(board, color.other());
  combine(my, opp, center_bonus(board, color))
}

/// Picks scalar vs SIMD at compile time behind the `simd-eval` feature
/// (default on). Scalar stays the ground truth either way.
pub fn evaluate(board: &Board, color: Color) -> i32 {
  if cfg!(feature = "simd-eval") {
    evaluate_simd(board, color)
  } else {
    evaluate_scalar(board, color)
  }
}

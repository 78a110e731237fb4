use crate::types::{Color, Move, BOARD_CELLS, BOARD_SIZE};

/// A packed 225-bit set, one bit per board square. Backed by four `u64`
/// words (256 bits of storage, top 31 bits of the last word unused).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bitboard225([u64; 4]);

impl Bitboard225 {
  pub const EMPTY: Bitboard225 = Bitboard225([0; 4]);

  #[inline]
  fn word_bit(sq: usize) -> (usize, u64) {
    (sq / 64, 1u64 << (sq % 64))
  }

  #[inline]
  pub fn get(&self, sq: usize) -> bool {
    let (w, b) = Self::word_bit(sq);
    self.0[w] & b != 0
  }

  #[inline]
  pub fn set(&mut self, sq: usize) {
    let (w, b) = Self::word_bit(sq);
    self.0[w] |= b;
  }

  #[inline]
  pub fn clear(&mut self, sq: usize) {
    let (w, b) = Self::word_bit(sq);
    self.0[w] &= !b;
  }

  pub fn popcount(&self) -> u32 {
    self.0.iter().map(|w| w.count_ones()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.0.iter().all(|&w| w == 0)
  }

  pub fn union(&self, other: &Bitboard225) -> Bitboard225 {
    let mut out = [0u64; 4];
    for i in 0..4 {
      out[i] = self.0[i] | other.0[i];
    }
    Bitboard225(out)
  }

  pub fn intersects(&self, other: &Bitboard225) -> bool {
    (0..4).any(|i| self.0[i] & other.0[i] != 0)
  }

  /// Iterate the set square indices, low to high.
  pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
    (0..4).flat_map(move |w| {
      let mut word = self.0[w];
      let base = w * 64;
      std::iter::from_fn(move || {
        if word == 0 {
          None
        } else {
          let bit = word.trailing_zeros() as usize;
          word &= word - 1;
          Some(base + bit)
        }
      })
    })
  }
}

fn splitmix64(state: &mut u64) -> u64 {
  *state = state.wrapping_add(0x9E3779B97F4A7C15);
  let mut z = *state;
  z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
  z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
  z ^ (z >> 31)
}

/// Zobrist keys for the 225 squares times two colors, plus a side-to-move
/// key. Deterministic for a given seed so a position hashes identically
/// across runs and across processes (property tested in `board::tests`).
#[derive(Clone)]
pub struct ZobristTable {
  keys: [[u64; 2]; BOARD_CELLS],
  side_to_move: u64,
}

pub const DEFAULT_ZOBRIST_SEED: u64 = 0x5EED_C0FF_EE15_CA40;

impl ZobristTable {
  pub fn new(seed: u64) -> Self {
    let mut state = seed;
    let mut keys = [[0u64; 2]; BOARD_CELLS];
    for sq in keys.iter_mut() {
      sq[0] = splitmix64(&mut state);
      sq[1] = splitmix64(&mut state);
    }
    let side_to_move = splitmix64(&mut state);
    ZobristTable { keys, side_to_move }
  }

  #[inline]
  pub fn key(&self, sq: usize, color: Color) -> u64 {
    self.keys[sq][color.index()]
  }

  #[inline]
  pub fn side_to_move_key(&self) -> u64 {
    self.side_to_move
  }
}

lazy_static::lazy_static! {
  /// Process-wide immutable Zobrist table, initialized once from a fixed
  /// seed. Injected as `&'static` rather than referenced as a bare global
  /// so tests can build their own `ZobristTable` with a different seed.
  pub static ref ZOBRIST: ZobristTable = ZobristTable::new(DEFAULT_ZOBRIST_SEED);
}

/// The mutable board used inside the search. Supports `make_move`/
/// `unmake_move` pairs that perfectly reverse both the bitboards and the
/// Zobrist hash. Owned by the caller, borrowed by the search.
#[derive(Clone)]
pub struct Board {
  red: Bitboard225,
  blue: Bitboard225,
  hash: u64,
  side_to_move: Color,
  history: Vec<Move>,
  zobrist: &'static ZobristTable,
}

impl Board {
  pub fn new() -> Self {
    Board::with_zobrist(&ZOBRIST)
  }

  pub fn with_zobrist(zobrist: &'static ZobristTable) -> Self {
    Board {
      red: Bitboard225::EMPTY,
      blue: Bitboard225::EMPTY,
      hash: zobrist.side_to_move_key(), // Red to move is the baseline state
      side_to_move: Color::Red,
      history: Vec::with_capacity(BOARD_CELLS),
      zobrist,
    }
  }

  pub fn side_to_move(&self) -> Color {
    self.side_to_move
  }

  pub fn hash(&self) -> u64 {
    self.hash
  }

  pub fn bitboard(&self, color: Color) -> &Bitboard225 {
    match color {
      Color::Red => &self.red,
      Color::Blue => &self.blue,
    }
  }

  pub fn occupied(&self) -> Bitboard225 {
    self.red.union(&self.blue)
  }

  pub fn is_empty(&self, x: u8, y: u8) -> bool {
    let sq = Move::new(x, y).square();
    !self.red.get(sq) && !self.blue.get(sq)
  }

  pub fn in_bounds(x: i32, y: i32) -> bool {
    x >= 0 && y >= 0 && (x as usize) < BOARD_SIZE && (y as usize) < BOARD_SIZE
  }

  pub fn cell(&self, x: u8, y: u8) -> Option<Color> {
    let sq = Move::new(x, y).square();
    if self.red.get(sq) {
      Some(Color::Red)
    } else if self.blue.get(sq) {
      Some(Color::Blue)
    } else {
      None
    }
  }

  pub fn is_full(&self) -> bool {
    self.occupied().popcount() as usize == BOARD_CELLS
  }

  pub fn move_count(&self) -> usize {
    self.history.len()
  }

  pub fn last_move(&self) -> Option<Move> {
    self.history.last().copied().filter(|m| !m.is_none())
  }

  pub fn second_last_move(&self) -> Option<Move> {
    if self.history.len() < 2 {
      None
    } else {
      Some(self.history[self.history.len() - 2])
    }
  }

  /// Places a stone for the side to move, updates the Zobrist hash and
  /// flips the side to move. Returns an undo token consumed by
  /// `unmake_move`.
  pub fn make_move(&mut self, mv: Move) -> Move {
    let color = self.side_to_move;
    let sq = mv.square();
    match color {
      Color::Red => self.red.set(sq),
      Color::Blue => self.blue.set(sq),
    }
    self.hash ^= self.zobrist.key(sq, color);
    self.hash ^= self.zobrist.side_to_move_key();
    self.history.push(mv);
    self.side_to_move = color.other();
    mv
  }

  /// Reverses the last `make_move`. Panics if there is no move to undo;
  /// search code always pairs make/unmake so this should never fire.
  pub fn unmake_move(&mut self, undo: Move) {
    let mv = self
      .history
      .pop()
      .expect("unmake_move called with empty history");
    debug_assert_eq!(mv, undo, "unmake_move token does not match last move");
    self.side_to_move = self.side_to_move.other();
    let color = self.side_to_move;
    let sq = mv.square();
    match color {
      Color::Red => self.red.clear(sq),
      Color::Blue => self.blue.clear(sq),
    }
    self.hash ^= self.zobrist.key(sq, color);
    self.hash ^= self.zobrist.side_to_move_key();
  }

  /// Passes the turn without placing a stone, for null-move pruning.
  /// Must be paired with `unmake_null_move`.
  pub fn make_null_move(&mut self) {
    self.hash ^= self.zobrist.side_to_move_key();
    self.side_to_move = self.side_to_move.other();
    self.history.push(Move::NONE);
  }

  pub fn unmake_null_move(&mut self) {
    let mv = self.history.pop().expect("unmake_null_move called with empty history");
    debug_assert!(mv.is_none(), "unmake_null_move paired with a real move");
    self.side_to_move = self.side_to_move.other();
    self.hash ^= self.zobrist.side_to_move_key();
  }

  pub fn to_position(&self) -> Position {
    let mut cells = [None; BOARD_CELLS];
    for sq in self.red.iter() {
      cells[sq] = Some(Color::Red);
    }
    for sq in self.blue.iter() {
      cells[sq] = Some(Color::Blue);
    }
    Position {
      cells,
      side_to_move: self.side_to_move,
      hash: self.hash,
    }
  }
}

impl Default for Board {
  fn default() -> Self {
    Board::new()
  }
}

/// Immutable, value-semantic snapshot of a position for application-layer
/// use (outside the search wall). Cloning is cheap relative to the search's
/// mutable board but intentionally not used on the hot path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
  cells: [Option<Color>; BOARD_CELLS],
  side_to_move: Color,
  hash: u64,
}

impl Position {
  pub fn empty() -> Self {
    Board::new().to_position()
  }

  pub fn cell(&self, x: u8, y: u8) -> Option<Color> {
    self.cells[Move::new(x, y).square()]
  }

  pub fn side_to_move(&self) -> Color {
    self.side_to_move
  }

  pub fn hash(&self) -> u64 {
    self.hash
  }

  pub fn to_board(&self) -> Board {
    let mut board = Board::new();
    // Replay in square order; Caro has no captures so any order that
    // respects alternating colors produces the same final bitboards. We
    // don't know the true move order from a snapshot, so we place stones
    // directly instead of through make_move, then fix up the hash.
    for sq in 0..BOARD_CELLS {
      if let Some(color) = self.cells[sq] {
        match color {
          Color::Red => board.red.set(sq),
          Color::Blue => board.blue.set(sq),
        }
      }
    }
    board.side_to_move = self.side_to_move;
    board.hash = self.hash;
    board
  }
}

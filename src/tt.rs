//! Transposition table (C5). Fixed-size, shared across search threads,
//! lock-free via Hyatt's hash-XOR verification scheme: each slot stores
//! `hash ^ data` and `data` in separate atomics, and a reader recomputes
//! the hash from both words to detect a torn read.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::error::{EngineError, EngineResult};
use crate::types::Move;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TTFlag {
  Exact,
  LowerBound,
  UpperBound,
}

impl TTFlag {
  fn to_bits(self) -> u64 {
    match self {
      TTFlag::Exact => 0,
      TTFlag::LowerBound => 1,
      TTFlag::UpperBound => 2,
    }
  }

  fn from_bits(bits: u64) -> TTFlag {
    match bits & 0b11 {
      0 => TTFlag::Exact,
      1 => TTFlag::LowerBound,
      _ => TTFlag::UpperBound,
    }
  }
}

#[derive(Clone, Copy, Debug)]
pub struct TTEntry {
  pub depth: u8,
  pub score: i32,
  pub best_move: Option<Move>,
  pub flag: TTFlag,
  pub age: u8,
}

const NO_MOVE_BITS: u64 = 0xFF;

fn pack(entry: &TTEntry) -> u64 {
  let depth = entry.depth as u64;
  let score = (entry.score as u32) as u64;
  let mv_bits = entry.best_move.map(|m| m.square() as u64).unwrap_or(NO_MOVE_BITS);
  let flag = entry.flag.to_bits();
  let age = entry.age as u64;

  depth | (score << 8) | (mv_bits << 40) | (flag << 48) | (age << 50)
}

fn unpack(data: u64) -> TTEntry {
  let depth = (data & 0xFF) as u8;
  let score = ((data >> 8) & 0xFFFF_FFFF) as u32 as i32;
  let mv_bits = (data >> 40) & 0xFF;
  let flag = TTFlag::from_bits((data >> 48) & 0b11);
  let age = ((data >> 50) & 0xFF) as u8;

  let best_move = if mv_bits == NO_MOVE_BITS {
    None
  } else {
    Some(Move::from_square(mv_bits as usize))
  };

  TTEntry { depth, score, best_move, flag, age }
}

#[repr(align(16))]
struct TTSlot {
  key_xor_data: AtomicU64,
  data: AtomicU64,
}

impl TTSlot {
  fn empty() -> Self {
    TTSlot {
      key_xor_data: AtomicU64::new(0),
      data: AtomicU64::new(0),
    }
  }
}

pub struct TranspositionTable {
  slots: Vec<TTSlot>,
  age: AtomicU8,
  hits: AtomicU64,
  lookups: AtomicU64,
}

const BYTES_PER_SLOT: usize = 16;

impl TranspositionTable {
  pub fn new(size_mib: usize) -> EngineResult<Self> {
    if size_mib == 0 {
      return Err(EngineError::ResourceExhausted {
        detail: "transposition table size must be > 0 MiB".into(),
      });
    }
    let capacity = (size_mib * 1024 * 1024 / BYTES_PER_SLOT).max(1);
    let mut slots = Vec::new();
    slots.try_reserve_exact(capacity).map_err(|e| EngineError::ResourceExhausted {
      detail: format!("failed to allocate {size_mib} MiB transposition table: {e}"),
    })?;
    slots.resize_with(capacity, TTSlot::empty);
    Ok(TranspositionTable {
      slots,
      age: AtomicU8::new(0),
      hits: AtomicU64::new(0),
      lookups: AtomicU64::new(0),
    })
  }

  fn index(&self, hash: u64) -> usize {
    (hash as usize) % self.slots.len()
  }

  /// Returns the stored entry regardless of its depth, for move-ordering
  /// hints; callers that need a depth-sufficient cutoff should check
  /// `entry.depth >= requested_depth` themselves (see `probe_cutoff`).
  pub fn probe(&self, hash: u64) -> Option<TTEntry> {
    self.lookups.fetch_add(1, Ordering::Relaxed);
    let slot = &self.slots[self.index(hash)];
    let data = slot.data.load(Ordering::Relaxed);
    let kx = slot.key_xor_data.load(Ordering::Relaxed);
    if kx ^ data != hash {
      return None; // miss, or a torn read we correctly discard
    }
    if data == 0 && kx == hash && hash != 0 {
      // A zeroed slot XORs to `hash` only by coincidence; treat the
      // all-zero data word (the true "never written" state) as empty.
      return None;
    }
    self.hits.fetch_add(1, Ordering::Relaxed);
    Some(unpack(data))
  }

  /// The depth-gated lookup described by the design: only returns a usable
  /// score when the stored search went at least as deep as requested.
  pub fn probe_cutoff(&self, hash: u64, requested_depth: u8) -> Option<TTEntry> {
    self.probe(hash).filter(|e| e.depth >= requested_depth)
  }

  /// Replaces the slot iff the new entry is at least as deep, or the
  /// existing entry is older than the current generation.
  pub fn store(&self, hash: u64, mut entry: TTEntry) {
    entry.age = self.age.load(Ordering::Relaxed);
    let slot = &self.slots[self.index(hash)];

    let existing_data = slot.data.load(Ordering::Relaxed);
    let existing_kx = slot.key_xor_data.load(Ordering::Relaxed);
    let should_replace = if existing_kx ^ existing_data != hash {
      true // empty or unrelated slot
    } else {
      let existing = unpack(existing_data);
      entry.depth >= existing.depth || existing.age != entry.age
    };
    if !should_replace {
      return;
    }

    let data = pack(&entry);
    // Write `data` first, then the XOR word; see module docs for how a
    // reader uses the ordering to detect a torn pair.
    slot.data.store(data, Ordering::Relaxed);
    slot.key_xor_data.store(hash ^ data, Ordering::Relaxed);
  }

  /// Called once per root search; wraps after 255 generations.
  pub fn increment_age(&self) {
    self.age.fetch_add(1, Ordering::Relaxed);
  }

  pub fn clear(&self) {
    for slot in &self.slots {
      slot.data.store(0, Ordering::Relaxed);
      slot.key_xor_data.store(0, Ordering::Relaxed);
    }
    self.age.store(0, Ordering::Relaxed);
    self.hits.store(0, Ordering::Relaxed);
    self.lookups.store(0, Ordering::Relaxed);
  }

  pub fn hit_rate(&self) -> f64 {
    let lookups = self.lookups.load(Ordering::Relaxed);
    if lookups == 0 {
      0.0
    } else {
      self.hits.load(Ordering::Relaxed) as f64 / lookups as f64
    }
  }

  pub fn capacity(&self) -> usize {
    self.slots.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn store_then_probe_roundtrips() {
    let tt = TranspositionTable::new(1).unwrap();
    let entry = TTEntry {
      depth: 6,
      score: 50,
      best_move: Some(Move::new(7, 7)),
      flag: TTFlag::Exact,
      age: 0,
    };
    tt.store(0xDEAD_BEEF, entry);
    let probed = tt.probe(0xDEAD_BEEF).expect("entry should be present");
    assert_eq!(probed.depth, 6);
    assert_eq!(probed.score, 50);
    assert_eq!(probed.best_move, Some(Move::new(7, 7)));
    assert_eq!(probed.flag, TTFlag::Exact);
  }

  #[test]
  fn depth_gated_probe_respects_requested_depth() {
    let tt = TranspositionTable::new(1).unwrap();
    tt.store(
      42,
      TTEntry { depth: 6, score: 50, best_move: Some(Move::new(7, 7)), flag: TTFlag::Exact, age: 0 },
    );
    assert!(tt.probe_cutoff(42, 5).is_some());
    assert!(tt.probe_cutoff(42, 7).is_none());
    // Move hint survives even when the cutoff is not usable.
    assert_eq!(tt.probe(42).unwrap().best_move, Some(Move::new(7, 7)));
  }

  #[test]
  fn higher_depth_replaces_lower_depth() {
    let tt = TranspositionTable::new(1).unwrap();
    tt.store(7, TTEntry { depth: 2, score: 1, best_move: None, flag: TTFlag::Exact, age: 0 });
    tt.store(7, TTEntry { depth: 5, score: 2, best_move: None, flag: TTFlag::Exact, age: 0 });
    assert_eq!(tt.probe(7).unwrap().depth, 5);
  }

  #[test]
  fn lower_depth_does_not_replace_same_generation() {
    let tt = TranspositionTable::new(1).unwrap();
    tt.store(7, TTEntry { depth: 5, score: 2, best_move: None, flag: TTFlag::Exact, age: 0 });
    tt.store(7, TTEntry { depth: 2, score: 9, best_move: None, flag: TTFlag::Exact, age: 0 });
    assert_eq!(tt.probe(7).unwrap().depth, 5);
  }

  #[test]
  fn older_generation_is_replaced_even_at_lower_depth() {
    let tt = TranspositionTable::new(1).unwrap();
    tt.store(7, TTEntry { depth: 5, score: 2, best_move: None, flag: TTFlag::Exact, age: 0 });
    tt.increment_age();
    tt.store(7, TTEntry { depth: 1, score: 9, best_move: None, flag: TTFlag::Exact, age: 0 });
    assert_eq!(tt.probe(7).unwrap().depth, 1);
  }

  #[test]
  fn clear_empties_all_slots() {
    let tt = TranspositionTable::new(1).unwrap();
    tt.store(7, TTEntry { depth: 5, score: 2, best_move: None, flag: TTFlag::Exact, age: 0 });
    tt.clear();
    assert!(tt.probe(7).is_none());
  }

  #[test]
  fn zero_size_is_rejected() {
    assert!(TranspositionTable::new(0).is_err());
  }
}

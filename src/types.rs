use serde::{Deserialize, Serialize};

/// A stone color. Caro has exactly two; `Red` moves first by convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Color {
  Red,
  Blue,
}

impl Color {
  pub fn other(self) -> Self {
    match self {
      Color::Red => Color::Blue,
      Color::Blue => Color::Red,
    }
  }

  pub(crate) fn index(self) -> usize {
    match self {
      Color::Red => 0,
      Color::Blue => 1,
    }
  }
}

pub const BOARD_SIZE: usize = 15;
pub const BOARD_CELLS: usize = BOARD_SIZE * BOARD_SIZE;

/// A board coordinate, `0 <= x,y < 15`. `Move::NONE` is the sentinel "no move".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
  pub x: u8,
  pub y: u8,
}

impl Move {
  pub const NONE: Move = Move { x: 255, y: 255 };

  pub fn new(x: u8, y: u8) -> Self {
    Move { x, y }
  }

  pub fn is_none(self) -> bool {
    self == Move::NONE
  }

  pub(crate) fn square(self) -> usize {
    self.y as usize * BOARD_SIZE + self.x as usize
  }

  pub(crate) fn from_square(sq: usize) -> Self {
    Move {
      x: (sq % BOARD_SIZE) as u8,
      y: (sq / BOARD_SIZE) as u8,
    }
  }
}

impl Default for Move {
  fn default() -> Self {
    Move::NONE
  }
}

/// External-visible difficulty tiers. Each maps to a fixed search profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Braindead,
  Easy,
  Medium,
  Hard,
  Grandmaster,
}

/// Fixed parameters a `Difficulty` resolves to. `thread_count == 0` means
/// single-threaded and must never be silently upgraded to parallel search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DifficultyProfile {
  pub max_depth_cap: u32,
  pub thread_count: usize,
  pub vcf_depth: u32,
  pub pondering_enabled: bool,
}

impl Difficulty {
  pub fn profile(self) -> DifficultyProfile {
    match self {
      Difficulty::Braindead => DifficultyProfile {
        max_depth_cap: 0,
        thread_count: 0,
        vcf_depth: 0,
        pondering_enabled: false,
      },
      Difficulty::Easy => DifficultyProfile {
        max_depth_cap: 4,
        thread_count: 0,
        vcf_depth: 6,
        pondering_enabled: false,
      },
      Difficulty::Medium => DifficultyProfile {
        max_depth_cap: 8,
        thread_count: 0,
        vcf_depth: 10,
        pondering_enabled: true,
      },
      Difficulty::Hard => DifficultyProfile {
        max_depth_cap: 14,
        thread_count: 4,
        vcf_depth: 14,
        pondering_enabled: true,
      },
      Difficulty::Grandmaster => DifficultyProfile {
        max_depth_cap: 32,
        // Single-threaded by design: Grandmaster is the deepest but
        // serial search. A prior source ignored thread_count == 0 and
        // ran parallel anyway; that bug must not reappear here.
        thread_count: 0,
        vcf_depth: 16,
        pondering_enabled: true,
      },
    }
  }
}

/// Aggregated engine configuration, expanded from the teacher's single
/// per-call `AiConfig` into a reusable engine-level setting.
#[derive(Clone, Debug)]
pub struct EngineConfig {
  pub difficulty: Difficulty,
  pub tt_size_mib: usize,
  pub book_path: Option<String>,
}

impl EngineConfig {
  pub fn builder() -> EngineConfigBuilder {
    EngineConfigBuilder::default()
  }
}

impl Default for EngineConfig {
  fn default() -> Self {
    EngineConfig {
      difficulty: Difficulty::Medium,
      tt_size_mib: 64,
      book_path: None,
    }
  }
}

#[derive(Default)]
pub struct EngineConfigBuilder {
  inner: EngineConfig,
}

impl EngineConfigBuilder {
  pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
    self.inner.difficulty = difficulty;
    self
  }

  pub fn tt_size_mib(mut self, mib: usize) -> Self {
    self.inner.tt_size_mib = mib;
    self
  }

  pub fn book_path(mut self, path: impl Into<String>) -> Self {
    self.inner.book_path = Some(path.into());
    self
  }

  pub fn build(self) -> EngineConfig {
    self.inner
  }
}

/// Result of `best_move`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AIMoveResult {
  pub x: u8,
  pub y: u8,
  pub depth_achieved: u32,
  pub nodes_searched: u64,
  pub nodes_per_second: u64,
  pub time_taken_ms: u64,
  pub score: i32,
  pub pondering_active: bool,
  pub timed_out: bool,
}

/// Event type tag for `StatsEvent::kind`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsEventKind {
  MainSearch,
  Pondering,
  VcfSearch,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatsEvent {
  pub publisher_id: String,
  pub player: Color,
  pub kind: StatsEventKind,
  pub depth: u32,
  pub nodes: u64,
  pub nps: u64,
  pub tt_hit_rate: f64,
  pub pondering_active: bool,
  pub vcf_depth: u32,
  pub vcf_nodes: u64,
  pub thread_count: usize,
  pub move_time_ms: u64,
  pub timestamp_ms: u64,
}

impl StatsEvent {
  /// Wire format for the fire-and-forget stats channel; consumers outside
  /// this crate (log persistence, a UI) decode this, never this crate.
  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string(self)
  }
}

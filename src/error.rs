use thiserror::Error;

/// Errors the engine can return. Recoverable variants are ordinary inputs a
/// caller got wrong; fatal variants cancel the current search.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
  #[error("invalid move ({x}, {y}): {reason}")]
  InvalidMove { x: u8, y: u8, reason: &'static str },

  #[error("game is already over")]
  GameOver,

  #[error("resource exhausted: {detail}")]
  ResourceExhausted { detail: String },

  #[error("internal inconsistency: {0}")]
  Internal(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

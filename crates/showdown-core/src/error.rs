//! Error types for `showdown-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A stored difficulty label that is neither easy, medium, nor hard.
  #[error("unknown difficulty: {0:?}")]
  UnknownDifficulty(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

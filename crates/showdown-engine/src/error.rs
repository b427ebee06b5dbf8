//! Error types for `showdown-engine`.
//!
//! Nothing here is fatal to the process: every variant is caught at the
//! operation boundary, logged, and reported to the caller with the store in
//! its last consistent state.

use showdown_core::{presenter::PresentError, provider::ProviderError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Question creation was attempted before startup recovery finished.
  #[error("recovery has not completed; question creation is not accepted yet")]
  RecoveryPending,

  #[error("no eligible participants in channel")]
  NoEligibleParticipants,

  /// Provider code 1/2 — terminal for this request.
  #[error("the provider has no questions for the requested parameters")]
  NoResults,

  /// Provider code 4 — the token has seen every question in the category.
  #[error("question pool exhausted; choose another category or reset the session")]
  PoolExhausted,

  /// Provider code 5 persisted past the bounded retry budget.
  #[error("provider rate limit persisted after retries; try again later")]
  RetriesExhausted,

  #[error("provider error: {0}")]
  Provider(#[from] ProviderError),

  #[error("presentation error: {0}")]
  Present(#[from] PresentError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("invalid configuration: {0}")]
  Config(#[from] toml::de::Error),
}

impl Error {
  /// Wrap a backend-specific store error.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

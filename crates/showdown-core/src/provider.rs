//! The question-content provider boundary.
//!
//! The provider is an external HTTP API serving non-repeating trivia
//! questions against a per-channel session token. This module defines only
//! the fields and response codes the engine consumes; the wire client lives
//! in `showdown-engine`.

use std::future::Future;

use thiserror::Error;

use crate::question::QuestionContent;

// ─── Response codes ──────────────────────────────────────────────────────────

/// Provider response codes, as documented by the content API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
  /// Content returned.
  Success,
  /// Not enough questions for the request. Terminal.
  NoResults,
  /// Malformed request parameter. Terminal.
  InvalidParameter,
  /// The session token is unknown or expired; force a renewal and retry.
  TokenNotFound,
  /// The token has served every question in the requested category.
  PoolExhausted,
  /// Per-token rate limit hit; retry after a delay.
  RateLimited,
}

impl ResponseCode {
  pub fn from_wire(code: u8) -> Option<Self> {
    match code {
      0 => Some(Self::Success),
      1 => Some(Self::NoResults),
      2 => Some(Self::InvalidParameter),
      3 => Some(Self::TokenNotFound),
      4 => Some(Self::PoolExhausted),
      5 => Some(Self::RateLimited),
      _ => None,
    }
  }
}

// ─── Request / reply ─────────────────────────────────────────────────────────

/// Parameters for a content fetch. `category: None` requests a random
/// category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchParams {
  pub category: Option<u32>,
}

impl FetchParams {
  pub fn category(category: u32) -> Self { Self { category: Some(category) } }
}

/// A decoded provider reply. `content` is present only on
/// [`ResponseCode::Success`].
#[derive(Debug, Clone)]
pub struct FetchReply {
  pub code:    ResponseCode,
  pub content: Option<QuestionContent>,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Failures below the response-code layer: transport problems and replies
/// the client cannot decode.
#[derive(Debug, Error)]
pub enum ProviderError {
  #[error("provider transport error: {0}")]
  Transport(String),

  #[error("malformed provider response: {0}")]
  Malformed(String),

  #[error("token request rejected with code {0}")]
  TokenRejected(u8),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// A source of session tokens and question content.
///
/// All methods return `Send` futures so the token manager's refresh loop can
/// run on a spawned background task.
pub trait ContentProvider: Send + Sync {
  /// Request a fresh session token.
  fn request_token(
    &self,
  ) -> impl Future<Output = ProviderResult<String>> + Send + '_;

  /// Fetch one question under `token`.
  fn fetch_question<'a>(
    &'a self,
    params: FetchParams,
    token: &'a str,
  ) -> impl Future<Output = ProviderResult<FetchReply>> + Send + 'a;
}

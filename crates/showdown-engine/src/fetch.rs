//! The question fetch loop — drives the provider's response-code protocol.

use std::{sync::Arc, time::Duration as StdDuration};

use showdown_core::{
  ids::ChannelId,
  provider::{ContentProvider, FetchParams, ProviderError, ResponseCode},
  question::QuestionContent,
  store::TriviaStore,
};

use crate::{tokens::TokenManager, Error, Result};

/// Fetches validated question content for a channel, handling token renewal
/// and rate limiting along the way.
pub struct QuestionSource<S, C> {
  tokens:      TokenManager<S, C>,
  provider:    Arc<C>,
  retry_limit: u32,
  retry_delay: StdDuration,
}

impl<S, C> QuestionSource<S, C>
where
  S: TriviaStore,
  C: ContentProvider,
{
  pub fn new(
    tokens: TokenManager<S, C>,
    provider: Arc<C>,
    retry_limit: u32,
    retry_delay: StdDuration,
  ) -> Self {
    Self { tokens, provider, retry_limit, retry_delay }
  }

  /// Fetch the next question for `channel`.
  ///
  /// Codes 3 (token invalid) and 5 (rate limited) are retried against a
  /// shared bounded budget; everything else resolves the call. A served
  /// request resets the token's abandonment counter.
  pub async fn next_question(
    &self,
    channel: ChannelId,
    params: FetchParams,
  ) -> Result<QuestionContent> {
    let mut token = self.tokens.acquire(channel).await?;
    let mut retries = 0u32;

    loop {
      let reply = self.provider.fetch_question(params, &token).await?;
      self.tokens.mark_used(channel).await?;

      match reply.code {
        ResponseCode::Success => {
          return reply.content.ok_or_else(|| {
            ProviderError::Malformed("success reply without content".into()).into()
          });
        }
        ResponseCode::NoResults | ResponseCode::InvalidParameter => {
          return Err(Error::NoResults);
        }
        ResponseCode::PoolExhausted => return Err(Error::PoolExhausted),
        ResponseCode::TokenNotFound if retries < self.retry_limit => {
          retries += 1;
          token = self.tokens.force_renew(channel).await?;
        }
        ResponseCode::RateLimited if retries < self.retry_limit => {
          retries += 1;
          tracing::debug!(channel = ?channel, "provider rate limited; backing off");
          tokio::time::sleep(self.retry_delay).await;
        }
        ResponseCode::TokenNotFound | ResponseCode::RateLimited => {
          return Err(Error::RetriesExhausted);
        }
      }
    }
  }
}

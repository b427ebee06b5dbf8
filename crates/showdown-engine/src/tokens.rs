//! The token lifecycle manager.
//!
//! The content provider enforces per-token rate limits and expiry; serving a
//! stale or rejected token during question creation costs a user-visible
//! failure. The manager renews proactively instead: every maintenance pass
//! walks the stored tokens and applies [`RefreshPolicy::decide`].

use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};

use showdown_core::{
  ids::ChannelId,
  provider::{ContentProvider, FetchParams, ResponseCode},
  store::TriviaStore,
  token::ProviderToken,
};

use crate::{Error, Result};

// ─── Refresh policy ──────────────────────────────────────────────────────────

/// Timing and retry knobs for background token refresh.
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
  /// Age at which a token gets a lightweight refresh.
  pub soft_age:      Duration,
  /// Age past which only a forced renewal will do.
  pub hard_age:      Duration,
  /// Consecutive background refreshes before the token is presumed
  /// abandoned (nobody has fetched a question since).
  pub abandon_after: i64,
  /// Bounded retries against provider rate limiting.
  pub retry_limit:   u32,
  pub retry_delay:   StdDuration,
}

impl Default for RefreshPolicy {
  fn default() -> Self {
    Self {
      soft_age:      Duration::hours(5),
      hard_age:      Duration::hours(6),
      abandon_after: 10,
      retry_limit:   2,
      retry_delay:   StdDuration::from_secs(5),
    }
  }
}

/// What a maintenance pass should do with one stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshAction {
  /// Fresh enough; leave it alone.
  Keep,
  /// Inside the refresh window; issue a lightweight refresh fetch.
  Refresh,
  /// Past the hard age; only a new token will be accepted.
  ForceRenew,
  /// Refreshed too many times with no intervening use; drop it.
  Delete,
}

impl RefreshPolicy {
  pub fn decide(&self, age: Duration, refresh_count: i64) -> RefreshAction {
    if age > self.hard_age {
      RefreshAction::ForceRenew
    } else if age >= self.soft_age {
      if refresh_count >= self.abandon_after {
        RefreshAction::Delete
      } else {
        RefreshAction::Refresh
      }
    } else {
      RefreshAction::Keep
    }
  }
}

// ─── Manager ─────────────────────────────────────────────────────────────────

/// Owns the per-channel provider credential.
pub struct TokenManager<S, C> {
  store:    Arc<S>,
  provider: Arc<C>,
  policy:   RefreshPolicy,
}

impl<S, C> Clone for TokenManager<S, C> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      provider: Arc::clone(&self.provider),
      policy:   self.policy.clone(),
    }
  }
}

impl<S, C> TokenManager<S, C>
where
  S: TriviaStore,
  C: ContentProvider,
{
  pub fn new(store: Arc<S>, provider: Arc<C>, policy: RefreshPolicy) -> Self {
    Self { store, provider, policy }
  }

  /// Return the channel's token, issuing a new one if none is stored.
  /// An existing token is touched: using it resets the abandonment clock.
  pub async fn acquire(&self, channel: ChannelId) -> Result<String> {
    match self.store.get_token(channel).await.map_err(Error::store)? {
      Some(stored) => {
        self
          .store
          .touch_token(channel, Utc::now(), 0)
          .await
          .map_err(Error::store)?;
        Ok(stored.token)
      }
      None => self.request_and_store(channel).await,
    }
  }

  /// Discard any stored token and issue a fresh one.
  pub async fn force_renew(&self, channel: ChannelId) -> Result<String> {
    self.store.delete_token(channel).await.map_err(Error::store)?;
    self.request_and_store(channel).await
  }

  /// Record that the channel's token just served a question fetch.
  pub async fn mark_used(&self, channel: ChannelId) -> Result<()> {
    self
      .store
      .set_refresh_count(channel, 0)
      .await
      .map_err(Error::store)
  }

  async fn request_and_store(&self, channel: ChannelId) -> Result<String> {
    let token = self.provider.request_token().await?;
    self
      .store
      .put_token(ProviderToken {
        channel_id:     channel,
        token:          token.clone(),
        last_refreshed: Utc::now(),
        refresh_count:  0,
      })
      .await
      .map_err(Error::store)?;
    tracing::info!(channel = ?channel, "issued new provider token");
    Ok(token)
  }

  /// One maintenance pass over every stored token. Failures are per-token:
  /// a misbehaving provider response for one channel never blocks the rest.
  pub async fn refresh_all(&self) -> Result<()> {
    let tokens = self.store.list_tokens().await.map_err(Error::store)?;
    let now = Utc::now();
    for token in tokens {
      if let Err(err) = self.refresh_one(&token, now).await {
        tracing::warn!(
          channel = ?token.channel_id,
          error = %err,
          "token refresh failed",
        );
      }
    }
    Ok(())
  }

  async fn refresh_one(&self, token: &ProviderToken, now: DateTime<Utc>) -> Result<()> {
    match self.policy.decide(token.age(now), token.refresh_count) {
      RefreshAction::Keep => Ok(()),
      RefreshAction::Delete => {
        self
          .store
          .delete_token(token.channel_id)
          .await
          .map_err(Error::store)?;
        tracing::info!(channel = ?token.channel_id, "deleted abandoned provider token");
        Ok(())
      }
      RefreshAction::ForceRenew => {
        self.force_renew(token.channel_id).await?;
        Ok(())
      }
      RefreshAction::Refresh => self.refresh_with_retries(token, now).await,
    }
  }

  /// A lightweight refresh is just a fetch against the token; the provider
  /// extends the session on any served request.
  async fn refresh_with_retries(
    &self,
    token: &ProviderToken,
    now: DateTime<Utc>,
  ) -> Result<()> {
    let mut retries = 0u32;
    loop {
      let reply = self
        .provider
        .fetch_question(FetchParams::default(), &token.token)
        .await?;

      match reply.code {
        ResponseCode::Success => {
          self
            .store
            .touch_token(token.channel_id, now, token.refresh_count + 1)
            .await
            .map_err(Error::store)?;
          return Ok(());
        }
        ResponseCode::RateLimited if retries < self.policy.retry_limit => {
          retries += 1;
          tokio::time::sleep(self.policy.retry_delay).await;
        }
        // Token invalid, or the rate limit outlasted the retry budget:
        // only a new token will recover this channel.
        ResponseCode::TokenNotFound | ResponseCode::RateLimited => {
          self.force_renew(token.channel_id).await?;
          return Ok(());
        }
        // Terminal codes for this probe; leave the token for next pass.
        _ => return Ok(()),
      }
    }
  }
}

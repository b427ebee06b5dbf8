//! Engine configuration.
//!
//! Loaded from a TOML table by the host process; every knob has a default
//! matching the provider's documented limits, so an empty table is valid.

use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::Deserialize;

use crate::{tokens::RefreshPolicy, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
  /// Base URL of the question-content provider.
  pub provider_base_url: String,

  /// Cadence of the background maintenance loop (token refresh + stale
  /// sweep), in seconds.
  pub maintenance_interval_secs: u64,

  /// Open questions older than this are closed as timed out.
  pub stale_after_hours: i64,

  /// Token age at which the background loop starts refreshing.
  pub token_soft_age_hours: i64,

  /// Token age past which only a forced renewal will do.
  pub token_hard_age_hours: i64,

  /// Consecutive background refreshes after which a token is presumed
  /// abandoned and deleted.
  pub token_abandon_after: i64,

  /// Bounded retry budget against provider rate limiting.
  pub retry_limit: u32,

  /// Delay between rate-limit retries, in seconds.
  pub retry_delay_secs: u64,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      provider_base_url:         crate::http::DEFAULT_BASE_URL.to_owned(),
      maintenance_interval_secs: 3600,
      stale_after_hours:         24,
      token_soft_age_hours:      5,
      token_hard_age_hours:      6,
      token_abandon_after:       10,
      retry_limit:               2,
      retry_delay_secs:          5,
    }
  }
}

impl EngineConfig {
  pub fn from_toml(raw: &str) -> Result<Self> { Ok(toml::from_str(raw)?) }

  pub fn refresh_policy(&self) -> RefreshPolicy {
    RefreshPolicy {
      soft_age:      Duration::hours(self.token_soft_age_hours),
      hard_age:      Duration::hours(self.token_hard_age_hours),
      abandon_after: self.token_abandon_after,
      retry_limit:   self.retry_limit,
      retry_delay:   self.retry_delay(),
    }
  }

  pub fn stale_after(&self) -> Duration { Duration::hours(self.stale_after_hours) }

  pub fn maintenance_interval(&self) -> StdDuration {
    StdDuration::from_secs(self.maintenance_interval_secs)
  }

  pub fn retry_delay(&self) -> StdDuration {
    StdDuration::from_secs(self.retry_delay_secs)
  }
}

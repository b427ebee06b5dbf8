//! The stored content-provider credential, one row per channel.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ChannelId;

/// A rate-limited credential for the external question-content provider.
///
/// `refresh_count` counts consecutive background refreshes with no
/// intervening question fetch; a high count means the channel has gone quiet
/// and the token is presumed abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderToken {
  pub channel_id:     ChannelId,
  pub token:          String,
  pub last_refreshed: DateTime<Utc>,
  pub refresh_count:  i64,
}

impl ProviderToken {
  pub fn age(&self, now: DateTime<Utc>) -> Duration { now - self.last_refreshed }
}

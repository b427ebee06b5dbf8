//! Participants, channels, and per-channel scorecards.

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, GuildId, ParticipantId};

/// A known chat-platform member. Exists independently of any channel; the
/// row is retained only while at least one scorecard references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
  pub participant_id: ParticipantId,
  pub username:       String,
}

/// A channel the engine may post questions into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
  pub channel_id: ChannelId,
  pub guild_id:   GuildId,
  pub name:       String,
}

/// A participant's running score within one channel — the per-channel
/// enrollment row. Unique per `(participant_id, channel_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scorecard {
  pub participant_id: ParticipantId,
  pub channel_id:     ChannelId,
  pub score:          i64,
}

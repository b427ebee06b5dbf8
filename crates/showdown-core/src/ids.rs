//! Typed identifiers for platform-assigned entities.
//!
//! The chat platform hands out opaque 64-bit ids for guilds, channels,
//! participants, and rendered messages. Wrapping them in newtypes keeps the
//! store API resolvable at compile time — there is no string-keyed table
//! dispatch anywhere in this workspace.

use serde::{Deserialize, Serialize};

/// A guild (server) id assigned by the chat platform.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GuildId(pub i64);

/// A channel id assigned by the chat platform.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChannelId(pub i64);

/// A participant (member) id assigned by the chat platform.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ParticipantId(pub i64);

/// The id of one rendered message on the chat platform.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MessageId(pub i64);

/// A store-generated id for one question's durable content row.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct QuestionId(pub i64);

/// The identity of a rendered question message.
///
/// An open question is keyed by this pair. Recovery re-binds an open question
/// to a fresh `MessageId` within the same channel, so the pair is stable only
/// for the lifetime of one rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
  pub message_id: MessageId,
  pub channel_id: ChannelId,
}

impl MessageRef {
  pub fn new(message_id: MessageId, channel_id: ChannelId) -> Self {
    Self { message_id, channel_id }
  }

  /// The same channel, bound to a different rendered message.
  pub fn rebound(self, message_id: MessageId) -> Self {
    Self { message_id, ..self }
  }
}

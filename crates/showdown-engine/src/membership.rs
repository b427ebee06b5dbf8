//! The membership synchronizer.
//!
//! Mirrors external membership and permission events into scorecard rows.
//! Every operation tolerates redelivery: inserts are insert-if-absent,
//! deletes are delete-if-present, so replaying an event stream is harmless.

use std::sync::Arc;

use showdown_core::{
  ids::{ChannelId, GuildId, MessageRef, ParticipantId},
  membership::{Channel, Participant},
  presenter::Presenter,
  store::TriviaStore,
};

use crate::{Error, Result};

pub struct MembershipSync<S, P> {
  store:     Arc<S>,
  presenter: Arc<P>,
}

impl<S, P> MembershipSync<S, P>
where
  S: TriviaStore,
  P: Presenter,
{
  pub fn new(store: Arc<S>, presenter: Arc<P>) -> Self { Self { store, presenter } }

  /// A participant joined: enroll them in every channel they can access.
  pub async fn participant_joined(
    &self,
    participant: Participant,
    accessible: &[ChannelId],
  ) -> Result<()> {
    let id = participant.participant_id;
    self.store.upsert_participant(participant).await.map_err(Error::store)?;
    for &channel in accessible {
      self.store.ensure_scorecard(id, channel).await.map_err(Error::store)?;
    }
    Ok(())
  }

  /// A participant left the platform entirely; scorecards cascade.
  pub async fn participant_left(&self, participant: ParticipantId) -> Result<()> {
    self.store.remove_participant(participant).await.map_err(Error::store)
  }

  /// A channel became visible to the engine, with its current members.
  pub async fn channel_created(
    &self,
    channel: Channel,
    members: &[Participant],
  ) -> Result<()> {
    let channel_id = channel.channel_id;
    self.store.upsert_channel(channel).await.map_err(Error::store)?;
    for member in members {
      self
        .store
        .upsert_participant(member.clone())
        .await
        .map_err(Error::store)?;
      self
        .store
        .ensure_scorecard(member.participant_id, channel_id)
        .await
        .map_err(Error::store)?;
    }
    Ok(())
  }

  /// A channel disappeared (deleted, or the engine lost access).
  pub async fn channel_deleted(&self, channel: ChannelId) -> Result<()> {
    self.store.remove_channel(channel).await.map_err(Error::store)?;
    self.prune_orphans().await?;
    Ok(())
  }

  pub async fn channel_renamed(&self, channel: ChannelId, name: &str) -> Result<()> {
    self.store.rename_channel(channel, name).await.map_err(Error::store)
  }

  /// The engine was removed from a guild; all its channels go.
  pub async fn guild_removed(&self, guild: GuildId) -> Result<()> {
    self.store.remove_guild(guild).await.map_err(Error::store)?;
    self.prune_orphans().await?;
    Ok(())
  }

  /// A single participant's access to a channel changed.
  pub async fn permission_changed(
    &self,
    channel: ChannelId,
    participant: ParticipantId,
    allowed: bool,
  ) -> Result<()> {
    if allowed {
      self
        .store
        .ensure_scorecard(participant, channel)
        .await
        .map_err(Error::store)
    } else {
      self
        .store
        .remove_scorecard(participant, channel)
        .await
        .map_err(Error::store)
    }
  }

  /// Re-check one member's access against the platform and reconcile the
  /// scorecard to match.
  pub async fn reconcile_member(
    &self,
    channel: ChannelId,
    participant: ParticipantId,
  ) -> Result<()> {
    let allowed = self.presenter.can_post(channel, participant).await?;
    self.permission_changed(channel, participant, allowed).await
  }

  /// A rendered question message was deleted out from under us; drop the
  /// open question it anchored.
  pub async fn message_deleted(&self, message: MessageRef) -> Result<()> {
    let existed = self.store.close_question(message).await.map_err(Error::store)?;
    if existed {
      tracing::info!(message = ?message, "open question dropped after external delete");
    }
    Ok(())
  }

  /// Delete participants with no remaining scorecards.
  pub async fn prune_orphans(&self) -> Result<u64> {
    let removed = self.store.prune_orphans().await.map_err(Error::store)?;
    if removed > 0 {
      tracing::info!(removed, "pruned orphaned participants");
    }
    Ok(removed)
  }
}

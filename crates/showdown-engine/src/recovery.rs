//! The recovery coordinator.
//!
//! After a restart the previous renderings are stale: button callbacks are
//! no longer wired to this process. Each open question is re-rendered to a
//! fresh message identity addressed only to the participants who have not
//! answered yet, the store key is re-bound, and the old rendering deleted.
//! A rendering that vanished while we were down means someone closed it for
//! us — the row is dropped, not an error.

use std::sync::Arc;

use tokio::task::JoinSet;

use showdown_core::{
  ids::ChannelId,
  presenter::Presenter,
  question::OpenQuestion,
  store::TriviaStore,
};

use crate::{Error, Result};

/// Counts from one recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
  /// Questions re-rendered and re-bound to a fresh message identity.
  pub restored: u64,
  /// Questions dropped because their prior rendering no longer exists.
  pub dropped:  u64,
}

enum Recovered {
  Restored,
  Dropped,
}

pub struct RecoveryCoordinator<S, P> {
  store:     Arc<S>,
  presenter: Arc<P>,
}

impl<S, P> RecoveryCoordinator<S, P>
where
  S: TriviaStore + 'static,
  P: Presenter + 'static,
{
  pub fn new(store: Arc<S>, presenter: Arc<P>) -> Self { Self { store, presenter } }

  /// Recover every open question, optionally scoped to one channel.
  ///
  /// Distinct questions are independent and recover concurrently. The call
  /// returns only when every task has finished, so the caller can gate
  /// question creation on it. Idempotent: a second pass with no intervening
  /// answers leaves the same answer-record state and exactly one live
  /// rendering per question.
  pub async fn recover_all(&self, channel: Option<ChannelId>) -> Result<RecoveryReport> {
    let open = self.store.open_questions(channel).await.map_err(Error::store)?;

    let mut tasks = JoinSet::new();
    for question in open {
      let store = Arc::clone(&self.store);
      let presenter = Arc::clone(&self.presenter);
      tasks.spawn(async move { recover_one(store, presenter, question).await });
    }

    let mut report = RecoveryReport::default();
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok(Ok(Recovered::Restored)) => report.restored += 1,
        Ok(Ok(Recovered::Dropped)) => report.dropped += 1,
        Ok(Err(err)) => tracing::warn!(error = %err, "question recovery failed"),
        Err(err) => tracing::warn!(error = %err, "recovery task panicked"),
      }
    }

    tracing::info!(
      restored = report.restored,
      dropped = report.dropped,
      "recovery pass complete",
    );
    Ok(report)
  }
}

async fn recover_one<S, P>(
  store: Arc<S>,
  presenter: Arc<P>,
  question: OpenQuestion,
) -> Result<Recovered>
where
  S: TriviaStore,
  P: Presenter,
{
  let old = question.message;

  // Probe before re-rendering: a missing prior rendering is an external
  // deletion, and the question goes with it.
  if !presenter.rendering_exists(old).await? {
    store.close_question(old).await.map_err(Error::store)?;
    tracing::warn!(message = ?old, "prior rendering missing; dropped open question");
    return Ok(Recovered::Dropped);
  }

  let unanswered = question.unanswered();
  let new_id = presenter
    .render_question(old.channel_id, &question.content, &unanswered)
    .await?;

  store.rebind_message(old, new_id).await.map_err(Error::store)?;

  if let Err(err) = presenter.delete_question(old).await {
    tracing::warn!(message = ?old, error = %err, "failed to delete old rendering");
  }

  tracing::info!(old = ?old, new = ?new_id, "question re-rendered");
  Ok(Recovered::Restored)
}

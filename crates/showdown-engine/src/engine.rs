//! [`Engine`] — the question lifecycle engine.
//!
//! State machine for one question:
//! `OPEN(k unanswered) → OPEN(k-1) → … → OPEN(0) → CLOSED`, with an
//! alternate edge `OPEN(any) → CLOSED` on timeout or forced closure.
//! `CLOSED` is terminal and deletes the row; only scorecard deltas persist.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use chrono::{Duration, Utc};

use showdown_core::{
  ids::{ChannelId, MessageRef, ParticipantId, QuestionId},
  presenter::{PresentError, Presenter},
  question::{AnswerOutcome, QuestionContent},
  store::{NewQuestion, TriviaStore},
};

use crate::{Error, Result};

pub struct Engine<S, P> {
  store:     Arc<S>,
  presenter: Arc<P>,
  /// False until startup recovery completes; question creation is rejected
  /// while false so a recovering question can never be rendered twice.
  accepting: AtomicBool,
}

impl<S, P> Engine<S, P>
where
  S: TriviaStore,
  P: Presenter,
{
  pub fn new(store: Arc<S>, presenter: Arc<P>) -> Self {
    Self { store, presenter, accepting: AtomicBool::new(false) }
  }

  /// Open the engine for question creation. Called once recovery has
  /// completed (or been explicitly bypassed).
  pub fn accept_questions(&self) { self.accepting.store(true, Ordering::SeqCst); }

  pub fn is_accepting(&self) -> bool { self.accepting.load(Ordering::SeqCst) }

  // ── Creation ──────────────────────────────────────────────────────────────

  /// Render a question into `channel` and persist it as open.
  ///
  /// The render happens first and is not transactional with the store
  /// write; if the write fails, the rendering is retracted (compensating
  /// delete) and the failure propagated. No partial question row survives
  /// either way.
  pub async fn post_question(
    &self,
    channel: ChannelId,
    content: QuestionContent,
    eligible: Vec<ParticipantId>,
  ) -> Result<QuestionId> {
    if !self.is_accepting() {
      return Err(Error::RecoveryPending);
    }
    if eligible.is_empty() {
      return Err(Error::NoEligibleParticipants);
    }

    let message_id = self
      .presenter
      .render_question(channel, &content, &eligible)
      .await?;
    let message = MessageRef::new(message_id, channel);

    match self
      .store
      .create_question(NewQuestion { message, content, eligible })
      .await
    {
      Ok(question_id) => {
        tracing::info!(message = ?message, question = ?question_id, "question opened");
        Ok(question_id)
      }
      Err(err) => {
        if let Err(del) = self.presenter.delete_question(message).await {
          tracing::warn!(
            message = ?message,
            error = %del,
            "compensating delete of rendering failed",
          );
        }
        Err(Error::store(err))
      }
    }
  }

  /// Post a question addressed to every participant enrolled in the
  /// channel. The membership synchronizer keeps enrollment aligned with
  /// channel access, so the scorecard set is the eligible set.
  pub async fn post_to_channel(
    &self,
    channel: ChannelId,
    content: QuestionContent,
  ) -> Result<QuestionId> {
    let eligible = self
      .store
      .channel_scores(channel)
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|card| card.participant_id)
      .collect();
    self.post_question(channel, content, eligible).await
  }

  // ── Answer resolution ─────────────────────────────────────────────────────

  /// Resolve one participant's button press against the open question bound
  /// to `message`.
  ///
  /// Unknown messages, unknown participants, and redelivered presses all
  /// come back as [`AnswerOutcome::AlreadyFinal`] — absorbed, never an
  /// error. When the last record resolves, the question is closed.
  pub async fn handle_answer(
    &self,
    message: MessageRef,
    participant: ParticipantId,
    selected: &str,
  ) -> Result<AnswerOutcome> {
    let Some(open) = self.store.open_question(message).await.map_err(Error::store)?
    else {
      return Ok(AnswerOutcome::AlreadyFinal);
    };

    let correct = selected == open.content.correct_answer;
    let outcome = self
      .store
      .resolve_answer(participant, open.question_id, correct)
      .await
      .map_err(Error::store)?;

    if let AnswerOutcome::Resolved { correct, completed } = outcome {
      // The store has committed; a failed status update is cosmetic and
      // recovery will repaint it.
      if let Err(err) = self
        .presenter
        .update_answer_status(message, participant, correct)
        .await
      {
        tracing::warn!(message = ?message, error = %err, "answer status update failed");
      }

      if completed {
        self.finish(message, &open.content.correct_answer).await?;
      }
    }

    Ok(outcome)
  }

  // ── Closing ───────────────────────────────────────────────────────────────

  /// Close the question bound to `message`, revealing the correct answer on
  /// the rendering. Returns whether a question was actually open; closing
  /// an already-closed question is a no-op.
  pub async fn close_question(&self, message: MessageRef) -> Result<bool> {
    let Some(open) = self.store.open_question(message).await.map_err(Error::store)?
    else {
      return Ok(false);
    };
    self.finish(message, &open.content.correct_answer).await?;
    Ok(true)
  }

  async fn finish(&self, message: MessageRef, correct_answer: &str) -> Result<()> {
    match self.presenter.close_question(message, correct_answer).await {
      Ok(()) => {}
      Err(PresentError::NotFound) => {
        tracing::warn!(message = ?message, "rendering already gone at close");
      }
      Err(err) => {
        tracing::warn!(message = ?message, error = %err, "failed to close rendering");
      }
    }

    self.store.close_question(message).await.map_err(Error::store)?;
    tracing::info!(message = ?message, "question closed");
    Ok(())
  }

  // ── Periodic sweep ────────────────────────────────────────────────────────

  /// Close every open question older than `max_age` as timed out. Items are
  /// independent: one failure is logged and the sweep continues, so an
  /// interrupted pass leaves later items for the next cycle.
  pub async fn sweep_stale(&self, max_age: Duration) -> Result<u64> {
    let now = Utc::now();
    let open = self.store.open_questions(None).await.map_err(Error::store)?;

    let mut closed = 0u64;
    for question in open {
      if question.age(now) <= max_age {
        continue;
      }
      match self.close_question(question.message).await {
        Ok(true) => {
          closed += 1;
          tracing::info!(message = ?question.message, "stale question timed out");
        }
        Ok(false) => {}
        Err(err) => {
          tracing::warn!(message = ?question.message, error = %err, "sweep close failed");
        }
      }
    }
    Ok(closed)
  }
}

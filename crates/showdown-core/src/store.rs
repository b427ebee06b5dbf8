//! The `TriviaStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g.
//! `showdown-store-sqlite`). The engine depends on this abstraction, not on
//! any concrete backend.
//!
//! Every multi-step write (question creation, answer resolution) is a single
//! store operation: the backend runs it inside one transaction, which is the
//! serialization point required for the once-only answer rule. Provider and
//! presentation I/O never happens inside a store operation.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  ids::{ChannelId, GuildId, MessageId, MessageRef, ParticipantId, QuestionId},
  membership::{Channel, Participant, Scorecard},
  question::{AnswerOutcome, OpenQuestion, QuestionContent},
  token::ProviderToken,
};

// ─── Input type ──────────────────────────────────────────────────────────────

/// Everything needed to persist a freshly-rendered question.
///
/// The rendering already exists on the platform when this is built; if the
/// store insert fails, the caller owes the platform a compensating delete.
#[derive(Debug, Clone)]
pub struct NewQuestion {
  /// Identity of the already-rendered presentation message.
  pub message:  MessageRef,
  pub content:  QuestionContent,
  /// The closed set of eligible participants, computed at call time.
  /// One answer record is created per entry; none are ever added later.
  pub eligible: Vec<ParticipantId>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the durable trivia store.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait TriviaStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Membership ────────────────────────────────────────────────────────

  /// Insert or update a participant row. Tolerant of redelivery.
  fn upsert_participant(
    &self,
    participant: Participant,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete a participant; scorecards cascade. No-op if absent.
  fn remove_participant(
    &self,
    id: ParticipantId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete every participant with zero remaining scorecards.
  /// Returns the number of rows removed.
  fn prune_orphans(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Insert or update a channel row. Tolerant of redelivery.
  fn upsert_channel(
    &self,
    channel: Channel,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete a channel; scorecards, open questions, and the provider token
  /// cascade. No-op if absent.
  fn remove_channel(
    &self,
    id: ChannelId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete every channel belonging to a guild, cascading as
  /// [`remove_channel`](Self::remove_channel) does.
  fn remove_guild(
    &self,
    id: GuildId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn rename_channel<'a>(
    &'a self,
    id: ChannelId,
    name: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Scorecards ────────────────────────────────────────────────────────

  /// Create the enrollment row if absent; existing scores are untouched.
  fn ensure_scorecard(
    &self,
    participant: ParticipantId,
    channel: ChannelId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete the enrollment row if present.
  fn remove_scorecard(
    &self,
    participant: ParticipantId,
    channel: ChannelId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_score(
    &self,
    participant: ParticipantId,
    channel: ChannelId,
  ) -> impl Future<Output = Result<Option<i64>, Self::Error>> + Send + '_;

  fn channel_scores(
    &self,
    channel: ChannelId,
  ) -> impl Future<Output = Result<Vec<Scorecard>, Self::Error>> + Send + '_;

  // ── Question lifecycle ────────────────────────────────────────────────

  /// Persist an open question: the message row, its content, distractors,
  /// and one answer record per eligible participant — all in one
  /// transaction. Returns the generated question id used to correlate
  /// later answers.
  fn create_question(
    &self,
    input: NewQuestion,
  ) -> impl Future<Output = Result<QuestionId, Self::Error>> + Send + '_;

  /// Load the open question bound to a rendered message, or `None`.
  fn open_question(
    &self,
    message: MessageRef,
  ) -> impl Future<Output = Result<Option<OpenQuestion>, Self::Error>> + Send + '_;

  /// Load every open question, optionally scoped to one channel, ordered by
  /// channel then message.
  fn open_questions(
    &self,
    channel: Option<ChannelId>,
  ) -> impl Future<Output = Result<Vec<OpenQuestion>, Self::Error>> + Send + '_;

  /// Resolve one participant's answer under the once-only rule.
  ///
  /// If no answer record exists for the pair with `answered = false`, this
  /// is a no-op reporting [`AnswerOutcome::AlreadyFinal`]. Otherwise it
  /// flips the record, adjusts the participant's scorecard by ±1 in the
  /// question's channel, and counts the remaining unanswered records — all
  /// in one transaction, so the completion signal is observed exactly once.
  fn resolve_answer(
    &self,
    participant: ParticipantId,
    question: QuestionId,
    correct: bool,
  ) -> impl Future<Output = Result<AnswerOutcome, Self::Error>> + Send + '_;

  /// Delete the open question bound to `message`, cascading to its content,
  /// distractors, and answer records. Returns whether a row was deleted;
  /// closing an already-closed question is a no-op.
  fn close_question(
    &self,
    message: MessageRef,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Re-bind an open question to a fresh rendered-message identity within
  /// the same channel. Question content follows the key.
  fn rebind_message(
    &self,
    old: MessageRef,
    new: MessageId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Provider tokens ───────────────────────────────────────────────────

  fn get_token(
    &self,
    channel: ChannelId,
  ) -> impl Future<Output = Result<Option<ProviderToken>, Self::Error>> + Send + '_;

  fn list_tokens(
    &self,
  ) -> impl Future<Output = Result<Vec<ProviderToken>, Self::Error>> + Send + '_;

  /// Insert or replace the channel's token row.
  fn put_token(
    &self,
    token: ProviderToken,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete the channel's token row. Returns whether one existed.
  fn delete_token(
    &self,
    channel: ChannelId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Update `last_refreshed` and `refresh_count` on an existing token.
  fn touch_token(
    &self,
    channel: ChannelId,
    last_refreshed: DateTime<Utc>,
    refresh_count: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Update only `refresh_count` on an existing token.
  fn set_refresh_count(
    &self,
    channel: ChannelId,
    refresh_count: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

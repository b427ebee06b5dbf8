//! The presentation boundary — the chat-platform adapter seam.
//!
//! The engine never talks to the chat platform directly; it asks a
//! [`Presenter`] to render, update, close, and delete question messages.
//! Implementations wrap whatever platform SDK is in use. All calls are
//! asynchronous I/O and may suspend the calling task; the engine guarantees
//! none of them happen inside a store transaction.

use std::future::Future;

use thiserror::Error;

use crate::{
  ids::{ChannelId, MessageId, MessageRef, ParticipantId},
  question::QuestionContent,
};

#[derive(Debug, Error)]
pub enum PresentError {
  /// The referenced rendering no longer exists on the platform. Expected
  /// during recovery (someone deleted the message while we were down).
  #[error("rendering not found")]
  NotFound,

  #[error("presentation transport error: {0}")]
  Transport(String),
}

pub type PresentResult<T> = Result<T, PresentError>;

/// Renders questions into a chat channel and reflects answer progress.
///
/// `render_question` must be safe to call repeatedly for the same logical
/// question during recovery — each call produces a fresh rendering and the
/// engine deletes the old one.
///
/// All methods return `Send` futures so recovery can drive renders for
/// distinct questions concurrently.
pub trait Presenter: Send + Sync {
  /// Render a question addressed to `eligible`, returning the new message
  /// identity.
  fn render_question<'a>(
    &'a self,
    channel: ChannelId,
    content: &'a QuestionContent,
    eligible: &'a [ParticipantId],
  ) -> impl Future<Output = PresentResult<MessageId>> + Send + 'a;

  /// Whether a rendering still exists on the platform. Recovery probes the
  /// prior rendering before producing a replacement.
  fn rendering_exists(
    &self,
    message: MessageRef,
  ) -> impl Future<Output = PresentResult<bool>> + Send + '_;

  /// Reflect one participant's resolved answer on the live rendering.
  fn update_answer_status(
    &self,
    message: MessageRef,
    participant: ParticipantId,
    correct: bool,
  ) -> impl Future<Output = PresentResult<()>> + Send + '_;

  /// Mark the rendering closed, revealing the correct answer.
  fn close_question<'a>(
    &'a self,
    message: MessageRef,
    correct_answer: &'a str,
  ) -> impl Future<Output = PresentResult<()>> + Send + 'a;

  /// Remove a rendering entirely (compensation and recovery cleanup).
  fn delete_question(
    &self,
    message: MessageRef,
  ) -> impl Future<Output = PresentResult<()>> + Send + '_;

  /// Whether a participant may post in a channel right now.
  fn can_post(
    &self,
    channel: ChannelId,
    participant: ParticipantId,
  ) -> impl Future<Output = PresentResult<bool>> + Send + '_;
}

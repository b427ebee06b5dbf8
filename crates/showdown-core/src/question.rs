//! Question content, answer records, and the open-question snapshot.
//!
//! An open question's answer-record set is fixed when the question is
//! created. Participants who join the channel later cannot answer it; that
//! closed set is what makes "all answered" decidable.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MessageRef, ParticipantId, QuestionId};

// ─── Difficulty ──────────────────────────────────────────────────────────────

/// Question difficulty as reported by the content provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Easy => "easy",
      Self::Medium => "medium",
      Self::Hard => "hard",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "easy" => Some(Self::Easy),
      "medium" => Some(Self::Medium),
      "hard" => Some(Self::Hard),
      _ => None,
    }
  }
}

// ─── Content ─────────────────────────────────────────────────────────────────

/// Validated question content ready to be posted to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionContent {
  pub text:           String,
  pub correct_answer: String,
  /// Incorrect answer labels, presented alongside the correct one.
  pub distractors:    Vec<String>,
  pub category:       String,
  pub difficulty:     Difficulty,
}

impl QuestionContent {
  /// All answer labels in stored order: distractors first, then the correct
  /// answer. Shuffling for display is the presenter's concern.
  pub fn options(&self) -> impl Iterator<Item = &str> {
    self
      .distractors
      .iter()
      .map(String::as_str)
      .chain(std::iter::once(self.correct_answer.as_str()))
  }
}

// ─── Answer records ──────────────────────────────────────────────────────────

/// One participant's answer slot for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
  pub participant_id: ParticipantId,
  pub answered:       bool,
  pub correct:        bool,
}

/// Outcome of resolving one participant's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
  /// The record flipped from unanswered to answered. `completed` is true
  /// exactly when this was the last remaining unanswered record.
  Resolved { correct: bool, completed: bool },
  /// No unanswered record exists for this participant and question — either
  /// a duplicate delivery of the same interaction or a participant outside
  /// the eligible set. Absorbed as a no-op.
  AlreadyFinal,
}

impl AnswerOutcome {
  pub fn is_final(&self) -> bool { matches!(self, Self::AlreadyFinal) }
}

// ─── Open-question snapshot ──────────────────────────────────────────────────

/// A question awaiting answers, as loaded from the store.
///
/// This is the unit of recovery: everything needed to re-render the question
/// to a fresh message identity after a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenQuestion {
  pub message:     MessageRef,
  pub question_id: QuestionId,
  pub created_at:  DateTime<Utc>,
  pub content:     QuestionContent,
  pub answers:     Vec<AnswerRecord>,
}

impl OpenQuestion {
  /// Participants whose answer record is still unanswered.
  pub fn unanswered(&self) -> Vec<ParticipantId> {
    self
      .answers
      .iter()
      .filter(|r| !r.answered)
      .map(|r| r.participant_id)
      .collect()
  }

  pub fn age(&self, now: DateTime<Utc>) -> Duration { now - self.created_at }
}

//! [`SqliteStore`] — the SQLite implementation of [`TriviaStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use showdown_core::{
  ids::{ChannelId, GuildId, MessageId, MessageRef, ParticipantId, QuestionId},
  membership::{Channel, Participant, Scorecard},
  question::{AnswerOutcome, AnswerRecord, OpenQuestion, QuestionContent},
  store::{NewQuestion, TriviaStore},
  token::ProviderToken,
};

use crate::{
  encode::{decode_difficulty, decode_dt, encode_difficulty, encode_dt},
  schema::SCHEMA,
  Error, Result,
};

// ─── Raw row types ───────────────────────────────────────────────────────────

/// Raw values read for one open question before decoding.
struct RawOpenQuestion {
  message_id:     i64,
  channel_id:     i64,
  question_id:    i64,
  created_at:     String,
  text:           String,
  correct_answer: String,
  category:       String,
  difficulty:     String,
  distractors:    Vec<String>,
  answers:        Vec<(i64, bool, bool)>,
}

impl RawOpenQuestion {
  fn into_open(self) -> Result<OpenQuestion> {
    Ok(OpenQuestion {
      message:     MessageRef::new(
        MessageId(self.message_id),
        ChannelId(self.channel_id),
      ),
      question_id: QuestionId(self.question_id),
      created_at:  decode_dt(&self.created_at)?,
      content:     QuestionContent {
        text:           self.text,
        correct_answer: self.correct_answer,
        distractors:    self.distractors,
        category:       self.category,
        difficulty:     decode_difficulty(&self.difficulty)?,
      },
      answers:     self
        .answers
        .into_iter()
        .map(|(id, answered, correct)| AnswerRecord {
          participant_id: ParticipantId(id),
          answered,
          correct,
        })
        .collect(),
    })
  }
}

/// Load the raw open questions matched by `where_clause` (over `m`/`q`
/// aliases), with their distractors and answer records.
fn load_raw_questions(
  conn: &rusqlite::Connection,
  where_clause: &str,
  params: &[&dyn rusqlite::ToSql],
) -> rusqlite::Result<Vec<RawOpenQuestion>> {
  let sql = format!(
    "SELECT m.message_id, m.channel_id, q.question_id, m.created_at,
            q.text, q.correct_answer, q.category, q.difficulty
     FROM messages m
     INNER JOIN questions q
        ON q.message_id = m.message_id AND q.channel_id = m.channel_id
     {where_clause}
     ORDER BY m.channel_id, m.message_id"
  );

  let mut stmt = conn.prepare(&sql)?;
  let mut raws = stmt
    .query_map(params, |row| {
      Ok(RawOpenQuestion {
        message_id:     row.get(0)?,
        channel_id:     row.get(1)?,
        question_id:    row.get(2)?,
        created_at:     row.get(3)?,
        text:           row.get(4)?,
        correct_answer: row.get(5)?,
        category:       row.get(6)?,
        difficulty:     row.get(7)?,
        distractors:    vec![],
        answers:        vec![],
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  for raw in &mut raws {
    let mut stmt = conn.prepare(
      "SELECT label FROM distractors WHERE question_id = ?1
       ORDER BY distractor_id",
    )?;
    raw.distractors = stmt
      .query_map(rusqlite::params![raw.question_id], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
      "SELECT participant_id, answered, correct FROM answer_records
       WHERE question_id = ?1 ORDER BY participant_id",
    )?;
    raw.answers = stmt
      .query_map(rusqlite::params![raw.question_id], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
  }

  Ok(raws)
}

fn token_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, String, i64)> {
  Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Showdown trivia store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── TriviaStore impl ────────────────────────────────────────────────────────

impl TriviaStore for SqliteStore {
  type Error = Error;

  // ── Membership ────────────────────────────────────────────────────────────

  async fn upsert_participant(&self, participant: Participant) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO participants (participant_id, username)
           VALUES (?1, ?2)
           ON CONFLICT (participant_id) DO UPDATE SET username = excluded.username",
          rusqlite::params![participant.participant_id.0, participant.username],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn remove_participant(&self, id: ParticipantId) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM participants WHERE participant_id = ?1",
          rusqlite::params![id.0],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn prune_orphans(&self) -> Result<u64> {
    let removed = self
      .conn
      .call(|conn| {
        let n = conn.execute(
          "DELETE FROM participants
           WHERE participant_id NOT IN
             (SELECT DISTINCT participant_id FROM scorecards)",
          [],
        )?;
        Ok(n as u64)
      })
      .await?;
    Ok(removed)
  }

  async fn upsert_channel(&self, channel: Channel) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO channels (channel_id, guild_id, name)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (channel_id) DO UPDATE
             SET guild_id = excluded.guild_id, name = excluded.name",
          rusqlite::params![
            channel.channel_id.0,
            channel.guild_id.0,
            channel.name,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn remove_channel(&self, id: ChannelId) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM channels WHERE channel_id = ?1",
          rusqlite::params![id.0],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn remove_guild(&self, id: GuildId) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM channels WHERE guild_id = ?1",
          rusqlite::params![id.0],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn rename_channel(&self, id: ChannelId, name: &str) -> Result<()> {
    let name = name.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE channels SET name = ?2 WHERE channel_id = ?1",
          rusqlite::params![id.0, name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Scorecards ────────────────────────────────────────────────────────────

  async fn ensure_scorecard(
    &self,
    participant: ParticipantId,
    channel: ChannelId,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO scorecards (participant_id, channel_id)
           VALUES (?1, ?2)",
          rusqlite::params![participant.0, channel.0],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn remove_scorecard(
    &self,
    participant: ParticipantId,
    channel: ChannelId,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM scorecards WHERE participant_id = ?1 AND channel_id = ?2",
          rusqlite::params![participant.0, channel.0],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_score(
    &self,
    participant: ParticipantId,
    channel: ChannelId,
  ) -> Result<Option<i64>> {
    let score = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT score FROM scorecards
               WHERE participant_id = ?1 AND channel_id = ?2",
              rusqlite::params![participant.0, channel.0],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(score)
  }

  async fn channel_scores(&self, channel: ChannelId) -> Result<Vec<Scorecard>> {
    let rows: Vec<(i64, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT participant_id, score FROM scorecards
           WHERE channel_id = ?1 ORDER BY score DESC, participant_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![channel.0], |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .map(|(participant_id, score)| Scorecard {
          participant_id: ParticipantId(participant_id),
          channel_id: channel,
          score,
        })
        .collect(),
    )
  }

  // ── Question lifecycle ────────────────────────────────────────────────────

  async fn create_question(&self, input: NewQuestion) -> Result<QuestionId> {
    let created_at = encode_dt(Utc::now());

    let question_id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        tx.execute(
          "INSERT INTO messages (message_id, channel_id, created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![
            input.message.message_id.0,
            input.message.channel_id.0,
            created_at,
          ],
        )?;

        tx.execute(
          "INSERT INTO questions
             (text, correct_answer, category, difficulty, message_id, channel_id)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            input.content.text,
            input.content.correct_answer,
            input.content.category,
            encode_difficulty(input.content.difficulty),
            input.message.message_id.0,
            input.message.channel_id.0,
          ],
        )?;
        let question_id = tx.last_insert_rowid();

        for label in &input.content.distractors {
          tx.execute(
            "INSERT INTO distractors (label, question_id) VALUES (?1, ?2)",
            rusqlite::params![label, question_id],
          )?;
        }

        for participant in &input.eligible {
          tx.execute(
            "INSERT INTO answer_records (participant_id, question_id)
             VALUES (?1, ?2)",
            rusqlite::params![participant.0, question_id],
          )?;
        }

        tx.commit()?;
        Ok(question_id)
      })
      .await?;

    Ok(QuestionId(question_id))
  }

  async fn open_question(&self, message: MessageRef) -> Result<Option<OpenQuestion>> {
    let raws = self
      .conn
      .call(move |conn| {
        Ok(load_raw_questions(
          conn,
          "WHERE m.message_id = ?1 AND m.channel_id = ?2",
          &[&message.message_id.0, &message.channel_id.0],
        )?)
      })
      .await?;

    raws.into_iter().next().map(RawOpenQuestion::into_open).transpose()
  }

  async fn open_questions(&self, channel: Option<ChannelId>) -> Result<Vec<OpenQuestion>> {
    let raws = self
      .conn
      .call(move |conn| {
        let raws = match channel {
          Some(c) => {
            load_raw_questions(conn, "WHERE m.channel_id = ?1", &[&c.0])?
          }
          None => load_raw_questions(conn, "", &[])?,
        };
        Ok(raws)
      })
      .await?;

    raws.into_iter().map(RawOpenQuestion::into_open).collect()
  }

  async fn resolve_answer(
    &self,
    participant: ParticipantId,
    question: QuestionId,
    correct: bool,
  ) -> Result<AnswerOutcome> {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // The once-only rule: flip the record only if it is still
        // unanswered. Zero rows means a duplicate delivery or a
        // participant outside the fixed eligible set.
        let flipped = tx.execute(
          "UPDATE answer_records SET answered = 1, correct = ?3
           WHERE participant_id = ?1 AND question_id = ?2 AND answered = 0",
          rusqlite::params![participant.0, question.0, correct],
        )?;
        if flipped == 0 {
          return Ok(AnswerOutcome::AlreadyFinal);
        }

        let channel_id: i64 = tx.query_row(
          "SELECT channel_id FROM questions WHERE question_id = ?1",
          rusqlite::params![question.0],
          |row| row.get(0),
        )?;

        // Scorecard may be gone if the participant lost channel access
        // after question creation; the answer still counts, the score
        // update silently misses.
        let delta: i64 = if correct { 1 } else { -1 };
        tx.execute(
          "UPDATE scorecards SET score = score + ?3
           WHERE participant_id = ?1 AND channel_id = ?2",
          rusqlite::params![participant.0, channel_id, delta],
        )?;

        let remaining: i64 = tx.query_row(
          "SELECT COUNT(*) FROM answer_records
           WHERE question_id = ?1 AND answered = 0",
          rusqlite::params![question.0],
          |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(AnswerOutcome::Resolved { correct, completed: remaining == 0 })
      })
      .await?;
    Ok(outcome)
  }

  async fn close_question(&self, message: MessageRef) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM messages WHERE message_id = ?1 AND channel_id = ?2",
          rusqlite::params![message.message_id.0, message.channel_id.0],
        )?;
        Ok(n > 0)
      })
      .await?;
    Ok(deleted)
  }

  async fn rebind_message(&self, old: MessageRef, new: MessageId) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE messages SET message_id = ?3
           WHERE message_id = ?1 AND channel_id = ?2",
          rusqlite::params![old.message_id.0, old.channel_id.0, new.0],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Provider tokens ───────────────────────────────────────────────────────

  async fn get_token(&self, channel: ChannelId) -> Result<Option<ProviderToken>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT channel_id, token, last_refreshed, refresh_count
               FROM provider_tokens WHERE channel_id = ?1",
              rusqlite::params![channel.0],
              token_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(channel_id, token, last_refreshed, refresh_count)| {
        Ok(ProviderToken {
          channel_id: ChannelId(channel_id),
          token,
          last_refreshed: decode_dt(&last_refreshed)?,
          refresh_count,
        })
      })
      .transpose()
  }

  async fn list_tokens(&self) -> Result<Vec<ProviderToken>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT channel_id, token, last_refreshed, refresh_count
           FROM provider_tokens ORDER BY channel_id",
        )?;
        let rows = stmt
          .query_map([], token_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(channel_id, token, last_refreshed, refresh_count)| {
        Ok(ProviderToken {
          channel_id: ChannelId(channel_id),
          token,
          last_refreshed: decode_dt(&last_refreshed)?,
          refresh_count,
        })
      })
      .collect()
  }

  async fn put_token(&self, token: ProviderToken) -> Result<()> {
    let last_refreshed = encode_dt(token.last_refreshed);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO provider_tokens
             (channel_id, token, last_refreshed, refresh_count)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![
            token.channel_id.0,
            token.token,
            last_refreshed,
            token.refresh_count,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_token(&self, channel: ChannelId) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM provider_tokens WHERE channel_id = ?1",
          rusqlite::params![channel.0],
        )?;
        Ok(n > 0)
      })
      .await?;
    Ok(deleted)
  }

  async fn touch_token(
    &self,
    channel: ChannelId,
    last_refreshed: DateTime<Utc>,
    refresh_count: i64,
  ) -> Result<()> {
    let last_refreshed = encode_dt(last_refreshed);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE provider_tokens
           SET last_refreshed = ?2, refresh_count = ?3
           WHERE channel_id = ?1",
          rusqlite::params![channel.0, last_refreshed, refresh_count],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn set_refresh_count(&self, channel: ChannelId, refresh_count: i64) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE provider_tokens SET refresh_count = ?2 WHERE channel_id = ?1",
          rusqlite::params![channel.0, refresh_count],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

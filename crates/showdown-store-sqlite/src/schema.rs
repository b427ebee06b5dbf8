//! SQL schema for the Showdown SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// The `messages` row is the open question's durable anchor: deleting it
/// cascades through question content, distractors, and answer records. Only
/// scorecards outlive a closed question.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS participants (
    participant_id INTEGER PRIMARY KEY,
    username       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS channels (
    channel_id INTEGER PRIMARY KEY,
    guild_id   INTEGER NOT NULL,
    name       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS scorecards (
    participant_id INTEGER NOT NULL
        REFERENCES participants(participant_id) ON DELETE CASCADE,
    channel_id     INTEGER NOT NULL
        REFERENCES channels(channel_id) ON DELETE CASCADE,
    score          INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (participant_id, channel_id)
);

-- One row per open question; deleting it closes the question.
CREATE TABLE IF NOT EXISTS messages (
    message_id INTEGER NOT NULL,
    channel_id INTEGER NOT NULL
        REFERENCES channels(channel_id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,    -- ISO 8601 UTC; store-assigned
    PRIMARY KEY (message_id, channel_id)
);

-- ON UPDATE CASCADE lets recovery re-key the message row; the content row
-- follows automatically.
CREATE TABLE IF NOT EXISTS questions (
    question_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    text           TEXT NOT NULL,
    correct_answer TEXT NOT NULL,
    category       TEXT NOT NULL,
    difficulty     TEXT NOT NULL,    -- 'easy' | 'medium' | 'hard'
    message_id     INTEGER NOT NULL,
    channel_id     INTEGER NOT NULL,
    FOREIGN KEY (message_id, channel_id)
        REFERENCES messages(message_id, channel_id)
        ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE IF NOT EXISTS distractors (
    distractor_id INTEGER PRIMARY KEY AUTOINCREMENT,
    label         TEXT NOT NULL,
    question_id   INTEGER NOT NULL
        REFERENCES questions(question_id) ON DELETE CASCADE
);

-- Fixed at question creation; rows are flipped in place, never added.
CREATE TABLE IF NOT EXISTS answer_records (
    participant_id INTEGER NOT NULL,
    question_id    INTEGER NOT NULL
        REFERENCES questions(question_id) ON DELETE CASCADE,
    answered       INTEGER NOT NULL DEFAULT 0,
    correct        INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (participant_id, question_id)
);

CREATE TABLE IF NOT EXISTS provider_tokens (
    channel_id     INTEGER PRIMARY KEY
        REFERENCES channels(channel_id) ON DELETE CASCADE,
    token          TEXT NOT NULL,
    last_refreshed TEXT NOT NULL,
    refresh_count  INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS questions_message_idx
    ON questions(message_id, channel_id);
CREATE INDEX IF NOT EXISTS answer_records_question_idx
    ON answer_records(question_id);
CREATE INDEX IF NOT EXISTS scorecards_channel_idx
    ON scorecards(channel_id);

PRAGMA user_version = 1;
";

//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings; difficulty as its lowercase
//! name; platform ids as their raw `i64`.

use chrono::{DateTime, Utc};
use showdown_core::question::Difficulty;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Difficulty ──────────────────────────────────────────────────────────────

pub fn encode_difficulty(d: Difficulty) -> &'static str { d.as_str() }

pub fn decode_difficulty(s: &str) -> Result<Difficulty> {
  Difficulty::parse(s)
    .ok_or_else(|| showdown_core::Error::UnknownDifficulty(s.to_owned()).into())
}

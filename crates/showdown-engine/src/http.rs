//! HTTP client for the question-content provider.
//!
//! Two endpoints: `api_token.php` issues and resets session tokens, and
//! `api.php` serves questions. Replies carry a `response_code` alongside the
//! payload; decoding the code is the client's job, acting on it is the
//! caller's.

use std::time::Duration;

use serde::Deserialize;

use showdown_core::{
  provider::{
    ContentProvider, FetchParams, FetchReply, ProviderError, ProviderResult,
    ResponseCode,
  },
  question::{Difficulty, QuestionContent},
};

pub const DEFAULT_BASE_URL: &str = "https://opentdb.com";

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenReply {
  response_code: u8,
  token:         Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireReply {
  response_code: u8,
  #[serde(default)]
  results:       Vec<WireQuestion>,
}

/// One question as the provider serializes it. Text fields arrive
/// HTML-entity-encoded.
#[derive(Debug, Deserialize)]
struct WireQuestion {
  question:          String,
  correct_answer:    String,
  incorrect_answers: Vec<String>,
  category:          String,
  difficulty:        String,
}

impl WireQuestion {
  fn into_content(self) -> ProviderResult<QuestionContent> {
    let difficulty = Difficulty::parse(&self.difficulty).ok_or_else(|| {
      ProviderError::Malformed(format!("unknown difficulty {:?}", self.difficulty))
    })?;
    Ok(QuestionContent {
      text: unescape_entities(&self.question),
      correct_answer: unescape_entities(&self.correct_answer),
      distractors: self
        .incorrect_answers
        .iter()
        .map(|a| unescape_entities(a))
        .collect(),
      category: unescape_entities(&self.category),
      difficulty,
    })
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

pub struct HttpProvider {
  client:   reqwest::Client,
  base_url: String,
}

impl HttpProvider {
  pub fn new(base_url: impl Into<String>) -> ProviderResult<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| ProviderError::Transport(e.to_string()))?;
    Ok(Self { client, base_url: base_url.into() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.base_url.trim_end_matches('/'), path)
  }

  async fn get_json<T>(&self, url: String) -> ProviderResult<T>
  where
    T: serde::de::DeserializeOwned,
  {
    let response = self
      .client
      .get(&url)
      .send()
      .await
      .map_err(|e| ProviderError::Transport(e.to_string()))?
      .error_for_status()
      .map_err(|e| ProviderError::Transport(e.to_string()))?;
    response
      .json::<T>()
      .await
      .map_err(|e| ProviderError::Malformed(e.to_string()))
  }
}

impl ContentProvider for HttpProvider {
  async fn request_token(&self) -> ProviderResult<String> {
    let url = self.url("api_token.php?command=request");
    let reply: TokenReply = self.get_json(url).await?;
    if reply.response_code != 0 {
      return Err(ProviderError::TokenRejected(reply.response_code));
    }
    reply
      .token
      .ok_or_else(|| ProviderError::Malformed("token reply without token".into()))
  }

  async fn fetch_question(
    &self,
    params: FetchParams,
    token: &str,
  ) -> ProviderResult<FetchReply> {
    let mut url = self.url("api.php?amount=1");
    if let Some(category) = params.category {
      url.push_str(&format!("&category={category}"));
    }
    url.push_str(&format!("&token={token}"));

    let reply: WireReply = self.get_json(url).await?;
    let code = ResponseCode::from_wire(reply.response_code).ok_or_else(|| {
      ProviderError::Malformed(format!(
        "unknown response code {}",
        reply.response_code
      ))
    })?;

    let content = match code {
      ResponseCode::Success => {
        let question = reply.results.into_iter().next().ok_or_else(|| {
          ProviderError::Malformed("success reply with empty results".into())
        })?;
        Some(question.into_content()?)
      }
      _ => None,
    };

    Ok(FetchReply { code, content })
  }
}

// ─── Entity decoding ─────────────────────────────────────────────────────────

/// Decode the named and numeric HTML entities the provider emits. Anything
/// unrecognized is kept literally.
fn unescape_entities(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut rest = s;
  while let Some(start) = rest.find('&') {
    out.push_str(&rest[..start]);
    let tail = &rest[start..];
    let decoded = tail
      .find(';')
      .filter(|&end| end > 1)
      .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));
    match decoded {
      Some((c, end)) => {
        out.push(c);
        rest = &tail[end + 1..];
      }
      // Stray ampersand: emit it and rescan from the next character, so a
      // following entity still decodes.
      None => {
        out.push('&');
        rest = &tail[1..];
      }
    }
  }
  out.push_str(rest);
  out
}

fn decode_entity(entity: &str) -> Option<char> {
  match entity {
    "amp" => Some('&'),
    "lt" => Some('<'),
    "gt" => Some('>'),
    "quot" => Some('"'),
    "apos" | "#039" => Some('\''),
    _ => {
      let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
      } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok()?
      } else {
        return None;
      };
      char::from_u32(code)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unescape_handles_named_and_numeric_entities() {
    assert_eq!(
      unescape_entities("Ernest Hemingway&#039;s &quot;cats&quot;"),
      "Ernest Hemingway's \"cats\"",
    );
    assert_eq!(unescape_entities("A &amp; B &lt;= C"), "A & B <= C");
    assert_eq!(unescape_entities("caf&#xE9;"), "caf\u{e9}");
  }

  #[test]
  fn unescape_keeps_unknown_entities_literal() {
    assert_eq!(unescape_entities("&bogus; & done"), "&bogus; & done");
    assert_eq!(unescape_entities("dangling &amp"), "dangling &amp");
  }

  #[test]
  fn unescape_decodes_entity_after_stray_ampersand() {
    assert_eq!(unescape_entities("&&amp;"), "&&");
    assert_eq!(unescape_entities("a &; &lt; b"), "a &; < b");
  }

  #[test]
  fn decodes_question_payload() {
    let raw = r#"{
      "response_code": 0,
      "results": [{
        "category": "Science &amp; Nature",
        "type": "multiple",
        "difficulty": "medium",
        "question": "What&#039;s the chemical symbol for gold?",
        "correct_answer": "Au",
        "incorrect_answers": ["Ag", "Fe", "Pb"]
      }]
    }"#;
    let reply: WireReply = serde_json::from_str(raw).unwrap();
    assert_eq!(reply.response_code, 0);
    let content = reply.results.into_iter().next().unwrap().into_content().unwrap();
    assert_eq!(content.category, "Science & Nature");
    assert_eq!(content.text, "What's the chemical symbol for gold?");
    assert_eq!(content.correct_answer, "Au");
    assert_eq!(content.distractors, vec!["Ag", "Fe", "Pb"]);
    assert_eq!(content.difficulty, Difficulty::Medium);
  }

  #[test]
  fn decodes_empty_error_payload() {
    let raw = r#"{"response_code": 4, "results": []}"#;
    let reply: WireReply = serde_json::from_str(raw).unwrap();
    assert_eq!(ResponseCode::from_wire(reply.response_code), Some(ResponseCode::PoolExhausted));
  }
}

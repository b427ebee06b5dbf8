//! Engine tests against an in-memory store, a recording presenter, and a
//! scripted provider.

use std::{
  collections::{HashSet, VecDeque},
  sync::{
    atomic::{AtomicBool, AtomicI64, Ordering},
    Arc, Mutex,
  },
};

use chrono::{Duration, Utc};

use showdown_core::{
  ids::{ChannelId, GuildId, MessageId, MessageRef, ParticipantId},
  membership::{Channel, Participant},
  presenter::{PresentError, PresentResult, Presenter},
  provider::{
    ContentProvider, FetchParams, FetchReply, ProviderError, ProviderResult,
    ResponseCode,
  },
  question::{AnswerOutcome, Difficulty, QuestionContent},
  store::{NewQuestion, TriviaStore},
  token::ProviderToken,
};
use showdown_store_sqlite::SqliteStore;

use crate::{
  tokens::{RefreshAction, RefreshPolicy},
  Engine, EngineConfig, Error, MembershipSync, QuestionSource,
  RecoveryCoordinator, TokenManager,
};

// ─── Mock presenter ──────────────────────────────────────────────────────────

#[derive(Default)]
struct MockPresenter {
  next_id:      AtomicI64,
  fail_renders: AtomicBool,
  renders:      Mutex<Vec<(ChannelId, MessageId, Vec<ParticipantId>)>>,
  updates:      Mutex<Vec<(MessageRef, ParticipantId, bool)>>,
  closes:       Mutex<Vec<(MessageRef, String)>>,
  deletes:      Mutex<Vec<MessageRef>>,
  missing:      Mutex<HashSet<MessageRef>>,
  denied:       Mutex<HashSet<(ChannelId, ParticipantId)>>,
}

impl MockPresenter {
  fn new() -> Arc<Self> {
    let p = Self::default();
    p.next_id.store(1, Ordering::SeqCst);
    Arc::new(p)
  }

  fn mark_missing(&self, message: MessageRef) {
    self.missing.lock().unwrap().insert(message);
  }

  fn deny(&self, channel: ChannelId, participant: ParticipantId) {
    self.denied.lock().unwrap().insert((channel, participant));
  }

  fn renders(&self) -> Vec<(ChannelId, MessageId, Vec<ParticipantId>)> {
    self.renders.lock().unwrap().clone()
  }

  fn closes(&self) -> Vec<(MessageRef, String)> {
    self.closes.lock().unwrap().clone()
  }

  fn deletes(&self) -> Vec<MessageRef> { self.deletes.lock().unwrap().clone() }
}

impl Presenter for MockPresenter {
  async fn render_question(
    &self,
    channel: ChannelId,
    _content: &QuestionContent,
    eligible: &[ParticipantId],
  ) -> PresentResult<MessageId> {
    if self.fail_renders.load(Ordering::SeqCst) {
      return Err(PresentError::Transport("render refused".into()));
    }
    let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
    self
      .renders
      .lock()
      .unwrap()
      .push((channel, id, eligible.to_vec()));
    Ok(id)
  }

  async fn rendering_exists(&self, message: MessageRef) -> PresentResult<bool> {
    Ok(!self.missing.lock().unwrap().contains(&message))
  }

  async fn update_answer_status(
    &self,
    message: MessageRef,
    participant: ParticipantId,
    correct: bool,
  ) -> PresentResult<()> {
    self.updates.lock().unwrap().push((message, participant, correct));
    Ok(())
  }

  async fn close_question(
    &self,
    message: MessageRef,
    correct_answer: &str,
  ) -> PresentResult<()> {
    if self.missing.lock().unwrap().contains(&message) {
      return Err(PresentError::NotFound);
    }
    self
      .closes
      .lock()
      .unwrap()
      .push((message, correct_answer.to_owned()));
    Ok(())
  }

  async fn delete_question(&self, message: MessageRef) -> PresentResult<()> {
    self.deletes.lock().unwrap().push(message);
    Ok(())
  }

  async fn can_post(
    &self,
    channel: ChannelId,
    participant: ParticipantId,
  ) -> PresentResult<bool> {
    Ok(!self.denied.lock().unwrap().contains(&(channel, participant)))
  }
}

// ─── Scripted provider ───────────────────────────────────────────────────────

#[derive(Default)]
struct ScriptedProvider {
  tokens:  Mutex<VecDeque<String>>,
  replies: Mutex<VecDeque<FetchReply>>,
  fetches: AtomicI64,
}

impl ScriptedProvider {
  fn new(tokens: &[&str], replies: Vec<FetchReply>) -> Arc<Self> {
    Arc::new(Self {
      tokens:  Mutex::new(tokens.iter().map(|t| (*t).to_owned()).collect()),
      replies: Mutex::new(replies.into()),
      fetches: AtomicI64::new(0),
    })
  }

  fn fetches(&self) -> i64 { self.fetches.load(Ordering::SeqCst) }
}

fn reply(code: ResponseCode) -> FetchReply {
  let content = match code {
    ResponseCode::Success => Some(content()),
    _ => None,
  };
  FetchReply { code, content }
}

impl ContentProvider for ScriptedProvider {
  async fn request_token(&self) -> ProviderResult<String> {
    self
      .tokens
      .lock()
      .unwrap()
      .pop_front()
      .ok_or_else(|| ProviderError::Transport("no scripted token".into()))
  }

  async fn fetch_question(
    &self,
    _params: FetchParams,
    _token: &str,
  ) -> ProviderResult<FetchReply> {
    self.fetches.fetch_add(1, Ordering::SeqCst);
    self
      .replies
      .lock()
      .unwrap()
      .pop_front()
      .ok_or_else(|| ProviderError::Transport("no scripted reply".into()))
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

const CH: ChannelId = ChannelId(10);

fn content() -> QuestionContent {
  QuestionContent {
    text:           "Which planet has the most moons?".into(),
    correct_answer: "Saturn".into(),
    distractors:    vec!["Jupiter".into(), "Mars".into(), "Neptune".into()],
    category:       "Science".into(),
    difficulty:     Difficulty::Easy,
  }
}

async fn seeded_store(participants: &[i64]) -> Arc<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  store
    .upsert_channel(Channel {
      channel_id: CH,
      guild_id:   GuildId(1),
      name:       "trivia".into(),
    })
    .await
    .unwrap();
  for &id in participants {
    store
      .upsert_participant(Participant {
        participant_id: ParticipantId(id),
        username:       format!("user-{id}"),
      })
      .await
      .unwrap();
    store.ensure_scorecard(ParticipantId(id), CH).await.unwrap();
  }
  Arc::new(store)
}

fn engine(store: &Arc<SqliteStore>, presenter: &Arc<MockPresenter>) -> Engine<SqliteStore, MockPresenter> {
  Engine::new(Arc::clone(store), Arc::clone(presenter))
}

fn manager(
  store: &Arc<SqliteStore>,
  provider: &Arc<ScriptedProvider>,
) -> TokenManager<SqliteStore, ScriptedProvider> {
  TokenManager::new(Arc::clone(store), Arc::clone(provider), RefreshPolicy::default())
}

async fn stored_token(store: &SqliteStore) -> Option<ProviderToken> {
  store.get_token(CH).await.unwrap()
}

// ─── Question lifecycle ──────────────────────────────────────────────────────

#[tokio::test]
async fn post_rejected_until_recovery_completes() {
  let store = seeded_store(&[1]).await;
  let presenter = MockPresenter::new();
  let engine = engine(&store, &presenter);

  let err = engine
    .post_question(CH, content(), vec![ParticipantId(1)])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::RecoveryPending));
  assert!(presenter.renders().is_empty());

  engine.accept_questions();
  engine
    .post_question(CH, content(), vec![ParticipantId(1)])
    .await
    .unwrap();
}

#[tokio::test]
async fn post_requires_eligible_participants() {
  let store = seeded_store(&[]).await;
  let presenter = MockPresenter::new();
  let engine = engine(&store, &presenter);
  engine.accept_questions();

  let err = engine.post_question(CH, content(), vec![]).await.unwrap_err();
  assert!(matches!(err, Error::NoEligibleParticipants));
}

#[tokio::test]
async fn post_to_channel_addresses_every_enrolled_participant() {
  let store = seeded_store(&[1, 2, 3]).await;
  let presenter = MockPresenter::new();
  let engine = engine(&store, &presenter);
  engine.accept_questions();

  engine.post_to_channel(CH, content()).await.unwrap();
  let (_, _, eligible) = presenter.renders()[0].clone();
  assert_eq!(
    eligible,
    vec![ParticipantId(1), ParticipantId(2), ParticipantId(3)],
  );

  // An empty channel has nobody to ask.
  let empty = ChannelId(20);
  store
    .upsert_channel(Channel {
      channel_id: empty,
      guild_id:   GuildId(1),
      name:       "empty".into(),
    })
    .await
    .unwrap();
  let err = engine.post_to_channel(empty, content()).await.unwrap_err();
  assert!(matches!(err, Error::NoEligibleParticipants));
}

#[tokio::test]
async fn three_participants_score_and_complete() {
  let store = seeded_store(&[1, 2, 3]).await;
  let presenter = MockPresenter::new();
  let engine = engine(&store, &presenter);
  engine.accept_questions();

  let eligible = vec![ParticipantId(1), ParticipantId(2), ParticipantId(3)];
  engine.post_question(CH, content(), eligible).await.unwrap();
  let (_, message_id, _) = presenter.renders()[0];
  let message = MessageRef::new(message_id, CH);

  let first = engine
    .handle_answer(message, ParticipantId(1), "Saturn")
    .await
    .unwrap();
  assert_eq!(first, AnswerOutcome::Resolved { correct: true, completed: false });

  let second = engine
    .handle_answer(message, ParticipantId(2), "Mars")
    .await
    .unwrap();
  assert_eq!(second, AnswerOutcome::Resolved { correct: false, completed: false });
  assert!(presenter.closes().is_empty());

  let third = engine
    .handle_answer(message, ParticipantId(3), "Saturn")
    .await
    .unwrap();
  assert_eq!(third, AnswerOutcome::Resolved { correct: true, completed: true });

  assert_eq!(store.get_score(ParticipantId(1), CH).await.unwrap(), Some(1));
  assert_eq!(store.get_score(ParticipantId(2), CH).await.unwrap(), Some(-1));
  assert_eq!(store.get_score(ParticipantId(3), CH).await.unwrap(), Some(1));

  // Completion closes: rendering revealed, row gone.
  assert_eq!(presenter.closes(), vec![(message, "Saturn".to_owned())]);
  assert!(store.open_question(message).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_and_outsider_answers_are_absorbed() {
  let store = seeded_store(&[1, 2]).await;
  let presenter = MockPresenter::new();
  let engine = engine(&store, &presenter);
  engine.accept_questions();

  engine
    .post_question(CH, content(), vec![ParticipantId(1), ParticipantId(2)])
    .await
    .unwrap();
  let message = MessageRef::new(presenter.renders()[0].1, CH);

  engine
    .handle_answer(message, ParticipantId(1), "Saturn")
    .await
    .unwrap();

  // Redelivered press: no score movement, no completion.
  let dup = engine
    .handle_answer(message, ParticipantId(1), "Mars")
    .await
    .unwrap();
  assert_eq!(dup, AnswerOutcome::AlreadyFinal);
  assert_eq!(store.get_score(ParticipantId(1), CH).await.unwrap(), Some(1));

  // Outside the eligible set.
  let outsider = engine
    .handle_answer(message, ParticipantId(99), "Saturn")
    .await
    .unwrap();
  assert_eq!(outsider, AnswerOutcome::AlreadyFinal);
  assert!(store.open_question(message).await.unwrap().is_some());
}

#[tokio::test]
async fn answer_against_unknown_message_is_absorbed() {
  let store = seeded_store(&[1]).await;
  let presenter = MockPresenter::new();
  let engine = engine(&store, &presenter);
  engine.accept_questions();

  let outcome = engine
    .handle_answer(MessageRef::new(MessageId(404), CH), ParticipantId(1), "Saturn")
    .await
    .unwrap();
  assert_eq!(outcome, AnswerOutcome::AlreadyFinal);
}

#[tokio::test]
async fn failed_store_write_retracts_the_rendering() {
  let store = seeded_store(&[1]).await;
  let presenter = MockPresenter::new();
  let engine = engine(&store, &presenter);
  engine.accept_questions();

  // Occupy the message key the presenter will hand out next.
  store
    .create_question(NewQuestion {
      message:  MessageRef::new(MessageId(1), CH),
      content:  content(),
      eligible: vec![ParticipantId(1)],
    })
    .await
    .unwrap();

  let err = engine
    .post_question(CH, content(), vec![ParticipantId(1)])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Store(_)));
  assert_eq!(presenter.deletes(), vec![MessageRef::new(MessageId(1), CH)]);
}

#[tokio::test]
async fn explicit_close_reveals_and_is_idempotent() {
  let store = seeded_store(&[1, 2]).await;
  let presenter = MockPresenter::new();
  let engine = engine(&store, &presenter);
  engine.accept_questions();

  engine
    .post_question(CH, content(), vec![ParticipantId(1), ParticipantId(2)])
    .await
    .unwrap();
  let message = MessageRef::new(presenter.renders()[0].1, CH);

  assert!(engine.close_question(message).await.unwrap());
  assert_eq!(presenter.closes(), vec![(message, "Saturn".to_owned())]);

  // Second close finds nothing.
  assert!(!engine.close_question(message).await.unwrap());
  assert_eq!(presenter.closes().len(), 1);

  // Late press after closure.
  let late = engine
    .handle_answer(message, ParticipantId(1), "Saturn")
    .await
    .unwrap();
  assert_eq!(late, AnswerOutcome::AlreadyFinal);
  assert_eq!(store.get_score(ParticipantId(1), CH).await.unwrap(), Some(0));
}

#[tokio::test]
async fn sweep_closes_only_expired_questions() {
  let store = seeded_store(&[1]).await;
  let presenter = MockPresenter::new();
  let engine = engine(&store, &presenter);
  engine.accept_questions();

  engine
    .post_question(CH, content(), vec![ParticipantId(1)])
    .await
    .unwrap();

  assert_eq!(engine.sweep_stale(Duration::hours(24)).await.unwrap(), 0);
  assert_eq!(engine.sweep_stale(Duration::seconds(-1)).await.unwrap(), 1);
  assert!(store.open_questions(None).await.unwrap().is_empty());
}

// ─── Recovery ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn recovery_rebinds_to_a_fresh_rendering() {
  let store = seeded_store(&[1, 2]).await;
  let presenter = MockPresenter::new();
  let old = MessageRef::new(MessageId(500), CH);
  store
    .create_question(NewQuestion {
      message:  old,
      content:  content(),
      eligible: vec![ParticipantId(1), ParticipantId(2)],
    })
    .await
    .unwrap();

  let coordinator =
    RecoveryCoordinator::new(Arc::clone(&store), Arc::clone(&presenter));
  let report = coordinator.recover_all(None).await.unwrap();
  assert_eq!((report.restored, report.dropped), (1, 0));

  let new_id = presenter.renders()[0].1;
  assert!(store.open_question(old).await.unwrap().is_none());
  let moved = store
    .open_question(MessageRef::new(new_id, CH))
    .await
    .unwrap()
    .expect("question follows the new message");
  assert_eq!(moved.answers.len(), 2);
  assert_eq!(presenter.deletes(), vec![old]);
}

#[tokio::test]
async fn recovery_drops_questions_with_missing_renderings() {
  let store = seeded_store(&[1]).await;
  let presenter = MockPresenter::new();
  let old = MessageRef::new(MessageId(500), CH);
  store
    .create_question(NewQuestion {
      message:  old,
      content:  content(),
      eligible: vec![ParticipantId(1)],
    })
    .await
    .unwrap();
  presenter.mark_missing(old);

  let coordinator =
    RecoveryCoordinator::new(Arc::clone(&store), Arc::clone(&presenter));
  let report = coordinator.recover_all(None).await.unwrap();
  assert_eq!((report.restored, report.dropped), (0, 1));
  assert!(presenter.renders().is_empty());
  assert!(store.open_question(old).await.unwrap().is_none());
}

#[tokio::test]
async fn recovery_addresses_only_unanswered_participants() {
  let store = seeded_store(&[1, 2, 3]).await;
  let presenter = MockPresenter::new();
  let old = MessageRef::new(MessageId(500), CH);
  let question_id = store
    .create_question(NewQuestion {
      message:  old,
      content:  content(),
      eligible: vec![ParticipantId(1), ParticipantId(2), ParticipantId(3)],
    })
    .await
    .unwrap();
  store
    .resolve_answer(ParticipantId(2), question_id, true)
    .await
    .unwrap();

  let coordinator =
    RecoveryCoordinator::new(Arc::clone(&store), Arc::clone(&presenter));
  coordinator.recover_all(None).await.unwrap();

  let (_, _, eligible) = presenter.renders()[0].clone();
  assert_eq!(eligible, vec![ParticipantId(1), ParticipantId(3)]);
}

#[tokio::test]
async fn recovery_is_idempotent() {
  let store = seeded_store(&[1, 2]).await;
  let presenter = MockPresenter::new();
  let old = MessageRef::new(MessageId(500), CH);
  let question_id = store
    .create_question(NewQuestion {
      message:  old,
      content:  content(),
      eligible: vec![ParticipantId(1), ParticipantId(2)],
    })
    .await
    .unwrap();
  store
    .resolve_answer(ParticipantId(1), question_id, true)
    .await
    .unwrap();

  let coordinator =
    RecoveryCoordinator::new(Arc::clone(&store), Arc::clone(&presenter));
  coordinator.recover_all(None).await.unwrap();
  let report = coordinator.recover_all(None).await.unwrap();
  assert_eq!((report.restored, report.dropped), (1, 0));

  // One live row, answer state intact, old renderings deleted.
  let open = store.open_questions(None).await.unwrap();
  assert_eq!(open.len(), 1);
  assert_eq!(open[0].unanswered(), vec![ParticipantId(2)]);
  assert_eq!(presenter.deletes().len(), 2);
}

// ─── Token lifecycle ─────────────────────────────────────────────────────────

#[test]
fn refresh_policy_decides_by_age_and_count() {
  let policy = RefreshPolicy::default();
  assert_eq!(policy.decide(Duration::hours(4), 0), RefreshAction::Keep);
  assert_eq!(
    policy.decide(Duration::hours(5) + Duration::minutes(30), 3),
    RefreshAction::Refresh,
  );
  assert_eq!(
    policy.decide(Duration::hours(5) + Duration::minutes(30), 11),
    RefreshAction::Delete,
  );
  assert_eq!(policy.decide(Duration::hours(7), 0), RefreshAction::ForceRenew);
  assert_eq!(policy.decide(Duration::hours(7), 11), RefreshAction::ForceRenew);
}

#[tokio::test]
async fn acquire_issues_then_reuses_and_resets_count() {
  let store = seeded_store(&[]).await;
  let provider = ScriptedProvider::new(&["tok-1"], vec![]);
  let tokens = manager(&store, &provider);

  assert_eq!(tokens.acquire(CH).await.unwrap(), "tok-1");
  store.set_refresh_count(CH, 7).await.unwrap();

  // Second acquire serves the stored token and resets the abandonment clock.
  assert_eq!(tokens.acquire(CH).await.unwrap(), "tok-1");
  assert_eq!(stored_token(&store).await.unwrap().refresh_count, 0);
}

#[tokio::test]
async fn force_renew_discards_the_stored_token() {
  let store = seeded_store(&[]).await;
  let provider = ScriptedProvider::new(&["tok-1", "tok-2"], vec![]);
  let tokens = manager(&store, &provider);

  tokens.acquire(CH).await.unwrap();
  assert_eq!(tokens.force_renew(CH).await.unwrap(), "tok-2");
  assert_eq!(stored_token(&store).await.unwrap().token, "tok-2");
}

#[tokio::test(start_paused = true)]
async fn refresh_retries_through_rate_limiting() {
  let store = seeded_store(&[]).await;
  let provider = ScriptedProvider::new(
    &[],
    vec![
      reply(ResponseCode::RateLimited),
      reply(ResponseCode::RateLimited),
      reply(ResponseCode::Success),
    ],
  );
  let tokens = manager(&store, &provider);

  store
    .put_token(ProviderToken {
      channel_id:     CH,
      token:          "tok-old".into(),
      last_refreshed: Utc::now() - Duration::hours(5) - Duration::minutes(30),
      refresh_count:  3,
    })
    .await
    .unwrap();

  let started = tokio::time::Instant::now();
  tokens.refresh_all().await.unwrap();

  // Two back-offs of five seconds each before the served fetch.
  assert!(started.elapsed() >= std::time::Duration::from_secs(10));
  assert_eq!(provider.fetches(), 3);
  let token = stored_token(&store).await.unwrap();
  assert_eq!(token.token, "tok-old");
  assert_eq!(token.refresh_count, 4);
}

#[tokio::test(start_paused = true)]
async fn refresh_renews_when_rate_limiting_persists() {
  let store = seeded_store(&[]).await;
  let provider = ScriptedProvider::new(
    &["tok-new"],
    vec![
      reply(ResponseCode::RateLimited),
      reply(ResponseCode::RateLimited),
      reply(ResponseCode::RateLimited),
    ],
  );
  let tokens = manager(&store, &provider);

  store
    .put_token(ProviderToken {
      channel_id:     CH,
      token:          "tok-old".into(),
      last_refreshed: Utc::now() - Duration::hours(5) - Duration::minutes(30),
      refresh_count:  0,
    })
    .await
    .unwrap();

  tokens.refresh_all().await.unwrap();
  let token = stored_token(&store).await.unwrap();
  assert_eq!(token.token, "tok-new");
  assert_eq!(token.refresh_count, 0);
}

#[tokio::test]
async fn refresh_renews_rejected_tokens() {
  let store = seeded_store(&[]).await;
  let provider =
    ScriptedProvider::new(&["tok-new"], vec![reply(ResponseCode::TokenNotFound)]);
  let tokens = manager(&store, &provider);

  store
    .put_token(ProviderToken {
      channel_id:     CH,
      token:          "tok-dead".into(),
      last_refreshed: Utc::now() - Duration::hours(5) - Duration::minutes(30),
      refresh_count:  0,
    })
    .await
    .unwrap();

  tokens.refresh_all().await.unwrap();
  assert_eq!(stored_token(&store).await.unwrap().token, "tok-new");
}

#[tokio::test]
async fn refresh_deletes_abandoned_tokens() {
  let store = seeded_store(&[]).await;
  let provider = ScriptedProvider::new(&[], vec![]);
  let tokens = manager(&store, &provider);

  store
    .put_token(ProviderToken {
      channel_id:     CH,
      token:          "tok-idle".into(),
      last_refreshed: Utc::now() - Duration::hours(5) - Duration::minutes(30),
      refresh_count:  10,
    })
    .await
    .unwrap();

  tokens.refresh_all().await.unwrap();
  assert!(stored_token(&store).await.is_none());
  assert_eq!(provider.fetches(), 0);
}

#[tokio::test]
async fn refresh_force_renews_past_the_hard_age() {
  let store = seeded_store(&[]).await;
  let provider = ScriptedProvider::new(&["tok-new"], vec![]);
  let tokens = manager(&store, &provider);

  store
    .put_token(ProviderToken {
      channel_id:     CH,
      token:          "tok-expired".into(),
      last_refreshed: Utc::now() - Duration::hours(7),
      refresh_count:  0,
    })
    .await
    .unwrap();

  tokens.refresh_all().await.unwrap();
  let token = stored_token(&store).await.unwrap();
  assert_eq!(token.token, "tok-new");
  assert_eq!(token.refresh_count, 0);
  assert_eq!(provider.fetches(), 0);
}

#[tokio::test]
async fn fresh_tokens_are_left_alone() {
  let store = seeded_store(&[]).await;
  let provider = ScriptedProvider::new(&[], vec![]);
  let tokens = manager(&store, &provider);

  store
    .put_token(ProviderToken {
      channel_id:     CH,
      token:          "tok-fresh".into(),
      last_refreshed: Utc::now(),
      refresh_count:  0,
    })
    .await
    .unwrap();

  tokens.refresh_all().await.unwrap();
  assert_eq!(stored_token(&store).await.unwrap().token, "tok-fresh");
  assert_eq!(provider.fetches(), 0);
}

// ─── Question fetching ───────────────────────────────────────────────────────

fn source(
  store: &Arc<SqliteStore>,
  provider: &Arc<ScriptedProvider>,
) -> QuestionSource<SqliteStore, ScriptedProvider> {
  QuestionSource::new(
    manager(store, provider),
    Arc::clone(provider),
    2,
    std::time::Duration::from_secs(5),
  )
}

#[tokio::test]
async fn fetch_returns_content_and_resets_the_count() {
  let store = seeded_store(&[]).await;
  let provider = ScriptedProvider::new(&["tok-1"], vec![reply(ResponseCode::Success)]);

  let got = source(&store, &provider)
    .next_question(CH, FetchParams::default())
    .await
    .unwrap();
  assert_eq!(got, content());
  assert_eq!(stored_token(&store).await.unwrap().refresh_count, 0);
}

#[tokio::test]
async fn fetch_renews_token_on_rejection() {
  let store = seeded_store(&[]).await;
  let provider = ScriptedProvider::new(
    &["tok-1", "tok-2"],
    vec![reply(ResponseCode::TokenNotFound), reply(ResponseCode::Success)],
  );

  source(&store, &provider)
    .next_question(CH, FetchParams::default())
    .await
    .unwrap();
  assert_eq!(stored_token(&store).await.unwrap().token, "tok-2");
}

#[tokio::test]
async fn fetch_reports_pool_exhaustion() {
  let store = seeded_store(&[]).await;
  let provider =
    ScriptedProvider::new(&["tok-1"], vec![reply(ResponseCode::PoolExhausted)]);

  let err = source(&store, &provider)
    .next_question(CH, FetchParams::category(9))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::PoolExhausted));
}

#[tokio::test]
async fn fetch_reports_empty_pools() {
  let store = seeded_store(&[]).await;
  let provider =
    ScriptedProvider::new(&["tok-1"], vec![reply(ResponseCode::NoResults)]);

  let err = source(&store, &provider)
    .next_question(CH, FetchParams::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NoResults));
}

#[tokio::test(start_paused = true)]
async fn fetch_backs_off_under_rate_limiting() {
  let store = seeded_store(&[]).await;
  let provider = ScriptedProvider::new(
    &["tok-1"],
    vec![
      reply(ResponseCode::RateLimited),
      reply(ResponseCode::RateLimited),
      reply(ResponseCode::Success),
    ],
  );

  let started = tokio::time::Instant::now();
  source(&store, &provider)
    .next_question(CH, FetchParams::default())
    .await
    .unwrap();
  assert!(started.elapsed() >= std::time::Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn fetch_gives_up_when_rate_limiting_persists() {
  let store = seeded_store(&[]).await;
  let provider = ScriptedProvider::new(
    &["tok-1"],
    vec![
      reply(ResponseCode::RateLimited),
      reply(ResponseCode::RateLimited),
      reply(ResponseCode::RateLimited),
    ],
  );

  let err = source(&store, &provider)
    .next_question(CH, FetchParams::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::RetriesExhausted));
}

// ─── Membership sync ─────────────────────────────────────────────────────────

#[tokio::test]
async fn join_and_leave_maintain_scorecards() {
  let store = seeded_store(&[]).await;
  let presenter = MockPresenter::new();
  let sync = MembershipSync::new(Arc::clone(&store), Arc::clone(&presenter));

  sync
    .participant_joined(
      Participant { participant_id: ParticipantId(1), username: "ada".into() },
      &[CH],
    )
    .await
    .unwrap();
  assert_eq!(store.get_score(ParticipantId(1), CH).await.unwrap(), Some(0));

  let question_id = store
    .create_question(NewQuestion {
      message:  MessageRef::new(MessageId(500), CH),
      content:  content(),
      eligible: vec![ParticipantId(1)],
    })
    .await
    .unwrap();
  store
    .resolve_answer(ParticipantId(1), question_id, true)
    .await
    .unwrap();

  // Redelivered join keeps the accumulated score.
  sync
    .participant_joined(
      Participant { participant_id: ParticipantId(1), username: "ada".into() },
      &[CH],
    )
    .await
    .unwrap();
  assert_eq!(store.get_score(ParticipantId(1), CH).await.unwrap(), Some(1));

  sync.participant_left(ParticipantId(1)).await.unwrap();
  assert_eq!(store.get_score(ParticipantId(1), CH).await.unwrap(), None);
}

#[tokio::test]
async fn permission_changes_toggle_enrollment() {
  let store = seeded_store(&[1]).await;
  let presenter = MockPresenter::new();
  let sync = MembershipSync::new(Arc::clone(&store), Arc::clone(&presenter));

  sync.permission_changed(CH, ParticipantId(1), false).await.unwrap();
  assert_eq!(store.get_score(ParticipantId(1), CH).await.unwrap(), None);

  sync.permission_changed(CH, ParticipantId(1), true).await.unwrap();
  assert_eq!(store.get_score(ParticipantId(1), CH).await.unwrap(), Some(0));
}

#[tokio::test]
async fn reconcile_follows_platform_permissions() {
  let store = seeded_store(&[1]).await;
  let presenter = MockPresenter::new();
  let sync = MembershipSync::new(Arc::clone(&store), Arc::clone(&presenter));

  presenter.deny(CH, ParticipantId(1));
  sync.reconcile_member(CH, ParticipantId(1)).await.unwrap();
  assert_eq!(store.get_score(ParticipantId(1), CH).await.unwrap(), None);
}

#[tokio::test]
async fn channel_removal_prunes_orphans() {
  let store = seeded_store(&[1]).await;
  let presenter = MockPresenter::new();
  let sync = MembershipSync::new(Arc::clone(&store), Arc::clone(&presenter));

  sync.channel_deleted(CH).await.unwrap();
  assert!(store.channel_scores(CH).await.unwrap().is_empty());
  // The participant had no other enrollment and was pruned with the channel,
  // so a second pass finds nothing left to remove.
  assert_eq!(store.prune_orphans().await.unwrap(), 0);
}

#[tokio::test]
async fn deleted_message_drops_its_question() {
  let store = seeded_store(&[1]).await;
  let presenter = MockPresenter::new();
  let sync = MembershipSync::new(Arc::clone(&store), Arc::clone(&presenter));

  let message = MessageRef::new(MessageId(500), CH);
  store
    .create_question(NewQuestion {
      message,
      content: content(),
      eligible: vec![ParticipantId(1)],
    })
    .await
    .unwrap();

  sync.message_deleted(message).await.unwrap();
  assert!(store.open_question(message).await.unwrap().is_none());
}

// ─── Maintenance loop ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn maintenance_shutdown_stops_the_loop() {
  let store = seeded_store(&[]).await;
  let presenter = MockPresenter::new();
  let provider = ScriptedProvider::new(&[], vec![]);
  let engine = Arc::new(engine(&store, &presenter));

  let handle = crate::maintenance::spawn(
    Arc::clone(&engine),
    manager(&store, &provider),
    &EngineConfig::default(),
  );
  // Hangs here if the loop ignores the signal.
  handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_the_loop() {
  let store = seeded_store(&[]).await;
  let presenter = MockPresenter::new();
  let provider = ScriptedProvider::new(
    &[],
    vec![
      reply(ResponseCode::Success),
      reply(ResponseCode::Success),
      reply(ResponseCode::Success),
    ],
  );
  store
    .put_token(ProviderToken {
      channel_id:     CH,
      token:          "tok-old".into(),
      last_refreshed: Utc::now() - Duration::hours(5) - Duration::minutes(30),
      refresh_count:  0,
    })
    .await
    .unwrap();

  let engine = Arc::new(engine(&store, &presenter));
  let handle = crate::maintenance::spawn(
    Arc::clone(&engine),
    manager(&store, &provider),
    &EngineConfig::default(),
  );

  // The first tick fires immediately and refreshes the stale token.
  while provider.fetches() < 1 {
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
  }

  // With the handle gone the loop exits; later ticks never happen.
  drop(handle);
  tokio::time::sleep(std::time::Duration::from_secs(2 * 3600)).await;
  assert_eq!(provider.fetches(), 1);
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[test]
fn config_defaults_from_an_empty_table() {
  let config = EngineConfig::from_toml("").unwrap();
  assert_eq!(config.provider_base_url, crate::http::DEFAULT_BASE_URL);
  assert_eq!(config.stale_after_hours, 24);
  assert_eq!(config.retry_limit, 2);
  assert_eq!(config.refresh_policy().abandon_after, 10);
}

#[test]
fn config_overrides_and_rejects_unknown_keys() {
  let config = EngineConfig::from_toml(
    "stale_after_hours = 48\nretry_delay_secs = 1\n",
  )
  .unwrap();
  assert_eq!(config.stale_after_hours, 48);
  assert_eq!(config.retry_delay(), std::time::Duration::from_secs(1));

  assert!(EngineConfig::from_toml("stale_hours = 48\n").is_err());
}

//! `showdown` — operator CLI for a Showdown trivia store.
//!
//! Inspects and maintains the SQLite database used by a running engine:
//! scores, open questions, provider tokens, and the offline variants of the
//! maintenance tasks. `fetch` talks to the live content provider and is
//! handy for smoke-testing a category before enabling it.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use showdown_core::{
  ids::ChannelId,
  provider::FetchParams,
  store::TriviaStore,
};
use showdown_engine::{EngineConfig, HttpProvider, QuestionSource, TokenManager};
use showdown_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Showdown trivia store maintenance CLI")]
struct Cli {
  /// Path to the SQLite database file.
  #[arg(short, long, default_value = "showdown.db")]
  db: PathBuf,

  /// Path to a TOML engine configuration file.
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Print the scoreboard for a channel, highest score first.
  Scores {
    #[arg(long)]
    channel: i64,
  },

  /// List open questions, optionally scoped to one channel.
  Questions {
    #[arg(long)]
    channel: Option<i64>,
  },

  /// Delete open questions older than the cutoff from the store.
  ///
  /// Store-only: renderings left on the platform are cleaned up by the
  /// engine's recovery pass at its next startup.
  Sweep {
    #[arg(long, default_value_t = 24)]
    max_age_hours: i64,
  },

  /// Delete participants with no remaining channel enrollments.
  Prune,

  /// List stored provider tokens with age and refresh count.
  Tokens,

  /// Delete one channel's provider token; the engine will issue a fresh one
  /// on the next fetch.
  DeleteToken {
    #[arg(long)]
    channel: i64,
  },

  /// Fetch one question from the content provider and print it.
  Fetch {
    #[arg(long)]
    channel: i64,

    /// Provider category id; omit for a random category.
    #[arg(long)]
    category: Option<u32>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let config = match &cli.config {
    Some(path) => {
      let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
      EngineConfig::from_toml(&raw).context("parsing config file")?
    }
    None => EngineConfig::default(),
  };

  let store = SqliteStore::open(&cli.db)
    .await
    .with_context(|| format!("opening store at {}", cli.db.display()))?;

  match cli.command {
    Command::Scores { channel } => {
      let scores = store.channel_scores(ChannelId(channel)).await?;
      if scores.is_empty() {
        println!("no scorecards for channel {channel}");
        return Ok(());
      }
      for card in scores {
        println!("{:>20}  {:>6}", card.participant_id.0, card.score);
      }
    }

    Command::Questions { channel } => {
      let open = store.open_questions(channel.map(ChannelId)).await?;
      let now = Utc::now();
      for question in &open {
        println!(
          "channel {:>20}  message {:>20}  age {:>5}m  unanswered {}  {}",
          question.message.channel_id.0,
          question.message.message_id.0,
          question.age(now).num_minutes(),
          question.unanswered().len(),
          question.content.text,
        );
      }
      println!("{} open question(s)", open.len());
    }

    Command::Sweep { max_age_hours } => {
      let cutoff = Duration::hours(max_age_hours);
      let now = Utc::now();
      let open = store.open_questions(None).await?;
      let mut closed = 0u64;
      for question in open {
        if question.age(now) > cutoff {
          if store.close_question(question.message).await? {
            closed += 1;
          }
        }
      }
      println!("closed {closed} stale question(s)");
    }

    Command::Prune => {
      let removed = store.prune_orphans().await?;
      println!("pruned {removed} orphaned participant(s)");
    }

    Command::Tokens => {
      let tokens = store.list_tokens().await?;
      let now = Utc::now();
      for token in &tokens {
        println!(
          "channel {:>20}  age {:>5}m  refreshes {:>3}",
          token.channel_id.0,
          token.age(now).num_minutes(),
          token.refresh_count,
        );
      }
      println!("{} token(s)", tokens.len());
    }

    Command::DeleteToken { channel } => {
      let existed = store.delete_token(ChannelId(channel)).await?;
      println!(
        "{}",
        if existed { "token deleted" } else { "no token stored" }
      );
    }

    Command::Fetch { channel, category } => {
      let store = Arc::new(store);
      let provider = Arc::new(
        HttpProvider::new(config.provider_base_url.clone())
          .context("building provider client")?,
      );
      let tokens = TokenManager::new(
        Arc::clone(&store),
        Arc::clone(&provider),
        config.refresh_policy(),
      );
      let source = QuestionSource::new(
        tokens,
        provider,
        config.retry_limit,
        config.retry_delay(),
      );

      let params = match category {
        Some(id) => FetchParams::category(id),
        None => FetchParams::default(),
      };
      let content = source
        .next_question(ChannelId(channel), params)
        .await
        .context("fetching question")?;

      println!("[{} / {}]", content.category, content.difficulty.as_str());
      println!("{}", content.text);
      for option in content.options() {
        let marker = if option == content.correct_answer { "*" } else { " " };
        println!("  {marker} {option}");
      }
    }
  }

  Ok(())
}

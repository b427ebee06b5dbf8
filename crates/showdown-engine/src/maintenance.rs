//! The background maintenance loop: token refresh, then the stale-question
//! sweep, on a fixed cadence.
//!
//! Each iteration is self-contained — no loop state survives it — so a
//! crash or shutdown mid-iteration only costs re-running that iteration.

use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

use showdown_core::{
  presenter::Presenter, provider::ContentProvider, store::TriviaStore,
};

use crate::{engine::Engine, tokens::TokenManager, EngineConfig};

/// Handle to the spawned maintenance task. Dropping it without calling
/// [`shutdown`](Self::shutdown) also stops the loop (the watch sender goes
/// with it); `shutdown` additionally waits for the current iteration to
/// finish.
pub struct MaintenanceHandle {
  shutdown: watch::Sender<bool>,
  task:     JoinHandle<()>,
}

impl MaintenanceHandle {
  /// Signal the loop to stop and wait for the current iteration to finish.
  pub async fn shutdown(self) {
    let _ = self.shutdown.send(true);
    let _ = self.task.await;
  }
}

/// Spawn the maintenance loop. The first iteration runs immediately.
pub fn spawn<S, P, C>(
  engine: Arc<Engine<S, P>>,
  tokens: TokenManager<S, C>,
  config: &EngineConfig,
) -> MaintenanceHandle
where
  S: TriviaStore + 'static,
  P: Presenter + 'static,
  C: ContentProvider + 'static,
{
  let (tx, mut rx) = watch::channel(false);
  let stale_after = config.stale_after();
  let interval = config.maintenance_interval();

  let task = tokio::spawn(async move {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        // An explicit shutdown signal and a dropped handle both land here.
        _ = rx.changed() => break,
        _ = ticker.tick() => {
          if let Err(err) = tokens.refresh_all().await {
            tracing::warn!(error = %err, "token refresh pass failed");
          }
          match engine.sweep_stale(stale_after).await {
            Ok(closed) if closed > 0 => {
              tracing::info!(closed, "stale sweep closed questions");
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "stale sweep failed"),
          }
        }
      }
    }
    tracing::info!("maintenance loop stopped");
  });

  MaintenanceHandle { shutdown: tx, task }
}

//! Periodic background drain.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::cache::DurableStore;
use crate::remote::Gateway;

use super::coordinator::SyncCoordinator;

/// Drain `coordinator` every `period`, starting immediately.
///
/// Abort the returned handle to stop. Ticks that would overlap a slow drain
/// are skipped rather than bunched up.
pub fn spawn_periodic_drain<G, S>(
  coordinator: Arc<SyncCoordinator<G, S>>,
  period: Duration,
) -> JoinHandle<()>
where
  G: Gateway + 'static,
  S: DurableStore + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
      ticker.tick().await;
      if let Err(e) = coordinator.drain().await {
        warn!(error = %e, "background drain failed");
      }
    }
  })
}

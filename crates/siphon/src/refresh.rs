//! Periodic snapshot refresh.
//!
//! Reads happen outside the engine lock. A finished read is installed only
//! if no apply is running and no toggle happened while it was in flight;
//! otherwise it is dropped and the next tick tries again.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::ApplyReport;
use crate::engine::{Discarded, Engine};
use crate::intent::PruneReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    Installed(PruneReport),
    Discarded(Discarded),
    ReadFailed(String),
}

/// One refresh tick.
pub async fn refresh_once(engine: &Engine) -> RefreshEvent {
    let epoch = engine.epoch();
    let snapshot = match engine.graph().read().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, "refresh read failed, keeping last snapshot");
            return RefreshEvent::ReadFailed(e.to_string());
        }
    };

    match engine.try_install(snapshot, epoch) {
        Ok(pruned) => {
            if !pruned.is_empty() {
                info!(pruned = pruned.len(), "refresh pruned vanished selections");
            }
            RefreshEvent::Installed(pruned)
        }
        Err(reason) => {
            debug!(?reason, "refresh result discarded");
            RefreshEvent::Discarded(reason)
        }
    }
}

/// Refresh every `interval` until `cancel` fires. Events go to `events`
/// when given; a closed receiver stops the task.
pub fn spawn_refresh_task(
    engine: Engine,
    interval: Duration,
    cancel: CancellationToken,
    events: Option<mpsc::Sender<RefreshEvent>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("refresh task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let event = refresh_once(&engine).await;
                    if let Some(tx) = &events {
                        if tx.send(event).await.is_err() {
                            debug!("refresh listener gone");
                            break;
                        }
                    }
                }
            }
        }
    })
}

/// Keep the graph converged until `shutdown` resolves: refresh every
/// `interval` and re-apply whenever an installed snapshot leaves work to do.
/// `shutdown` is polled across re-applies, so a stop requested mid-apply
/// ends the loop right after that apply.
pub async fn watch_until<F>(
    engine: &Engine,
    interval: Duration,
    shutdown: F,
    mut on_apply: impl FnMut(&ApplyReport),
) -> Result<(), tokio::task::JoinError>
where
    F: Future<Output = ()>,
{
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(8);
    let task = spawn_refresh_task(engine.clone(), interval, cancel.clone(), Some(tx));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = rx.recv() => {
                let Some(event) = event else { break };
                if !matches!(event, RefreshEvent::Installed(_)) {
                    continue;
                }
                if engine.plan().await.is_empty() {
                    continue;
                }
                match engine.apply().await {
                    Ok(report) => on_apply(&report),
                    Err(e) => warn!(error = %e, "re-apply skipped"),
                }
            }
        }
    }

    cancel.cancel();
    task.await
}

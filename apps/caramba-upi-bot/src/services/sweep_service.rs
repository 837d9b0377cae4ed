use caramba_pay::{LifecycleManager, ReconciliationReceiver};
use chrono::Utc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Periodically expires overdue invoices until shutdown is signalled.
pub fn start_sweep_loop(
    manager: LifecycleManager,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let expired = manager.sweep_expired(Utc::now()).await;
                    debug!(
                        "Expiry sweep done: {} expired, {} still open",
                        expired,
                        manager.store().active_count()
                    );
                }
                _ = shutdown.recv() => {
                    info!("Expiry sweep stopping");
                    break;
                }
            }
        }
    })
}

/// Polls the gateway for invoices restored at startup in a background task.
pub fn start_reconciliation(receiver: ReconciliationReceiver) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let settled = receiver.reconcile_open().await;
        info!("Startup reconciliation finished: {} settled", settled);
        settled
    })
}

//! Background eviction sweep.
//!
//! Every node runs its own sweep on a fixed interval. No cross-node
//! coordination is needed: removal in the store is atomic and idempotent, so
//! overlapping sweeps and concurrent validators cannot double-free an entry.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::TicketRegistry;

pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

/// Run the eviction loop until the cancellation token fires.
///
/// The task completes its current pass before exiting on shutdown.
pub async fn run_eviction_sweep(
    registry: Arc<TicketRegistry>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match registry.evict_expired(SystemTime::now()).await {
                    Ok(0) => debug!("eviction sweep found nothing to do"),
                    Ok(evicted) => info!(evicted, "eviction sweep removed expired tickets"),
                    Err(err) => warn!(error = %err, "eviction sweep failed"),
                }
            }
            () = cancel_token.cancelled() => {
                info!("eviction sweep received shutdown signal, exiting");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authn::principal::Principal;
    use crate::ticket::{InMemoryTicketStore, TicketKind, TicketPolicy, TicketStore};
    use std::collections::HashMap;

    #[tokio::test]
    async fn sweep_evicts_and_shuts_down() {
        let store = Arc::new(InMemoryTicketStore::new());
        let registry = Arc::new(TicketRegistry::new(
            Arc::clone(&store) as Arc<dyn crate::ticket::TicketStore>,
            TicketPolicy::new().with_granting_lifetime(Duration::from_millis(1)),
            Vec::new(),
        ));
        let ticket = registry
            .issue_granting_ticket(Principal::new("alice".to_string(), HashMap::new()))
            .await
            .expect("issue");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_eviction_sweep(
            Arc::clone(&registry),
            Duration::from_millis(5),
            cancel.clone(),
        ));

        // Give the sweep a few ticks to notice the expired entry.
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if store.get(&ticket.id).await.expect("get").is_none() {
                break;
            }
        }
        assert!(store.get(&ticket.id).await.expect("get").is_none());
        assert!(matches!(
            registry.get_ticket(&ticket.id, TicketKind::Granting).await,
            Err(crate::ticket::TicketError::NotFound)
        ));

        cancel.cancel();
        task.await.expect("sweep task exits cleanly");
    }
}

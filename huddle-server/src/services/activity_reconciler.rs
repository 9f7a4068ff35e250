//! Background repair of conversation last-activity markers.
//!
//! The send path bumps the marker on a best-effort basis. This sweep makes the marker converge on
//! the newest stored message when a bump was lost.

use std::{sync::Arc, time::Duration};

use metrics::counter;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::ConversationRegistry;

/// Runs one reconciliation pass. Errors are logged; the count of repaired markers is returned.
pub async fn run_once(registry: &dyn ConversationRegistry) -> u64 {
    match registry.reconcile_activity().await {
        Ok(0) => {
            debug!("last-activity markers already current");
            0
        }
        Ok(repaired) => {
            counter!("huddle_activity_repairs_total").increment(repaired);
            info!(repaired, "reconciled last-activity markers");
            repaired
        }
        Err(err) => {
            warn!(error = %err, "last-activity reconciliation failed");
            0
        }
    }
}

/// Spawns the periodic sweep. Returns `None` when `interval` is zero.
pub fn spawn(
    registry: Arc<dyn ConversationRegistry>,
    interval: Duration,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        info!("last-activity reconciliation disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so startup is not a sweep.
        ticker.tick().await;
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    debug!("last-activity reconciler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    run_once(registry.as_ref()).await;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, MessageStore, NewMessage};
    use shared::models::MessageKind;
    use uuid::Uuid;

    async fn lagging_store() -> (Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let alice = Uuid::new_v4();
        let conversation = store
            .find_or_create_personal(alice, Uuid::new_v4())
            .await
            .unwrap();
        store
            .insert(NewMessage {
                id: Uuid::new_v4(),
                conversation_id: conversation.id,
                sender_id: alice,
                kind: MessageKind::Text,
                content: "hi".into(),
            })
            .await
            .unwrap();
        store
            .set_last_activity(
                conversation.id,
                shared::models::Timestamp(conversation.created_at.0 - chrono::Duration::minutes(5)),
            )
            .await;
        (store, conversation.id)
    }

    #[tokio::test]
    async fn run_once_repairs_lagging_markers() {
        let (store, _) = lagging_store().await;
        assert_eq!(run_once(store.as_ref()).await, 1);
        assert_eq!(run_once(store.as_ref()).await, 0);
    }

    #[tokio::test]
    async fn zero_interval_disables_the_sweep() {
        let store = Arc::new(MemoryStore::new());
        assert!(spawn(store, Duration::ZERO, CancellationToken::new()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_sweep_repairs_and_stops_on_cancel() {
        let (store, conversation_id) = lagging_store().await;
        let shutdown = CancellationToken::new();
        let handle = spawn(store.clone(), Duration::from_secs(60), shutdown.clone()).unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        // Let the spawned task observe the tick.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let conversation = store.find(conversation_id).await.unwrap().unwrap();
        let latest = store.page_desc(conversation_id, None, 1).await.unwrap();
        assert_eq!(conversation.last_activity_at, latest[0].created_at);

        shutdown.cancel();
        handle.await.unwrap();
    }
}

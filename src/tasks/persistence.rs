//! Background writer for backend persistence

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::{
    services::{GatewayError, PersistenceGateway, SnapshotStore},
    state::{Effect, Timer},
};

/// Queued writes beyond which the writer reports that the backend is
/// falling behind.
pub const BACKLOG_WARNING: usize = 64;

/// Drain queued writes into the backend one at a time.
///
/// Failures never reach the caller that queued the write: they are logged
/// and the current timer list is saved to the local snapshot instead.
///
/// The queue is unbounded because writes are queued under the board lock and
/// must never wait. A backlog of [`BACKLOG_WARNING`] writes or more is logged
/// once each time it builds up.
pub async fn persistence_task(
    gateway: Arc<dyn PersistenceGateway>,
    snapshot: SnapshotStore,
    mut writes_rx: mpsc::UnboundedReceiver<Effect>,
    timers_rx: watch::Receiver<Vec<Timer>>,
) {
    info!("Starting persistence writer");
    let mut behind = false;

    while let Some(effect) = writes_rx.recv().await {
        let pending = writes_rx.len();
        if pending >= BACKLOG_WARNING && !behind {
            warn!(pending, "Persistence writer is falling behind the backend");
            behind = true;
        } else if pending == 0 && behind {
            info!("Persistence writer caught up");
            behind = false;
        }

        let Some((op, id, result)) = write(gateway.as_ref(), effect).await else {
            continue;
        };

        match result {
            Ok(()) => debug!(timer_id = %id, op, "write persisted"),
            Err(e) => {
                warn!(timer_id = %id, op, "Failed to persist timer: {}", e);
                let timers = timers_rx.borrow().clone();
                if let Err(e) = snapshot.save(&timers).await {
                    warn!("Failed to save local snapshot: {}", e);
                }
            }
        }
    }

    info!("Persistence writer stopped");
}

async fn write(
    gateway: &dyn PersistenceGateway,
    effect: Effect,
) -> Option<(&'static str, String, Result<(), GatewayError>)> {
    let outcome = match effect {
        Effect::Insert(timer) => {
            let id = timer.id.clone();
            ("insert", id, gateway.insert(timer).await)
        }
        Effect::Upsert(timer) => {
            let id = timer.id.clone();
            ("upsert", id, gateway.upsert(timer).await)
        }
        Effect::Patch { id, patch } => {
            let result = gateway.patch(&id, patch).await;
            ("patch", id, result)
        }
        Effect::Delete(id) => {
            let result = gateway.delete(&id).await;
            ("delete", id, result)
        }
        Effect::StartTicker { .. } => return None,
    };
    Some(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{services::MemoryGateway, state::TimerPatch};

    #[tokio::test]
    async fn writes_reach_the_backend_in_order() {
        let gateway = Arc::new(MemoryGateway::new("timers"));
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let (_timers_tx, timers_rx) = watch::channel(Vec::new());

        let timer = Timer::new("Tea", 30).unwrap();
        tx.send(Effect::Insert(timer.clone())).unwrap();
        tx.send(Effect::Patch {
            id: timer.id.clone(),
            patch: TimerPatch::remaining(12),
        })
        .unwrap();
        drop(tx);

        persistence_task(
            gateway.clone(),
            SnapshotStore::new(dir.path().join("snap.json")),
            rx,
            timers_rx,
        )
        .await;

        assert_eq!(gateway.row(&timer.id).map(|t| t.remaining_seconds), Some(12));
    }

    #[tokio::test]
    async fn large_backlog_drains_in_queue_order() {
        let gateway = Arc::new(MemoryGateway::new("timers"));
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let (_timers_tx, timers_rx) = watch::channel(Vec::new());

        let timer = Timer::new("Bread", 1_000).unwrap();
        tx.send(Effect::Insert(timer.clone())).unwrap();
        for remaining in (1..=BACKLOG_WARNING as u32 * 3).rev() {
            tx.send(Effect::Patch {
                id: timer.id.clone(),
                patch: TimerPatch::remaining(remaining),
            })
            .unwrap();
        }
        drop(tx);

        let mut feed = gateway.subscribe("timers").await.unwrap();
        persistence_task(
            gateway.clone(),
            SnapshotStore::new(dir.path().join("snap.json")),
            rx,
            timers_rx,
        )
        .await;

        assert_eq!(gateway.row(&timer.id).map(|t| t.remaining_seconds), Some(1));
        assert!(feed.next().await.is_some_and(|e| e.after.is_some()));
        let mut last = u32::MAX;
        for _ in 0..BACKLOG_WARNING * 3 {
            let remaining = feed.next().await.unwrap().after.unwrap().remaining_seconds;
            assert!(remaining < last);
            last = remaining;
        }
    }

    #[tokio::test]
    async fn failed_write_saves_the_snapshot() {
        let gateway = Arc::new(MemoryGateway::new("timers"));
        gateway.set_online(false);
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotStore::new(dir.path().join("snap.json"));
        let timer = Timer::new("Tea", 30).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let (_timers_tx, timers_rx) = watch::channel(vec![timer.clone()]);

        tx.send(Effect::Upsert(timer.clone())).unwrap();
        drop(tx);
        persistence_task(gateway.clone(), snapshot.clone(), rx, timers_rx).await;

        assert_eq!(gateway.row_count(), 0);
        assert_eq!(snapshot.load().await.unwrap(), vec![timer]);
    }
}

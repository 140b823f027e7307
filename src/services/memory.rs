//! In-process backend with a broadcast change feed

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, PoisonError,
    },
};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use super::gateway::{ChangeEvent, ChangeFeed, GatewayError, PersistenceGateway};
use crate::state::{Timer, TimerPatch};

/// A single-table backend held in memory.
///
/// Every write that changes a row is announced on the change feed, so
/// several sessions sharing one `MemoryGateway` behave like browsers
/// sharing one hosted database. It can be taken offline to exercise the
/// failure paths.
#[derive(Debug)]
pub struct MemoryGateway {
    table: String,
    rows: Mutex<HashMap<String, Timer>>,
    feed_tx: broadcast::Sender<ChangeEvent>,
    online: AtomicBool,
}

impl MemoryGateway {
    pub fn new(table: impl Into<String>) -> Self {
        let (feed_tx, _) = broadcast::channel(256);
        Self {
            table: table.into(),
            rows: Mutex::new(HashMap::new()),
            feed_tx,
            online: AtomicBool::new(true),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        debug!(table = %self.table, online, "memory backend availability changed");
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Current row for `id`, bypassing availability.
    pub fn row(&self, id: &str) -> Option<Timer> {
        self.rows().get(id).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.rows().len()
    }

    /// Number of change feeds currently attached.
    pub fn subscriber_count(&self) -> usize {
        self.feed_tx.receiver_count()
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, HashMap<String, Timer>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_online(&self) -> Result<(), GatewayError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(GatewayError::Unavailable(format!(
                "table {} is offline",
                self.table
            )))
        }
    }

    fn publish(&self, event: ChangeEvent) {
        // No subscribers is fine; the row is still stored.
        let _ = self.feed_tx.send(event);
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn list_all(&self) -> Result<Vec<Timer>, GatewayError> {
        self.ensure_online()?;
        let mut timers: Vec<Timer> = self.rows().values().cloned().collect();
        timers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(timers)
    }

    async fn upsert(&self, timer: Timer) -> Result<(), GatewayError> {
        self.ensure_online()?;
        let previous = self.rows().insert(timer.id.clone(), timer.clone());
        match previous {
            Some(before) => self.publish(ChangeEvent::update(Some(before), timer)),
            None => self.publish(ChangeEvent::insert(timer)),
        }
        Ok(())
    }

    async fn insert(&self, timer: Timer) -> Result<(), GatewayError> {
        self.ensure_online()?;
        {
            let mut rows = self.rows();
            if rows.contains_key(&timer.id) {
                return Err(GatewayError::Conflict {
                    id: timer.id.clone(),
                });
            }
            rows.insert(timer.id.clone(), timer.clone());
        }
        self.publish(ChangeEvent::insert(timer));
        Ok(())
    }

    async fn patch(&self, id: &str, patch: TimerPatch) -> Result<(), GatewayError> {
        self.ensure_online()?;
        let (before, after) = {
            let mut rows = self.rows();
            let row = rows
                .get_mut(id)
                .ok_or_else(|| GatewayError::NotFound { id: id.to_string() })?;
            let before = row.clone();
            patch.apply_to(row);
            (before, row.clone())
        };
        self.publish(ChangeEvent::update(Some(before), after));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), GatewayError> {
        self.ensure_online()?;
        let removed = self.rows().remove(id);
        if let Some(before) = removed {
            self.publish(ChangeEvent::delete(before));
        }
        Ok(())
    }

    async fn subscribe(&self, table: &str) -> Result<ChangeFeed, GatewayError> {
        if table != self.table {
            return Err(GatewayError::UnknownTable(table.to_string()));
        }
        Ok(ChangeFeed::new(table, self.feed_tx.subscribe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::ChangeKind;
    use crate::state::TimerStatus;

    #[tokio::test]
    async fn insert_conflicts_on_existing_id() {
        let gateway = MemoryGateway::new("timers");
        let timer = Timer::new("Tea", 30).unwrap();

        gateway.insert(timer.clone()).await.unwrap();
        assert_eq!(
            gateway.insert(timer.clone()).await,
            Err(GatewayError::Conflict { id: timer.id })
        );
        assert_eq!(gateway.row_count(), 1);
    }

    #[tokio::test]
    async fn writes_are_announced_on_the_feed() {
        let gateway = MemoryGateway::new("timers");
        let mut feed = gateway.subscribe("timers").await.unwrap();
        let timer = Timer::new("Tea", 30).unwrap();

        gateway.upsert(timer.clone()).await.unwrap();
        gateway
            .patch(&timer.id, TimerPatch::remaining(25))
            .await
            .unwrap();
        gateway.delete(&timer.id).await.unwrap();
        gateway.delete(&timer.id).await.unwrap();

        assert_eq!(feed.next().await.map(|e| e.kind), Some(ChangeKind::Insert));
        let update = feed.next().await.unwrap();
        assert_eq!(update.kind, ChangeKind::Update);
        assert_eq!(update.before.map(|t| t.remaining_seconds), Some(30));
        assert_eq!(update.after.map(|t| t.remaining_seconds), Some(25));
        assert_eq!(feed.next().await.map(|e| e.kind), Some(ChangeKind::Delete));
        assert!(gateway.row(&timer.id).is_none());
    }

    #[tokio::test]
    async fn patch_of_missing_row_is_not_found() {
        let gateway = MemoryGateway::new("timers");
        assert_eq!(
            gateway.patch("nope", TimerPatch::finished()).await,
            Err(GatewayError::NotFound { id: "nope".into() })
        );
    }

    #[tokio::test]
    async fn list_all_is_newest_first() {
        let gateway = MemoryGateway::new("timers");
        let mut older = Timer::new("older", 10).unwrap();
        older.created_at -= chrono::Duration::seconds(60);
        let newer = Timer::new("newer", 10).unwrap();

        gateway.upsert(older).await.unwrap();
        gateway.upsert(newer).await.unwrap();

        let names: Vec<_> = gateway
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn offline_backend_rejects_every_call() {
        let gateway = MemoryGateway::new("timers");
        let mut timer = Timer::new("Tea", 30).unwrap();
        gateway.set_online(false);

        assert!(matches!(
            gateway.list_all().await,
            Err(GatewayError::Unavailable(_))
        ));
        assert!(gateway.upsert(timer.clone()).await.is_err());
        assert_eq!(gateway.row_count(), 0);

        gateway.set_online(true);
        timer.status = TimerStatus::Running;
        gateway.upsert(timer).await.unwrap();
        assert_eq!(gateway.row_count(), 1);
    }

    #[tokio::test]
    async fn subscribe_to_unknown_table_fails() {
        let gateway = MemoryGateway::new("timers");
        assert!(matches!(
            gateway.subscribe("alarms").await,
            Err(GatewayError::UnknownTable(_))
        ));
    }
}

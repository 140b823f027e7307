//! Persistence gateway contract and change feed types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

use crate::state::{Timer, TimerPatch};

/// Errors reported by a persistence backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The backend could not be reached or refused the request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// An insert collided with an existing row.
    #[error("timer already exists: {id}")]
    Conflict { id: String },

    /// A patch targeted a row that does not exist.
    #[error("timer not found: {id}")]
    NotFound { id: String },

    /// No change feed is published for this table.
    #[error("unknown table: {0}")]
    UnknownTable(String),
}

/// Kind of row change carried by a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One notification from the backend change feed.
///
/// Inserts and updates carry the new row in `after`; deletes carry the old
/// row in `before`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub before: Option<Timer>,
    pub after: Option<Timer>,
}

impl ChangeEvent {
    pub fn insert(timer: Timer) -> Self {
        Self {
            kind: ChangeKind::Insert,
            before: None,
            after: Some(timer),
        }
    }

    pub fn update(before: Option<Timer>, after: Timer) -> Self {
        Self {
            kind: ChangeKind::Update,
            before,
            after: Some(after),
        }
    }

    pub fn delete(before: Timer) -> Self {
        Self {
            kind: ChangeKind::Delete,
            before: Some(before),
            after: None,
        }
    }

    /// Id of the affected row, taken from whichever snapshot is present.
    pub fn record_id(&self) -> Option<&str> {
        self.before
            .as_ref()
            .or(self.after.as_ref())
            .map(|t| t.id.as_str())
    }
}

/// Subscription to a table's change notifications.
///
/// Dropping the feed (or calling [`ChangeFeed::unsubscribe`]) releases it.
#[derive(Debug)]
pub struct ChangeFeed {
    table: String,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(table: impl Into<String>, rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self {
            table: table.into(),
            rx,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Wait for the next notification. Returns `None` once the backend
    /// closes the feed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Periodic writes will bring the skipped rows back in line.
                    warn!(table = %self.table, skipped, "change feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {
        tracing::info!(table = %self.table, "unsubscribed from change feed");
    }
}

/// Remote store holding the canonical timer rows.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// All rows, newest first.
    async fn list_all(&self) -> Result<Vec<Timer>, GatewayError>;

    /// Insert or replace the row with the timer's id.
    async fn upsert(&self, timer: Timer) -> Result<(), GatewayError>;

    /// Insert a new row; fails with [`GatewayError::Conflict`] if the id exists.
    async fn insert(&self, timer: Timer) -> Result<(), GatewayError>;

    /// Update only the columns set in `patch`.
    async fn patch(&self, id: &str, patch: TimerPatch) -> Result<(), GatewayError>;

    /// Delete the row if present.
    async fn delete(&self, id: &str) -> Result<(), GatewayError>;

    /// Subscribe to insert/update/delete notifications for `table`.
    async fn subscribe(&self, table: &str) -> Result<ChangeFeed, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_prefers_the_old_row() {
        let timer = Timer::new("Tea", 30).unwrap();
        assert_eq!(
            ChangeEvent::delete(timer.clone()).record_id(),
            Some(timer.id.as_str())
        );
        assert_eq!(
            ChangeEvent::insert(timer.clone()).record_id(),
            Some(timer.id.as_str())
        );
        let empty = ChangeEvent {
            kind: ChangeKind::Delete,
            before: None,
            after: None,
        };
        assert_eq!(empty.record_id(), None);
    }

    #[test]
    fn kind_serializes_like_the_backend_event_type() {
        let json = serde_json::to_string(&ChangeKind::Update).unwrap();
        assert_eq!(json, "\"UPDATE\"");
    }

    #[tokio::test]
    async fn feed_skips_lag_and_ends_on_close() {
        let (tx, rx) = broadcast::channel(1);
        let mut feed = ChangeFeed::new("timers", rx);
        let timer = Timer::new("Tea", 30).unwrap();

        tx.send(ChangeEvent::insert(timer.clone())).unwrap();
        tx.send(ChangeEvent::delete(timer.clone())).unwrap();
        drop(tx);

        assert_eq!(feed.next().await, Some(ChangeEvent::delete(timer)));
        assert_eq!(feed.next().await, None);
    }
}

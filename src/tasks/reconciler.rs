//! Folding backend change notifications into local state

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{
    services::{ChangeEvent, ChangeFeed, ChangeKind},
    state::{AppState, Timer, TimerBoard},
};

/// What the reconciler decided for one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// A record unknown locally was added.
    Inserted,
    /// The local record was overwritten with the incoming snapshot.
    Replaced,
    /// The record was removed (and its ticker stopped).
    Removed,
    /// An insert for an id we already hold; the first writer wins.
    AlreadyPresent,
    /// Both sides are running and within the tolerance band, so the
    /// incoming update is taken to be an echo and dropped.
    EchoDiscarded { local: u32, incoming: u32 },
    /// A delete for an id we do not hold.
    Absent,
    /// The notification carried no usable snapshot.
    Malformed,
}

impl TimerBoard {
    /// Apply one change notification to the local store.
    pub fn apply_change(&mut self, event: ChangeEvent) -> Reconciliation {
        match event.kind {
            ChangeKind::Delete => {
                let Some(id) = event.record_id().map(str::to_string) else {
                    return Reconciliation::Malformed;
                };
                self.tickers.stop(&id);
                match self.store.remove(&id) {
                    Some(_) => Reconciliation::Removed,
                    None => Reconciliation::Absent,
                }
            }
            ChangeKind::Insert => {
                let Some(incoming) = event.after else {
                    return Reconciliation::Malformed;
                };
                if self.store.contains(&incoming.id) {
                    return Reconciliation::AlreadyPresent;
                }
                self.accept(incoming);
                Reconciliation::Inserted
            }
            ChangeKind::Update => {
                let Some(incoming) = event.after else {
                    return Reconciliation::Malformed;
                };
                let incoming = incoming.sanitized();
                let local = self
                    .store
                    .get(&incoming.id)
                    .map(|t| (t.is_running(), t.remaining_seconds));

                match local {
                    None => {
                        self.accept(incoming);
                        Reconciliation::Inserted
                    }
                    Some((true, local))
                        if incoming.is_running()
                            && local.abs_diff(incoming.remaining_seconds)
                                <= self.settings.tolerance =>
                    {
                        Reconciliation::EchoDiscarded {
                            local,
                            incoming: incoming.remaining_seconds,
                        }
                    }
                    Some(_) => {
                        self.accept(incoming);
                        Reconciliation::Replaced
                    }
                }
            }
        }
    }

    fn accept(&mut self, incoming: Timer) {
        let id = incoming.id.clone();
        self.store.upsert(incoming.sanitized());
        self.sync_ticker(&id);
    }
}

/// Background task that feeds every change notification into `state` until
/// the feed closes or `shutdown` fires, then releases the subscription.
pub async fn reconciler_task(
    state: Arc<AppState>,
    mut feed: ChangeFeed,
    mut shutdown: oneshot::Receiver<()>,
) {
    info!(table = %feed.table(), "Starting reconciler task");

    loop {
        tokio::select! {
            event = feed.next() => {
                let Some(event) = event else {
                    info!(table = %feed.table(), "Change feed closed, reconciler stopping");
                    return;
                };
                let id = event.record_id().unwrap_or_default().to_string();
                let kind = event.kind;
                match state.apply_change(event) {
                    Reconciliation::Malformed => {
                        warn!(?kind, "ignoring change notification without a record");
                    }
                    outcome => debug!(timer_id = %id, ?kind, ?outcome, "change reconciled"),
                }
            }
            _ = &mut shutdown => {
                feed.unsubscribe();
                return;
            }
        }
    }
}

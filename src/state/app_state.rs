//! Main application state management

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use super::{Effect, TickOutcome, Timer, TimerBoard};
use crate::{
    config::SyncSettings,
    error::Result,
    services::{ChangeEvent, PersistenceGateway, SnapshotStore},
    tasks::{persistence_task, ticker_task, Reconciliation},
};

/// Runtime wrapper around the [`TimerBoard`] for one session.
///
/// Every operation locks the board, applies the change and queues its
/// backend writes while still holding the lock, so ticks, user actions and
/// change notifications interleave but never overlap, and the single writer
/// task persists them in the order the board changed.
pub struct AppState {
    board: Mutex<TimerBoard>,
    gateway: Arc<dyn PersistenceGateway>,
    snapshot: SnapshotStore,
    writes_tx: mpsc::UnboundedSender<Effect>,
    /// Tick cadence and reconciliation tuning
    pub settings: SyncSettings,
    pub start_time: Instant,
}

impl AppState {
    /// Create the session state and spawn its persistence writer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        snapshot: SnapshotStore,
        settings: SyncSettings,
    ) -> Self {
        let board = TimerBoard::new(settings);
        let (writes_tx, writes_rx) = mpsc::unbounded_channel();

        tokio::spawn(persistence_task(
            Arc::clone(&gateway),
            snapshot.clone(),
            writes_rx,
            board.store().subscribe(),
        ));

        Self {
            board: Mutex::new(board),
            gateway,
            snapshot,
            writes_tx,
            settings,
            start_time: Instant::now(),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }

    /// Load the initial timer list, falling back to the local snapshot when
    /// the backend cannot be read. Returns the number of timers loaded.
    pub async fn load(self: &Arc<Self>) -> usize {
        let timers = match self.gateway.list_all().await {
            Ok(timers) => {
                info!("Loaded {} timers from backend", timers.len());
                timers
            }
            Err(e) => {
                warn!("Failed to load timers from backend: {}, using local snapshot", e);
                match self.snapshot.load().await {
                    Ok(timers) => timers,
                    Err(e) => {
                        warn!("Failed to read local snapshot: {}", e);
                        Vec::new()
                    }
                }
            }
        };

        let count = timers.len();
        self.with_board(|board| board.load(timers));
        count
    }

    pub fn list(&self) -> Vec<Timer> {
        self.lock_board().list()
    }

    pub fn get(&self, id: &str) -> Option<Timer> {
        self.lock_board().get(id).cloned()
    }

    /// Receive the full timer list after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Timer>> {
        self.lock_board().store().subscribe()
    }

    pub fn create(self: &Arc<Self>, name: &str, initial_seconds: u32) -> Result<Timer> {
        let timer = self.with_board(|board| board.create(name, initial_seconds))?;
        info!(timer_id = %timer.id, "Created timer {:?} ({}s)", timer.name, timer.initial_seconds);
        Ok(timer)
    }

    pub fn start(self: &Arc<Self>, id: &str) -> Result<Option<Timer>> {
        self.with_board(|board| board.start(id))
    }

    pub fn pause(self: &Arc<Self>, id: &str) -> Result<Option<Timer>> {
        self.with_board(|board| board.pause(id))
    }

    pub fn resume(self: &Arc<Self>, id: &str) -> Result<Option<Timer>> {
        self.with_board(|board| board.resume(id))
    }

    pub fn cancel(self: &Arc<Self>, id: &str) -> Result<Option<Timer>> {
        self.with_board(|board| board.cancel(id))
    }

    pub fn reset(self: &Arc<Self>, id: &str) -> Result<Option<Timer>> {
        self.with_board(|board| board.reset(id))
    }

    pub fn rename(self: &Arc<Self>, id: &str, name: &str) -> Result<Option<Timer>> {
        self.with_board(|board| board.rename(id, name))
    }

    pub fn set_duration(self: &Arc<Self>, id: &str, initial_seconds: u32) -> Result<Option<Timer>> {
        self.with_board(|board| board.set_duration(id, initial_seconds))
    }

    pub fn delete(self: &Arc<Self>, id: &str) -> Option<Timer> {
        let removed = self.with_board(|board| board.delete(id));
        if removed.is_some() {
            info!(timer_id = %id, "Deleted timer");
        }
        removed
    }

    /// Run one tick for the ticker action `generation` of timer `id`.
    pub fn tick(self: &Arc<Self>, id: &str, generation: u64) -> TickOutcome {
        self.with_board(|board| board.tick(id, generation))
    }

    /// Fold one change notification into the local store.
    pub fn apply_change(self: &Arc<Self>, event: ChangeEvent) -> Reconciliation {
        self.with_board(|board| board.apply_change(event))
    }

    pub fn is_ticking(&self, id: &str) -> bool {
        self.lock_board().tickers().is_active(id)
    }

    pub fn active_tickers(&self) -> usize {
        self.lock_board().tickers().len()
    }

    /// Stop every ticker, used on shutdown.
    pub fn stop_all_tickers(&self) -> usize {
        let stopped = self.lock_board().tickers_mut().stop_all();
        info!("Stopped {} tickers", stopped);
        stopped
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    fn lock_board(&self) -> MutexGuard<'_, TimerBoard> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` under the board lock and queue its writes before the lock is
    /// released, so the writer sees them in the order the board changed.
    /// Tickers are spawned once the lock is gone.
    fn with_board<T, F>(self: &Arc<Self>, f: F) -> T
    where
        F: FnOnce(&mut TimerBoard) -> T,
    {
        let (value, tickers) = {
            let mut board = self.lock_board();
            let value = f(&mut board);
            let tickers = self.queue_writes(board.drain_effects());
            (value, tickers)
        };
        for (id, generation) in tickers {
            self.spawn_ticker(id, generation);
        }
        value
    }

    /// Send every write to the persistence writer and hand back the tickers
    /// still to be spawned.
    fn queue_writes(&self, effects: Vec<Effect>) -> Vec<(String, u64)> {
        let mut tickers = Vec::new();
        for effect in effects {
            match effect {
                Effect::StartTicker { id, generation } => tickers.push((id, generation)),
                write => {
                    if self.writes_tx.send(write).is_err() {
                        warn!("Persistence writer has stopped, dropping write");
                    }
                }
            }
        }
        tickers
    }

    fn spawn_ticker(self: &Arc<Self>, id: String, generation: u64) {
        let task = tokio::spawn(ticker_task(Arc::clone(self), id.clone(), generation));
        self.lock_board()
            .tickers_mut()
            .attach(&id, generation, task.abort_handle());
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("board", &self.board)
            .field("snapshot", &self.snapshot)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

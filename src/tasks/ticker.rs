//! Per-timer countdown ticking

use std::{collections::HashMap, sync::Arc};

use tokio::{
    task::AbortHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::state::{AppState, TickOutcome};

#[derive(Debug)]
struct TickerEntry {
    generation: u64,
    ticks: u64,
    handle: Option<AbortHandle>,
}

/// Registry of the repeating tick actions, at most one per timer id.
///
/// Registering and removing an entry are the only ways ticking starts and
/// stops. Each registration gets a fresh generation number; a tick carrying
/// an older generation belongs to an action that was already stopped and
/// must have no effect.
#[derive(Debug, Default)]
pub struct TickerRegistry {
    entries: HashMap<String, TickerEntry>,
    next_generation: u64,
}

impl TickerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a ticker for `id`, returning its generation.
    ///
    /// Returns `None` if one is already active for that id.
    pub fn start(&mut self, id: &str) -> Option<u64> {
        if self.entries.contains_key(id) {
            return None;
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        self.entries.insert(
            id.to_string(),
            TickerEntry {
                generation,
                ticks: 0,
                handle: None,
            },
        );
        Some(generation)
    }

    /// Attach the spawned task's abort handle to its entry.
    ///
    /// If the entry was stopped (or replaced) before the task could be
    /// attached, the task is aborted on the spot.
    pub fn attach(&mut self, id: &str, generation: u64, handle: AbortHandle) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) if entry.generation == generation => {
                entry.handle = Some(handle);
                true
            }
            _ => {
                handle.abort();
                false
            }
        }
    }

    /// Stop and forget the ticker for `id`. Returns whether one was active.
    pub fn stop(&mut self, id: &str) -> bool {
        match self.entries.remove(id) {
            Some(entry) => {
                if let Some(handle) = entry.handle {
                    handle.abort();
                }
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            if let Some(handle) = entry.handle {
                handle.abort();
            }
        }
        count
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn is_current(&self, id: &str, generation: u64) -> bool {
        self.entries
            .get(id)
            .is_some_and(|entry| entry.generation == generation)
    }

    /// Count one tick for the current action and return the running total.
    pub fn record_tick(&mut self, id: &str, generation: u64) -> Option<u64> {
        let entry = self.entries.get_mut(id)?;
        if entry.generation != generation {
            return None;
        }
        entry.ticks += 1;
        Some(entry.ticks)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Background task driving one running timer until its ticker is stopped.
pub async fn ticker_task(state: Arc<AppState>, id: String, generation: u64) {
    let period = state.settings.tick_interval;
    debug!(timer_id = %id, generation, "ticker started");

    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match state.tick(&id, generation) {
            TickOutcome::Decremented { .. } => continue,
            TickOutcome::Finished => {
                info!(timer_id = %id, "timer finished");
                break;
            }
            TickOutcome::Stopped | TickOutcome::Stale => break,
        }
    }

    debug!(timer_id = %id, generation, "ticker exited");
}

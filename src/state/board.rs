//! Timer state machine and tick logic

use tracing::debug;

use super::{store::LocalStore, timer, Timer, TimerPatch, TimerStatus};
use crate::{
    config::SyncSettings,
    error::{Result, TimerError},
    tasks::TickerRegistry,
};

/// Side effects requested by a board mutation, carried out by the runtime
/// after the board lock is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Insert(Timer),
    Upsert(Timer),
    Patch { id: String, patch: TimerPatch },
    Delete(String),
    /// A ticker was registered and needs a task to drive it.
    StartTicker { id: String, generation: u64 },
}

/// Result of one tick of a ticker action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The timer moved down by one second and keeps running.
    Decremented { remaining: u32, persisted: bool },
    /// The countdown reached zero; the action has been stopped.
    Finished,
    /// The timer is gone or no longer running; the action has been stopped.
    Stopped,
    /// The tick belongs to an action that was already replaced or stopped.
    Stale,
}

/// Local store plus the ticker registry, mutated as one unit.
///
/// Keeping both behind a single owner is what holds the
/// running-iff-ticking invariant: every status change goes through
/// [`TimerBoard::sync_ticker`].
#[derive(Debug)]
pub struct TimerBoard {
    pub(crate) store: LocalStore,
    pub(crate) tickers: TickerRegistry,
    pub(crate) settings: SyncSettings,
    effects: Vec<Effect>,
}

impl TimerBoard {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            store: LocalStore::new(),
            tickers: TickerRegistry::new(),
            settings,
            effects: Vec::new(),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn tickers(&self) -> &TickerRegistry {
        &self.tickers
    }

    pub fn tickers_mut(&mut self) -> &mut TickerRegistry {
        &mut self.tickers
    }

    pub fn get(&self, id: &str) -> Option<&Timer> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<Timer> {
        self.store.list()
    }

    /// Take the effects queued since the last call.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Replace the store with a freshly loaded list and start tickers for
    /// the timers that were left running.
    pub fn load(&mut self, timers: Vec<Timer>) {
        self.tickers.stop_all();
        self.store
            .replace_all(timers.into_iter().map(Timer::sanitized).collect());
        for id in self.store.list().into_iter().map(|t| t.id) {
            self.sync_ticker(&id);
        }
    }

    pub fn create(&mut self, name: &str, initial_seconds: u32) -> Result<Timer> {
        let timer = Timer::new(name, initial_seconds)?;
        self.store.upsert(timer.clone());
        self.effects.push(Effect::Insert(timer.clone()));
        debug!(timer_id = %timer.id, name = %timer.name, "timer created");
        Ok(timer)
    }

    pub fn start(&mut self, id: &str) -> Result<Option<Timer>> {
        self.transition(id, "start", &[TimerStatus::Idle], |t| {
            t.status = TimerStatus::Running;
        })
    }

    pub fn pause(&mut self, id: &str) -> Result<Option<Timer>> {
        self.transition(id, "pause", &[TimerStatus::Running], |t| {
            t.status = TimerStatus::Paused;
        })
    }

    pub fn resume(&mut self, id: &str) -> Result<Option<Timer>> {
        self.transition(id, "resume", &[TimerStatus::Paused], |t| {
            t.status = TimerStatus::Running;
        })
    }

    pub fn cancel(&mut self, id: &str) -> Result<Option<Timer>> {
        self.transition(
            id,
            "cancel",
            &[TimerStatus::Running, TimerStatus::Paused],
            |t| t.status = TimerStatus::Idle,
        )
    }

    pub fn reset(&mut self, id: &str) -> Result<Option<Timer>> {
        self.transition(
            id,
            "reset",
            &[
                TimerStatus::Idle,
                TimerStatus::Running,
                TimerStatus::Paused,
                TimerStatus::Finished,
            ],
            |t| {
                t.remaining_seconds = t.initial_seconds;
                t.status = TimerStatus::Idle;
            },
        )
    }

    pub fn rename(&mut self, id: &str, name: &str) -> Result<Option<Timer>> {
        let name = timer::validate_name(name)?;
        let Some(current) = self.store.get(id) else {
            return Ok(None);
        };
        if current.is_running() {
            return Err(TimerError::TimerRunning { id: id.to_string() });
        }
        Ok(self.commit(id, |t| t.name = name))
    }

    /// Change the configured duration, rewinding the clock to it.
    ///
    /// A timer that is running when the edit starts is stopped and forced
    /// back to idle first.
    pub fn set_duration(&mut self, id: &str, initial_seconds: u32) -> Result<Option<Timer>> {
        let initial_seconds = timer::validate_duration(initial_seconds)?;
        if !self.store.contains(id) {
            return Ok(None);
        }
        Ok(self.commit(id, |t| {
            // A finished timer must keep a zero clock, so it goes back to idle too.
            if matches!(t.status, TimerStatus::Running | TimerStatus::Finished) {
                t.status = TimerStatus::Idle;
            }
            t.initial_seconds = initial_seconds;
            t.remaining_seconds = initial_seconds;
        }))
    }

    pub fn delete(&mut self, id: &str) -> Option<Timer> {
        self.tickers.stop(id);
        let removed = self.store.remove(id)?;
        self.effects.push(Effect::Delete(id.to_string()));
        debug!(timer_id = %id, "timer deleted");
        Some(removed)
    }

    /// Advance a running timer by one tick of the action `generation`.
    pub fn tick(&mut self, id: &str, generation: u64) -> TickOutcome {
        if !self.tickers.is_current(id, generation) {
            return TickOutcome::Stale;
        }

        let Some(current) = self.store.get(id) else {
            self.tickers.stop(id);
            return TickOutcome::Stopped;
        };
        if !current.is_running() {
            self.tickers.stop(id);
            return TickOutcome::Stopped;
        }

        let ticks = self.tickers.record_tick(id, generation).unwrap_or(0);
        let remaining = current.remaining_seconds.saturating_sub(1);

        if remaining == 0 {
            self.tickers.stop(id);
            self.store.update(id, |t| {
                t.remaining_seconds = 0;
                t.status = TimerStatus::Finished;
            });
            self.effects.push(Effect::Patch {
                id: id.to_string(),
                patch: TimerPatch::finished(),
            });
            return TickOutcome::Finished;
        }

        self.store.update(id, |t| t.remaining_seconds = remaining);
        let persisted = ticks % self.settings.persist_every.max(1) == 0;
        if persisted {
            self.effects.push(Effect::Patch {
                id: id.to_string(),
                patch: TimerPatch::remaining(remaining),
            });
        }
        TickOutcome::Decremented {
            remaining,
            persisted,
        }
    }

    /// Start or stop the ticker for `id` so that it is active exactly when
    /// the stored timer is running.
    pub(crate) fn sync_ticker(&mut self, id: &str) {
        let running = self.store.get(id).is_some_and(Timer::is_running);
        if running {
            if let Some(generation) = self.tickers.start(id) {
                self.effects.push(Effect::StartTicker {
                    id: id.to_string(),
                    generation,
                });
            }
        } else {
            self.tickers.stop(id);
        }
    }

    fn transition<F>(
        &mut self,
        id: &str,
        action: &'static str,
        allowed: &[TimerStatus],
        apply: F,
    ) -> Result<Option<Timer>>
    where
        F: FnOnce(&mut Timer),
    {
        let Some(current) = self.store.get(id) else {
            return Ok(None);
        };
        if !allowed.contains(&current.status) {
            return Err(TimerError::InvalidTransition {
                id: id.to_string(),
                from: current.status,
                action,
            });
        }
        let updated = self.commit(id, apply);
        debug!(timer_id = %id, action, "timer transition");
        Ok(updated)
    }

    /// Apply a local edit, bring the ticker in line and queue a full write.
    fn commit<F>(&mut self, id: &str, apply: F) -> Option<Timer>
    where
        F: FnOnce(&mut Timer),
    {
        let updated = self.store.update(id, apply)?;
        self.sync_ticker(id);
        self.effects.push(Effect::Upsert(updated.clone()));
        Some(updated)
    }
}

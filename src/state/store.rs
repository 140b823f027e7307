//! In-memory ordered timer store

use tokio::sync::watch;

use super::Timer;

/// Ordered collection of timers, at most one per id, kept in insertion order.
///
/// Every mutation that changes the contents publishes the full list on a
/// watch channel so a presentation layer can re-render without polling.
#[derive(Debug)]
pub struct LocalStore {
    timers: Vec<Timer>,
    changes_tx: watch::Sender<Vec<Timer>>,
}

impl LocalStore {
    pub fn new() -> Self {
        let (changes_tx, _) = watch::channel(Vec::new());
        Self {
            timers: Vec::new(),
            changes_tx,
        }
    }

    /// Replace the timer with the same id in place, or append it.
    ///
    /// Returns `false` when the store already held an identical record.
    pub fn upsert(&mut self, timer: Timer) -> bool {
        match self.position(&timer.id) {
            Some(index) if self.timers[index] == timer => return false,
            Some(index) => self.timers[index] = timer,
            None => self.timers.push(timer),
        }
        self.notify();
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Timer> {
        let index = self.position(id)?;
        let removed = self.timers.remove(index);
        self.notify();
        Some(removed)
    }

    /// Apply `f` to the timer with the given id and return the updated copy.
    pub fn update<F>(&mut self, id: &str, f: F) -> Option<Timer>
    where
        F: FnOnce(&mut Timer),
    {
        let index = self.position(id)?;
        let before = self.timers[index].clone();
        f(&mut self.timers[index]);
        let after = self.timers[index].clone();
        if after != before {
            self.notify();
        }
        Some(after)
    }

    /// Replace the whole contents, keeping the first record seen for each id.
    pub fn replace_all(&mut self, timers: Vec<Timer>) {
        self.timers.clear();
        for timer in timers {
            if self.position(&timer.id).is_none() {
                self.timers.push(timer);
            }
        }
        self.notify();
    }

    pub fn get(&self, id: &str) -> Option<&Timer> {
        self.timers.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn list(&self) -> Vec<Timer> {
        self.timers.clone()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Receive the full timer list after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Timer>> {
        self.changes_tx.subscribe()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.timers.iter().position(|t| t.id == id)
    }

    fn notify(&self) {
        self.changes_tx.send_replace(self.timers.clone());
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TimerStatus;

    fn timer(name: &str, seconds: u32) -> Timer {
        Timer::new(name, seconds).unwrap()
    }

    #[test]
    fn upsert_appends_then_replaces_in_place() {
        let mut store = LocalStore::new();
        let a = timer("a", 10);
        let b = timer("b", 20);
        store.upsert(a.clone());
        store.upsert(b.clone());

        let mut renamed = a.clone();
        renamed.name = "a2".into();
        assert!(store.upsert(renamed));

        let names: Vec<_> = store.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a2", "b"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn identical_upsert_is_not_a_change() {
        let mut store = LocalStore::new();
        let a = timer("a", 10);
        assert!(store.upsert(a.clone()));

        let rx = store.subscribe();
        assert!(!store.upsert(a));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn remove_drops_only_that_id() {
        let mut store = LocalStore::new();
        let a = timer("a", 10);
        let b = timer("b", 20);
        store.upsert(a.clone());
        store.upsert(b.clone());

        assert_eq!(store.remove(&a.id).map(|t| t.name), Some("a".to_string()));
        assert!(store.remove(&a.id).is_none());
        assert!(!store.contains(&a.id));
        assert!(store.contains(&b.id));
    }

    #[test]
    fn update_notifies_subscribers() {
        let mut store = LocalStore::new();
        let a = timer("a", 10);
        store.upsert(a.clone());

        let mut rx = store.subscribe();
        let updated = store.update(&a.id, |t| t.status = TimerStatus::Running);
        assert_eq!(updated.map(|t| t.status), Some(TimerStatus::Running));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update()[0].status, TimerStatus::Running);

        assert!(store.update("missing", |t| t.remaining_seconds = 0).is_none());
    }

    #[test]
    fn replace_all_deduplicates_by_id() {
        let mut store = LocalStore::new();
        let a = timer("a", 10);
        let mut dup = a.clone();
        dup.name = "dup".into();

        store.replace_all(vec![a.clone(), dup, timer("b", 5)]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&a.id).map(|t| t.name.as_str()), Some("a"));
    }
}

//! In-process event store.
//!
//! Append-only per-task execution history with ring-buffer retention.
//! Many unit loops write concurrently; readers get cloned snapshots so a
//! read never observes a half-applied write.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::RwLock;

use tracing::trace;

use crate::domain::Event;

/// Default number of events retained per task
const DEFAULT_RETENTION: usize = 5;

/// Thread-safe per-task history, keyed by task name
pub struct EventStore {
    retention: usize,
    events: RwLock<HashMap<String, VecDeque<Event>>>,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore {
    /// Create a store with the default retention cap
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    /// Create a store retaining at most `retention` events per task
    pub fn with_retention(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            events: RwLock::new(HashMap::new()),
        }
    }

    /// Append an event under its task's key, dropping the oldest entry
    /// past the retention cap.
    ///
    /// Events arrive in start-time order per task because each unit's loop
    /// is serialized; the store preserves insertion order.
    pub fn add(&self, event: Event) {
        let mut events = self.events.write().expect("event store lock poisoned");
        let history = events.entry(event.task_name.clone()).or_default();
        if history.len() == self.retention {
            history.pop_front();
        }
        trace!(task = %event.task_name, success = event.success, "recorded event");
        history.push_back(event);
    }

    /// Snapshot of one task's history, oldest first
    pub fn task_events(&self, task_name: &str) -> Vec<Event> {
        let events = self.events.read().expect("event store lock poisoned");
        events
            .get(task_name)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of every task's history, keyed and ordered by task name
    pub fn read_all(&self) -> BTreeMap<String, Vec<Event>> {
        let events = self.events.read().expect("event store lock poisoned");
        events
            .iter()
            .map(|(name, h)| (name.clone(), h.iter().cloned().collect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(task: &str, success: bool) -> Event {
        let result: Result<(), String> = if success {
            Ok(())
        } else {
            Err("failed".to_string())
        };
        Event::begin(task, None).finish(&result)
    }

    #[test]
    fn test_add_and_read_preserves_order() {
        let store = EventStore::new();
        store.add(event("a", true));
        store.add(event("a", false));
        store.add(event("b", true));

        let a = store.task_events("a");
        assert_eq!(a.len(), 2);
        assert!(a[0].success);
        assert!(!a[1].success);
        assert!(a[0].start_time <= a[1].start_time);

        assert_eq!(store.task_events("b").len(), 1);
        assert!(store.task_events("missing").is_empty());
    }

    #[test]
    fn test_retention_drops_oldest() {
        let store = EventStore::with_retention(2);
        let first = event("a", false);
        let first_id = first.id;
        store.add(first);
        store.add(event("a", true));
        store.add(event("a", true));

        let a = store.task_events("a");
        assert_eq!(a.len(), 2);
        assert!(a.iter().all(|e| e.id != first_id));
    }

    #[test]
    fn test_read_all_keys_sorted() {
        let store = EventStore::new();
        store.add(event("zeta", true));
        store.add(event("alpha", true));

        let all = store.read_all();
        let keys: Vec<&String> = all.keys().collect();
        assert_eq!(keys, ["alpha", "zeta"]);
    }

    #[test]
    fn test_concurrent_writers_serialize() {
        use std::sync::Arc;

        let store = Arc::new(EventStore::with_retention(100));
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..10 {
                    store.add(event(&format!("task-{}", i % 2), true));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let total: usize = store.read_all().values().map(Vec::len).sum();
        assert_eq!(total, 80);
    }
}

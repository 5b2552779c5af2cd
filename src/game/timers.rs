//! Timers keyed by a composite key with cancel-and-replace semantics

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

struct TimerEntry {
    generation: u64,
    handle: JoinHandle<()>,
}

/// At most one pending timer per key.
///
/// Scheduling a key that already has a pending timer aborts the old one, so
/// an action never runs for a superseded schedule. Dropping the set cancels
/// every pending timer.
pub struct KeyedTimers<K> {
    timers: Arc<Mutex<HashMap<K, TimerEntry>>>,
    next_generation: AtomicU64,
}

impl<K> KeyedTimers<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Run `action` after `delay`, replacing any pending timer for `key`
    pub fn schedule<F>(&self, key: K, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let timers = Arc::clone(&self.timers);
        let task_key = key.clone();

        let mut guard = self.timers.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut map = timers.lock();
                match map.get(&task_key) {
                    Some(entry) if entry.generation == generation => {
                        map.remove(&task_key);
                    }
                    _ => return,
                }
            }
            action();
        });

        if let Some(previous) = guard.insert(key, TimerEntry { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Cancel the pending timer for `key`, returns whether one existed
    pub fn cancel(&self, key: &K) -> bool {
        match self.timers.lock().remove(key) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, entry) in self.timers.lock().drain() {
            entry.handle.abort();
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.timers.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.timers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.lock().is_empty()
    }
}

impl<K> Default for KeyedTimers<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for KeyedTimers<K> {
    fn drop(&mut self) {
        for (_, entry) in self.timers.lock().drain() {
            entry.handle.abort();
        }
    }
}

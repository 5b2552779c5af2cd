//! Single-resolution completion signal

use std::sync::Arc;

use tokio::sync::watch;

/// Resolves at most once; every waiter observes the same value.
#[derive(Debug, Clone)]
pub struct CompletionSignal<T: Clone> {
    tx: Arc<watch::Sender<Option<T>>>,
}

impl<T: Clone + Send + Sync + 'static> CompletionSignal<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Resolve with `value`; returns `false` if already resolved
    pub fn resolve(&self, value: T) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
            true
        })
    }

    pub fn is_resolved(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn value(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    /// Wait until resolved
    pub async fn wait(&self) -> T {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(value) = rx.borrow_and_update().clone() {
                return value;
            }
            // `self` holds the sender, so the channel stays open
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Receiver for code that selects on resolution
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for CompletionSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn resolves_only_once() {
        let signal = CompletionSignal::new();
        assert!(!signal.is_resolved());
        assert!(signal.resolve(1));
        assert!(!signal.resolve(2));
        assert_eq!(signal.value(), Some(1));
    }

    #[test]
    fn waiters_wake_on_resolution() {
        let signal = CompletionSignal::new();
        let waiter = signal.clone();
        let mut fut = task::spawn(async move { waiter.wait().await });
        assert_pending!(fut.poll());

        signal.resolve("done");
        assert!(fut.is_woken());
        assert_ready_eq!(fut.poll(), "done");
    }

    #[tokio::test]
    async fn late_waiter_sees_value() {
        let signal = CompletionSignal::new();
        signal.resolve(7u8);
        assert_eq!(signal.wait().await, 7);
    }
}

//! Cancellation handle for polling loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    tx: broadcast::Sender<()>,
}

/// Cloneable handle that stops a poll loop.
///
/// Cancelling is sticky: once cancelled, every current and future waiter
/// observes it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    inner: Arc<Inner>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                tx,
            }),
        }
    }

    /// Signal cancellation to every loop sharing this handle.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            // No receivers just means nobody is waiting right now.
            let _ = self.inner.tx.send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.tx.subscribe();
        if self.is_cancelled() {
            return;
        }
        let _ = rx.recv().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_cancelled_wakes_waiter() {
        let handle = CancelHandle::new();
        let mut waiter = task::spawn(handle.cancelled());

        assert_pending!(waiter.poll());
        handle.cancel();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }

    #[test]
    fn test_cancel_before_wait_resolves_immediately() {
        let handle = CancelHandle::new();
        handle.cancel();
        assert!(handle.is_cancelled());

        let mut waiter = task::spawn(handle.cancelled());
        assert_ready!(waiter.poll());
    }

    #[test]
    fn test_clones_share_state() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        clone.cancel();
        clone.cancel();
        assert!(handle.is_cancelled());
    }
}

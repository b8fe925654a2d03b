//! One-shot readiness tokens for resolved capabilities.
//!
//! Each capability gets a [`Readiness`] slot. Discovery resolves it once per
//! connection; any number of callers can wait on it before or after that.
//! Clearing the slot on disconnect makes later waiters block until the next
//! discovery cycle resolves it again.

use tokio::sync::watch;

/// A cached, resettable completion token.
#[derive(Debug)]
pub struct Readiness<T> {
    slot: watch::Sender<Option<T>>,
}

impl<T: Clone + Send + Sync> Readiness<T> {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot }
    }

    /// Store the resolved value, waking every waiter.
    pub fn resolve(&self, value: T) {
        self.slot.send_replace(Some(value));
    }

    /// Forget the resolved value.
    pub fn clear(&self) {
        self.slot.send_replace(None);
    }

    /// The resolved value, if any.
    pub fn get(&self) -> Option<T> {
        self.slot.borrow().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Wait until a value is resolved and return it.
    ///
    /// Pends for as long as nothing resolves the slot.
    pub async fn wait(&self) -> T {
        let mut rx = self.slot.subscribe();
        let resolved = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|value| value.clone());
        match resolved {
            Some(value) => value,
            // The sender lives as long as `self`, so this is unreachable in practice.
            None => std::future::pending().await,
        }
    }
}

impl<T: Clone + Send + Sync> Default for Readiness<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_after_resolve() {
        let ready = Readiness::new();
        ready.resolve(7u8);
        assert_eq!(ready.wait().await, 7);
        assert_eq!(ready.get(), Some(7));
    }

    #[tokio::test]
    async fn test_wait_before_resolve() {
        let ready = Arc::new(Readiness::new());
        let waiter = {
            let ready = Arc::clone(&ready);
            tokio::spawn(async move { ready.wait().await })
        };
        tokio::task::yield_now().await;
        ready.resolve("hr");
        assert_eq!(waiter.await.unwrap(), "hr");
    }

    #[tokio::test]
    async fn test_clear_blocks_waiters() {
        let ready = Readiness::new();
        ready.resolve(1u8);
        ready.clear();
        assert!(!ready.is_resolved());
        let pending = tokio::time::timeout(Duration::from_millis(20), ready.wait()).await;
        assert!(pending.is_err());
    }
}

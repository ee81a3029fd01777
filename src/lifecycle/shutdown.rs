//! One-shot shutdown trigger shared between a server task and its stop hook.

use tokio::sync::watch;

/// Latching shutdown flag.
///
/// Unlike a broadcast, a waiter that subscribes after `trigger` still
/// observes it.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Flip the flag. Later calls are no-ops.
    pub fn trigger(&self) {
        self.tx.send_if_modified(|triggered| !std::mem::replace(triggered, true));
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the flag is set.
    pub fn wait(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // Err means the sender is gone, which also ends the wait.
            let _ = rx.wait_for(|triggered| *triggered).await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_late_waiter_sees_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();

        assert!(shutdown.is_triggered());
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_blocks_until_trigger() {
        let shutdown = Shutdown::new();
        let waiter = tokio::spawn(shutdown.wait());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}

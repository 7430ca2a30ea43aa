//! Process-wide shutdown signalling.
//!
//! One watch channel fans a single "stop now" edge out to every task. The
//! controller side is cloneable and idempotent; the signal side resolves at the
//! next suspension point of whoever holds it.

use std::sync::Arc;
use tokio::sync::watch;

/// Raises the process-wide shutdown signal
#[derive(Clone)]
pub struct ShutdownController {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Create a new per-task view of the signal
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Tell every subscriber to stop. Idempotent.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-task view of the shutdown signal
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown has been triggered. A vanished controller counts
    /// as triggered.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn trigger_wakes_subscribers() {
        let controller = ShutdownController::new();
        let mut signal = controller.subscribe();
        assert!(!signal.is_cancelled());

        controller.trigger();
        timeout(Duration::from_millis(100), signal.cancelled())
            .await
            .expect("signal should resolve");
        assert!(signal.is_cancelled());
        assert!(controller.is_triggered());
    }

    #[tokio::test]
    async fn subscribers_created_after_trigger_see_it() {
        let controller = ShutdownController::new();
        controller.trigger();

        let mut signal = controller.subscribe();
        timeout(Duration::from_millis(100), signal.cancelled())
            .await
            .expect("signal should resolve");
    }

    #[tokio::test]
    async fn dropped_controller_counts_as_cancelled() {
        let controller = ShutdownController::new();
        let mut signal = controller.subscribe();
        drop(controller);

        timeout(Duration::from_millis(100), signal.cancelled())
            .await
            .expect("signal should resolve");
    }

    #[tokio::test]
    async fn trigger_is_idempotent() {
        let controller = ShutdownController::new();
        let mut signal = controller.subscribe();

        controller.trigger();
        controller.trigger();
        signal.cancelled().await;
        signal.cancelled().await;
    }
}

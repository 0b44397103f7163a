//! Shutdown coordination for a serving generation.

use tokio::sync::watch;

/// Broadcasts "stop accepting, start draining" to serving tasks.
///
/// Backed by a watch channel so that subscribers created after the trigger
/// still observe it.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// A future resolving once [`trigger`](Self::trigger) has been called.
    pub fn signaled(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            loop {
                let stopped = *rx.borrow_and_update();
                // Err means the sender is gone, which also ends the generation.
                if stopped || rx.changed().await.is_err() {
                    return;
                }
            }
        }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

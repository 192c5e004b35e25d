//! Trailing-edge debounce for one-shot work such as grid packing.
//!
//! Every [`Debouncer::trigger`] restarts the quiet window; the action runs
//! once the window elapses with no further triggers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct Debouncer {
    notify: Arc<Notify>,
}

impl Debouncer {
    /// Spawn the debounce task. It runs until `cancel` fires.
    pub fn spawn<F, Fut>(window: Duration, cancel: CancellationToken, mut action: F) -> (Self, JoinHandle<()>)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let notify = Arc::new(Notify::new());
        let waiter = notify.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = waiter.notified() => {}
                }
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = waiter.notified() => continue,
                        _ = tokio::time::sleep(window) => break,
                    }
                }
                action().await;
            }
        });

        (Self { notify }, handle)
    }

    pub fn trigger(&self) {
        self.notify.notify_one();
    }
}

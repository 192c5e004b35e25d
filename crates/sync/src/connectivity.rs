//! The online/offline signal the sync manager subscribes to.
//!
//! Backed by a `tokio::sync::watch` channel: subscribers always see the
//! latest state and are woken only on real transitions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use fieldboard_client::LayoutBackend;

#[derive(Debug, Clone)]
pub struct Connectivity {
    sender: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Set the current state. Returns `true` if this was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            tracing::info!(online, "Connectivity changed");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Probe `GET /health` every `interval` and feed the result into
/// `connectivity` until `cancel` fires.
pub async fn probe_loop(
    backend: Arc<dyn LayoutBackend>,
    connectivity: Connectivity,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Connectivity probe stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        let online = match backend.health().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Health probe failed");
                false
            }
        };
        connectivity.set_online(online);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_transitions_notify() {
        let c = Connectivity::new(false);
        let mut rx = c.subscribe();

        assert!(!c.set_online(false));
        assert!(!rx.has_changed().unwrap());

        assert!(c.set_online(true));
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        assert!(c.is_online());
    }
}

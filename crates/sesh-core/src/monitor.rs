//! Server reachability monitor.
//!
//! Probes the server once immediately and then on a fixed interval,
//! publishing the result on a `watch` channel. Purely observational: nothing
//! else is gated on the status.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::executor::HealthProbe;

/// Default interval between probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Last observed server status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No probe has completed yet.
    #[default]
    Unknown,
    Connected,
    Offline,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Checking...",
            Self::Connected => "Connected",
            Self::Offline => "Offline",
        }
    }
}

impl From<bool> for ConnectionStatus {
    fn from(reachable: bool) -> Self {
        if reachable { Self::Connected } else { Self::Offline }
    }
}

/// Handle to a running monitor task. Dropping it stops the task.
#[derive(Debug)]
pub struct ConnectionMonitor {
    status: watch::Receiver<ConnectionStatus>,
    handle: JoinHandle<()>,
}

impl ConnectionMonitor {
    /// Start probing with `probe` every `interval`, beginning immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<P>(probe: Arc<P>, interval: Duration) -> Self
    where
        P: HealthProbe + 'static,
    {
        let (tx, status) = watch::channel(ConnectionStatus::Unknown);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let next = ConnectionStatus::from(probe.probe().await);
                let changed = tx.send_if_modified(|current| {
                    let changed = *current != next;
                    *current = next;
                    changed
                });
                if changed {
                    info!(status = next.label(), "connection status changed");
                } else {
                    debug!(status = next.label(), "connection probe");
                }
                if tx.is_closed() {
                    break;
                }
            }
        });

        Self { status, handle }
    }

    /// Current status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// A receiver that can be awaited for status changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, Default)]
    struct FlakyProbe {
        up: AtomicBool,
        probes: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl HealthProbe for FlakyProbe {
        async fn probe(&self) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.up.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_should_probe_immediately_on_start() {
        let probe = Arc::new(FlakyProbe::default());
        probe.up.store(true, Ordering::SeqCst);

        let monitor = ConnectionMonitor::spawn(Arc::clone(&probe), Duration::from_secs(60));
        let mut rx = monitor.subscribe();
        rx.changed().await.expect("should publish first status");

        assert_eq!(monitor.status(), ConnectionStatus::Connected);
        assert_eq!(probe.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_should_follow_status_changes() {
        let probe = Arc::new(FlakyProbe::default());
        let monitor = ConnectionMonitor::spawn(Arc::clone(&probe), Duration::from_millis(10));
        let mut rx = monitor.subscribe();

        rx.changed().await.expect("should publish");
        assert_eq!(*rx.borrow_and_update(), ConnectionStatus::Offline);

        probe.up.store(true, Ordering::SeqCst);
        rx.changed().await.expect("should publish");
        assert_eq!(*rx.borrow_and_update(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_should_stop_probing_when_dropped() {
        let probe = Arc::new(FlakyProbe::default());
        let monitor = ConnectionMonitor::spawn(Arc::clone(&probe), Duration::from_millis(5));
        let mut rx = monitor.subscribe();
        rx.changed().await.expect("should publish");
        drop(monitor);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_drop = probe.probes.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(probe.probes.load(Ordering::SeqCst), after_drop);
    }

    #[test]
    fn test_should_label_statuses() {
        assert_eq!(ConnectionStatus::from(true), ConnectionStatus::Connected);
        assert_eq!(ConnectionStatus::from(false).label(), "Offline");
        assert_eq!(ConnectionStatus::default().label(), "Checking...");
    }
}

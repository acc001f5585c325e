//! Per-route pause latch and response delay.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::watch;

/// Holds requests of a route until it is resumed.
///
/// The latch is a `watch` channel carrying "open"; waiters subscribe and
/// wait for it to become `true`, so resuming wakes all of them at once.
#[derive(Debug)]
pub struct Gate {
    open: watch::Sender<bool>,
    delay: Mutex<Duration>,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    pub fn new() -> Self {
        let (open, _) = watch::channel(true);
        Self {
            open,
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn pause(&self) {
        self.open.send_replace(false);
    }

    pub fn resume(&self) {
        self.open.send_replace(true);
    }

    pub fn is_paused(&self) -> bool {
        !*self.open.borrow()
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn delay(&self) -> Duration {
        *self.delay.lock()
    }

    /// Sleep for the configured delay, then wait while the route is paused.
    pub async fn wait_until_ready(&self) {
        let delay = self.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut rx = self.open.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|open| *open).await;
    }
}

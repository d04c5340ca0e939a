// ABOUTME: Injectable time source for the gateway engine
// ABOUTME: Real clock wraps tokio::time; virtual clock drives deterministic tests

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// A source of time the gateway depends on, so tests can drive throttle
/// probes, TPS windows, and enquire_link timeouts without sleeping.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

/// Real-time clock backed by `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug)]
struct VirtualClockState {
    now: Instant,
}

/// A manually-advanced clock for tests. `sleep` resolves only once `advance`
/// has moved the clock past the requested deadline.
#[derive(Clone)]
pub struct VirtualClock {
    state: Arc<Mutex<VirtualClockState>>,
    notify: Arc<Notify>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(VirtualClockState {
                now: Instant::now(),
            })),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Advance the clock and wake any sleepers whose deadline has passed.
    pub fn advance(&self, duration: Duration) {
        {
            let mut state = self.state.lock().expect("virtual clock poisoned");
            state.now += duration;
        }
        self.notify.notify_waiters();
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        self.state.lock().expect("virtual clock poisoned").now
    }

    async fn sleep(&self, duration: Duration) {
        let deadline = self.now() + duration;
        loop {
            if self.now() >= deadline {
                return;
            }
            let notified = self.notify.notified();
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn virtual_clock_sleep_resolves_after_advance() {
        let clock = VirtualClock::new();
        let sleeper = clock.clone();
        let task = tokio::spawn(async move {
            sleeper.sleep(Duration::from_secs(5)).await;
        });

        tokio::task::yield_now().await;
        clock.advance(Duration::from_secs(2));
        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        clock.advance(Duration::from_secs(3));
        task.await.expect("sleeper task panicked");
    }

    #[tokio::test]
    async fn system_clock_sleep_returns() {
        let clock = SystemClock;
        clock.sleep(Duration::from_millis(1)).await;
    }
}

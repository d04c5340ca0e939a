// ABOUTME: Dual-gate outbound throttle: TPS window plus SMSC-response-driven backoff
// ABOUTME: Both gates share one latch that pauses the external bus consumer while set

use crate::datatypes::CommandStatus;
use crate::gateway::bus::BusConnector;
use crate::gateway::clock::Clock;
use crate::gateway::types::OutboundMessage;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct TpsWindow {
    started_at: Instant,
    count: u32,
}

struct ThrottleState {
    /// Response-driven defers (ESME_RTHROTTLED/ESME_RMSGQFUL), drained one at
    /// a time every `throttle_delay` by `run_probe_loop`.
    retry_queue: VecDeque<OutboundMessage>,
    /// TPS-window overflow, released in bulk at the next 1-second window
    /// boundary by `run_tps_release_loop`, independent of `throttle_delay`.
    tps_queue: VecDeque<OutboundMessage>,
    window: TpsWindow,
}

/// Whether a message was cleared for emission or must wait.
pub enum Admission {
    Admit(OutboundMessage),
    Held,
}

/// Gates outbound SubmitSm emission per the two conditions in the design:
/// an `mt_tps` ceiling within the current second, and SMSC-reported
/// throttle/queue-full responses that pause retries for `throttle_delay`.
pub struct Throttler<C: Clock, B: BusConnector> {
    clock: Arc<C>,
    bus: Arc<B>,
    mt_tps: Option<u32>,
    throttle_delay: Duration,
    throttled: AtomicBool,
    state: Mutex<ThrottleState>,
}

impl<C: Clock, B: BusConnector> Throttler<C, B> {
    pub fn new(clock: Arc<C>, bus: Arc<B>, mt_tps: Option<u32>, throttle_delay: Duration) -> Self {
        let started_at = clock.now();
        Self {
            clock,
            bus,
            mt_tps,
            throttle_delay,
            throttled: AtomicBool::new(false),
            state: Mutex::new(ThrottleState {
                retry_queue: VecDeque::new(),
                tps_queue: VecDeque::new(),
                window: TpsWindow {
                    started_at,
                    count: 0,
                },
            }),
        }
    }

    pub fn is_throttled(&self) -> bool {
        self.throttled.load(Ordering::SeqCst)
    }

    fn set_throttled(&self, value: bool) {
        let was = self.throttled.swap(value, Ordering::SeqCst);
        if was != value {
            if value {
                self.bus.pause();
            } else {
                self.bus.resume();
                tracing::info!("No longer throttling outbound");
            }
        }
    }

    /// TPS gate: admits `msg` unless more than `mt_tps` messages have already
    /// passed through in the current 1-second window, in which case it is
    /// queued for bulk release at the next window boundary by
    /// `run_tps_release_loop`.
    pub async fn admit(&self, msg: OutboundMessage) -> Admission {
        let Some(limit) = self.mt_tps else {
            return Admission::Admit(msg);
        };

        let now = self.clock.now();
        let mut state = self.state.lock().await;
        if now.duration_since(state.window.started_at) >= Duration::from_secs(1) {
            state.window.started_at = now;
            state.window.count = 0;
        }

        if state.window.count >= limit {
            state.tps_queue.push_back(msg);
            drop(state);
            self.set_throttled(true);
            return Admission::Held;
        }

        state.window.count += 1;
        Admission::Admit(msg)
    }

    /// Response-driven gate: call when a SubmitSmResp comes back
    /// ESME_RTHROTTLED or ESME_RMSGQFUL. Requeues at the head so it is the
    /// next message the probe loop retries.
    pub async fn defer(&self, msg: OutboundMessage) {
        self.state.lock().await.retry_queue.push_front(msg);
        self.set_throttled(true);
    }

    /// Runs until cancelled. Every `throttle_delay`, retries one queued
    /// message via `resend`; lifts the latch once both queues have been
    /// empty for a full cycle.
    pub async fn run_probe_loop<F, Fut>(&self, mut resend: F)
    where
        F: FnMut(OutboundMessage) -> Fut,
        Fut: Future<Output = CommandStatus>,
    {
        loop {
            self.clock.sleep(self.throttle_delay).await;

            let next = self.state.lock().await.retry_queue.pop_front();
            match next {
                None => {
                    let tps_empty = self.state.lock().await.tps_queue.is_empty();
                    if tps_empty && self.is_throttled() {
                        self.set_throttled(false);
                    }
                }
                Some(msg) => {
                    let status = resend(msg.clone()).await;
                    if matches!(
                        status,
                        CommandStatus::ThrottlingError | CommandStatus::MessageQueueFull
                    ) {
                        self.state.lock().await.retry_queue.push_front(msg);
                        self.set_throttled(true);
                    }
                }
            }
        }
    }

    /// Runs until cancelled. Wakes once per second and releases every
    /// message the TPS gate queued during the second that just elapsed, all
    /// at once, independent of `throttle_delay` (which only paces the
    /// response-driven gate above).
    pub async fn run_tps_release_loop<F, Fut>(&self, mut resend: F)
    where
        F: FnMut(OutboundMessage) -> Fut,
        Fut: Future<Output = CommandStatus>,
    {
        loop {
            self.clock.sleep(Duration::from_secs(1)).await;

            let drained: Vec<OutboundMessage> = {
                let mut state = self.state.lock().await;
                state.tps_queue.drain(..).collect()
            };

            for msg in drained {
                let status = resend(msg.clone()).await;
                if matches!(
                    status,
                    CommandStatus::ThrottlingError | CommandStatus::MessageQueueFull
                ) {
                    self.state.lock().await.tps_queue.push_back(msg);
                }
            }

            let state = self.state.lock().await;
            let both_empty = state.tps_queue.is_empty() && state.retry_queue.is_empty();
            drop(state);
            if both_empty && self.is_throttled() {
                self.set_throttled(false);
            }
        }
    }
}

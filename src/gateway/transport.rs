// ABOUTME: Connect/bind/run/disconnect lifecycle, wiring Session, Stash, MO/MT, Throttler, and
// ABOUTME: bus into one running transport; reconnects with exponential backoff on tear-down

use crate::codec::Frame;
use crate::gateway::bus::{BusConnector, BusPublisher};
use crate::gateway::charset::CharsetTable;
use crate::gateway::clock::Clock;
use crate::gateway::config::GatewayConfig;
use crate::gateway::mo::MoProcessor;
use crate::gateway::mt::MtProcessor;
use crate::gateway::session::{Session, SessionError};
use crate::gateway::stash::MessageStash;
use crate::gateway::throttle::Throttler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const STATE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

fn submit_sm_expiry(config: &GatewayConfig) -> Duration {
    Duration::from_secs(config.submit_sm_expiry_secs)
}

fn third_party_id_expiry(config: &GatewayConfig) -> Duration {
    Duration::from_secs(config.third_party_id_expiry_secs)
}

fn multipart_expiry(config: &GatewayConfig) -> Duration {
    Duration::from_secs(config.multipart_expiry_secs)
}

fn throttle_delay(config: &GatewayConfig) -> Duration {
    Duration::from_secs(config.throttle_delay_secs)
}

/// Owns one SMSC connection's lifecycle. Constructed once per configured
/// transport and run for the lifetime of the gateway process.
pub struct TransportService<C: Clock, S: MessageStash, B: BusPublisher + BusConnector> {
    config: GatewayConfig,
    clock: Arc<C>,
    stash: Arc<S>,
    bus: Arc<B>,
    charset: CharsetTable,
}

impl<C: Clock, S: MessageStash + 'static, B: BusPublisher + BusConnector + 'static> TransportService<C, S, B> {
    pub fn new(config: GatewayConfig, clock: Arc<C>, stash: Arc<S>, bus: Arc<B>, charset: CharsetTable) -> Self {
        Self {
            config,
            clock,
            stash,
            bus,
            charset,
        }
    }

    /// Runs until cancelled. Never returns on its own: a dropped connection
    /// is always followed by a reconnect attempt after a backoff delay.
    pub async fn run(&self) {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match self.run_once().await {
                Ok(()) => {
                    // `run_once` only returns Ok after a clean bind followed by
                    // eventual disconnection; reset backoff for the next attempt.
                    backoff = INITIAL_BACKOFF;
                }
                Err(e) => {
                    tracing::warn!(
                        transport = %self.config.transport_name,
                        error = %e,
                        "failed to connect/bind, retrying after backoff"
                    );
                }
            }

            self.bus.pause();
            self.clock.sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    async fn run_once(&self) -> Result<(), SessionError> {
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<Frame>();
        let session = Session::connect_and_bind(
            &self.config,
            self.clock.clone(),
            RESPONSE_TIMEOUT,
            inbound_tx,
        )
        .await?;

        tracing::info!(transport = %self.config.transport_name, "bound to SMSC");
        self.bus.resume();

        let throttler = Arc::new(Throttler::new(
            self.clock.clone(),
            self.bus.clone(),
            self.config.mt_tps,
            throttle_delay(&self.config),
        ));

        let mo = Arc::new(MoProcessor::new(
            self.stash.clone(),
            self.bus.clone(),
            self.charset.clone(),
            self.config.transport_name.clone(),
            multipart_expiry(&self.config),
        ));

        let mt = Arc::new(MtProcessor::new(
            session.clone(),
            self.stash.clone(),
            throttler.clone(),
            self.bus.clone(),
            self.config.submit_processor.clone(),
            submit_sm_expiry(&self.config),
        ));

        let keepalive = tokio::spawn(session.clone().run_keepalive(KEEPALIVE_INTERVAL));

        let probe_throttler = throttler.clone();
        let probe_mt = mt.clone();
        let probe_loop = tokio::spawn(async move {
            probe_throttler
                .run_probe_loop(|msg| {
                    let mt = probe_mt.clone();
                    async move { mt.resend(msg).await }
                })
                .await;
        });

        let tps_throttler = throttler.clone();
        let tps_mt = mt.clone();
        let tps_release_loop = tokio::spawn(async move {
            tps_throttler
                .run_tps_release_loop(|msg| {
                    let mt = tps_mt.clone();
                    async move { mt.resend(msg).await }
                })
                .await;
        });

        let mo_dispatch = tokio::spawn(async move {
            while let Some(frame) = inbound_rx.recv().await {
                if let Frame::DeliverSm(pdu) = frame {
                    mo.handle(*pdu).await;
                }
            }
        });

        let consumer_bus = self.bus.clone();
        let consumer_mt = mt.clone();
        let outbound_consumer = tokio::spawn(async move {
            while let Some(msg) = consumer_bus.recv().await {
                if let Err(e) = consumer_mt.send(msg).await {
                    tracing::error!(error = %e, "failed to process outbound message");
                }
            }
        });

        while session.state().is_bound() {
            self.clock.sleep(STATE_POLL_INTERVAL).await;
        }

        keepalive.abort();
        probe_loop.abort();
        tps_release_loop.abort();
        mo_dispatch.abort();
        outbound_consumer.abort();
        self.bus.pause();

        tracing::warn!(transport = %self.config.transport_name, "session disconnected");
        Ok(())
    }
}

// ABOUTME: SMPP session state machine: bind lifecycle, sequence allocation, request/response
// ABOUTME: correlation robust to out-of-order responses, and enquire_link keepalive

use crate::codec::{CodecError, Encodable, Frame};
use crate::datatypes::{
    AddressRange, BindReceiver, BindTransceiver, BindTransmitter, CommandStatus,
    InterfaceVersion, NumericPlanIndicator, Password, SystemId, SystemType, TypeOfNumber,
};
use crate::gateway::clock::Clock;
use crate::gateway::config::{BindMode, GatewayConfig};
use bytes::{Buf, Bytes, BytesMut};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol decode error: {0}")]
    Codec(#[from] CodecError),
    #[error("bind rejected by peer: {0:?}")]
    BindRejected(CommandStatus),
    #[error("no response within the configured window")]
    Timeout,
    #[error("session tore down before a response arrived")]
    Cancelled,
    #[error("frame cannot be sent on the wire: {0}")]
    NotSendable(&'static str),
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Disconnected = 0,
    Connected = 1,
    BoundTx = 2,
    BoundRx = 3,
    BoundTrx = 4,
    Unbinding = 5,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SessionState::Connected,
            2 => SessionState::BoundTx,
            3 => SessionState::BoundRx,
            4 => SessionState::BoundTrx,
            5 => SessionState::Unbinding,
            _ => SessionState::Disconnected,
        }
    }

    pub fn is_bound(self) -> bool {
        matches!(
            self,
            SessionState::BoundTx | SessionState::BoundRx | SessionState::BoundTrx
        )
    }
}

fn encode_frame(frame: &Frame) -> SessionResult<Bytes> {
    Ok(match frame {
        Frame::EnquireLink(pdu) => pdu.to_bytes(),
        Frame::EnquireLinkResp(pdu) => pdu.to_bytes(),
        Frame::Unbind(pdu) => pdu.to_bytes(),
        Frame::UnbindResp(pdu) => pdu.to_bytes(),
        Frame::BindReceiver(pdu) => pdu.to_bytes(),
        Frame::BindTransceiver(pdu) => pdu.to_bytes(),
        Frame::BindTransmitter(pdu) => pdu.to_bytes(),
        Frame::SubmitSm(pdu) => pdu.as_ref().to_bytes(),
        Frame::DeliverSmResp(pdu) => pdu.to_bytes(),
        Frame::GenericNack(pdu) => pdu.to_bytes(),
        _ => return Err(SessionError::NotSendable("frame type not sent by this gateway")),
    })
}

async fn read_one_frame(
    read_half: &mut OwnedReadHalf,
    buffer: &mut BytesMut,
) -> SessionResult<Option<Frame>> {
    loop {
        {
            let mut cursor = Cursor::new(&buffer[..]);
            match Frame::check(&mut cursor) {
                Ok(()) => {
                    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]])
                        as usize;
                    cursor.set_position(0);
                    let frame = Frame::parse(&mut cursor)?;
                    buffer.advance(len);
                    return Ok(Some(frame));
                }
                Err(CodecError::Incomplete) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if read_half.read_buf(buffer).await? == 0 {
            return if buffer.is_empty() {
                Ok(None)
            } else {
                Err(SessionError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset by peer mid-frame",
                )))
            };
        }
    }
}

/// One bound (or binding) connection to the SMSC peer. Owns the write half of
/// the socket; the read half lives inside the spawned reader task.
pub struct Session<C: Clock> {
    clock: Arc<C>,
    write_half: Mutex<OwnedWriteHalf>,
    state: AtomicU8,
    next_seq: AtomicU32,
    pending: Mutex<HashMap<u32, oneshot::Sender<Frame>>>,
    response_timeout: Duration,
}

impl<C: Clock> Session<C> {
    /// Connects, binds per `config.bind_type`, and spawns the reader task.
    /// Inbound requests from the peer (currently only deliver_sm) are
    /// forwarded on `inbound_tx` for the MO pipeline to process.
    pub async fn connect_and_bind(
        config: &GatewayConfig,
        clock: Arc<C>,
        response_timeout: Duration,
        inbound_tx: mpsc::UnboundedSender<Frame>,
    ) -> SessionResult<Arc<Self>> {
        let stream = TcpStream::connect((config.host.as_str(), config.port)).await?;
        let (read_half, write_half) = stream.into_split();

        let session = Arc::new(Session {
            clock,
            write_half: Mutex::new(write_half),
            state: AtomicU8::new(SessionState::Connected as u8),
            next_seq: AtomicU32::new(0),
            pending: Mutex::new(HashMap::new()),
            response_timeout,
        });

        session.clone().spawn_reader(read_half, inbound_tx);
        session.bind(config).await?;
        Ok(session)
    }

    /// Builds an already-bound session directly over a connected stream,
    /// skipping the handshake. For tests that need a real socket pair but
    /// don't care about bind semantics.
    #[cfg(test)]
    pub fn for_tests(
        clock: Arc<C>,
        stream: TcpStream,
        response_timeout: Duration,
        inbound_tx: mpsc::UnboundedSender<Frame>,
    ) -> Arc<Self> {
        let (read_half, write_half) = stream.into_split();
        let session = Arc::new(Session {
            clock,
            write_half: Mutex::new(write_half),
            state: AtomicU8::new(SessionState::BoundTrx as u8),
            next_seq: AtomicU32::new(0),
            pending: Mutex::new(HashMap::new()),
            response_timeout,
        });
        session.clone().spawn_reader(read_half, inbound_tx);
        session
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Allocates the next sequence number, wrapping past 2^31-1 back to 1.
    pub fn next_sequence_number(&self) -> u32 {
        let prev = self
            .next_seq
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                Some(if cur >= 0x7FFF_FFFF { 1 } else { cur + 1 })
            })
            .expect("update closure always returns Some");
        if prev >= 0x7FFF_FFFF { 1 } else { prev + 1 }
    }

    async fn write_frame(&self, frame: &Frame) -> SessionResult<()> {
        let bytes = encode_frame(frame)?;
        let mut guard = self.write_half.lock().await;
        guard.write_all(&bytes).await?;
        guard.flush().await?;
        Ok(())
    }

    /// Sends a request built from a freshly-allocated sequence number and
    /// awaits its correlated response, or a timeout.
    pub async fn send_request(
        &self,
        build: impl FnOnce(u32) -> Frame,
    ) -> SessionResult<Frame> {
        let seq = self.next_sequence_number();
        self.send_request_with_seq(seq, build(seq)).await
    }

    /// Same as `send_request`, but for callers that must allocate the
    /// sequence number themselves before building the frame (for example to
    /// record it elsewhere ahead of the write).
    pub async fn send_request_with_seq(&self, seq: u32, frame: Frame) -> SessionResult<Frame> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(seq, tx);

        if let Err(e) = self.write_frame(&frame).await {
            self.pending.lock().await.remove(&seq);
            return Err(e);
        }

        tokio::select! {
            res = rx => res.map_err(|_| SessionError::Cancelled),
            () = self.clock.sleep(self.response_timeout) => {
                self.pending.lock().await.remove(&seq);
                Err(SessionError::Timeout)
            }
        }
    }

    /// Replies to an inbound request with the *same* sequence number, per the
    /// correlation contract. Used for deliver_sm_resp.
    pub async fn reply(&self, frame: Frame) -> SessionResult<()> {
        self.write_frame(&frame).await
    }

    async fn bind(self: &Arc<Self>, config: &GatewayConfig) -> SessionResult<()> {
        let system_id = SystemId::from(config.system_id.as_str());
        let password = if config.password.is_empty() {
            None
        } else {
            Some(Password::from(config.password.as_str()))
        };
        let system_type = SystemType::from(config.system_type.as_str());
        let address_range = AddressRange::from(config.address_range.as_str());
        let interface_version = if config.interface_version == "34" {
            InterfaceVersion::SmppV34
        } else {
            InterfaceVersion::SmppV33
        };

        let response = match config.bind_type {
            BindMode::Transmitter => {
                self.send_request(|seq| {
                    Frame::BindTransmitter(BindTransmitter {
                        command_status: CommandStatus::Ok,
                        sequence_number: seq,
                        system_id,
                        password,
                        system_type,
                        interface_version,
                        addr_ton: TypeOfNumber::Unknown,
                        addr_npi: NumericPlanIndicator::Unknown,
                        address_range,
                    })
                })
                .await?
            }
            BindMode::Receiver => {
                self.send_request(|seq| {
                    Frame::BindReceiver(BindReceiver {
                        command_status: CommandStatus::Ok,
                        sequence_number: seq,
                        system_id,
                        password,
                        system_type,
                        interface_version,
                        addr_ton: TypeOfNumber::Unknown,
                        addr_npi: NumericPlanIndicator::Unknown,
                        address_range,
                    })
                })
                .await?
            }
            BindMode::Transceiver => {
                self.send_request(|seq| {
                    Frame::BindTransceiver(BindTransceiver {
                        command_status: CommandStatus::Ok,
                        sequence_number: seq,
                        system_id,
                        password,
                        system_type,
                        interface_version,
                        addr_ton: TypeOfNumber::Unknown,
                        addr_npi: NumericPlanIndicator::Unknown,
                        address_range,
                    })
                })
                .await?
            }
        };

        let status = match &response {
            Frame::BindTransmitterResp(r) => r.command_status,
            Frame::BindReceiverResp(r) => r.command_status,
            Frame::BindTransceiverResp(r) => r.command_status,
            _ => return Err(SessionError::NotSendable("unexpected bind response frame")),
        };

        if status != CommandStatus::Ok {
            return Err(SessionError::BindRejected(status));
        }

        self.set_state(match config.bind_type {
            BindMode::Transmitter => SessionState::BoundTx,
            BindMode::Receiver => SessionState::BoundRx,
            BindMode::Transceiver => SessionState::BoundTrx,
        });
        Ok(())
    }

    /// Sends unbind, waits (bounded) for the response, and marks the session
    /// disconnected regardless of whether the peer answered in time.
    pub async fn unbind(&self) -> SessionResult<()> {
        self.set_state(SessionState::Unbinding);
        let result = self
            .send_request(|seq| {
                Frame::Unbind(crate::datatypes::Unbind {
                    command_status: CommandStatus::Ok,
                    sequence_number: seq,
                })
            })
            .await;
        self.set_state(SessionState::Disconnected);
        result.map(|_| ())
    }

    fn spawn_reader(self: Arc<Self>, mut read_half: OwnedReadHalf, inbound_tx: mpsc::UnboundedSender<Frame>) {
        tokio::spawn(async move {
            let mut buffer = BytesMut::with_capacity(4 * 1024);
            loop {
                match read_one_frame(&mut read_half, &mut buffer).await {
                    Ok(Some(frame)) => self.dispatch_inbound(frame, &inbound_tx).await,
                    Ok(None) => {
                        tracing::warn!("SMPP peer closed the connection");
                        self.cancel_all_pending().await;
                        self.set_state(SessionState::Disconnected);
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "error reading from SMPP peer, tearing down session");
                        self.cancel_all_pending().await;
                        self.set_state(SessionState::Disconnected);
                        break;
                    }
                }
            }
        });
    }

    async fn cancel_all_pending(&self) {
        let mut pending = self.pending.lock().await;
        for (_, tx) in pending.drain() {
            let _ = tx; // dropping the sender fails the matching receiver with Cancelled
        }
    }

    async fn dispatch_inbound(&self, frame: Frame, inbound_tx: &mpsc::UnboundedSender<Frame>) {
        let seq = frame.sequence_number();

        let is_response = matches!(
            frame,
            Frame::BindTransmitterResp(_)
                | Frame::BindReceiverResp(_)
                | Frame::BindTransceiverResp(_)
                | Frame::SubmitSmResp(_)
                | Frame::UnbindResp(_)
                | Frame::EnquireLinkResp(_)
        );

        if is_response {
            let waiter = self.pending.lock().await.remove(&seq);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(frame);
                }
                None => {
                    tracing::warn!(seq, "response for unknown sequence number discarded");
                }
            }
            return;
        }

        match frame {
            Frame::EnquireLink(pdu) => {
                let reply = Frame::EnquireLinkResp(crate::datatypes::EnquireLinkResponse {
                    sequence_number: pdu.sequence_number,
                });
                if let Err(e) = self.write_frame(&reply).await {
                    tracing::warn!(error = %e, "failed to reply to peer enquire_link");
                }
            }
            Frame::DeliverSm(_) => {
                let _ = inbound_tx.send(frame);
            }
            other => {
                tracing::debug!(command_id = ?other.command_id(), "unhandled inbound PDU");
            }
        }
    }

    /// Issues enquire_link at `interval`; tears down the session if a
    /// response does not arrive within `interval` of sending.
    pub async fn run_keepalive(self: Arc<Self>, interval: Duration) {
        loop {
            self.clock.sleep(interval).await;
            if !self.state().is_bound() {
                continue;
            }
            let result = self
                .send_request(|seq| {
                    Frame::EnquireLink(crate::datatypes::EnquireLink {
                        sequence_number: seq,
                    })
                })
                .await;
            if result.is_err() {
                tracing::warn!("enquire_link timed out, tearing down session");
                self.cancel_all_pending().await;
                self.set_state(SessionState::Disconnected);
                return;
            }
        }
    }
}

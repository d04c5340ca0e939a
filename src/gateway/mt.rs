// ABOUTME: Mobile-terminated pipeline: encodes, segments, and emits outbound messages
// ABOUTME: as one or more submit_sm PDUs, then aggregates their responses

use crate::codec::Frame;
use crate::datatypes::tlv::tags;
use crate::datatypes::{CommandStatus, SubmitSm, Tlv};
use crate::gateway::bus::{BusConnector, BusPublisher};
use crate::gateway::charset::Codec;
use crate::gateway::clock::Clock;
use crate::gateway::config::ProcessorConfig;
use crate::gateway::session::{Session, SessionError};
use crate::gateway::stash::{MessageStash, StashError};
use crate::gateway::throttle::{Admission, Throttler};
use crate::gateway::types::{BusRecord, EventType, OutboundMessage, SessionEvent, TransportType};
use bytes::Bytes;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

const SINGLE_SEGMENT_MAX: usize = 254;
const SAR_SEGMENT_MAX: usize = 140;
const UDH_SEGMENT_MAX: usize = 134;

#[derive(Debug, Error)]
pub enum MtError {
    #[error("unknown submit_sm_encoding {0:?}")]
    UnknownEncoding(String),
    #[error("stash error: {0}")]
    Stash(#[from] StashError),
}

pub type MtResult<T> = Result<T, MtError>;

enum MtSegmentError {
    Session(SessionError),
    Throttled,
    Rejected(CommandStatus),
    /// Response carried no usable command_status/message_id, per the
    /// "Unspecified" nack reason in the error-handling table.
    Unspecified,
}

#[derive(Clone, Copy)]
enum Framing {
    Single,
    Payload,
    Sar { ref_num: u16, total: u8, seq: u8 },
    Udh { ref_num: u8, total: u8, seq: u8 },
}

struct SegmentPlan {
    body: Vec<u8>,
    framing: Framing,
}

fn plan_segments(body: Vec<u8>, config: &ProcessorConfig) -> Vec<SegmentPlan> {
    if body.len() <= SINGLE_SEGMENT_MAX {
        return vec![SegmentPlan {
            body,
            framing: Framing::Single,
        }];
    }

    if config.send_long_messages {
        return vec![SegmentPlan {
            body,
            framing: Framing::Payload,
        }];
    }

    if config.send_multipart_sar {
        let ref_num = rand::thread_rng().gen::<u16>();
        let chunks: Vec<Vec<u8>> = body.chunks(SAR_SEGMENT_MAX).map(|c| c.to_vec()).collect();
        let total = chunks.len() as u8;
        return chunks
            .into_iter()
            .enumerate()
            .map(|(i, c)| SegmentPlan {
                body: c,
                framing: Framing::Sar {
                    ref_num,
                    total,
                    seq: (i + 1) as u8,
                },
            })
            .collect();
    }

    if config.send_multipart_udh {
        let ref_num = rand::thread_rng().gen::<u8>();
        let chunks: Vec<Vec<u8>> = body.chunks(UDH_SEGMENT_MAX).map(|c| c.to_vec()).collect();
        let total = chunks.len() as u8;
        return chunks
            .into_iter()
            .enumerate()
            .map(|(i, c)| SegmentPlan {
                body: c,
                framing: Framing::Udh {
                    ref_num,
                    total,
                    seq: (i + 1) as u8,
                },
            })
            .collect();
    }

    tracing::warn!(
        len = body.len(),
        "message exceeds single-segment limit and no segmentation strategy is configured, truncating"
    );
    vec![SegmentPlan {
        body: body[..SINGLE_SEGMENT_MAX].to_vec(),
        framing: Framing::Single,
    }]
}

/// Always 0x02 per the USSD interworking convention this gateway follows;
/// session continuation is carried in its_session_info instead.
const USSD_SERVICE_OP: u8 = 0x02;

/// 2-byte its_session_info encoding: `[0x00, 0x00]` for new/continue,
/// `[0x00, 0x01]` for close.
fn its_session_info_bytes(event: SessionEvent) -> [u8; 2] {
    match event {
        SessionEvent::New | SessionEvent::Continue => [0x00, 0x00],
        SessionEvent::Close => [0x00, 0x01],
    }
}

fn build_base(seq: u32, msg: &OutboundMessage, data_coding: u8) -> SubmitSm {
    use crate::datatypes::DataCoding;
    SubmitSm::builder()
        .sequence_number(seq)
        .source_addr(&msg.from_addr)
        .destination_addr(&msg.to_addr)
        .data_coding(DataCoding::from_byte(data_coding))
        .build()
        .expect("builder-produced submit_sm is always internally consistent")
}

fn apply_framing(pdu: &mut SubmitSm, plan: &SegmentPlan) {
    use crate::datatypes::ShortMessage;
    match plan.framing {
        Framing::Single => {
            pdu.short_message = ShortMessage::new(&plan.body).unwrap_or_default();
            pdu.sm_length = pdu.short_message.len();
        }
        Framing::Payload => {
            pdu.message_payload = Some(Tlv {
                tag: tags::MESSAGE_PAYLOAD,
                length: plan.body.len() as u16,
                value: Bytes::from(plan.body.clone()),
            });
            pdu.short_message = ShortMessage::default();
            pdu.sm_length = 0;
        }
        Framing::Sar { ref_num, total, seq } => {
            pdu.short_message = ShortMessage::new(&plan.body).unwrap_or_default();
            pdu.sm_length = pdu.short_message.len();
            pdu.sar_msg_ref_num = Some(Tlv {
                tag: tags::SAR_MSG_REF_NUM,
                length: 2,
                value: Bytes::copy_from_slice(&ref_num.to_be_bytes()),
            });
            pdu.sar_total_segments = Some(Tlv {
                tag: tags::SAR_TOTAL_SEGMENTS,
                length: 1,
                value: Bytes::copy_from_slice(&[total]),
            });
            pdu.sar_segment_seqnum = Some(Tlv {
                tag: tags::SAR_SEGMENT_SEQNUM,
                length: 1,
                value: Bytes::copy_from_slice(&[seq]),
            });
        }
        Framing::Udh { ref_num, total, seq } => {
            let mut full = Vec::with_capacity(6 + plan.body.len());
            full.extend_from_slice(&[0x05, 0x00, 0x03, ref_num, total, seq]);
            full.extend_from_slice(&plan.body);
            pdu.short_message = ShortMessage::new(&full).unwrap_or_default();
            pdu.sm_length = pdu.short_message.len();
            pdu.esm_class = pdu.esm_class.with_udhi();
        }
    }
}

async fn submit_segment<C: Clock, S: MessageStash>(
    session: Arc<Session<C>>,
    stash: Arc<S>,
    msg: OutboundMessage,
    plan: SegmentPlan,
    data_coding: u8,
    seq_ttl: Duration,
) -> Result<String, MtSegmentError> {
    let session_event = msg.session_event;
    let transport_is_ussd = matches!(msg.transport_type, TransportType::Ussd);

    // Allocated up front (rather than inside send_request's closure) so the
    // Stash correlation entry exists before the PDU ever reaches the wire.
    let seq = session.next_sequence_number();
    if let Err(e) = stash
        .set_sequence_number_message_id(seq, msg.message_id.clone(), seq_ttl)
        .await
    {
        tracing::error!(error = %e, seq, "stash write failed ahead of submit_sm");
    }

    let mut pdu = build_base(seq, &msg, data_coding);
    apply_framing(&mut pdu, &plan);
    if transport_is_ussd {
        pdu.ussd_service_op = Some(Tlv {
            tag: tags::USSD_SERVICE_OP,
            length: 1,
            value: Bytes::copy_from_slice(&[USSD_SERVICE_OP]),
        });
        if let Some(event) = session_event {
            pdu.its_session_info = Some(Tlv {
                tag: tags::ITS_SESSION_INFO,
                length: 2,
                value: Bytes::copy_from_slice(&its_session_info_bytes(event)),
            });
        }
    }

    let response = session
        .send_request_with_seq(seq, Frame::SubmitSm(Box::new(pdu)))
        .await
        .map_err(MtSegmentError::Session)?;

    // The response already resolved via the in-process oneshot above; the
    // Stash entry only exists to correlate a late response arriving after a
    // reconnect drops the oneshot, so it is consumed now regardless.
    let _ = stash.get_sequence_number_message_id(seq).await;

    match response {
        Frame::SubmitSmResp(r) if r.command_status == CommandStatus::Ok => {
            let remote_id = r.message_id.as_str().unwrap_or_default();
            if remote_id.is_empty() {
                Err(MtSegmentError::Unspecified)
            } else {
                Ok(remote_id.to_string())
            }
        }
        Frame::SubmitSmResp(r)
            if matches!(
                r.command_status,
                CommandStatus::ThrottlingError | CommandStatus::MessageQueueFull
            ) =>
        {
            Err(MtSegmentError::Throttled)
        }
        Frame::SubmitSmResp(r) => Err(MtSegmentError::Rejected(r.command_status)),
        _ => Err(MtSegmentError::Unspecified),
    }
}

/// Validates, encodes, segments, and emits one logical outbound message as
/// one or more submit_sm PDUs, then aggregates the responses. `B` must be
/// both the publisher this processor reports to and the connector the
/// shared throttler pauses, since both sides gate the same bus.
pub struct MtProcessor<C, S, B>
where
    C: Clock,
    S: MessageStash,
    B: BusPublisher + BusConnector,
{
    session: Arc<Session<C>>,
    stash: Arc<S>,
    throttler: Arc<Throttler<C, B>>,
    bus: Arc<B>,
    config: ProcessorConfig,
    submit_sm_expiry: Duration,
}

impl<C, S, B> MtProcessor<C, S, B>
where
    C: Clock,
    S: MessageStash,
    B: BusPublisher + BusConnector,
{
    pub fn new(
        session: Arc<Session<C>>,
        stash: Arc<S>,
        throttler: Arc<Throttler<C, B>>,
        bus: Arc<B>,
        config: ProcessorConfig,
        submit_sm_expiry: Duration,
    ) -> Self {
        Self {
            session,
            stash,
            throttler,
            bus,
            config,
            submit_sm_expiry,
        }
    }

    /// Entry point for one logical outbound message. Always resolves (never
    /// propagates segment-level failures to the caller); terminal outcomes
    /// are reported as bus records instead.
    pub async fn send(&self, msg: OutboundMessage) -> MtResult<()> {
        if let Some((field, value)) = msg.invalid_address() {
            self.bus
                .publish(BusRecord::Event {
                    event_type: EventType::Nack,
                    user_message_id: msg.message_id.clone(),
                    sent_message_id: None,
                    nack_reason: Some(format!("Invalid {field}: {value}")),
                    delivery_status: None,
                })
                .await;
            return Ok(());
        }

        match self.throttler.admit(msg).await {
            Admission::Held => Ok(()),
            Admission::Admit(msg) => self.submit(msg).await,
        }
    }

    /// Retries a single previously-held message; used as the throttler's
    /// probe-loop resend callback. Returns the terminal command status so
    /// the probe loop can decide whether to keep holding.
    pub async fn resend(&self, msg: OutboundMessage) -> CommandStatus {
        match self.submit(msg).await {
            Ok(()) => CommandStatus::Ok,
            Err(_) => CommandStatus::SystemError,
        }
    }

    async fn submit(&self, msg: OutboundMessage) -> MtResult<()> {
        let codec = Codec::by_name(&self.config.submit_sm_encoding)
            .ok_or_else(|| MtError::UnknownEncoding(self.config.submit_sm_encoding.clone()))?;
        let body = codec.encode(&msg.content);
        let segments = plan_segments(body, &self.config);
        let total = segments.len();

        let (result_tx, mut result_rx) = mpsc::unbounded_channel();
        for plan in segments {
            let session = self.session.clone();
            let stash = self.stash.clone();
            let msg = msg.clone();
            let tx = result_tx.clone();
            let data_coding = self.config.submit_sm_data_coding;
            let seq_ttl = self.submit_sm_expiry;
            tokio::spawn(async move {
                let result = submit_segment(session, stash, msg, plan, data_coding, seq_ttl).await;
                let _ = tx.send(result);
            });
        }
        drop(result_tx);

        let mut arrival_order = Vec::with_capacity(total);
        for _ in 0..total {
            let result = result_rx
                .recv()
                .await
                .expect("every spawned segment reports exactly once");
            match result {
                Ok(remote_id) => arrival_order.push(remote_id),
                Err(MtSegmentError::Throttled) => {
                    self.throttler.defer(msg).await;
                    return Ok(());
                }
                Err(MtSegmentError::Rejected(status)) => {
                    self.bus
                        .publish(BusRecord::Event {
                            event_type: EventType::Nack,
                            user_message_id: msg.message_id.clone(),
                            sent_message_id: None,
                            nack_reason: Some(format!("{status:?}")),
                            delivery_status: None,
                        })
                        .await;
                    self.bus
                        .publish(BusRecord::Failure {
                            reason: format!("SMSC rejected submit_sm: {status:?}"),
                            message: msg,
                        })
                        .await;
                    return Ok(());
                }
                Err(MtSegmentError::Unspecified) => {
                    self.bus
                        .publish(BusRecord::Event {
                            event_type: EventType::Nack,
                            user_message_id: msg.message_id.clone(),
                            sent_message_id: None,
                            nack_reason: Some("Unspecified".to_string()),
                            delivery_status: None,
                        })
                        .await;
                    self.bus
                        .publish(BusRecord::Failure {
                            reason: "submit_sm_resp carried no command_status or message_id"
                                .to_string(),
                            message: msg,
                        })
                        .await;
                    return Ok(());
                }
                Err(MtSegmentError::Session(e)) => {
                    self.bus
                        .publish(BusRecord::Event {
                            event_type: EventType::Nack,
                            user_message_id: msg.message_id.clone(),
                            sent_message_id: None,
                            nack_reason: Some(format!("session error: {e}")),
                            delivery_status: None,
                        })
                        .await;
                    self.bus
                        .publish(BusRecord::Failure {
                            reason: format!("session error while sending submit_sm: {e}"),
                            message: msg,
                        })
                        .await;
                    return Ok(());
                }
            }
        }

        let joined = arrival_order.join(",");
        self.stash
            .set_remote_message_id(msg.message_id.clone(), joined.clone(), self.submit_sm_expiry)
            .await?;
        self.bus
            .publish(BusRecord::Event {
                event_type: EventType::Ack,
                user_message_id: msg.message_id.clone(),
                sent_message_id: Some(joined),
                nack_reason: None,
                delivery_status: None,
            })
            .await;
        Ok(())
    }
}

// ABOUTME: Mobile-originated pipeline: classifies deliver_sm as delivery report or user
// ABOUTME: message, decodes per data_coding, and reassembles UDH/SAR multipart segments

use crate::datatypes::tlv::tags;
use crate::datatypes::DeliverSm;
use crate::gateway::bus::BusPublisher;
use crate::gateway::charset::CharsetTable;
use crate::gateway::stash::MessageStash;
use crate::gateway::types::{BusRecord, DeliveryStatus, EventType, SessionEvent, TransportType};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

fn delivery_receipt_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"id:(?P<id>\S+) sub:\S+ dlvrd:\S+ submit date:\d+ done date:\d+ stat:(?P<stat>\w+) err:\S+ text:.*",
        )
        .expect("delivery receipt regex is valid")
    })
}

fn trim_cstring(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(pos) => &bytes[..pos],
        None => bytes,
    }
}

struct ParsedDeliveryReport {
    remote_id: String,
    raw_status: String,
}

fn classify_delivery_report(pdu: &DeliverSm) -> Option<ParsedDeliveryReport> {
    // TLV fields win over the regex when both are present.
    if pdu.message_state.is_some() || pdu.receipted_message_id.is_some() {
        let remote_id = pdu
            .receipted_message_id
            .as_ref()
            .map(|tlv| String::from_utf8_lossy(trim_cstring(&tlv.value)).to_string())
            .unwrap_or_default();
        let raw_status = pdu
            .message_state
            .as_ref()
            .and_then(|tlv| tlv.value.first().copied())
            .map(|b| b.to_string())
            .unwrap_or_default();
        return Some(ParsedDeliveryReport {
            remote_id,
            raw_status,
        });
    }

    let body = pdu.short_message.as_bytes();
    let text = String::from_utf8_lossy(body);
    let captures = delivery_receipt_regex().captures(&text)?;
    Some(ParsedDeliveryReport {
        remote_id: captures["id"].to_string(),
        raw_status: captures["stat"].to_string(),
    })
}

/// Multipart framing detected on a deliver_sm, independent of representation
/// (SAR TLVs vs. inline UDH prefix).
struct MultipartFraming {
    ref_num: u16,
    total: u8,
    seq: u8,
    body_offset: usize,
}

/// USSD session-continuation state carried in `its_session_info`, decoded
/// per the same 2-byte mapping the MT side writes: `[0x00, 0x00]` for
/// new/continue, `[0x00, 0x01]` for close. A fresh inbound session always
/// decodes as `Continue`; the distinction from `New` only matters outbound.
fn ussd_session_event(pdu: &DeliverSm) -> Option<SessionEvent> {
    let tlv = pdu.its_session_info.as_ref()?;
    match (tlv.value.first()?, tlv.value.get(1)?) {
        (0x00, 0x00) => Some(SessionEvent::Continue),
        (0x00, 0x01) => Some(SessionEvent::Close),
        _ => None,
    }
}

fn transport_type_for(pdu: &DeliverSm) -> TransportType {
    if pdu.its_session_info.is_some() {
        TransportType::Ussd
    } else {
        TransportType::Sms
    }
}

fn detect_multipart(pdu: &DeliverSm) -> Option<MultipartFraming> {
    if let (Some(ref_tlv), Some(total_tlv), Some(seq_tlv)) = (
        &pdu.sar_msg_ref_num,
        &pdu.sar_total_segments,
        &pdu.sar_segment_seqnum,
    ) {
        let ref_num = u16::from_be_bytes([
            *ref_tlv.value.first()?,
            *ref_tlv.value.get(1)?,
        ]);
        return Some(MultipartFraming {
            ref_num,
            total: *total_tlv.value.first()?,
            seq: *seq_tlv.value.first()?,
            body_offset: 0,
        });
    }

    let body = pdu.short_message.as_bytes();
    if body.len() >= 6 && body[0] == 0x05 && body[1] == 0x00 && body[2] == 0x03 {
        return Some(MultipartFraming {
            ref_num: body[3] as u16,
            total: body[4],
            seq: body[5],
            body_offset: 6,
        });
    }

    None
}

pub struct MoProcessor<S: MessageStash, P: BusPublisher> {
    stash: Arc<S>,
    bus: Arc<P>,
    charset: CharsetTable,
    transport_name: String,
    multipart_ttl: Duration,
}

impl<S: MessageStash, P: BusPublisher> MoProcessor<S, P> {
    pub fn new(
        stash: Arc<S>,
        bus: Arc<P>,
        charset: CharsetTable,
        transport_name: String,
        multipart_ttl: Duration,
    ) -> Self {
        Self {
            stash,
            bus,
            charset,
            transport_name,
            multipart_ttl,
        }
    }

    /// Processes one inbound deliver_sm. Always succeeds from the SMPP
    /// layer's point of view: the caller replies ESME_ROK regardless of what
    /// happened downstream, per the error-handling design.
    pub async fn handle(&self, pdu: DeliverSm) {
        if let Some(report) = classify_delivery_report(&pdu) {
            self.handle_delivery_report(report).await;
            return;
        }

        // message_payload TLV bypasses reassembly: it carries the complete message.
        if let Some(payload) = &pdu.message_payload {
            self.emit_user_message(&pdu, payload.value.clone().to_vec())
                .await;
            return;
        }

        match detect_multipart(&pdu) {
            Some(framing) => self.handle_multipart_segment(&pdu, framing).await,
            None => {
                let body = pdu.short_message.as_bytes().to_vec();
                self.emit_user_message(&pdu, body).await;
            }
        }
    }

    async fn handle_delivery_report(&self, report: ParsedDeliveryReport) {
        let status = DeliveryStatus::from_smsc_status(&report.raw_status);
        match self
            .stash
            .get_internal_message_id(&report.remote_id)
            .await
        {
            Ok(Some(internal_id)) => {
                self.bus
                    .publish(BusRecord::Event {
                        event_type: EventType::DeliveryReport,
                        user_message_id: internal_id,
                        sent_message_id: Some(report.remote_id),
                        nack_reason: None,
                        delivery_status: Some(status),
                    })
                    .await;
            }
            Ok(None) => {
                tracing::warn!(
                    transport = %self.transport_name,
                    "Failed to retrieve message id for delivery report. Delivery report from {} discarded.",
                    self.transport_name
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "stash lookup failed while processing delivery report");
            }
        }
    }

    async fn emit_user_message(&self, pdu: &DeliverSm, body: Vec<u8>) {
        let codec = match self.charset.resolve(pdu.data_coding.to_byte()) {
            Ok(codec) => codec,
            Err(e) => {
                tracing::error!(error = %e, "unresolvable data_coding on deliver_sm, dropping body");
                return;
            }
        };

        let content = match codec.decode(&body) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to decode deliver_sm body, dropping PDU");
                return;
            }
        };

        self.bus
            .publish(BusRecord::UserMessage {
                content,
                from_addr: pdu.source_addr.as_str().unwrap_or_default().to_string(),
                to_addr: pdu.destination_addr.as_str().unwrap_or_default().to_string(),
                transport_type: transport_type_for(pdu),
                transport_name: self.transport_name.clone(),
                session_event: ussd_session_event(pdu),
            })
            .await;
    }

    async fn handle_multipart_segment(&self, pdu: &DeliverSm, framing: MultipartFraming) {
        let from = pdu.source_addr.as_str().unwrap_or_default();
        let to = pdu.destination_addr.as_str().unwrap_or_default();
        let key = format!("multipart:{}:{}:{}", framing.ref_num, from, to);

        let body = &pdu.short_message.as_bytes()[framing.body_offset..];
        let codec = match self.charset.resolve(pdu.data_coding.to_byte()) {
            Ok(codec) => codec,
            Err(e) => {
                tracing::error!(error = %e, "unresolvable data_coding on multipart segment, dropping");
                return;
            }
        };
        let text = match codec.decode(body) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to decode multipart segment, dropping");
                return;
            }
        };

        let set = match self
            .stash
            .store_multipart_segment(&key, framing.seq, framing.total, text, self.multipart_ttl)
            .await
        {
            Ok(set) => set,
            Err(e) => {
                tracing::error!(error = %e, "stash write failed while reassembling multipart segment");
                return;
            }
        };

        if let Some(content) = set.assemble() {
            let _ = self.stash.take_multipart(&key).await;
            self.bus
                .publish(BusRecord::UserMessage {
                    content,
                    from_addr: from.to_string(),
                    to_addr: to.to_string(),
                    transport_type: transport_type_for(pdu),
                    transport_name: self.transport_name.clone(),
                    session_event: ussd_session_event(pdu),
                })
                .await;
        }
    }
}

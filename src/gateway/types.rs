// ABOUTME: Shared data model for the gateway: outbound messages, bus records, delivery status
// ABOUTME: Kept free of any wire-codec or I/O dependency so it can be reused across modules

use std::fmt;

/// What kind of transport a message is carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    Sms,
    Ussd,
}

/// USSD session continuation semantics, mirrored into the `its_session_info` TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    New,
    Continue,
    Close,
}

/// A logical message the gateway is asked to deliver to the SMSC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub message_id: String,
    pub to_addr: String,
    pub from_addr: String,
    pub content: String,
    pub transport_type: TransportType,
    pub session_event: Option<SessionEvent>,
}

impl OutboundMessage {
    /// Name and value of the first non-ASCII address field, checked
    /// to_addr before from_addr, or `None` if both are addressable.
    pub fn invalid_address(&self) -> Option<(&'static str, &str)> {
        if !self.to_addr.is_ascii() {
            Some(("to_addr", self.to_addr.as_str()))
        } else if !self.from_addr.is_ascii() {
            Some(("from_addr", self.from_addr.as_str()))
        } else {
            None
        }
    }
}

/// Status carried in a `delivery_report` event, mapped from the SMSC's own status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Pending,
    Failed,
}

impl DeliveryStatus {
    /// Map a delivery-receipt status token (from TLV or regex) to our internal status.
    /// Per the SMSC->internal mapping: DELIVRD/2 delivered; ACCEPTD/6 pending;
    /// EXPIRED/3, DELETED/4, UNDELIV/5, REJECTD/8 failed; anything else pending.
    pub fn from_smsc_status(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "DELIVRD" | "2" => DeliveryStatus::Delivered,
            "ACCEPTD" | "6" => DeliveryStatus::Pending,
            "EXPIRED" | "3" | "DELETED" | "4" | "UNDELIV" | "5" | "REJECTD" | "8" => {
                DeliveryStatus::Failed
            }
            _ => DeliveryStatus::Pending,
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The three record kinds the Transport Service publishes downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum BusRecord {
    UserMessage {
        content: String,
        from_addr: String,
        to_addr: String,
        transport_type: TransportType,
        transport_name: String,
        session_event: Option<SessionEvent>,
    },
    Event {
        event_type: EventType,
        user_message_id: String,
        sent_message_id: Option<String>,
        nack_reason: Option<String>,
        delivery_status: Option<DeliveryStatus>,
    },
    Failure {
        reason: String,
        message: OutboundMessage,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Ack,
    Nack,
    DeliveryReport,
}

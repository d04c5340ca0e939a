use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_u8, encode_cstring,
    encode_u8,
};
use crate::datatypes::numeric_plan_indicator::NumericPlanIndicator;
use crate::datatypes::priority_flag::PriorityFlag;
use crate::datatypes::tlv::{Tlv, tags};
use crate::datatypes::{
    CommandId, CommandStatus, DataCoding, DestinationAddr, EsmClass, MessageId,
    ScheduleDeliveryTime, ServiceType, ShortMessage, SourceAddr, TypeOfNumber, ValidityPeriod,
};
use bytes::{Buf, BytesMut};
use std::io::Cursor;

/// This operation is used by an ESME to submit a short message to the SMSC for onward
/// transmission to a specified short message entity (SME). submit_sm does not support
/// the transaction message mode.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSm {
    // pub command_length: u32,
    // pub command_id: CommandId::SubmitSm,
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    // Mandatory parameters
    /// 4.4.1 service_type: Indicates the SMS Application service associated with the message.
    ///       Set to NULL if not applicable. Max length: 5 octets (6 with null terminator).
    pub service_type: ServiceType,

    /// 4.4.2 source_addr_ton: Type of Number for source address.
    pub source_addr_ton: TypeOfNumber,

    /// 4.4.3 source_addr_npi: Numbering Plan Indicator for source address.
    pub source_addr_npi: NumericPlanIndicator,

    /// 4.4.4 source_addr: Address of SME which originated this message.
    ///       Max length: 20 octets (21 with null terminator).
    pub source_addr: SourceAddr,

    /// 4.4.5 dest_addr_ton: Type of Number for destination address.
    pub dest_addr_ton: TypeOfNumber,

    /// 4.4.6 dest_addr_npi: Numbering Plan Indicator for destination address.
    pub dest_addr_npi: NumericPlanIndicator,

    /// 4.4.7 destination_addr: Destination address of this short message.
    ///       Max length: 20 octets (21 with null terminator).
    pub destination_addr: DestinationAddr,

    /// 4.4.8 esm_class: Indicates Message Mode and Message Type.
    pub esm_class: EsmClass,

    /// 4.4.9 protocol_id: Protocol Identifier. Network specific field.
    pub protocol_id: u8,

    /// 4.4.10 priority_flag: Designates the priority level of the message.
    pub priority_flag: PriorityFlag,

    /// 4.4.11 schedule_delivery_time: The scheduled time at which delivery should be
    ///        first attempted. Set to NULL for immediate delivery.
    pub schedule_delivery_time: ScheduleDeliveryTime,

    /// 4.4.12 validity_period: The validity period of this message. Set to NULL to
    ///        request the SMSC default validity period.
    pub validity_period: ValidityPeriod,

    /// 4.4.13 registered_delivery: Indicator to signify if an SMSC delivery receipt or
    ///        SME originated acknowledgment is required.
    pub registered_delivery: u8,

    /// 4.4.14 replace_if_present_flag: Indicator to signify if the submitted message
    ///        should replace an existing message.
    pub replace_if_present_flag: u8,

    /// 4.4.15 data_coding: Defines the encoding scheme of the short message user data.
    pub data_coding: DataCoding,

    /// 4.4.16 sm_default_msg_id: Indicates a predefined message from a list stored on
    ///        the SMSC. Set to 0 if not using a canned message.
    pub sm_default_msg_id: u8,

    /// 4.4.17 sm_length: Length in octets of the short_message user data parameter.
    ///        Range: 0 to 254 octets. Must not be set if message_payload is used.
    pub sm_length: u8,

    /// 4.4.18 short_message: Up to 254 octets of short message user data.
    pub short_message: ShortMessage,

    // Optional parameters (TLV format)
    /// User Message Reference TLV (0x0204): ESME assigned message reference number.
    pub user_message_reference: Option<Tlv>,

    /// Source Port TLV (0x020A): Application port number associated with the source address.
    pub source_port: Option<Tlv>,

    /// Source Address Subunit TLV (0x020B): Originating subunit on a mobile station.
    pub source_addr_submit: Option<Tlv>,

    /// Destination Port TLV (0x020C): Application port number associated with the
    /// destination address.
    pub destination_port: Option<Tlv>,

    /// Destination Address Subunit TLV (0x020D): Terminating subunit on a mobile station.
    pub dest_addr_submit: Option<Tlv>,

    /// SAR Message Reference Number TLV (0x020E): Reference number for a particular
    /// concatenated short message.
    pub sar_msg_ref_num: Option<Tlv>,

    /// SAR Total Segments TLV (0x020F): Total number of short messages within the
    /// concatenated short message.
    pub sar_total_segments: Option<Tlv>,

    /// SAR Segment Sequence Number TLV (0x0210): Sequence number of a particular short
    /// message within the concatenated short message.
    pub sar_segment_seqnum: Option<Tlv>,

    /// More Messages to Send TLV (0x0426): Indicates that there are more messages to
    /// follow for the destination SME.
    pub more_messages_to_send: Option<Tlv>,

    /// Payload Type TLV (0x0019): Defines the type of payload carried in message_payload.
    pub payload_type: Option<Tlv>,

    /// Message Payload TLV (0x0424): Contains the extended short message user data.
    /// Must not be specified when sm_length and short_message contain data.
    pub message_payload: Option<Tlv>,

    /// Privacy Indicator TLV (0x0201): Indicates the level of privacy associated with
    /// the message.
    pub privacy_indicator: Option<Tlv>,

    /// Callback Number TLV (0x0381): A callback number associated with the short message.
    pub callback_num: Option<Tlv>,

    /// Callback Number Presentation Indicator TLV (0x0302): Controls the presentation
    /// indication and screening of the callback number.
    pub callback_num_pres_ind: Option<Tlv>,

    /// Callback Number Atag TLV (0x0303): Associates an alphanumeric tag with the
    /// callback number.
    pub callback_num_atag: Option<Tlv>,

    /// Source Subaddress TLV (0x0202): The subaddress of the message originator.
    pub source_subaddress: Option<Tlv>,

    /// Destination Subaddress TLV (0x0203): The subaddress of the message destination.
    pub dest_subaddress: Option<Tlv>,

    /// Display Time TLV (0x1201): Associates a display time with the short message on
    /// the handset.
    pub display_time: Option<Tlv>,

    /// SMS Signal TLV (0x1203): Alerts a mobile station with a pre-defined alert tone.
    pub sms_signal: Option<Tlv>,

    /// MS Validity TLV (0x1204): Indicates how long the message remains valid on the
    /// mobile station.
    pub ms_validity: Option<Tlv>,

    /// MS Message Wait Facilities TLV (0x1205): Indicates to the MS the presence of
    /// one or more waiting messages on the SMSC.
    pub ms_msg_wait_facilities: Option<Tlv>,

    /// Number of Messages TLV (0x0205): Indicates the number of messages stored in a
    /// mailbox, used in voicemail notification applications.
    pub number_of_messages: Option<Tlv>,

    /// Alert on Message Delivery TLV (0x130C): Instructs the mobile station to alert
    /// the user upon message delivery.
    pub alert_on_msg_delivery: Option<Tlv>,

    /// Language Indicator TLV (0x000D): Indicates the language of the short message.
    pub language_indicator: Option<Tlv>,

    /// ITS Reply Type TLV (0x1380): Controls the MS user's reply method to an SMS
    /// delivery message received from the network.
    pub its_reply_type: Option<Tlv>,

    /// ITS Session Info TLV (0x1383): Session control information for Interactive
    /// Teleservice.
    pub its_session_info: Option<Tlv>,

    /// USSD Service Op TLV (0x0501): USSD Service Operation for interworking with USSD.
    pub ussd_service_op: Option<Tlv>,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitSmValidationError {
    #[error("sm_length ({sm_length}) does not match short_message length ({message_length})")]
    SmLengthMismatch {
        sm_length: u8,
        message_length: usize,
    },

    #[error("Cannot use both short_message and message_payload - they are mutually exclusive")]
    MutualExclusivityViolation,
}

impl SubmitSm {
    /// Validates the SubmitSm PDU according to SMPP v3.4 specification.
    pub fn validate(&self) -> Result<(), SubmitSmValidationError> {
        if self.sm_length as usize != self.short_message.len() as usize {
            return Err(SubmitSmValidationError::SmLengthMismatch {
                sm_length: self.sm_length,
                message_length: self.short_message.len() as usize,
            });
        }

        if !self.short_message.is_empty() && self.message_payload.is_some() {
            return Err(SubmitSmValidationError::MutualExclusivityViolation);
        }

        Ok(())
    }

    /// Creates a builder for constructing SubmitSm PDUs with validation.
    pub fn builder() -> SubmitSmBuilder {
        SubmitSmBuilder::new()
    }
}

/// Builder for creating SubmitSm PDUs with validation and sensible defaults.
pub struct SubmitSmBuilder {
    command_status: CommandStatus,
    sequence_number: u32,
    service_type: ServiceType,
    source_addr_ton: TypeOfNumber,
    source_addr_npi: NumericPlanIndicator,
    source_addr: SourceAddr,
    dest_addr_ton: TypeOfNumber,
    dest_addr_npi: NumericPlanIndicator,
    destination_addr: DestinationAddr,
    esm_class: EsmClass,
    protocol_id: u8,
    priority_flag: PriorityFlag,
    schedule_delivery_time: ScheduleDeliveryTime,
    validity_period: ValidityPeriod,
    registered_delivery: u8,
    replace_if_present_flag: u8,
    data_coding: DataCoding,
    sm_default_msg_id: u8,
    short_message: ShortMessage,
    message_payload: Option<Tlv>,
}

impl Default for SubmitSmBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmitSmBuilder {
    pub fn new() -> Self {
        Self {
            command_status: CommandStatus::Ok,
            sequence_number: 1,
            service_type: ServiceType::default(),
            source_addr_ton: TypeOfNumber::Unknown,
            source_addr_npi: NumericPlanIndicator::Unknown,
            source_addr: SourceAddr::default(),
            dest_addr_ton: TypeOfNumber::Unknown,
            dest_addr_npi: NumericPlanIndicator::Unknown,
            destination_addr: DestinationAddr::default(),
            esm_class: EsmClass::default(),
            protocol_id: 0,
            priority_flag: PriorityFlag::Level0,
            schedule_delivery_time: ScheduleDeliveryTime::default(),
            validity_period: ValidityPeriod::default(),
            registered_delivery: 0,
            replace_if_present_flag: 0,
            data_coding: DataCoding::default(),
            sm_default_msg_id: 0,
            short_message: ShortMessage::default(),
            message_payload: None,
        }
    }

    pub fn sequence_number(mut self, seq: u32) -> Self {
        self.sequence_number = seq;
        self
    }

    pub fn service_type(mut self, service_type: &str) -> Self {
        self.service_type = ServiceType::from(service_type);
        self
    }

    pub fn source_addr(mut self, addr: &str) -> Self {
        self.source_addr = SourceAddr::new(addr, TypeOfNumber::Unknown).unwrap_or_default();
        self
    }

    pub fn destination_addr(mut self, addr: &str) -> Self {
        self.destination_addr =
            DestinationAddr::new(addr, TypeOfNumber::Unknown).unwrap_or_default();
        self
    }

    pub fn source_addr_ton(mut self, ton: TypeOfNumber) -> Self {
        self.source_addr_ton = ton;
        self
    }

    pub fn source_addr_npi(mut self, npi: NumericPlanIndicator) -> Self {
        self.source_addr_npi = npi;
        self
    }

    pub fn dest_addr_ton(mut self, ton: TypeOfNumber) -> Self {
        self.dest_addr_ton = ton;
        self
    }

    pub fn dest_addr_npi(mut self, npi: NumericPlanIndicator) -> Self {
        self.dest_addr_npi = npi;
        self
    }

    pub fn short_message(mut self, message: &str) -> Self {
        self.short_message = ShortMessage::from(message);
        self
    }

    pub fn esm_class(mut self, esm_class: EsmClass) -> Self {
        self.esm_class = esm_class;
        self
    }

    pub fn data_coding(mut self, data_coding: DataCoding) -> Self {
        self.data_coding = data_coding;
        self
    }

    pub fn priority_flag(mut self, priority_flag: PriorityFlag) -> Self {
        self.priority_flag = priority_flag;
        self
    }

    pub fn registered_delivery(mut self, registered_delivery: u8) -> Self {
        self.registered_delivery = registered_delivery;
        self
    }

    pub fn message_payload(mut self, tlv: Tlv) -> Self {
        self.message_payload = Some(tlv);
        self
    }

    /// Build the SubmitSm, performing validation and calculating sm_length automatically.
    pub fn build(self) -> Result<SubmitSm, SubmitSmValidationError> {
        let sm_length = self.short_message.len();

        let submit_sm = SubmitSm {
            command_status: self.command_status,
            sequence_number: self.sequence_number,
            service_type: self.service_type,
            source_addr_ton: self.source_addr_ton,
            source_addr_npi: self.source_addr_npi,
            source_addr: self.source_addr,
            dest_addr_ton: self.dest_addr_ton,
            dest_addr_npi: self.dest_addr_npi,
            destination_addr: self.destination_addr,
            esm_class: self.esm_class,
            protocol_id: self.protocol_id,
            priority_flag: self.priority_flag,
            schedule_delivery_time: self.schedule_delivery_time,
            validity_period: self.validity_period,
            registered_delivery: self.registered_delivery,
            replace_if_present_flag: self.replace_if_present_flag,
            data_coding: self.data_coding,
            sm_default_msg_id: self.sm_default_msg_id,
            sm_length,
            short_message: self.short_message,
            user_message_reference: None,
            source_port: None,
            source_addr_submit: None,
            destination_port: None,
            dest_addr_submit: None,
            sar_msg_ref_num: None,
            sar_total_segments: None,
            sar_segment_seqnum: None,
            more_messages_to_send: None,
            payload_type: None,
            message_payload: self.message_payload,
            privacy_indicator: None,
            callback_num: None,
            callback_num_pres_ind: None,
            callback_num_atag: None,
            source_subaddress: None,
            dest_subaddress: None,
            display_time: None,
            sms_signal: None,
            ms_validity: None,
            ms_msg_wait_facilities: None,
            number_of_messages: None,
            alert_on_msg_delivery: None,
            language_indicator: None,
            its_reply_type: None,
            its_session_info: None,
            ussd_service_op: None,
        };

        submit_sm.validate()?;
        Ok(submit_sm)
    }
}

/// The submit_sm_resp PDU is used to provide a response to the submit_sm request.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSmResponse {
    // pub command_length: u32,
    // pub command_id: CommandId::SubmitSmResp,
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    // Body
    /// 4.4.1 message_id: SMSC message ID of the submitted message. May be used at a
    ///       later stage to query the status, cancel, or replace the message.
    pub message_id: MessageId,
}

// New codec trait implementations

impl Encodable for SubmitSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        self.validate().map_err(|e| CodecError::FieldValidation {
            field: "submit_sm",
            reason: e.to_string(),
        })?;

        let header = PduHeader {
            command_length: 0, // Will be set by the caller
            command_id: CommandId::SubmitSm,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        };
        header.encode(buf)?;

        encode_cstring(buf, self.service_type.as_str(), 6);
        encode_u8(buf, self.source_addr_ton as u8);
        encode_u8(buf, self.source_addr_npi as u8);
        encode_cstring(buf, self.source_addr.as_str().unwrap_or(""), 21);
        encode_u8(buf, self.dest_addr_ton as u8);
        encode_u8(buf, self.dest_addr_npi as u8);
        encode_cstring(buf, self.destination_addr.as_str().unwrap_or(""), 21);
        encode_u8(buf, self.esm_class.to_byte());
        encode_u8(buf, self.protocol_id);
        encode_u8(buf, self.priority_flag as u8);
        encode_cstring(buf, self.schedule_delivery_time.as_str().unwrap_or(""), 17);
        encode_cstring(buf, self.validity_period.as_str().unwrap_or(""), 17);
        encode_u8(buf, self.registered_delivery);
        encode_u8(buf, self.replace_if_present_flag);
        encode_u8(buf, self.data_coding.to_byte());
        encode_u8(buf, self.sm_default_msg_id);
        encode_u8(buf, self.sm_length);

        let message_bytes = self.short_message.as_bytes();
        buf.extend_from_slice(&message_bytes[..(self.sm_length as usize).min(message_bytes.len())]);

        if let Some(ref tlv) = self.user_message_reference {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.source_port {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.source_addr_submit {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.destination_port {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.dest_addr_submit {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.sar_msg_ref_num {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.sar_total_segments {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.sar_segment_seqnum {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.more_messages_to_send {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.payload_type {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.message_payload {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.privacy_indicator {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.callback_num {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.callback_num_pres_ind {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.callback_num_atag {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.source_subaddress {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.dest_subaddress {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.display_time {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.sms_signal {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.ms_validity {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.ms_msg_wait_facilities {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.number_of_messages {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.alert_on_msg_delivery {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.language_indicator {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.its_reply_type {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.its_session_info {
            tlv.encode(buf)?;
        }
        if let Some(ref tlv) = self.ussd_service_op {
            tlv.encode(buf)?;
        }

        Ok(())
    }

    fn encoded_size(&self) -> usize {
        let mut size = PduHeader::SIZE;

        size += 6 + 1 + 1 + 21 + 1 + 1 + 21 + 1 + 1 + 1 + 17 + 17 + 1 + 1 + 1 + 1 + 1;
        size += self.sm_length as usize;

        for tlv in [
            &self.user_message_reference,
            &self.source_port,
            &self.source_addr_submit,
            &self.destination_port,
            &self.dest_addr_submit,
            &self.sar_msg_ref_num,
            &self.sar_total_segments,
            &self.sar_segment_seqnum,
            &self.more_messages_to_send,
            &self.payload_type,
            &self.message_payload,
            &self.privacy_indicator,
            &self.callback_num,
            &self.callback_num_pres_ind,
            &self.callback_num_atag,
            &self.source_subaddress,
            &self.dest_subaddress,
            &self.display_time,
            &self.sms_signal,
            &self.ms_validity,
            &self.ms_msg_wait_facilities,
            &self.number_of_messages,
            &self.alert_on_msg_delivery,
            &self.language_indicator,
            &self.its_reply_type,
            &self.its_session_info,
            &self.ussd_service_op,
        ] {
            if let Some(tlv) = tlv {
                size += tlv.encoded_size();
            }
        }

        size
    }
}

impl Encodable for SubmitSmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let header = PduHeader {
            command_length: 0, // Will be set by the caller
            command_id: CommandId::SubmitSmResp,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        };
        header.encode(buf)?;

        encode_cstring(buf, self.message_id.as_str().unwrap_or(""), 65);

        Ok(())
    }

    fn encoded_size(&self) -> usize {
        PduHeader::SIZE + 65
    }
}

impl Decodable for SubmitSm {
    fn command_id() -> CommandId {
        CommandId::SubmitSm
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let service_type_str = decode_cstring(buf, 6, "service_type")?;
        let source_addr_ton =
            TypeOfNumber::try_from(decode_u8(buf)?).map_err(|_| CodecError::FieldValidation {
                field: "source_addr_ton",
                reason: "Invalid type of number".to_string(),
            })?;
        let source_addr_npi = NumericPlanIndicator::try_from(decode_u8(buf)?).map_err(|_| {
            CodecError::FieldValidation {
                field: "source_addr_npi",
                reason: "Invalid numbering plan indicator".to_string(),
            }
        })?;
        let source_addr_str = decode_cstring(buf, 21, "source_addr")?;
        let dest_addr_ton =
            TypeOfNumber::try_from(decode_u8(buf)?).map_err(|_| CodecError::FieldValidation {
                field: "dest_addr_ton",
                reason: "Invalid type of number".to_string(),
            })?;
        let dest_addr_npi = NumericPlanIndicator::try_from(decode_u8(buf)?).map_err(|_| {
            CodecError::FieldValidation {
                field: "dest_addr_npi",
                reason: "Invalid numbering plan indicator".to_string(),
            }
        })?;
        let destination_addr_str = decode_cstring(buf, 21, "destination_addr")?;
        let esm_class_byte = decode_u8(buf)?;
        let protocol_id = decode_u8(buf)?;
        let priority_flag_byte = decode_u8(buf)?;
        let schedule_delivery_time_str = decode_cstring(buf, 17, "schedule_delivery_time")?;
        let validity_period_str = decode_cstring(buf, 17, "validity_period")?;
        let registered_delivery = decode_u8(buf)?;
        let replace_if_present_flag = decode_u8(buf)?;
        let data_coding_byte = decode_u8(buf)?;
        let sm_default_msg_id = decode_u8(buf)?;
        let sm_length = decode_u8(buf)?;

        if buf.remaining() < sm_length as usize {
            return Err(CodecError::Incomplete);
        }
        let short_message_bytes = buf.copy_to_bytes(sm_length as usize);
        let short_message =
            ShortMessage::new(&short_message_bytes).map_err(|e| CodecError::FieldValidation {
                field: "short_message",
                reason: e.to_string(),
            })?;

        let service_type = ServiceType::from_parsed_string(service_type_str).map_err(|e| {
            CodecError::FieldValidation {
                field: "service_type",
                reason: e.to_string(),
            }
        })?;
        let source_addr = SourceAddr::from_parsed_string(source_addr_str).map_err(|e| {
            CodecError::FieldValidation {
                field: "source_addr",
                reason: e.to_string(),
            }
        })?;
        let destination_addr = DestinationAddr::from_parsed_string(destination_addr_str)
            .map_err(|e| CodecError::FieldValidation {
                field: "destination_addr",
                reason: e.to_string(),
            })?;
        let esm_class =
            EsmClass::from_byte(esm_class_byte).map_err(|e| CodecError::FieldValidation {
                field: "esm_class",
                reason: e.to_string(),
            })?;
        let priority_flag =
            PriorityFlag::try_from(priority_flag_byte).map_err(|_| CodecError::FieldValidation {
                field: "priority_flag",
                reason: "Invalid priority flag".to_string(),
            })?;
        let schedule_delivery_time = ScheduleDeliveryTime::from_parsed_string(
            schedule_delivery_time_str,
        )
        .map_err(|e| CodecError::FieldValidation {
            field: "schedule_delivery_time",
            reason: e.to_string(),
        })?;
        let validity_period = ValidityPeriod::from_parsed_string(validity_period_str).map_err(
            |e| CodecError::FieldValidation {
                field: "validity_period",
                reason: e.to_string(),
            },
        )?;
        let data_coding = DataCoding::from_byte(data_coding_byte);

        let mut submit_sm = SubmitSm {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            service_type,
            source_addr_ton,
            source_addr_npi,
            source_addr,
            dest_addr_ton,
            dest_addr_npi,
            destination_addr,
            esm_class,
            protocol_id,
            priority_flag,
            schedule_delivery_time,
            validity_period,
            registered_delivery,
            replace_if_present_flag,
            data_coding,
            sm_default_msg_id,
            sm_length,
            short_message,
            user_message_reference: None,
            source_port: None,
            source_addr_submit: None,
            destination_port: None,
            dest_addr_submit: None,
            sar_msg_ref_num: None,
            sar_total_segments: None,
            sar_segment_seqnum: None,
            more_messages_to_send: None,
            payload_type: None,
            message_payload: None,
            privacy_indicator: None,
            callback_num: None,
            callback_num_pres_ind: None,
            callback_num_atag: None,
            source_subaddress: None,
            dest_subaddress: None,
            display_time: None,
            sms_signal: None,
            ms_validity: None,
            ms_msg_wait_facilities: None,
            number_of_messages: None,
            alert_on_msg_delivery: None,
            language_indicator: None,
            its_reply_type: None,
            its_session_info: None,
            ussd_service_op: None,
        };

        while buf.has_remaining() {
            let tlv = Tlv::decode(buf)?;
            match tlv.tag {
                tags::USER_MESSAGE_REFERENCE => submit_sm.user_message_reference = Some(tlv),
                tags::SOURCE_PORT => submit_sm.source_port = Some(tlv),
                tags::SOURCE_ADDR_SUBMIT => submit_sm.source_addr_submit = Some(tlv),
                tags::DESTINATION_PORT => submit_sm.destination_port = Some(tlv),
                tags::DEST_ADDR_SUBMIT => submit_sm.dest_addr_submit = Some(tlv),
                tags::SAR_MSG_REF_NUM => submit_sm.sar_msg_ref_num = Some(tlv),
                tags::SAR_TOTAL_SEGMENTS => submit_sm.sar_total_segments = Some(tlv),
                tags::SAR_SEGMENT_SEQNUM => submit_sm.sar_segment_seqnum = Some(tlv),
                tags::MORE_MESSAGES_TO_SEND => submit_sm.more_messages_to_send = Some(tlv),
                tags::PAYLOAD_TYPE => submit_sm.payload_type = Some(tlv),
                tags::MESSAGE_PAYLOAD => submit_sm.message_payload = Some(tlv),
                tags::PRIVACY_INDICATOR => submit_sm.privacy_indicator = Some(tlv),
                tags::CALLBACK_NUM => submit_sm.callback_num = Some(tlv),
                tags::CALLBACK_NUM_PRES_IND => submit_sm.callback_num_pres_ind = Some(tlv),
                tags::CALLBACK_NUM_ATAG => submit_sm.callback_num_atag = Some(tlv),
                tags::SOURCE_SUBADDRESS => submit_sm.source_subaddress = Some(tlv),
                tags::DEST_SUBADDRESS => submit_sm.dest_subaddress = Some(tlv),
                tags::DISPLAY_TIME => submit_sm.display_time = Some(tlv),
                tags::SMS_SIGNAL => submit_sm.sms_signal = Some(tlv),
                tags::MS_VALIDITY => submit_sm.ms_validity = Some(tlv),
                tags::MS_MSG_WAIT_FACILITIES => submit_sm.ms_msg_wait_facilities = Some(tlv),
                tags::NUMBER_OF_MESSAGES => submit_sm.number_of_messages = Some(tlv),
                tags::ALERT_ON_MSG_DELIVERY => submit_sm.alert_on_msg_delivery = Some(tlv),
                tags::LANGUAGE_INDICATOR => submit_sm.language_indicator = Some(tlv),
                tags::ITS_REPLY_TYPE => submit_sm.its_reply_type = Some(tlv),
                tags::ITS_SESSION_INFO => submit_sm.its_session_info = Some(tlv),
                tags::USSD_SERVICE_OP => submit_sm.ussd_service_op = Some(tlv),
                unknown => {
                    tracing::debug!(tag = format!("{unknown:#06x}"), "ignoring unknown submit_sm TLV");
                }
            }
        }

        Ok(submit_sm)
    }
}

impl Decodable for SubmitSmResponse {
    fn command_id() -> CommandId {
        CommandId::SubmitSmResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let message_id_str = decode_cstring(buf, 65, "message_id")?;
        let message_id = MessageId::from_parsed_string(message_id_str).map_err(|e| {
            CodecError::FieldValidation {
                field: "message_id",
                reason: e.to_string(),
            }
        })?;

        Ok(SubmitSmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id,
        })
    }
}

//! Simulation decoder
//!
//! Decodes the virtual meter's reports into the same kind of metadata tree a
//! real bit-level decoder returns. Like a real decoder it starts cold: until
//! [`SimDecoder::mark_ready`] is called every decode fails with
//! [`DecodeError::NotReady`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pdlens_protocol::display::format_hex;
use pdlens_protocol::pd::fields as pd_fields;
use pdlens_protocol::telemetry::fields as telemetry_fields;
use pdlens_protocol::{
    parse_hex, DecodeError, DecodedMessage, Decoder, MessageKind, MetadataNode, PROTOCOL_MARKER,
    TELEMETRY_MARKER, TELEMETRY_REPORT_LEN,
};
use tracing::debug;

use crate::meter::layout;
use crate::pd_message::{PdHeader, PdMessageType};

/// Decoder for virtual meter reports
///
/// Clones share readiness, so a warm-up task can hold one copy while the
/// pipeline owns another.
#[derive(Debug, Clone)]
pub struct SimDecoder {
    ready: Arc<AtomicBool>,
}

impl SimDecoder {
    /// Create a decoder that is ready immediately
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Create a decoder that rejects work until marked ready
    pub fn cold() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Finish warming up
    pub fn mark_ready(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            debug!("Simulation decoder ready");
        }
    }
}

impl Default for SimDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for SimDecoder {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn decode(&self, hex: &str) -> Result<DecodedMessage, DecodeError> {
        if !self.is_ready() {
            return Err(DecodeError::NotReady);
        }

        let bytes = parse_hex(hex)?;
        let raw_hex = format_hex(&bytes);
        match bytes[0] {
            TELEMETRY_MARKER => Ok(DecodedMessage {
                kind: MessageKind::Telemetry,
                tree: decode_telemetry(&bytes)?,
                raw_hex,
                protocol_message_type: None,
            }),
            PROTOCOL_MARKER => {
                let (tree, message_type) = decode_protocol(&bytes)?;
                Ok(DecodedMessage {
                    kind: MessageKind::Protocol,
                    tree,
                    raw_hex,
                    protocol_message_type: Some(message_type.to_string()),
                })
            }
            other => Err(DecodeError::UnknownMarker(other)),
        }
    }
}

// ============================================================================
// Telemetry
// ============================================================================

fn decode_telemetry(bytes: &[u8]) -> Result<MetadataNode, DecodeError> {
    if bytes.len() < TELEMETRY_REPORT_LEN {
        return Err(DecodeError::Malformed(format!(
            "status report needs {} bytes, got {}",
            TELEMETRY_REPORT_LEN,
            bytes.len()
        )));
    }

    let float = |field: &str, offset: usize, text: String| word_node(bytes, field, offset, text);
    let f = |offset: usize| read_f32(bytes, offset);

    let mut children = vec![
        MetadataNode::text(telemetry_fields::GROUP, bytes[layout::GROUP].to_string())
            .with_bits(8 * layout::GROUP as u32, 8 * layout::GROUP as u32 + 7)
            .with_raw(format!("{:02X}", bytes[layout::GROUP])),
        float(telemetry_fields::CHARGE, layout::CHARGE, format!("{:.4}Ah", f(layout::CHARGE))),
        float(telemetry_fields::ENERGY, layout::ENERGY, format!("{:.4}Wh", f(layout::ENERGY))),
        word_node(
            bytes,
            telemetry_fields::RECORD_TIME,
            layout::RECORD_TIME,
            format_duration(read_u32(bytes, layout::RECORD_TIME)),
        ),
        word_node(
            bytes,
            telemetry_fields::RUN_TIME,
            layout::RUN_TIME,
            format_duration(read_u32(bytes, layout::RUN_TIME)),
        ),
        float(telemetry_fields::VOLTAGE, layout::VBUS, format!("{:.4}V", f(layout::VBUS))),
        float(telemetry_fields::CURRENT, layout::CURRENT, format!("{:.4}A", f(layout::CURRENT))),
        float(telemetry_fields::D_PLUS, layout::D_PLUS, format!("{:.2}V", f(layout::D_PLUS))),
        float(telemetry_fields::D_MINUS, layout::D_MINUS, format!("{:.2}V", f(layout::D_MINUS))),
        float(telemetry_fields::CC1, layout::CC1, format!("{:.2}V", f(layout::CC1))),
        float(telemetry_fields::CC2, layout::CC2, format!("{:.2}V", f(layout::CC2))),
    ];

    if bytes[layout::TEMPERATURE_FLAG] == 1 {
        children.push(float(
            telemetry_fields::TEMPERATURE,
            layout::TEMPERATURE,
            format!("{:.1}℃", f(layout::TEMPERATURE)),
        ));
    }

    let last_bit = TELEMETRY_REPORT_LEN as u32 * 8 - 1;
    Ok(MetadataNode::root(children).with_bits(0, last_bit))
}

/// Leaf covering one 4-byte little-endian word
fn word_node(bytes: &[u8], field: &str, offset: usize, text: String) -> MetadataNode {
    let start = offset as u32 * 8;
    MetadataNode::text(field, text)
        .with_bits(start, start + 31)
        .with_raw(format_hex(&bytes[offset..offset + 4]))
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32(bytes, offset))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

/// Seconds as "hh:mm:ss"
fn format_duration(secs: u32) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

// ============================================================================
// Power delivery
// ============================================================================

fn decode_protocol(bytes: &[u8]) -> Result<(MetadataNode, &'static str), DecodeError> {
    let declared = bytes.get(1).copied().unwrap_or(0) as usize;
    if declared < 2 || bytes.len() < declared + 2 {
        return Err(DecodeError::Malformed(format!(
            "PD frame declares {} bytes, got {}",
            declared,
            bytes.len().saturating_sub(2)
        )));
    }

    let header = PdHeader::from_u16(u16::from_le_bytes([bytes[2], bytes[3]]));
    let objects = header.object_count as usize;
    if 2 + objects * 4 > declared {
        return Err(DecodeError::Malformed(format!(
            "header announces {} data objects but frame holds {} bytes",
            objects, declared
        )));
    }

    let mut children = vec![
        MetadataNode::text("SOP", "SOP"),
        header_node(&header),
    ];
    for index in 0..objects {
        let offset = 4 + index * 4;
        let word = read_u32(bytes, offset);
        let start = 16 + index as u32 * 32;
        children.push(
            object_node(header.kind(), index, word)
                .with_bits(start, start + 31)
                .with_raw(format!("0x{:08X}", word)),
        );
    }

    let tree = MetadataNode::root(children).with_bits(0, declared as u32 * 8 - 1);
    Ok((tree, header.type_name()))
}

fn header_node(header: &PdHeader) -> MetadataNode {
    let flag = |set: bool| if set { "Yes" } else { "No" };
    let power_role = if header.power_role_source { "Source" } else { "Sink" };
    let data_role = if header.data_role_dfp { "DFP" } else { "UFP" };

    MetadataNode::branch(
        pd_fields::MESSAGE_HEADER,
        vec![
            MetadataNode::text("Extended", flag(header.extended)).with_bits(15, 15),
            MetadataNode::text("Number of Data Objects", header.object_count.to_string())
                .with_bits(12, 14),
            MetadataNode::text("MessageID", header.message_id.to_string()).with_bits(9, 11),
            MetadataNode::text(pd_fields::PORT_POWER_ROLE, power_role).with_bits(8, 8),
            MetadataNode::text("Specification Revision", header.revision_label())
                .with_bits(6, 7),
            MetadataNode::text(pd_fields::PORT_DATA_ROLE, data_role).with_bits(5, 5),
            MetadataNode::text(pd_fields::MESSAGE_TYPE, header.type_name()).with_bits(0, 4),
        ],
    )
    .with_bits(0, 15)
    .with_raw(format!("0x{:04X}", header.to_u16()))
}

fn object_node(kind: Option<PdMessageType>, index: usize, word: u32) -> MetadataNode {
    let amps = |units: u32| format!("{:.2}A", units as f64 * 0.01);
    match kind {
        Some(PdMessageType::SourceCapabilities) => MetadataNode::branch(
            format!("PDO{}", index + 1),
            vec![
                MetadataNode::text("Supply Type", supply_type(word >> 30)).with_bits(30, 31),
                MetadataNode::text(
                    "Voltage",
                    format!("{:.2}V", ((word >> 10) & 0x3FF) as f64 * 0.05),
                )
                .with_bits(10, 19),
                MetadataNode::text("Maximum Current", amps(word & 0x3FF)).with_bits(0, 9),
            ],
        ),
        Some(PdMessageType::Request) => MetadataNode::branch(
            "RDO",
            vec![
                MetadataNode::text("Object Position", ((word >> 28) & 0x07).to_string())
                    .with_bits(28, 30),
                MetadataNode::text("Operating Current", amps((word >> 10) & 0x3FF))
                    .with_bits(10, 19),
                MetadataNode::text("Max Operating Current", amps(word & 0x3FF)).with_bits(0, 9),
            ],
        ),
        _ => MetadataNode::text(format!("Data Object {}", index + 1), format!("0x{:08X}", word)),
    }
}

fn supply_type(bits: u32) -> &'static str {
    match bits {
        0 => "Fixed Supply",
        1 => "Battery",
        2 => "Variable Supply",
        _ => "Augmented PDO",
    }
}

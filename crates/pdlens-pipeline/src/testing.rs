//! Test decoder and report builders shared by unit tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pdlens_protocol::{
    parse_hex, DecodeError, DecodedMessage, Decoder, InboundReport, MessageKind, MetadataNode,
};

/// Telemetry reports carry the voltage in byte 2; protocol reports decode as
/// "Ping" messages. Clones share readiness.
#[derive(Debug, Clone)]
pub struct TestDecoder {
    ready: Arc<AtomicBool>,
}

impl TestDecoder {
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

impl Decoder for TestDecoder {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn decode(&self, hex: &str) -> Result<DecodedMessage, DecodeError> {
        let bytes = parse_hex(hex)?;
        let (kind, tree) = match bytes[0] {
            0xFF => (
                MessageKind::Telemetry,
                MetadataNode::root(vec![
                    MetadataNode::text("VBus", format!("{}.000V", bytes[2])),
                    MetadataNode::text("Current", "1.000A"),
                ]),
            ),
            0xFE => (MessageKind::Protocol, MetadataNode::root(vec![])),
            other => return Err(DecodeError::UnknownMarker(other)),
        };
        Ok(DecodedMessage {
            kind,
            tree,
            raw_hex: hex.to_string(),
            protocol_message_type: Some("Ping".to_string()),
        })
    }
}

/// 64-byte telemetry report with the given whole-volt reading
pub fn telemetry(volts: u8, arrival_ms: u64) -> InboundReport {
    let mut bytes = vec![0u8; 64];
    bytes[0] = 0xFF;
    bytes[2] = volts;
    InboundReport::new(0, bytes, arrival_ms)
}

/// Minimal protocol report
pub fn protocol(arrival_ms: u64) -> InboundReport {
    InboundReport::new(0, vec![0xFE, 0x02, 0x41, 0x00], arrival_ms)
}

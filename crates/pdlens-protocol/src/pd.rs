//! Power-delivery message summary extraction

use crate::decode::{DecodedMessage, MessageKind};

/// Placeholder shown for a role the header does not carry
pub const UNKNOWN_ROLE: &str = "-";

/// Placeholder shown when the decoder could not name the message type
pub const UNKNOWN_MESSAGE_TYPE: &str = "Unknown";

/// Field names inside the PD message header
pub mod fields {
    pub const MESSAGE_HEADER: &str = "Message Header";
    pub const MESSAGE_TYPE: &str = "Message Type";
    pub const PORT_POWER_ROLE: &str = "Port Power Role";
    pub const CABLE_PLUG: &str = "Cable Plug";
    pub const PORT_DATA_ROLE: &str = "Port Data Role";
}

/// The columns a protocol log row shows for one PD message
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PdSummary {
    /// Message subtype (e.g. "Source_Capabilities")
    pub message_type: String,
    /// Power role of the sender, or cable plug for SOP'/SOP'' messages
    pub power_role: String,
    /// Data role of the sender
    pub data_role: String,
    /// Length of the decoded message in bits, from the root bit range
    pub bit_length: u32,
}

impl PdSummary {
    /// Summarize a protocol-class message
    ///
    /// Returns `None` for any other kind. Missing header fields fall back to
    /// placeholders rather than failing the whole message.
    pub fn from_message(message: &DecodedMessage) -> Option<Self> {
        if message.kind != MessageKind::Protocol {
            return None;
        }

        let header = message.tree.child(fields::MESSAGE_HEADER);
        let role = |names: &[&str]| {
            header
                .and_then(|h| h.child_any(names))
                .and_then(|node| node.as_text())
                .unwrap_or(UNKNOWN_ROLE)
                .to_string()
        };

        let message_type = message
            .protocol_message_type
            .clone()
            .or_else(|| {
                header
                    .and_then(|h| h.child_text(fields::MESSAGE_TYPE))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| UNKNOWN_MESSAGE_TYPE.to_string());

        Some(Self {
            message_type,
            power_role: role(&[fields::PORT_POWER_ROLE, fields::CABLE_PLUG]),
            data_role: role(&[fields::PORT_DATA_ROLE]),
            bit_length: message.tree.bit_len(),
        })
    }
}

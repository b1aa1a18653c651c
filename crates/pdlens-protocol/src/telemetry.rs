//! Telemetry field extraction
//!
//! Turns a telemetry-class [`DecodedMessage`] into a [`TelemetrySample`] by
//! looking up named fields in the top level of its parse tree.

use crate::decode::{DecodedMessage, MessageKind};
use crate::metadata::MetadataNode;

/// Field names used by the meter's status report
pub mod fields {
    pub const VOLTAGE: &str = "VBus";
    pub const CURRENT: &str = "Current";
    pub const TEMPERATURE: &str = "Temperature";
    pub const CHARGE: &str = "Ah";
    pub const ENERGY: &str = "Wh";
    pub const RECORD_TIME: &str = "Rectime";
    pub const RUN_TIME: &str = "Runtime";
    pub const D_PLUS: &str = "D+";
    pub const D_MINUS: &str = "D-";
    pub const CC1: &str = "CC1";
    pub const CC2: &str = "CC2";
    pub const GROUP: &str = "Group";
}

/// Text fields that are shown as reported, never averaged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuxFields {
    /// Accumulated charge
    pub charge_ah: Option<String>,
    /// Accumulated energy
    pub energy_wh: Option<String>,
    /// Recording time counter
    pub record_time: Option<String>,
    /// Run time counter
    pub run_time: Option<String>,
    /// D+ line voltage
    pub d_plus: Option<String>,
    /// D- line voltage
    pub d_minus: Option<String>,
    /// CC1 line voltage
    pub cc1: Option<String>,
    /// CC2 line voltage
    pub cc2: Option<String>,
    /// Active recording group
    pub group: Option<String>,
}

impl AuxFields {
    fn from_tree(tree: &MetadataNode) -> Self {
        let text = |field: &str| tree.child_text(field).map(str::to_string);
        Self {
            charge_ah: text(fields::CHARGE),
            energy_wh: text(fields::ENERGY),
            record_time: text(fields::RECORD_TIME),
            run_time: text(fields::RUN_TIME),
            d_plus: text(fields::D_PLUS),
            d_minus: text(fields::D_MINUS),
            cc1: text(fields::CC1),
            cc2: text(fields::CC2),
            group: text(fields::GROUP),
        }
    }
}

/// Numeric and auxiliary values of one telemetry report
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TelemetrySample {
    /// Bus voltage in volts
    pub voltage: f64,
    /// Current in amperes
    pub current: f64,
    /// Temperature in degrees Celsius, when the report carries one
    pub temperature: Option<f64>,
    /// Derived power in watts (voltage x current)
    pub power: f64,
    /// Text fields
    pub aux: AuxFields,
}

impl TelemetrySample {
    /// Build a sample from numeric values, deriving power
    pub fn new(voltage: f64, current: f64, temperature: Option<f64>) -> Self {
        Self {
            voltage,
            current,
            temperature,
            power: voltage * current,
            aux: AuxFields::default(),
        }
    }

    /// Extract a sample from a telemetry-class message
    ///
    /// Returns `None` for any other kind. Missing or unparseable voltage and
    /// current read as zero; a temperature that is present but unparseable
    /// counts as absent.
    pub fn from_message(message: &DecodedMessage) -> Option<Self> {
        if message.kind != MessageKind::Telemetry {
            return None;
        }

        let tree = &message.tree;
        let number = |field: &str| tree.child_text(field).and_then(parse_number);

        let voltage = number(fields::VOLTAGE).unwrap_or(0.0);
        let current = number(fields::CURRENT).unwrap_or(0.0);
        let temperature = number(fields::TEMPERATURE);

        Some(Self {
            voltage,
            current,
            temperature,
            power: voltage * current,
            aux: AuxFields::from_tree(tree),
        })
    }
}

/// Parse a number out of a unit-decorated string ("5.012V", "-0.35 A", "31.5℃")
///
/// Everything but digits, signs and dots is dropped first, then the longest
/// numeric prefix is read, so "1.2.3" gives 1.2 and "5-" gives 5.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'))
        .collect();
    let prefix = numeric_prefix(&cleaned);
    if !prefix.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Optional sign, digits, then at most one dot and its digits
fn numeric_prefix(text: &str) -> &str {
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry(children: Vec<MetadataNode>) -> DecodedMessage {
        DecodedMessage {
            kind: MessageKind::Telemetry,
            tree: MetadataNode::root(children),
            raw_hex: "FF".to_string(),
            protocol_message_type: None,
        }
    }

    #[test]
    fn test_parse_number_strips_units() {
        assert_eq!(parse_number("5.012V"), Some(5.012));
        assert_eq!(parse_number("-0.35 A"), Some(-0.35));
        assert_eq!(parse_number("31.5℃"), Some(31.5));
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_parse_number_reads_longest_prefix() {
        assert_eq!(parse_number("1.2.3"), Some(1.2));
        assert_eq!(parse_number("5-"), Some(5.0));
        assert_eq!(parse_number("4.98V-"), Some(4.98));
        assert_eq!(parse_number("-.5A"), Some(-0.5));
        assert_eq!(parse_number("+7."), Some(7.0));
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("."), None);
        assert_eq!(parse_number("--5"), None);
    }

    #[test]
    fn test_sample_from_message() {
        let message = telemetry(vec![
            MetadataNode::text("VBus", "5.00V"),
            MetadataNode::text("Current", "2.00A"),
            MetadataNode::text("Temperature", "30.0℃"),
            MetadataNode::text("Ah", "0.125Ah"),
            MetadataNode::text("Group", "1"),
        ]);

        let sample = TelemetrySample::from_message(&message).unwrap();
        assert_eq!(sample.voltage, 5.0);
        assert_eq!(sample.current, 2.0);
        assert_eq!(sample.power, 10.0);
        assert_eq!(sample.temperature, Some(30.0));
        assert_eq!(sample.aux.charge_ah.as_deref(), Some("0.125Ah"));
        assert_eq!(sample.aux.group.as_deref(), Some("1"));
        assert!(sample.aux.energy_wh.is_none());
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let sample = TelemetrySample::from_message(&telemetry(vec![])).unwrap();
        assert_eq!(sample.voltage, 0.0);
        assert_eq!(sample.current, 0.0);
        assert_eq!(sample.temperature, None);
    }

    #[test]
    fn test_non_telemetry_kind_is_rejected() {
        let mut message = telemetry(vec![MetadataNode::text("VBus", "5V")]);
        message.kind = MessageKind::Protocol;
        assert!(TelemetrySample::from_message(&message).is_none());
    }
}

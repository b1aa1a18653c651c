//! Virtual meter simulation
//!
//! Provides a simulated USB power meter that produces the two report
//! families a real one streams: 64-byte status reports and sniffed PD
//! messages. The PD side replays a contract negotiation against the
//! configured supply profiles, alternating between them each round so the
//! bus voltage moves.

use std::time::Duration;

use pdlens_protocol::{PROTOCOL_MARKER, TELEMETRY_MARKER, TELEMETRY_REPORT_LEN};
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::pd_message::{fixed_pdo, fixed_rdo, PdHeader, PdMessageType};

/// Byte offsets inside a telemetry report
///
/// Numeric fields are little-endian `f32`, counters little-endian `u32`.
pub mod layout {
    pub const GROUP: usize = 1;
    pub const CHARGE: usize = 2;
    pub const ENERGY: usize = 6;
    pub const RECORD_TIME: usize = 10;
    pub const RUN_TIME: usize = 14;
    pub const VBUS: usize = 18;
    pub const CURRENT: usize = 22;
    pub const D_PLUS: usize = 26;
    pub const D_MINUS: usize = 30;
    pub const CC1: usize = 34;
    pub const CC2: usize = 38;
    /// 1 when the temperature field is valid
    pub const TEMPERATURE_FLAG: usize = 42;
    pub const TEMPERATURE: usize = 43;
}

/// CC line voltage with a sink attached
const CC_ATTACHED_V: f64 = 1.65;

/// D+/D- voltage of a dumb charger
const DATA_LINE_V: f64 = 0.6;

/// One fixed supply offered in Source_Capabilities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupplyProfile {
    pub millivolts: u32,
    pub milliamps: u32,
}

impl SupplyProfile {
    pub fn new(millivolts: u32, milliamps: u32) -> Self {
        Self {
            millivolts,
            milliamps,
        }
    }

    pub fn volts(&self) -> f64 {
        self.millivolts as f64 / 1000.0
    }
}

/// Configuration for creating a virtual meter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualMeterConfig {
    /// Display name/identifier
    pub id: String,
    /// HID report id attached to every report
    pub report_id: u8,
    /// Current drawn by the simulated sink, in amperes
    pub load_current_a: f64,
    /// Board temperature; `None` for a meter without a sensor
    pub temperature_c: Option<f64>,
    /// Recording group shown in status reports
    pub group: u8,
    /// Fixed supplies the simulated source offers
    pub profiles: Vec<SupplyProfile>,
}

impl Default for VirtualMeterConfig {
    fn default() -> Self {
        Self {
            id: "Virtual Meter".to_string(),
            report_id: 0,
            load_current_a: 1.5,
            temperature_c: Some(32.5),
            group: 1,
            profiles: vec![SupplyProfile::new(5_000, 3_000), SupplyProfile::new(9_000, 3_000)],
        }
    }
}

/// A step of the negotiation script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Capabilities,
    Request,
    Accept,
    PowerReady,
}

impl Step {
    fn next(self) -> Self {
        match self {
            Step::Capabilities => Step::Request,
            Step::Request => Step::Accept,
            Step::Accept => Step::PowerReady,
            Step::PowerReady => Step::Capabilities,
        }
    }
}

/// A simulated USB meter with a PD sniffer
#[derive(Debug)]
pub struct VirtualMeter {
    /// Unique identifier for this virtual meter
    id: String,
    /// HID report id
    report_id: u8,
    /// Bus voltage of the active contract
    voltage: f64,
    /// Load current
    current: f64,
    temperature: Option<f64>,
    group: u8,
    profiles: Vec<SupplyProfile>,
    /// Accumulated charge in Ah
    charge_ah: f64,
    /// Accumulated energy in Wh
    energy_wh: f64,
    /// Time with a load attached
    record_time: Duration,
    /// Time since power-up
    run_time: Duration,
    /// Status reports produced so far
    reports: u64,
    /// Next negotiation step
    step: Step,
    /// Profile index (0-based) requested in the current round
    requested: usize,
    source_message_id: u8,
    sink_message_id: u8,
}

impl VirtualMeter {
    /// Create a new virtual meter with default settings
    pub fn new(id: impl Into<String>) -> Self {
        let config = VirtualMeterConfig {
            id: id.into(),
            ..VirtualMeterConfig::default()
        };
        Self::build(config)
    }

    /// Create a virtual meter from configuration
    pub fn from_config(config: VirtualMeterConfig) -> Result<Self, SimError> {
        if config.profiles.is_empty() {
            return Err(SimError::NoSupplyProfiles);
        }
        if config.profiles.len() > 7 {
            return Err(SimError::TooManyProfiles(config.profiles.len()));
        }
        if !config.load_current_a.is_finite() || config.load_current_a < 0.0 {
            return Err(SimError::InvalidLoad(config.load_current_a));
        }
        Ok(Self::build(config))
    }

    fn build(config: VirtualMeterConfig) -> Self {
        let voltage = config.profiles.first().map(|p| p.volts()).unwrap_or(5.0);
        Self {
            id: config.id,
            report_id: config.report_id,
            voltage,
            current: config.load_current_a,
            temperature: config.temperature_c,
            group: config.group,
            profiles: config.profiles,
            charge_ah: 0.0,
            energy_wh: 0.0,
            record_time: Duration::ZERO,
            run_time: Duration::ZERO,
            reports: 0,
            step: Step::Capabilities,
            requested: 0,
            source_message_id: 0,
            sink_message_id: 0,
        }
    }

    /// Get the meter's unique identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// HID report id attached to every report
    pub fn report_id(&self) -> u8 {
        self.report_id
    }

    /// Bus voltage of the active contract
    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Set the load current (negative values clamp to zero)
    pub fn set_current(&mut self, amps: f64) {
        self.current = amps.max(0.0);
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn set_temperature(&mut self, celsius: Option<f64>) {
        self.temperature = celsius;
    }

    pub fn charge_ah(&self) -> f64 {
        self.charge_ah
    }

    pub fn energy_wh(&self) -> f64 {
        self.energy_wh
    }

    /// Produce the next status report, advancing the counters by `elapsed`
    pub fn telemetry_report(&mut self, elapsed: Duration) -> Vec<u8> {
        let hours = elapsed.as_secs_f64() / 3600.0;
        self.run_time += elapsed;
        if self.current > 0.0 {
            self.record_time += elapsed;
            self.charge_ah += self.current * hours;
            self.energy_wh += self.voltage * self.current * hours;
        }
        self.reports += 1;

        // Small deterministic ripple around the contract voltage
        let ripple = ((self.reports % 5) as f64 - 2.0) * 0.004;

        let mut bytes = vec![0u8; TELEMETRY_REPORT_LEN];
        bytes[0] = TELEMETRY_MARKER;
        bytes[layout::GROUP] = self.group;
        put_f32(&mut bytes, layout::CHARGE, self.charge_ah);
        put_f32(&mut bytes, layout::ENERGY, self.energy_wh);
        put_u32(&mut bytes, layout::RECORD_TIME, self.record_time.as_secs() as u32);
        put_u32(&mut bytes, layout::RUN_TIME, self.run_time.as_secs() as u32);
        put_f32(&mut bytes, layout::VBUS, self.voltage + ripple);
        put_f32(&mut bytes, layout::CURRENT, self.current);
        put_f32(&mut bytes, layout::D_PLUS, DATA_LINE_V);
        put_f32(&mut bytes, layout::D_MINUS, DATA_LINE_V);
        put_f32(&mut bytes, layout::CC1, CC_ATTACHED_V);
        put_f32(&mut bytes, layout::CC2, 0.0);
        if let Some(temperature) = self.temperature {
            bytes[layout::TEMPERATURE_FLAG] = 1;
            put_f32(&mut bytes, layout::TEMPERATURE, temperature);
        }
        bytes
    }

    /// Produce the next message exchange of the negotiation
    ///
    /// Each exchange is one message followed by the partner's GoodCRC, as
    /// the sniffer sees them back to back. Completing PS_RDY switches the
    /// bus voltage to the requested profile.
    pub fn next_exchange(&mut self) -> Vec<Vec<u8>> {
        let step = self.step;
        self.step = step.next();

        let (kind, from_source, objects) = match step {
            Step::Capabilities => {
                let pdos = self
                    .profiles
                    .iter()
                    .map(|p| fixed_pdo(p.millivolts, p.milliamps))
                    .collect::<Vec<u32>>();
                (PdMessageType::SourceCapabilities, true, pdos)
            }
            Step::Request => {
                self.requested = (self.requested + 1) % self.profiles.len();
                let max_ma = self.profiles[self.requested].milliamps;
                let operating_ma = ((self.current * 1000.0) as u32).min(max_ma);
                let position = (self.requested + 1) as u8;
                (
                    PdMessageType::Request,
                    false,
                    vec![fixed_rdo(position, operating_ma, max_ma)],
                )
            }
            Step::Accept => (PdMessageType::Accept, true, Vec::new()),
            Step::PowerReady => {
                self.voltage = self.profiles[self.requested].volts();
                (PdMessageType::PsRdy, true, Vec::new())
            }
        };

        let message_id = self.take_message_id(from_source);
        let header = PdHeader::new(kind, from_source, message_id, objects.len() as u8);
        let message = protocol_report(header, &objects);
        let ack = protocol_report(
            PdHeader::new(PdMessageType::GoodCrc, !from_source, message_id, 0),
            &[],
        );
        vec![message, ack]
    }

    /// Encode a single control message from the source or the sink
    pub fn control_message(&mut self, kind: PdMessageType, from_source: bool) -> Vec<u8> {
        let message_id = self.take_message_id(from_source);
        protocol_report(PdHeader::new(kind, from_source, message_id, 0), &[])
    }

    fn take_message_id(&mut self, from_source: bool) -> u8 {
        let counter = if from_source {
            &mut self.source_message_id
        } else {
            &mut self.sink_message_id
        };
        let id = *counter;
        *counter = (*counter + 1) & 0x07;
        id
    }
}

/// Frame a PD message: marker, payload length, header, data objects
pub fn protocol_report(header: PdHeader, objects: &[u32]) -> Vec<u8> {
    let payload_len = 2 + objects.len() * 4;
    let mut bytes = Vec::with_capacity(payload_len + 2);
    bytes.push(PROTOCOL_MARKER);
    bytes.push(payload_len as u8);
    bytes.extend_from_slice(&header.to_u16().to_le_bytes());
    for object in objects {
        bytes.extend_from_slice(&object.to_le_bytes());
    }
    bytes
}

fn put_f32(bytes: &mut [u8], offset: usize, value: f64) {
    bytes[offset..offset + 4].copy_from_slice(&(value as f32).to_le_bytes());
}

fn put_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

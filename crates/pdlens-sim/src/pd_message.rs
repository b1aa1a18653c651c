//! USB Power Delivery message header and type table
//!
//! Shared by the virtual meter (which encodes captured messages) and the
//! simulation decoder (which names them again).

/// PD message types the virtual meter can emit or the decoder can name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PdMessageType {
    // --- Control messages (no data objects) ---
    GoodCrc,
    GotoMin,
    Accept,
    Reject,
    Ping,
    PsRdy,
    GetSourceCap,
    GetSinkCap,
    DrSwap,
    PrSwap,
    VconnSwap,
    Wait,
    SoftReset,

    // --- Data messages ---
    SourceCapabilities,
    Request,
    Bist,
    SinkCapabilities,
    BatteryStatus,
    Alert,
    VendorDefined,
}

const CONTROL_TYPES: &[PdMessageType] = &[
    PdMessageType::GoodCrc,
    PdMessageType::GotoMin,
    PdMessageType::Accept,
    PdMessageType::Reject,
    PdMessageType::Ping,
    PdMessageType::PsRdy,
    PdMessageType::GetSourceCap,
    PdMessageType::GetSinkCap,
    PdMessageType::DrSwap,
    PdMessageType::PrSwap,
    PdMessageType::VconnSwap,
    PdMessageType::Wait,
    PdMessageType::SoftReset,
];

const DATA_TYPES: &[PdMessageType] = &[
    PdMessageType::SourceCapabilities,
    PdMessageType::Request,
    PdMessageType::Bist,
    PdMessageType::SinkCapabilities,
    PdMessageType::BatteryStatus,
    PdMessageType::Alert,
    PdMessageType::VendorDefined,
];

/// Name shown for a type code with no entry in the table
pub const RESERVED_NAME: &str = "Reserved";

impl PdMessageType {
    /// 5-bit type code carried in the header
    pub fn code(&self) -> u8 {
        match self {
            PdMessageType::GoodCrc => 0x01,
            PdMessageType::GotoMin => 0x02,
            PdMessageType::Accept => 0x03,
            PdMessageType::Reject => 0x04,
            PdMessageType::Ping => 0x05,
            PdMessageType::PsRdy => 0x06,
            PdMessageType::GetSourceCap => 0x07,
            PdMessageType::GetSinkCap => 0x08,
            PdMessageType::DrSwap => 0x09,
            PdMessageType::PrSwap => 0x0A,
            PdMessageType::VconnSwap => 0x0B,
            PdMessageType::Wait => 0x0C,
            PdMessageType::SoftReset => 0x0D,
            PdMessageType::SourceCapabilities => 0x01,
            PdMessageType::Request => 0x02,
            PdMessageType::Bist => 0x03,
            PdMessageType::SinkCapabilities => 0x04,
            PdMessageType::BatteryStatus => 0x05,
            PdMessageType::Alert => 0x06,
            PdMessageType::VendorDefined => 0x0F,
        }
    }

    /// Whether this type carries data objects
    pub fn is_data(&self) -> bool {
        DATA_TYPES.contains(self)
    }

    /// Display name as it appears in the protocol log
    pub fn name(&self) -> &'static str {
        match self {
            PdMessageType::GoodCrc => "GoodCRC",
            PdMessageType::GotoMin => "GotoMin",
            PdMessageType::Accept => "Accept",
            PdMessageType::Reject => "Reject",
            PdMessageType::Ping => "Ping",
            PdMessageType::PsRdy => "PS_RDY",
            PdMessageType::GetSourceCap => "Get_Source_Cap",
            PdMessageType::GetSinkCap => "Get_Sink_Cap",
            PdMessageType::DrSwap => "DR_Swap",
            PdMessageType::PrSwap => "PR_Swap",
            PdMessageType::VconnSwap => "VCONN_Swap",
            PdMessageType::Wait => "Wait",
            PdMessageType::SoftReset => "Soft_Reset",
            PdMessageType::SourceCapabilities => "Source_Capabilities",
            PdMessageType::Request => "Request",
            PdMessageType::Bist => "BIST",
            PdMessageType::SinkCapabilities => "Sink_Capabilities",
            PdMessageType::BatteryStatus => "Battery_Status",
            PdMessageType::Alert => "Alert",
            PdMessageType::VendorDefined => "Vendor_Defined",
        }
    }

    /// Look up a type from its header code
    ///
    /// The same code means different things for control and data messages,
    /// so the object count decides which table applies.
    pub fn from_code(code: u8, object_count: u8) -> Option<Self> {
        let table = if object_count > 0 {
            DATA_TYPES
        } else {
            CONTROL_TYPES
        };
        table.iter().copied().find(|t| t.code() == code)
    }
}

/// Decoded 16-bit PD message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdHeader {
    /// Type code (bits 0-4)
    pub message_type: u8,
    /// Sender is the downstream-facing port (bit 5)
    pub data_role_dfp: bool,
    /// Specification revision (bits 6-7; 0 = 1.0, 1 = 2.0, 2 = 3.0)
    pub spec_revision: u8,
    /// Sender is the source (bit 8)
    pub power_role_source: bool,
    /// Rolling message id (bits 9-11)
    pub message_id: u8,
    /// Number of 32-bit data objects (bits 12-14)
    pub object_count: u8,
    /// Extended message (bit 15)
    pub extended: bool,
}

impl PdHeader {
    /// Header for a message of `kind` sent by the source or the sink
    pub fn new(kind: PdMessageType, from_source: bool, message_id: u8, object_count: u8) -> Self {
        Self {
            message_type: kind.code(),
            data_role_dfp: from_source,
            spec_revision: 2,
            power_role_source: from_source,
            message_id: message_id & 0x07,
            object_count: object_count & 0x07,
            extended: false,
        }
    }

    pub fn from_u16(raw: u16) -> Self {
        Self {
            message_type: (raw & 0x1F) as u8,
            data_role_dfp: raw & (1 << 5) != 0,
            spec_revision: ((raw >> 6) & 0x03) as u8,
            power_role_source: raw & (1 << 8) != 0,
            message_id: ((raw >> 9) & 0x07) as u8,
            object_count: ((raw >> 12) & 0x07) as u8,
            extended: raw & (1 << 15) != 0,
        }
    }

    pub fn to_u16(&self) -> u16 {
        (self.message_type as u16 & 0x1F)
            | (self.data_role_dfp as u16) << 5
            | (self.spec_revision as u16 & 0x03) << 6
            | (self.power_role_source as u16) << 8
            | (self.message_id as u16 & 0x07) << 9
            | (self.object_count as u16 & 0x07) << 12
            | (self.extended as u16) << 15
    }

    /// Message type from the table, if known
    pub fn kind(&self) -> Option<PdMessageType> {
        PdMessageType::from_code(self.message_type, self.object_count)
    }

    /// Display name of the message type
    pub fn type_name(&self) -> &'static str {
        self.kind().map(|k| k.name()).unwrap_or(RESERVED_NAME)
    }

    pub fn revision_label(&self) -> &'static str {
        match self.spec_revision {
            0 => "Rev 1.0",
            1 => "Rev 2.0",
            2 => "Rev 3.0",
            _ => RESERVED_NAME,
        }
    }
}

/// Encode a fixed-supply PDO (50 mV / 10 mA units)
pub fn fixed_pdo(millivolts: u32, milliamps: u32) -> u32 {
    ((millivolts / 50) & 0x3FF) << 10 | ((milliamps / 10) & 0x3FF)
}

/// Encode a fixed-supply request data object
pub fn fixed_rdo(position: u8, operating_ma: u32, max_ma: u32) -> u32 {
    ((position as u32) & 0x07) << 28 | ((operating_ma / 10) & 0x3FF) << 10 | ((max_ma / 10) & 0x3FF)
}

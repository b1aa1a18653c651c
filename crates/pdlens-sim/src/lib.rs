//! pdlens Simulation Library
//!
//! This crate provides a simulation layer for running the report pipeline
//! without a physical meter. It includes:
//!
//! - **VirtualMeter**: Produces status reports and sniffed PD messages in
//!   the meter's wire layout
//! - **SimDecoder**: Decodes those reports into metadata trees, with a cold
//!   start like a real decoder runtime
//! - **run_meter_task**: Streams a virtual meter into the pipeline actor
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use pdlens_protocol::display::format_hex;
//! use pdlens_protocol::{Decoder, PdSummary, TelemetrySample};
//! use pdlens_sim::{SimDecoder, VirtualMeter};
//!
//! let mut meter = VirtualMeter::new("Bench");
//! let decoder = SimDecoder::new();
//!
//! // Status reports decode into telemetry samples
//! let report = meter.telemetry_report(Duration::from_millis(100));
//! let decoded = decoder.decode(&format_hex(&report)).unwrap();
//! let sample = TelemetrySample::from_message(&decoded).unwrap();
//! assert!((sample.voltage - 5.0).abs() < 0.01);
//!
//! // PD exchanges decode into protocol messages
//! for report in meter.next_exchange() {
//!     let decoded = decoder.decode(&format_hex(&report)).unwrap();
//!     let summary = PdSummary::from_message(&decoded).unwrap();
//!     println!("{} from {}", summary.message_type, summary.power_role);
//! }
//! ```

pub mod decoder;
pub mod error;
pub mod meter;
pub mod meter_task;
pub mod pd_message;

pub use decoder::SimDecoder;
pub use error::SimError;
pub use meter::{SupplyProfile, VirtualMeter, VirtualMeterConfig};
pub use meter_task::{run_decoder_warmup, run_meter_task, MeterCommand, MeterTiming};
pub use pd_message::{PdHeader, PdMessageType};

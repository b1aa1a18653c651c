//! Telemetry aggregation
//!
//! The meter can report faster than the display cadence. Every telemetry
//! sample of one pass is folded into a single snapshot: numeric fields are
//! averaged, text fields come from the last sample.

use pdlens_protocol::{AuxFields, TelemetrySample};
use serde::{Deserialize, Serialize};

/// Representative telemetry for one pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Mean bus voltage in volts
    pub voltage: f64,
    /// Mean current in amperes
    pub current: f64,
    /// Mean power in watts
    pub power: f64,
    /// Mean temperature over the samples that reported one
    pub temperature: Option<f64>,
    /// Text fields of the last sample
    pub aux: AuxFields,
    /// Number of samples folded into this snapshot
    pub sample_count: usize,
}

impl TelemetrySnapshot {
    /// Snapshot of a single sample
    pub fn from_sample(sample: TelemetrySample) -> Self {
        Self {
            voltage: sample.voltage,
            current: sample.current,
            power: sample.power,
            temperature: sample.temperature,
            aux: sample.aux,
            sample_count: 1,
        }
    }
}

/// Fold over the telemetry samples of one pass
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    count: usize,
    voltage_sum: f64,
    current_sum: f64,
    power_sum: f64,
    temperature_sum: f64,
    temperature_count: usize,
    last_aux: Option<AuxFields>,
}

impl MetricsAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one sample
    pub fn add(&mut self, sample: TelemetrySample) {
        self.count += 1;
        self.voltage_sum += sample.voltage;
        self.current_sum += sample.current;
        self.power_sum += sample.power;
        if let Some(temperature) = sample.temperature {
            self.temperature_sum += temperature;
            self.temperature_count += 1;
        }
        self.last_aux = Some(sample.aux);
    }

    /// Number of samples folded so far
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether no samples were folded
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Produce the snapshot, or `None` when no samples were folded
    pub fn finish(self) -> Option<TelemetrySnapshot> {
        let aux = self.last_aux?;
        let n = self.count as f64;

        Some(TelemetrySnapshot {
            voltage: self.voltage_sum / n,
            current: self.current_sum / n,
            power: self.power_sum / n,
            temperature: (self.temperature_count > 0)
                .then(|| self.temperature_sum / self.temperature_count as f64),
            aux,
            sample_count: self.count,
        })
    }
}

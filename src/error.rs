use crate::report::InvalidReportLength;
use crate::settings::DeviceIdentity;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    Cpu,
    Gpu,
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sensor::Cpu => f.write_str("CPU"),
            Sensor::Gpu => f.write_str("GPU"),
        }
    }
}

/// Everything that can go wrong in a single poll tick. None of these stop the loop.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("{0} temperature unavailable, sending 0.0")]
    SensorUnavailable(Sensor),
    #[error("no display found ({0})")]
    DeviceNotFound(DeviceIdentity),
    #[error("failed to write report to display: {0:#}")]
    DeviceWriteFailed(anyhow::Error),
    #[error(transparent)]
    InvalidReportLength(#[from] InvalidReportLength),
    #[error("failed to enumerate HID devices: {0:#}")]
    EnumerationFailed(anyhow::Error),
}

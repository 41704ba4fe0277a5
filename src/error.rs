use core::fmt;

use crate::signal::Signal;

/// Failure reported by a sensor collaborator for a single read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Bus transaction failed (NACK, arbitration loss, ADC error).
    Bus,
    /// The sensor is not attached or stopped answering.
    Disconnected,
    /// The read did not complete within the configured bound.
    Timeout,
}

/// The three failure kinds the sampling core distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GloveError {
    /// One signal could not be read this pass; its last good value is kept.
    SensorRead { signal: Signal, cause: SensorError },
    /// The IMU answered with a check value other than `IMU_CHECK_KEY`.
    IdentityMismatch { observed: u16 },
    /// A pass ran past the next tick; `missed_ticks` ticks were dropped.
    Overrun { missed_ticks: u32 },
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::Bus => f.write_str("bus error"),
            SensorError::Disconnected => f.write_str("sensor disconnected"),
            SensorError::Timeout => f.write_str("read timed out"),
        }
    }
}

impl fmt::Display for GloveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GloveError::SensorRead { signal, cause } => {
                write!(f, "failed to read {}: {}", signal, cause)
            }
            GloveError::IdentityMismatch { observed } => write!(
                f,
                "IMU identity mismatch: got 0x{:04X}, expected 0x{:04X}",
                observed,
                crate::config::IMU_CHECK_KEY
            ),
            GloveError::Overrun { missed_ticks } => {
                write!(f, "sampling pass overran, dropped {} tick(s)", missed_ticks)
            }
        }
    }
}

impl From<embassy_time::TimeoutError> for SensorError {
    fn from(_: embassy_time::TimeoutError) -> Self {
        SensorError::Timeout
    }
}

impl core::error::Error for SensorError {}
impl core::error::Error for GloveError {}

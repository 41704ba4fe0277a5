use embassy_time::{Duration, Instant};

pub mod glove;
pub mod stats;

pub use glove::Glove;
pub use stats::{run_pass_stats, PassStats, StatsWindow};

use crate::buffer::DegradedMask;
use crate::signal::{GloveSnapshot, Signal};

/// Outcome of one committed pass.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PassReport {
    pub generation: u32,
    pub timestamp: Instant,
    pub duration: Duration,
    pub imu_trusted: bool,
    pub degraded: DegradedMask,
    pub snapshot: GloveSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemMessage {
    PassCompleted { timestamp: Instant, generation: u32 },
    SystemAlert(SystemAlert),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemAlert {
    /// Bring-up found no IMU, or one with the wrong check value.
    ImuUntrusted { observed: Option<u16> },
    /// Every IMU read failed for too many passes; the IMU is being brought up again.
    ImuReset,
    /// `signal` was carried over for too many consecutive passes.
    SensorFault { signal: Signal },
    /// A pass ran past its period.
    Overrun { missed_ticks: u32 },
}

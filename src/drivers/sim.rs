//! Deterministic stand-in for the glove's sensors.
//!
//! Each signal follows a triangle wave with its own phase, derived from the
//! embassy clock, so consecutive passes produce different but predictable
//! values. Faults can be injected per signal: periodic bus errors, or a read
//! that never completes (to exercise the read timeout).

use embassy_time::{Duration, Instant, Timer};
use heapless::Vec;

use super::imu::{compose_identity, G_WHO_AM_I, XM_WHO_AM_I};
use super::SensorSource;
use crate::error::SensorError;
use crate::signal::{Signal, SignalGroup};

const WAVE_PERIOD_MS: u64 = 4000;
const MAX_FAULTS: usize = 4;

#[derive(Debug, Clone, Copy)]
struct Fault {
    signal: Signal,
    every: u32,
    reads: u32,
}

pub struct SimulatedGlove {
    identity: u16,
    latency: Duration,
    faults: Vec<Fault, MAX_FAULTS>,
    stalled: Option<Signal>,
}

impl SimulatedGlove {
    pub fn new() -> Self {
        Self {
            identity: compose_identity(XM_WHO_AM_I, G_WHO_AM_I),
            latency: Duration::from_micros(200),
            faults: Vec::new(),
            stalled: None,
        }
    }

    /// Pretend a different IMU is fitted.
    pub fn with_identity(mut self, identity: u16) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every `every`-th read of `signal` fails with a bus error.
    /// Extra faults beyond the table size are ignored.
    pub fn with_fault(mut self, signal: Signal, every: u32) -> Self {
        let _ = self.faults.push(Fault {
            signal,
            every: every.max(1),
            reads: 0,
        });
        self
    }

    /// Reads of `signal` never complete.
    pub fn with_stall(mut self, signal: Signal) -> Self {
        self.stalled = Some(signal);
        self
    }

    fn amplitude(signal: Signal) -> (f32, f32) {
        // (offset, amplitude) in m/s², dps, µT and degrees
        match signal {
            Signal::AccelZ => (9.81, 2.0),
            Signal::AccelX | Signal::AccelY => (0.0, 2.0),
            Signal::GyroX | Signal::GyroY | Signal::GyroZ => (0.0, 250.0),
            Signal::MagX | Signal::MagY | Signal::MagZ => (0.0, 50.0),
            _ => (45.0, 45.0),
        }
    }

    fn waveform(signal: Signal, now_ms: u64) -> f32 {
        let phase = (now_ms + signal.index() as u64 * 300) % WAVE_PERIOD_MS;
        // -1.0 ..= 1.0
        let half = WAVE_PERIOD_MS as f32 / 2.0;
        let tri = if (phase as f32) < half {
            phase as f32 / half * 2.0 - 1.0
        } else {
            1.0 - (phase as f32 - half) / half * 2.0
        };
        let (offset, amplitude) = Self::amplitude(signal);
        offset + amplitude * tri
    }

    fn tripped(&mut self, signal: Signal) -> bool {
        let mut tripped = false;
        for fault in self.faults.iter_mut().filter(|f| f.signal == signal) {
            fault.reads = fault.reads.wrapping_add(1);
            if fault.reads % fault.every == 0 {
                tripped = true;
            }
        }
        tripped
    }
}

impl Default for SimulatedGlove {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for SimulatedGlove {
    async fn read(&mut self, signal: Signal) -> Result<f32, SensorError> {
        if self.stalled == Some(signal) {
            core::future::pending::<()>().await;
        }
        Timer::after(self.latency).await;

        if self.tripped(signal) {
            return Err(match signal.group() {
                SignalGroup::Imu => SensorError::Bus,
                SignalGroup::Flex => SensorError::Disconnected,
            });
        }
        Ok(Self::waveform(signal, Instant::now().as_millis()))
    }

    async fn identity(&mut self) -> Result<u16, SensorError> {
        Timer::after(self.latency).await;
        Ok(self.identity)
    }
}

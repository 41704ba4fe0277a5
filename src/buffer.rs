use crate::error::{GloveError, SensorError};
use crate::signal::{GloveSnapshot, Signal, SignalGroup};

/// Set of signals whose value was carried over from an earlier pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DegradedMask(u16);

impl DegradedMask {
    pub const EMPTY: Self = Self(0);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub fn insert(&mut self, signal: Signal) {
        self.0 |= 1 << signal.index();
    }

    pub const fn contains(self, signal: Signal) -> bool {
        self.0 & (1 << signal.index()) != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// True when every signal of `group` was carried over.
    pub fn covers(self, group: SignalGroup) -> bool {
        group.signals().iter().all(|s| self.contains(*s))
    }
}

/// Staging area for one pass.
///
/// Holds the last good value of every signal. A pass starts with
/// [`begin_pass`](Self::begin_pass), records one result per signal, and the
/// publisher then commits [`staged`](Self::staged). A failed read leaves the
/// previous value in place and marks the signal degraded.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    staged: GloveSnapshot,
    degraded: DegradedMask,
}

impl SampleBuffer {
    pub const fn new() -> Self {
        Self {
            staged: GloveSnapshot::ZERO,
            degraded: DegradedMask::EMPTY,
        }
    }

    pub fn begin_pass(&mut self) {
        self.degraded = DegradedMask::EMPTY;
    }

    /// Stores the outcome of one read. A failure comes back as
    /// [`GloveError::SensorRead`] for the caller to log; the buffer itself has
    /// already recovered.
    pub fn record(
        &mut self,
        signal: Signal,
        reading: Result<f32, SensorError>,
    ) -> Result<(), GloveError> {
        match reading {
            Ok(value) => {
                self.staged.set(signal, value);
                Ok(())
            }
            Err(cause) => {
                self.degraded.insert(signal);
                Err(GloveError::SensorRead { signal, cause })
            }
        }
    }

    pub fn staged(&self) -> &GloveSnapshot {
        &self.staged
    }

    pub fn degraded(&self) -> DegradedMask {
        self.degraded
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

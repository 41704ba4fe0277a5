use embassy_time::{Duration, Instant};

use crate::ipc::PassChannel;
use crate::signal::GloveSnapshot;

use super::PassReport;

const WINDOW: Duration = Duration::from_secs(1);

/// Aggregates of one reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatsWindow {
    pub passes: u32,
    pub degraded: u32,
    pub untrusted: u32,
    pub duplicates: u32,
    pub max_pass: Duration,
}

impl StatsWindow {
    pub fn duplicate_rate(&self) -> u32 {
        (self.duplicates * 100) / self.passes.max(1)
    }
}

pub struct PassStats {
    window_start: Option<Instant>,
    current: StatsWindow,
    prev: Option<GloveSnapshot>,
}

impl PassStats {
    pub const fn new() -> Self {
        Self {
            window_start: None,
            current: StatsWindow {
                passes: 0,
                degraded: 0,
                untrusted: 0,
                duplicates: 0,
                max_pass: Duration::from_ticks(0),
            },
            prev: None,
        }
    }

    /// Adds one pass. Returns the finished window once a report lands at
    /// least one window length after the first report of that window.
    pub fn record(&mut self, report: &PassReport) -> Option<StatsWindow> {
        let start = *self.window_start.get_or_insert(report.timestamp);

        self.current.passes += 1;
        if !report.degraded.is_empty() {
            self.current.degraded += 1;
        }
        if !report.imu_trusted {
            self.current.untrusted += 1;
        }
        if let Some(previous) = &self.prev {
            if report.snapshot.same_bits(previous) {
                self.current.duplicates += 1;
            }
        }
        self.prev = Some(report.snapshot);
        if report.duration > self.current.max_pass {
            self.current.max_pass = report.duration;
        }

        if report.timestamp.duration_since(start) >= WINDOW {
            let done = self.current;
            self.current = Self::new().current;
            self.window_start = Some(report.timestamp);
            Some(done)
        } else {
            None
        }
    }
}

impl Default for PassStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs pass rate and health once per second.
pub async fn run_pass_stats(rx: &PassChannel) {
    info!("Pass stats task started");
    let mut stats = PassStats::new();
    loop {
        let report = rx.receive().await;
        if let Some(w) = stats.record(&report) {
            info!(
                "Glove: {} passes, {} degraded, {} untrusted, {}% duplicates, slowest {}us",
                w.passes,
                w.degraded,
                w.untrusted,
                w.duplicate_rate(),
                w.max_pass.as_micros()
            );
        }
    }
}

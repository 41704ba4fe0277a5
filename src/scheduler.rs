use embassy_time::{Duration, Instant, Ticker};

use crate::error::GloveError;

/// Periodic trigger for sampling passes.
///
/// The owner awaits [`next_tick`](Self::next_tick), runs one pass to
/// completion, then reports it through [`finish_pass`](Self::finish_pass).
/// Since the same task does all three, passes cannot overlap. When a pass
/// runs longer than one period the overdue ticks are dropped instead of
/// being replayed back to back.
pub struct RefreshScheduler {
    period: Duration,
    ticker: Ticker,
    overruns: u32,
    dropped_ticks: u32,
}

impl RefreshScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            ticker: Ticker::every(period),
            overruns: 0,
            dropped_ticks: 0,
        }
    }

    /// Waits for the next tick and returns the instant the pass starts.
    pub async fn next_tick(&mut self) -> Instant {
        self.ticker.next().await;
        Instant::now()
    }

    pub fn finish_pass(&mut self, started: Instant) -> Result<Duration, GloveError> {
        let elapsed = started.elapsed();
        if elapsed <= self.period {
            return Ok(elapsed);
        }

        let missed_ticks = (elapsed.as_ticks() / self.period.as_ticks().max(1)) as u32;
        self.overruns = self.overruns.wrapping_add(1);
        self.dropped_ticks = self.dropped_ticks.wrapping_add(missed_ticks);
        // Restart the period from now; the ticks that fell inside the pass are gone.
        self.ticker.reset();
        Err(GloveError::Overrun { missed_ticks })
    }

    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    pub fn dropped_ticks(&self) -> u32 {
        self.dropped_ticks
    }
}
